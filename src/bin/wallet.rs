use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::Value;

use mini_ledger::client::{DEFAULT_NODE_URL, NodeClient};
use mini_ledger::transaction::Transaction;
use mini_ledger::wallet::WalletFile;

/// Wallet tool: key files, signed transactions and calls to a ledger node.
#[derive(Parser)]
#[command(name = "wallet", version)]
struct Cli {
    /// Base URL of the node API
    #[arg(long, global = true, default_value = DEFAULT_NODE_URL)]
    node: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new key file
    Create {
        #[arg(long)]
        out: PathBuf,
    },
    /// Print the address (public key) of a key file
    Address {
        #[arg(long)]
        wallet: PathBuf,
    },
    /// Print a signed transaction without sending it
    Sign {
        #[arg(long)]
        wallet: PathBuf,
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: f64,
    },
    /// Ask the node for the confirmed balance of a wallet
    Balance {
        #[arg(long)]
        wallet: PathBuf,
    },
    /// Sign a transfer and submit it to the node
    Send {
        #[arg(long)]
        wallet: PathBuf,
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: f64,
    },
    /// Have the node mine its pending pool, paying this wallet
    Mine {
        #[arg(long)]
        wallet: PathBuf,
    },
}

fn signed_transfer(
    wallet: &WalletFile,
    to: String,
    amount: f64,
) -> Result<Transaction, Box<dyn std::error::Error>> {
    let mut tx = Transaction::new(wallet.public.clone(), to, amount);
    tx.sign(&wallet.private)?;
    Ok(tx)
}

fn print_json(value: &Value) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Create { out } => {
            if out.exists() {
                return Err(format!("{} already exists", out.display()).into());
            }
            let wallet = WalletFile::generate();
            wallet.save(&out)?;
            println!("✅ Wallet saved to {}", out.display());
            println!("🔓 Public: {}", wallet.public);
        }
        Command::Address { wallet } => {
            println!("{}", WalletFile::load(wallet)?.public);
        }
        Command::Sign { wallet, to, amount } => {
            let tx = signed_transfer(&WalletFile::load(wallet)?, to, amount)?;
            println!("{}", serde_json::to_string_pretty(&tx.to_record())?);
        }
        Command::Balance { wallet } => {
            let wallet = WalletFile::load(wallet)?;
            let client = NodeClient::new(cli.node)?;
            print_json(&client.balance(&wallet.public).await?)?;
        }
        Command::Send { wallet, to, amount } => {
            let tx = signed_transfer(&WalletFile::load(wallet)?, to, amount)?;
            let client = NodeClient::new(cli.node)?;
            print_json(&client.send(&tx.to_record()).await?)?;
        }
        Command::Mine { wallet } => {
            let wallet = WalletFile::load(wallet)?;
            let client = NodeClient::new(cli.node)?;
            println!("⛏️  Mining on {} ...", client.node_url());
            print_json(&client.mine(&wallet).await?)?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
