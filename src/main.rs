use std::io;

use actix_web::{App, HttpServer, web};
use dotenvy::dotenv;
use log::{error, info};

use mini_ledger::api::{self, AppState};
use mini_ledger::blockchain::{Blockchain, JsonFileStore};
use mini_ledger::config::NodeConfig;
use mini_ledger::wallet::SystemIdentity;

#[actix_web::main]
async fn main() -> io::Result<()> {
    let _ = dotenv();
    env_logger::init();

    let cfg = NodeConfig::from_env();

    let system = SystemIdentity::load(&cfg.system_wallet_path).map_err(|e| {
        error!(
            "cannot load system wallet {}: {e} (create one with `wallet create --out {}`)",
            cfg.system_wallet_path.display(),
            cfg.system_wallet_path.display()
        );
        io::Error::other(e)
    })?;
    info!("system public key {}", system.public_key());

    let blockchain = Blockchain::open(
        cfg.difficulty,
        cfg.mining_reward,
        system,
        Box::new(JsonFileStore::new(&cfg.chain_path)),
    );
    info!(
        "chain height {} at difficulty {}",
        blockchain.len(),
        blockchain.difficulty()
    );

    println!("⛓️ Starting ledger API at http://{}:{}", cfg.host, cfg.port);

    let state = web::Data::new(AppState::new(blockchain));

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(api::init_routes)
    })
    .bind((cfg.host.as_str(), cfg.port))?
    .run()
    .await
}
