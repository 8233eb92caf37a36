use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{Value, json};
use thiserror::Error;

use crate::transaction::TransactionRecord;
use crate::wallet::WalletFile;

pub const DEFAULT_NODE_URL: &str = "http://127.0.0.1:8080/api/v1";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("node returned HTTP {status}: {message}")]
    Node { status: StatusCode, message: String },
}

/// HTTP client for a ledger node's `/api/v1` routes.
///
/// No overall request timeout is set: `mine` blocks until the node has
/// finished proof-of-work.
#[derive(Debug, Clone)]
pub struct NodeClient {
    http: reqwest::Client,
    node_url: String,
}

impl NodeClient {
    /// `node_url` is the API base, e.g. `http://127.0.0.1:8080/api/v1`.
    pub fn new(node_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        let node_url = node_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, node_url })
    }

    pub fn node_url(&self) -> &str {
        &self.node_url
    }

    /// `GET /balance/{address}/`
    pub async fn balance(&self, address: &str) -> Result<Value, ClientError> {
        let response = self
            .http
            .get(format!("{}/balance/{address}/", self.node_url))
            .send()
            .await?;
        read_json(response).await
    }

    /// `POST /transactions/new/` with an already signed transaction.
    pub async fn send(&self, tx: &TransactionRecord) -> Result<Value, ClientError> {
        let response = self
            .http
            .post(format!("{}/transactions/new/", self.node_url))
            .json(tx)
            .send()
            .await?;
        read_json(response).await
    }

    /// `POST /mine/`, paying the reward to the wallet and signing the
    /// block with its key.
    pub async fn mine(&self, wallet: &WalletFile) -> Result<Value, ClientError> {
        let body = json!({ "miner": wallet.public, "private": wallet.private });
        let response = self
            .http
            .post(format!("{}/mine/", self.node_url))
            .json(&body)
            .send()
            .await?;
        read_json(response).await
    }
}

/// Decode a success body, or turn an error status into `ClientError::Node`
/// carrying the node's `error` message.
async fn read_json(response: reqwest::Response) -> Result<Value, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }
    let text = response.text().await?;
    let message = serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|body| body["error"].as_str().map(str::to_string))
        .unwrap_or(text);
    Err(ClientError::Node { status, message })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{self, AppState};
    use crate::blockchain::{Blockchain, JsonFileStore};
    use crate::transaction::Transaction;
    use crate::wallet::SystemIdentity;
    use actix_web::{App, HttpServer, web};

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = NodeClient::new("http://node:8080/api/v1/").unwrap();
        assert_eq!(client.node_url(), "http://node:8080/api/v1");
    }

    #[actix_web::test]
    async fn wallet_commands_against_running_node() {
        let dir = tempfile::tempdir().unwrap();
        let state = web::Data::new(AppState::new(Blockchain::open(
            1,
            100.0,
            SystemIdentity::generate(),
            Box::new(JsonFileStore::new(dir.path().join("chain.json"))),
        )));
        let server = HttpServer::new(move || {
            App::new()
                .app_data(state.clone())
                .configure(api::init_routes)
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .unwrap();
        let addr = server.addrs()[0];
        let server = server.run();
        let handle = server.handle();
        actix_web::rt::spawn(server);

        let client = NodeClient::new(format!("http://{addr}/api/v1")).unwrap();
        let wallet = WalletFile::generate();

        let mut broke = Transaction::new(wallet.public.clone(), "receiver", 10.0);
        broke.sign(&wallet.private).unwrap();
        match client.send(&broke.to_record()).await {
            Err(ClientError::Node { status, message }) => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert!(message.contains("insufficient funds"));
            }
            other => panic!("expected a rejection, got {other:?}"),
        }

        let mined = client.mine(&wallet).await.unwrap();
        assert_eq!(mined["block"]["index"], 1);

        let mut tx = Transaction::new(wallet.public.clone(), "receiver", 40.0);
        tx.sign(&wallet.private).unwrap();
        let sent = client.send(&tx.to_record()).await.unwrap();
        assert_eq!(sent["pending"], 1);

        let balance = client.balance(&wallet.public).await.unwrap();
        assert_eq!(balance["balance"], 100.0);

        handle.stop(true).await;
    }
}
