use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::debug;

/// Field inside the secret payload that holds the webhook secret.
pub const SECRET_FIELD: &str = "webhook_secret";

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("secret fetch failed: {0}")]
    Fetch(String),
    #[error("secret payload is missing the webhook_secret field")]
    MissingField,
    #[error("secret value is empty")]
    Empty,
}

/// Capability boundary for the external secret store. The payload is a
/// JSON object carrying the webhook secret under `webhook_secret`.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn fetch(&self) -> Result<serde_json::Value>;
}

/// Fetches the webhook secret once and caches it for the process lifetime.
///
/// Concurrent first callers race on a single initialization; losers reuse
/// the winner's value, so at most one fetch is in flight at a time. A
/// failed fetch is not cached: the next caller performs one new attempt.
#[derive(Clone)]
pub struct SecretProvider {
    store: Arc<dyn SecretStore>,
    cached: Arc<OnceCell<String>>,
}

impl SecretProvider {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self {
            store,
            cached: Arc::new(OnceCell::new()),
        }
    }

    pub async fn get_secret(&self) -> Result<String, SecretError> {
        self.cached
            .get_or_try_init(|| async {
                let payload = self
                    .store
                    .fetch()
                    .await
                    .map_err(|e| SecretError::Fetch(e.to_string()))?;
                let value = payload
                    .get(SECRET_FIELD)
                    .and_then(|v| v.as_str())
                    .ok_or(SecretError::MissingField)?;
                if value.is_empty() {
                    return Err(SecretError::Empty);
                }
                Ok(value.to_string())
            })
            .await
            .cloned()
    }
}

/// Vault KV v2 response envelope for the secret fetch.
#[derive(Debug, Deserialize)]
struct VaultKvResponse {
    #[serde(default)]
    data: VaultKvData,
}

#[derive(Debug, Deserialize, Default)]
struct VaultKvData {
    #[serde(default)]
    data: serde_json::Value,
}

/// Vault-backed secret store.
#[derive(Debug, Clone)]
pub struct VaultSecretStore {
    base_url: String,
    token: String,
    secret_path: String,
    http_client: Client,
}

impl VaultSecretStore {
    /// Create a Vault secret store from environment variables.
    ///
    /// Environment variables:
    /// - `VAULT_ADDRESS`: Base URL (e.g., http://127.0.0.1:8200)
    /// - `VAULT_TOKEN`: Authentication token
    /// - `VAULT_SECRET_PATH`: KV path of the webhook secret (e.g., kv/data/mgtsvr/webhook)
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("VAULT_ADDRESS").context("VAULT_ADDRESS not set")?;
        let token = std::env::var("VAULT_TOKEN").context("VAULT_TOKEN not set")?;
        let secret_path =
            std::env::var("VAULT_SECRET_PATH").context("VAULT_SECRET_PATH not set")?;

        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("creating HTTP client")?;

        debug!("Vault secret store initialized with base_url={}", base_url);

        Ok(VaultSecretStore {
            base_url,
            token,
            secret_path,
            http_client,
        })
    }
}

#[async_trait]
impl SecretStore for VaultSecretStore {
    /// Constructs path: GET {base_url}/v1/{secret_path}
    /// Expects response: {"data":{"data":{"webhook_secret":"..."}}}
    async fn fetch(&self) -> Result<serde_json::Value> {
        let url = format!("{}/v1/{}", self.base_url, self.secret_path);

        debug!("Fetching webhook secret from Vault: {}", url);

        let response = self
            .http_client
            .get(&url)
            .header("X-Vault-Token", &self.token)
            .send()
            .await
            .context("sending Vault request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "Vault fetch failed with status {}: {}",
                status,
                body
            ));
        }

        let vault_resp: VaultKvResponse =
            response.json().await.context("parsing Vault response")?;

        Ok(vault_resp.data.data)
    }
}
