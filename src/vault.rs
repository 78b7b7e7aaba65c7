// Vault-compatible secrets store client.
//
// The wizard only ever reads one secret: the database credential pair. The
// endpoint, token and secret-path syntaxes are validated up front (see
// utils::validation) so no network round trip is spent on malformed input.

use async_trait::async_trait;
use log::{info, warn};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Secret key expected to hold the database user name.
pub const SECRET_KEY_USERNAME: &str = "username";
/// Secret key expected to hold the database password.
pub const SECRET_KEY_PASSWORD: &str = "password";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(12);

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Vault connection failed: {0}")]
    Request(String),

    #[error("Vault request was rejected (HTTP {0})")]
    Status(u16),

    #[error("Vault secret is malformed")]
    MalformedSecret,
}

/// Read access to a secrets store. Endpoint and token travel with every
/// call because they are wizard-session values, not process configuration.
#[async_trait]
pub trait SecretSource: Send + Sync {
    /// Fetch the secret at `path` as a flat string-to-string mapping.
    async fn load_secret(
        &self,
        endpoint: &str,
        token: &str,
        path: &str,
    ) -> Result<HashMap<String, String>, VaultError>;
}

/// HTTP client for a Vault-compatible secrets store (KV engine).
#[derive(Debug, Default)]
pub struct VaultClient;

#[async_trait]
impl SecretSource for VaultClient {
    async fn load_secret(
        &self,
        endpoint: &str,
        token: &str,
        path: &str,
    ) -> Result<HashMap<String, String>, VaultError> {
        let url = format!(
            "{}/v1/{}",
            endpoint.trim().trim_end_matches('/'),
            path.trim().trim_matches('/')
        );
        info!("[PHASE: setup] [STEP: vault] Fetching secret (url={})", url);

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| VaultError::Request(e.to_string()))?;

        let resp = client
            .get(&url)
            .header("X-Vault-Token", token.trim())
            .send()
            .await
            .map_err(|e| {
                warn!("[PHASE: setup] [STEP: vault] Request failed: {}", e);
                VaultError::Request(e.to_string())
            })?;

        let status = resp.status();
        if !status.is_success() {
            warn!(
                "[PHASE: setup] [STEP: vault] Secret fetch rejected (status={})",
                status
            );
            return Err(VaultError::Status(status.as_u16()));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|_| VaultError::MalformedSecret)?;

        extract_secret_data(&body)
    }
}

/// Pull the key/value mapping out of a Vault read response. KV engine v2
/// nests the payload under `data.data`; v1 puts it directly under `data`.
fn extract_secret_data(body: &Value) -> Result<HashMap<String, String>, VaultError> {
    let data = body.get("data").ok_or(VaultError::MalformedSecret)?;
    let object = match data.get("data") {
        Some(Value::Object(inner)) => inner,
        _ => match data {
            Value::Object(map) => map,
            _ => return Err(VaultError::MalformedSecret),
        },
    };

    let mut secret = HashMap::new();
    for (key, value) in object {
        if let Value::String(s) = value {
            secret.insert(key.clone(), s.clone());
        }
    }

    if secret.is_empty() {
        return Err(VaultError::MalformedSecret);
    }

    Ok(secret)
}
