// Frontend configuration artifact.
//
// The terminal wizard stage serializes the collected settings into the
// runtime configuration file, or streams the same text as a download when
// the administrator installs it manually.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the generated artifact.
pub const CONFIG_FILE_NAME: &str = "opsmon.conf.toml";

/// Content type used when the artifact is offered as a download.
pub const DOWNLOAD_CONTENT_TYPE: &str = "application/toml";

/// The structured settings document. Credential fields are mode-exclusive:
/// plaintext user/password or the Vault triple, never both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrontendConfig {
    pub db: DbConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DbConfig {
    #[serde(rename = "type")]
    pub kind: String,
    pub server: String,
    /// 0 keeps the database kind's default port.
    pub port: u16,
    pub database: String,
    pub schema: String,
    pub user: String,
    pub password: String,
    pub vault_host: String,
    pub vault_secret: String,
    pub vault_token: String,
    pub tls_encryption: bool,
    pub verify_host: bool,
    pub key_file: String,
    pub cert_file: String,
    pub ca_file: String,
    pub cipher_list: String,
    pub double_ieee754: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
}

/// The artifact plus its target location on disk.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: PathBuf,
    pub config: FrontendConfig,
}

impl ConfigFile {
    pub fn new(path: PathBuf, config: FrontendConfig) -> Self {
        Self { path, config }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialized text representation, suitable for writing or download.
    pub fn get_string(&self) -> Result<String> {
        let body = toml::to_string_pretty(&self.config)
            .context("Failed to serialize the configuration document")?;
        let header = format!(
            "# Opsmon frontend configuration.\n# Generated by the setup wizard on {}.\n\n",
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
        );
        Ok(format!("{}{}", header, body))
    }

    /// Write the artifact to its target path.
    pub fn save(&self) -> Result<()> {
        let text = self.get_string()?;
        std::fs::write(&self.path, text)
            .with_context(|| format!("Cannot write configuration file \"{}\"", self.path.display()))
    }
}
