// Wizard session state.
//
// The whole state is one struct, serialized to the session store under a
// single key at request boundaries. Absent or unreadable payloads fall back
// to the defaults of a fresh installation.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::config_file::{DbConfig, FrontendConfig, ServerConfig};
use crate::db::{ConnectionParams, DbKind, TlsSettings};
use crate::session::SessionStore;

/// Session key holding the serialized wizard state.
pub const SESSION_KEY: &str = "setup_wizard";

/// Index of the terminal stage.
pub const LAST_STEP: usize = 6;

/// Preconfigured Vault endpoint offered when switching to Vault mode.
pub const VAULT_HOST_DEFAULT: &str = "https://localhost:8200";

/// Where database credentials are kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredsStorage {
    /// Plaintext in the configuration artifact.
    #[default]
    Config,
    /// Fetched from a Vault-compatible secrets store at runtime.
    Vault,
}

impl CredsStorage {
    pub fn id(self) -> &'static str {
        match self {
            CredsStorage::Config => "config",
            CredsStorage::Vault => "vault",
        }
    }

    pub fn parse(id: &str) -> Option<CredsStorage> {
        match id {
            "config" => Some(CredsStorage::Config),
            "vault" => Some(CredsStorage::Vault),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultSettings {
    pub host: String,
    pub secret_path: String,
    pub token: String,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            host: VAULT_HOST_DEFAULT.to_string(),
            secret_path: String::new(),
            token: String::new(),
        }
    }
}

impl VaultSettings {
    pub fn clear(&mut self) {
        self.host.clear();
        self.secret_path.clear();
        self.token.clear();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbSettings {
    pub kind: Option<DbKind>,
    pub server: String,
    /// 0 means "use the database's default port".
    pub port: u16,
    pub database: String,
    pub schema: String,
    pub creds_storage: CredsStorage,
    pub user: String,
    pub password: String,
    pub vault: VaultSettings,
    pub tls: TlsSettings,
    pub double_ieee754: bool,
}

impl Default for DbSettings {
    fn default() -> Self {
        Self {
            kind: None,
            server: "localhost".to_string(),
            port: 0,
            database: "opsmon".to_string(),
            schema: String::new(),
            creds_storage: CredsStorage::Config,
            user: "opsmon".to_string(),
            password: String::new(),
            vault: VaultSettings::default(),
            tls: TlsSettings::default(),
            double_ieee754: false,
        }
    }
}

/// Registration of the monitoring server the frontend talks to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub name: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 10051,
            name: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WizardState {
    pub step: usize,
    pub stage_failed: bool,
    pub retry_requested: bool,
    pub config_file_correct: bool,
    pub default_lang: String,
    pub default_timezone: String,
    pub default_theme: String,
    pub db: DbSettings,
    pub server: ServerSettings,
}

impl Default for WizardState {
    fn default() -> Self {
        Self {
            step: 0,
            stage_failed: false,
            retry_requested: false,
            config_file_correct: false,
            default_lang: crate::i18n::DEFAULT_LANG.to_string(),
            default_timezone: "system".to_string(),
            default_theme: "default".to_string(),
            db: DbSettings::default(),
            server: ServerSettings::default(),
        }
    }
}

impl WizardState {
    /// Load from the session, falling back to defaults for a fresh or
    /// unreadable session. `step` is clamped into the stage table's range.
    pub fn load(store: &dyn SessionStore) -> Self {
        let mut state = match store.get(SESSION_KEY) {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(state) => state,
                Err(e) => {
                    warn!(
                        "[PHASE: setup] [STEP: session] Discarding unreadable wizard state: {}",
                        e
                    );
                    WizardState::default()
                }
            },
            None => WizardState::default(),
        };

        if state.step > LAST_STEP {
            warn!(
                "[PHASE: setup] [STEP: session] Clamping out-of-range step {} to {}",
                state.step, LAST_STEP
            );
            state.step = LAST_STEP;
        }
        state
    }

    pub fn save(&self, store: &mut dyn SessionStore) {
        match serde_json::to_string(self) {
            Ok(raw) => store.set(SESSION_KEY, raw),
            Err(e) => warn!(
                "[PHASE: setup] [STEP: session] Failed to serialize wizard state: {}",
                e
            ),
        }
    }

    /// Switch to plaintext credentials, dropping any Vault material.
    pub fn use_config_creds(&mut self) {
        self.db.creds_storage = CredsStorage::Config;
        self.db.vault.clear();
    }

    /// Switch to Vault credentials, dropping the plaintext pair.
    pub fn use_vault_creds(&mut self) {
        self.db.creds_storage = CredsStorage::Vault;
        self.db.user.clear();
        self.db.password.clear();
        if self.db.vault.host.is_empty() {
            self.db.vault.host = VAULT_HOST_DEFAULT.to_string();
        }
    }

    /// Connection parameters for the probe, with credentials already
    /// resolved by the caller. None until a database kind is chosen.
    pub fn connection_params(&self, user: &str, password: &str) -> Option<ConnectionParams> {
        let kind = self.db.kind?;
        Some(ConnectionParams {
            kind,
            host: self.db.server.clone(),
            port: self.db.port,
            database: self.db.database.clone(),
            schema: self.db.schema.clone(),
            user: user.to_string(),
            password: password.to_string(),
            tls: self.db.tls.clone(),
        })
    }

    /// Assemble the configuration artifact document from the session state.
    pub fn frontend_config(&self) -> FrontendConfig {
        let (user, password, vault_host, vault_secret, vault_token) = match self.db.creds_storage {
            CredsStorage::Config => (
                self.db.user.clone(),
                self.db.password.clone(),
                String::new(),
                String::new(),
                String::new(),
            ),
            CredsStorage::Vault => (
                String::new(),
                String::new(),
                self.db.vault.host.clone(),
                self.db.vault.secret_path.clone(),
                self.db.vault.token.clone(),
            ),
        };

        FrontendConfig {
            db: DbConfig {
                kind: self.db.kind.map(DbKind::id).unwrap_or_default().to_string(),
                server: self.db.server.clone(),
                port: self.db.port,
                database: self.db.database.clone(),
                schema: self.db.schema.clone(),
                user,
                password,
                vault_host,
                vault_secret,
                vault_token,
                tls_encryption: self.db.tls.encryption,
                verify_host: self.db.tls.verify_host,
                key_file: self.db.tls.key_file.clone(),
                cert_file: self.db.tls.cert_file.clone(),
                ca_file: self.db.tls.ca_file.clone(),
                cipher_list: self.db.tls.cipher_list.clone(),
                double_ieee754: self.db.double_ieee754,
            },
            server: ServerConfig {
                host: self.server.host.clone(),
                port: self.server.port,
                name: self.server.name.clone(),
            },
        }
    }
}
