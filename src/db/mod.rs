// Database kinds and connection parameters.
//
// The wizard validates connectivity against one of the supported server
// kinds; the parameters collected here are what ends up in the generated
// configuration artifact.

pub mod probe;

use serde::{Deserialize, Serialize};

/// Supported database server kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbKind {
    MySql,
    PostgreSql,
}

impl DbKind {
    /// All supported kinds, in display order.
    pub fn all() -> &'static [DbKind] {
        &[DbKind::MySql, DbKind::PostgreSql]
    }

    /// Stable form/config identifier.
    pub fn id(self) -> &'static str {
        match self {
            DbKind::MySql => "mysql",
            DbKind::PostgreSql => "postgresql",
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            DbKind::MySql => "MySQL",
            DbKind::PostgreSql => "PostgreSQL",
        }
    }

    /// Port used when the configured port is 0.
    pub fn default_port(self) -> u16 {
        match self {
            DbKind::MySql => 3306,
            DbKind::PostgreSql => 5432,
        }
    }

    pub fn parse(id: &str) -> Option<DbKind> {
        DbKind::all().iter().copied().find(|k| k.id() == id)
    }

    /// Whether TLS options are offered for this kind.
    pub fn supports_tls(self) -> bool {
        matches!(self, DbKind::MySql | DbKind::PostgreSql)
    }

    /// MySQL does not allow disabling host verification once TLS is on.
    pub fn forces_verify_host(self) -> bool {
        matches!(self, DbKind::MySql)
    }

    /// The schema field only applies to PostgreSQL.
    pub fn supports_schema(self) -> bool {
        matches!(self, DbKind::PostgreSql)
    }

    /// A custom TLS cipher list is a MySQL-only option.
    pub fn supports_cipher_list(self) -> bool {
        matches!(self, DbKind::MySql)
    }
}

/// TLS options for a database connection. Detail fields are meaningful only
/// while `encryption` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsSettings {
    pub encryption: bool,
    pub verify_host: bool,
    pub key_file: String,
    pub cert_file: String,
    pub ca_file: String,
    pub cipher_list: String,
}

impl TlsSettings {
    /// Drop every detail field, keeping the settings at "TLS off".
    pub fn clear(&mut self) {
        *self = TlsSettings::default();
    }
}

/// Explicit connection parameters handed to the probe. Credentials are
/// already resolved (plaintext or Vault-sourced) by the time this exists.
#[derive(Debug, Clone)]
pub struct ConnectionParams {
    pub kind: DbKind,
    pub host: String,
    /// 0 means "use the kind's default port".
    pub port: u16,
    pub database: String,
    pub schema: String,
    pub user: String,
    pub password: String,
    pub tls: TlsSettings,
}

impl ConnectionParams {
    pub fn effective_port(&self) -> u16 {
        if self.port == 0 {
            self.kind.default_port()
        } else {
            self.port
        }
    }
}
