// Database connectivity probe.
//
// The wizard opens a short-lived connection to validate the administrator's
// input, runs a handful of capability checks, and closes it before the
// response is produced. Connections are never pooled or reused.
//
// The DbProbe trait exists so stage handlers can be tested deterministically
// without a real server.

use async_trait::async_trait;
use log::{debug, info};
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlSslMode};
use sqlx::postgres::{PgConnectOptions, PgConnection, PgSslMode};
use sqlx::Connection;
use thiserror::Error;

use super::{ConnectionParams, DbKind, TlsSettings};

/// Literal whose round-trip through the server proves IEEE 754 double
/// storage; equals `f64::MAX`.
const DOUBLE_PROBE_LITERAL: &str = "1.7976931348623157E+308";

#[derive(Debug, Error)]
pub enum ProbeError {
    /// Connection could not be established. The message is safe to show to
    /// the administrator.
    #[error("Unable to connect to the database: {message}")]
    Connect { message: String },

    #[error("Database schema \"{schema}\" does not exist")]
    SchemaMissing { schema: String },

    /// The server's character encoding cannot store the frontend's data.
    #[error("{message}")]
    Encoding { message: String },

    #[error("Database query failed: {0}")]
    Query(#[from] sqlx::Error),
}

/// Opens probe sessions against a configured database server.
#[async_trait]
pub trait DbProbe: Send + Sync {
    async fn connect(&self, params: &ConnectionParams) -> Result<Box<dyn ProbeSession>, ProbeError>;
}

/// A live, single-use validation session. Callers must `close` it before
/// producing a response.
#[async_trait]
pub trait ProbeSession: Send {
    /// Whether the named schema exists (PostgreSQL installations only).
    async fn schema_exists(&mut self, schema: &str) -> Result<bool, ProbeError>;

    /// Verify the database can store the frontend's character data (UTF-8).
    async fn check_encoding(&mut self) -> Result<(), ProbeError>;

    /// Whether the server stores floating-point values as IEEE 754 doubles.
    async fn is_double_ieee754(&mut self) -> Result<bool, ProbeError>;

    /// Persist the chosen GUI defaults into the live settings table.
    async fn update_gui_defaults(
        &mut self,
        lang: &str,
        timezone: &str,
        theme: &str,
    ) -> Result<(), ProbeError>;

    async fn close(self: Box<Self>) -> Result<(), ProbeError>;
}

/// Production probe backed by sqlx single connections.
pub struct SqlxProbe;

#[async_trait]
impl DbProbe for SqlxProbe {
    async fn connect(&self, params: &ConnectionParams) -> Result<Box<dyn ProbeSession>, ProbeError> {
        info!(
            "[PHASE: setup] [STEP: db_probe] Connecting (kind={}, host={}, port={}, database={})",
            params.kind.id(),
            params.host,
            params.effective_port(),
            params.database
        );

        let session = match params.kind {
            DbKind::MySql => {
                let opts = mysql_options(params);
                let conn = MySqlConnection::connect_with(&opts)
                    .await
                    .map_err(connect_error)?;
                SqlxSession::MySql(conn)
            }
            DbKind::PostgreSql => {
                let opts = pg_options(params);
                let conn = PgConnection::connect_with(&opts)
                    .await
                    .map_err(connect_error)?;
                SqlxSession::Postgres(conn)
            }
        };

        Ok(Box::new(session))
    }
}

fn connect_error(e: sqlx::Error) -> ProbeError {
    ProbeError::Connect {
        message: e.to_string(),
    }
}

fn mysql_options(params: &ConnectionParams) -> MySqlConnectOptions {
    let mut opts = MySqlConnectOptions::new()
        .host(&params.host)
        .port(params.effective_port())
        .database(&params.database)
        .username(&params.user)
        .password(&params.password)
        .ssl_mode(mysql_ssl_mode(&params.tls));

    // The cipher list applies to the installed runtime, not the probe.
    if params.tls.encryption {
        if !params.tls.ca_file.is_empty() {
            opts = opts.ssl_ca(&params.tls.ca_file);
        }
        if !params.tls.cert_file.is_empty() {
            opts = opts.ssl_client_cert(&params.tls.cert_file);
        }
        if !params.tls.key_file.is_empty() {
            opts = opts.ssl_client_key(&params.tls.key_file);
        }
    }

    opts
}

fn pg_options(params: &ConnectionParams) -> PgConnectOptions {
    let mut opts = PgConnectOptions::new()
        .host(&params.host)
        .port(params.effective_port())
        .database(&params.database)
        .username(&params.user)
        .password(&params.password)
        .ssl_mode(pg_ssl_mode(&params.tls));

    if params.tls.encryption {
        if !params.tls.ca_file.is_empty() {
            opts = opts.ssl_root_cert(&params.tls.ca_file);
        }
        if !params.tls.cert_file.is_empty() {
            opts = opts.ssl_client_cert(&params.tls.cert_file);
        }
        if !params.tls.key_file.is_empty() {
            opts = opts.ssl_client_key(&params.tls.key_file);
        }
    }

    opts
}

fn mysql_ssl_mode(tls: &TlsSettings) -> MySqlSslMode {
    if !tls.encryption {
        MySqlSslMode::Disabled
    } else if tls.verify_host {
        MySqlSslMode::VerifyIdentity
    } else if !tls.ca_file.is_empty() {
        MySqlSslMode::VerifyCa
    } else {
        MySqlSslMode::Required
    }
}

fn pg_ssl_mode(tls: &TlsSettings) -> PgSslMode {
    if !tls.encryption {
        PgSslMode::Disable
    } else if tls.verify_host {
        PgSslMode::VerifyFull
    } else if !tls.ca_file.is_empty() {
        PgSslMode::VerifyCa
    } else {
        PgSslMode::Require
    }
}

enum SqlxSession {
    MySql(MySqlConnection),
    Postgres(PgConnection),
}

#[async_trait]
impl ProbeSession for SqlxSession {
    async fn schema_exists(&mut self, schema: &str) -> Result<bool, ProbeError> {
        match self {
            // The schema concept being probed here is PostgreSQL's; a MySQL
            // installation never asks.
            SqlxSession::MySql(_) => Ok(true),
            SqlxSession::Postgres(conn) => {
                let row: Option<(String,)> = sqlx::query_as(
                    "SELECT schema_name::text FROM information_schema.schemata WHERE schema_name = $1",
                )
                .bind(schema)
                .fetch_optional(conn)
                .await?;
                Ok(row.is_some())
            }
        }
    }

    async fn check_encoding(&mut self) -> Result<(), ProbeError> {
        match self {
            SqlxSession::MySql(conn) => {
                let charset: Option<(String,)> = sqlx::query_as(
                    "SELECT default_character_set_name FROM information_schema.schemata \
                     WHERE schema_name = DATABASE()",
                )
                .fetch_optional(conn)
                .await?;

                match charset {
                    Some((cs,)) if cs.to_ascii_lowercase().starts_with("utf8") => Ok(()),
                    Some((cs,)) => Err(ProbeError::Encoding {
                        message: format!(
                            "Incorrect default charset for the database: \"{}\" (must be UTF-8)",
                            cs
                        ),
                    }),
                    None => Err(ProbeError::Encoding {
                        message: "Unable to determine the database default charset".to_string(),
                    }),
                }
            }
            SqlxSession::Postgres(conn) => {
                let (encoding,): (String,) = sqlx::query_as(
                    "SELECT pg_encoding_to_char(encoding) FROM pg_database \
                     WHERE datname = current_database()",
                )
                .fetch_one(conn)
                .await?;

                if encoding.eq_ignore_ascii_case("utf8") {
                    Ok(())
                } else {
                    Err(ProbeError::Encoding {
                        message: format!(
                            "Incorrect database encoding: \"{}\" (must be UTF8)",
                            encoding
                        ),
                    })
                }
            }
        }
    }

    async fn is_double_ieee754(&mut self) -> Result<bool, ProbeError> {
        let value: f64 = match self {
            SqlxSession::MySql(conn) => {
                let (v,): (f64,) =
                    sqlx::query_as(&format!("SELECT CAST('{}' AS DOUBLE)", DOUBLE_PROBE_LITERAL))
                        .fetch_one(conn)
                        .await?;
                v
            }
            SqlxSession::Postgres(conn) => {
                let (v,): (f64,) =
                    sqlx::query_as(&format!("SELECT '{}'::float8", DOUBLE_PROBE_LITERAL))
                        .fetch_one(conn)
                        .await?;
                v
            }
        };

        let is_double = value == f64::MAX;
        debug!(
            "[PHASE: setup] [STEP: db_probe] IEEE 754 double probe returned {} (is_double={})",
            value, is_double
        );
        Ok(is_double)
    }

    async fn update_gui_defaults(
        &mut self,
        lang: &str,
        timezone: &str,
        theme: &str,
    ) -> Result<(), ProbeError> {
        match self {
            SqlxSession::MySql(conn) => {
                sqlx::query(
                    "UPDATE settings SET default_lang = ?, default_timezone = ?, default_theme = ?",
                )
                .bind(lang)
                .bind(timezone)
                .bind(theme)
                .execute(conn)
                .await?;
            }
            SqlxSession::Postgres(conn) => {
                sqlx::query(
                    "UPDATE settings SET default_lang = $1, default_timezone = $2, default_theme = $3",
                )
                .bind(lang)
                .bind(timezone)
                .bind(theme)
                .execute(conn)
                .await?;
            }
        }
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), ProbeError> {
        match *self {
            SqlxSession::MySql(conn) => conn.close().await?,
            SqlxSession::Postgres(conn) => conn.close().await?,
        }
        Ok(())
    }
}
