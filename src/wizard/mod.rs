// Setup wizard controller.
//
// A session-persisted state machine over seven fixed stages. Every request
// is processed to completion: back/next navigation, the current stage's
// submit handler, then a render of the (possibly new) current stage.
// Stage-specific validation runs before the common advance check and blocks
// it by flagging the stage as failed.

pub mod request;
pub mod state;
pub mod view;

use log::{info, warn};
use std::path::{Path, PathBuf};

use crate::config_file::{ConfigFile, CONFIG_FILE_NAME, DOWNLOAD_CONTENT_TYPE};
use crate::db::probe::{DbProbe, SqlxProbe};
use crate::db::DbKind;
use crate::prereq::{worst_of, CheckResult, EnvironmentChecker, PrereqChecker};
use crate::session::SessionStore;
use crate::utils::validation;
use crate::vault::{SecretSource, VaultClient, SECRET_KEY_PASSWORD, SECRET_KEY_USERNAME};

use request::SetupRequest;
use state::{CredsStorage, WizardState, VAULT_HOST_DEFAULT};
use view::{
    mask_every_char, themes, timezones, ConfigDownload, FormField, MessageBox, SelectOption,
    SidebarEntry, StageView, ViewRow, WizardResponse, TIMEZONE_SYSTEM,
};

/// The seven wizard stages, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Welcome,
    Prerequisites,
    DbConnection,
    ServerDetails,
    GuiSettings,
    Summary,
    Install,
}

pub struct StageDescriptor {
    pub stage: Stage,
    pub title: &'static str,
}

/// Fixed stage table; the step index is the position in this array.
pub const STAGES: [StageDescriptor; 7] = [
    StageDescriptor { stage: Stage::Welcome, title: "Welcome" },
    StageDescriptor { stage: Stage::Prerequisites, title: "Check of pre-requisites" },
    StageDescriptor { stage: Stage::DbConnection, title: "Configure DB connection" },
    StageDescriptor { stage: Stage::ServerDetails, title: "Opsmon server details" },
    StageDescriptor { stage: Stage::GuiSettings, title: "GUI settings" },
    StageDescriptor { stage: Stage::Summary, title: "Pre-installation summary" },
    StageDescriptor { stage: Stage::Install, title: "Install" },
];

pub struct SetupWizard {
    prereq: Box<dyn PrereqChecker>,
    probe: Box<dyn DbProbe>,
    secrets: Box<dyn SecretSource>,
    config_path: PathBuf,
}

impl SetupWizard {
    /// Production wiring: environment prerequisite checks, sqlx probe and
    /// the HTTP Vault client, with the artifact written into `config_dir`.
    pub fn new(config_dir: &Path) -> Self {
        Self {
            prereq: Box::new(EnvironmentChecker::new(config_dir.to_path_buf())),
            probe: Box::new(SqlxProbe),
            secrets: Box::new(VaultClient),
            config_path: config_dir.join(CONFIG_FILE_NAME),
        }
    }

    pub fn with_collaborators(
        prereq: Box<dyn PrereqChecker>,
        probe: Box<dyn DbProbe>,
        secrets: Box<dyn SecretSource>,
        config_path: PathBuf,
    ) -> Self {
        Self {
            prereq,
            probe,
            secrets,
            config_path,
        }
    }

    /// Process one form submission and produce the response for it.
    pub async fn handle(
        &self,
        store: &mut dyn SessionStore,
        req: &SetupRequest,
    ) -> WizardResponse {
        let mut state = WizardState::load(store);
        state.stage_failed = false;
        state.retry_requested = false;

        let mut errors: Vec<String> = Vec::new();
        let mut next_consumed = false;

        if req.back_pressed(state.step) {
            self.do_back(&mut state);
        }

        match STAGES[state.step].stage {
            Stage::Welcome => {
                if let Some(lang) = &req.default_lang {
                    state.default_lang = lang.clone();
                }
            }
            Stage::Prerequisites => {
                if req.next_pressed(1) {
                    next_consumed = true;
                    let requirements = self.prereq.check_requirements();
                    if worst_of(&requirements) == CheckResult::Fatal {
                        warn!(
                            "[PHASE: setup] [STEP: prereq] Fatal pre-requisite check, not advancing"
                        );
                        state.stage_failed = true;
                    } else {
                        self.do_next(&mut state);
                    }
                }
            }
            Stage::DbConnection => {
                collect_db_fields(&mut state, req);
                if req.next_pressed(2) {
                    next_consumed = true;
                    if self.try_db_connection(&mut state, &mut errors).await {
                        self.do_next(&mut state);
                    } else {
                        state.stage_failed = true;
                    }
                }
            }
            Stage::ServerDetails => {
                if let Some(host) = &req.monitor_server {
                    state.server.host = host.clone();
                }
                if let Some(port) = req.monitor_server_port {
                    state.server.port = port;
                }
                if let Some(name) = &req.monitor_server_name {
                    state.server.name = name.clone();
                }
            }
            Stage::GuiSettings => {
                if let Some(tz) = &req.default_timezone {
                    state.default_timezone = tz.clone();
                }
                if let Some(theme) = &req.default_theme {
                    state.default_theme = theme.clone();
                }
            }
            Stage::Summary => {}
            Stage::Install => {
                if req.save_config {
                    match self.build_download(&state) {
                        Ok(download) => {
                            state.save(store);
                            return WizardResponse::Download(download);
                        }
                        Err(e) => {
                            warn!(
                                "[PHASE: setup] [STEP: download] Failed to serialize artifact: {}",
                                e
                            );
                            errors.push(e.to_string());
                            state.stage_failed = true;
                        }
                    }
                }
            }
        }

        if !next_consumed && req.next_pressed(state.step) {
            self.do_next(&mut state);
        }

        let view = match STAGES[state.step].stage {
            Stage::Install => self.render_install(&mut state, errors).await,
            _ => self.render_stage(&state, errors),
        };

        state.save(store);
        WizardResponse::Page(view)
    }

    fn do_next(&self, state: &mut WizardState) -> bool {
        if state.step + 1 < STAGES.len() {
            state.step += 1;
            true
        } else {
            false
        }
    }

    fn do_back(&self, state: &mut WizardState) -> bool {
        if state.step > 0 {
            state.step -= 1;
            true
        } else {
            false
        }
    }

    /// Resolve the database credential pair for the active storage mode.
    /// Vault mode validates the endpoint/token/path syntax before touching
    /// the network and requires the secret to carry both expected keys.
    async fn resolve_credentials(&self, state: &WizardState) -> Result<(String, String), String> {
        match state.db.creds_storage {
            CredsStorage::Config => Ok((state.db.user.clone(), state.db.password.clone())),
            CredsStorage::Vault => {
                validation::validate_vault_endpoint(&state.db.vault.host)
                    .map_err(|e| e.to_string())?;
                validation::validate_vault_token(&state.db.vault.token)
                    .map_err(|e| e.to_string())?;
                validation::validate_vault_secret_path(&state.db.vault.secret_path)
                    .map_err(|e| e.to_string())?;

                let secret = self
                    .secrets
                    .load_secret(
                        &state.db.vault.host,
                        &state.db.vault.token,
                        &state.db.vault.secret_path,
                    )
                    .await
                    .map_err(|e| e.to_string())?;

                match (
                    secret.get(SECRET_KEY_USERNAME),
                    secret.get(SECRET_KEY_PASSWORD),
                ) {
                    (Some(user), Some(password)) => Ok((user.clone(), password.clone())),
                    _ => Err(format!(
                        "The user name and password must be stored in Vault secret keys \"{}\" and \"{}\".",
                        SECRET_KEY_USERNAME, SECRET_KEY_PASSWORD
                    )),
                }
            }
        }
    }

    /// Stage-2 connectivity check. Returns true when every probe passed and
    /// the wizard may advance; failure reasons accumulate in `errors`.
    async fn try_db_connection(&self, state: &mut WizardState, errors: &mut Vec<String>) -> bool {
        let (user, password) = match self.resolve_credentials(state).await {
            Ok(creds) => creds,
            Err(e) => {
                errors.push(e);
                return false;
            }
        };

        let Some(params) = state.connection_params(&user, &password) else {
            errors.push("Database type is not selected.".to_string());
            return false;
        };

        let mut session = match self.probe.connect(&params).await {
            Ok(session) => session,
            Err(e) => {
                errors.push(e.to_string());
                return false;
            }
        };

        let mut ok = true;

        if params.kind.supports_schema() && !params.schema.is_empty() {
            match session.schema_exists(&params.schema).await {
                Ok(true) => {}
                Ok(false) => {
                    errors.push(format!(
                        "Database schema \"{}\" does not exist.",
                        params.schema
                    ));
                    ok = false;
                }
                Err(e) => {
                    errors.push(e.to_string());
                    ok = false;
                }
            }
        }

        if ok {
            if let Err(e) = session.check_encoding().await {
                errors.push(e.to_string());
                ok = false;
            }
        }

        if ok {
            match session.is_double_ieee754().await {
                Ok(double) => state.db.double_ieee754 = double,
                Err(e) => {
                    errors.push(e.to_string());
                    ok = false;
                }
            }
        }

        // The probe is scoped to this request; close before responding.
        if let Err(e) = session.close().await {
            warn!("[PHASE: setup] [STEP: db_probe] Failed to close probe connection: {}", e);
        }

        info!(
            "[PHASE: setup] [STEP: db_probe] Connectivity check finished (ok={})",
            ok
        );
        ok
    }

    fn build_download(&self, state: &WizardState) -> anyhow::Result<ConfigDownload> {
        let file = ConfigFile::new(self.config_path.clone(), state.frontend_config());
        Ok(ConfigDownload {
            content_type: DOWNLOAD_CONTENT_TYPE.to_string(),
            filename: CONFIG_FILE_NAME.to_string(),
            body: file.get_string()?,
        })
    }

    // ---------------------------------------------------------------------
    // Stage rendering
    // ---------------------------------------------------------------------

    fn chrome(
        &self,
        state: &WizardState,
        intro: Option<String>,
        body: Vec<ViewRow>,
        message: Option<MessageBox>,
    ) -> StageView {
        let has_next = state.step + 1 < STAGES.len();
        let next_label = if has_next {
            "Next step"
        } else if state.retry_requested {
            "Retry"
        } else {
            "Finish"
        };

        StageView {
            step: state.step,
            title: STAGES[state.step].title.to_string(),
            intro,
            sidebar: STAGES
                .iter()
                .enumerate()
                .map(|(i, d)| SidebarEntry {
                    title: d.title.to_string(),
                    reached: i <= state.step,
                })
                .collect(),
            body,
            message,
            next_label: next_label.to_string(),
            back_enabled: state.step > 0 && !state.config_file_correct,
            cancel_enabled: !state.config_file_correct,
        }
    }

    fn render_stage(&self, state: &WizardState, errors: Vec<String>) -> StageView {
        match STAGES[state.step].stage {
            Stage::Welcome => self.render_welcome(state),
            Stage::Prerequisites => self.render_prerequisites(state),
            Stage::DbConnection => self.render_db_connection(state, errors),
            Stage::ServerDetails => self.render_server_details(state),
            Stage::GuiSettings => self.render_gui_settings(state),
            Stage::Summary => self.render_summary(state),
            // Reached only through render_install.
            Stage::Install => self.chrome(state, None, Vec::new(), None),
        }
    }

    fn render_welcome(&self, state: &WizardState) -> StageView {
        let mut body = vec![ViewRow::Heading {
            text: format!("Welcome to Opsmon {}", short_version()),
        }];

        let options = crate::i18n::locales()
            .iter()
            .map(|locale| {
                let option = SelectOption::new(locale.id, locale.name);
                if locale.available {
                    option
                } else {
                    option.disabled()
                }
            })
            .collect();

        let mut field = FormField::select(
            "default_lang",
            "Default language",
            state.default_lang.clone(),
            options,
        );
        if !crate::i18n::all_available() {
            field = field.hint(
                "You are not able to choose some of the languages, because locales for them are not installed on the web server.",
            );
        }
        body.push(ViewRow::Field(field));

        self.chrome(state, None, body, None)
    }

    fn render_prerequisites(&self, state: &WizardState) -> StageView {
        let requirements = self.prereq.check_requirements();

        let message = if worst_of(&requirements) == CheckResult::Fatal {
            Some(MessageBox {
                title: None,
                errors: requirements
                    .iter()
                    .filter(|r| r.result == CheckResult::Fatal)
                    .filter_map(|r| r.error.clone())
                    .collect(),
            })
        } else {
            None
        };

        let body = requirements.into_iter().map(ViewRow::Requirement).collect();
        self.chrome(state, None, body, message)
    }

    fn render_db_connection(&self, state: &WizardState, errors: Vec<String>) -> StageView {
        let kind = state.db.kind;
        let mut body = Vec::new();

        body.push(ViewRow::Field(FormField::select(
            "type",
            "Database type",
            kind.map(DbKind::id).unwrap_or_default(),
            DbKind::all()
                .iter()
                .map(|k| SelectOption::new(k.id(), k.label()))
                .collect(),
        )));
        body.push(ViewRow::Field(FormField::text(
            "server",
            "Database host",
            state.db.server.clone(),
        )));
        body.push(ViewRow::Field(
            FormField::number("port", "Database port", state.db.port).hint("0 - use default port"),
        ));
        body.push(ViewRow::Field(FormField::text(
            "database",
            "Database name",
            state.db.database.clone(),
        )));

        if kind.map_or(false, DbKind::supports_schema) {
            body.push(ViewRow::Field(FormField::text(
                "schema",
                "Database schema",
                state.db.schema.clone(),
            )));
        }

        body.push(ViewRow::Field(FormField::radio(
            "creds_storage",
            "Store credentials in",
            state.db.creds_storage.id(),
            vec![
                SelectOption::new(CredsStorage::Config.id(), "Plain text"),
                SelectOption::new(CredsStorage::Vault.id(), "Vault"),
            ],
        )));

        match state.db.creds_storage {
            CredsStorage::Vault => {
                let host = if state.db.vault.host.is_empty() {
                    VAULT_HOST_DEFAULT.to_string()
                } else {
                    state.db.vault.host.clone()
                };
                body.push(ViewRow::Field(FormField::text(
                    "vault_host",
                    "Vault API endpoint",
                    host,
                )));
                body.push(ViewRow::Field(
                    FormField::text(
                        "vault_secret",
                        "Vault secret path",
                        state.db.vault.secret_path.clone(),
                    )
                    .hint("path/to/secret"),
                ));
                body.push(ViewRow::Field(FormField::text(
                    "vault_token",
                    "Vault authentication token",
                    state.db.vault.token.clone(),
                )));
            }
            CredsStorage::Config => {
                body.push(ViewRow::Field(FormField::text(
                    "user",
                    "User",
                    state.db.user.clone(),
                )));
                body.push(ViewRow::Field(FormField::password(
                    "password",
                    "Password",
                    state.db.password.clone(),
                )));
            }
        }

        let show_tls = kind.map_or(true, DbKind::supports_tls);
        if show_tls {
            body.push(ViewRow::Field(FormField::checkbox(
                "tls_encryption",
                "TLS encryption",
                state.db.tls.encryption,
            )));
        }

        if show_tls && state.db.tls.encryption {
            body.push(ViewRow::Field(FormField::text(
                "key_file",
                "TLS key file",
                state.db.tls.key_file.clone(),
            )));
            body.push(ViewRow::Field(FormField::text(
                "cert_file",
                "TLS certificate file",
                state.db.tls.cert_file.clone(),
            )));
            body.push(ViewRow::Field(FormField::text(
                "ca_file",
                "TLS certificate authority file",
                state.db.tls.ca_file.clone(),
            )));

            let mut verify = FormField::checkbox(
                "verify_host",
                "With host verification",
                state.db.tls.verify_host,
            );
            if kind.map_or(false, DbKind::forces_verify_host) {
                verify = verify.read_only();
            }
            body.push(ViewRow::Field(verify));

            if kind.map_or(false, DbKind::supports_cipher_list) {
                body.push(ViewRow::Field(FormField::text(
                    "cipher_list",
                    "TLS cipher list",
                    state.db.tls.cipher_list.clone(),
                )));
            }
        }

        let message = if state.stage_failed {
            Some(MessageBox {
                title: Some("Cannot connect to the database.".to_string()),
                errors,
            })
        } else {
            None
        };

        self.chrome(
            state,
            Some(
                "Please create the database manually, and set the configuration parameters for \
                 connection to this database. Press \"Next step\" when done."
                    .to_string(),
            ),
            body,
            message,
        )
    }

    fn render_server_details(&self, state: &WizardState) -> StageView {
        let body = vec![
            ViewRow::Field(FormField::text(
                "monitor_server",
                "Host",
                state.server.host.clone(),
            )),
            ViewRow::Field(FormField::number(
                "monitor_server_port",
                "Port",
                state.server.port,
            )),
            ViewRow::Field(FormField::text(
                "monitor_server_name",
                "Name",
                state.server.name.clone(),
            )),
        ];

        self.chrome(
            state,
            Some(
                "Please enter the host name or host IP address and port number of the Opsmon \
                 server, as well as the name of the installation (optional)."
                    .to_string(),
            ),
            body,
            None,
        )
    }

    fn render_gui_settings(&self, state: &WizardState) -> StageView {
        let mut timezone_options = vec![SelectOption::new(TIMEZONE_SYSTEM, "System")];
        timezone_options.extend(timezones().iter().map(|tz| SelectOption::new(*tz, *tz)));

        let body = vec![
            ViewRow::Field(FormField::select(
                "default_timezone",
                "Default time zone",
                state.default_timezone.clone(),
                timezone_options,
            )),
            ViewRow::Field(FormField::select(
                "default_theme",
                "Default theme",
                state.default_theme.clone(),
                themes()
                    .iter()
                    .map(|(id, label)| SelectOption::new(*id, *label))
                    .collect(),
            )),
        ];

        self.chrome(state, None, body, None)
    }

    fn render_summary(&self, state: &WizardState) -> StageView {
        let kind = state.db.kind;
        let mut body = Vec::new();

        let summary = |label: &str, value: String| ViewRow::Summary {
            label: label.to_string(),
            value,
        };

        body.push(summary(
            "Database type",
            kind.map(DbKind::label).unwrap_or_default().to_string(),
        ));
        body.push(summary("Database server", state.db.server.clone()));
        body.push(summary(
            "Database port",
            if state.db.port == 0 {
                "default".to_string()
            } else {
                state.db.port.to_string()
            },
        ));
        body.push(summary("Database name", state.db.database.clone()));

        match state.db.creds_storage {
            CredsStorage::Config => {
                body.push(summary("Database user", state.db.user.clone()));
                body.push(summary(
                    "Database password",
                    mask_every_char(&state.db.password),
                ));
            }
            CredsStorage::Vault => {
                body.push(summary("Vault API endpoint", state.db.vault.host.clone()));
                body.push(summary(
                    "Vault secret path",
                    state.db.vault.secret_path.clone(),
                ));
                body.push(summary(
                    "Vault authentication token",
                    mask_every_char(&state.db.vault.token),
                ));
            }
        }

        if kind.map_or(false, DbKind::supports_schema) {
            body.push(summary("Database schema", state.db.schema.clone()));
        }

        body.push(summary(
            "TLS encryption",
            state.db.tls.encryption.to_string(),
        ));
        if state.db.tls.encryption {
            body.push(summary("TLS key file", state.db.tls.key_file.clone()));
            body.push(summary("TLS certificate file", state.db.tls.cert_file.clone()));
            body.push(summary(
                "TLS certificate authority file",
                state.db.tls.ca_file.clone(),
            ));
            body.push(summary(
                "With host verification",
                state.db.tls.verify_host.to_string(),
            ));
            if kind.map_or(false, DbKind::supports_cipher_list) {
                body.push(summary("TLS cipher list", state.db.tls.cipher_list.clone()));
            }
        }

        body.push(summary("Opsmon server", state.server.host.clone()));
        body.push(summary("Opsmon server port", state.server.port.to_string()));
        body.push(summary("Opsmon server name", state.server.name.clone()));

        body.push(summary("Default language", state.default_lang.clone()));
        body.push(summary("Default time zone", state.default_timezone.clone()));
        body.push(summary("Default theme", state.default_theme.clone()));

        self.chrome(
            state,
            Some(
                "Please check configuration parameters. If all is correct, press \"Next step\" \
                 button, or \"Back\" button to change configuration parameters."
                    .to_string(),
            ),
            body,
            None,
        )
    }

    /// Terminal stage: persist GUI defaults into the live database and write
    /// the configuration artifact. Every failure is recovered into the view.
    async fn render_install(&self, state: &mut WizardState, mut errors: Vec<String>) -> StageView {
        info!("[PHASE: setup] [STEP: install] Finalizing installation");

        if let Err(e) = self.apply_gui_defaults(state).await {
            errors.push(e);
            state.stage_failed = true;
            let message = MessageBox {
                title: Some("Cannot complete the installation.".to_string()),
                errors,
            };
            return self.chrome(state, None, Vec::new(), Some(message));
        }

        let file = ConfigFile::new(self.config_path.clone(), state.frontend_config());
        match file.save() {
            Ok(()) => {
                state.config_file_correct = true;
                info!(
                    "[PHASE: setup] [STEP: install] Configuration file written ({})",
                    self.config_path.display()
                );
                let body = vec![
                    ViewRow::Heading {
                        text: "Congratulations! You have successfully installed the Opsmon frontend."
                            .to_string(),
                    },
                    ViewRow::Paragraph {
                        text: format!(
                            "Configuration file \"{}\" created.",
                            self.config_path.display()
                        ),
                    },
                ];
                self.chrome(state, None, body, None)
            }
            Err(e) => {
                warn!(
                    "[PHASE: setup] [STEP: install] Failed to write configuration file: {:#}",
                    e
                );
                state.retry_requested = true;
                state.config_file_correct = false;
                errors.push(format!("{:#}", e));

                let body = vec![
                    ViewRow::Paragraph {
                        text: "Alternatively, you can install it manually:".to_string(),
                    },
                    ViewRow::Instructions {
                        items: vec![
                            "Download the configuration file.".to_string(),
                            format!("Save it as \"{}\".", self.config_path.display()),
                        ],
                    },
                ];
                let message = MessageBox {
                    title: Some("Cannot create the configuration file.".to_string()),
                    errors,
                };
                self.chrome(state, None, body, Some(message))
            }
        }
    }

    /// Connect with freshly-resolved credentials, persist the chosen GUI
    /// defaults, and close the connection.
    async fn apply_gui_defaults(&self, state: &WizardState) -> Result<(), String> {
        let (user, password) = self.resolve_credentials(state).await?;

        let Some(params) = state.connection_params(&user, &password) else {
            return Err("Database type is not selected.".to_string());
        };

        let mut session = self
            .probe
            .connect(&params)
            .await
            .map_err(|e| e.to_string())?;

        let result = session
            .update_gui_defaults(
                &state.default_lang,
                &state.default_timezone,
                &state.default_theme,
            )
            .await
            .map_err(|e| e.to_string());

        if let Err(e) = session.close().await {
            warn!("[PHASE: setup] [STEP: install] Failed to close probe connection: {}", e);
        }

        result
    }
}

/// `major.minor` of the product version shown on the welcome stage.
fn short_version() -> String {
    let version = env!("CARGO_PKG_VERSION");
    let mut parts = version.split('.');
    match (parts.next(), parts.next()) {
        (Some(major), Some(minor)) => format!("{}.{}", major, minor),
        _ => version.to_string(),
    }
}

/// Store the posted stage-2 fields into the session state, enforcing the
/// mode exclusivity rules (credential storage, TLS details).
fn collect_db_fields(state: &mut WizardState, req: &SetupRequest) {
    if let Some(id) = &req.db_type {
        if let Some(kind) = DbKind::parse(id) {
            state.db.kind = Some(kind);
        }
    }
    if let Some(server) = &req.server {
        state.db.server = server.clone();
    }
    if let Some(port) = req.port {
        state.db.port = port;
    }
    if let Some(database) = &req.database {
        state.db.database = database.clone();
    }
    if let Some(schema) = &req.schema {
        state.db.schema = schema.clone();
    }

    if let Some(encryption) = req.tls_encryption {
        state.db.tls.encryption = encryption;
    }
    let tls_applicable = state.db.kind.map_or(true, DbKind::supports_tls) && state.db.tls.encryption;
    if tls_applicable {
        if let Some(verify) = req.verify_host {
            state.db.tls.verify_host = verify;
        }
        if state.db.kind.map_or(false, DbKind::forces_verify_host) {
            state.db.tls.verify_host = true;
        }
        if let Some(key_file) = &req.key_file {
            state.db.tls.key_file = key_file.clone();
        }
        if let Some(cert_file) = &req.cert_file {
            state.db.tls.cert_file = cert_file.clone();
        }
        if let Some(ca_file) = &req.ca_file {
            state.db.tls.ca_file = ca_file.clone();
        }
        if state.db.kind.map_or(false, DbKind::supports_cipher_list) {
            if let Some(cipher_list) = &req.cipher_list {
                state.db.tls.cipher_list = cipher_list.clone();
            }
        } else {
            state.db.tls.cipher_list.clear();
        }
    } else {
        state.db.tls.clear();
    }

    let mode = req
        .creds_storage
        .as_deref()
        .and_then(CredsStorage::parse)
        .unwrap_or(state.db.creds_storage);

    match mode {
        CredsStorage::Config => {
            state.use_config_creds();
            if let Some(user) = &req.user {
                state.db.user = user.clone();
            }
            if let Some(password) = &req.password {
                state.db.password = password.clone();
            }
        }
        CredsStorage::Vault => {
            state.use_vault_creds();
            if let Some(host) = &req.vault_host {
                if !host.is_empty() {
                    state.db.vault.host = host.clone();
                }
            }
            if let Some(secret_path) = &req.vault_secret {
                state.db.vault.secret_path = secret_path.clone();
            }
            if let Some(token) = &req.vault_token {
                state.db.vault.token = token.clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::probe::{ProbeError, ProbeSession};
    use crate::db::ConnectionParams;
    use crate::prereq::Requirement;
    use crate::session::MemorySessionStore;
    use crate::vault::VaultError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    // -------------------------------------------------------------------------
    // Stub collaborators
    // -------------------------------------------------------------------------

    struct StaticChecker(Vec<Requirement>);

    impl PrereqChecker for StaticChecker {
        fn check_requirements(&self) -> Vec<Requirement> {
            self.0.clone()
        }
    }

    #[derive(Clone)]
    struct StubProbe {
        connect_error: Option<String>,
        schema_exists: bool,
        encoding_error: Option<String>,
        double_ieee754: bool,
        update_error: Option<String>,
        connects: Arc<AtomicU32>,
        updates: Arc<AtomicU32>,
        closes: Arc<AtomicU32>,
    }

    impl StubProbe {
        fn ok() -> Self {
            Self {
                connect_error: None,
                schema_exists: true,
                encoding_error: None,
                double_ieee754: true,
                update_error: None,
                connects: Arc::new(AtomicU32::new(0)),
                updates: Arc::new(AtomicU32::new(0)),
                closes: Arc::new(AtomicU32::new(0)),
            }
        }

        fn refusing(message: &str) -> Self {
            Self {
                connect_error: Some(message.to_string()),
                ..Self::ok()
            }
        }
    }

    #[async_trait]
    impl DbProbe for StubProbe {
        async fn connect(
            &self,
            _params: &ConnectionParams,
        ) -> Result<Box<dyn ProbeSession>, ProbeError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if let Some(message) = &self.connect_error {
                return Err(ProbeError::Connect {
                    message: message.clone(),
                });
            }
            Ok(Box::new(StubSession {
                probe: self.clone(),
            }))
        }
    }

    struct StubSession {
        probe: StubProbe,
    }

    #[async_trait]
    impl ProbeSession for StubSession {
        async fn schema_exists(&mut self, _schema: &str) -> Result<bool, ProbeError> {
            Ok(self.probe.schema_exists)
        }

        async fn check_encoding(&mut self) -> Result<(), ProbeError> {
            match &self.probe.encoding_error {
                Some(message) => Err(ProbeError::Encoding {
                    message: message.clone(),
                }),
                None => Ok(()),
            }
        }

        async fn is_double_ieee754(&mut self) -> Result<bool, ProbeError> {
            Ok(self.probe.double_ieee754)
        }

        async fn update_gui_defaults(
            &mut self,
            _lang: &str,
            _timezone: &str,
            _theme: &str,
        ) -> Result<(), ProbeError> {
            self.probe.updates.fetch_add(1, Ordering::SeqCst);
            match &self.probe.update_error {
                Some(message) => Err(ProbeError::Connect {
                    message: message.clone(),
                }),
                None => Ok(()),
            }
        }

        async fn close(self: Box<Self>) -> Result<(), ProbeError> {
            self.probe.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct StubSecrets {
        secret: Option<HashMap<String, String>>,
        calls: Arc<AtomicU32>,
    }

    impl StubSecrets {
        fn with_credentials() -> Self {
            let mut secret = HashMap::new();
            secret.insert(SECRET_KEY_USERNAME.to_string(), "vault-user".to_string());
            secret.insert(SECRET_KEY_PASSWORD.to_string(), "vault-pass".to_string());
            Self {
                secret: Some(secret),
                calls: Arc::new(AtomicU32::new(0)),
            }
        }

        fn unreachable_store() -> Self {
            Self {
                secret: None,
                calls: Arc::new(AtomicU32::new(0)),
            }
        }

        fn missing_keys() -> Self {
            let mut secret = HashMap::new();
            secret.insert("login".to_string(), "vault-user".to_string());
            Self {
                secret: Some(secret),
                calls: Arc::new(AtomicU32::new(0)),
            }
        }
    }

    #[async_trait]
    impl crate::vault::SecretSource for StubSecrets {
        async fn load_secret(
            &self,
            _endpoint: &str,
            _token: &str,
            _path: &str,
        ) -> Result<HashMap<String, String>, VaultError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.secret {
                Some(secret) => Ok(secret.clone()),
                None => Err(VaultError::Request("connection refused".to_string())),
            }
        }
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    fn ok_requirements() -> Vec<Requirement> {
        vec![Requirement::ok("Operating system", "linux x86_64")]
    }

    fn build_wizard(
        probe: StubProbe,
        secrets: StubSecrets,
        requirements: Vec<Requirement>,
        config_path: PathBuf,
    ) -> SetupWizard {
        SetupWizard::with_collaborators(
            Box::new(StaticChecker(requirements)),
            Box::new(probe),
            Box::new(secrets),
            config_path,
        )
    }

    fn default_wizard() -> SetupWizard {
        build_wizard(
            StubProbe::ok(),
            StubSecrets::with_credentials(),
            ok_requirements(),
            PathBuf::from("/tmp/opsmon-test-unused.toml"),
        )
    }

    fn next_req(step: usize) -> SetupRequest {
        let mut req = SetupRequest::default();
        req.next.insert(step, "Next step".to_string());
        req
    }

    fn back_req(step: usize) -> SetupRequest {
        let mut req = SetupRequest::default();
        req.back.insert(step, "Back".to_string());
        req
    }

    fn seeded_store(state: &WizardState) -> MemorySessionStore {
        let mut store = MemorySessionStore::new();
        state.save(&mut store);
        store
    }

    fn state_at_step2_mysql() -> WizardState {
        let mut state = WizardState::default();
        state.step = 2;
        state.db.kind = Some(DbKind::MySql);
        state.db.user = "admin".to_string();
        state.db.password = "hunter2".to_string();
        state
    }

    fn summary_value(page: &StageView, label: &str) -> Option<String> {
        page.body.iter().find_map(|row| match row {
            ViewRow::Summary { label: l, value } if l == label => Some(value.clone()),
            _ => None,
        })
    }

    // -------------------------------------------------------------------------
    // Navigation
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn fresh_request_renders_welcome() {
        let wizard = default_wizard();
        let mut store = MemorySessionStore::new();

        let resp = wizard.handle(&mut store, &SetupRequest::default()).await;
        let page = resp.as_page().unwrap();

        assert_eq!(page.step, 0);
        assert_eq!(page.title, "Welcome");
        assert_eq!(page.sidebar.len(), STAGES.len());
        assert!(!page.back_enabled);
        assert_eq!(page.next_label, "Next step");
        assert!(page.sidebar[0].reached);
        assert!(!page.sidebar[1].reached);
    }

    #[test]
    fn step_never_leaves_the_stage_table() {
        let wizard = default_wizard();
        let mut state = WizardState::default();

        assert!(!wizard.do_back(&mut state));
        assert_eq!(state.step, 0);

        for expected in 1..STAGES.len() {
            assert!(wizard.do_next(&mut state));
            assert_eq!(state.step, expected);
        }

        assert!(!wizard.do_next(&mut state));
        assert_eq!(state.step, 6);

        assert!(wizard.do_back(&mut state));
        assert_eq!(state.step, 5);
    }

    #[tokio::test]
    async fn next_advances_and_back_returns() {
        let wizard = default_wizard();
        let mut store = MemorySessionStore::new();

        let resp = wizard.handle(&mut store, &next_req(0)).await;
        assert_eq!(resp.as_page().unwrap().step, 1);

        let resp = wizard.handle(&mut store, &back_req(1)).await;
        let page = resp.as_page().unwrap();
        assert_eq!(page.step, 0);
        assert!(!page.back_enabled);
    }

    #[tokio::test]
    async fn stale_next_key_does_not_advance() {
        let wizard = default_wizard();
        let mut state = WizardState::default();
        state.step = 3;
        let mut store = seeded_store(&state);

        let resp = wizard.handle(&mut store, &next_req(2)).await;
        assert_eq!(resp.as_page().unwrap().step, 3);
    }

    // -------------------------------------------------------------------------
    // Stage 1: pre-requisites
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn fatal_prerequisite_blocks_advancement() {
        let requirements = vec![
            Requirement::ok("Operating system", "linux x86_64"),
            Requirement::fatal(
                "Configuration directory",
                "/etc/opsmon",
                None,
                "Configuration directory \"/etc/opsmon\" is not writable: permission denied",
            ),
        ];
        let wizard = build_wizard(
            StubProbe::ok(),
            StubSecrets::with_credentials(),
            requirements,
            PathBuf::from("/tmp/unused.toml"),
        );

        let mut state = WizardState::default();
        state.step = 1;
        let mut store = seeded_store(&state);

        let resp = wizard.handle(&mut store, &next_req(1)).await;
        let page = resp.as_page().unwrap();

        assert_eq!(page.step, 1);
        let message = page.message.as_ref().unwrap();
        assert!(message.errors[0].contains("not writable"));
        assert!(WizardState::load(&store).stage_failed);
    }

    #[tokio::test]
    async fn warnings_do_not_block_advancement() {
        let requirements = vec![
            Requirement::ok("Operating system", "linux x86_64"),
            Requirement::warning("Available memory", "96 MB", Some("128 MB".to_string()), "low"),
        ];
        let wizard = build_wizard(
            StubProbe::ok(),
            StubSecrets::with_credentials(),
            requirements,
            PathBuf::from("/tmp/unused.toml"),
        );

        let mut state = WizardState::default();
        state.step = 1;
        let mut store = seeded_store(&state);

        let resp = wizard.handle(&mut store, &next_req(1)).await;
        assert_eq!(resp.as_page().unwrap().step, 2);
        assert!(!WizardState::load(&store).stage_failed);
    }

    // -------------------------------------------------------------------------
    // Stage 2: database connection
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn switching_modes_clears_the_other_modes_fields() {
        let wizard = default_wizard();
        let mut store = seeded_store(&state_at_step2_mysql());

        let mut req = SetupRequest::default();
        req.creds_storage = Some("vault".to_string());
        req.vault_secret = Some("secret/opsmon/db".to_string());
        req.vault_token = Some("tok-1".to_string());
        wizard.handle(&mut store, &req).await;

        let state = WizardState::load(&store);
        assert_eq!(state.db.creds_storage, CredsStorage::Vault);
        assert!(state.db.user.is_empty());
        assert!(state.db.password.is_empty());
        assert_eq!(state.db.vault.secret_path, "secret/opsmon/db");

        let mut req = SetupRequest::default();
        req.creds_storage = Some("config".to_string());
        req.user = Some("admin".to_string());
        req.password = Some("hunter2".to_string());
        wizard.handle(&mut store, &req).await;

        let state = WizardState::load(&store);
        assert_eq!(state.db.creds_storage, CredsStorage::Config);
        assert!(state.db.vault.host.is_empty());
        assert!(state.db.vault.secret_path.is_empty());
        assert!(state.db.vault.token.is_empty());
        assert_eq!(state.db.user, "admin");
    }

    #[tokio::test]
    async fn tls_details_are_cleared_when_encryption_is_off() {
        let wizard = default_wizard();
        let mut state = state_at_step2_mysql();
        state.db.tls.encryption = true;
        state.db.tls.key_file = "/etc/ssl/key.pem".to_string();
        state.db.tls.ca_file = "/etc/ssl/ca.pem".to_string();
        let mut store = seeded_store(&state);

        let mut req = SetupRequest::default();
        req.tls_encryption = Some(false);
        wizard.handle(&mut store, &req).await;

        let state = WizardState::load(&store);
        assert!(!state.db.tls.encryption);
        assert!(state.db.tls.key_file.is_empty());
        assert!(state.db.tls.ca_file.is_empty());
    }

    #[tokio::test]
    async fn mysql_forces_host_verification_on() {
        let wizard = default_wizard();
        let mut store = seeded_store(&state_at_step2_mysql());

        let mut req = SetupRequest::default();
        req.tls_encryption = Some(true);
        req.verify_host = Some(false);
        wizard.handle(&mut store, &req).await;

        let state = WizardState::load(&store);
        assert!(state.db.tls.encryption);
        assert!(state.db.tls.verify_host);
    }

    #[tokio::test]
    async fn connect_failure_keeps_the_step_and_sets_the_flag() {
        let probe = StubProbe::refusing("connection refused");
        let closes = Arc::clone(&probe.closes);
        let wizard = build_wizard(
            probe,
            StubSecrets::with_credentials(),
            ok_requirements(),
            PathBuf::from("/tmp/unused.toml"),
        );
        let mut store = seeded_store(&state_at_step2_mysql());

        let resp = wizard.handle(&mut store, &next_req(2)).await;
        let page = resp.as_page().unwrap();

        assert_eq!(page.step, 2);
        let message = page.message.as_ref().unwrap();
        assert_eq!(message.title.as_deref(), Some("Cannot connect to the database."));
        assert!(message.errors[0].contains("connection refused"));
        assert!(WizardState::load(&store).stage_failed);
        assert_eq!(closes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn successful_probe_advances_and_records_the_double_flag() {
        let probe = StubProbe::ok();
        let closes = Arc::clone(&probe.closes);
        let wizard = build_wizard(
            probe,
            StubSecrets::with_credentials(),
            ok_requirements(),
            PathBuf::from("/tmp/unused.toml"),
        );
        let mut store = seeded_store(&state_at_step2_mysql());

        let resp = wizard.handle(&mut store, &next_req(2)).await;
        assert_eq!(resp.as_page().unwrap().step, 3);

        let state = WizardState::load(&store);
        assert!(state.db.double_ieee754);
        assert!(!state.stage_failed);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_postgres_schema_blocks_advancement() {
        let mut probe = StubProbe::ok();
        probe.schema_exists = false;
        let closes = Arc::clone(&probe.closes);
        let wizard = build_wizard(
            probe,
            StubSecrets::with_credentials(),
            ok_requirements(),
            PathBuf::from("/tmp/unused.toml"),
        );

        let mut state = state_at_step2_mysql();
        state.db.kind = Some(DbKind::PostgreSql);
        state.db.schema = "frontend".to_string();
        let mut store = seeded_store(&state);

        let resp = wizard.handle(&mut store, &next_req(2)).await;
        let page = resp.as_page().unwrap();

        assert_eq!(page.step, 2);
        assert!(page.message.as_ref().unwrap().errors[0].contains("frontend"));
        // The probe connection is still closed after a failed check.
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn encoding_failure_blocks_advancement() {
        let mut probe = StubProbe::ok();
        probe.encoding_error = Some("Incorrect default charset for the database: \"latin1\" (must be UTF-8)".to_string());
        let wizard = build_wizard(
            probe,
            StubSecrets::with_credentials(),
            ok_requirements(),
            PathBuf::from("/tmp/unused.toml"),
        );
        let mut store = seeded_store(&state_at_step2_mysql());

        let resp = wizard.handle(&mut store, &next_req(2)).await;
        let page = resp.as_page().unwrap();

        assert_eq!(page.step, 2);
        assert!(page.message.as_ref().unwrap().errors[0].contains("latin1"));
    }

    #[tokio::test]
    async fn vault_mode_uses_fetched_credentials() {
        let secrets = StubSecrets::with_credentials();
        let calls = Arc::clone(&secrets.calls);
        let wizard = build_wizard(
            StubProbe::ok(),
            secrets,
            ok_requirements(),
            PathBuf::from("/tmp/unused.toml"),
        );

        let mut state = state_at_step2_mysql();
        state.use_vault_creds();
        state.db.vault.secret_path = "secret/opsmon/db".to_string();
        state.db.vault.token = "tok-1".to_string();
        let mut store = seeded_store(&state);

        let resp = wizard.handle(&mut store, &next_req(2)).await;
        assert_eq!(resp.as_page().unwrap().step, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalid_vault_endpoint_fails_before_any_fetch() {
        let secrets = StubSecrets::with_credentials();
        let calls = Arc::clone(&secrets.calls);
        let wizard = build_wizard(
            StubProbe::ok(),
            secrets,
            ok_requirements(),
            PathBuf::from("/tmp/unused.toml"),
        );

        let mut state = state_at_step2_mysql();
        state.use_vault_creds();
        state.db.vault.host = "ftp://vault:8200".to_string();
        state.db.vault.secret_path = "secret/opsmon/db".to_string();
        state.db.vault.token = "tok-1".to_string();
        let mut store = seeded_store(&state);

        let resp = wizard.handle(&mut store, &next_req(2)).await;
        let page = resp.as_page().unwrap();

        assert_eq!(page.step, 2);
        assert!(page.message.as_ref().unwrap().errors[0].contains("http or https"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn secret_without_expected_keys_fails_the_stage() {
        let wizard = build_wizard(
            StubProbe::ok(),
            StubSecrets::missing_keys(),
            ok_requirements(),
            PathBuf::from("/tmp/unused.toml"),
        );

        let mut state = state_at_step2_mysql();
        state.use_vault_creds();
        state.db.vault.secret_path = "secret/opsmon/db".to_string();
        state.db.vault.token = "tok-1".to_string();
        let mut store = seeded_store(&state);

        let resp = wizard.handle(&mut store, &next_req(2)).await;
        let page = resp.as_page().unwrap();

        assert_eq!(page.step, 2);
        assert!(page.message.as_ref().unwrap().errors[0].contains("\"username\" and \"password\""));
    }

    #[tokio::test]
    async fn unreachable_vault_fails_the_stage() {
        let wizard = build_wizard(
            StubProbe::ok(),
            StubSecrets::unreachable_store(),
            ok_requirements(),
            PathBuf::from("/tmp/unused.toml"),
        );

        let mut state = state_at_step2_mysql();
        state.use_vault_creds();
        state.db.vault.secret_path = "secret/opsmon/db".to_string();
        state.db.vault.token = "tok-1".to_string();
        let mut store = seeded_store(&state);

        let resp = wizard.handle(&mut store, &next_req(2)).await;
        let page = resp.as_page().unwrap();

        assert_eq!(page.step, 2);
        assert!(page.message.as_ref().unwrap().errors[0].contains("Vault connection failed"));
    }

    // -------------------------------------------------------------------------
    // Stages 3-5
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn server_details_are_stored_and_advance_once() {
        let wizard = default_wizard();
        let mut state = WizardState::default();
        state.step = 3;
        let mut store = seeded_store(&state);

        let mut req = next_req(3);
        req.monitor_server = Some("monitor.internal".to_string());
        req.monitor_server_port = Some(10052);
        req.monitor_server_name = Some("Production".to_string());

        let resp = wizard.handle(&mut store, &req).await;
        assert_eq!(resp.as_page().unwrap().step, 4);

        let state = WizardState::load(&store);
        assert_eq!(state.server.host, "monitor.internal");
        assert_eq!(state.server.port, 10052);
        assert_eq!(state.server.name, "Production");
    }

    #[tokio::test]
    async fn gui_settings_are_stored() {
        let wizard = default_wizard();
        let mut state = WizardState::default();
        state.step = 4;
        let mut store = seeded_store(&state);

        let mut req = SetupRequest::default();
        req.default_timezone = Some("Europe/Riga".to_string());
        req.default_theme = Some("dark".to_string());
        wizard.handle(&mut store, &req).await;

        let state = WizardState::load(&store);
        assert_eq!(state.default_timezone, "Europe/Riga");
        assert_eq!(state.default_theme, "dark");
    }

    #[tokio::test]
    async fn summary_masks_the_password_one_asterisk_per_character() {
        let wizard = default_wizard();
        let mut state = state_at_step2_mysql();
        state.step = 5;
        state.db.password = "secret".to_string();
        let mut store = seeded_store(&state);

        let resp = wizard.handle(&mut store, &SetupRequest::default()).await;
        let page = resp.as_page().unwrap();

        assert_eq!(
            summary_value(page, "Database password").as_deref(),
            Some("******")
        );
    }

    #[tokio::test]
    async fn summary_shows_port_zero_as_default() {
        let wizard = default_wizard();
        let mut state = state_at_step2_mysql();
        state.step = 5;
        state.db.port = 0;
        let mut store = seeded_store(&state);

        let resp = wizard.handle(&mut store, &SetupRequest::default()).await;
        let page = resp.as_page().unwrap();

        assert_eq!(summary_value(page, "Database port").as_deref(), Some("default"));
        // TLS is off, so no detail rows are shown.
        assert!(summary_value(page, "TLS key file").is_none());
    }

    // -------------------------------------------------------------------------
    // Stage 6: install + download
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn save_config_streams_the_artifact_instead_of_a_page() {
        let wizard = default_wizard();
        let mut state = state_at_step2_mysql();
        state.step = 6;
        let mut store = seeded_store(&state);

        let mut req = SetupRequest::default();
        req.save_config = true;

        let resp = wizard.handle(&mut store, &req).await;
        let download = resp.as_download().unwrap();

        assert_eq!(download.content_type, DOWNLOAD_CONTENT_TYPE);
        assert_eq!(download.filename, CONFIG_FILE_NAME);
        assert!(download.body.contains("[db]"));
        assert!(download.body.contains("type = \"mysql\""));
    }

    #[tokio::test]
    async fn install_success_writes_the_file_and_locks_navigation() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);
        let probe = StubProbe::ok();
        let updates = Arc::clone(&probe.updates);
        let closes = Arc::clone(&probe.closes);
        let wizard = build_wizard(
            probe,
            StubSecrets::with_credentials(),
            ok_requirements(),
            config_path.clone(),
        );

        let mut state = state_at_step2_mysql();
        state.step = 6;
        let mut store = seeded_store(&state);

        let resp = wizard.handle(&mut store, &SetupRequest::default()).await;
        let page = resp.as_page().unwrap();

        assert_eq!(page.next_label, "Finish");
        assert!(!page.back_enabled);
        assert!(!page.cancel_enabled);
        assert!(matches!(
            &page.body[0],
            ViewRow::Heading { text } if text.contains("Congratulations")
        ));
        assert!(config_path.exists());
        assert_eq!(updates.load(Ordering::SeqCst), 1);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(WizardState::load(&store).config_file_correct);
    }

    #[tokio::test]
    async fn install_write_failure_offers_retry_and_manual_instructions() {
        let wizard = build_wizard(
            StubProbe::ok(),
            StubSecrets::with_credentials(),
            ok_requirements(),
            PathBuf::from("/nonexistent/opsmon-conf").join(CONFIG_FILE_NAME),
        );

        let mut state = state_at_step2_mysql();
        state.step = 6;
        let mut store = seeded_store(&state);

        let resp = wizard.handle(&mut store, &SetupRequest::default()).await;
        let page = resp.as_page().unwrap();

        assert_eq!(page.next_label, "Retry");
        let message = page.message.as_ref().unwrap();
        assert_eq!(
            message.title.as_deref(),
            Some("Cannot create the configuration file.")
        );
        assert!(page
            .body
            .iter()
            .any(|row| matches!(row, ViewRow::Instructions { .. })));

        let state = WizardState::load(&store);
        assert!(state.retry_requested);
        assert!(!state.config_file_correct);
    }

    #[tokio::test]
    async fn install_with_broken_vault_fails_before_touching_the_database() {
        let probe = StubProbe::ok();
        let connects = Arc::clone(&probe.connects);
        let wizard = build_wizard(
            probe,
            StubSecrets::unreachable_store(),
            ok_requirements(),
            PathBuf::from("/tmp/unused.toml"),
        );

        let mut state = state_at_step2_mysql();
        state.step = 6;
        state.use_vault_creds();
        state.db.vault.secret_path = "secret/opsmon/db".to_string();
        state.db.vault.token = "tok-1".to_string();
        let mut store = seeded_store(&state);

        let resp = wizard.handle(&mut store, &SetupRequest::default()).await;
        let page = resp.as_page().unwrap();

        let message = page.message.as_ref().unwrap();
        assert_eq!(
            message.title.as_deref(),
            Some("Cannot complete the installation.")
        );
        assert_eq!(connects.load(Ordering::SeqCst), 0);
        assert!(WizardState::load(&store).stage_failed);
        assert!(!WizardState::load(&store).config_file_correct);
    }
}
