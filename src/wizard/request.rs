// Form fields consumed by the wizard, one submission per request.
//
// The host application decodes the POST body into this DTO; absent fields
// leave the corresponding session values untouched.

use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SetupRequest {
    /// Database kind id (`mysql`, `postgresql`).
    #[serde(rename = "type")]
    pub db_type: Option<String>,
    pub server: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub schema: Option<String>,
    /// Credential storage mode id (`config`, `vault`).
    pub creds_storage: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub vault_host: Option<String>,
    pub vault_secret: Option<String>,
    pub vault_token: Option<String>,
    pub tls_encryption: Option<bool>,
    pub verify_host: Option<bool>,
    pub key_file: Option<String>,
    pub cert_file: Option<String>,
    pub ca_file: Option<String>,
    pub cipher_list: Option<String>,
    pub monitor_server: Option<String>,
    pub monitor_server_port: Option<u16>,
    pub monitor_server_name: Option<String>,
    pub default_lang: Option<String>,
    pub default_timezone: Option<String>,
    pub default_theme: Option<String>,

    /// `next[<step>]` submit buttons; the key is the step the button was
    /// rendered for, which keeps a stale double-submit from advancing twice.
    pub next: HashMap<usize, String>,
    /// `back[<step>]` submit buttons.
    pub back: HashMap<usize, String>,
    /// Download-the-artifact request path on the terminal stage.
    pub save_config: bool,
}

impl SetupRequest {
    pub fn next_pressed(&self, step: usize) -> bool {
        self.next.contains_key(&step)
    }

    pub fn back_pressed(&self, step: usize) -> bool {
        self.back.contains_key(&step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navigation_keys_are_step_scoped() {
        let mut req = SetupRequest::default();
        req.next.insert(2, "Next step".to_string());

        assert!(req.next_pressed(2));
        assert!(!req.next_pressed(3));
        assert!(!req.back_pressed(2));
    }

    #[test]
    fn deserializes_from_a_form_payload() {
        let req: SetupRequest = serde_json::from_str(
            r#"{
                "type": "postgresql",
                "server": "db.internal",
                "port": 0,
                "creds_storage": "vault",
                "vault_secret": "secret/opsmon/db",
                "tls_encryption": true,
                "next": { "2": "Next step" }
            }"#,
        )
        .unwrap();

        assert_eq!(req.db_type.as_deref(), Some("postgresql"));
        assert_eq!(req.port, Some(0));
        assert_eq!(req.tls_encryption, Some(true));
        assert!(req.next_pressed(2));
        assert!(!req.save_config);
    }
}
