// Structured stage view models.
//
// The wizard does not assemble markup; it hands the host application a
// typed description of the current stage and the host renders it.

use serde::Serialize;

use crate::prereq::Requirement;

/// What a wizard request produces: a page to render, or a file download
/// that replaces the page entirely.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum WizardResponse {
    Page(StageView),
    Download(ConfigDownload),
}

impl WizardResponse {
    pub fn as_page(&self) -> Option<&StageView> {
        match self {
            WizardResponse::Page(view) => Some(view),
            WizardResponse::Download(_) => None,
        }
    }

    pub fn as_download(&self) -> Option<&ConfigDownload> {
        match self {
            WizardResponse::Download(download) => Some(download),
            WizardResponse::Page(_) => None,
        }
    }
}

/// Response headers + body for the "download configuration now" path.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDownload {
    pub content_type: String,
    pub filename: String,
    pub body: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageView {
    pub step: usize,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intro: Option<String>,
    pub sidebar: Vec<SidebarEntry>,
    pub body: Vec<ViewRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<MessageBox>,
    pub next_label: String,
    pub back_enabled: bool,
    pub cancel_enabled: bool,
}

/// One entry of the step list shown beside every stage.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SidebarEntry {
    pub title: String,
    pub reached: bool,
}

/// Inline error display for a failed stage.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageBox {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "row", rename_all = "camelCase")]
pub enum ViewRow {
    Heading { text: String },
    Paragraph { text: String },
    Field(FormField),
    Requirement(Requirement),
    Summary { label: String, value: String },
    /// Ordered manual-installation instructions (terminal stage fallback).
    Instructions { items: Vec<String> },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    pub name: String,
    pub label: String,
    pub value: String,
    pub control: Control,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    pub read_only: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "control", rename_all = "camelCase")]
pub enum Control {
    Text,
    Password,
    Number,
    Checkbox,
    Select { options: Vec<SelectOption> },
    Radio { options: Vec<SelectOption> },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectOption {
    pub value: String,
    pub label: String,
    pub enabled: bool,
}

impl SelectOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
            enabled: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

impl FormField {
    fn new(name: &str, label: &str, value: impl Into<String>, control: Control) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            value: value.into(),
            control,
            hint: None,
            read_only: false,
        }
    }

    pub fn text(name: &str, label: &str, value: impl Into<String>) -> Self {
        Self::new(name, label, value, Control::Text)
    }

    pub fn password(name: &str, label: &str, value: impl Into<String>) -> Self {
        Self::new(name, label, value, Control::Password)
    }

    pub fn number(name: &str, label: &str, value: impl ToString) -> Self {
        Self::new(name, label, value.to_string(), Control::Number)
    }

    pub fn checkbox(name: &str, label: &str, checked: bool) -> Self {
        Self::new(name, label, if checked { "1" } else { "0" }, Control::Checkbox)
    }

    pub fn select(name: &str, label: &str, value: impl Into<String>, options: Vec<SelectOption>) -> Self {
        Self::new(name, label, value, Control::Select { options })
    }

    pub fn radio(name: &str, label: &str, value: impl Into<String>, options: Vec<SelectOption>) -> Self {
        Self::new(name, label, value, Control::Radio { options })
    }

    pub fn hint(mut self, hint: &str) -> Self {
        self.hint = Some(hint.to_string());
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}

/// Replace every character with an asterisk, as the summary stage displays
/// secrets.
pub fn mask_every_char(value: &str) -> String {
    value.chars().map(|_| '*').collect()
}

/// Timezone identifiers offered on the GUI-settings stage. `system` keeps
/// the web server's timezone.
pub const TIMEZONE_SYSTEM: &str = "system";

pub fn timezones() -> &'static [&'static str] {
    &[
        "UTC",
        "Africa/Cairo",
        "Africa/Johannesburg",
        "Africa/Lagos",
        "America/Argentina/Buenos_Aires",
        "America/Chicago",
        "America/Denver",
        "America/Los_Angeles",
        "America/Mexico_City",
        "America/New_York",
        "America/Sao_Paulo",
        "America/Toronto",
        "Asia/Dubai",
        "Asia/Hong_Kong",
        "Asia/Kolkata",
        "Asia/Seoul",
        "Asia/Shanghai",
        "Asia/Singapore",
        "Asia/Tokyo",
        "Australia/Melbourne",
        "Australia/Sydney",
        "Europe/Amsterdam",
        "Europe/Berlin",
        "Europe/London",
        "Europe/Madrid",
        "Europe/Moscow",
        "Europe/Paris",
        "Europe/Riga",
        "Europe/Rome",
        "Europe/Warsaw",
        "Pacific/Auckland",
    ]
}

/// Frontend themes offered on the GUI-settings stage.
pub fn themes() -> &'static [(&'static str, &'static str)] {
    &[
        ("default", "Default"),
        ("dark", "Dark"),
        ("hc-light", "High-contrast light"),
        ("hc-dark", "High-contrast dark"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_every_char_is_one_asterisk_per_character() {
        assert_eq!(mask_every_char("secret"), "******");
        assert_eq!(mask_every_char(""), "");
        assert_eq!(mask_every_char("pää"), "***");
    }

    #[test]
    fn checkbox_value_encodes_checked_state() {
        assert_eq!(FormField::checkbox("tls_encryption", "TLS encryption", true).value, "1");
        assert_eq!(FormField::checkbox("tls_encryption", "TLS encryption", false).value, "0");
    }

    #[test]
    fn timezone_table_offers_utc_and_has_no_duplicates() {
        let zones = timezones();
        assert!(zones.contains(&"UTC"));
        let mut deduped = zones.to_vec();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(deduped.len(), zones.len());
    }
}
