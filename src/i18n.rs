// Locale table for the language-selection stage.
//
// Availability reflects whether translations for the locale ship with the
// build; unavailable entries are still listed but rendered non-selectable.

/// A selectable frontend locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Locale {
    pub id: &'static str,
    pub name: &'static str,
    pub available: bool,
}

/// Default frontend language.
pub const DEFAULT_LANG: &str = "en_US";

const LOCALES: &[Locale] = &[
    Locale { id: "en_US", name: "English (en_US)", available: true },
    Locale { id: "de_DE", name: "Deutsch (de_DE)", available: true },
    Locale { id: "fr_FR", name: "Français (fr_FR)", available: true },
    Locale { id: "es_ES", name: "Español (es_ES)", available: true },
    Locale { id: "pt_BR", name: "Português do Brasil (pt_BR)", available: true },
    Locale { id: "ru_RU", name: "Русский (ru_RU)", available: true },
    Locale { id: "ja_JP", name: "日本語 (ja_JP)", available: true },
    Locale { id: "zh_CN", name: "中文 (zh_CN)", available: true },
    Locale { id: "cs_CZ", name: "Čeština (cs_CZ)", available: false },
    Locale { id: "ko_KR", name: "한국어 (ko_KR)", available: false },
];

/// All locales shown on the welcome stage, in display order.
pub fn locales() -> &'static [Locale] {
    LOCALES
}

/// Whether a locale id is known and available on this installation.
pub fn is_available(id: &str) -> bool {
    LOCALES.iter().any(|l| l.id == id && l.available)
}

/// Whether every listed locale is available (drives the welcome-stage note
/// about missing locales).
pub fn all_available() -> bool {
    LOCALES.iter().all(|l| l.available)
}
