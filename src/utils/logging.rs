// Logging utilities
// Dual-format logging (JSON + human-readable) and secret masking

use anyhow::{Context, Result};
use serde_json::json;
use std::path::Path;

/// Initialize logging with dual sinks: a JSON `.log` file for structured
/// parsing and a human-readable `.txt` file. `with_stdout` adds a console
/// chain (disabled when the host application owns the terminal).
pub fn init(log_dir: &Path, with_stdout: bool) -> Result<()> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

    let timestamp = chrono::Utc::now().format("%Y-%m-%d-%H%M%S");
    let json_log_file = log_dir.join(format!("setup-{}.log", timestamp));
    let txt_log_file = log_dir.join(format!("setup-{}.txt", timestamp));

    let mut dispatch = fern::Dispatch::new().level(log::LevelFilter::Debug);

    if with_stdout {
        dispatch = dispatch.chain(
            fern::Dispatch::new()
                .format(|out, message, record| {
                    out.finish(format_args!(
                        "[{}] [{}] [{}] {}",
                        chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                        record.level(),
                        record.target(),
                        message
                    ))
                })
                .chain(std::io::stdout()),
        );
    }

    dispatch = dispatch.chain(
        fern::Dispatch::new()
            .format(|out, message, record| {
                out.finish(format_args!(
                    "[{}] [{}] [{}] {}",
                    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                    record.level(),
                    record.target(),
                    message
                ))
            })
            .chain(fern::log_file(&txt_log_file).with_context(|| {
                format!("Failed to open log file: {}", txt_log_file.display())
            })?),
    );

    dispatch = dispatch.chain(
        fern::Dispatch::new()
            .format(|out, message, record| {
                let entry = json!({
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                    "level": record.level().as_str(),
                    "target": record.target(),
                    "message": format!("{}", message),
                });
                out.finish(format_args!(
                    "{}",
                    serde_json::to_string(&entry).unwrap_or_else(|_| "{}".to_string())
                ))
            })
            .chain(fern::log_file(&json_log_file).with_context(|| {
                format!("Failed to open log file: {}", json_log_file.display())
            })?),
    );

    dispatch.apply().context("Failed to install logger")?;
    Ok(())
}

/// Mask sensitive data in logs. Short values are hidden entirely; longer
/// values keep the first and last four characters for troubleshooting.
pub fn mask_sensitive(input: &str) -> String {
    if input.chars().count() <= 8 {
        return "***".to_string();
    }

    let chars: Vec<char> = input.chars().collect();
    let start: String = chars[..4].iter().collect();
    let end: String = chars[chars.len() - 4..].iter().collect();

    format!("{}...{}", start, end)
}

/// Mask a secret entirely. Used for passwords and Vault tokens, which must
/// never appear in logs even partially.
pub fn mask_secret(input: &str) -> String {
    if input.is_empty() {
        String::new()
    } else {
        "***".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_sensitive_short_values_fully_masked() {
        assert_eq!(mask_sensitive("abc"), "***");
        assert_eq!(mask_sensitive("12345678"), "***");
    }

    #[test]
    fn mask_sensitive_long_values_partially_masked() {
        let masked = mask_sensitive("abcdefghijklmnop");
        assert!(masked.contains("..."), "partially masked: {}", masked);
        assert!(masked.starts_with("abcd"), "start visible: {}", masked);
        assert!(masked.ends_with("mnop"), "end visible: {}", masked);
    }

    #[test]
    fn mask_sensitive_never_leaks_middle() {
        let masked = mask_sensitive("user-SECRETPART-name");
        assert!(!masked.contains("SECRETPART"), "middle leaked: {}", masked);
    }

    #[test]
    fn mask_secret_hides_everything() {
        assert_eq!(mask_secret("hunter2hunter2"), "***");
        assert_eq!(mask_secret(""), "");
    }
}
