// Environment pre-requisite checks for the installation stage.
//
// Each check yields a Requirement row classified OK / Warning / Fatal; only
// a Fatal result blocks the wizard from advancing.

use log::warn;
use serde::Serialize;
use std::path::PathBuf;

/// Outcome classification of a single pre-requisite check. Ordering matters:
/// the stage outcome is the worst individual result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckResult {
    Ok,
    Warning,
    Fatal,
}

/// One row of the pre-requisites table.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Requirement {
    pub name: String,
    pub current: String,
    pub required: Option<String>,
    pub result: CheckResult,
    pub error: Option<String>,
}

impl Requirement {
    pub fn ok(name: &str, current: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            current: current.into(),
            required: None,
            result: CheckResult::Ok,
            error: None,
        }
    }

    pub fn warning(name: &str, current: impl Into<String>, required: Option<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            current: current.into(),
            required,
            result: CheckResult::Warning,
            error: Some(error.into()),
        }
    }

    pub fn fatal(name: &str, current: impl Into<String>, required: Option<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            current: current.into(),
            required,
            result: CheckResult::Fatal,
            error: Some(error.into()),
        }
    }
}

/// Worst individual result, or Ok for an empty list.
pub fn worst_of(requirements: &[Requirement]) -> CheckResult {
    requirements
        .iter()
        .map(|r| r.result)
        .max()
        .unwrap_or(CheckResult::Ok)
}

/// Runs the environment probes for stage 1.
pub trait PrereqChecker: Send + Sync {
    fn check_requirements(&self) -> Vec<Requirement>;
}

/// Default checker probing the actual host environment.
pub struct EnvironmentChecker {
    config_dir: PathBuf,
}

const MIN_MEMORY_MB: u64 = 128;

impl EnvironmentChecker {
    pub fn new(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    fn check_config_dir(&self) -> Requirement {
        let name = "Configuration directory";
        let shown = self.config_dir.display().to_string();

        if !self.config_dir.is_dir() {
            return Requirement::fatal(
                name,
                shown,
                Some("existing, writable directory".to_string()),
                format!(
                    "Configuration directory \"{}\" does not exist.",
                    self.config_dir.display()
                ),
            );
        }

        // Permission bits lie on some filesystems; probe with a real write.
        let probe = self.config_dir.join(".setup-write-probe");
        match std::fs::write(&probe, b"probe") {
            Ok(()) => {
                let _ = std::fs::remove_file(&probe);
                Requirement::ok(name, shown)
            }
            Err(e) => Requirement::fatal(
                name,
                shown,
                Some("existing, writable directory".to_string()),
                format!(
                    "Configuration directory \"{}\" is not writable: {}",
                    self.config_dir.display(),
                    e
                ),
            ),
        }
    }

    fn check_memory(&self) -> Requirement {
        let name = "Available memory";
        let required = Some(format!("{} MB", MIN_MEMORY_MB));

        match available_memory_mb() {
            Some(mb) if mb >= MIN_MEMORY_MB => Requirement::ok(name, format!("{} MB", mb)),
            Some(mb) => Requirement::warning(
                name,
                format!("{} MB", mb),
                required,
                format!(
                    "Less than {} MB of memory is available; the frontend may be slow.",
                    MIN_MEMORY_MB
                ),
            ),
            None => {
                warn!("[PHASE: setup] [STEP: prereq] Unable to determine available memory");
                Requirement::ok(name, "unknown")
            }
        }
    }

    fn check_locales(&self) -> Requirement {
        let name = "Locales";
        if crate::i18n::all_available() {
            Requirement::ok(name, "all installed")
        } else {
            Requirement::warning(
                name,
                "partially installed",
                None,
                "Some languages cannot be chosen because their locales are not installed.",
            )
        }
    }

    fn check_os(&self) -> Requirement {
        Requirement::ok(
            "Operating system",
            format!("{} {}", std::env::consts::OS, std::env::consts::ARCH),
        )
    }
}

impl PrereqChecker for EnvironmentChecker {
    fn check_requirements(&self) -> Vec<Requirement> {
        vec![
            self.check_os(),
            self.check_memory(),
            self.check_locales(),
            self.check_config_dir(),
        ]
    }
}

#[cfg(target_os = "linux")]
fn available_memory_mb() -> Option<u64> {
    let contents = std::fs::read_to_string("/proc/meminfo").ok()?;
    parse_meminfo_available_kb(&contents).map(|kb| kb / 1024)
}

#[cfg(not(target_os = "linux"))]
fn available_memory_mb() -> Option<u64> {
    None
}

/// Extract available memory in kB from /proc/meminfo content. Prefers
/// MemAvailable, falls back to MemFree.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_meminfo_available_kb(contents: &str) -> Option<u64> {
    let mut mem_free = None;

    for line in contents.lines() {
        if let Some((key, rest)) = line.split_once(':') {
            let value = rest
                .trim()
                .split_whitespace()
                .next()
                .and_then(|v| v.parse::<u64>().ok());
            match key.trim() {
                "MemAvailable" => {
                    if value.is_some() {
                        return value;
                    }
                }
                "MemFree" => mem_free = value,
                _ => {}
            }
        }
    }

    mem_free
}
