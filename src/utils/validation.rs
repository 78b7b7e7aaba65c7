// Input validation utilities

use anyhow::Result;
use regex::Regex;
use url::Url;

/// Validate a Vault API endpoint URL.
///
/// Only the syntax is checked here; reachability is established later by the
/// actual secret fetch. The endpoint must be an absolute http/https URL with
/// a host part (e.g. `https://localhost:8200`).
pub fn validate_vault_endpoint(endpoint: &str) -> Result<()> {
    let s = endpoint.trim();
    if s.is_empty() {
        return Err(anyhow::anyhow!("Vault API endpoint is required"));
    }

    let url = Url::parse(s).map_err(|e| anyhow::anyhow!("Invalid Vault API endpoint: {}", e))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(anyhow::anyhow!(
                "Vault API endpoint must use http or https, not '{}'",
                other
            ))
        }
    }

    if url.host_str().map(str::is_empty).unwrap_or(true) {
        return Err(anyhow::anyhow!("Vault API endpoint has no host"));
    }

    Ok(())
}

/// Validate a Vault authentication token.
///
/// Tokens are opaque; we only reject values that cannot possibly be a token
/// (empty, embedded whitespace or header-breaking characters).
pub fn validate_vault_token(token: &str) -> Result<()> {
    let s = token.trim();
    if s.is_empty() {
        return Err(anyhow::anyhow!("Vault authentication token is required"));
    }

    let token_re = Regex::new(r"^[0-9A-Za-z._-]+$")
        .map_err(|e| anyhow::anyhow!("Internal error: failed to compile token regex: {}", e))?;
    if !token_re.is_match(s) {
        return Err(anyhow::anyhow!(
            "Vault authentication token contains invalid characters"
        ));
    }

    Ok(())
}

/// Validate a Vault secret path (e.g. `secret/opsmon/db`).
///
/// The path must contain at least a mount point and a secret name, separated
/// by `/`, with no empty segments and no leading or trailing slash. Segment
/// characters are restricted to letters, digits, `.`, `_` and `-`.
pub fn validate_vault_secret_path(path: &str) -> Result<()> {
    let s = path.trim();
    if s.is_empty() {
        return Err(anyhow::anyhow!("Vault secret path is required"));
    }

    if s.starts_with('/') || s.ends_with('/') {
        return Err(anyhow::anyhow!(
            "Vault secret path must not start or end with '/'"
        ));
    }

    let parts: Vec<&str> = s.split('/').collect();
    if parts.len() < 2 {
        return Err(anyhow::anyhow!(
            "Vault secret path must be of the form mountpoint/path/to/secret"
        ));
    }

    let segment_re = Regex::new(r"^[0-9A-Za-z._-]+$")
        .map_err(|e| anyhow::anyhow!("Internal error: failed to compile path regex: {}", e))?;
    for part in parts {
        if part.is_empty() {
            return Err(anyhow::anyhow!("Vault secret path contains an empty segment"));
        }
        if !segment_re.is_match(part) {
            return Err(anyhow::anyhow!(
                "Vault secret path contains invalid segment: '{}'",
                part
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_accepts_http_and_https() {
        assert!(validate_vault_endpoint("https://localhost:8200").is_ok());
        assert!(validate_vault_endpoint("http://vault.internal:8200").is_ok());
        assert!(validate_vault_endpoint("  https://10.0.0.5:8200  ").is_ok());
    }

    #[test]
    fn endpoint_rejects_other_schemes_and_garbage() {
        assert!(validate_vault_endpoint("").is_err());
        assert!(validate_vault_endpoint("ftp://vault:8200").is_err());
        assert!(validate_vault_endpoint("localhost:8200").is_err());
        assert!(validate_vault_endpoint("not a url").is_err());
    }

    #[test]
    fn token_rejects_whitespace_and_empty() {
        assert!(validate_vault_token("hvs.CAESIJ5c9kg").is_ok());
        assert!(validate_vault_token("s.1a2B3c-4D_5e").is_ok());
        assert!(validate_vault_token("").is_err());
        assert!(validate_vault_token("token with space").is_err());
        assert!(validate_vault_token("token\nnewline").is_err());
    }

    #[test]
    fn secret_path_requires_mount_and_name() {
        assert!(validate_vault_secret_path("secret/opsmon").is_ok());
        assert!(validate_vault_secret_path("secret/opsmon/db").is_ok());
        assert!(validate_vault_secret_path("opsmon").is_err());
        assert!(validate_vault_secret_path("/secret/opsmon").is_err());
        assert!(validate_vault_secret_path("secret/opsmon/").is_err());
        assert!(validate_vault_secret_path("secret//opsmon").is_err());
        assert!(validate_vault_secret_path("secret/opsmon db").is_err());
        assert!(validate_vault_secret_path("").is_err());
    }
}
