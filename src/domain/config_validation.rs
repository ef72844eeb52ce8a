//! Configuration validation.
//!
//! Validates every config field the server reads before it starts.

use crate::domain::email::looks_like_email;
use crate::domain::error::PropdeskError;
use crate::domain::metrics_cache::DEFAULT_TTL_MINUTES;
use crate::ports::config_port::ConfigPort;
use chrono::Duration;
use std::net::SocketAddr;

pub const DEFAULT_LISTEN: &str = "127.0.0.1:3000";

pub fn validate_server_config(config: &dyn ConfigPort) -> Result<(), PropdeskError> {
    validate_listen(config)?;
    validate_sqlite(config)?;
    validate_session(config)?;
    validate_metrics(config)?;
    validate_email(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: &str) -> PropdeskError {
    PropdeskError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn missing(section: &str, key: &str) -> PropdeskError {
    PropdeskError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    }
}

pub fn listen_addr(config: &dyn ConfigPort) -> Result<SocketAddr, PropdeskError> {
    config
        .get_string("server", "listen")
        .unwrap_or_else(|| DEFAULT_LISTEN.to_string())
        .parse()
        .map_err(|_| invalid("server", "listen", "expected host:port"))
}

fn validate_listen(config: &dyn ConfigPort) -> Result<(), PropdeskError> {
    listen_addr(config).map(|_| ())
}

fn validate_sqlite(config: &dyn ConfigPort) -> Result<(), PropdeskError> {
    match config.get_string("sqlite", "path") {
        Some(path) if !path.trim().is_empty() => {}
        _ => return Err(missing("sqlite", "path")),
    }
    if config.get_int("sqlite", "pool_size", 4) < 1 {
        return Err(invalid("sqlite", "pool_size", "pool_size must be at least 1"));
    }
    Ok(())
}

/// Decoded `[auth] session_secret`, if one is configured. It must be 64
/// bytes written as 128 hex characters.
pub fn session_secret(config: &dyn ConfigPort) -> Result<Option<Vec<u8>>, PropdeskError> {
    let Some(secret) = config.get_string("auth", "session_secret") else {
        return Ok(None);
    };
    let bytes = hex::decode(secret.trim())
        .map_err(|_| invalid("auth", "session_secret", "session_secret must be hex"))?;
    if bytes.len() < 64 {
        return Err(invalid(
            "auth",
            "session_secret",
            "session_secret must be at least 64 bytes (128 hex characters)",
        ));
    }
    Ok(Some(bytes))
}

fn validate_session(config: &dyn ConfigPort) -> Result<(), PropdeskError> {
    session_secret(config)?;
    if config.get_int("auth", "session_lifetime", 86_400) <= 0 {
        return Err(invalid(
            "auth",
            "session_lifetime",
            "session_lifetime must be positive",
        ));
    }
    Ok(())
}

pub fn cache_ttl(config: &dyn ConfigPort) -> Duration {
    Duration::minutes(config.get_int("metrics", "cache_ttl_minutes", DEFAULT_TTL_MINUTES))
}

fn validate_metrics(config: &dyn ConfigPort) -> Result<(), PropdeskError> {
    match config.get_string("metrics", "base_url") {
        Some(url) if url::Url::parse(url.trim()).is_ok() => {}
        Some(_) => return Err(invalid("metrics", "base_url", "base_url must be a URL")),
        None => return Err(missing("metrics", "base_url")),
    }
    if config.get_int("metrics", "cache_ttl_minutes", DEFAULT_TTL_MINUTES) <= 0 {
        return Err(invalid(
            "metrics",
            "cache_ttl_minutes",
            "cache_ttl_minutes must be positive",
        ));
    }
    if config.get_int("metrics", "timeout_secs", 20) <= 0 {
        return Err(invalid("metrics", "timeout_secs", "timeout_secs must be positive"));
    }
    Ok(())
}

fn validate_email(config: &dyn ConfigPort) -> Result<(), PropdeskError> {
    if config.get_string("email", "api_key").is_none() {
        return Err(missing("email", "api_key"));
    }
    match config.get_string("email", "from") {
        Some(from) if looks_like_email(sender_address(&from)) => Ok(()),
        Some(_) => Err(invalid("email", "from", "from must contain an email address")),
        None => Err(missing("email", "from")),
    }
}

/// `"Desk <desk@example.com>"` -> `"desk@example.com"`.
fn sender_address(from: &str) -> &str {
    match (from.find('<'), from.rfind('>')) {
        (Some(start), Some(end)) if start < end => &from[start + 1..end],
        _ => from.trim(),
    }
}
