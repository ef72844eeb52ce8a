//! Tracing subscriber setup.
//!
//! `PROPDESK_LOG` (falling back to `RUST_LOG`) sets the filter and
//! `PROPDESK_LOG_FORMAT=json` switches to JSON lines. Logs go to stderr so
//! command output on stdout stays clean.

use tracing_subscriber::EnvFilter;

pub fn init() {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_target(false);

    let result = match log_format().as_str() {
        "json" => builder.json().try_init(),
        _ => builder.try_init(),
    };

    // Already installed (tests, embedding).
    let _ = result;
}

fn env_filter() -> EnvFilter {
    let override_level = std::env::var("PROPDESK_LOG")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .or_else(|| std::env::var("RUST_LOG").ok());

    match override_level {
        Some(value) => EnvFilter::new(value),
        None => EnvFilter::new("info"),
    }
}

fn log_format() -> String {
    std::env::var("PROPDESK_LOG_FORMAT")
        .ok()
        .map(|value| value.trim().to_lowercase())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "plain".to_string())
}
