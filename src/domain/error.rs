//! Domain error types.

/// Top-level error type for propdesk.
#[derive(Debug, thiserror::Error)]
pub enum PropdeskError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("validation failed: {reason}")]
    Validation { reason: String },

    #[error("starting balance must be a positive amount, got {value}")]
    InvalidStartingBalance { value: f64 },

    #[error("metrics provider error: {reason}")]
    Upstream { reason: String },

    #[error("email provider error: {reason}")]
    Email { reason: String },

    #[error("serialization error: {reason}")]
    Serialization { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PropdeskError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }
}

impl From<rusqlite::Error> for PropdeskError {
    fn from(err: rusqlite::Error) -> Self {
        Self::DatabaseQuery {
            reason: err.to_string(),
        }
    }
}

impl From<r2d2::Error> for PropdeskError {
    fn from(err: r2d2::Error) -> Self {
        Self::Database {
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for PropdeskError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            reason: err.to_string(),
        }
    }
}

impl From<&PropdeskError> for std::process::ExitCode {
    fn from(err: &PropdeskError) -> Self {
        let code: u8 = match err {
            PropdeskError::Io(_) | PropdeskError::Serialization { .. } => 1,
            PropdeskError::ConfigParse { .. }
            | PropdeskError::ConfigMissing { .. }
            | PropdeskError::ConfigInvalid { .. } => 2,
            PropdeskError::Database { .. } | PropdeskError::DatabaseQuery { .. } => 3,
            PropdeskError::Validation { .. } | PropdeskError::InvalidStartingBalance { .. } => 4,
            PropdeskError::Upstream { .. } | PropdeskError::Email { .. } => 5,
            PropdeskError::NotFound { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
