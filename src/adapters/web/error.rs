//! HTTP error responses for web adapter.

use askama::Template;
use axum::{
    Json,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use crate::domain::error::PropdeskError;

#[derive(Debug)]
pub struct WebError {
    pub status: StatusCode,
    pub message: String,
}

impl WebError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, "You do not have access to this page.")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

pub fn status_from_error(err: &PropdeskError) -> StatusCode {
    match err {
        PropdeskError::NotFound { .. } => StatusCode::NOT_FOUND,
        PropdeskError::Validation { .. }
        | PropdeskError::ConfigMissing { .. }
        | PropdeskError::ConfigInvalid { .. }
        | PropdeskError::ConfigParse { .. } => StatusCode::BAD_REQUEST,
        PropdeskError::InvalidStartingBalance { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        PropdeskError::Upstream { .. } | PropdeskError::Email { .. } => StatusCode::BAD_GATEWAY,
        PropdeskError::Database { .. }
        | PropdeskError::DatabaseQuery { .. }
        | PropdeskError::Serialization { .. }
        | PropdeskError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<PropdeskError> for WebError {
    fn from(err: PropdeskError) -> Self {
        let status = status_from_error(&err);
        if status.is_server_error() {
            error!(error = %err, "request failed");
        }
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let template = super::templates::ErrorTemplate {
            nav: None,
            status: self.status.as_u16(),
            message: &self.message,
        };
        match template.render() {
            Ok(html) => (self.status, Html(html)).into_response(),
            Err(_) => (self.status, self.message).into_response(),
        }
    }
}

/// JSON flavour for the `/api` routes: `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError(pub WebError);

impl From<WebError> for ApiError {
    fn from(err: WebError) -> Self {
        Self(err)
    }
}

impl From<PropdeskError> for ApiError {
    fn from(err: PropdeskError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0.status, Json(json!({ "error": self.0.message }))).into_response()
    }
}
