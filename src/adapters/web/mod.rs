//! Web server adapter.
//!
//! Axum router with askama pages for the user dashboard and the admin back
//! office, plus a few JSON routes. Every page except `/login` and the
//! checkout redirect requires a session; `/admin` and `/api/email` also
//! require an admin profile.

mod admin;
mod api;
mod auth;
mod error;
mod handlers;
mod templates;

pub use auth::{AuthSession, Backend, Credentials, User};
pub use error::WebError;
pub use templates::*;

use axum::{
    Router,
    http::HeaderMap,
    routing::{get, post},
};
use axum_login::{AuthManagerLayerBuilder, login_required};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer, cookie::Key};
use tracing::warn;

use crate::domain::checkout::CheckoutCatalog;
use crate::domain::config_validation::session_secret;
use crate::domain::error::PropdeskError;
use crate::ports::DocumentStore;
use crate::ports::config_port::ConfigPort;
use crate::ports::email_port::EmailPort;
use crate::ports::metrics_port::MetricsPort;

pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub metrics: Arc<dyn MetricsPort + Send + Sync>,
    pub email: Arc<dyn EmailPort + Send + Sync>,
    pub config: Arc<dyn ConfigPort + Send + Sync>,
    pub checkout: CheckoutCatalog,
    pub cache_ttl: chrono::Duration,
}

pub fn build_router(state: AppState) -> Router {
    let state = Arc::new(state);
    let backend = Backend::new(Arc::clone(&state.store));
    let lifetime = state.config.get_int("auth", "session_lifetime", 86_400).max(60);
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(false)
        .with_expiry(Expiry::OnInactivity(time::Duration::seconds(lifetime)))
        .with_signed(session_key(state.config.as_ref()));
    let auth_layer = AuthManagerLayerBuilder::new(backend, session_layer).build();

    let protected = Router::new()
        .route("/", get(handlers::dashboard))
        .route("/logout", post(handlers::logout))
        .route("/accounts/{id}", get(handlers::account_detail))
        .route("/accounts/{id}/refresh", post(handlers::refresh_account))
        .route("/accounts/{id}/payouts", post(handlers::request_payout))
        .route("/admin/orders", get(admin::orders))
        .route("/admin/orders/{id}/status", post(admin::order_status))
        .route("/admin/orders/{id}/toggle", post(admin::order_toggle))
        .route("/admin/orders/{id}/notes", post(admin::order_notes))
        .route("/admin/orders/{id}/delete", post(admin::order_delete))
        .route("/admin/users", get(admin::users))
        .route("/admin/users/sync", post(admin::users_sync))
        .route("/admin/users/{id}/kyc", post(admin::user_kyc))
        .route("/admin/users/{id}/delete", post(admin::user_delete))
        .route("/admin/payouts", get(admin::payouts))
        .route("/admin/payouts/{id}/status", post(admin::payout_status))
        .route("/admin/accounts", get(admin::accounts))
        .route("/api/metrics", post(api::metrics))
        .route("/api/email", post(api::email))
        .route("/api/orders", post(api::record_order))
        .route_layer(login_required!(Backend, login_url = "/login"));

    Router::new()
        .merge(protected)
        .route("/login", get(handlers::login_form).post(handlers::login))
        .route("/checkout/{plan}", get(handlers::checkout))
        .fallback(handlers::not_found)
        .layer(auth_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn session_key(config: &dyn ConfigPort) -> Key {
    match session_secret(config) {
        Ok(Some(bytes)) => Key::try_from(bytes.as_slice()).unwrap_or_else(|_| Key::generate()),
        Ok(None) => {
            warn!("no [auth] session_secret configured, sessions will not survive a restart");
            Key::generate()
        }
        Err(e) => {
            warn!(error = %e, "ignoring invalid session secret");
            Key::generate()
        }
    }
}

fn is_htmx_request(headers: &HeaderMap) -> bool {
    headers.get("HX-Request").is_some()
}

/// Run a store or provider call on the blocking pool. The SQLite pool and
/// the reqwest blocking clients must stay off the async workers.
async fn blocking<T, F>(state: &Arc<AppState>, f: F) -> Result<T, WebError>
where
    F: FnOnce(&AppState) -> Result<T, PropdeskError> + Send + 'static,
    T: Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| WebError::internal(format!("background task failed: {e}")))?
        .map_err(WebError::from)
}
