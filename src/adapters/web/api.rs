//! JSON routes: metrics proxy, email dispatch and order intake.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::info;

use crate::domain::email::{self, OutboundEmail};
use crate::domain::metrics::{MetricsRequest, MetricsResponse};
use crate::domain::order::{self, NewOrder, Order};

use super::error::ApiError;
use super::handlers::{current_user, require_admin};
use super::{AppState, AuthSession, blocking};

/// Fetch a report from the provider and evaluate its objectives. Nothing is
/// cached; the dashboard pages own the cache.
pub async fn metrics(
    auth_session: AuthSession,
    State(state): State<Arc<AppState>>,
    Json(request): Json<MetricsRequest>,
) -> Result<Json<MetricsResponse>, ApiError> {
    current_user(&auth_session)?;
    let response = blocking(&state, move |s| {
        let report = s.metrics.fetch_report(&request)?;
        MetricsResponse::evaluate(&request, report)
    })
    .await?;
    Ok(Json(response))
}

pub async fn email(
    auth_session: AuthSession,
    State(state): State<Arc<AppState>>,
    Json(outbound): Json<OutboundEmail>,
) -> Result<Json<Value>, ApiError> {
    let admin = require_admin(&auth_session)?;
    let id = blocking(&state, move |s| email::dispatch(s.email.as_ref(), &outbound)).await?;
    info!(admin = %admin.id, message_id = %id, "email dispatched");
    Ok(Json(json!({ "id": id })))
}

pub async fn record_order(
    auth_session: AuthSession,
    State(state): State<Arc<AppState>>,
    Json(new_order): Json<NewOrder>,
) -> Result<impl IntoResponse, ApiError> {
    current_user(&auth_session)?;
    let order: Order = blocking(&state, move |s| {
        order::record_order(s.store.as_ref(), new_order, Utc::now())
    })
    .await?;
    Ok((StatusCode::CREATED, Json(order)))
}
