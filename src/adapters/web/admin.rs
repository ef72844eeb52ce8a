//! Admin back office: orders, users and KYC, payouts, accounts.
//!
//! Every handler checks the admin flag first. Mutations redirect back to
//! the list they came from; destructive ones need a typed confirmation.

use axum::{
    Form,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::Response,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use crate::domain::error::PropdeskError;
use crate::domain::listing::DEFAULT_PER_PAGE;
use crate::domain::order::{self, OrderFilter, OrderKind, OrderStatus};
use crate::domain::payout::{self, PayoutFilter, PayoutStatus};
use crate::domain::user::{self, KycStatus, UserFilter};

use super::handlers::{nav, render, require_admin, see_other};
use super::templates::{
    AccountRow, AdminAccountsTemplate, AdminOrdersTemplate, AdminPayoutsTemplate,
    AdminUsersTemplate, Notice, OrderRow, Pager, PayoutRow, UserRow, select_options,
};
use super::{AppState, AuthSession, WebError, blocking};

/// An empty form value means "no filter".
fn parse_optional<T: std::str::FromStr<Err = String>>(
    value: &str,
) -> Result<Option<T>, PropdeskError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value.parse().map(Some).map_err(PropdeskError::validation)
}

fn parse_required<T: std::str::FromStr<Err = String>>(value: &str) -> Result<T, PropdeskError> {
    value.trim().parse().map_err(PropdeskError::validation)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct OrderQuery {
    pub q: String,
    pub status: String,
    pub kind: String,
    pub page: Option<usize>,
}

pub async fn orders(
    auth_session: AuthSession,
    State(state): State<Arc<AppState>>,
    Query(query): Query<OrderQuery>,
) -> Result<Response, WebError> {
    let admin = require_admin(&auth_session)?;
    let filter = OrderFilter {
        text: query.q.clone(),
        status: parse_optional::<OrderStatus>(&query.status)?,
        kind: parse_optional::<OrderKind>(&query.kind)?,
    };
    let page_number = query.page.unwrap_or(1);
    let page = blocking(&state, move |s| {
        order::list_orders(s.store.as_ref(), &filter, page_number, DEFAULT_PER_PAGE)
    })
    .await?;

    render(&AdminOrdersTemplate {
        nav: Some(nav(&admin)),
        rows: page.items.iter().map(OrderRow::from).collect(),
        status_filter: select_options(OrderStatus::ALL.iter().map(|s| s.as_str()), &query.status),
        kind_filter: select_options(["crypto", "card"], &query.kind),
        pager: Pager::new(
            &page,
            "/admin/orders",
            &[("q", &query.q), ("status", &query.status), ("kind", &query.kind)],
        ),
        query: query.q,
    })
}

#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub status: String,
}

pub async fn order_status(
    auth_session: AuthSession,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Form(form): Form<StatusForm>,
) -> Result<Response, WebError> {
    require_admin(&auth_session)?;
    let status: OrderStatus = parse_required(&form.status)?;
    blocking(&state, move |s| {
        order::set_order_status(s.store.as_ref(), s.email.as_ref(), &id, status, Utc::now())
    })
    .await?;
    Ok(see_other(&headers, "/admin/orders"))
}

pub async fn order_toggle(
    auth_session: AuthSession,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, WebError> {
    require_admin(&auth_session)?;
    blocking(&state, move |s| {
        order::toggle_order_status(s.store.as_ref(), s.email.as_ref(), &id, Utc::now())
    })
    .await?;
    Ok(see_other(&headers, "/admin/orders"))
}

#[derive(Debug, Deserialize)]
pub struct NotesForm {
    #[serde(default)]
    pub notes: String,
}

pub async fn order_notes(
    auth_session: AuthSession,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Form(form): Form<NotesForm>,
) -> Result<Response, WebError> {
    require_admin(&auth_session)?;
    blocking(&state, move |s| {
        order::update_order_notes(s.store.as_ref(), &id, &form.notes, Utc::now())
    })
    .await?;
    Ok(see_other(&headers, "/admin/orders"))
}

#[derive(Debug, Deserialize)]
pub struct ConfirmForm {
    #[serde(default)]
    pub confirm: String,
}

pub async fn order_delete(
    auth_session: AuthSession,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Form(form): Form<ConfirmForm>,
) -> Result<Response, WebError> {
    require_admin(&auth_session)?;
    blocking(&state, move |s| order::delete_order(s.store.as_ref(), &id, &form.confirm)).await?;
    Ok(see_other(&headers, "/admin/orders"))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UserQuery {
    pub q: String,
    pub kyc: String,
    pub missing: String,
    pub page: Option<usize>,
    /// Set after a sync: how many profiles were created.
    pub synced: Option<usize>,
}

pub async fn users(
    auth_session: AuthSession,
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> Result<Response, WebError> {
    let admin = require_admin(&auth_session)?;
    let missing_only = matches!(query.missing.as_str(), "1" | "true" | "on");
    let filter = UserFilter {
        text: query.q.clone(),
        kyc_status: parse_optional::<KycStatus>(&query.kyc)?,
        missing_profile_only: missing_only,
    };
    let page_number = query.page.unwrap_or(1);
    let page = blocking(&state, move |s| {
        user::list_users(s.store.as_ref(), &filter, page_number, DEFAULT_PER_PAGE)
    })
    .await?;

    let missing_param = if missing_only { "1" } else { "" };
    render(&AdminUsersTemplate {
        nav: Some(nav(&admin)),
        notice: query
            .synced
            .map(|n| Notice::info(format!("Sync finished: {n} profile(s) created."))),
        rows: page.items.iter().map(UserRow::from).collect(),
        kyc_filter: select_options(KycStatus::ALL.iter().map(|k| k.as_str()), &query.kyc),
        missing_only,
        pager: Pager::new(
            &page,
            "/admin/users",
            &[("q", &query.q), ("kyc", &query.kyc), ("missing", missing_param)],
        ),
        query: query.q,
    })
}

pub async fn users_sync(
    auth_session: AuthSession,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, WebError> {
    require_admin(&auth_session)?;
    let report = blocking(&state, |s| user::sync_users(s.store.as_ref(), Utc::now())).await?;
    Ok(see_other(
        &headers,
        &format!("/admin/users?synced={}", report.created.len()),
    ))
}

#[derive(Debug, Deserialize)]
pub struct KycForm {
    pub status: String,
    #[serde(default)]
    pub note: String,
}

pub async fn user_kyc(
    auth_session: AuthSession,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Form(form): Form<KycForm>,
) -> Result<Response, WebError> {
    require_admin(&auth_session)?;
    let status: KycStatus = parse_required(&form.status)?;
    blocking(&state, move |s| {
        user::set_kyc_status(
            s.store.as_ref(),
            s.email.as_ref(),
            &id,
            status,
            Some(form.note.as_str()),
        )
    })
    .await?;
    Ok(see_other(&headers, "/admin/users"))
}

#[derive(Debug, Deserialize)]
pub struct DeleteUserForm {
    #[serde(default)]
    pub confirm_email: String,
}

pub async fn user_delete(
    auth_session: AuthSession,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Form(form): Form<DeleteUserForm>,
) -> Result<Response, WebError> {
    let admin = require_admin(&auth_session)?;
    if admin.id == id {
        return Err(WebError::bad_request("You cannot delete your own user."));
    }
    blocking(&state, move |s| {
        user::delete_user(s.store.as_ref(), &id, &form.confirm_email)
    })
    .await?;
    Ok(see_other(&headers, "/admin/users"))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PayoutQuery {
    pub q: String,
    pub status: String,
    pub page: Option<usize>,
}

pub async fn payouts(
    auth_session: AuthSession,
    State(state): State<Arc<AppState>>,
    Query(query): Query<PayoutQuery>,
) -> Result<Response, WebError> {
    let admin = require_admin(&auth_session)?;
    let filter = PayoutFilter {
        text: query.q.clone(),
        status: parse_optional::<PayoutStatus>(&query.status)?,
    };
    let page_number = query.page.unwrap_or(1);
    let page = blocking(&state, move |s| {
        payout::list_payouts(s.store.as_ref(), &filter, page_number, DEFAULT_PER_PAGE)
    })
    .await?;

    render(&AdminPayoutsTemplate {
        nav: Some(nav(&admin)),
        rows: page.items.iter().map(PayoutRow::from).collect(),
        status_filter: select_options(PayoutStatus::ALL.iter().map(|s| s.as_str()), &query.status),
        pager: Pager::new(
            &page,
            "/admin/payouts",
            &[("q", &query.q), ("status", &query.status)],
        ),
        query: query.q,
    })
}

pub async fn payout_status(
    auth_session: AuthSession,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Form(form): Form<StatusForm>,
) -> Result<Response, WebError> {
    require_admin(&auth_session)?;
    let status: PayoutStatus = parse_required(&form.status)?;
    blocking(&state, move |s| {
        payout::set_payout_status(s.store.as_ref(), s.email.as_ref(), &id, status, Utc::now())
    })
    .await?;
    Ok(see_other(&headers, "/admin/payouts"))
}

pub async fn accounts(
    auth_session: AuthSession,
    State(state): State<Arc<AppState>>,
) -> Result<Response, WebError> {
    let admin = require_admin(&auth_session)?;
    let mut accounts = blocking(&state, |s| s.store.list_accounts()).await?;
    accounts.sort_by(|a, b| a.account_id.cmp(&b.account_id));
    render(&AdminAccountsTemplate {
        nav: Some(nav(&admin)),
        rows: accounts.iter().map(AccountRow::from).collect(),
    })
}
