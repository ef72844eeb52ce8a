//! HTTP request handlers for the login flow and the user dashboard.

use askama::Template;
use axum::{
    Form,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::domain::account::Account;
use crate::domain::error::PropdeskError;
use crate::domain::metrics_cache::{self, RefreshOutcome};
use crate::domain::payout::{self, PayoutRequest};

use super::templates::{
    AccountRow, AccountTemplate, DashboardTemplate, LoginTemplate, Nav, PayoutRow, plan_links,
};
use super::{AppState, AuthSession, Credentials, User, WebError, blocking, is_htmx_request};

pub(super) fn render<T: Template>(template: &T) -> Result<Response, WebError> {
    let html = template
        .render()
        .map_err(|e| WebError::internal(format!("template error: {e}")))?;
    Ok(Html(html).into_response())
}

/// Redirect after a form post. htmx requests get `HX-Redirect` so the
/// browser navigates instead of swapping the target page in.
pub(super) fn see_other(headers: &HeaderMap, location: &str) -> Response {
    if is_htmx_request(headers) {
        match HeaderValue::from_str(location) {
            Ok(value) => {
                let mut response = StatusCode::NO_CONTENT.into_response();
                response.headers_mut().insert("HX-Redirect", value);
                response
            }
            Err(_) => Redirect::to(location).into_response(),
        }
    } else {
        Redirect::to(location).into_response()
    }
}

pub(super) fn current_user(auth: &AuthSession) -> Result<User, WebError> {
    auth.user
        .clone()
        .ok_or_else(|| WebError::new(StatusCode::UNAUTHORIZED, "Please sign in."))
}

pub(super) fn require_admin(auth: &AuthSession) -> Result<User, WebError> {
    let user = current_user(auth)?;
    if user.is_admin {
        Ok(user)
    } else {
        Err(WebError::forbidden())
    }
}

pub(super) fn nav(user: &User) -> Nav {
    Nav {
        email: user.email.clone(),
        is_admin: user.is_admin,
    }
}

/// Only same-site paths are honoured as a post-login target.
fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") => path,
        _ => "/",
    }
}

#[derive(Debug, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

pub async fn login_form(Query(query): Query<NextQuery>) -> Result<Response, WebError> {
    render(&LoginTemplate {
        nav: None,
        error: None,
        email: String::new(),
        next: query.next.unwrap_or_default(),
    })
}

pub async fn login(
    mut auth_session: AuthSession,
    Form(creds): Form<Credentials>,
) -> Result<Response, WebError> {
    let email = creds.email.clone();
    let next = creds.next.clone();

    let user = match auth_session.authenticate(creds).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            info!(email = %email.trim(), "failed login");
            return render(&LoginTemplate {
                nav: None,
                error: Some("Invalid email or password".to_string()),
                email,
                next: next.unwrap_or_default(),
            });
        }
        Err(e) => return Err(WebError::internal(e.to_string())),
    };

    auth_session
        .login(&user)
        .await
        .map_err(|e| WebError::internal(e.to_string()))?;
    info!(user_id = %user.id, "signed in");
    Ok(Redirect::to(safe_next(next.as_deref())).into_response())
}

pub async fn logout(mut auth_session: AuthSession) -> Result<Response, WebError> {
    auth_session
        .logout()
        .await
        .map_err(|e| WebError::internal(e.to_string()))?;
    Ok(Redirect::to("/login").into_response())
}

pub async fn dashboard(
    auth_session: AuthSession,
    State(state): State<Arc<AppState>>,
) -> Result<Response, WebError> {
    let user = current_user(&auth_session)?;
    let user_id = user.id.clone();
    let (accounts, payouts) = blocking(&state, move |s| {
        let accounts = s.store.accounts_for_user(&user_id)?;
        let mut payouts: Vec<PayoutRequest> = s
            .store
            .list_payouts()?
            .into_iter()
            .filter(|p| p.user_id == user_id)
            .collect();
        payouts.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        Ok((accounts, payouts))
    })
    .await?;

    render(&DashboardTemplate {
        nav: Some(nav(&user)),
        name: user.display_name.clone(),
        accounts: accounts.iter().map(AccountRow::from).collect(),
        payouts: payouts.iter().map(PayoutRow::from).collect(),
        plans: plan_links(&state.checkout),
    })
}

/// The account, if `user` owns it or is an admin. Anything else reads as
/// not found.
pub(super) fn visible_account(
    state: &AppState,
    user: &User,
    account_id: &str,
) -> Result<Account, PropdeskError> {
    state
        .store
        .get_account(account_id)?
        .filter(|a| user.is_admin || a.user_id == user.id)
        .ok_or_else(|| PropdeskError::not_found("account", account_id))
}

pub async fn account_detail(
    auth_session: AuthSession,
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<String>,
) -> Result<Response, WebError> {
    let user = current_user(&auth_session)?;
    let viewer = user.clone();
    let (account, view) = blocking(&state, move |s| {
        visible_account(s, &viewer, &account_id)?;
        let view = metrics_cache::load(
            s.store.as_ref(),
            s.metrics.as_ref(),
            s.email.as_ref(),
            &account_id,
            Utc::now(),
            s.cache_ttl,
        )?;
        // A refresh inside `load` may have updated the snapshot.
        let account = visible_account(s, &viewer, &account_id)?;
        Ok((account, view))
    })
    .await?;

    render(&AccountTemplate::build(nav(&user), &account, &view))
}

pub async fn refresh_account(
    auth_session: AuthSession,
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, WebError> {
    let user = current_user(&auth_session)?;
    let location = format!("/accounts/{account_id}");
    let outcome = blocking(&state, move |s| {
        visible_account(s, &user, &account_id)?;
        metrics_cache::refresh(
            s.store.as_ref(),
            s.metrics.as_ref(),
            s.email.as_ref(),
            &account_id,
            Utc::now(),
        )
    })
    .await?;

    if let RefreshOutcome::Frozen = outcome {
        return Err(WebError::bad_request(
            "This account has failed; its metrics are no longer refreshed.",
        ));
    }
    Ok(see_other(&headers, &location))
}

#[derive(Debug, Deserialize)]
pub struct PayoutForm {
    pub amount: f64,
    pub method: String,
}

pub async fn request_payout(
    auth_session: AuthSession,
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<String>,
    headers: HeaderMap,
    Form(form): Form<PayoutForm>,
) -> Result<Response, WebError> {
    let user = current_user(&auth_session)?;
    blocking(&state, move |s| {
        payout::request_payout(
            s.store.as_ref(),
            &user.id,
            &account_id,
            form.amount,
            &form.method,
            Utc::now(),
        )
    })
    .await?;
    Ok(see_other(&headers, "/"))
}

#[derive(Debug, Deserialize)]
pub struct CheckoutQuery {
    pub email: Option<String>,
}

pub async fn checkout(
    State(state): State<Arc<AppState>>,
    Path(plan): Path<String>,
    Query(query): Query<CheckoutQuery>,
) -> Result<Response, WebError> {
    let url = state.checkout.url_for(&plan, query.email.as_deref())?;
    info!(plan = %plan, "checkout redirect");
    Ok(Redirect::to(url.as_str()).into_response())
}

pub async fn not_found() -> WebError {
    WebError::not_found("Page not found.")
}
