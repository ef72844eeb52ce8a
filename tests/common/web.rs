use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use http_body_util::BodyExt;
use propdesk::adapters::sqlite_adapter::SqliteAdapter;
use propdesk::adapters::web::{AppState, build_router};
use propdesk::domain::checkout::CheckoutCatalog;
use propdesk::domain::metrics_cache::default_ttl;
use propdesk::domain::user::{self, UserRecord};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower::ServiceExt;
use url::Url;

use super::{MockConfigPort, MockEmailPort, MockMetricsPort, t0, test_store};

pub const PASSWORD: &str = "correct-horse";
pub const USER_EMAIL: &str = "ana@example.com";
pub const ADMIN_EMAIL: &str = "desk@example.com";

pub struct TestApp {
    pub router: Router,
    pub store: Arc<SqliteAdapter>,
    pub email: Arc<MockEmailPort>,
    pub metrics: Arc<MockMetricsPort>,
    pub user: UserRecord,
    pub admin: UserRecord,
}

pub fn config() -> MockConfigPort {
    MockConfigPort::new()
        .with("auth", "session_secret", &"01".repeat(64))
        .with("auth", "session_lifetime", "3600")
}

/// A router over an in-memory store holding one regular user and one admin.
pub fn create_app(metrics: MockMetricsPort) -> TestApp {
    let store = test_store();
    let user = user::create_user(&store, USER_EMAIL, PASSWORD, false, t0()).unwrap();
    let admin = user::create_user(&store, ADMIN_EMAIL, PASSWORD, true, t0()).unwrap();

    let store = Arc::new(store);
    let email = Arc::new(MockEmailPort::new());
    let metrics = Arc::new(metrics);
    let plans = BTreeMap::from([("one-step-100000".to_string(), "plan_100k".to_string())]);

    let router = build_router(AppState {
        store: store.clone(),
        metrics: metrics.clone(),
        email: email.clone(),
        config: Arc::new(config()),
        checkout: CheckoutCatalog::new(Url::parse("https://whop.com/checkout").unwrap(), plans),
        cache_ttl: default_ttl(),
    });

    TestApp {
        router,
        store,
        email,
        metrics,
        user,
        admin,
    }
}

pub fn extract_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .collect()
}

pub fn build_cookie_header(set_cookies: &[String]) -> String {
    set_cookies
        .iter()
        .map(|sc| sc.split(';').next().unwrap_or("").to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn login_request(email: &str, password: &str, next: Option<&str>) -> Request<Body> {
    let mut form = url::form_urlencoded::Serializer::new(String::new());
    form.append_pair("email", email).append_pair("password", password);
    if let Some(next) = next {
        form.append_pair("next", next);
    }
    Request::builder()
        .method("POST")
        .uri("/login")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.finish()))
        .unwrap()
}

/// Log in and return the cookie header for later requests.
pub async fn login(router: &Router, email: &str) -> String {
    let response = router
        .clone()
        .oneshot(login_request(email, PASSWORD, None))
        .await
        .unwrap();
    assert_eq!(response.status(), 303, "login for {email} failed");
    build_cookie_header(&extract_cookies(&response))
}

pub fn get(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

pub fn post_form(uri: &str, cookie: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::COOKIE, cookie)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn post_json(uri: &str, cookie: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::COOKIE, cookie)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8_lossy(&body).to_string()
}

pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
