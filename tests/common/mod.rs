#![allow(dead_code)]

#[cfg(feature = "web")]
pub mod web;

use chrono::{DateTime, TimeZone, Utc};
use propdesk::adapters::sqlite_adapter::SqliteAdapter;
use propdesk::domain::account::{Account, AccountStatus, Platform, Step};
use propdesk::domain::email::EmailMessage;
use propdesk::domain::error::PropdeskError;
use propdesk::domain::metrics::{AccountMetrics, MetricsRequest, UpstreamReport};
use propdesk::domain::order::{Customer, NewOrder, OrderKind, Payment};
use propdesk::domain::rules::AccountKind;
use propdesk::ports::config_port::ConfigPort;
use propdesk::ports::email_port::EmailPort;
use propdesk::ports::metrics_port::MetricsPort;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap()
}

pub struct MockMetricsPort {
    pub reports: HashMap<String, UpstreamReport>,
    pub error: Option<String>,
    calls: AtomicUsize,
}

impl MockMetricsPort {
    pub fn new() -> Self {
        Self {
            reports: HashMap::new(),
            error: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_report(mut self, account_id: &str, report: UpstreamReport) -> Self {
        self.reports.insert(account_id.to_string(), report);
        self
    }

    pub fn failing(mut self, reason: &str) -> Self {
        self.error = Some(reason.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MetricsPort for MockMetricsPort {
    fn fetch_report(&self, request: &MetricsRequest) -> Result<UpstreamReport, PropdeskError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = &self.error {
            return Err(PropdeskError::Upstream {
                reason: reason.clone(),
            });
        }
        self.reports
            .get(&request.account_id)
            .cloned()
            .ok_or_else(|| PropdeskError::Upstream {
                reason: "no metrics data available".to_string(),
            })
    }
}

#[derive(Default)]
pub struct MockEmailPort {
    pub sent: Mutex<Vec<EmailMessage>>,
    pub fail: bool,
}

impl MockEmailPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

impl EmailPort for MockEmailPort {
    fn send(&self, message: &EmailMessage) -> Result<String, PropdeskError> {
        if self.fail {
            return Err(PropdeskError::Email {
                reason: "provider unavailable".to_string(),
            });
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(message.clone());
        Ok(format!("msg_{}", sent.len()))
    }
}

/// Section/key lookup backed by a map; unknown keys fall back to defaults.
#[derive(Default)]
pub struct MockConfigPort {
    pub values: HashMap<(String, String), String>,
}

impl MockConfigPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, section: &str, key: &str, value: &str) -> Self {
        self.values
            .insert((section.to_string(), key.to_string()), value.to_string());
        self
    }
}

impl ConfigPort for MockConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.values
            .get(&(section.to_string(), key.to_string()))
            .cloned()
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.get_string(section, key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.get_string(section, key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.get_string(section, key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }
}

pub fn test_store() -> SqliteAdapter {
    let store = SqliteAdapter::in_memory().unwrap();
    store.initialize_schema().unwrap();
    store
}

pub fn make_account(account_id: &str, user_id: &str, kind: AccountKind, size: f64) -> Account {
    Account {
        account_id: account_id.to_string(),
        user_id: user_id.to_string(),
        account_token: format!("tok-{account_id}"),
        kind,
        balance: size,
        equity: size,
        starting_balance: size,
        status: AccountStatus::Active,
        step: Step::Challenge,
        platform: Platform::Mt5,
        last_updated: None,
    }
}

pub fn funded_account(account_id: &str, user_id: &str, size: f64, balance: f64) -> Account {
    Account {
        balance,
        equity: balance,
        status: AccountStatus::Funded,
        step: Step::Funded,
        ..make_account(account_id, user_id, AccountKind::OneStep, size)
    }
}

pub fn report(balance: f64, equity: f64, max_drawdown: f64, trading_days: u32) -> UpstreamReport {
    UpstreamReport {
        metrics: AccountMetrics {
            balance,
            equity,
            max_drawdown,
            trading_days,
            ..AccountMetrics::default()
        },
        ..UpstreamReport::default()
    }
}

pub fn new_order(email: &str, kind: OrderKind) -> NewOrder {
    NewOrder {
        kind,
        challenge_type: AccountKind::OneStep,
        challenge_amount: 100_000.0,
        customer: Customer {
            first_name: "Ana".to_string(),
            last_name: "Silva".to_string(),
            email: email.to_string(),
            country: Some("PT".to_string()),
            phone: None,
        },
        payment: Payment {
            method: kind.as_str().to_string(),
            amount: 549.0,
            currency: "USD".to_string(),
            transaction_id: Some("tx-100".to_string()),
            wallet_address: None,
            network: None,
        },
    }
}
