//! Hosted checkout redirects keyed by plan.

use std::collections::BTreeMap;
use url::Url;

use super::error::PropdeskError;
use super::rules::AccountKind;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_CHECKOUT_BASE: &str = "https://whop.com/checkout";
pub const ACCOUNT_SIZES: [u32; 5] = [5_000, 10_000, 25_000, 50_000, 100_000];
const KINDS: [AccountKind; 2] = [AccountKind::OneStep, AccountKind::Elite];

/// `one-step-100000`, `elite-25000`, ...
pub fn plan_key(kind: AccountKind, size: u32) -> String {
    format!("{}-{}", kind.as_str(), size)
}

pub fn parse_plan_key(key: &str) -> Result<(AccountKind, u32), PropdeskError> {
    let invalid = || PropdeskError::validation(format!("unknown plan '{key}'"));
    let (kind, size) = key.rsplit_once('-').ok_or_else(invalid)?;
    let kind: AccountKind = kind.parse().map_err(|_| invalid())?;
    let size: u32 = size.parse().map_err(|_| invalid())?;
    if !ACCOUNT_SIZES.contains(&size) {
        return Err(invalid());
    }
    Ok((kind, size))
}

/// Append `plan_id` as a path segment and `email` as a query parameter.
pub fn checkout_url(base: &Url, plan_id: &str, email: Option<&str>) -> Result<Url, PropdeskError> {
    if plan_id.trim().is_empty() {
        return Err(PropdeskError::validation("plan id is empty"));
    }
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| PropdeskError::validation(format!("'{base}' cannot take a path")))?
        .pop_if_empty()
        .push(plan_id.trim());
    if let Some(email) = email.map(str::trim).filter(|e| !e.is_empty()) {
        url.query_pairs_mut().append_pair("email", email);
    }
    Ok(url)
}

/// Plan ids configured under `[checkout]`, one key per plan.
#[derive(Debug, Clone)]
pub struct CheckoutCatalog {
    pub base_url: Url,
    plans: BTreeMap<String, String>,
}

impl CheckoutCatalog {
    pub fn new(base_url: Url, plans: BTreeMap<String, String>) -> Self {
        Self { base_url, plans }
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, PropdeskError> {
        let base = config
            .get_string("checkout", "base_url")
            .unwrap_or_else(|| DEFAULT_CHECKOUT_BASE.to_string());
        let base_url = Url::parse(&base).map_err(|e| PropdeskError::ConfigInvalid {
            section: "checkout".into(),
            key: "base_url".into(),
            reason: e.to_string(),
        })?;

        let mut plans = BTreeMap::new();
        for kind in KINDS {
            for size in ACCOUNT_SIZES {
                let key = plan_key(kind, size);
                if let Some(id) = config
                    .get_string("checkout", &key)
                    .filter(|v| !v.trim().is_empty())
                {
                    plans.insert(key, id.trim().to_string());
                }
            }
        }
        Ok(Self { base_url, plans })
    }

    pub fn plan_keys(&self) -> impl Iterator<Item = &str> {
        self.plans.keys().map(String::as_str)
    }

    pub fn url_for(&self, key: &str, email: Option<&str>) -> Result<Url, PropdeskError> {
        parse_plan_key(key)?;
        let plan_id = self
            .plans
            .get(key)
            .ok_or_else(|| PropdeskError::not_found("plan", key))?;
        checkout_url(&self.base_url, plan_id, email)
    }
}
