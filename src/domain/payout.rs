//! Payout requests from funded accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

use super::email::{EmailTemplate, send_template};
use super::error::PropdeskError;
use super::ids::new_id;
use super::listing::{Page, matches_text, paginate};
use crate::ports::account_port::AccountPort;
use crate::ports::email_port::EmailPort;
use crate::ports::payout_port::PayoutPort;
use crate::ports::user_port::ProfilePort;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayoutStatus {
    Pending,
    Approved,
    Paid,
    Rejected,
}

impl PayoutStatus {
    pub const ALL: [PayoutStatus; 4] = [
        PayoutStatus::Pending,
        PayoutStatus::Approved,
        PayoutStatus::Paid,
        PayoutStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Pending => "pending",
            PayoutStatus::Approved => "approved",
            PayoutStatus::Paid => "paid",
            PayoutStatus::Rejected => "rejected",
        }
    }

    /// Counts against the account's profit. Rejected requests release it.
    pub fn claims_profit(&self) -> bool {
        !matches!(self, PayoutStatus::Rejected)
    }

    /// pending -> approved -> paid, and pending/approved -> rejected.
    pub fn can_move_to(&self, next: PayoutStatus) -> bool {
        matches!(
            (self, next),
            (PayoutStatus::Pending, PayoutStatus::Approved)
                | (PayoutStatus::Pending, PayoutStatus::Rejected)
                | (PayoutStatus::Approved, PayoutStatus::Paid)
                | (PayoutStatus::Approved, PayoutStatus::Rejected)
        )
    }
}

impl fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PayoutStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PayoutStatus::ALL
            .into_iter()
            .find(|p| p.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| format!("unknown payout status '{}'", s.trim()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutRequest {
    pub id: String,
    pub user_id: String,
    pub account_id: String,
    pub amount: f64,
    pub currency: String,
    pub method: String,
    pub status: PayoutStatus,
    pub requested_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PayoutFilter {
    pub text: String,
    pub status: Option<PayoutStatus>,
}

impl PayoutFilter {
    pub fn matches(&self, payout: &PayoutRequest) -> bool {
        self.status.is_none_or(|s| s == payout.status)
            && matches_text(
                &self.text,
                &[&payout.id, &payout.user_id, &payout.account_id, &payout.method],
            )
    }
}

/// Ask for a payout from a funded account the user owns. The amount must
/// be positive and fit in the profit above the starting balance that earlier
/// pending, approved or paid requests have not already claimed.
pub fn request_payout<S>(
    store: &S,
    user_id: &str,
    account_id: &str,
    amount: f64,
    method: &str,
    now: DateTime<Utc>,
) -> Result<PayoutRequest, PropdeskError>
where
    S: AccountPort + PayoutPort + ?Sized,
{
    let account = store
        .get_account(account_id)?
        .filter(|a| a.user_id == user_id)
        .ok_or_else(|| PropdeskError::not_found("account", account_id))?;

    if !account.is_funded() || account.is_failed() {
        return Err(PropdeskError::validation(
            "payouts are only available on funded accounts",
        ));
    }
    if !amount.is_finite() || amount <= 0.0 {
        return Err(PropdeskError::validation("payout amount must be positive"));
    }
    let committed: f64 = store
        .list_payouts()?
        .iter()
        .filter(|p| p.account_id == account.account_id && p.status.claims_profit())
        .map(|p| p.amount)
        .sum();
    let available = (account.withdrawable_profit() - committed).max(0.0);
    if amount > available {
        return Err(PropdeskError::validation(format!(
            "payout amount exceeds available profit of {available:.2}"
        )));
    }
    if method.trim().is_empty() {
        return Err(PropdeskError::validation("payout method is required"));
    }

    let payout = PayoutRequest {
        id: new_id("pay"),
        user_id: user_id.to_string(),
        account_id: account_id.to_string(),
        amount,
        currency: "USD".to_string(),
        method: method.trim().to_string(),
        status: PayoutStatus::Pending,
        requested_at: now,
        updated_at: now,
    };
    store.put_payout(&payout)?;
    info!(payout_id = %payout.id, account_id = %account_id, amount, "payout requested");
    Ok(payout)
}

/// Newest first.
pub fn list_payouts<S>(
    store: &S,
    filter: &PayoutFilter,
    page: usize,
    per_page: usize,
) -> Result<Page<PayoutRequest>, PropdeskError>
where
    S: PayoutPort + ?Sized,
{
    let mut payouts: Vec<PayoutRequest> = store
        .list_payouts()?
        .into_iter()
        .filter(|p| filter.matches(p))
        .collect();
    payouts.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
    Ok(paginate(payouts, page, per_page))
}

/// Move a payout along its lifecycle. Reaching `paid` emails the user.
pub fn set_payout_status<S>(
    store: &S,
    mailer: &dyn EmailPort,
    payout_id: &str,
    status: PayoutStatus,
    now: DateTime<Utc>,
) -> Result<PayoutRequest, PropdeskError>
where
    S: PayoutPort + ProfilePort + ?Sized,
{
    let mut payout = store
        .get_payout(payout_id)?
        .ok_or_else(|| PropdeskError::not_found("payout", payout_id))?;
    if !payout.status.can_move_to(status) {
        return Err(PropdeskError::validation(format!(
            "cannot move payout from {} to {}",
            payout.status, status
        )));
    }
    payout.status = status;
    payout.updated_at = now;
    store.put_payout(&payout)?;
    info!(payout_id = %payout_id, status = %status, "payout status changed");

    if status == PayoutStatus::Paid {
        match store.get_profile(&payout.user_id)? {
            Some(profile) => {
                let template = EmailTemplate::PayoutProcessed {
                    name: profile.display_name.clone(),
                    amount: payout.amount,
                    currency: payout.currency.clone(),
                };
                if let Err(e) = send_template(mailer, &profile.email, &template) {
                    warn!(payout_id = %payout_id, error = %e, "payout email not sent");
                }
            }
            None => warn!(payout_id = %payout_id, "no profile to notify about payout"),
        }
    }
    Ok(payout)
}
