//! Trading account snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::PropdeskError;
use super::rules::AccountKind;
use crate::ports::account_port::AccountPort;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Failed,
    Funded,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Failed => "failed",
            AccountStatus::Funded => "funded",
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(AccountStatus::Active),
            "failed" => Ok(AccountStatus::Failed),
            "funded" => Ok(AccountStatus::Funded),
            other => Err(format!("unknown account status '{other}'")),
        }
    }
}

/// Challenge phase. Stored as the numeric step the trading desk uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Step {
    Challenge,
    Funded,
}

impl Step {
    pub fn number(&self) -> u8 {
        match self {
            Step::Challenge => 1,
            Step::Funded => 3,
        }
    }

    pub fn is_funded(&self) -> bool {
        *self == Step::Funded
    }
}

impl TryFrom<u8> for Step {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Step::Challenge),
            3 => Ok(Step::Funded),
            other => Err(format!("unknown step {other}")),
        }
    }
}

impl From<Step> for u8 {
    fn from(step: Step) -> u8 {
        step.number()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Mt4,
    Mt5,
}

impl Platform {
    pub fn label(&self) -> &'static str {
        match self {
            Platform::Mt4 => "MetaTrader 4",
            Platform::Mt5 => "MetaTrader 5",
        }
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mt4" | "metatrader4" => Ok(Platform::Mt4),
            "mt5" | "metatrader5" => Ok(Platform::Mt5),
            other => Err(format!("unknown platform '{other}'")),
        }
    }
}

/// Per-account document read by both the user and admin dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub account_id: String,
    pub user_id: String,
    /// Token the metrics provider expects for this account.
    pub account_token: String,
    pub kind: AccountKind,
    pub balance: f64,
    pub equity: f64,
    pub starting_balance: f64,
    pub status: AccountStatus,
    pub step: Step,
    pub platform: Platform,
    pub last_updated: Option<DateTime<Utc>>,
}

impl Account {
    pub fn is_failed(&self) -> bool {
        self.status == AccountStatus::Failed
    }

    /// A `funded` status set by the desk counts even if the step lags behind.
    pub fn is_funded(&self) -> bool {
        self.status == AccountStatus::Funded || self.step.is_funded()
    }

    /// The phase the account is evaluated in.
    pub fn effective_step(&self) -> Step {
        if self.is_funded() {
            Step::Funded
        } else {
            self.step
        }
    }

    /// Realised profit above the starting balance, never negative.
    pub fn withdrawable_profit(&self) -> f64 {
        (self.balance - self.starting_balance).max(0.0)
    }
}

/// A provisioned trading account, before it is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAccount {
    pub account_id: String,
    pub user_id: String,
    pub account_token: String,
    pub kind: AccountKind,
    pub starting_balance: f64,
    pub step: Step,
    pub platform: Platform,
}

/// Register a new account. Balance and equity start at the starting balance.
pub fn open_account<S>(store: &S, new: NewAccount) -> Result<Account, PropdeskError>
where
    S: AccountPort + ?Sized,
{
    let account_id = new.account_id.trim();
    if account_id.is_empty() || new.account_token.trim().is_empty() {
        return Err(PropdeskError::validation("account id and token are required"));
    }
    if !new.starting_balance.is_finite() || new.starting_balance <= 0.0 {
        return Err(PropdeskError::InvalidStartingBalance {
            value: new.starting_balance,
        });
    }
    if store.get_account(account_id)?.is_some() {
        return Err(PropdeskError::validation(format!(
            "account {account_id} already exists"
        )));
    }

    let account = Account {
        account_id: account_id.to_string(),
        user_id: new.user_id,
        account_token: new.account_token.trim().to_string(),
        kind: new.kind,
        balance: new.starting_balance,
        equity: new.starting_balance,
        starting_balance: new.starting_balance,
        status: if new.step == Step::Funded {
            AccountStatus::Funded
        } else {
            AccountStatus::Active
        },
        step: new.step,
        platform: new.platform,
        last_updated: None,
    };
    store.put_account(&account)?;
    info!(
        account_id = %account.account_id,
        user_id = %account.user_id,
        kind = account.kind.as_str(),
        "account opened"
    );
    Ok(account)
}
