//! Challenge rule table keyed by account kind.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The challenge programme an account was bought under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccountKind {
    OneStep,
    Elite,
}

impl AccountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountKind::OneStep => "one-step",
            AccountKind::Elite => "elite",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AccountKind::OneStep => "1-Step",
            AccountKind::Elite => "Elite",
        }
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "one-step" | "onestep" | "1-step" | "1step" | "one_step" => Ok(AccountKind::OneStep),
            "elite" => Ok(AccountKind::Elite),
            other => Err(format!("unknown account kind '{other}'")),
        }
    }
}

/// Thresholds applied to an account, all in percent of the starting balance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleSet {
    pub profit_target_pct: f64,
    pub max_daily_loss_pct: f64,
    /// Elite measures the daily loss from the trailing end-of-day balance.
    pub daily_loss_trailing: bool,
    /// `None` means the kind has no total drawdown ceiling.
    pub max_drawdown_pct: Option<f64>,
    pub min_trading_days: u32,
}

const ONE_STEP: RuleSet = RuleSet {
    profit_target_pct: 8.0,
    max_daily_loss_pct: 4.0,
    daily_loss_trailing: false,
    max_drawdown_pct: Some(6.0),
    min_trading_days: 0,
};

const ELITE: RuleSet = RuleSet {
    profit_target_pct: 10.0,
    max_daily_loss_pct: 10.0,
    daily_loss_trailing: true,
    max_drawdown_pct: None,
    min_trading_days: 0,
};

impl RuleSet {
    pub const fn for_kind(kind: AccountKind) -> RuleSet {
        match kind {
            AccountKind::OneStep => ONE_STEP,
            AccountKind::Elite => ELITE,
        }
    }
}
