//! Trading objective evaluation.
//!
//! Every percentage is expressed against the account's starting balance and
//! rounded to two decimals before it is compared with its threshold, so the
//! dashboard and the pass/fail flags always agree.

use serde::{Deserialize, Serialize};

use super::error::PropdeskError;
use super::rules::{AccountKind, RuleSet};

/// Figures an evaluation is computed from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectiveInputs {
    pub kind: AccountKind,
    /// Funded accounts are no longer chasing a profit target.
    pub funded: bool,
    pub starting_balance: f64,
    pub balance: f64,
    pub equity: f64,
    /// Worst drawdown the provider has observed, percent of starting balance.
    pub max_drawdown_pct: f64,
    /// Worst single-day loss the provider has observed, in percent.
    pub max_daily_drawdown_pct: f64,
    pub trading_days: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Objective {
    pub target: Option<f64>,
    pub current: f64,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recent_breach: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_static: Option<bool>,
}

impl Objective {
    fn at_most(current: f64, target: f64) -> Self {
        Self {
            target: Some(target),
            current,
            passed: current <= target,
            recent_breach: None,
            is_static: None,
        }
    }

    fn at_least(current: f64, target: f64) -> Self {
        Self {
            target: Some(target),
            current,
            passed: current >= target,
            recent_breach: None,
            is_static: None,
        }
    }

    fn unbounded(current: f64) -> Self {
        Self {
            target: None,
            current,
            passed: true,
            recent_breach: None,
            is_static: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradingObjectives {
    pub min_trading_days: Objective,
    pub max_drawdown: Objective,
    pub max_daily_drawdown: Objective,
    pub profit_target: Objective,
}

impl TradingObjectives {
    /// True when a loss rule has been violated, which ends a challenge.
    pub fn breached(&self) -> bool {
        !self.max_drawdown.passed || !self.max_daily_drawdown.passed
    }

    pub fn all_passed(&self) -> bool {
        self.min_trading_days.passed
            && self.max_drawdown.passed
            && self.max_daily_drawdown.passed
            && self.profit_target.passed
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn pct_of(amount: f64, starting_balance: f64) -> f64 {
    round2(amount * 100.0 / starting_balance)
}

/// Profit relative to the starting balance, in percent.
pub fn profit_pct(balance: f64, starting_balance: f64) -> f64 {
    pct_of(balance - starting_balance, starting_balance)
}

/// Drawdown from the original starting balance, ignoring any peak reached
/// since. Uses the lower of balance and equity so open losses count.
pub fn static_drawdown_pct(balance: f64, equity: f64, starting_balance: f64) -> f64 {
    let low = balance.min(equity);
    pct_of((starting_balance - low).max(0.0), starting_balance)
}

pub fn evaluate(inputs: &ObjectiveInputs) -> Result<TradingObjectives, PropdeskError> {
    let start = inputs.starting_balance;
    if !start.is_finite() || start <= 0.0 {
        return Err(PropdeskError::InvalidStartingBalance { value: start });
    }

    let rules = RuleSet::for_kind(inputs.kind);

    let min_trading_days = Objective::at_least(
        f64::from(inputs.trading_days),
        f64::from(rules.min_trading_days),
    );

    let instantaneous = static_drawdown_pct(inputs.balance, inputs.equity, start);
    let worst = round2(inputs.max_drawdown_pct.max(instantaneous));
    let mut max_drawdown = match rules.max_drawdown_pct {
        Some(limit) => {
            let mut objective = Objective::at_most(worst, limit);
            objective.recent_breach = Some(instantaneous > limit);
            objective
        }
        None => Objective::unbounded(worst),
    };
    max_drawdown.is_static = Some(true);

    let mut max_daily_drawdown = Objective::at_most(
        round2(inputs.max_daily_drawdown_pct),
        rules.max_daily_loss_pct,
    );
    max_daily_drawdown.is_static = Some(!rules.daily_loss_trailing);

    let profit = profit_pct(inputs.balance, start);
    let profit_target = if inputs.funded {
        Objective::unbounded(profit)
    } else {
        Objective::at_least(profit, rules.profit_target_pct)
    };

    Ok(TradingObjectives {
        min_trading_days,
        max_drawdown,
        max_daily_drawdown,
        profit_target,
    })
}
