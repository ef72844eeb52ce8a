//! Account metrics as reported by the upstream metrics provider.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::account::{Account, Step};
use super::error::PropdeskError;
use super::objectives::{self, ObjectiveInputs, TradingObjectives};
use super::rules::AccountKind;

/// Body of a metrics lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsRequest {
    pub account_id: String,
    pub account_token: String,
    pub account_type: AccountKind,
    pub account_size: f64,
    pub step: Step,
}

impl MetricsRequest {
    pub fn for_account(account: &Account) -> Self {
        Self {
            account_id: account.account_id.clone(),
            account_token: account.account_token.clone(),
            account_type: account.kind,
            account_size: account.starting_balance,
            step: account.effective_step(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccountMetrics {
    pub balance: f64,
    pub equity: f64,
    /// Percent of the starting balance.
    pub max_drawdown: f64,
    pub max_daily_drawdown: f64,
    pub trading_days: u32,
    pub trades: u32,
    pub won_trades: u32,
    pub lost_trades: u32,
    pub profit: f64,
    pub lots: f64,
    pub win_rate: Option<f64>,
    pub average_win: Option<f64>,
    pub average_loss: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub id: String,
    pub symbol: String,
    #[serde(rename = "type")]
    pub side: String,
    pub volume: f64,
    pub open_time: DateTime<Utc>,
    pub close_time: Option<DateTime<Utc>>,
    pub open_price: f64,
    pub close_price: Option<f64>,
    pub profit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquityPoint {
    pub time: DateTime<Utc>,
    pub balance: f64,
    pub equity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ThresholdType {
    DailyDrawdown,
    MaxDrawdown,
    #[serde(other)]
    Other,
}

impl ThresholdType {
    pub fn label(&self) -> &'static str {
        match self {
            ThresholdType::DailyDrawdown => "daily drawdown",
            ThresholdType::MaxDrawdown => "max drawdown",
            ThresholdType::Other => "other",
        }
    }
}

/// Append-only entry from the provider's risk log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskEvent {
    pub id: String,
    pub account_id: String,
    pub sequence_number: u64,
    pub broker_time: String,
    pub absolute_drawdown: f64,
    pub relative_drawdown: f64,
    pub exceeded_threshold_type: ThresholdType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodStats {
    pub date: NaiveDate,
    pub trades: u32,
    pub profit: f64,
    pub lots: f64,
    pub gain_pct: f64,
}

/// Everything the provider returns for one account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpstreamReport {
    pub metrics: AccountMetrics,
    pub trades: Vec<Trade>,
    pub equity_chart: Vec<EquityPoint>,
    pub risk_events: Vec<RiskEvent>,
    pub period_stats: Vec<PeriodStats>,
}

/// Provider report with objectives evaluated, as served by `/api/metrics`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsResponse {
    pub metrics: AccountMetrics,
    pub objectives: TradingObjectives,
    pub trades: Vec<Trade>,
    pub equity_chart: Vec<EquityPoint>,
    pub risk_events: Vec<RiskEvent>,
    pub period_stats: Vec<PeriodStats>,
}

impl MetricsResponse {
    pub fn evaluate(
        request: &MetricsRequest,
        report: UpstreamReport,
    ) -> Result<Self, PropdeskError> {
        let objectives = objectives::evaluate(&inputs_for(
            request.account_type,
            request.step.is_funded(),
            request.account_size,
            &report.metrics,
        ))?;
        Ok(Self {
            metrics: report.metrics,
            objectives,
            trades: report.trades,
            equity_chart: report.equity_chart,
            risk_events: report.risk_events,
            period_stats: report.period_stats,
        })
    }
}

pub fn inputs_for(
    kind: AccountKind,
    funded: bool,
    starting_balance: f64,
    metrics: &AccountMetrics,
) -> ObjectiveInputs {
    ObjectiveInputs {
        kind,
        funded,
        starting_balance,
        balance: metrics.balance,
        equity: metrics.equity,
        max_drawdown_pct: metrics.max_drawdown,
        max_daily_drawdown_pct: metrics.max_daily_drawdown,
        trading_days: metrics.trading_days,
    }
}
