//! Per-account metrics cache in front of the metrics provider.
//!
//! A cached document younger than the TTL is served as is. Older documents
//! are refreshed from the provider and overwritten. Refreshes are not
//! serialised: two concurrent refreshes both write and the last one wins,
//! which is acceptable for a display cache. Failed accounts are frozen and
//! their cache is never written again.
//!
//! A refresh that fails the challenge, or passes every objective for the
//! first time, emails the account owner.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::account::{Account, AccountStatus};
use super::email::{EmailTemplate, send_template};
use super::error::PropdeskError;
use super::format::pct;
use super::metrics::{
    AccountMetrics, EquityPoint, MetricsRequest, MetricsResponse, PeriodStats, RiskEvent, Trade,
};
use super::objectives::{Objective, TradingObjectives};
use crate::ports::account_port::AccountPort;
use crate::ports::cache_port::MetricsCachePort;
use crate::ports::email_port::EmailPort;
use crate::ports::metrics_port::MetricsPort;
use crate::ports::user_port::ProfilePort;

pub const DEFAULT_TTL_MINUTES: i64 = 30;

pub fn default_ttl() -> Duration {
    Duration::minutes(DEFAULT_TTL_MINUTES)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedMetrics {
    pub account_id: String,
    pub metrics: AccountMetrics,
    pub objectives: TradingObjectives,
    pub trades: Vec<Trade>,
    pub equity_chart: Vec<EquityPoint>,
    pub risk_events: Vec<RiskEvent>,
    pub period_stats: Vec<PeriodStats>,
    pub last_updated: DateTime<Utc>,
}

impl CachedMetrics {
    pub fn from_response(account_id: &str, response: MetricsResponse, now: DateTime<Utc>) -> Self {
        Self {
            account_id: account_id.to_string(),
            metrics: response.metrics,
            objectives: response.objectives,
            trades: response.trades,
            equity_chart: response.equity_chart,
            risk_events: response.risk_events,
            period_stats: response.period_stats,
            last_updated: now,
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.last_updated).max(Duration::zero())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh { age: Duration },
    Stale { age: Duration },
}

impl Freshness {
    pub fn is_fresh(&self) -> bool {
        matches!(self, Freshness::Fresh { .. })
    }
}

/// A timestamp in the future (clock skew) counts as fresh with zero age.
pub fn freshness(last_updated: DateTime<Utc>, now: DateTime<Utc>, ttl: Duration) -> Freshness {
    let age = (now - last_updated).max(Duration::zero());
    if age < ttl {
        Freshness::Fresh { age }
    } else {
        Freshness::Stale { age }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Refreshed(CachedMetrics),
    /// The account has failed; nothing was fetched or written.
    Frozen,
}

/// Pull fresh metrics, evaluate objectives, overwrite the cache and update
/// the account snapshot. A breached loss rule marks the account failed.
pub fn refresh<S>(
    store: &S,
    provider: &dyn MetricsPort,
    mailer: &dyn EmailPort,
    account_id: &str,
    now: DateTime<Utc>,
) -> Result<RefreshOutcome, PropdeskError>
where
    S: AccountPort + MetricsCachePort + ProfilePort + ?Sized,
{
    let mut account = store
        .get_account(account_id)?
        .ok_or_else(|| PropdeskError::not_found("account", account_id))?;

    if account.is_failed() {
        info!(account_id = %account_id, "refresh skipped, account is failed");
        return Ok(RefreshOutcome::Frozen);
    }

    let request = MetricsRequest::for_account(&account);
    let report = provider.fetch_report(&request)?;
    let response = MetricsResponse::evaluate(&request, report)?;
    let cached = CachedMetrics::from_response(account_id, response, now);
    let passed_before = store
        .get_cached(account_id)?
        .is_some_and(|previous| previous.objectives.all_passed());
    store.put_cached(&cached)?;

    account.balance = cached.metrics.balance;
    account.equity = cached.metrics.equity;
    account.last_updated = Some(now);
    if cached.objectives.breached() {
        warn!(
            account_id = %account_id,
            drawdown = cached.objectives.max_drawdown.current,
            daily_drawdown = cached.objectives.max_daily_drawdown.current,
            "loss rule breached, marking account failed"
        );
        account.status = AccountStatus::Failed;
    }
    store.put_account(&account)?;
    info!(account_id = %account_id, balance = account.balance, "metrics refreshed");

    let objectives = &cached.objectives;
    if account.is_failed() {
        notify_owner(store, mailer, &account, |name| EmailTemplate::ChallengeFailed {
            name,
            account_id: account_id.to_string(),
            reason: breach_reason(objectives),
        });
    } else if !account.is_funded() && objectives.all_passed() && !passed_before {
        notify_owner(store, mailer, &account, |name| EmailTemplate::ChallengePassed {
            name,
            account_id: account_id.to_string(),
        });
    }
    Ok(RefreshOutcome::Refreshed(cached))
}

fn breach_reason(objectives: &TradingObjectives) -> String {
    let describe = |label: &str, rule: &Objective| match rule.target {
        Some(limit) => format!(
            "{label} reached {} against a limit of {}",
            pct(rule.current),
            pct(limit)
        ),
        None => format!("{label} reached {}", pct(rule.current)),
    };
    if !objectives.max_drawdown.passed {
        describe("Maximum drawdown", &objectives.max_drawdown)
    } else {
        describe("Maximum daily loss", &objectives.max_daily_drawdown)
    }
}

/// Mail problems are logged, not returned.
fn notify_owner<S>(
    store: &S,
    mailer: &dyn EmailPort,
    account: &Account,
    template: impl FnOnce(String) -> EmailTemplate,
) where
    S: ProfilePort + ?Sized,
{
    let account_id = &account.account_id;
    match store.get_profile(&account.user_id) {
        Ok(Some(profile)) => {
            let template = template(profile.display_name.clone());
            if let Err(e) = send_template(mailer, &profile.email, &template) {
                warn!(account_id = %account_id, error = %e, "challenge email not sent");
            }
        }
        Ok(None) => warn!(account_id = %account_id, "no profile to notify about challenge result"),
        Err(e) => warn!(account_id = %account_id, error = %e, "owner profile lookup failed"),
    }
}

/// What a dashboard should show for an account.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricsView {
    Fresh(CachedMetrics),
    Refreshed(CachedMetrics),
    /// Refresh was due but the provider failed; the old copy is served.
    Stale { cached: CachedMetrics, reason: String },
    /// Failed account. Holds the last copy written before it failed, if any.
    Frozen(Option<CachedMetrics>),
    /// Nothing cached yet. The page offers a manual fetch.
    Unavailable,
}

impl MetricsView {
    pub fn cached(&self) -> Option<&CachedMetrics> {
        match self {
            MetricsView::Fresh(c)
            | MetricsView::Refreshed(c)
            | MetricsView::Stale { cached: c, .. } => Some(c),
            MetricsView::Frozen(c) => c.as_ref(),
            MetricsView::Unavailable => None,
        }
    }
}

pub fn load<S>(
    store: &S,
    provider: &dyn MetricsPort,
    mailer: &dyn EmailPort,
    account_id: &str,
    now: DateTime<Utc>,
    ttl: Duration,
) -> Result<MetricsView, PropdeskError>
where
    S: AccountPort + MetricsCachePort + ProfilePort + ?Sized,
{
    let account = store
        .get_account(account_id)?
        .ok_or_else(|| PropdeskError::not_found("account", account_id))?;

    if account.is_failed() {
        return Ok(MetricsView::Frozen(store.get_cached(account_id)?));
    }

    let Some(cached) = store.get_cached(account_id)? else {
        return Ok(MetricsView::Unavailable);
    };

    if freshness(cached.last_updated, now, ttl).is_fresh() {
        return Ok(MetricsView::Fresh(cached));
    }

    match refresh(store, provider, mailer, account_id, now) {
        Ok(RefreshOutcome::Refreshed(updated)) => Ok(MetricsView::Refreshed(updated)),
        Ok(RefreshOutcome::Frozen) => Ok(MetricsView::Frozen(Some(cached))),
        Err(err) => {
            warn!(account_id = %account_id, error = %err, "serving stale metrics");
            Ok(MetricsView::Stale {
                cached,
                reason: err.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap()
    }

    #[test]
    fn fresh_before_ttl() {
        let f = freshness(t0(), t0() + Duration::minutes(29), default_ttl());
        assert_eq!(f, Freshness::Fresh { age: Duration::minutes(29) });
    }

    #[test]
    fn stale_after_ttl() {
        let f = freshness(t0(), t0() + Duration::minutes(31), default_ttl());
        assert!(!f.is_fresh());
    }

    #[test]
    fn stale_exactly_at_ttl() {
        let f = freshness(t0(), t0() + Duration::minutes(30), default_ttl());
        assert_eq!(f, Freshness::Stale { age: Duration::minutes(30) });
    }

    #[test]
    fn future_timestamp_is_fresh() {
        let f = freshness(t0() + Duration::minutes(5), t0(), default_ttl());
        assert_eq!(f, Freshness::Fresh { age: Duration::zero() });
    }
}
