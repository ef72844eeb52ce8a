//! Metrics cache behaviour against the SQLite store.
//!
//! Tests cover:
//! - Cache served without a provider call while younger than the TTL
//! - Refresh after the TTL, and the stale copy when the provider fails
//! - Failed accounts are frozen: no provider call, no write
//! - A loss-rule breach marks the account failed and emails the owner
//! - Passing every objective emails the owner once

mod common;

use approx::assert_relative_eq;
use chrono::{DateTime, Duration, Utc};
use common::*;
use propdesk::adapters::sqlite_adapter::SqliteAdapter;
use propdesk::domain::account::AccountStatus;
use propdesk::domain::error::PropdeskError;
use propdesk::domain::metrics::UpstreamReport;
use propdesk::domain::metrics_cache::{
    self, CachedMetrics, MetricsView, RefreshOutcome, default_ttl,
};
use propdesk::domain::rules::AccountKind;
use propdesk::domain::user::{self, UserRecord};
use propdesk::ports::account_port::AccountPort;
use propdesk::ports::cache_port::MetricsCachePort;

fn seeded(balance: f64) -> SqliteAdapter {
    let store = test_store();
    store
        .put_account(&make_account("acc-1", "usr_1", AccountKind::OneStep, 100_000.0)).unwrap();
    let provider = reporting(report(balance, balance, 0.0, 2));
    refresh_at(&store, &provider, "acc-1", t0()).unwrap();
    store
}

fn reporting(report: UpstreamReport) -> MockMetricsPort {
    MockMetricsPort::new().with_report("acc-1", report)
}

fn load_at(
    store: &SqliteAdapter,
    provider: &MockMetricsPort,
    account_id: &str,
    now: DateTime<Utc>,
) -> Result<MetricsView, PropdeskError> {
    metrics_cache::load(store, provider, &MockEmailPort::new(), account_id, now, default_ttl())
}

fn refresh_at(
    store: &SqliteAdapter,
    provider: &MockMetricsPort,
    account_id: &str,
    now: DateTime<Utc>,
) -> Result<RefreshOutcome, PropdeskError> {
    metrics_cache::refresh(store, provider, &MockEmailPort::new(), account_id, now)
}

mod freshness {
    use super::*;

    #[test]
    fn cache_younger_than_ttl_is_served_without_fetching() {
        let store = seeded(101_000.0);
        let provider = reporting(report(120_000.0, 120_000.0, 0.0, 5));

        let view = load_at(&store, &provider, "acc-1", t0() + Duration::minutes(29)).unwrap();

        assert!(matches!(view, MetricsView::Fresh(_)));
        assert_eq!(provider.calls(), 0);
        assert_relative_eq!(view.cached().unwrap().metrics.balance, 101_000.0);
    }

    #[test]
    fn cache_older_than_ttl_is_refreshed() {
        let store = seeded(101_000.0);
        let provider = reporting(report(104_000.0, 104_500.0, 0.0, 5));
        let now = t0() + Duration::minutes(31);

        let view = load_at(&store, &provider, "acc-1", now).unwrap();

        let MetricsView::Refreshed(cached) = view else {
            panic!("expected a refresh, got {view:?}");
        };
        assert_eq!(provider.calls(), 1);
        assert_eq!(cached.last_updated, now);
        assert_relative_eq!(cached.objectives.profit_target.current, 4.0);

        let account = store.get_account("acc-1").unwrap().unwrap();
        assert_relative_eq!(account.balance, 104_000.0);
        assert_relative_eq!(account.equity, 104_500.0);
        assert_eq!(account.last_updated, Some(now));
        assert_eq!(store.get_cached("acc-1").unwrap().unwrap(), cached);
    }

    #[test]
    fn provider_failure_serves_previous_copy() {
        let store = seeded(101_000.0);
        let provider = MockMetricsPort::new().failing("503 Service Unavailable");

        let view = load_at(&store, &provider, "acc-1", t0() + Duration::hours(2)).unwrap();

        match view {
            MetricsView::Stale { cached, reason } => {
                assert_eq!(cached.last_updated, t0());
                assert!(reason.contains("503"), "reason: {reason}");
            }
            other => panic!("expected stale view, got {other:?}"),
        }
        let stored: CachedMetrics = store.get_cached("acc-1").unwrap().unwrap();
        assert_eq!(stored.last_updated, t0());
    }

    #[test]
    fn nothing_cached_is_unavailable() {
        let store = test_store();
        store
            .put_account(&make_account("acc-2", "usr_1", AccountKind::Elite, 50_000.0))
            .unwrap();
        let provider = MockMetricsPort::new();

        let view = load_at(&store, &provider, "acc-2", t0()).unwrap();

        assert_eq!(view, MetricsView::Unavailable);
        assert_eq!(provider.calls(), 0);
    }

    #[test]
    fn unknown_account_is_not_found() {
        let store = test_store();
        let provider = MockMetricsPort::new();
        let err = load_at(&store, &provider, "nope", t0()).unwrap_err();
        assert!(matches!(err, PropdeskError::NotFound { kind: "account", .. }));
    }
}

mod failed_accounts {
    use super::*;

    #[test]
    fn breach_marks_account_failed() {
        let store = test_store();
        store
            .put_account(&make_account("acc-1", "usr_1", AccountKind::OneStep, 100_000.0))
            .unwrap();
        let provider = reporting(report(93_000.0, 93_000.0, 7.0, 4));

        let outcome = refresh_at(&store, &provider, "acc-1", t0()).unwrap();

        let RefreshOutcome::Refreshed(cached) = outcome else {
            panic!("expected refresh");
        };
        assert!(cached.objectives.breached());
        let account = store.get_account("acc-1").unwrap().unwrap();
        assert_eq!(account.status, AccountStatus::Failed);
    }

    #[test]
    fn failed_account_is_never_fetched_or_rewritten() {
        let store = seeded(101_000.0);
        let mut account = store.get_account("acc-1").unwrap().unwrap();
        account.status = AccountStatus::Failed;
        store.put_account(&account).unwrap();
        let provider = reporting(report(130_000.0, 130_000.0, 0.0, 9));

        let later = t0() + Duration::days(3);
        let view = load_at(&store, &provider, "acc-1", later).unwrap();
        let outcome = refresh_at(&store, &provider, "acc-1", later).unwrap();

        assert!(matches!(view, MetricsView::Frozen(_)));
        assert_eq!(outcome, RefreshOutcome::Frozen);
        assert_eq!(provider.calls(), 0);
        let cached = store.get_cached("acc-1").unwrap().unwrap();
        assert_eq!(cached.last_updated, t0());
        assert_relative_eq!(cached.metrics.balance, 101_000.0);
    }

    #[test]
    fn failed_account_without_cache_is_frozen() {
        let store = test_store();
        let mut account = make_account("acc-3", "usr_1", AccountKind::OneStep, 100_000.0);
        account.status = AccountStatus::Failed;
        store.put_account(&account).unwrap();
        let provider = MockMetricsPort::new();

        let view = load_at(&store, &provider, "acc-3", t0())
            .unwrap();

        assert_eq!(view, MetricsView::Frozen(None));
        assert!(view.cached().is_none());
        assert_eq!(provider.calls(), 0);
    }
}

mod challenge_emails {
    use super::*;

    fn owner_with_account(store: &SqliteAdapter) -> UserRecord {
        let ana =
            user::create_user(store, "ana@example.com", "correct-horse", false, t0()).unwrap();
        store
            .put_account(&make_account("acc-1", &ana.id, AccountKind::OneStep, 100_000.0))
            .unwrap();
        ana
    }

    #[test]
    fn breach_emails_the_owner() {
        let store = test_store();
        owner_with_account(&store);
        let mailer = MockEmailPort::new();
        let provider = reporting(report(93_000.0, 93_000.0, 7.0, 4));

        metrics_cache::refresh(&store, &provider, &mailer, "acc-1", t0()).unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "ana@example.com");
        assert!(sent[0].subject.contains("acc-1"), "subject: {}", sent[0].subject);
        assert!(sent[0].html.contains("7.00%"));
    }

    #[test]
    fn passing_every_objective_emails_once() {
        let store = test_store();
        owner_with_account(&store);
        let mailer = MockEmailPort::new();
        let provider = reporting(report(108_500.0, 108_500.0, 1.0, 5));

        metrics_cache::refresh(&store, &provider, &mailer, "acc-1", t0()).unwrap();
        let later = t0() + Duration::hours(1);
        metrics_cache::refresh(&store, &provider, &mailer, "acc-1", later).unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].subject.contains("passed"), "subject: {}", sent[0].subject);
    }

    #[test]
    fn in_progress_challenge_sends_nothing() {
        let store = test_store();
        owner_with_account(&store);
        let mailer = MockEmailPort::new();
        let provider = reporting(report(103_000.0, 103_000.0, 1.0, 3));

        metrics_cache::refresh(&store, &provider, &mailer, "acc-1", t0()).unwrap();

        assert!(mailer.sent().is_empty());
    }

    #[test]
    fn mail_failure_does_not_fail_the_refresh() {
        let store = test_store();
        owner_with_account(&store);
        let mailer = MockEmailPort::failing();
        let provider = reporting(report(93_000.0, 93_000.0, 7.0, 4));

        let outcome = metrics_cache::refresh(&store, &provider, &mailer, "acc-1", t0()).unwrap();

        assert!(matches!(outcome, RefreshOutcome::Refreshed(_)));
        assert_eq!(store.get_account("acc-1").unwrap().unwrap().status, AccountStatus::Failed);
    }
}
