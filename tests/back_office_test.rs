//! Back-office workflows against the SQLite store.
//!
//! Tests cover:
//! - Order intake, filtering, status changes and the confirmation email
//! - User creation, profile sync, KYC decisions and deletion
//! - Payout requests and their lifecycle
//! - Account opening

mod common;

use chrono::Duration;
use common::*;
use propdesk::adapters::sqlite_adapter::SqliteAdapter;
use propdesk::domain::account::{self, AccountStatus, NewAccount, Platform, Step};
use propdesk::domain::error::PropdeskError;
use propdesk::domain::order::{self, Order, OrderFilter, OrderKind, OrderStatus};
use propdesk::domain::payout::{self, PayoutFilter, PayoutRequest, PayoutStatus};
use propdesk::domain::rules::AccountKind;
use propdesk::domain::user::{self, KycStatus, UserFilter, UserRecord};
use propdesk::ports::account_port::AccountPort;
use propdesk::ports::user_port::{IdentityPort, ProfilePort};

fn create_ana(store: &SqliteAdapter) -> UserRecord {
    user::create_user(store, "ana@example.com", "correct-horse", false, t0()).unwrap()
}

mod orders {
    use super::*;

    fn card_order(store: &SqliteAdapter) -> Order {
        order::record_order(store, new_order("ana@example.com", OrderKind::Card), t0()).unwrap()
    }

    #[test]
    fn recorded_order_starts_pending() {
        let store = test_store();
        let recorded = card_order(&store);

        assert!(recorded.id.starts_with("ord"));
        assert_eq!(recorded.status, OrderStatus::Pending);
        assert_eq!(recorded.created_at, t0());
    }

    #[test]
    fn invalid_customer_email_is_rejected() {
        let store = test_store();
        let err = order::record_order(&store, new_order("not-an-email", OrderKind::Crypto), t0())
            .unwrap_err();
        assert!(matches!(err, PropdeskError::Validation { .. }));
    }

    #[test]
    fn list_filters_and_sorts_newest_first() {
        let store = test_store();
        let kinds = [OrderKind::Card, OrderKind::Crypto, OrderKind::Card];
        for (i, kind) in kinds.into_iter().enumerate() {
            let email = format!("buyer{i}@example.com");
            order::record_order(&store, new_order(&email, kind), t0() + Duration::minutes(i as i64))
                .unwrap();
        }

        let all = order::list_orders(&store, &OrderFilter::default(), 1, 20).unwrap();
        assert_eq!(all.total, 3);
        assert_eq!(all.items[0].customer.email, "buyer2@example.com");

        let cards = OrderFilter {
            kind: Some(OrderKind::Card),
            ..OrderFilter::default()
        };
        assert_eq!(order::list_orders(&store, &cards, 1, 20).unwrap().total, 2);

        let text = OrderFilter {
            text: "BUYER1".to_string(),
            ..OrderFilter::default()
        };
        let found = order::list_orders(&store, &text, 1, 20).unwrap();
        assert_eq!(found.total, 1);
        assert_eq!(found.items[0].kind, OrderKind::Crypto);
    }

    #[test]
    fn completing_an_order_sends_one_confirmation() {
        let store = test_store();
        let mailer = MockEmailPort::new();
        let recorded = card_order(&store);

        order::toggle_order_status(&store, &mailer, &recorded.id, t0()).unwrap();
        order::set_order_status(&store, &mailer, &recorded.id, OrderStatus::Completed, t0())
            .unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "ana@example.com");
        assert!(sent[0].subject.contains(&recorded.id));
    }

    #[test]
    fn status_change_survives_mail_failure() {
        let store = test_store();
        let mailer = MockEmailPort::failing();
        let recorded = card_order(&store);

        let updated =
            order::set_order_status(&store, &mailer, &recorded.id, OrderStatus::Completed, t0())
                .unwrap();

        assert_eq!(updated.status, OrderStatus::Completed);
    }

    #[test]
    fn refunded_orders_cannot_be_toggled() {
        let store = test_store();
        let mailer = MockEmailPort::new();
        let recorded = card_order(&store);
        order::set_order_status(&store, &mailer, &recorded.id, OrderStatus::Refunded, t0())
            .unwrap();

        let err = order::toggle_order_status(&store, &mailer, &recorded.id, t0()).unwrap_err();
        assert!(matches!(err, PropdeskError::Validation { .. }));
    }

    #[test]
    fn delete_requires_matching_confirmation() {
        let store = test_store();
        let recorded = card_order(&store);

        assert!(order::delete_order(&store, &recorded.id, "wrong").is_err());
        order::delete_order(&store, &recorded.id, &recorded.id).unwrap();
        let err = order::delete_order(&store, &recorded.id, &recorded.id).unwrap_err();
        assert!(matches!(err, PropdeskError::NotFound { .. }));
    }
}

mod users {
    use super::*;

    #[test]
    fn create_user_normalises_email_and_writes_profile() {
        let store = test_store();
        let created = user::create_user(&store, "  Ana@Example.COM ", "correct-horse", false, t0())
            .unwrap();

        assert_eq!(created.email, "ana@example.com");
        assert_eq!(created.display_name, "ana");
        assert!(store.get_profile(&created.id).unwrap().is_some());
        let identity = store.find_identity_by_email("ana@example.com").unwrap().unwrap();
        assert!(user::verify_password("correct-horse", &identity.password_hash));
    }

    #[test]
    fn duplicate_email_and_short_password_are_rejected() {
        let store = test_store();
        create_ana(&store);

        assert!(user::create_user(&store, "ANA@example.com", "another-pass", false, t0()).is_err());
        assert!(user::create_user(&store, "bo@example.com", "short", false, t0()).is_err());
    }

    #[test]
    fn sync_creates_only_missing_profiles() {
        let store = test_store();
        let ana = create_ana(&store);
        let bo = user::create_user(&store, "bo@example.com", "correct-horse", false, t0()).unwrap();
        store.delete_profile(&bo.id).unwrap();

        let missing = UserFilter {
            missing_profile_only: true,
            ..UserFilter::default()
        };
        let listed = user::list_users(&store, &missing, 1, 20).unwrap();
        assert_eq!(listed.total, 1);
        assert_eq!(listed.items[0].id, bo.id);

        let report = user::sync_users(&store, t0()).unwrap();
        assert_eq!(report.checked, 2);
        assert_eq!(report.created, vec![bo.id.clone()]);
        assert!(store.get_profile(&ana.id).unwrap().is_some());
        assert_eq!(user::sync_users(&store, t0()).unwrap().created.len(), 0);
    }

    #[test]
    fn kyc_rejection_needs_a_reason_and_emails_it() {
        let store = test_store();
        let mailer = MockEmailPort::new();
        let ana = create_ana(&store);

        let rejected = KycStatus::Rejected;
        assert!(user::set_kyc_status(&store, &mailer, &ana.id, rejected, Some("  ")).is_err());

        let profile =
            user::set_kyc_status(&store, &mailer, &ana.id, rejected, Some("blurry passport"))
                .unwrap();
        assert_eq!(profile.kyc_status, KycStatus::Rejected);
        assert_eq!(profile.kyc_note.as_deref(), Some("blurry passport"));

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].html.contains("blurry passport"));
    }

    #[test]
    fn delete_user_checks_typed_email() {
        let store = test_store();
        let ana = create_ana(&store);

        assert!(user::delete_user(&store, &ana.id, "bo@example.com").is_err());
        user::delete_user(&store, &ana.id, "ANA@example.com").unwrap();

        assert!(store.get_identity(&ana.id).unwrap().is_none());
        assert!(store.get_profile(&ana.id).unwrap().is_none());
    }
}

mod payouts {
    use super::*;

    fn wire_payout(
        store: &SqliteAdapter,
        user_id: &str,
        account_id: &str,
        amount: f64,
    ) -> Result<PayoutRequest, PropdeskError> {
        payout::request_payout(store, user_id, account_id, amount, "wire", t0())
    }

    #[test]
    fn payout_is_capped_at_withdrawable_profit() {
        let store = test_store();
        store.put_account(&funded_account("acc-f", "usr_1", 100_000.0, 103_000.0)).unwrap();

        let err = wire_payout(&store, "usr_1", "acc-f", 3_500.0).unwrap_err();
        assert!(matches!(err, PropdeskError::Validation { .. }));

        let requested = wire_payout(&store, "usr_1", "acc-f", 3_000.0).unwrap();
        assert_eq!(requested.status, PayoutStatus::Pending);
        assert_eq!(requested.currency, "USD");
    }

    #[test]
    fn earlier_requests_count_against_the_profit() {
        let store = test_store();
        store.put_account(&funded_account("acc-f", "usr_1", 100_000.0, 103_000.0)).unwrap();
        store.put_account(&funded_account("acc-g", "usr_1", 100_000.0, 103_000.0)).unwrap();

        let first = wire_payout(&store, "usr_1", "acc-f", 2_000.0).unwrap();
        wire_payout(&store, "usr_1", "acc-f", 1_000.0).unwrap();
        let over = wire_payout(&store, "usr_1", "acc-f", 0.01).unwrap_err();
        assert!(matches!(over, PropdeskError::Validation { .. }), "got {over:?}");

        // other accounts keep their own profit
        wire_payout(&store, "usr_1", "acc-g", 3_000.0).unwrap();

        let mailer = MockEmailPort::new();
        payout::set_payout_status(&store, &mailer, &first.id, PayoutStatus::Rejected, t0())
            .unwrap();
        let again = wire_payout(&store, "usr_1", "acc-f", 2_000.0).unwrap();
        assert_eq!(again.status, PayoutStatus::Pending);
    }

    #[test]
    fn paid_payouts_stay_claimed() {
        let store = test_store();
        let mailer = MockEmailPort::new();
        store.put_account(&funded_account("acc-f", "usr_1", 100_000.0, 103_000.0)).unwrap();

        let paid = wire_payout(&store, "usr_1", "acc-f", 3_000.0).unwrap();
        payout::set_payout_status(&store, &mailer, &paid.id, PayoutStatus::Approved, t0()).unwrap();
        payout::set_payout_status(&store, &mailer, &paid.id, PayoutStatus::Paid, t0()).unwrap();

        assert!(wire_payout(&store, "usr_1", "acc-f", 3_000.0).is_err());
    }

    #[test]
    fn payouts_need_a_funded_account_the_user_owns() {
        let store = test_store();
        store
            .put_account(&make_account("acc-c", "usr_1", AccountKind::OneStep, 100_000.0))
            .unwrap();
        store.put_account(&funded_account("acc-f", "usr_1", 100_000.0, 103_000.0)).unwrap();

        let challenge = wire_payout(&store, "usr_1", "acc-c", 10.0).unwrap_err();
        assert!(matches!(challenge, PropdeskError::Validation { .. }));

        let stranger = wire_payout(&store, "usr_2", "acc-f", 10.0).unwrap_err();
        assert!(matches!(stranger, PropdeskError::NotFound { .. }));
    }

    #[test]
    fn lifecycle_ends_with_paid_email() {
        let store = test_store();
        let mailer = MockEmailPort::new();
        let ana = create_ana(&store);
        store.put_account(&funded_account("acc-f", &ana.id, 100_000.0, 105_000.0)).unwrap();
        let requested = payout::request_payout(&store, &ana.id, "acc-f", 2_000.0, "crypto", t0())
            .unwrap();

        let skip =
            payout::set_payout_status(&store, &mailer, &requested.id, PayoutStatus::Paid, t0());
        assert!(skip.is_err());

        payout::set_payout_status(&store, &mailer, &requested.id, PayoutStatus::Approved, t0())
            .unwrap();
        assert!(mailer.sent().is_empty());
        payout::set_payout_status(&store, &mailer, &requested.id, PayoutStatus::Paid, t0())
            .unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "ana@example.com");

        let paid = PayoutFilter {
            status: Some(PayoutStatus::Paid),
            ..PayoutFilter::default()
        };
        assert_eq!(payout::list_payouts(&store, &paid, 1, 20).unwrap().total, 1);
    }
}

mod accounts {
    use super::*;

    fn new_account(id: &str, size: f64, step: Step) -> NewAccount {
        NewAccount {
            account_id: id.to_string(),
            user_id: "usr_1".to_string(),
            account_token: "tok".to_string(),
            kind: AccountKind::Elite,
            starting_balance: size,
            step,
            platform: Platform::Mt4,
        }
    }

    #[test]
    fn opened_account_starts_at_its_size() {
        let store = test_store();
        let opened = account::open_account(&store, new_account("acc-9", 25_000.0, Step::Challenge))
            .unwrap();

        assert_eq!(opened.status, AccountStatus::Active);
        assert_eq!(opened.balance, 25_000.0);
        assert_eq!(opened.equity, 25_000.0);
        assert_eq!(store.get_account("acc-9").unwrap(), Some(opened));
    }

    #[test]
    fn funded_step_opens_funded() {
        let store = test_store();
        let opened = account::open_account(&store, new_account("acc-9", 25_000.0, Step::Funded))
            .unwrap();
        assert_eq!(opened.status, AccountStatus::Funded);
    }

    #[test]
    fn bad_size_and_duplicates_are_rejected() {
        let store = test_store();
        let err = account::open_account(&store, new_account("acc-9", 0.0, Step::Challenge))
            .unwrap_err();
        assert!(matches!(err, PropdeskError::InvalidStartingBalance { .. }));

        account::open_account(&store, new_account("acc-9", 25_000.0, Step::Challenge)).unwrap();
        let err = account::open_account(&store, new_account("acc-9", 25_000.0, Step::Challenge))
            .unwrap_err();
        assert!(matches!(err, PropdeskError::Validation { .. }));
    }
}
