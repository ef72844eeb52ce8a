//! CLI integration tests.
//!
//! Tests cover:
//! - Config loading and server validation with real INI files on disk
//! - init-db, create-account, refresh and sync-users against a SQLite file
//! - evaluate from flags alone
//! - Exit codes per error class

mod common;

use clap::Parser;
use propdesk::adapters::file_config_adapter::FileConfigAdapter;
use propdesk::adapters::sqlite_adapter::SqliteAdapter;
use propdesk::cli::{self, Cli};
use propdesk::domain::account::{AccountStatus, Step};
use propdesk::domain::config_validation::{listen_addr, validate_server_config};
use propdesk::domain::error::PropdeskError;
use propdesk::domain::user;
use propdesk::ports::account_port::AccountPort;
use propdesk::ports::user_port::ProfilePort;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use common::t0;

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn server_ini(db_path: &Path) -> String {
    format!(
        r#"
[server]
listen = 127.0.0.1:8088

[sqlite]
path = {}

[auth]
session_lifetime = 3600

[metrics]
base_url = https://metrics.example.com
cache_ttl_minutes = 30

[email]
api_key = re_test
from = Desk <desk@example.com>

[checkout]
one-step-100000 = plan_100k
"#,
        db_path.display()
    )
}

/// A temp dir holding a SQLite file and an INI pointing at it.
struct Workspace {
    dir: tempfile::TempDir,
    ini: tempfile::NamedTempFile,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let ini = write_temp_ini(&server_ini(&dir.path().join("propdesk.db")));
        Self { dir, ini }
    }

    fn config_path(&self) -> String {
        self.ini.path().display().to_string()
    }

    fn store(&self) -> SqliteAdapter {
        let config = FileConfigAdapter::from_file(self.ini.path()).unwrap();
        let store = SqliteAdapter::from_config(&config).unwrap();
        store.initialize_schema().unwrap();
        store
    }
}

fn run(args: &[&str]) -> ExitCode {
    let mut argv = vec!["propdesk"];
    argv.extend_from_slice(args);
    cli::run(Cli::try_parse_from(argv).unwrap())
}

// ExitCode has no PartialEq, so compare the Debug rendering
fn assert_exit(actual: ExitCode, expected: u8) {
    assert_eq!(
        format!("{actual:?}"),
        format!("{:?}", ExitCode::from(expected)),
        "expected exit code {expected}"
    );
}

mod config_loading {
    use super::*;

    #[test]
    fn full_server_config_validates() {
        let ws = Workspace::new();
        let config = FileConfigAdapter::from_file(ws.ini.path()).unwrap();

        validate_server_config(&config).unwrap();
        assert_eq!(listen_addr(&config).unwrap().port(), 8088);
    }

    #[test]
    fn missing_email_section_is_reported() {
        let ini = "[sqlite]\npath = /tmp/x.db\n[metrics]\nbase_url = https://m.example.com\n";
        let config = FileConfigAdapter::from_string(ini).unwrap();

        let err = validate_server_config(&config).unwrap_err();
        assert!(
            matches!(
                &err,
                PropdeskError::ConfigMissing { section, key }
                    if section == "email" && key == "api_key"
            ),
            "got {err:?}"
        );
    }

    #[test]
    fn load_config_missing_file_exits_with_config_code() {
        let code = cli::load_config(&PathBuf::from("/nonexistent/propdesk.ini")).unwrap_err();
        assert_exit(code, 2);
    }
}

mod commands {
    use super::*;

    #[test]
    fn init_db_creates_the_database() {
        let ws = Workspace::new();

        assert_exit(run(&["init-db", "--config", &ws.config_path()]), 0);
        assert!(ws.dir.path().join("propdesk.db").exists());
        assert_exit(run(&["init-db", "--config", &ws.config_path()]), 0);
    }

    #[test]
    fn create_account_for_existing_user() {
        let ws = Workspace::new();
        let ana = user::create_user(&ws.store(), "ana@example.com", "correct-horse", false, t0())
            .unwrap();

        let code = run(&[
            "create-account",
            "--config",
            &ws.config_path(),
            "--user-email",
            "Ana@Example.com",
            "--account-id",
            "acc-100",
            "--token",
            "tok-100",
            "--kind",
            "elite",
            "--size",
            "50000",
            "--platform",
            "mt4",
        ]);
        assert_exit(code, 0);

        let account = ws.store().get_account("acc-100").unwrap().unwrap();
        assert_eq!(account.user_id, ana.id);
        assert_eq!(account.starting_balance, 50_000.0);
        assert_eq!(account.step, Step::Challenge);
        assert_eq!(account.status, AccountStatus::Active);
    }

    #[test]
    fn create_account_for_unknown_user_is_not_found() {
        let ws = Workspace::new();
        let code = run(&[
            "create-account",
            "--config",
            &ws.config_path(),
            "--user-email",
            "nobody@example.com",
            "--account-id",
            "acc-1",
            "--token",
            "tok",
            "--size",
            "10000",
        ]);
        assert_exit(code, 6);
    }

    #[test]
    fn create_account_rejects_unknown_kind() {
        let ws = Workspace::new();
        let code = run(&[
            "create-account",
            "--config",
            &ws.config_path(),
            "--user-email",
            "ana@example.com",
            "--account-id",
            "acc-1",
            "--token",
            "tok",
            "--kind",
            "two-step",
            "--size",
            "10000",
        ]);
        assert_exit(code, 4);
    }

    #[test]
    fn credential_flags_go_together() {
        let parsed = Cli::try_parse_from([
            "propdesk",
            "create-account",
            "--config",
            "x.ini",
            "--user-email",
            "a@example.com",
            "--account-id",
            "acc-1",
            "--token",
            "tok",
            "--size",
            "10000",
            "--login",
            "5001",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn refresh_unknown_account_is_not_found() {
        let ws = Workspace::new();
        assert_exit(
            run(&["refresh", "--config", &ws.config_path(), "--account", "missing"]),
            6,
        );
    }

    #[test]
    fn refresh_all_with_no_accounts_succeeds() {
        let ws = Workspace::new();
        assert_exit(run(&["refresh", "--config", &ws.config_path()]), 0);
    }

    #[test]
    fn sync_users_backfills_profiles() {
        let ws = Workspace::new();
        let ana = user::create_user(&ws.store(), "ana@example.com", "correct-horse", false, t0())
            .unwrap();
        ws.store().delete_profile(&ana.id).unwrap();

        assert_exit(run(&["sync-users", "--config", &ws.config_path()]), 0);

        let profile = ws.store().get_profile(&ana.id).unwrap().unwrap();
        assert_eq!(profile.email, "ana@example.com");
    }

    #[test]
    fn evaluate_needs_no_config() {
        assert_exit(
            run(&[
                "evaluate",
                "--starting-balance",
                "100000",
                "--balance",
                "108000",
                "--trading-days",
                "4",
            ]),
            0,
        );
    }

    #[test]
    fn evaluate_rejects_zero_starting_balance() {
        assert_exit(
            run(&["evaluate", "--starting-balance", "0", "--balance", "1000"]),
            4,
        );
    }
}
