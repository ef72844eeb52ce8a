//! CLI definition and dispatch.

use clap::{Args, Parser, Subcommand};
use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::warn;

use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::http_email_adapter::HttpEmailAdapter;
use crate::adapters::metrics_api_adapter::MetricsApiAdapter;
use crate::adapters::sqlite_adapter::SqliteAdapter;
use crate::domain::account::{self, NewAccount, Platform, Step};
use crate::domain::email::{EmailTemplate, send_template};
use crate::domain::error::PropdeskError;
use crate::domain::metrics_cache::{self, RefreshOutcome};
use crate::domain::objectives::{ObjectiveInputs, evaluate};
use crate::domain::rules::AccountKind;
use crate::domain::user;
use crate::ports::account_port::AccountPort;
use crate::ports::user_port::{IdentityPort, ProfilePort};

#[derive(Parser, Debug)]
#[command(name = "propdesk", about = "Prop-trading challenge back office")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the web server
    Serve {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Create the database tables
    InitDb {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Create a user; the password is read from stdin
    CreateUser {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        email: String,
        #[arg(long)]
        admin: bool,
        /// Send the welcome email
        #[arg(long)]
        welcome: bool,
    },
    /// Register a trading account for an existing user
    CreateAccount(CreateAccountArgs),
    /// Output an argon2 hash for a password read from stdin
    HashPassword,
    /// Evaluate trading objectives for the given figures and print them as JSON
    Evaluate(EvaluateArgs),
    /// Refresh cached metrics for one account, or every account
    Refresh {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        account: Option<String>,
    },
    /// Create missing profiles for login identities
    SyncUsers {
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct CreateAccountArgs {
    #[arg(short, long)]
    pub config: PathBuf,
    #[arg(long)]
    pub user_email: String,
    #[arg(long)]
    pub account_id: String,
    /// Token the metrics provider expects for this account
    #[arg(long)]
    pub token: String,
    #[arg(long, default_value = "one-step")]
    pub kind: String,
    #[arg(long)]
    pub size: f64,
    #[arg(long, default_value = "mt5")]
    pub platform: String,
    #[arg(long)]
    pub funded: bool,
    /// Trading login; with --mt-password and --server the credentials are emailed
    #[arg(long, requires_all = ["mt_password", "server"])]
    pub login: Option<String>,
    #[arg(long, requires = "login")]
    pub mt_password: Option<String>,
    #[arg(long, requires = "login")]
    pub server: Option<String>,
}

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    #[arg(long, default_value = "one-step")]
    pub kind: String,
    #[arg(long)]
    pub starting_balance: f64,
    #[arg(long)]
    pub balance: f64,
    /// Defaults to the balance
    #[arg(long)]
    pub equity: Option<f64>,
    /// Observed max drawdown, percent
    #[arg(long, default_value_t = 0.0)]
    pub max_drawdown: f64,
    /// Observed max daily drawdown, percent
    #[arg(long, default_value_t = 0.0)]
    pub daily_drawdown: f64,
    #[arg(long, default_value_t = 0)]
    pub trading_days: u32,
    #[arg(long)]
    pub funded: bool,
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Serve { config } => run_serve(&config),
        Command::InitDb { config } => run_init_db(&config),
        Command::CreateUser {
            config,
            email,
            admin,
            welcome,
        } => run_create_user(&config, &email, admin, welcome),
        Command::CreateAccount(args) => run_create_account(&args),
        Command::HashPassword => run_hash_password(),
        Command::Evaluate(args) => run_evaluate(&args),
        Command::Refresh { config, account } => run_refresh(&config, account.as_deref()),
        Command::SyncUsers { config } => run_sync_users(&config),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = PropdeskError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn fail(err: PropdeskError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

pub fn open_store(config: &FileConfigAdapter) -> Result<SqliteAdapter, PropdeskError> {
    let store = SqliteAdapter::from_config(config)?;
    store.initialize_schema()?;
    Ok(store)
}

fn read_password() -> Result<String, PropdeskError> {
    eprintln!("Enter password:");
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn run_serve(config_path: &PathBuf) -> ExitCode {
    #[cfg(feature = "web")]
    {
        eprintln!("Loading config from {}", config_path.display());
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(code) => return code,
        };
        match serve(config) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => fail(e),
        }
    }

    #[cfg(not(feature = "web"))]
    {
        let _ = config_path;
        eprintln!("error: web feature is required for serve");
        ExitCode::from(1)
    }
}

/// Build every adapter before the runtime starts: the reqwest blocking
/// clients cannot be created on an async worker.
#[cfg(feature = "web")]
fn serve(config: FileConfigAdapter) -> Result<(), PropdeskError> {
    use crate::adapters::web::{AppState, build_router};
    use crate::domain::checkout::CheckoutCatalog;
    use crate::domain::config_validation::{cache_ttl, listen_addr, validate_server_config};
    use std::sync::Arc;

    validate_server_config(&config)?;
    let store = open_store(&config)?;
    let metrics = MetricsApiAdapter::from_config(&config)?;
    let email = HttpEmailAdapter::from_config(&config)?;
    let checkout = CheckoutCatalog::from_config(&config)?;
    let addr = listen_addr(&config)?;
    let cache_ttl = cache_ttl(&config);

    let router = build_router(AppState {
        store: Arc::new(store),
        metrics: Arc::new(metrics),
        email: Arc::new(email),
        config: Arc::new(config),
        checkout,
        cache_ttl,
    });

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(%addr, "web server listening");
        axum::serve(listener, router).await?;
        Ok::<(), PropdeskError>(())
    })
}

fn run_init_db(config_path: &PathBuf) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    match open_store(&config) {
        Ok(_) => {
            println!("Database ready");
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn run_create_user(config_path: &PathBuf, email: &str, admin: bool, welcome: bool) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let store = match open_store(&config) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let password = match read_password() {
        Ok(p) => p,
        Err(e) => return fail(e),
    };

    let created = match user::create_user(&store, email, &password, admin, chrono::Utc::now()) {
        Ok(u) => u,
        Err(e) => return fail(e),
    };
    println!("{}", created.id);

    if welcome {
        let sent = HttpEmailAdapter::from_config(&config).and_then(|mailer| {
            send_template(
                &mailer,
                &created.email,
                &EmailTemplate::Welcome {
                    name: created.display_name.clone(),
                },
            )
        });
        if let Err(e) = sent {
            warn!(user_id = %created.id, error = %e, "welcome email not sent");
        }
    }
    ExitCode::SUCCESS
}

fn run_create_account(args: &CreateAccountArgs) -> ExitCode {
    let kind: AccountKind = match args.kind.parse() {
        Ok(k) => k,
        Err(e) => return fail(PropdeskError::validation(e)),
    };
    let platform: Platform = match args.platform.parse() {
        Ok(p) => p,
        Err(e) => return fail(PropdeskError::validation(e)),
    };
    let config = match load_config(&args.config) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let store = match open_store(&config) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let owner = match store.find_identity_by_email(&args.user_email.trim().to_lowercase()) {
        Ok(Some(identity)) => identity,
        Ok(None) => return fail(PropdeskError::not_found("user", args.user_email.as_str())),
        Err(e) => return fail(e),
    };

    let new = NewAccount {
        account_id: args.account_id.clone(),
        user_id: owner.id.clone(),
        account_token: args.token.clone(),
        kind,
        starting_balance: args.size,
        step: if args.funded { Step::Funded } else { Step::Challenge },
        platform,
    };
    let opened = match account::open_account(&store, new) {
        Ok(a) => a,
        Err(e) => return fail(e),
    };
    println!("{}", opened.account_id);

    let (Some(login), Some(password), Some(server)) =
        (&args.login, &args.mt_password, &args.server)
    else {
        return ExitCode::SUCCESS;
    };
    let name = match store.get_profile(&owner.id) {
        Ok(Some(profile)) => profile.display_name,
        Ok(None) => user::display_name_from_email(&owner.email),
        Err(e) => return fail(e),
    };
    let template = EmailTemplate::AccountCredentials {
        name,
        login: login.clone(),
        password: password.clone(),
        server: server.clone(),
        platform,
    };
    let sent = HttpEmailAdapter::from_config(&config)
        .and_then(|mailer| send_template(&mailer, &owner.email, &template));
    match sent {
        Ok(_) => {
            eprintln!("Credentials sent to {}", owner.email);
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn run_hash_password() -> ExitCode {
    let password = match read_password() {
        Ok(p) => p,
        Err(e) => return fail(e),
    };
    match user::hash_password(&password) {
        Ok(hash) => {
            println!("{hash}");
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn run_evaluate(args: &EvaluateArgs) -> ExitCode {
    let kind: AccountKind = match args.kind.parse() {
        Ok(k) => k,
        Err(e) => return fail(PropdeskError::validation(e)),
    };
    let inputs = ObjectiveInputs {
        kind,
        funded: args.funded,
        starting_balance: args.starting_balance,
        balance: args.balance,
        equity: args.equity.unwrap_or(args.balance),
        max_drawdown_pct: args.max_drawdown,
        max_daily_drawdown_pct: args.daily_drawdown,
        trading_days: args.trading_days,
    };
    let objectives = match evaluate(&inputs) {
        Ok(o) => o,
        Err(e) => return fail(e),
    };
    match serde_json::to_string_pretty(&objectives) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => fail(e.into()),
    }
}

fn run_refresh(config_path: &PathBuf, account_id: Option<&str>) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let store = match open_store(&config) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let provider = match MetricsApiAdapter::from_config(&config) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };
    let mailer = match HttpEmailAdapter::from_config(&config) {
        Ok(m) => m,
        Err(e) => return fail(e),
    };

    let ids: Vec<String> = match account_id {
        Some(id) => vec![id.to_string()],
        None => match store.list_accounts() {
            Ok(accounts) => accounts
                .into_iter()
                .filter(|a| !a.is_failed())
                .map(|a| a.account_id)
                .collect(),
            Err(e) => return fail(e),
        },
    };

    let mut exit = ExitCode::SUCCESS;
    for id in ids {
        match metrics_cache::refresh(&store, &provider, &mailer, &id, chrono::Utc::now()) {
            Ok(RefreshOutcome::Refreshed(cached)) => println!(
                "{id}: balance {:.2}, equity {:.2}{}",
                cached.metrics.balance,
                cached.metrics.equity,
                if cached.objectives.breached() {
                    ", loss rule breached"
                } else {
                    ""
                }
            ),
            Ok(RefreshOutcome::Frozen) => println!("{id}: failed account, cache frozen"),
            Err(e) => {
                eprintln!("error: {id}: {e}");
                exit = (&e).into();
            }
        }
    }
    exit
}

fn run_sync_users(config_path: &PathBuf) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let store = match open_store(&config) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    match user::sync_users(&store, chrono::Utc::now()) {
        Ok(report) => {
            println!(
                "Checked {} identities, created {} profile(s)",
                report.checked,
                report.created.len()
            );
            for id in report.created {
                println!("  {id}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}
