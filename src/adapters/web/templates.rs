//! HTML templates using Askama.
//!
//! Page structs carry preformatted strings; the templates only lay them out.

use askama::Template;
use chrono::{DateTime, Utc};
use url::form_urlencoded;

use crate::adapters::chart_svg::equity_svg;
use crate::domain::account::{Account, AccountStatus, Step};
use crate::domain::checkout::{CheckoutCatalog, parse_plan_key};
use crate::domain::format::{money, pct};
use crate::domain::listing::Page;
use crate::domain::metrics_cache::{CachedMetrics, MetricsView};
use crate::domain::objectives::Objective;
use crate::domain::order::{Order, OrderStatus};
use crate::domain::payout::{PayoutRequest, PayoutStatus};
use crate::domain::user::UserRecord;

pub fn timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}

/// Signed-in user shown in the navigation bar.
#[derive(Debug, Clone)]
pub struct Nav {
    pub email: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone)]
pub struct Notice {
    /// `info`, `warning` or `error`; used as a CSS class.
    pub level: &'static str,
    pub text: String,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: "info",
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            level: "warning",
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

/// `""` is the "any" choice.
pub fn select_options<'a>(
    values: impl IntoIterator<Item = &'a str>,
    current: &str,
) -> Vec<SelectOption> {
    std::iter::once("")
        .chain(values)
        .map(|v| SelectOption {
            value: v.to_string(),
            label: if v.is_empty() {
                "any".to_string()
            } else {
                v.replace('_', " ")
            },
            selected: v == current,
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct Pager {
    pub page: usize,
    pub total_pages: usize,
    pub total: usize,
    pub previous: Option<String>,
    pub next: Option<String>,
}

impl Pager {
    /// `params` are the active filters, carried into the page links.
    pub fn new<T>(page: &Page<T>, path: &str, params: &[(&str, &str)]) -> Self {
        let link = |n: usize| {
            let mut query = form_urlencoded::Serializer::new(String::new());
            for (k, v) in params.iter().filter(|(_, v)| !v.is_empty()) {
                query.append_pair(k, v);
            }
            query.append_pair("page", &n.to_string());
            format!("{path}?{}", query.finish())
        };
        Self {
            page: page.page,
            total_pages: page.total_pages,
            total: page.total,
            previous: page.has_previous().then(|| link(page.page - 1)),
            next: page.has_next().then(|| link(page.page + 1)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AccountRow {
    pub id: String,
    pub user_id: String,
    pub kind: String,
    pub platform: String,
    pub size: String,
    pub balance: String,
    pub equity: String,
    pub status: String,
    pub phase: String,
    pub last_updated: String,
}

impl From<&Account> for AccountRow {
    fn from(account: &Account) -> Self {
        Self {
            id: account.account_id.clone(),
            user_id: account.user_id.clone(),
            kind: account.kind.label().to_string(),
            platform: account.platform.label().to_string(),
            size: money(account.starting_balance),
            balance: money(account.balance),
            equity: money(account.equity),
            status: account.status.as_str().to_string(),
            phase: match account.step {
                Step::Challenge => "Challenge".to_string(),
                Step::Funded => "Funded".to_string(),
            },
            last_updated: account
                .last_updated
                .map(timestamp)
                .unwrap_or_else(|| "never".to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlanLink {
    pub label: String,
    pub href: String,
}

pub fn plan_links(catalog: &CheckoutCatalog) -> Vec<PlanLink> {
    let mut links: Vec<(u32, PlanLink)> = catalog
        .plan_keys()
        .filter_map(|key| {
            let (kind, size) = parse_plan_key(key).ok()?;
            Some((
                size,
                PlanLink {
                    label: format!("{} {}", kind.label(), money(f64::from(size))),
                    href: format!("/checkout/{key}"),
                },
            ))
        })
        .collect();
    links.sort_by(|(a, x), (b, y)| a.cmp(b).then_with(|| x.label.cmp(&y.label)));
    links.into_iter().map(|(_, link)| link).collect()
}

#[derive(Debug, Clone)]
pub struct PayoutRow {
    pub id: String,
    pub user_id: String,
    pub account_id: String,
    pub amount: String,
    pub method: String,
    pub status: String,
    pub requested: String,
    /// Statuses the payout may move to next.
    pub transitions: Vec<String>,
}

impl From<&PayoutRequest> for PayoutRow {
    fn from(payout: &PayoutRequest) -> Self {
        Self {
            id: payout.id.clone(),
            user_id: payout.user_id.clone(),
            account_id: payout.account_id.clone(),
            amount: format!("{} {}", money(payout.amount), payout.currency),
            method: payout.method.clone(),
            status: payout.status.as_str().to_string(),
            requested: timestamp(payout.requested_at),
            transitions: PayoutStatus::ALL
                .into_iter()
                .filter(|s| payout.status.can_move_to(*s))
                .map(|s| s.as_str().to_string())
                .collect(),
        }
    }
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub nav: Option<Nav>,
    pub error: Option<String>,
    pub email: String,
    pub next: String,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub nav: Option<Nav>,
    pub name: String,
    pub accounts: Vec<AccountRow>,
    pub payouts: Vec<PayoutRow>,
    pub plans: Vec<PlanLink>,
}

#[derive(Debug, Clone)]
pub struct ObjectiveRow {
    pub name: &'static str,
    pub target: String,
    pub current: String,
    pub passed: bool,
    pub note: String,
}

impl ObjectiveRow {
    fn percent(name: &'static str, objective: &Objective) -> Self {
        let mut notes = Vec::new();
        if objective.recent_breach == Some(true) {
            notes.push("currently beyond the limit");
        }
        match objective.is_static {
            Some(true) => notes.push("static, from starting balance"),
            Some(false) => notes.push("trailing"),
            None => {}
        }
        Self {
            name,
            target: objective
                .target
                .map(pct)
                .unwrap_or_else(|| "none".to_string()),
            current: pct(objective.current),
            passed: objective.passed,
            note: notes.join(", "),
        }
    }

    fn days(objective: &Objective) -> Self {
        Self {
            name: "Minimum trading days",
            target: objective
                .target
                .map(|t| format!("{t:.0}"))
                .unwrap_or_else(|| "none".to_string()),
            current: format!("{:.0}", objective.current),
            passed: objective.passed,
            note: String::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StatRow {
    pub label: &'static str,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct TradeRow {
    pub symbol: String,
    pub side: String,
    pub volume: String,
    pub opened: String,
    pub closed: String,
    pub profit: String,
    pub losing: bool,
}

#[derive(Debug, Clone)]
pub struct RiskRow {
    pub broker_time: String,
    pub threshold: &'static str,
    pub absolute: String,
    pub relative: String,
}

#[derive(Debug, Clone)]
pub struct PeriodRow {
    pub date: String,
    pub trades: u32,
    pub profit: String,
    pub lots: String,
    pub gain: String,
}

#[derive(Template)]
#[template(path = "account.html")]
pub struct AccountTemplate {
    pub nav: Option<Nav>,
    pub account: AccountRow,
    pub notice: Option<Notice>,
    /// Nothing cached yet; the page offers a manual fetch.
    pub unavailable: bool,
    pub can_refresh: bool,
    pub cached_at: String,
    pub objectives: Vec<ObjectiveRow>,
    pub stats: Vec<StatRow>,
    pub chart_svg: String,
    pub trades: Vec<TradeRow>,
    pub risk_events: Vec<RiskRow>,
    pub period_stats: Vec<PeriodRow>,
    /// Withdrawable profit, when the account can pay out.
    pub payout_available: Option<String>,
}

impl AccountTemplate {
    pub fn build(nav: Nav, account: &Account, view: &MetricsView) -> Self {
        let notice = match view {
            MetricsView::Fresh(_) => None,
            MetricsView::Refreshed(_) => Some(Notice::info("Metrics refreshed from the provider.")),
            MetricsView::Stale { cached, reason } => Some(Notice::warning(format!(
                "Showing metrics from {}. Refresh failed: {reason}",
                timestamp(cached.last_updated)
            ))),
            MetricsView::Frozen(Some(cached)) => Some(Notice::warning(format!(
                "This account has failed. Metrics are frozen as of {}.",
                timestamp(cached.last_updated)
            ))),
            MetricsView::Frozen(None) => Some(Notice::warning(
                "This account has failed. No metrics were recorded before it closed.",
            )),
            MetricsView::Unavailable => Some(Notice::info("No metrics data available yet.")),
        };

        let mut page = Self {
            nav: Some(nav),
            account: AccountRow::from(account),
            notice,
            unavailable: view.cached().is_none(),
            can_refresh: account.status != AccountStatus::Failed,
            cached_at: String::new(),
            objectives: Vec::new(),
            stats: Vec::new(),
            chart_svg: String::new(),
            trades: Vec::new(),
            risk_events: Vec::new(),
            period_stats: Vec::new(),
            payout_available: (account.is_funded() && !account.is_failed())
                .then(|| money(account.withdrawable_profit())),
        };
        if let Some(cached) = view.cached() {
            page.fill(cached, account.starting_balance);
        }
        page
    }

    fn fill(&mut self, cached: &CachedMetrics, starting_balance: f64) {
        let objectives = &cached.objectives;
        let metrics = &cached.metrics;

        self.cached_at = timestamp(cached.last_updated);
        self.objectives = vec![
            ObjectiveRow::percent("Profit target", &objectives.profit_target),
            ObjectiveRow::percent("Maximum daily loss", &objectives.max_daily_drawdown),
            ObjectiveRow::percent("Maximum drawdown", &objectives.max_drawdown),
            ObjectiveRow::days(&objectives.min_trading_days),
        ];

        let optional_money = |v: Option<f64>| v.map(money).unwrap_or_else(|| "-".to_string());
        self.stats = vec![
            StatRow { label: "Balance", value: money(metrics.balance) },
            StatRow { label: "Equity", value: money(metrics.equity) },
            StatRow { label: "Profit", value: money(metrics.profit) },
            StatRow { label: "Trades", value: metrics.trades.to_string() },
            StatRow {
                label: "Won / lost",
                value: format!("{} / {}", metrics.won_trades, metrics.lost_trades),
            },
            StatRow {
                label: "Win rate",
                value: metrics.win_rate.map(pct).unwrap_or_else(|| "-".to_string()),
            },
            StatRow { label: "Average win", value: optional_money(metrics.average_win) },
            StatRow { label: "Average loss", value: optional_money(metrics.average_loss) },
            StatRow { label: "Lots", value: format!("{:.2}", metrics.lots) },
            StatRow { label: "Trading days", value: metrics.trading_days.to_string() },
        ];

        self.chart_svg = equity_svg(&cached.equity_chart, Some(starting_balance));

        self.trades = cached
            .trades
            .iter()
            .map(|t| TradeRow {
                symbol: t.symbol.clone(),
                side: t.side.clone(),
                volume: format!("{:.2}", t.volume),
                opened: timestamp(t.open_time),
                closed: t.close_time.map(timestamp).unwrap_or_else(|| "open".to_string()),
                profit: money(t.profit),
                losing: t.profit < 0.0,
            })
            .collect();

        self.risk_events = cached
            .risk_events
            .iter()
            .map(|e| RiskRow {
                broker_time: e.broker_time.clone(),
                threshold: e.exceeded_threshold_type.label(),
                absolute: money(e.absolute_drawdown),
                relative: pct(e.relative_drawdown),
            })
            .collect();

        self.period_stats = cached
            .period_stats
            .iter()
            .map(|p| PeriodRow {
                date: p.date.format("%Y-%m-%d").to_string(),
                trades: p.trades,
                profit: money(p.profit),
                lots: format!("{:.2}", p.lots),
                gain: pct(p.gain_pct),
            })
            .collect();
    }
}

#[derive(Debug, Clone)]
pub struct OrderRow {
    pub id: String,
    pub kind: &'static str,
    pub status: &'static str,
    pub challenge: String,
    pub customer: String,
    pub email: String,
    pub price: String,
    pub created: String,
    pub notes: String,
    pub can_toggle: bool,
    pub status_options: Vec<SelectOption>,
}

impl From<&Order> for OrderRow {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id.clone(),
            kind: order.kind.as_str(),
            status: order.status.as_str(),
            challenge: format!(
                "{} {}",
                order.challenge_type.label(),
                money(order.challenge_amount)
            ),
            customer: order.customer.full_name(),
            email: order.customer.email.clone(),
            price: format!("{} {}", money(order.payment.amount), order.payment.currency),
            created: timestamp(order.created_at),
            notes: order.notes.clone(),
            can_toggle: matches!(order.status, OrderStatus::Pending | OrderStatus::Completed),
            status_options: OrderStatus::ALL
                .into_iter()
                .map(|s| SelectOption {
                    value: s.as_str().to_string(),
                    label: s.as_str().to_string(),
                    selected: s == order.status,
                })
                .collect(),
        }
    }
}

#[derive(Template)]
#[template(path = "admin_orders.html")]
pub struct AdminOrdersTemplate {
    pub nav: Option<Nav>,
    pub rows: Vec<OrderRow>,
    pub query: String,
    pub status_filter: Vec<SelectOption>,
    pub kind_filter: Vec<SelectOption>,
    pub pager: Pager,
}

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub name: String,
    pub is_admin: bool,
    pub kyc: &'static str,
    pub has_profile: bool,
    pub created: String,
}

impl From<&UserRecord> for UserRow {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.display_name.clone(),
            is_admin: user.is_admin,
            kyc: user.kyc_status.as_str(),
            has_profile: user.has_profile,
            created: timestamp(user.created_at),
        }
    }
}

#[derive(Template)]
#[template(path = "admin_users.html")]
pub struct AdminUsersTemplate {
    pub nav: Option<Nav>,
    pub notice: Option<Notice>,
    pub rows: Vec<UserRow>,
    pub query: String,
    pub kyc_filter: Vec<SelectOption>,
    pub missing_only: bool,
    pub pager: Pager,
}

#[derive(Template)]
#[template(path = "admin_payouts.html")]
pub struct AdminPayoutsTemplate {
    pub nav: Option<Nav>,
    pub rows: Vec<PayoutRow>,
    pub query: String,
    pub status_filter: Vec<SelectOption>,
    pub pager: Pager,
}

#[derive(Template)]
#[template(path = "admin_accounts.html")]
pub struct AdminAccountsTemplate {
    pub nav: Option<Nav>,
    pub rows: Vec<AccountRow>,
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate<'a> {
    pub nav: Option<Nav>,
    pub status: u16,
    pub message: &'a str,
}
