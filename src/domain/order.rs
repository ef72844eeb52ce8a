//! Challenge purchase orders, paid by crypto or card.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

use super::email::{EmailTemplate, send_template};
use super::error::PropdeskError;
use super::ids::new_id;
use super::listing::{Page, matches_text, paginate};
use super::rules::AccountKind;
use crate::ports::email_port::EmailPort;
use crate::ports::order_port::OrderPort;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
    Crypto,
    Card,
}

impl OrderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderKind::Crypto => "crypto",
            OrderKind::Card => "card",
        }
    }
}

impl FromStr for OrderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "crypto" => Ok(OrderKind::Crypto),
            "card" => Ok(OrderKind::Card),
            other => Err(format!("unknown order kind '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Completed,
        OrderStatus::Failed,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Completed => "completed",
            OrderStatus::Failed => "failed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| format!("unknown order status '{}'", s.trim()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl Customer {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub method: String,
    pub amount: f64,
    pub currency: String,
    #[serde(default)]
    pub transaction_id: Option<String>,
    /// Crypto orders only.
    #[serde(default)]
    pub wallet_address: Option<String>,
    #[serde(default)]
    pub network: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub kind: OrderKind,
    pub status: OrderStatus,
    pub challenge_type: AccountKind,
    pub challenge_amount: f64,
    pub customer: Customer,
    pub payment: Payment,
    #[serde(default)]
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Checkout submission, before an id and status are assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub kind: OrderKind,
    pub challenge_type: AccountKind,
    pub challenge_amount: f64,
    pub customer: Customer,
    pub payment: Payment,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderFilter {
    pub text: String,
    pub status: Option<OrderStatus>,
    pub kind: Option<OrderKind>,
}

impl OrderFilter {
    pub fn matches(&self, order: &Order) -> bool {
        self.status.is_none_or(|s| s == order.status)
            && self.kind.is_none_or(|k| k == order.kind)
            && matches_text(
                &self.text,
                &[
                    &order.id,
                    &order.customer.email,
                    &order.customer.first_name,
                    &order.customer.last_name,
                    order.payment.transaction_id.as_deref().unwrap_or(""),
                ],
            )
    }
}

/// Newest first.
pub fn list_orders<S>(
    store: &S,
    filter: &OrderFilter,
    page: usize,
    per_page: usize,
) -> Result<Page<Order>, PropdeskError>
where
    S: OrderPort + ?Sized,
{
    let mut orders: Vec<Order> = store
        .list_orders()?
        .into_iter()
        .filter(|o| filter.matches(o))
        .collect();
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(paginate(orders, page, per_page))
}

pub fn record_order<S>(
    store: &S,
    new_order: NewOrder,
    now: DateTime<Utc>,
) -> Result<Order, PropdeskError>
where
    S: OrderPort + ?Sized,
{
    if new_order.challenge_amount <= 0.0 || !new_order.challenge_amount.is_finite() {
        return Err(PropdeskError::validation("challenge amount must be positive"));
    }
    if new_order.payment.amount < 0.0 || !new_order.payment.amount.is_finite() {
        return Err(PropdeskError::validation("payment amount must not be negative"));
    }
    if !super::email::looks_like_email(&new_order.customer.email) {
        return Err(PropdeskError::validation("customer email is invalid"));
    }

    let order = Order {
        id: new_id("ord"),
        kind: new_order.kind,
        status: OrderStatus::Pending,
        challenge_type: new_order.challenge_type,
        challenge_amount: new_order.challenge_amount,
        customer: new_order.customer,
        payment: new_order.payment,
        notes: String::new(),
        created_at: now,
        updated_at: now,
    };
    store.put_order(&order)?;
    info!(order_id = %order.id, kind = order.kind.as_str(), "order recorded");
    Ok(order)
}

fn get_order<S>(store: &S, id: &str) -> Result<Order, PropdeskError>
where
    S: OrderPort + ?Sized,
{
    store
        .get_order(id)?
        .ok_or_else(|| PropdeskError::not_found("order", id))
}

/// Set an order's status. Moving into `completed` sends the purchase
/// confirmation; a mail failure is logged and does not undo the change.
pub fn set_order_status<S>(
    store: &S,
    mailer: &dyn EmailPort,
    id: &str,
    status: OrderStatus,
    now: DateTime<Utc>,
) -> Result<Order, PropdeskError>
where
    S: OrderPort + ?Sized,
{
    let mut order = get_order(store, id)?;
    let previous = order.status;
    order.status = status;
    order.updated_at = now;
    store.put_order(&order)?;
    info!(order_id = %id, from = %previous, to = %status, "order status changed");

    if status == OrderStatus::Completed && previous != OrderStatus::Completed {
        let template = EmailTemplate::PurchaseConfirmation {
            name: order.customer.full_name(),
            order_id: order.id.clone(),
            challenge_type: order.challenge_type,
            challenge_amount: order.challenge_amount,
            price: order.payment.amount,
            currency: order.payment.currency.clone(),
        };
        if let Err(e) = send_template(mailer, &order.customer.email, &template) {
            warn!(order_id = %id, error = %e, "purchase confirmation not sent");
        }
    }
    Ok(order)
}

/// Flip between pending and completed. Other statuses must be set explicitly.
pub fn toggle_order_status<S>(
    store: &S,
    mailer: &dyn EmailPort,
    id: &str,
    now: DateTime<Utc>,
) -> Result<Order, PropdeskError>
where
    S: OrderPort + ?Sized,
{
    let order = get_order(store, id)?;
    let next = match order.status {
        OrderStatus::Pending => OrderStatus::Completed,
        OrderStatus::Completed => OrderStatus::Pending,
        other => {
            return Err(PropdeskError::validation(format!(
                "cannot toggle an order that is {other}"
            )));
        }
    };
    set_order_status(store, mailer, id, next, now)
}

pub fn update_order_notes<S>(
    store: &S,
    id: &str,
    notes: &str,
    now: DateTime<Utc>,
) -> Result<Order, PropdeskError>
where
    S: OrderPort + ?Sized,
{
    let mut order = get_order(store, id)?;
    order.notes = notes.trim().to_string();
    order.updated_at = now;
    store.put_order(&order)?;
    Ok(order)
}

/// Delete an order. `confirm` must repeat the order id.
pub fn delete_order<S>(store: &S, id: &str, confirm: &str) -> Result<(), PropdeskError>
where
    S: OrderPort + ?Sized,
{
    if confirm.trim() != id {
        return Err(PropdeskError::validation(
            "confirmation does not match the order id",
        ));
    }
    if !store.delete_order(id)? {
        return Err(PropdeskError::not_found("order", id));
    }
    info!(order_id = %id, "order deleted");
    Ok(())
}
