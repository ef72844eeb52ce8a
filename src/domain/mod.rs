//! Core domain types and logic.

pub mod account;
pub mod checkout;
pub mod config_validation;
pub mod email;
pub mod error;
pub mod format;
pub mod ids;
pub mod listing;
pub mod metrics;
pub mod metrics_cache;
pub mod objectives;
pub mod order;
pub mod payout;
pub mod rules;
pub mod user;
