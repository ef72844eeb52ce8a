//! Port traits the domain depends on; adapters implement them.

pub mod account_port;
pub mod cache_port;
pub mod config_port;
pub mod email_port;
pub mod metrics_port;
pub mod order_port;
pub mod payout_port;
pub mod user_port;

use account_port::AccountPort;
use cache_port::MetricsCachePort;
use order_port::OrderPort;
use payout_port::PayoutPort;
use user_port::{IdentityPort, ProfilePort};

/// Every collection the application reads and writes, behind one handle.
pub trait DocumentStore:
    AccountPort
    + MetricsCachePort
    + OrderPort
    + IdentityPort
    + ProfilePort
    + PayoutPort
    + Send
    + Sync
{
}

impl<T> DocumentStore for T where
    T: AccountPort
        + MetricsCachePort
        + OrderPort
        + IdentityPort
        + ProfilePort
        + PayoutPort
        + Send
        + Sync
{
}
