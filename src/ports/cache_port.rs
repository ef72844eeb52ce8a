//! Cached metrics collection, one document per account.

use crate::domain::error::PropdeskError;
use crate::domain::metrics_cache::CachedMetrics;

pub trait MetricsCachePort {
    fn get_cached(&self, account_id: &str) -> Result<Option<CachedMetrics>, PropdeskError>;

    /// Overwrites whatever is cached for the account.
    fn put_cached(&self, cached: &CachedMetrics) -> Result<(), PropdeskError>;
}
