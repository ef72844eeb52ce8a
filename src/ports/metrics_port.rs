//! Upstream metrics provider port.

use crate::domain::error::PropdeskError;
use crate::domain::metrics::{MetricsRequest, UpstreamReport};

pub trait MetricsPort {
    fn fetch_report(&self, request: &MetricsRequest) -> Result<UpstreamReport, PropdeskError>;
}
