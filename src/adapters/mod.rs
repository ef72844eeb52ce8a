//! Concrete adapter implementations for ports.

pub mod chart_svg;
pub mod file_config_adapter;
pub mod http_email_adapter;
pub mod metrics_api_adapter;
pub mod sqlite_adapter;
#[cfg(feature = "web")]
pub mod web;
