//! HTTP client for the upstream account metrics provider.

use crate::domain::error::PropdeskError;
use crate::domain::metrics::{MetricsRequest, UpstreamReport};
use crate::ports::config_port::ConfigPort;
use crate::ports::metrics_port::MetricsPort;
use reqwest::blocking::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub struct MetricsApiAdapter {
    client: Client,
    base_url: Url,
}

impl MetricsApiAdapter {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, PropdeskError> {
        let base_url = Url::parse(base_url.trim()).map_err(|e| PropdeskError::ConfigInvalid {
            section: "metrics".into(),
            key: "base_url".into(),
            reason: e.to_string(),
        })?;
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()
            .map_err(|e| PropdeskError::Upstream {
                reason: format!("http client build failed: {e}"),
            })?;
        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, PropdeskError> {
        let base_url =
            config
                .get_string("metrics", "base_url")
                .ok_or_else(|| PropdeskError::ConfigMissing {
                    section: "metrics".into(),
                    key: "base_url".into(),
                })?;
        let timeout = config.get_int("metrics", "timeout_secs", 20).max(1) as u64;
        Self::new(&base_url, timeout)
    }

    /// `<base>/users/current/accounts/<id>/report`
    pub fn report_url(&self, account_id: &str) -> Result<Url, PropdeskError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| PropdeskError::Upstream {
                reason: format!("'{}' cannot take a path", self.base_url),
            })?
            .pop_if_empty()
            .extend(["users", "current", "accounts", account_id, "report"]);
        Ok(url)
    }
}

impl MetricsPort for MetricsApiAdapter {
    fn fetch_report(&self, request: &MetricsRequest) -> Result<UpstreamReport, PropdeskError> {
        let url = self.report_url(&request.account_id)?;
        debug!(account_id = %request.account_id, %url, "fetching metrics");

        let response = self
            .client
            .get(url)
            .header("auth-token", &request.account_token)
            .query(&[
                ("accountType", request.account_type.as_str().to_string()),
                ("accountSize", request.account_size.to_string()),
                ("step", request.step.number().to_string()),
            ])
            .send()
            .map_err(|e| PropdeskError::Upstream {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(PropdeskError::Upstream {
                reason: format!("no metrics data available for {}", request.account_id),
            });
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(PropdeskError::Upstream {
                reason: format!("{status}: {}", body.trim()),
            });
        }

        response.json::<UpstreamReport>().map_err(|e| PropdeskError::Upstream {
            reason: format!("malformed metrics response: {e}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_url_appends_account_path() {
        let adapter = MetricsApiAdapter::new("https://metrics.example.com/v1/", 5).unwrap();
        assert_eq!(
            adapter.report_url("acc 1").unwrap().as_str(),
            "https://metrics.example.com/v1/users/current/accounts/acc%201/report"
        );
    }

    #[test]
    fn invalid_base_url_is_config_error() {
        assert!(matches!(
            MetricsApiAdapter::new("not a url", 5),
            Err(PropdeskError::ConfigInvalid { .. })
        ));
    }
}
