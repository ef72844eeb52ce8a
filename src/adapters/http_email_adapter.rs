//! Transactional email over a Resend-style HTTP API.

use crate::domain::email::EmailMessage;
use crate::domain::error::PropdeskError;
use crate::ports::config_port::ConfigPort;
use crate::ports::email_port::EmailPort;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

pub const DEFAULT_API_URL: &str = "https://api.resend.com/emails";

#[derive(Debug, Serialize)]
struct SendBody<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: String,
}

pub struct HttpEmailAdapter {
    client: Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl HttpEmailAdapter {
    pub fn new(
        api_url: &str,
        api_key: &str,
        from: &str,
        timeout_secs: u64,
    ) -> Result<Self, PropdeskError> {
        if api_key.trim().is_empty() {
            return Err(PropdeskError::ConfigMissing {
                section: "email".into(),
                key: "api_key".into(),
            });
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()
            .map_err(|e| PropdeskError::Email {
                reason: format!("http client build failed: {e}"),
            })?;
        Ok(Self {
            client,
            api_url: api_url.trim().to_string(),
            api_key: api_key.trim().to_string(),
            from: from.trim().to_string(),
        })
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, PropdeskError> {
        let api_key = config
            .get_string("email", "api_key")
            .ok_or_else(|| PropdeskError::ConfigMissing {
                section: "email".into(),
                key: "api_key".into(),
            })?;
        let from = config
            .get_string("email", "from")
            .ok_or_else(|| PropdeskError::ConfigMissing {
                section: "email".into(),
                key: "from".into(),
            })?;
        let api_url = config
            .get_string("email", "api_url")
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let timeout = config.get_int("email", "timeout_secs", 15).max(1) as u64;
        Self::new(&api_url, &api_key, &from, timeout)
    }
}

impl EmailPort for HttpEmailAdapter {
    fn send(&self, message: &EmailMessage) -> Result<String, PropdeskError> {
        let body = SendBody {
            from: &self.from,
            to: [&message.to],
            subject: &message.subject,
            html: &message.html,
        };
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| PropdeskError::Email {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(PropdeskError::Email {
                reason: format!("{status}: {}", text.trim()),
            });
        }

        let sent: SendResponse = response.json().map_err(|e| PropdeskError::Email {
            reason: format!("malformed provider response: {e}"),
        })?;
        info!(message_id = %sent.id, subject = %message.subject, "email sent");
        Ok(sent.id)
    }
}
