//! Transactional email templates.
//!
//! Each template is an askama HTML file under `templates/emails/`, so every
//! parameter is HTML-escaped on render.

use askama::Template;
use serde::{Deserialize, Serialize};

use super::account::Platform;
use super::error::PropdeskError;
use super::format::money;
use super::rules::AccountKind;
use crate::ports::email_port::EmailPort;

pub const BRAND: &str = "PropDesk";

/// A fully rendered email ready for the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

impl EmailMessage {
    pub fn validate(&self) -> Result<(), PropdeskError> {
        if !looks_like_email(&self.to) {
            return Err(PropdeskError::validation(format!(
                "'{}' is not an email address",
                self.to
            )));
        }
        if self.subject.trim().is_empty() {
            return Err(PropdeskError::validation("subject is empty"));
        }
        if self.html.trim().is_empty() {
            return Err(PropdeskError::validation("body is empty"));
        }
        Ok(())
    }
}

pub fn looks_like_email(address: &str) -> bool {
    let address = address.trim();
    match address.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum EmailTemplate {
    Welcome {
        name: String,
    },
    PurchaseConfirmation {
        name: String,
        order_id: String,
        challenge_type: AccountKind,
        challenge_amount: f64,
        price: f64,
        currency: String,
    },
    AccountCredentials {
        name: String,
        login: String,
        password: String,
        server: String,
        platform: Platform,
    },
    ChallengePassed {
        name: String,
        account_id: String,
    },
    ChallengeFailed {
        name: String,
        account_id: String,
        reason: String,
    },
    KycApproved {
        name: String,
    },
    KycRejected {
        name: String,
        reason: String,
    },
    PayoutProcessed {
        name: String,
        amount: f64,
        currency: String,
    },
}

#[derive(Template)]
#[template(path = "emails/welcome.html")]
struct WelcomeEmail<'a> {
    brand: &'a str,
    name: &'a str,
}

#[derive(Template)]
#[template(path = "emails/purchase_confirmation.html")]
struct PurchaseConfirmationEmail<'a> {
    brand: &'a str,
    name: &'a str,
    order_id: &'a str,
    challenge: &'a str,
    account_size: String,
    price: String,
    currency: &'a str,
}

#[derive(Template)]
#[template(path = "emails/account_credentials.html")]
struct AccountCredentialsEmail<'a> {
    brand: &'a str,
    name: &'a str,
    login: &'a str,
    password: &'a str,
    server: &'a str,
    platform: &'a str,
}

#[derive(Template)]
#[template(path = "emails/challenge_passed.html")]
struct ChallengePassedEmail<'a> {
    brand: &'a str,
    name: &'a str,
    account_id: &'a str,
}

#[derive(Template)]
#[template(path = "emails/challenge_failed.html")]
struct ChallengeFailedEmail<'a> {
    brand: &'a str,
    name: &'a str,
    account_id: &'a str,
    reason: &'a str,
}

#[derive(Template)]
#[template(path = "emails/kyc_approved.html")]
struct KycApprovedEmail<'a> {
    brand: &'a str,
    name: &'a str,
}

#[derive(Template)]
#[template(path = "emails/kyc_rejected.html")]
struct KycRejectedEmail<'a> {
    brand: &'a str,
    name: &'a str,
    reason: &'a str,
}

#[derive(Template)]
#[template(path = "emails/payout_processed.html")]
struct PayoutProcessedEmail<'a> {
    brand: &'a str,
    name: &'a str,
    amount: String,
    currency: &'a str,
}

impl EmailTemplate {
    pub fn subject(&self) -> String {
        match self {
            EmailTemplate::Welcome { .. } => format!("Welcome to {BRAND}"),
            EmailTemplate::PurchaseConfirmation { order_id, .. } => {
                format!("Order {order_id} confirmed")
            }
            EmailTemplate::AccountCredentials { platform, .. } => {
                format!("Your {} account credentials", platform.label())
            }
            EmailTemplate::ChallengePassed { account_id, .. } => {
                format!("Challenge passed on account {account_id}")
            }
            EmailTemplate::ChallengeFailed { account_id, .. } => {
                format!("Challenge ended on account {account_id}")
            }
            EmailTemplate::KycApproved { .. } => "Identity verification approved".to_string(),
            EmailTemplate::KycRejected { .. } => "Identity verification update".to_string(),
            EmailTemplate::PayoutProcessed { .. } => "Your payout has been processed".to_string(),
        }
    }

    fn body(&self) -> Result<String, askama::Error> {
        match self {
            EmailTemplate::Welcome { name } => WelcomeEmail { brand: BRAND, name }.render(),
            EmailTemplate::PurchaseConfirmation {
                name,
                order_id,
                challenge_type,
                challenge_amount,
                price,
                currency,
            } => PurchaseConfirmationEmail {
                brand: BRAND,
                name,
                order_id,
                challenge: challenge_type.label(),
                account_size: money(*challenge_amount),
                price: money(*price),
                currency,
            }
            .render(),
            EmailTemplate::AccountCredentials {
                name,
                login,
                password,
                server,
                platform,
            } => AccountCredentialsEmail {
                brand: BRAND,
                name,
                login,
                password,
                server,
                platform: platform.label(),
            }
            .render(),
            EmailTemplate::ChallengePassed { name, account_id } => ChallengePassedEmail {
                brand: BRAND,
                name,
                account_id,
            }
            .render(),
            EmailTemplate::ChallengeFailed {
                name,
                account_id,
                reason,
            } => ChallengeFailedEmail {
                brand: BRAND,
                name,
                account_id,
                reason,
            }
            .render(),
            EmailTemplate::KycApproved { name } => KycApprovedEmail { brand: BRAND, name }.render(),
            EmailTemplate::KycRejected { name, reason } => KycRejectedEmail {
                brand: BRAND,
                name,
                reason,
            }
            .render(),
            EmailTemplate::PayoutProcessed {
                name,
                amount,
                currency,
            } => PayoutProcessedEmail {
                brand: BRAND,
                name,
                amount: money(*amount),
                currency,
            }
            .render(),
        }
    }

    pub fn render(&self, to: &str) -> Result<EmailMessage, PropdeskError> {
        let html = self.body().map_err(|e| PropdeskError::Email {
            reason: format!("template render failed: {e}"),
        })?;
        Ok(EmailMessage {
            to: to.trim().to_string(),
            subject: self.subject(),
            html,
        })
    }
}

/// Render `template` for `to` and hand it to the provider. Returns the
/// provider's message id.
pub fn send_template(
    mailer: &dyn EmailPort,
    to: &str,
    template: &EmailTemplate,
) -> Result<String, PropdeskError> {
    let message = template.render(to)?;
    message.validate()?;
    mailer.send(&message)
}

/// An outbound email request: a named template with its parameters, or a
/// ready `{to, subject, html}` message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OutboundEmail {
    Template { to: String, template: EmailTemplate },
    Raw(EmailMessage),
}

impl OutboundEmail {
    pub fn to_message(&self) -> Result<EmailMessage, PropdeskError> {
        match self {
            OutboundEmail::Template { to, template } => template.render(to),
            OutboundEmail::Raw(message) => Ok(message.clone()),
        }
    }
}

pub fn dispatch(mailer: &dyn EmailPort, outbound: &OutboundEmail) -> Result<String, PropdeskError> {
    let message = outbound.to_message()?;
    message.validate()?;
    mailer.send(&message)
}
