//! Transactional email provider port.

use crate::domain::email::EmailMessage;
use crate::domain::error::PropdeskError;

pub trait EmailPort {
    /// Hand the message to the provider and return its message id.
    fn send(&self, message: &EmailMessage) -> Result<String, PropdeskError>;
}
