//! Payout request collection.

use crate::domain::error::PropdeskError;
use crate::domain::payout::PayoutRequest;

pub trait PayoutPort {
    fn list_payouts(&self) -> Result<Vec<PayoutRequest>, PropdeskError>;

    fn get_payout(&self, id: &str) -> Result<Option<PayoutRequest>, PropdeskError>;

    fn put_payout(&self, payout: &PayoutRequest) -> Result<(), PropdeskError>;
}
