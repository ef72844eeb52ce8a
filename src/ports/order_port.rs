//! Order collection (crypto orders and card purchases).

use crate::domain::error::PropdeskError;
use crate::domain::order::Order;

pub trait OrderPort {
    fn list_orders(&self) -> Result<Vec<Order>, PropdeskError>;

    fn get_order(&self, id: &str) -> Result<Option<Order>, PropdeskError>;

    fn put_order(&self, order: &Order) -> Result<(), PropdeskError>;

    /// Returns false when there was nothing to delete.
    fn delete_order(&self, id: &str) -> Result<bool, PropdeskError>;
}
