//! Account snapshot collection.

use crate::domain::account::Account;
use crate::domain::error::PropdeskError;

pub trait AccountPort {
    fn get_account(&self, account_id: &str) -> Result<Option<Account>, PropdeskError>;

    fn list_accounts(&self) -> Result<Vec<Account>, PropdeskError>;

    fn accounts_for_user(&self, user_id: &str) -> Result<Vec<Account>, PropdeskError> {
        Ok(self
            .list_accounts()?
            .into_iter()
            .filter(|a| a.user_id == user_id)
            .collect())
    }

    /// Insert or overwrite.
    fn put_account(&self, account: &Account) -> Result<(), PropdeskError>;
}
