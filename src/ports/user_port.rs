//! Identity store (logins) and profile store (user documents).

use crate::domain::error::PropdeskError;
use crate::domain::user::{Identity, Profile};

pub trait IdentityPort {
    fn list_identities(&self) -> Result<Vec<Identity>, PropdeskError>;

    fn get_identity(&self, id: &str) -> Result<Option<Identity>, PropdeskError>;

    fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>, PropdeskError>;

    fn put_identity(&self, identity: &Identity) -> Result<(), PropdeskError>;

    fn delete_identity(&self, id: &str) -> Result<bool, PropdeskError>;
}

pub trait ProfilePort {
    fn list_profiles(&self) -> Result<Vec<Profile>, PropdeskError>;

    fn get_profile(&self, id: &str) -> Result<Option<Profile>, PropdeskError>;

    fn put_profile(&self, profile: &Profile) -> Result<(), PropdeskError>;

    fn delete_profile(&self, id: &str) -> Result<bool, PropdeskError>;
}
