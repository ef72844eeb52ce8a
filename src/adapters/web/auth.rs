//! Authentication backend for axum-login.
//!
//! Users sign in with the email and argon2 password hash held in the
//! identity store; the admin flag comes from their profile.

use axum_login::{AuthUser, AuthnBackend, UserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::domain::error::PropdeskError;
use crate::domain::user::{Identity, verify_password};
use crate::ports::DocumentStore;

pub type AuthSession = axum_login::AuthSession<Backend>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub is_admin: bool,
    /// The password hash as bytes; changing the password ends old sessions.
    pw_hash_bytes: Vec<u8>,
}

impl AuthUser for User {
    type Id = String;

    fn id(&self) -> String {
        self.id.clone()
    }

    fn session_auth_hash(&self) -> &[u8] {
        &self.pw_hash_bytes
    }
}

/// Login form fields.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Clone)]
pub struct Backend {
    store: Arc<dyn DocumentStore>,
}

impl Backend {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

fn load_user(store: &dyn DocumentStore, identity: Identity) -> Result<User, PropdeskError> {
    let profile = store.get_profile(&identity.id)?;
    Ok(User {
        display_name: profile
            .as_ref()
            .map(|p| p.display_name.clone())
            .unwrap_or_else(|| identity.email.clone()),
        is_admin: profile.map(|p| p.is_admin).unwrap_or(false),
        pw_hash_bytes: identity.password_hash.into_bytes(),
        id: identity.id,
        email: identity.email,
    })
}

fn join_error(e: tokio::task::JoinError) -> PropdeskError {
    PropdeskError::Io(std::io::Error::other(e))
}

impl AuthnBackend for Backend {
    type User = User;
    type Credentials = Credentials;
    type Error = PropdeskError;

    async fn authenticate(
        &self,
        creds: Self::Credentials,
    ) -> Result<Option<Self::User>, Self::Error> {
        let store = Arc::clone(&self.store);
        // argon2 verification is CPU bound.
        tokio::task::spawn_blocking(move || {
            let email = creds.email.trim().to_lowercase();
            let Some(identity) = store.find_identity_by_email(&email)? else {
                return Ok(None);
            };
            if !verify_password(&creds.password, &identity.password_hash) {
                return Ok(None);
            }
            load_user(store.as_ref(), identity).map(Some)
        })
        .await
        .map_err(join_error)?
    }

    async fn get_user(&self, user_id: &UserId<Self>) -> Result<Option<Self::User>, Self::Error> {
        let store = Arc::clone(&self.store);
        let user_id = user_id.clone();
        tokio::task::spawn_blocking(move || match store.get_identity(&user_id)? {
            Some(identity) => load_user(store.as_ref(), identity).map(Some),
            None => Ok(None),
        })
        .await
        .map_err(join_error)?
    }
}
