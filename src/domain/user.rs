//! Users: login identities, profile documents, KYC and the sync repair.
//!
//! An identity (email + password hash) and a profile (display name, admin
//! flag, KYC status) are stored separately and are not created atomically.
//! `sync_users` repairs identities that never got a profile.

use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

use super::email::{EmailTemplate, looks_like_email, send_template};
use super::error::PropdeskError;
use super::ids::new_id;
use super::listing::{Page, matches_text, paginate};
use crate::ports::email_port::EmailPort;
use crate::ports::user_port::{IdentityPort, ProfilePort};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KycStatus {
    NotSubmitted,
    Pending,
    Approved,
    Rejected,
}

impl KycStatus {
    pub const ALL: [KycStatus; 4] = [
        KycStatus::NotSubmitted,
        KycStatus::Pending,
        KycStatus::Approved,
        KycStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            KycStatus::NotSubmitted => "not_submitted",
            KycStatus::Pending => "pending",
            KycStatus::Approved => "approved",
            KycStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for KycStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KycStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KycStatus::ALL
            .into_iter()
            .find(|k| k.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| format!("unknown kyc status '{}'", s.trim()))
    }
}

/// Login record held by the identity store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Profile document held by the profile store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub is_admin: bool,
    pub kyc_status: KycStatus,
    #[serde(default)]
    pub kyc_note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    fn default_for(identity: &Identity, now: DateTime<Utc>) -> Self {
        Self {
            id: identity.id.clone(),
            email: identity.email.clone(),
            display_name: display_name_from_email(&identity.email),
            is_admin: false,
            kyc_status: KycStatus::NotSubmitted,
            kyc_note: None,
            created_at: now,
        }
    }
}

pub fn display_name_from_email(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_string()
}

/// Identity joined with its profile, as the admin user list shows it.
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub is_admin: bool,
    pub kyc_status: KycStatus,
    pub has_profile: bool,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    fn merge(identity: Identity, profile: Option<&Profile>) -> Self {
        match profile {
            Some(p) => Self {
                id: identity.id,
                email: identity.email,
                display_name: p.display_name.clone(),
                is_admin: p.is_admin,
                kyc_status: p.kyc_status,
                has_profile: true,
                created_at: identity.created_at,
            },
            None => Self {
                display_name: display_name_from_email(&identity.email),
                id: identity.id,
                email: identity.email,
                is_admin: false,
                kyc_status: KycStatus::NotSubmitted,
                has_profile: false,
                created_at: identity.created_at,
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserFilter {
    pub text: String,
    pub kyc_status: Option<KycStatus>,
    pub missing_profile_only: bool,
}

impl UserFilter {
    pub fn matches(&self, user: &UserRecord) -> bool {
        self.kyc_status.is_none_or(|k| k == user.kyc_status)
            && (!self.missing_profile_only || !user.has_profile)
            && matches_text(&self.text, &[&user.id, &user.email, &user.display_name])
    }
}

pub fn hash_password(password: &str) -> Result<String, PropdeskError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, Params::default());
    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| PropdeskError::validation(format!("cannot hash password: {e}")))
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Create an identity and its profile. The two writes are not atomic.
pub fn create_user<S>(
    store: &S,
    email: &str,
    password: &str,
    is_admin: bool,
    now: DateTime<Utc>,
) -> Result<UserRecord, PropdeskError>
where
    S: IdentityPort + ProfilePort + ?Sized,
{
    let email = email.trim().to_lowercase();
    if !looks_like_email(&email) {
        return Err(PropdeskError::validation(format!("'{email}' is not an email address")));
    }
    if password.len() < 8 {
        return Err(PropdeskError::validation("password must be at least 8 characters"));
    }
    if store.find_identity_by_email(&email)?.is_some() {
        return Err(PropdeskError::validation(format!("{email} is already registered")));
    }

    let identity = Identity {
        id: new_id("usr"),
        email,
        password_hash: hash_password(password)?,
        created_at: now,
    };
    store.put_identity(&identity)?;

    let mut profile = Profile::default_for(&identity, now);
    profile.is_admin = is_admin;
    store.put_profile(&profile)?;

    info!(user_id = %identity.id, is_admin, "user created");
    Ok(UserRecord::merge(identity, Some(&profile)))
}

/// Oldest first.
pub fn all_users<S>(store: &S) -> Result<Vec<UserRecord>, PropdeskError>
where
    S: IdentityPort + ProfilePort + ?Sized,
{
    let profiles: HashMap<String, Profile> = store
        .list_profiles()?
        .into_iter()
        .map(|p| (p.id.clone(), p))
        .collect();
    let mut users: Vec<UserRecord> = store
        .list_identities()?
        .into_iter()
        .map(|identity| {
            let profile = profiles.get(&identity.id);
            UserRecord::merge(identity, profile)
        })
        .collect();
    users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Ok(users)
}

pub fn list_users<S>(
    store: &S,
    filter: &UserFilter,
    page: usize,
    per_page: usize,
) -> Result<Page<UserRecord>, PropdeskError>
where
    S: IdentityPort + ProfilePort + ?Sized,
{
    let users = all_users(store)?
        .into_iter()
        .filter(|u| filter.matches(u))
        .collect();
    Ok(paginate(users, page, per_page))
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    pub checked: usize,
    pub created: Vec<String>,
}

/// Create a default profile for every identity that lacks one.
pub fn sync_users<S>(store: &S, now: DateTime<Utc>) -> Result<SyncReport, PropdeskError>
where
    S: IdentityPort + ProfilePort + ?Sized,
{
    let mut report = SyncReport::default();
    for identity in store.list_identities()? {
        report.checked += 1;
        if store.get_profile(&identity.id)?.is_some() {
            continue;
        }
        store.put_profile(&Profile::default_for(&identity, now))?;
        report.created.push(identity.id);
    }
    info!(checked = report.checked, created = report.created.len(), "user sync finished");
    Ok(report)
}

/// Record a KYC decision and tell the user about it. Approving or rejecting
/// sends an email; a mail failure is logged only.
pub fn set_kyc_status<S>(
    store: &S,
    mailer: &dyn EmailPort,
    user_id: &str,
    status: KycStatus,
    note: Option<&str>,
) -> Result<Profile, PropdeskError>
where
    S: ProfilePort + ?Sized,
{
    let mut profile = store
        .get_profile(user_id)?
        .ok_or_else(|| PropdeskError::not_found("profile", user_id))?;
    let note = note.map(str::trim).filter(|n| !n.is_empty());
    if status == KycStatus::Rejected && note.is_none() {
        return Err(PropdeskError::validation("a rejection needs a reason"));
    }

    profile.kyc_status = status;
    profile.kyc_note = note.map(str::to_string);
    store.put_profile(&profile)?;
    info!(user_id = %user_id, kyc = %status, "kyc status changed");

    let template = match status {
        KycStatus::Approved => Some(EmailTemplate::KycApproved {
            name: profile.display_name.clone(),
        }),
        KycStatus::Rejected => Some(EmailTemplate::KycRejected {
            name: profile.display_name.clone(),
            reason: note.unwrap_or_default().to_string(),
        }),
        _ => None,
    };
    if let Some(template) = template {
        if let Err(e) = send_template(mailer, &profile.email, &template) {
            warn!(user_id = %user_id, error = %e, "kyc email not sent");
        }
    }
    Ok(profile)
}

/// Delete a user's identity and profile. `confirm_email` must repeat the
/// user's email. Orders, accounts and payouts are left in place.
pub fn delete_user<S>(store: &S, user_id: &str, confirm_email: &str) -> Result<(), PropdeskError>
where
    S: IdentityPort + ProfilePort + ?Sized,
{
    let identity = store.get_identity(user_id)?;
    let profile = store.get_profile(user_id)?;
    let email = identity
        .as_ref()
        .map(|i| i.email.as_str())
        .or(profile.as_ref().map(|p| p.email.as_str()))
        .ok_or_else(|| PropdeskError::not_found("user", user_id))?;

    if !email.eq_ignore_ascii_case(confirm_email.trim()) {
        return Err(PropdeskError::validation(
            "typed email does not match the user's email",
        ));
    }

    if identity.is_some() {
        store.delete_identity(user_id)?;
    }
    if profile.is_some() {
        store.delete_profile(user_id)?;
    }
    info!(user_id = %user_id, "user deleted");
    Ok(())
}
