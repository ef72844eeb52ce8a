//! SQLite document store.
//!
//! Collections (accounts, cached metrics, orders, profiles, payouts) are
//! JSON documents in a single `documents` table keyed by collection and id.
//! Login identities live in their own `identities` table, apart from the
//! profile documents.

use crate::domain::account::Account;
use crate::domain::error::PropdeskError;
use crate::domain::metrics_cache::CachedMetrics;
use crate::domain::order::Order;
use crate::domain::payout::PayoutRequest;
use crate::domain::user::{Identity, Profile};
use crate::ports::account_port::AccountPort;
use crate::ports::cache_port::MetricsCachePort;
use crate::ports::config_port::ConfigPort;
use crate::ports::order_port::OrderPort;
use crate::ports::payout_port::PayoutPort;
use crate::ports::user_port::{IdentityPort, ProfilePort};
use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;

pub const ACCOUNTS: &str = "accounts";
pub const CACHED_METRICS: &str = "cached_metrics";
pub const ORDERS: &str = "orders";
pub const PROFILES: &str = "profiles";
pub const PAYOUTS: &str = "payouts";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, PropdeskError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| PropdeskError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        if db_path.trim() == ":memory:" {
            return Self::in_memory();
        }

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(db_path.trim());
        let pool = Pool::builder().max_size(pool_size).build(manager)?;

        Ok(Self { pool })
    }

    /// Single-connection pool that is never recycled, so the database lives
    /// as long as the adapter.
    pub fn in_memory() -> Result<Self, PropdeskError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .build(manager)?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, PropdeskError> {
        Ok(self.pool.get()?)
    }

    pub fn initialize_schema(&self) -> Result<(), PropdeskError> {
        let conn = self.conn()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                body TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            );
            CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);
            CREATE TABLE IF NOT EXISTS identities (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            );",
        )?;

        Ok(())
    }

    fn get_doc<T: DeserializeOwned>(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<T>, PropdeskError> {
        let conn = self.conn()?;
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| row.get(0),
            )
            .optional()?;

        match body {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn list_docs<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>, PropdeskError> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT body FROM documents WHERE collection = ?1 ORDER BY id ASC")?;
        let rows = stmt.query_map(params![collection], |row| row.get::<_, String>(0))?;

        let mut docs = Vec::new();
        for row in rows {
            docs.push(serde_json::from_str(&row?)?);
        }
        Ok(docs)
    }

    fn put_doc<T: Serialize>(
        &self,
        collection: &str,
        id: &str,
        doc: &T,
    ) -> Result<(), PropdeskError> {
        let body = serde_json::to_string(doc)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO documents (collection, id, body, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![collection, id, body, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn delete_doc(&self, collection: &str, id: &str) -> Result<bool, PropdeskError> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection, id],
        )?;
        Ok(removed > 0)
    }

    fn query_identities(
        &self,
        clause: &str,
        param: Option<&str>,
    ) -> Result<Vec<Identity>, PropdeskError> {
        let conn = self.conn()?;
        let query = format!(
            "SELECT id, email, password_hash, created_at FROM identities {clause} ORDER BY created_at ASC"
        );
        let mut stmt = conn.prepare(&query)?;
        let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<Identity> {
            let created: String = row.get(3)?;
            let created_at = DateTime::parse_from_rfc3339(&created)
                .map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        created.len(),
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?
                .with_timezone(&Utc);
            Ok(Identity {
                id: row.get(0)?,
                email: row.get(1)?,
                password_hash: row.get(2)?,
                created_at,
            })
        };
        let rows = match param {
            Some(p) => stmt.query_map(params![p], map_row)?.collect::<Result<Vec<_>, _>>()?,
            None => stmt.query_map([], map_row)?.collect::<Result<Vec<_>, _>>()?,
        };
        Ok(rows)
    }
}

impl AccountPort for SqliteAdapter {
    fn get_account(&self, account_id: &str) -> Result<Option<Account>, PropdeskError> {
        self.get_doc(ACCOUNTS, account_id)
    }

    fn list_accounts(&self) -> Result<Vec<Account>, PropdeskError> {
        self.list_docs(ACCOUNTS)
    }

    fn put_account(&self, account: &Account) -> Result<(), PropdeskError> {
        self.put_doc(ACCOUNTS, &account.account_id, account)
    }
}

impl MetricsCachePort for SqliteAdapter {
    fn get_cached(&self, account_id: &str) -> Result<Option<CachedMetrics>, PropdeskError> {
        self.get_doc(CACHED_METRICS, account_id)
    }

    fn put_cached(&self, cached: &CachedMetrics) -> Result<(), PropdeskError> {
        self.put_doc(CACHED_METRICS, &cached.account_id, cached)
    }
}

impl OrderPort for SqliteAdapter {
    fn list_orders(&self) -> Result<Vec<Order>, PropdeskError> {
        self.list_docs(ORDERS)
    }

    fn get_order(&self, id: &str) -> Result<Option<Order>, PropdeskError> {
        self.get_doc(ORDERS, id)
    }

    fn put_order(&self, order: &Order) -> Result<(), PropdeskError> {
        self.put_doc(ORDERS, &order.id, order)
    }

    fn delete_order(&self, id: &str) -> Result<bool, PropdeskError> {
        self.delete_doc(ORDERS, id)
    }
}

impl ProfilePort for SqliteAdapter {
    fn list_profiles(&self) -> Result<Vec<Profile>, PropdeskError> {
        self.list_docs(PROFILES)
    }

    fn get_profile(&self, id: &str) -> Result<Option<Profile>, PropdeskError> {
        self.get_doc(PROFILES, id)
    }

    fn put_profile(&self, profile: &Profile) -> Result<(), PropdeskError> {
        self.put_doc(PROFILES, &profile.id, profile)
    }

    fn delete_profile(&self, id: &str) -> Result<bool, PropdeskError> {
        self.delete_doc(PROFILES, id)
    }
}

impl PayoutPort for SqliteAdapter {
    fn list_payouts(&self) -> Result<Vec<PayoutRequest>, PropdeskError> {
        self.list_docs(PAYOUTS)
    }

    fn get_payout(&self, id: &str) -> Result<Option<PayoutRequest>, PropdeskError> {
        self.get_doc(PAYOUTS, id)
    }

    fn put_payout(&self, payout: &PayoutRequest) -> Result<(), PropdeskError> {
        self.put_doc(PAYOUTS, &payout.id, payout)
    }
}

impl IdentityPort for SqliteAdapter {
    fn list_identities(&self) -> Result<Vec<Identity>, PropdeskError> {
        self.query_identities("", None)
    }

    fn get_identity(&self, id: &str) -> Result<Option<Identity>, PropdeskError> {
        Ok(self
            .query_identities("WHERE id = ?1", Some(id))?
            .into_iter()
            .next())
    }

    fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>, PropdeskError> {
        Ok(self
            .query_identities("WHERE email = ?1 COLLATE NOCASE", Some(email.trim()))?
            .into_iter()
            .next())
    }

    fn put_identity(&self, identity: &Identity) -> Result<(), PropdeskError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO identities (id, email, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                identity.id,
                identity.email,
                identity.password_hash,
                identity.created_at.to_rfc3339()
            ],
        )?;
        Ok(())
    }

    fn delete_identity(&self, id: &str) -> Result<bool, PropdeskError> {
        let conn = self.conn()?;
        let removed = conn.execute("DELETE FROM identities WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }
}
