//! SQLite persistence for the sandbox backend.
//!
//! RULE: Only the store talks to the database.
//! The sandbox calls store methods; it never executes SQL directly.

mod identity;
mod journal;
mod ledger;

use crate::error::PortalResult;
use chrono::{DateTime, Utc};
use rusqlite::Connection;

pub use journal::ProxyCallRow;

pub struct SandboxStore {
    conn: Connection,
    path: Option<String>, // None for :memory:
}

/// A sign-in identity as stored. Never leaves the sandbox.
#[derive(Debug, Clone)]
pub struct UserRow {
    pub user_id: String,
    pub email: String,
    pub password: String,
    pub mfa_code: Option<String>,
}

impl SandboxStore {
    pub fn open(path: &str) -> PortalResult<Self> {
        let conn = Connection::open(path)?;
        // WAL only matters for real files; ignore failure elsewhere.
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, path: Some(path.to_string()) })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> PortalResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, path: None })
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> PortalResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_identity.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_ledger.sql"))?;
        Ok(())
    }
}

pub(crate) fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_default()
}
