use super::{from_millis, to_millis, SandboxStore};
use crate::error::PortalResult;
use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};

/// One recorded function invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProxyCallRow {
    pub id: i64,
    pub function_name: String,
    pub endpoint: Option<String>,
    pub body: String, // JSON
    pub called_at: DateTime<Utc>,
}

impl SandboxStore {
    // ── Proxy call journal ────────────────────────────────────────

    pub fn append_proxy_call(
        &self,
        function_name: &str,
        endpoint: Option<&str>,
        body: &str,
        at: DateTime<Utc>,
    ) -> PortalResult<()> {
        self.conn.execute(
            "INSERT INTO proxy_call (function_name, endpoint, body, called_at_ms)
             VALUES (?1, ?2, ?3, ?4)",
            params![function_name, endpoint, body, to_millis(at)],
        )?;
        Ok(())
    }

    pub fn proxy_calls(&self) -> PortalResult<Vec<ProxyCallRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, function_name, endpoint, body, called_at_ms
             FROM proxy_call ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ProxyCallRow {
                id: row.get(0)?,
                function_name: row.get(1)?,
                endpoint: row.get(2)?,
                body: row.get(3)?,
                called_at: from_millis(row.get(4)?),
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn count_proxy_calls(&self, function_name: &str, endpoint: Option<&str>) -> PortalResult<usize> {
        let count: i64 = match endpoint {
            Some(ep) => self.conn.query_row(
                "SELECT COUNT(*) FROM proxy_call WHERE function_name = ?1 AND endpoint = ?2",
                params![function_name, ep],
                |row| row.get(0),
            )?,
            None => self.conn.query_row(
                "SELECT COUNT(*) FROM proxy_call WHERE function_name = ?1",
                params![function_name],
                |row| row.get(0),
            )?,
        };
        Ok(count as usize)
    }
}
