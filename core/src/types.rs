//! Shared primitive types used across the portal core.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A stable, unique identifier for any backend row.
pub type EntityId = String;

/// Identifier of a customer record (the organisation that owns accounts).
pub type CustomerId = String;

/// Identifier of an authenticated backend user.
pub type UserId = String;

/// ISO-4217 currency code, always trimmed and uppercase.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn new(code: &str) -> Self {
        Self(code.trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is(&self, code: &str) -> bool {
        self.0.eq_ignore_ascii_case(code)
    }
}

impl From<String> for CurrencyCode {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

impl From<&str> for CurrencyCode {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<CurrencyCode> for String {
    fn from(c: CurrencyCode) -> Self {
        c.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
