//! The two banking-rail providers and their per-customer enablement.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which banking rail a record or payload belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// EU rail (IBAN/SEPA based, camelCase API).
    EuRail,
    /// US rail (ACH/wire/SWIFT, snake_case API).
    UsRail,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::EuRail, Provider::UsRail];

    /// Name of the serverless proxy function that forwards to this rail.
    pub fn proxy_function(&self) -> &'static str {
        match self {
            Self::EuRail => "fr-proxy",
            Self::UsRail => "rail-proxy",
        }
    }

    /// Stable key used in table rows and the fee endpoint.
    pub fn key(&self) -> &'static str {
        match self {
            Self::EuRail => "eu_rail",
            Self::UsRail => "us_rail",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "eu_rail" => Some(Self::EuRail),
            "us_rail" => Some(Self::UsRail),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::EuRail => "EU Rails",
            Self::UsRail => "US Rails",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderConfiguration {
    pub provider: Provider,
    pub is_enabled: bool,
}
