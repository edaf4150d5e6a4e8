//! Read-only projections of backend rows.
//!
//! The backend owns every one of these records. The core never mutates
//! them; it only reads them to populate choices and views.

use crate::{
    provider::Provider,
    rails::PaymentRail,
    types::{CurrencyCode, CustomerId, EntityId, UserId},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Customer {
    pub id: CustomerId,
    pub user_id: Option<UserId>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company_name: Option<String>,
    pub customer_type: String, // "individual" | "business"
    pub country: String,
}

impl Customer {
    pub fn display_name(&self) -> String {
        if let Some(company) = self.company_name.as_deref().filter(|c| !c.is_empty()) {
            return company.to_string();
        }
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|p| !p.is_empty())
            .collect();
        if parts.is_empty() {
            self.id.clone()
        } else {
            parts.join(" ")
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrgRoleKind {
    OrgAdmin,
    Editor,
    Approver,
    Viewer,
}

impl OrgRoleKind {
    pub fn key(&self) -> &'static str {
        match self {
            Self::OrgAdmin => "org_admin",
            Self::Editor => "editor",
            Self::Approver => "approver",
            Self::Viewer => "viewer",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "org_admin" => Some(Self::OrgAdmin),
            "editor" => Some(Self::Editor),
            "approver" => Some(Self::Approver),
            "viewer" => Some(Self::Viewer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrgRole {
    pub user_id: UserId,
    pub customer_id: CustomerId,
    pub role: OrgRoleKind,
    pub email: Option<String>,
    pub status: String, // "active" | "disabled"
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub id: EntityId,
    /// The id the rail itself knows this account by, when it differs.
    pub provider_account_id: Option<String>,
    pub provider: Provider,
    pub currency: CurrencyCode,
    pub balance: f64,
    pub pending_balance: f64,
    pub label: Option<String>,
    pub iban: Option<String>,
    pub account_number: Option<String>,
    pub routing_number: Option<String>,
    pub sort_code: Option<String>,
    pub status: String,
}

impl Account {
    /// Identifier to put in outbound payloads.
    pub fn rail_id(&self) -> &str {
        self.provider_account_id.as_deref().unwrap_or(&self.id)
    }

    pub fn display_label(&self) -> String {
        self.label
            .clone()
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| self.currency.to_string())
    }
}

/// A saved payee (EU rail) or counterparty (US rail).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payee {
    pub id: EntityId,
    pub provider_payee_id: Option<String>,
    pub provider: Provider,
    pub display_name: String,
    pub currency: CurrencyCode,
    /// Rail the counterparty was registered for (US rail only).
    pub rail: Option<PaymentRail>,
    pub iban: Option<String>,
    pub bic: Option<String>,
    pub account_number: Option<String>,
    pub sort_code: Option<String>,
    pub routing_number: Option<String>,
    pub bank_name: Option<String>,
    pub status: String,
}

impl Payee {
    pub fn rail_id(&self) -> &str {
        self.provider_payee_id.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: EntityId,
    pub provider: Provider,
    pub transaction_type: String,
    pub status: String,
    pub amount: f64,
    pub currency: CurrencyCode,
    pub counterparty_name: Option<String>,
    pub description: Option<String>,
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ── Auth ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub user_id: UserId,
    pub email: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum AssuranceLevel {
    Aal1,
    Aal2,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssuranceStatus {
    pub current: AssuranceLevel,
    pub next: AssuranceLevel,
}

impl AssuranceStatus {
    /// Logged in with a password but a second factor is still owed.
    pub fn needs_second_factor(&self) -> bool {
        self.current == AssuranceLevel::Aal1 && self.next == AssuranceLevel::Aal2
    }

    pub fn is_full(&self) -> bool {
        self.current == AssuranceLevel::Aal2
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FactorType {
    Totp,
    Phone,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FactorStatus {
    Verified,
    Unverified,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MfaFactor {
    pub id: EntityId,
    pub factor_type: FactorType,
    pub status: FactorStatus,
    pub friendly_name: Option<String>,
}

/// Factors as the backend lists them: grouped by type plus a flat `all`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FactorListing {
    pub totp: Vec<MfaFactor>,
    pub phone: Vec<MfaFactor>,
    pub all: Vec<MfaFactor>,
}

impl FactorListing {
    /// TOTP first, then phone, then anything only present in `all`,
    /// de-duplicated by id.
    pub fn collect(&self) -> Vec<MfaFactor> {
        let mut out: Vec<MfaFactor> = Vec::new();
        for f in self.totp.iter().chain(&self.phone).chain(&self.all) {
            if !out.iter().any(|existing| existing.id == f.id) {
                out.push(f.clone());
            }
        }
        out
    }
}

/// Pick the factor to challenge: a verified TOTP, else a verified phone.
pub fn select_factor(factors: &[MfaFactor]) -> Option<&MfaFactor> {
    let verified = |t: FactorType| {
        factors
            .iter()
            .find(|f| f.factor_type == t && f.status == FactorStatus::Verified)
    };
    verified(FactorType::Totp).or_else(|| verified(FactorType::Phone))
}
