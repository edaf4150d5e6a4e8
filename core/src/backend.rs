//! The backend-as-a-service seam.
//!
//! RULE: every byte the core exchanges with the outside world goes
//! through `Backend`. Auth, row queries filtered by customer id, and
//! named serverless function invocations. Nothing else.

use crate::{
    error::PortalResult,
    model::{
        Account, AssuranceStatus, Customer, FactorListing, OrgRole, Payee, Session, Transaction,
    },
    provider::{Provider, ProviderConfiguration},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An MFA challenge issued for a factor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Challenge {
    pub id: String,
    pub factor_id: String,
}

/// A function invocation failed before (or instead of) returning data.
/// `context` is the response body the function produced, when one exists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvokeError {
    pub message: String,
    pub context: Option<Value>,
}

/// What a serverless function invocation hands back.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InvokeResponse {
    pub data: Option<Value>,
    pub error: Option<InvokeError>,
}

impl InvokeResponse {
    pub fn ok(data: Value) -> Self {
        Self { data: Some(data), error: None }
    }

    pub fn failed(message: impl Into<String>, context: Option<Value>) -> Self {
        Self {
            data: None,
            error: Some(InvokeError { message: message.into(), context }),
        }
    }
}

pub trait Backend {
    // ── Auth ───────────────────────────────────────────────────────

    /// Password sign-in. Credential failures come back as
    /// `PortalError::Auth` carrying the backend's own message.
    fn sign_in_with_password(&mut self, email: &str, password: &str) -> PortalResult<Session>;

    fn current_session(&mut self) -> PortalResult<Option<Session>>;

    fn assurance_level(&mut self) -> PortalResult<AssuranceStatus>;

    fn list_factors(&mut self) -> PortalResult<FactorListing>;

    fn challenge_factor(&mut self, factor_id: &str) -> PortalResult<Challenge>;

    /// May report an error even when the session was in fact upgraded.
    /// Callers must re-read `assurance_level` to learn the truth.
    fn verify_factor(&mut self, factor_id: &str, challenge_id: &str, code: &str)
        -> PortalResult<()>;

    fn sign_out(&mut self) -> PortalResult<()>;

    fn reset_password_for_email(&mut self, email: &str) -> PortalResult<()>;

    // ── Rows ───────────────────────────────────────────────────────

    fn customer_by_user(&mut self, user_id: &str) -> PortalResult<Option<Customer>>;

    fn customer_by_id(&mut self, customer_id: &str) -> PortalResult<Option<Customer>>;

    fn org_role_by_user(&mut self, user_id: &str) -> PortalResult<Option<OrgRole>>;

    fn org_roles_for_customer(&mut self, customer_id: &str) -> PortalResult<Vec<OrgRole>>;

    fn provider_configurations(
        &mut self,
        customer_id: &str,
    ) -> PortalResult<Vec<ProviderConfiguration>>;

    fn accounts(&mut self, customer_id: &str, provider: Provider) -> PortalResult<Vec<Account>>;

    fn payees(&mut self, customer_id: &str) -> PortalResult<Vec<Payee>>;

    /// Newest first.
    fn transactions(
        &mut self,
        customer_id: &str,
        provider: Provider,
        offset: usize,
        limit: usize,
    ) -> PortalResult<Vec<Transaction>>;

    // ── Functions ──────────────────────────────────────────────────

    /// Invoke a named serverless function. `Err` means the call could not
    /// be made at all; a function that ran and failed reports through
    /// `InvokeResponse::error`.
    fn invoke(&mut self, function: &str, body: &Value) -> PortalResult<InvokeResponse>;
}
