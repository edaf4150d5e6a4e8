//! The portal's activity journal.
//!
//! RULE: every state transition a user would care about is journaled,
//! in order, with the time it happened. Entries never carry passwords,
//! MFA codes or bank numbers.

use crate::{provider::Provider, types::{CustomerId, UserId}};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionKind {
    Payment,
    Counterparty,
    Payee,
    Invite,
    MemberStatus,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SignOutReason {
    User,
    Inactivity,
}

/// Variants are appended, never reordered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PortalEvent {
    // ── Auth ───────────────────────────────────────
    SignedIn {
        user_id: UserId,
        needs_mfa: bool,
    },
    SignInRejected {
        reason: String,
    },
    MfaVerified {
        user_id: UserId,
    },
    MfaRejected {
        reason: String,
    },
    ContextResolved {
        customer_id: CustomerId,
        owner: bool,
        providers: Vec<Provider>,
    },
    ContextMissing {
        user_id: UserId,
    },
    SignedOut {
        reason: SignOutReason,
    },

    // ── Submissions ────────────────────────────────
    SubmissionSent {
        kind: SubmissionKind,
        function: String,
    },
    SubmissionSucceeded {
        kind: SubmissionKind,
    },
    SubmissionFailed {
        kind: SubmissionKind,
        message: String,
    },
    FeeQuoted {
        fee: f64,
    },
}

impl PortalEvent {
    /// Stable name for the event's variant.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::SignedIn { .. } => "signed_in",
            Self::SignInRejected { .. } => "sign_in_rejected",
            Self::MfaVerified { .. } => "mfa_verified",
            Self::MfaRejected { .. } => "mfa_rejected",
            Self::ContextResolved { .. } => "context_resolved",
            Self::ContextMissing { .. } => "context_missing",
            Self::SignedOut { .. } => "signed_out",
            Self::SubmissionSent { .. } => "submission_sent",
            Self::SubmissionSucceeded { .. } => "submission_succeeded",
            Self::SubmissionFailed { .. } => "submission_failed",
            Self::FeeQuoted { .. } => "fee_quoted",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JournalEntry {
    pub seq: u64,
    pub at: DateTime<Utc>,
    pub event: PortalEvent,
}

#[derive(Debug, Clone, Default)]
pub struct EventJournal {
    entries: Vec<JournalEntry>,
}

impl EventJournal {
    pub fn record(&mut self, at: DateTime<Utc>, event: PortalEvent) {
        let seq = self.entries.len() as u64 + 1;
        match serde_json::to_string(&event) {
            Ok(payload) => log::info!("#{seq} {payload}"),
            Err(e) => log::warn!("#{seq} {} (unserializable: {e})", event.type_name()),
        }
        self.entries.push(JournalEntry { seq, at, event });
    }

    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    pub fn count(&self, type_name: &str) -> usize {
        self.entries.iter().filter(|e| e.event.type_name() == type_name).count()
    }
}
