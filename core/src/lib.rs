//! Headless core of a two-rail business banking portal.
//!
//! `Portal` owns the backend handle and the auth state machine; the
//! wizards (`payment`, `counterparty`, `payee`) are plain values the
//! caller drives and hands back to the portal to submit.

pub mod auth;
pub mod backend;
pub mod clock;
pub mod config;
pub mod context;
pub mod counterparty;
pub mod error;
pub mod event;
pub mod format;
pub mod ledger;
pub mod model;
pub mod payee;
pub mod payment;
pub mod portal;
pub mod provider;
pub mod rails;
pub mod rng;
pub mod sandbox;
pub mod store;
pub mod submission;
pub mod team;
pub mod types;
pub mod validation;
pub mod wizard;

pub use error::{PortalError, PortalResult};
pub use portal::Portal;
