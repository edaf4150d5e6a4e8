use thiserror::Error;

#[derive(Error, Debug)]
pub enum PortalError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Step '{step}' is incomplete: {reason}")]
    Validation { step: String, reason: String },

    #[error("{message}")]
    Transport { message: String },

    #[error("{message}")]
    Business { message: String },

    #[error("{0}")]
    Auth(String),

    #[error("Invalid email or password. Please try again.")]
    InvalidCredentials,

    #[error("No MFA factor found")]
    NoMfaFactor,

    #[error("No second factor is pending for this session")]
    MfaNotPending,

    #[error("The wizard was closed before the result arrived")]
    WizardClosed,

    #[error("No customer context resolved for this session")]
    NoCustomerContext,

    #[error("{kind} '{id}' not found")]
    UnknownEntity { kind: &'static str, id: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type PortalResult<T> = Result<T, PortalError>;
