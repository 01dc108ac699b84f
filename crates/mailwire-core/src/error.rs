//! Error types for the core library.

use thiserror::Error;

use crate::credentials::CredentialError;
use crate::negotiate::{AuthError, NegotiateError, TransportError};
use crate::pool::PoolError;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// IMAP operation failed after the session was established.
    #[error("IMAP error: {0}")]
    Imap(#[from] mailwire_imap::Error),

    /// Transport could not be established.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Authentication failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Negotiation failed.
    #[error(transparent)]
    Negotiate(#[from] NegotiateError),

    /// No pooled session could be obtained.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// Credential storage error.
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl Error {
    /// Returns true if the operation may succeed when retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Auth(e) => e.is_retryable(),
            Self::Negotiate(e) => e.is_retryable(),
            Self::Pool(e) => e.is_retryable(),
            Self::Imap(_)
            | Self::Transport(_)
            | Self::Credential(_)
            | Self::Serde(_) => false,
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
