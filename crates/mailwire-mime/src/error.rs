//! Decoding failures.
//!
//! Only the strict entry points return these. The header and body decoders
//! used by the IMAP layer fall back to the raw text instead.

use thiserror::Error;

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Why some MIME text could not be decoded.
#[derive(Debug, Error)]
pub enum Error {
    /// Not of the form `=?charset?encoding?text?=`.
    #[error("Malformed encoded word: {0}")]
    MalformedWord(String),

    /// Encoded word with an encoding other than `B` or `Q`.
    #[error("Unknown encoded-word encoding {0:?}")]
    UnknownEncoding(String),

    /// Invalid Base64 payload.
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
}
