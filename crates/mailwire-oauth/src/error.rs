//! Error types for bearer-token handling.

/// Result type alias for `OAuth2` helpers.
pub type Result<T> = std::result::Result<T, Error>;

/// `OAuth2` helper errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Base64 decoding error.
    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The identity token is not a three-part JWT.
    #[error("Malformed identity token: {0}")]
    MalformedIdentityToken(String),

    /// The identity token carries no usable address claim.
    #[error("Identity token has neither an email nor a preferred_username claim")]
    MissingEmailClaim,

    /// The user-supplied address is empty or has no `@`.
    #[error("Invalid account address: {0:?}")]
    InvalidAddress(String),
}
