//! Account address resolution for bearer-token logins.
//!
//! The bearer framing is the same for every provider. What differs is where
//! the account address comes from: some providers hand back an OpenID
//! Connect ID token that names the mailbox, others rely on the address the
//! user typed.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Claims read from an ID token payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct IdentityClaims {
    /// Primary address claim.
    #[serde(default)]
    pub email: Option<String>,
    /// Fallback claim used by Microsoft identity tokens.
    #[serde(default)]
    pub preferred_username: Option<String>,
    /// Subject identifier.
    #[serde(default)]
    pub sub: Option<String>,
}

impl IdentityClaims {
    /// Decodes the payload segment of a JWT.
    ///
    /// The signature is not verified: the token came straight from the
    /// token endpoint over TLS and is only read for the address.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not three dot-separated segments or
    /// the payload is not base64url JSON.
    pub fn from_jwt(jwt: &str) -> Result<Self> {
        let mut segments = jwt.trim().split('.');
        let (Some(_header), Some(payload), Some(_signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(Error::MalformedIdentityToken(
                "expected three segments".to_string(),
            ));
        };

        let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('='))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Returns the address claim: `email` first, then `preferred_username`.
    #[must_use]
    pub fn address(&self) -> Option<&str> {
        [self.email.as_deref(), self.preferred_username.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|candidate| candidate.contains('@'))
    }
}

/// Where the account address for a bearer login comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailResolutionStrategy {
    /// The address the user entered.
    UserSupplied(String),
    /// An ID token whose claims carry the address.
    IdentityToken(String),
}

impl EmailResolutionStrategy {
    /// Resolves the account address.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] for a blank or `@`-less user address,
    /// and a decoding error or [`Error::MissingEmailClaim`] for ID tokens.
    pub fn resolve(&self) -> Result<String> {
        match self {
            Self::UserSupplied(address) => {
                let address = address.trim();
                if address.is_empty() || !address.contains('@') {
                    return Err(Error::InvalidAddress(address.to_string()));
                }
                Ok(address.to_string())
            }
            Self::IdentityToken(jwt) => IdentityClaims::from_jwt(jwt)?
                .address()
                .map(str::to_string)
                .ok_or(Error::MissingEmailClaim),
        }
    }
}
