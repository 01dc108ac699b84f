//! # mailwire-oauth
//!
//! Bearer-token and password framing for IMAP `AUTHENTICATE`.
//!
//! ## Features
//!
//! - **SASL mechanisms**: OAUTHBEARER (RFC 7628), XOAUTH2 (Google/Microsoft)
//!   and PLAIN (RFC 4616)
//! - **Failure challenges**: decoding of the base64 JSON status a server sends
//!   before rejecting a bearer token
//! - **Identity tokens**: reading the account address out of an OpenID
//!   Connect ID token
//! - **Tokens**: access token with expiry bookkeeping
//!
//! Token acquisition (authorization-code or device flows) happens elsewhere;
//! this crate only frames what the server needs to see.
//!
//! ## Quick Start
//!
//! ```
//! use mailwire_oauth::{EmailResolutionStrategy, SaslMechanism};
//!
//! let address = EmailResolutionStrategy::UserSupplied("user@example.com".into())
//!     .resolve()
//!     .unwrap();
//! let blob = SaslMechanism::OAuthBearer.initial_response(&address, "ya29.token");
//! assert!(!blob.is_empty());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod error;
pub mod identity;
pub mod sasl;
pub mod token;

pub use error::{Error, Result};
pub use identity::{EmailResolutionStrategy, IdentityClaims};
pub use sasl::{OAuthError, SaslMechanism};
pub use token::Token;
