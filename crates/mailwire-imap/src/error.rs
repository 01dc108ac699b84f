//! Protocol-layer errors.

use std::time::Duration;

use mailwire_oauth::OAuthError;
use thiserror::Error;

use crate::types::{ResponseCode, Status};

/// Anything that can go wrong between the socket and a decoded response.
#[derive(Debug, Error)]
pub enum Error {
    /// Socket failure.
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),

    /// rustls refused the session.
    #[error("tls: {0}")]
    Tls(#[from] rustls::Error),

    /// The handshake failed without a rustls error to show for it.
    #[error("tls handshake failed: {0}")]
    Handshake(String),

    /// The host is not usable as a TLS server name.
    #[error("host is not a valid TLS server name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// A server line did not fit the grammar.
    #[error("malformed response at byte {position}: {message}")]
    Parse {
        /// Offset into the line.
        position: usize,
        /// What was expected.
        message: String,
    },

    /// STARTTLS was requested but not advertised.
    #[error("STARTTLS is not advertised")]
    StartTlsUnavailable,

    /// AUTHENTICATE or LOGIN completed with NO or BAD.
    #[error("{mechanism} refused with {status:?}: {text}")]
    AuthRejected {
        /// Wire name of the mechanism tried.
        mechanism: String,
        /// `NO` or `BAD`.
        status: Status,
        /// Bracketed response code, if present.
        code: Option<ResponseCode>,
        /// Human-readable server text.
        text: String,
        /// Decoded OAUTHBEARER/XOAUTH2 failure challenge.
        challenge: Option<OAuthError>,
    },

    /// Tagged `NO`.
    #[error("command failed: {text}")]
    No {
        /// Bracketed response code.
        code: Option<ResponseCode>,
        /// Server text.
        text: String,
    },

    /// Tagged `BAD`.
    #[error("command rejected: {text}")]
    Bad {
        /// Bracketed response code.
        code: Option<ResponseCode>,
        /// Server text.
        text: String,
    },

    /// Untagged `BYE`; the connection is gone.
    #[error("server closed the session: {0}")]
    Bye(String),

    /// Connect or round-trip budget exhausted.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The client is not in a state that allows the operation.
    #[error("not allowed in this state: {0}")]
    InvalidState(String),

    /// The server broke the protocol in a way the parser could not name.
    #[error("protocol violation: {0}")]
    Protocol(String),
}

impl Error {
    /// The peer's certificate was missing or failed verification.
    #[must_use]
    pub const fn is_untrusted_certificate(&self) -> bool {
        matches!(
            self,
            Self::Tls(rustls::Error::InvalidCertificate(_) | rustls::Error::NoCertificatesPresented)
        )
    }

    /// Bracketed code of a `NO`, `BAD` or refused authentication.
    #[must_use]
    pub fn response_code(&self) -> Option<&ResponseCode> {
        let (Self::AuthRejected { code, .. } | Self::No { code, .. } | Self::Bad { code, .. }) =
            self
        else {
            return None;
        };
        code.as_ref()
    }
}

/// Protocol-layer result.
pub type Result<T> = std::result::Result<T, Error>;
