//! Negotiation failures.
//!
//! Transport failures end the attempt. Of the auth failures only
//! [`AuthError::TemporaryFailure`] is worth retrying.

use std::time::Duration;

use mailwire_imap::{ConnectionConfig, Error as ImapError, ResponseCode, Status};
use thiserror::Error;

use super::{Mechanism, NegotiationState};

/// Failure to reach a secured transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// TCP connect failed or the connection dropped.
    #[error("Could not connect to {endpoint}: {source}")]
    Connect {
        /// `host:port`.
        endpoint: String,
        /// Socket error.
        #[source]
        source: std::io::Error,
    },

    /// Connect or a setup round trip ran out of time.
    #[error("{endpoint} did not respond within {after:?}")]
    Timeout {
        /// `host:port`.
        endpoint: String,
        /// Budget that was exceeded.
        after: Duration,
    },

    /// The profile asks for STARTTLS but the server does not offer it.
    #[error("{host} does not offer STARTTLS; credentials will not be sent in plaintext")]
    UpgradeNotAdvertised {
        /// Server host.
        host: String,
    },

    /// The TLS handshake failed.
    #[error("TLS handshake with {host} failed: {reason}")]
    Handshake {
        /// Server host.
        host: String,
        /// What went wrong.
        reason: String,
    },

    /// The server's certificate did not verify.
    #[error("Certificate presented by {host} is not trusted: {reason}")]
    UntrustedCertificate {
        /// Server host.
        host: String,
        /// Verifier message.
        reason: String,
    },

    /// The profile disables transport security.
    #[error("{host} is configured without TLS; refusing to authenticate")]
    Insecure {
        /// Server host.
        host: String,
    },

    /// Greeting, CAPABILITY or STARTTLS failed at the protocol level.
    #[error("connection setup failed: {0}")]
    Protocol(#[source] ImapError),
}

impl TransportError {
    /// Maps a client error raised before authentication.
    #[must_use]
    pub fn from_imap(err: ImapError, config: &ConnectionConfig) -> Self {
        let host = config.host.clone();
        let endpoint = config.authority();
        if err.is_untrusted_certificate() {
            return Self::UntrustedCertificate {
                host,
                reason: err.to_string(),
            };
        }
        match err {
            ImapError::Io(source) => Self::Connect { endpoint, source },
            ImapError::Timeout(after) => Self::Timeout { endpoint, after },
            ImapError::StartTlsUnavailable => Self::UpgradeNotAdvertised { host },
            ImapError::Tls(e) => Self::Handshake {
                host,
                reason: e.to_string(),
            },
            ImapError::InvalidDnsName(e) => Self::Handshake {
                host,
                reason: e.to_string(),
            },
            ImapError::Handshake(reason) => Self::Handshake { host, reason },
            other => Self::Protocol(other),
        }
    }
}

/// Failure to authenticate over a secured transport.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The server refused the credential itself.
    #[error("{mechanism} login was rejected: {detail}. {}", .mechanism.rejection_hint())]
    CredentialRejected {
        /// Mechanism attempted.
        mechanism: Mechanism,
        /// Server explanation.
        detail: String,
    },

    /// No usable mechanism for the credential, or the server refused the
    /// mechanism.
    #[error("{mechanism} is not available on this server: {detail}")]
    MechanismUnsupported {
        /// Mechanism wanted.
        mechanism: Mechanism,
        /// Why it cannot be used.
        detail: String,
    },

    /// The server could not check the credential right now.
    #[error("{mechanism} login is temporarily unavailable: {detail}. Try again later")]
    TemporaryFailure {
        /// Mechanism attempted.
        mechanism: Mechanism,
        /// Server explanation.
        detail: String,
    },

    /// The account address for a bearer login could not be determined.
    #[error("Could not determine the account address for {mechanism}: {source}")]
    IdentityUnresolved {
        /// Mechanism wanted.
        mechanism: Mechanism,
        /// Why resolution failed.
        #[source]
        source: mailwire_oauth::Error,
    },
}

impl AuthError {
    /// Returns true if the same credential may succeed later.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::TemporaryFailure { .. })
    }

    /// The mechanism involved.
    #[must_use]
    pub const fn mechanism(&self) -> Mechanism {
        match self {
            Self::CredentialRejected { mechanism, .. }
            | Self::MechanismUnsupported { mechanism, .. }
            | Self::TemporaryFailure { mechanism, .. }
            | Self::IdentityUnresolved { mechanism, .. } => *mechanism,
        }
    }

    /// Classifies a server refusal.
    ///
    /// RFC 5530 codes decide first, then the bearer-token failure status; BAD
    /// means the server does not accept the mechanism. Anything else is a
    /// rejected credential.
    #[must_use]
    pub fn from_refusal(
        mechanism: Mechanism,
        status: Status,
        code: Option<&ResponseCode>,
        text: &str,
        challenge: Option<&mailwire_oauth::OAuthError>,
    ) -> Self {
        let detail = match challenge {
            Some(c) => format!("{text} (bearer status {})", c.status),
            None => text.to_string(),
        };

        if status == Status::Bad {
            return Self::MechanismUnsupported { mechanism, detail };
        }
        if let Some(code) = code {
            if code.is_temporary() {
                return Self::TemporaryFailure { mechanism, detail };
            }
            if code.is_credential_failure() {
                return Self::CredentialRejected { mechanism, detail };
            }
        }
        if challenge.is_some_and(mailwire_oauth::OAuthError::is_temporary) {
            return Self::TemporaryFailure { mechanism, detail };
        }
        Self::CredentialRejected { mechanism, detail }
    }
}

/// Why a negotiation did not end authenticated.
#[derive(Debug, Error)]
pub enum NegotiateError {
    /// The transport could not be established or secured.
    #[error("{source} (negotiation stopped at {state})")]
    Transport {
        /// Last state reached.
        state: NegotiationState,
        /// What failed.
        #[source]
        source: TransportError,
    },

    /// Authentication failed.
    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl NegotiateError {
    /// Returns true if a later attempt with the same inputs may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Auth(e) => e.is_retryable(),
            Self::Transport { .. } => false,
        }
    }

    /// Maps an error raised while authenticating.
    pub(crate) fn from_auth_attempt(
        mechanism: Mechanism,
        err: ImapError,
        config: &ConnectionConfig,
    ) -> Self {
        match err {
            ImapError::AuthRejected {
                status,
                code,
                text,
                challenge,
                ..
            } => AuthError::from_refusal(
                mechanism,
                status,
                code.as_ref(),
                &text,
                challenge.as_ref(),
            )
            .into(),
            ImapError::InvalidState(detail) => {
                AuthError::MechanismUnsupported { mechanism, detail }.into()
            }
            ImapError::Bye(detail) => AuthError::TemporaryFailure { mechanism, detail }.into(),
            other => Self::Transport {
                state: NegotiationState::Secured,
                source: TransportError::from_imap(other, config),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use mailwire_oauth::OAuthError;

    use super::*;

    fn config() -> ConnectionConfig {
        ConnectionConfig::new("imap.example.com")
    }

    #[test]
    fn response_codes_decide_first() {
        let m = Mechanism::XOAuth2;
        let temp = AuthError::from_refusal(m, Status::No, Some(&ResponseCode::Unavailable), "down", None);
        assert!(temp.is_retryable());
        for code in [ResponseCode::InUse, ResponseCode::Limit] {
            assert!(AuthError::from_refusal(m, Status::No, Some(&code), "x", None).is_retryable());
        }
        for code in [
            ResponseCode::AuthenticationFailed,
            ResponseCode::AuthorizationFailed,
            ResponseCode::Expired,
        ] {
            let err = AuthError::from_refusal(m, Status::No, Some(&code), "x", None);
            assert!(matches!(err, AuthError::CredentialRejected { .. }));
            assert!(!err.is_retryable());
        }
    }

    #[test]
    fn bearer_status_decides_without_code() {
        let challenge = OAuthError {
            status: "503".to_string(),
            schemes: "bearer".to_string(),
            scope: None,
        };
        let err = AuthError::from_refusal(
            Mechanism::OAuthBearer,
            Status::No,
            None,
            "try later",
            Some(&challenge),
        );
        assert!(err.is_retryable());
        assert!(err.to_string().contains("bearer status 503"));

        let challenge = OAuthError {
            status: "401".to_string(),
            ..challenge
        };
        let err = AuthError::from_refusal(Mechanism::OAuthBearer, Status::No, None, "no", Some(&challenge));
        assert!(matches!(err, AuthError::CredentialRejected { .. }));
    }

    #[test]
    fn bad_means_unsupported() {
        let err = AuthError::from_refusal(Mechanism::Plain, Status::Bad, None, "unknown mechanism", None);
        assert!(matches!(err, AuthError::MechanismUnsupported { mechanism: Mechanism::Plain, .. }));
        assert_eq!(err.mechanism(), Mechanism::Plain);
    }

    #[test]
    fn messages_are_mechanism_specific() {
        let oauth = AuthError::from_refusal(Mechanism::XOAuth2, Status::No, None, "Invalid credentials", None);
        assert!(oauth.to_string().starts_with("XOAUTH2 login was rejected: Invalid credentials."));
        assert!(oauth.to_string().contains("Sign in again"));

        let password = AuthError::from_refusal(Mechanism::Login, Status::No, None, "nope", None);
        assert!(password.to_string().contains("app password"));
    }

    #[test]
    fn transport_mapping() {
        let err = TransportError::from_imap(ImapError::StartTlsUnavailable, &config());
        assert!(matches!(err, TransportError::UpgradeNotAdvertised { ref host } if host == "imap.example.com"));

        let err = TransportError::from_imap(ImapError::Timeout(Duration::from_secs(3)), &config());
        assert!(matches!(err, TransportError::Timeout { ref endpoint, .. } if endpoint == "imap.example.com:993"));

        let err = TransportError::from_imap(ImapError::Handshake("reset".to_string()), &config());
        assert!(matches!(err, TransportError::Handshake { ref reason, .. } if reason == "reset"));

        let err = TransportError::from_imap(ImapError::Bye("busy".to_string()), &config());
        assert!(matches!(err, TransportError::Protocol(ImapError::Bye(_))));
    }

    #[test]
    fn auth_attempt_errors() {
        let err = NegotiateError::from_auth_attempt(
            Mechanism::Login,
            ImapError::InvalidState("server advertises LOGINDISABLED".to_string()),
            &config(),
        );
        assert!(matches!(err, NegotiateError::Auth(AuthError::MechanismUnsupported { .. })));

        let err = NegotiateError::from_auth_attempt(
            Mechanism::Plain,
            ImapError::Io(std::io::ErrorKind::ConnectionReset.into()),
            &config(),
        );
        assert!(matches!(
            err,
            NegotiateError::Transport { state: NegotiationState::Secured, source: TransportError::Connect { .. } }
        ));
        assert!(!err.is_retryable());
    }
}
