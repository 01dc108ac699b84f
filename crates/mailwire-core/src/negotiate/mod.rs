//! Transport security and authentication for one provider.
//!
//! A [`Negotiator`] walks a connection through
//! `Disconnected → TransportConnected → Secured → Authenticated`:
//!
//! - connect on the profile's port through a [`Connector`]
//! - secure it: implicit TLS is secure from the start, otherwise CAPABILITY,
//!   STARTTLS, handshake and a fresh CAPABILITY
//! - pick a mechanism from the profile, the credential kind and the
//!   post-upgrade capabilities, then authenticate
//!
//! Credentials are only ever handed to a [`SecuredClient`], which cannot be
//! obtained over plaintext.

mod error;

use std::fmt;

use mailwire_imap::{
    Authenticated, Capability, Client, ConnectionConfig, Connector, NotAuthenticated,
    SecuredClient, Security, TcpConnector, Transport,
};
use mailwire_oauth::{EmailResolutionStrategy, SaslMechanism, Token};
use tracing::{debug, info, warn};

pub use self::error::{AuthError, NegotiateError, TransportError};
use crate::provider::{AuthMethod, ProviderProfile};

/// Progress of a negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NegotiationState {
    /// Nothing open yet.
    Disconnected,
    /// Socket open and greeting read.
    TransportConnected,
    /// Transport encrypted.
    Secured,
    /// Logged in.
    Authenticated,
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::TransportConnected => "transport connected",
            Self::Secured => "secured",
            Self::Authenticated => "authenticated",
        })
    }
}

/// Wire mechanism used to log in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mechanism {
    /// RFC 7628 bearer token.
    OAuthBearer,
    /// Google/Microsoft bearer token.
    XOAuth2,
    /// RFC 4616 PLAIN.
    Plain,
    /// The LOGIN command.
    Login,
}

impl Mechanism {
    /// Name as it appears on the wire.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::OAuthBearer => "OAUTHBEARER",
            Self::XOAuth2 => "XOAUTH2",
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
        }
    }

    /// Returns true for bearer-token mechanisms.
    #[must_use]
    pub const fn is_oauth(self) -> bool {
        matches!(self, Self::OAuthBearer | Self::XOAuth2)
    }

    const fn sasl(self) -> Option<SaslMechanism> {
        match self {
            Self::OAuthBearer => Some(SaslMechanism::OAuthBearer),
            Self::XOAuth2 => Some(SaslMechanism::XOAuth2),
            Self::Plain => Some(SaslMechanism::Plain),
            Self::Login => None,
        }
    }

    pub(crate) const fn rejection_hint(self) -> &'static str {
        if self.is_oauth() {
            "Sign in again to refresh the access token"
        } else {
            "Check the address and app password; the provider may require an app-specific password"
        }
    }
}

impl fmt::Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What the account authenticates with.
#[derive(Clone)]
pub enum Credentials {
    /// Bearer token; the address comes from `strategy`.
    OAuthToken {
        /// Access token.
        token: Token,
        /// Where the account address comes from.
        strategy: EmailResolutionStrategy,
    },
    /// Address plus app-specific password.
    AppPassword {
        /// Login name, usually the address.
        username: String,
        /// The password.
        password: String,
    },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OAuthToken { strategy, .. } => f
                .debug_struct("OAuthToken")
                .field("strategy", &strategy_kind(strategy))
                .finish_non_exhaustive(),
            Self::AppPassword { username, .. } => f
                .debug_struct("AppPassword")
                .field("username", username)
                .finish_non_exhaustive(),
        }
    }
}

const fn strategy_kind(strategy: &EmailResolutionStrategy) -> &'static str {
    match strategy {
        EmailResolutionStrategy::UserSupplied(_) => "user supplied",
        EmailResolutionStrategy::IdentityToken(_) => "identity token",
    }
}

/// Picks the mechanism for `credentials`.
///
/// A declared auth method must agree with the credential kind. Bearer
/// tokens prefer OAUTHBEARER, then XOAUTH2 (assumed when the provider
/// declares OAuth2). App passwords prefer `AUTH=PLAIN` and fall back to
/// LOGIN unless the server disables it.
///
/// LOGIN is the IMAP4rev1 baseline every server must accept unless it
/// advertises `LOGINDISABLED` (RFC 3501 §6.2.3), so a server without that
/// atom has declared plain credentials usable even with no `AUTH=PLAIN`.
///
/// # Errors
///
/// Returns [`AuthError::MechanismUnsupported`] when nothing fits.
pub fn select_mechanism(
    declared: Option<AuthMethod>,
    credentials: &Credentials,
    capabilities: &[Capability],
) -> Result<Mechanism, AuthError> {
    let advertised = |name: &str| {
        capabilities
            .iter()
            .filter_map(Capability::auth_mechanism)
            .any(|m| m.eq_ignore_ascii_case(name))
    };

    match credentials {
        Credentials::OAuthToken { .. } => {
            if declared == Some(AuthMethod::PasswordPlain) {
                return Err(AuthError::MechanismUnsupported {
                    mechanism: Mechanism::XOAuth2,
                    detail: "the provider expects an app password, not an OAuth token".to_string(),
                });
            }
            if advertised("OAUTHBEARER") {
                Ok(Mechanism::OAuthBearer)
            } else if advertised("XOAUTH2") || declared == Some(AuthMethod::OAuth2) {
                Ok(Mechanism::XOAuth2)
            } else {
                Err(AuthError::MechanismUnsupported {
                    mechanism: Mechanism::XOAuth2,
                    detail: "server advertises neither AUTH=OAUTHBEARER nor AUTH=XOAUTH2"
                        .to_string(),
                })
            }
        }
        Credentials::AppPassword { .. } => {
            if declared == Some(AuthMethod::OAuth2) {
                return Err(AuthError::MechanismUnsupported {
                    mechanism: Mechanism::Plain,
                    detail: "the provider requires OAuth sign-in".to_string(),
                });
            }
            if advertised("PLAIN") {
                Ok(Mechanism::Plain)
            } else if capabilities.contains(&Capability::LoginDisabled) {
                Err(AuthError::MechanismUnsupported {
                    mechanism: Mechanism::Plain,
                    detail: "server advertises no AUTH=PLAIN and disables LOGIN".to_string(),
                })
            } else {
                Ok(Mechanism::Login)
            }
        }
    }
}

/// Drives connections from socket to authenticated session.
#[derive(Debug, Clone, Default)]
pub struct Negotiator<C = TcpConnector> {
    connector: C,
}

impl<C: Connector> Negotiator<C> {
    /// Creates a negotiator that opens transports with `connector`.
    #[must_use]
    pub const fn new(connector: C) -> Self {
        Self { connector }
    }

    /// Connects, secures and authenticates against `profile`.
    ///
    /// # Errors
    ///
    /// Returns [`NegotiateError::Transport`] if the transport cannot be
    /// opened or secured and [`NegotiateError::Auth`] if login fails.
    pub async fn negotiate(
        &self,
        profile: &ProviderProfile,
        credentials: &Credentials,
    ) -> Result<Client<C::Stream, Authenticated>, NegotiateError> {
        let config = profile.imap_config();
        let mut state = NegotiationState::Disconnected;

        let client = Client::connect(&self.connector, &config)
            .await
            .map_err(|e| transport_failure(state, e, &config))?;
        advance(&mut state, NegotiationState::TransportConnected, &config);

        let secured = secure(client, &config).await.map_err(|source| {
            warn!(host = %config.host, error = %source, "could not secure transport");
            NegotiateError::Transport { state, source }
        })?;
        advance(&mut state, NegotiationState::Secured, &config);

        let mechanism =
            select_mechanism(profile.auth_mechanism, credentials, secured.capabilities())?;
        let client = authenticate(secured, mechanism, credentials, &config).await?;
        advance(&mut state, NegotiationState::Authenticated, &config);
        info!(host = %config.host, %mechanism, "authenticated");
        Ok(client)
    }
}

fn advance(state: &mut NegotiationState, next: NegotiationState, config: &ConnectionConfig) {
    debug!(host = %config.host, from = %state, to = %next, "negotiation state");
    *state = next;
}

fn transport_failure(
    state: NegotiationState,
    err: mailwire_imap::Error,
    config: &ConnectionConfig,
) -> NegotiateError {
    let source = TransportError::from_imap(err, config);
    warn!(host = %config.host, %state, error = %source, "transport failure");
    NegotiateError::Transport { state, source }
}

/// Brings a freshly greeted client to an encrypted transport.
async fn secure<S: Transport>(
    client: Client<S, NotAuthenticated>,
    config: &ConnectionConfig,
) -> Result<SecuredClient<S>, TransportError> {
    let client = match config.security {
        Security::Implicit => client,
        Security::StartTls => client
            .starttls(&config.host)
            .await
            .map_err(|e| TransportError::from_imap(e, config))?,
        Security::None => {
            return Err(TransportError::Insecure {
                host: config.host.clone(),
            });
        }
    };
    client
        .into_secured()
        .map_err(|_| TransportError::Handshake {
            host: config.host.clone(),
            reason: "transport is not encrypted".to_string(),
        })
}

async fn authenticate<S: Transport>(
    secured: SecuredClient<S>,
    mechanism: Mechanism,
    credentials: &Credentials,
    config: &ConnectionConfig,
) -> Result<Client<S, Authenticated>, NegotiateError> {
    debug!(host = %config.host, %mechanism, "authenticating");
    let attempt = match credentials {
        Credentials::OAuthToken { token, strategy } => {
            if token.is_expired() {
                return Err(AuthError::CredentialRejected {
                    mechanism,
                    detail: "the access token has expired".to_string(),
                }
                .into());
            }
            let address = strategy
                .resolve()
                .map_err(|source| AuthError::IdentityUnresolved { mechanism, source })?;
            let sasl = mechanism.sasl().unwrap_or(SaslMechanism::XOAuth2);
            secured
                .authenticate(sasl, &address, &token.access_token)
                .await
        }
        Credentials::AppPassword { username, password } => match mechanism.sasl() {
            Some(sasl) => secured.authenticate(sasl, username, password).await,
            None => secured.login(username, password).await,
        },
    };

    attempt.map_err(|e| {
        let err = NegotiateError::from_auth_attempt(mechanism, e, config);
        warn!(host = %config.host, %mechanism, retryable = err.is_retryable(), error = %err, "authentication failed");
        err
    })
}
