//! Where pooled sessions come from.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{PoisonError, RwLock};

use mailwire_imap::{Authenticated, Client, Connector, TcpConnector};
use mailwire_oauth::{EmailResolutionStrategy, Token};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{AccountId, PoolError};
use crate::credentials::{SecretKind, SecretStore};
use crate::negotiate::{Credentials, Negotiator};
use crate::provider::{ProviderProfile, ProviderRegistry};

/// Opens new sessions for the pool.
pub trait SessionFactory: Send + Sync + 'static {
    /// Session type handed out by the pool.
    type Session: Send + 'static;

    /// Opens and authenticates a session for `account`.
    fn open(
        &self,
        account: &AccountId,
    ) -> impl Future<Output = Result<Self::Session, PoolError>> + Send;
}

/// Kind of secret an account signs in with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CredentialKind {
    /// App-specific password.
    AppPassword,
    /// OAuth access token, with an optional identity token.
    #[serde(rename = "oauthToken")]
    OAuthToken,
}

/// How an account connects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBinding {
    /// Account address.
    pub address: String,
    /// Profile identifier; resolved from the address when absent.
    #[serde(default)]
    pub provider: Option<String>,
    /// Secret kind to read from the store.
    pub credential: CredentialKind,
}

/// Production factory: looks up the profile, reads the secret and negotiates.
pub struct NegotiatingFactory<St, C = TcpConnector> {
    negotiator: Negotiator<C>,
    registry: ProviderRegistry,
    store: St,
    bindings: RwLock<HashMap<AccountId, AccountBinding>>,
}

impl<St: SecretStore, C: Connector> NegotiatingFactory<St, C> {
    /// Creates a factory with no bound accounts.
    pub fn new(negotiator: Negotiator<C>, registry: ProviderRegistry, store: St) -> Self {
        Self {
            negotiator,
            registry,
            store,
            bindings: RwLock::new(HashMap::new()),
        }
    }

    /// Binds `account`, replacing any previous binding.
    pub fn bind(&self, account: AccountId, binding: AccountBinding) {
        self.bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(account, binding);
    }

    /// Forgets `account`.
    pub fn unbind(&self, account: &AccountId) {
        self.bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(account);
    }

    /// The registry profiles are resolved from.
    pub const fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Profile `binding` connects with.
    pub fn profile_for(&self, binding: &AccountBinding) -> ProviderProfile {
        binding
            .provider
            .as_deref()
            .and_then(|id| self.registry.get(id))
            .cloned()
            .unwrap_or_else(|| self.registry.resolve(&binding.address))
    }

    fn credentials_for(
        &self,
        account: &AccountId,
        binding: &AccountBinding,
    ) -> Result<Credentials, PoolError> {
        Ok(match binding.credential {
            CredentialKind::AppPassword => Credentials::AppPassword {
                username: binding.address.clone(),
                password: self.store.require(account, SecretKind::AppPassword)?,
            },
            CredentialKind::OAuthToken => {
                let token = Token::bearer(self.store.require(account, SecretKind::AccessToken)?);
                let strategy = match self.store.get(account, SecretKind::IdentityToken)? {
                    Some(jwt) => EmailResolutionStrategy::IdentityToken(jwt),
                    None => EmailResolutionStrategy::UserSupplied(binding.address.clone()),
                };
                Credentials::OAuthToken { token, strategy }
            }
        })
    }
}

impl<St: SecretStore, C: Connector> SessionFactory for NegotiatingFactory<St, C> {
    type Session = Client<C::Stream, Authenticated>;

    async fn open(&self, account: &AccountId) -> Result<Self::Session, PoolError> {
        let binding = self
            .bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(account)
            .cloned()
            .ok_or_else(|| PoolError::UnknownAccount(account.clone()))?;

        let profile = self.profile_for(&binding);
        let credentials = self.credentials_for(account, &binding)?;
        debug!(%account, provider = %profile.identifier, "opening session");
        Ok(self.negotiator.negotiate(&profile, &credentials).await?)
    }
}
