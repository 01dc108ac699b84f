//! Secret storage.
//!
//! Secrets are read once per connection attempt and never persisted by this
//! crate. [`KeyringStore`] keeps them in the platform credential store:
//! - Linux: Secret Service (GNOME Keyring, `KWallet`)
//! - macOS: Keychain
//! - Windows: Credential Manager

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use keyring::Entry;
use tracing::debug;

use crate::pool::AccountId;

/// Keyring service name.
const SERVICE_NAME: &str = "mailwire";

/// Which secret of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecretKind {
    /// App-specific password.
    AppPassword,
    /// OAuth access token.
    AccessToken,
    /// OpenID Connect ID token, used to find the account address.
    IdentityToken,
}

impl SecretKind {
    const fn key(self) -> &'static str {
        match self {
            Self::AppPassword => "app_password",
            Self::AccessToken => "access_token",
            Self::IdentityToken => "id_token",
        }
    }
}

impl fmt::Display for SecretKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Error type for credential operations.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// Failed to access keyring.
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    /// No secret is stored.
    #[error("No {kind} stored for account {account}")]
    Missing {
        /// Account.
        account: AccountId,
        /// Secret that was looked up.
        kind: SecretKind,
    },
}

/// Result type for credential operations.
pub type CredentialResult<T> = std::result::Result<T, CredentialError>;

/// Where account secrets live.
pub trait SecretStore: Send + Sync + 'static {
    /// Reads a secret, `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    fn get(&self, account: &AccountId, kind: SecretKind) -> CredentialResult<Option<String>>;

    /// Stores a secret, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    fn set(&self, account: &AccountId, kind: SecretKind, secret: &str) -> CredentialResult<()>;

    /// Removes a secret. Removing an absent secret is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    fn delete(&self, account: &AccountId, kind: SecretKind) -> CredentialResult<()>;

    /// Reads a secret that must exist.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Missing`] if nothing is stored.
    fn require(&self, account: &AccountId, kind: SecretKind) -> CredentialResult<String> {
        self.get(account, kind)?.ok_or_else(|| CredentialError::Missing {
            account: account.clone(),
            kind,
        })
    }
}

/// The platform keyring.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyringStore;

impl KeyringStore {
    fn entry(account: &AccountId, kind: SecretKind) -> CredentialResult<Entry> {
        Ok(Entry::new(SERVICE_NAME, &format!("{kind}:{account}"))?)
    }
}

impl SecretStore for KeyringStore {
    fn get(&self, account: &AccountId, kind: SecretKind) -> CredentialResult<Option<String>> {
        match Self::entry(account, kind)?.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => {
                debug!(%account, %kind, "no secret in keyring");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, account: &AccountId, kind: SecretKind, secret: &str) -> CredentialResult<()> {
        Self::entry(account, kind)?.set_password(secret)?;
        debug!(%account, %kind, "stored secret in keyring");
        Ok(())
    }

    fn delete(&self, account: &AccountId, kind: SecretKind) -> CredentialResult<()> {
        match Self::entry(account, kind)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process store for tests and short-lived tools.
#[derive(Default)]
pub struct MemoryStore {
    secrets: Mutex<HashMap<(AccountId, SecretKind), String>>,
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self
            .secrets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("MemoryStore").field("secrets", &count).finish()
    }
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretStore for MemoryStore {
    fn get(&self, account: &AccountId, kind: SecretKind) -> CredentialResult<Option<String>> {
        let secrets = self.secrets.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(secrets.get(&(account.clone(), kind)).cloned())
    }

    fn set(&self, account: &AccountId, kind: SecretKind, secret: &str) -> CredentialResult<()> {
        self.secrets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((account.clone(), kind), secret.to_string());
        Ok(())
    }

    fn delete(&self, account: &AccountId, kind: SecretKind) -> CredentialResult<()> {
        self.secrets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(account.clone(), kind));
        Ok(())
    }
}
