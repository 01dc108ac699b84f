//! # mailwire-core
//!
//! Everything between the IMAP wire client and a mail application:
//! - **Provider registry** - per-provider endpoints, limits and folder hints
//! - **Folder classification** - special-use roles and sync exclusions
//! - **Negotiation** - TLS upgrade, mechanism choice and authentication
//! - **Connection pool** - per-account and global ceilings with a priority
//!   queue and idle reclaim
//! - **Long-poll** - IDLE re-issued on the provider's cadence
//! - **Credentials** - keyring-backed secret storage

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod credentials;
mod error;
pub mod folder;
pub mod longpoll;
pub mod negotiate;
pub mod pool;
pub mod provider;
pub mod time;

pub use credentials::{
    CredentialError, CredentialResult, KeyringStore, MemoryStore, SecretKind, SecretStore,
};
pub use error::{Error, Result};
pub use folder::{
    Classification, ClassificationTier, FolderRole, assign_roles, classify, classify_detailed,
    classify_folder,
    should_sync, should_sync_folder,
};
pub use negotiate::{
    AuthError, Credentials, Mechanism, NegotiateError, NegotiationState, Negotiator,
    TransportError, select_mechanism,
};
pub use pool::{
    AccountBinding, AccountId, CheckoutPriority, ConnectionPool, CredentialKind,
    NegotiatingFactory, PoolConfig, PoolError, PoolStats, PooledSession, SessionFactory,
};
pub use provider::{AuthMethod, ProviderProfile, ProviderRegistry};
pub use time::{Clock, MockClock, SystemClock};
