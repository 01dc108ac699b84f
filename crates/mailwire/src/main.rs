//! `mailwire-probe` - check that an account negotiates and see how its
//! folders classify.
//!
//! ```text
//! mailwire-probe [path/to/probe.json]
//! ```
//!
//! Without a path the config is read from `<config dir>/mailwire/probe.json`.
//! The secret comes from `MAILWIRE_SECRET` when set, otherwise from the
//! platform keyring.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use mailwire_core::{
    AccountBinding, AccountId, CheckoutPriority, ConnectionPool, CredentialKind, KeyringStore,
    MemoryStore, NegotiatingFactory, Negotiator, PoolConfig, ProviderProfile, ProviderRegistry,
    SecretKind, SecretStore, assign_roles, should_sync_folder,
};
use mailwire_imap::{Security, TcpConnector};
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable that overrides the keyring.
const SECRET_ENV: &str = "MAILWIRE_SECRET";

/// Server given by hand instead of a registry profile.
#[derive(Debug, Deserialize)]
struct ManualServer {
    host: String,
    port: Option<u16>,
    #[serde(default)]
    security: Security,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProbeConfig {
    address: String,
    /// Registry profile id; resolved from the address when absent.
    provider: Option<String>,
    server: Option<ManualServer>,
    credential: CredentialKind,
    /// JSON array of extra provider profiles.
    provider_overrides: Option<PathBuf>,
    #[serde(default)]
    pool: PoolConfig,
}

fn config_path() -> PathBuf {
    std::env::args_os().nth(1).map_or_else(
        || {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("mailwire")
                .join("probe.json")
        },
        PathBuf::from,
    )
}

async fn load_config(path: &Path) -> Result<ProbeConfig> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
}

async fn load_registry(config: &ProbeConfig) -> Result<ProviderRegistry> {
    let registry = ProviderRegistry::built_in();
    let Some(path) = &config.provider_overrides else {
        return Ok(registry);
    };
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    registry
        .with_overrides_json(&json)
        .with_context(|| format!("parsing {}", path.display()))
}

const fn secret_kind(credential: CredentialKind) -> SecretKind {
    match credential {
        CredentialKind::AppPassword => SecretKind::AppPassword,
        CredentialKind::OAuthToken => SecretKind::AccessToken,
    }
}

async fn probe<St: SecretStore>(
    config: ProbeConfig,
    mut registry: ProviderRegistry,
    store: St,
) -> Result<()> {
    let account = AccountId::new(config.address.clone());
    let mut provider = config.provider;
    if let Some(server) = config.server {
        let port = server.port.unwrap_or_else(|| server.security.default_port());
        let profile = ProviderProfile::manual(server.host, port, server.security);
        provider = Some(profile.identifier.clone());
        registry.insert(profile);
    }

    let binding = AccountBinding {
        address: config.address,
        provider,
        credential: config.credential,
    };
    let factory = NegotiatingFactory::new(Negotiator::new(TcpConnector), registry, store);
    let profile = factory.profile_for(&binding);
    info!(
        account = %account,
        provider = %profile.identifier,
        host = %profile.imap_host,
        port = profile.imap_port,
        "probing"
    );
    factory.bind(account.clone(), binding);

    let pool = ConnectionPool::new(factory, config.pool);
    pool.register_profile(account.clone(), &profile);
    pool.set_focused_account(Some(account.clone()));
    let reaper = pool.spawn_reaper(Duration::from_secs(60));

    let mut session = pool
        .checkout(&account, CheckoutPriority::Interactive)
        .await
        .context("could not open a session")?;
    let folders = session.list("", "*").await.context("LIST failed")?;
    let roles = assign_roles(&folders, &profile);

    println!("{:<10} {:<5} FOLDER", "ROLE", "SYNC");
    for (folder, role) in folders.iter().zip(roles) {
        let sync = if should_sync_folder(folder, &profile) {
            "yes"
        } else {
            "no"
        };
        println!("{:<10} {:<5} {}", role.as_str(), sync, folder.server_path);
    }
    drop(session);

    let stats = pool.stats();
    info!(open = stats.open, idle = stats.idle, "done");
    reaper.abort();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let path = config_path();
    let config = load_config(&path).await?;
    let registry = load_registry(&config).await?;

    match std::env::var(SECRET_ENV) {
        Ok(secret) => {
            let store = MemoryStore::new();
            store.set(
                &AccountId::new(config.address.clone()),
                secret_kind(config.credential),
                &secret,
            )?;
            probe(config, registry, store).await
        }
        Err(_) => probe(config, registry, KeyringStore).await,
    }
}
