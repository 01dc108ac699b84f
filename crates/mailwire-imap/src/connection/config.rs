//! Where to connect and how long to wait.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const CONNECT_BUDGET: Duration = Duration::from_secs(30);
const ROUND_TRIP_BUDGET: Duration = Duration::from_secs(60);

/// Transport security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Security {
    /// Cleartext throughout. Local test servers only.
    None,
    /// Cleartext greeting, upgraded in-band with STARTTLS.
    StartTls,
    /// TLS before the greeting.
    #[default]
    Implicit,
}

impl Security {
    /// Well-known IMAP port for the mode: 993 for implicit TLS, else 143.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        if matches!(self, Self::Implicit) { 993 } else { 143 }
    }

    /// Whether the mode ends up encrypted before credentials are sent.
    #[must_use]
    pub const fn is_encrypted(self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for Security {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::StartTls => "starttls",
            Self::Implicit => "implicit",
        })
    }
}

/// Endpoint plus timeouts for one transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Hostname; doubles as the TLS server name.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Limit on TCP connect plus an implicit-TLS handshake.
    pub connect_timeout: Duration,
    /// Limit on each command round trip.
    pub io_timeout: Duration,
}

impl ConnectionConfig {
    /// Implicit TLS on 993 with default timeouts.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self::builder(host).build()
    }

    /// Starts a [`ConfigBuilder`] for `host`.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder {
            draft: Self {
                host: host.into(),
                port: 0,
                security: Security::default(),
                connect_timeout: CONNECT_BUDGET,
                io_timeout: ROUND_TRIP_BUDGET,
            },
            port: None,
        }
    }

    /// `host:port`, as used for logging and TCP connect.
    #[must_use]
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Builds a [`ConnectionConfig`]. The port follows the security mode unless
/// set explicitly.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    draft: ConnectionConfig,
    port: Option<u16>,
}

impl ConfigBuilder {
    /// Same as [`ConnectionConfig::builder`].
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        ConnectionConfig::builder(host)
    }

    /// Pins the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.draft.security = security;
        self
    }

    /// Limit on connect and implicit-TLS handshake.
    #[must_use]
    pub const fn connect_timeout(mut self, limit: Duration) -> Self {
        self.draft.connect_timeout = limit;
        self
    }

    /// Limit on each round trip.
    #[must_use]
    pub const fn io_timeout(mut self, limit: Duration) -> Self {
        self.draft.io_timeout = limit;
        self
    }

    /// Finishes the configuration.
    #[must_use]
    pub fn build(self) -> ConnectionConfig {
        let Self { mut draft, port } = self;
        draft.port = port.unwrap_or_else(|| draft.security.default_port());
        draft
    }
}
