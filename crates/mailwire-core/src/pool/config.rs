//! Pool limits and timeouts.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Sessions idle longer than this are closed on mobile targets, where the OS
/// suspends sockets of backgrounded apps.
#[cfg(any(target_os = "ios", target_os = "android"))]
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Sessions idle longer than this are closed.
#[cfg(not(any(target_os = "ios", target_os = "android")))]
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Pool configuration.
///
/// ```
/// use mailwire_core::pool::PoolConfig;
///
/// let config: PoolConfig = serde_json::from_str(r#"{"globalCeiling": 4}"#).unwrap();
/// assert_eq!(config.global_ceiling, 4);
/// assert_eq!(config.checkout_timeout, PoolConfig::default().checkout_timeout);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PoolConfig {
    /// Open sessions across all accounts.
    pub global_ceiling: usize,
    /// How long a checkout may wait for capacity.
    #[serde(rename = "checkoutTimeoutSeconds", with = "seconds")]
    pub checkout_timeout: Duration,
    /// How long a returned session may sit unused.
    #[serde(rename = "idleTimeoutSeconds", with = "seconds")]
    pub idle_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            global_ceiling: 20,
            checkout_timeout: Duration::from_secs(30),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

/// Who is waiting for a session. Higher variants are served first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum CheckoutPriority {
    /// Sync and prefetch.
    Background,
    /// Everything else.
    #[default]
    Normal,
    /// The user is waiting on the result.
    Interactive,
}

mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
