//! Long-poll mailbox watching.
//!
//! Servers drop IDLE connections silently after a provider-specific timeout
//! (Gmail around ten minutes, Outlook and Yahoo later). [`watch`] ends each
//! IDLE round with DONE before that happens and immediately issues a new one,
//! on the cadence from [`ProviderProfile::idle_refresh_interval`].

use std::ops::ControlFlow;
use std::time::Duration;

use mailwire_imap::{Client, Error, IdleEvent, Result, Selected, Transport};
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::provider::ProviderProfile;

/// Watches the selected mailbox until `on_event` breaks.
///
/// Each IDLE round lasts at most `refresh`. Round timeouts are not reported
/// to `on_event`.
///
/// # Errors
///
/// Returns [`Error::InvalidState`] if the server lacks IDLE, and any error
/// raised while idling. The session should be discarded after an error.
pub async fn watch<S, F>(
    client: &mut Client<S, Selected>,
    refresh: Duration,
    mut on_event: F,
) -> Result<()>
where
    S: Transport,
    F: FnMut(IdleEvent) -> ControlFlow<()>,
{
    if !client.supports_idle() {
        return Err(Error::InvalidState("server does not support IDLE".to_string()));
    }

    let mut round: u64 = 0;
    loop {
        round += 1;
        let deadline = Instant::now() + refresh;
        let mut idle = client.idle().await?;
        trace!(round, ?refresh, "IDLE round started");

        let stop = loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break false;
            }
            match idle.wait(remaining).await? {
                IdleEvent::Timeout => break false,
                event => {
                    trace!(?event, "mailbox changed");
                    if on_event(event).is_break() {
                        break true;
                    }
                }
            }
        };

        idle.done().await?;
        if stop {
            debug!(rounds = round, "stopped watching mailbox");
            return Ok(());
        }
        debug!(round, "re-issuing IDLE");
    }
}

/// [`watch`] on the cadence of `profile`.
///
/// # Errors
///
/// See [`watch`].
pub async fn watch_for<S, F>(
    client: &mut Client<S, Selected>,
    profile: &ProviderProfile,
    on_event: F,
) -> Result<()>
where
    S: Transport,
    F: FnMut(IdleEvent) -> ControlFlow<()>,
{
    watch(client, profile.idle_refresh_interval(), on_event).await
}
