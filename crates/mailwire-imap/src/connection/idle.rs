//! IDLE (RFC 2177): server-pushed mailbox changes.
//!
//! The long-poll loop in `mailwire-core` re-issues IDLE on a per-provider
//! cadence; this module only handles a single IDLE round.

#![allow(clippy::missing_errors_doc)]

use std::time::Duration;

use tokio::time::timeout;
use tracing::trace;

use super::client::{Client, Selected, check_tagged_ok};
use super::framed::FramedStream;
use super::stream::Transport;
use crate::command::Command;
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::{Error, Result};

/// Event received during IDLE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleEvent {
    /// New message count.
    Exists(u32),
    /// Message expunged (sequence number).
    Expunge(u32),
    /// Flags changed on a message.
    Fetch {
        /// Message sequence number.
        seq: u32,
    },
    /// Recent count changed.
    Recent(u32),
    /// Nothing arrived before the deadline.
    Timeout,
}

/// An active IDLE round. Call [`done`](Self::done) to leave it.
pub struct IdleHandle<'a, S> {
    stream: &'a mut FramedStream<S>,
    tag: String,
}

impl<S> IdleHandle<'_, S>
where
    S: Transport,
{
    /// Waits for the next change notification or until `duration` elapses.
    ///
    /// Status chatter (`* OK Still here`) is skipped.
    pub async fn wait(&mut self, duration: Duration) -> Result<IdleEvent> {
        let deadline = tokio::time::Instant::now() + duration;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            let Ok(read) = timeout(remaining, self.stream.read_response_unbounded()).await else {
                return Ok(IdleEvent::Timeout);
            };
            if let Some(event) = self.classify(&read?)? {
                return Ok(event);
            }
        }
    }

    fn classify(&self, raw: &[u8]) -> Result<Option<IdleEvent>> {
        match ResponseParser::parse(raw)? {
            Response::Untagged(untagged) => Ok(match untagged {
                UntaggedResponse::Exists(n) => Some(IdleEvent::Exists(n)),
                UntaggedResponse::Recent(n) => Some(IdleEvent::Recent(n)),
                UntaggedResponse::Expunge(n) => Some(IdleEvent::Expunge(n)),
                UntaggedResponse::Fetch { seq } => Some(IdleEvent::Fetch { seq }),
                UntaggedResponse::Bye { text, .. } => return Err(Error::Bye(text)),
                other => {
                    trace!(?other, "ignoring untagged response during IDLE");
                    None
                }
            }),
            Response::Continuation { .. } => Err(Error::Protocol(
                "unexpected continuation during IDLE".to_string(),
            )),
            Response::Tagged { .. } => {
                // The server ended IDLE on its own.
                check_tagged_ok(&[raw.to_vec()], &self.tag)?;
                Err(Error::InvalidState("server terminated IDLE".to_string()))
            }
        }
    }

    /// Sends DONE and waits for the IDLE completion.
    pub async fn done(self) -> Result<()> {
        self.stream
            .write_command(&Command::Done.serialize(""))
            .await?;
        let responses = self.stream.read_until_tagged(&self.tag).await?;
        check_tagged_ok(&responses, &self.tag)
    }
}

impl<S> Client<S, Selected>
where
    S: Transport,
{
    /// Enters IDLE. Check [`supports_idle`](Client::supports_idle) first.
    pub async fn idle(&mut self) -> Result<IdleHandle<'_, S>> {
        let tag = self.send(&Command::Idle).await?;

        loop {
            let response = self.stream.read_response().await?;
            match ResponseParser::parse(&response)? {
                Response::Continuation { .. } => {
                    return Ok(IdleHandle {
                        stream: &mut self.stream,
                        tag,
                    });
                }
                Response::Tagged { .. } => {
                    check_tagged_ok(&[response], &tag)?;
                    return Err(Error::Protocol("IDLE completed immediately".to_string()));
                }
                Response::Untagged(_) => {}
            }
        }
    }
}
