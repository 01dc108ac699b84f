//! Type-state IMAP client connection.
//!
//! The connection states are:
//!
//! - `NotAuthenticated`: after the greeting; STARTTLS and capability
//!   discovery happen here
//! - [`SecuredClient`]: a not-authenticated client whose transport is known
//!   to be encrypted; the only place credentials can be sent
//! - `Authenticated`: after a successful AUTHENTICATE or LOGIN
//! - `Selected`: after a successful SELECT or EXAMINE
//!
//! Each state only exposes the commands that are valid for it.

#![allow(clippy::missing_errors_doc)]

mod authenticated;
mod not_authenticated;
mod secured;
mod selected;
mod states;

use tracing::debug;

pub use self::secured::SecuredClient;
pub use self::states::{Authenticated, NotAuthenticated, Selected};
use super::framed::FramedStream;
use super::stream::Transport;
use crate::command::{Command, TagGenerator};
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::types::{Capability, ResponseCode, Status};
use crate::{Error, Result};

/// IMAP client connection with type-state.
pub struct Client<S, State> {
    pub(crate) stream: FramedStream<S>,
    pub(crate) tag_gen: TagGenerator,
    pub(crate) capabilities: Vec<Capability>,
    pub(crate) state: State,
}

impl<S, State: std::fmt::Debug> std::fmt::Debug for Client<S, State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("state", &self.state)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

impl<S, State> Client<S, State>
where
    S: Transport,
{
    /// Returns the server capabilities as last reported.
    #[must_use]
    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// Checks if the server has a specific capability.
    #[must_use]
    pub fn has_capability(&self, cap: &Capability) -> bool {
        self.capabilities.contains(cap)
    }

    /// Returns true if the server advertises the SASL mechanism.
    #[must_use]
    pub fn supports_auth(&self, mechanism: &str) -> bool {
        self.capabilities
            .iter()
            .filter_map(Capability::auth_mechanism)
            .any(|m| m.eq_ignore_ascii_case(mechanism))
    }

    /// Returns true if the server supports IDLE (RFC 2177).
    #[must_use]
    pub fn supports_idle(&self) -> bool {
        self.has_capability(&Capability::Idle)
    }

    /// Returns true if LOGIN is disabled (e.g., before STARTTLS).
    #[must_use]
    pub fn login_disabled(&self) -> bool {
        self.has_capability(&Capability::LoginDisabled)
    }

    /// Returns true if the underlying transport is encrypted.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.stream.get_ref().is_secure()
    }

    /// Sends a NOOP, giving the server a chance to report changes.
    pub async fn noop(&mut self) -> Result<()> {
        self.execute(&Command::Noop).await.map(|_| ())
    }

    /// Sends CAPABILITY and replaces the stored capabilities.
    pub async fn capability(&mut self) -> Result<Vec<Capability>> {
        let responses = self.execute(&Command::Capability).await?;
        self.absorb_capabilities(&responses);
        Ok(self.capabilities.clone())
    }

    /// Runs a command and returns every response up to and including the
    /// tagged completion, after checking that it is OK.
    pub async fn execute(&mut self, command: &Command) -> Result<Vec<Vec<u8>>> {
        let tag = self.send(command).await?;
        let responses = self.stream.read_until_tagged(&tag).await?;
        check_tagged_ok(&responses, &tag)?;
        Ok(responses)
    }

    /// Writes a command and returns its tag.
    pub(crate) async fn send(&mut self, command: &Command) -> Result<String> {
        let tag = self.tag_gen.next_tag();
        debug!(%tag, command = command.name(), "C: command");
        self.stream.write_command(&command.serialize(&tag)).await?;
        Ok(tag)
    }

    /// Updates capabilities from untagged CAPABILITY data or a
    /// `[CAPABILITY ...]` response code, if either is present.
    pub(crate) fn absorb_capabilities(&mut self, responses: &[Vec<u8>]) -> bool {
        for raw in responses {
            match ResponseParser::parse(raw) {
                Ok(Response::Untagged(UntaggedResponse::Capability(caps))) => {
                    self.capabilities = caps;
                    return true;
                }
                Ok(
                    Response::Tagged {
                        code: Some(ResponseCode::Capability(caps)),
                        ..
                    }
                    | Response::Untagged(UntaggedResponse::Ok {
                        code: Some(ResponseCode::Capability(caps)),
                        ..
                    }),
                ) => {
                    self.capabilities = caps;
                    return true;
                }
                _ => {}
            }
        }
        false
    }

    /// Moves the connection into another state.
    pub(crate) fn into_state<T>(self, state: T) -> Client<S, T> {
        Client {
            stream: self.stream,
            tag_gen: self.tag_gen,
            capabilities: self.capabilities,
            state,
        }
    }

    /// Logs out and closes the connection.
    pub async fn logout(mut self) -> Result<()> {
        let tag = self.send(&Command::Logout).await?;
        let responses = self.stream.read_until_tagged(&tag).await?;
        // BYE precedes the tagged OK and is expected here.
        match check_tagged_ok(&responses, &tag) {
            Ok(()) | Err(Error::Bye(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Checks the tagged completion in `responses`, surfacing NO, BAD and an
/// untagged BYE as errors.
pub(crate) fn check_tagged_ok(responses: &[Vec<u8>], tag: &str) -> Result<()> {
    let mut bye = None;
    for raw in responses {
        match ResponseParser::parse(raw) {
            Ok(Response::Tagged {
                tag: resp_tag,
                status,
                code,
                text,
            }) if resp_tag.as_str() == tag => {
                return match status {
                    Status::Ok | Status::PreAuth => Ok(()),
                    Status::No => Err(Error::No { code, text }),
                    Status::Bad => Err(Error::Bad { code, text }),
                    Status::Bye => Err(Error::Bye(text)),
                };
            }
            Ok(Response::Untagged(UntaggedResponse::Bye { text, .. })) => bye = Some(text),
            _ => {}
        }
    }

    Err(bye.map_or_else(
        || Error::Protocol("missing tagged response".to_string()),
        Error::Bye,
    ))
}
