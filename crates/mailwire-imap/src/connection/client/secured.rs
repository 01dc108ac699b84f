//! Credential exchange over an encrypted transport.

use mailwire_oauth::SaslMechanism;
use mailwire_oauth::sasl::decode_failure_challenge;
use tracing::{debug, warn};

use super::states::{Authenticated, NotAuthenticated};
use super::{Client, check_tagged_ok};
use crate::command::Command;
use crate::connection::stream::Transport;
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::types::{Capability, ResponseCode, Status};
use crate::{Error, Result};

/// A not-authenticated client whose transport is encrypted.
///
/// Obtained only through [`Client::into_secured`], so credentials cannot be
/// written to a plaintext socket.
pub struct SecuredClient<S> {
    pub(crate) inner: Client<S, NotAuthenticated>,
}

impl<S> std::fmt::Debug for SecuredClient<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SecuredClient").field(&self.inner).finish()
    }
}

impl<S> SecuredClient<S>
where
    S: Transport,
{
    /// Returns the post-upgrade server capabilities.
    #[must_use]
    pub fn capabilities(&self) -> &[Capability] {
        self.inner.capabilities()
    }

    /// Returns true if the server advertises the SASL mechanism.
    #[must_use]
    pub fn supports_auth(&self, mechanism: &str) -> bool {
        self.inner.supports_auth(mechanism)
    }

    /// Returns true if LOGIN is disabled.
    #[must_use]
    pub fn login_disabled(&self) -> bool {
        self.inner.login_disabled()
    }

    /// Authenticates with a SASL mechanism.
    ///
    /// The initial response goes on the AUTHENTICATE line when SASL-IR is
    /// advertised, otherwise after the first continuation. A failure
    /// challenge (`+ <base64 json>`) is acknowledged and decoded into the
    /// returned error.
    pub async fn authenticate(
        mut self,
        mechanism: SaslMechanism,
        user: &str,
        secret: &str,
    ) -> Result<Client<S, Authenticated>> {
        let client = &mut self.inner;
        let initial = mechanism.initial_response(user, secret);
        let inline = client.has_capability(&Capability::SaslIr);
        debug!(%mechanism, sasl_ir = inline, "authenticating");

        let tag = client
            .send(&Command::Authenticate {
                mechanism: mechanism.name().to_string(),
                initial_response: inline.then(|| initial.clone()),
            })
            .await?;

        let mut pending = (!inline).then_some(initial);
        let mut challenge = None;
        let mut responses = Vec::new();

        loop {
            let raw = client.stream.read_response().await?;
            match ResponseParser::parse(&raw)? {
                Response::Continuation { text } => {
                    if let Some(ir) = pending.take() {
                        client.stream.write_command(format!("{ir}\r\n").as_bytes()).await?;
                    } else {
                        challenge = decode_failure_challenge(&text);
                        if let Some(err) = &challenge {
                            warn!(%mechanism, status = %err.status, "bearer token refused");
                        }
                        client.stream.write_command(failure_ack(mechanism)).await?;
                    }
                }
                Response::Tagged {
                    tag: resp_tag,
                    status,
                    code,
                    text,
                } if resp_tag.as_str() == tag => {
                    if status.is_ok() {
                        responses.push(raw);
                        break;
                    }
                    return Err(Error::AuthRejected {
                        mechanism: mechanism.name().to_string(),
                        status,
                        code,
                        text,
                        challenge,
                    });
                }
                Response::Untagged(UntaggedResponse::Bye { text, .. }) => {
                    return Err(Error::Bye(text));
                }
                _ => responses.push(raw),
            }
        }

        self.finish(&responses).await
    }

    /// Authenticates with the LOGIN command.
    pub async fn login(mut self, user: &str, password: &str) -> Result<Client<S, Authenticated>> {
        if self.login_disabled() {
            return Err(Error::InvalidState(
                "server advertises LOGINDISABLED".to_string(),
            ));
        }
        debug!("authenticating with LOGIN");

        let client = &mut self.inner;
        let tag = client
            .send(&Command::Login {
                username: user.to_string(),
                password: password.to_string(),
            })
            .await?;
        let responses = client.stream.read_until_tagged(&tag).await?;
        match check_tagged_ok(&responses, &tag) {
            Ok(()) => {}
            Err(Error::No { code, text }) => return Err(login_rejected(Status::No, code, text)),
            Err(Error::Bad { code, text }) => return Err(login_rejected(Status::Bad, code, text)),
            Err(e) => return Err(e),
        }

        self.finish(&responses).await
    }

    /// Logs out without authenticating.
    pub async fn logout(self) -> Result<()> {
        self.inner.logout().await
    }

    async fn finish(self, responses: &[Vec<u8>]) -> Result<Client<S, Authenticated>> {
        let mut client = self.inner.into_state(Authenticated);
        // Servers may extend capabilities after login; ask if they did not say.
        if !client.absorb_capabilities(responses) {
            client.capability().await?;
        }
        debug!("authenticated");
        Ok(client)
    }
}

/// Client reply to a failure challenge: an empty line for XOAUTH2, the
/// `%x01` dummy response for OAUTHBEARER (RFC 7628 §3.2.3).
const fn failure_ack(mechanism: SaslMechanism) -> &'static [u8] {
    match mechanism {
        SaslMechanism::OAuthBearer => b"AQ==\r\n",
        SaslMechanism::Plain | SaslMechanism::XOAuth2 => b"\r\n",
    }
}

fn login_rejected(status: Status, code: Option<ResponseCode>, text: String) -> Error {
    Error::AuthRejected {
        mechanism: "LOGIN".to_string(),
        status,
        code,
        text,
        challenge: None,
    }
}
