//! Greeting, capability discovery and the STARTTLS upgrade.

use tracing::{debug, info};

use super::secured::SecuredClient;
use super::states::NotAuthenticated;
use super::{Client, check_tagged_ok};
use crate::command::{Command, TagGenerator};
use crate::connection::config::ConnectionConfig;
use crate::connection::framed::FramedStream;
use crate::connection::stream::{Connector, Transport};
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::types::{Capability, ResponseCode};
use crate::{Error, Result};

impl<S> Client<S, NotAuthenticated>
where
    S: Transport,
{
    /// Opens a transport with `connector` and reads the greeting.
    pub async fn connect<C>(connector: &C, config: &ConnectionConfig) -> Result<Self>
    where
        C: Connector<Stream = S>,
    {
        let stream = connector.connect(config).await?;
        Self::from_framed(FramedStream::new(stream).with_timeout(config.io_timeout)).await
    }

    /// Creates a client from a connected stream, reading the greeting.
    pub async fn from_stream(stream: S) -> Result<Self> {
        Self::from_framed(FramedStream::new(stream)).await
    }

    async fn from_framed(mut framed: FramedStream<S>) -> Result<Self> {
        let greeting = framed.read_response().await?;

        let mut capabilities = Vec::new();
        match ResponseParser::parse(&greeting)? {
            Response::Untagged(
                UntaggedResponse::Ok { code, .. } | UntaggedResponse::PreAuth { code, .. },
            ) => {
                if let Some(ResponseCode::Capability(caps)) = code {
                    capabilities = caps;
                }
            }
            Response::Untagged(UntaggedResponse::Bye { text, .. }) => {
                return Err(Error::Bye(text));
            }
            other => {
                return Err(Error::Protocol(format!("unexpected greeting: {other:?}")));
            }
        }

        let mut client = Self {
            stream: framed,
            tag_gen: TagGenerator::default(),
            capabilities,
            state: NotAuthenticated,
        };
        if client.capabilities.is_empty() {
            client.capability().await?;
        }
        debug!(
            secure = client.is_secure(),
            capabilities = client.capabilities.len(),
            "greeting received"
        );
        Ok(client)
    }

    /// Upgrades the connection with STARTTLS and re-reads capabilities.
    ///
    /// Capabilities from before the upgrade are discarded (RFC 3501 §6.2.1).
    pub async fn starttls(mut self, host: &str) -> Result<Self> {
        if self.is_secure() {
            return Err(Error::InvalidState("transport is already secure".to_string()));
        }
        if !self.has_capability(&Capability::StartTls) {
            return Err(Error::StartTlsUnavailable);
        }

        let tag = self.send(&Command::StartTls).await?;
        let responses = self.stream.read_until_tagged(&tag).await?;
        check_tagged_ok(&responses, &tag)?;

        let io_timeout = self.stream.io_timeout();
        let secured = self.stream.into_inner().upgrade(host).await?;
        let mut framed = FramedStream::new(secured);
        if let Some(limit) = io_timeout {
            framed = framed.with_timeout(limit);
        }
        info!(host, "transport upgraded with STARTTLS");

        let mut client = Self {
            stream: framed,
            tag_gen: self.tag_gen,
            capabilities: Vec::new(),
            state: NotAuthenticated,
        };
        client.capability().await?;
        Ok(client)
    }

    /// Hands out the credential-capable view of this client, or returns it
    /// unchanged if the transport is not encrypted.
    pub fn into_secured(self) -> std::result::Result<SecuredClient<S>, Self> {
        if self.is_secure() {
            Ok(SecuredClient { inner: self })
        } else {
            Err(self)
        }
    }
}
