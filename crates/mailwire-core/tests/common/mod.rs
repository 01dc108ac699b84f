//! Scripted transports shared by the integration tests.

#![allow(dead_code, clippy::unwrap_used)]

use std::io;
use std::pin::Pin;
use std::sync::Mutex;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio_test::io::Mock;

use mailwire_imap::{ConnectionConfig, Connector, Error, Transport};

/// `\0user@example.com\0app-secret`, base64.
pub const PLAIN_IR: &str = "AHVzZXJAZXhhbXBsZS5jb20AYXBwLXNlY3JldA==";

/// Mock transport. `upgrade` swaps in the post-handshake script.
pub struct Scripted {
    io: Mock,
    secure: bool,
    after_upgrade: Option<Mock>,
}

impl Scripted {
    pub fn plain(io: Mock) -> Self {
        Self {
            io,
            secure: false,
            after_upgrade: None,
        }
    }

    pub fn tls(io: Mock) -> Self {
        Self {
            io,
            secure: true,
            after_upgrade: None,
        }
    }

    pub fn upgradable(io: Mock, after: Mock) -> Self {
        Self {
            io,
            secure: false,
            after_upgrade: Some(after),
        }
    }
}

impl Transport for Scripted {
    fn is_secure(&self) -> bool {
        self.secure
    }

    async fn upgrade(self, _host: &str) -> mailwire_imap::Result<Self> {
        match self.after_upgrade {
            Some(io) => Ok(Self::tls(io)),
            None => Err(Error::Handshake("no TLS script".to_string())),
        }
    }
}

impl AsyncRead for Scripted {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().io).poll_read(cx, buf)
    }
}

impl AsyncWrite for Scripted {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().io).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().io).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().io).poll_shutdown(cx)
    }
}

/// Hands out pre-built transports in order.
pub struct ScriptedConnector(Mutex<Vec<Scripted>>);

impl ScriptedConnector {
    pub fn new(streams: Vec<Scripted>) -> Self {
        let mut streams = streams;
        streams.reverse();
        Self(Mutex::new(streams))
    }

    pub fn one(stream: Scripted) -> Self {
        Self::new(vec![stream])
    }
}

impl Connector for ScriptedConnector {
    type Stream = Scripted;

    async fn connect(&self, _config: &ConnectionConfig) -> mailwire_imap::Result<Scripted> {
        let stream = self.0.lock().ok().and_then(|mut streams| streams.pop());
        stream.ok_or_else(|| Error::Protocol("no scripted connection left".to_string()))
    }
}
