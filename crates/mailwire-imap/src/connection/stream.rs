//! Transports and connectors.
//!
//! [`Transport`] is the seam between the protocol client and the socket: the
//! client only needs a byte stream that knows whether it is secured and how
//! to upgrade itself in place. [`Connector`] opens one. Tests plug in
//! scripted transports; production uses [`TcpConnector`] and [`ImapStream`].

#![allow(clippy::missing_errors_doc)]

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tracing::debug;

use super::config::{ConnectionConfig, Security};
use crate::{Error, Result};

/// A byte stream the client can speak IMAP over.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send + Sized + 'static {
    /// Returns true once the stream is encrypted and the server verified.
    fn is_secure(&self) -> bool;

    /// Performs the TLS handshake on an established plaintext stream.
    fn upgrade(self, host: &str) -> impl Future<Output = Result<Self>> + Send;
}

/// Opens transports for a [`ConnectionConfig`].
pub trait Connector: Send + Sync + 'static {
    /// Stream type produced.
    type Stream: Transport;

    /// Connects, performing the TLS handshake first for implicit TLS.
    fn connect(
        &self,
        config: &ConnectionConfig,
    ) -> impl Future<Output = Result<Self::Stream>> + Send;
}

/// A stream that can be either plaintext or TLS.
pub enum ImapStream {
    /// Plaintext TCP stream.
    Plain(TcpStream),
    /// TLS-encrypted stream (boxed to reduce enum size).
    Tls(Box<TlsStream<TcpStream>>),
}

impl ImapStream {
    /// Returns true if the stream is TLS-encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

impl Transport for ImapStream {
    fn is_secure(&self) -> bool {
        self.is_tls()
    }

    async fn upgrade(self, host: &str) -> Result<Self> {
        match self {
            Self::Plain(tcp) => Ok(Self::Tls(Box::new(handshake(tcp, host).await?))),
            Self::Tls(_) => Err(Error::InvalidState("stream is already TLS".to_string())),
        }
    }
}

impl AsyncRead for ImapStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for ImapStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// Connects over TCP, bounded by the configured connect timeout.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Stream = ImapStream;

    async fn connect(&self, config: &ConnectionConfig) -> Result<ImapStream> {
        let attempt = async {
            let addr = config.authority();
            debug!(%addr, security = %config.security, "opening transport");
            let tcp = TcpStream::connect(&addr).await?;
            match config.security {
                Security::Implicit => Ok(ImapStream::Tls(Box::new(
                    handshake(tcp, &config.host).await?,
                ))),
                Security::StartTls | Security::None => Ok(ImapStream::Plain(tcp)),
            }
        };

        tokio::time::timeout(config.connect_timeout, attempt)
            .await
            .map_err(|_| Error::Timeout(config.connect_timeout))?
    }
}

/// Creates a TLS connector with the webpki root certificates.
#[must_use]
pub fn create_tls_connector() -> TlsConnector {
    let root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}

async fn handshake(tcp: TcpStream, host: &str) -> Result<TlsStream<TcpStream>> {
    let server_name = ServerName::try_from(host.to_string())?;
    create_tls_connector()
        .connect(server_name, tcp)
        .await
        .map_err(handshake_error)
}

/// Recovers the rustls error from a failed handshake so certificate
/// problems stay distinguishable from a dropped connection.
fn handshake_error(err: io::Error) -> Error {
    match err
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<rustls::Error>())
    {
        Some(tls) => Error::Tls(tls.clone()),
        None => Error::Handshake(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_error_keeps_certificate_failures() {
        let cert = rustls::Error::InvalidCertificate(rustls::CertificateError::Expired);
        let err = handshake_error(io::Error::new(io::ErrorKind::InvalidData, cert.clone()));
        assert!(matches!(err, Error::Tls(ref e) if *e == cert));
        assert!(err.is_untrusted_certificate());

        let reset = handshake_error(io::Error::from(io::ErrorKind::ConnectionReset));
        assert!(matches!(reset, Error::Handshake(_)));
        assert!(!reset.is_untrusted_certificate());
    }

    #[tokio::test]
    async fn connect_times_out() {
        // 192.0.2.0/24 is reserved for documentation and never routes.
        let config = ConnectionConfig::builder("192.0.2.1")
            .security(Security::None)
            .connect_timeout(std::time::Duration::from_millis(50))
            .build();
        let result = TcpConnector.connect(&config).await;
        assert!(matches!(
            result,
            Err(Error::Timeout(_) | Error::Io(_))
        ));
    }
}
