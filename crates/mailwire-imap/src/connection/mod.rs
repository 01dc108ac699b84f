//! IMAP connection management.
//!
//! - Configuration (host, port, security mode, timeouts)
//! - [`Transport`] and [`Connector`], the seam to the socket layer
//! - Framed I/O for the IMAP wire format
//! - Type-state client, including the secured pre-auth state
//! - IDLE support for server-pushed changes

mod client;
mod config;
mod framed;
mod idle;
mod stream;

pub use client::{Authenticated, Client, NotAuthenticated, SecuredClient, Selected};
pub use config::{ConfigBuilder, ConnectionConfig, Security};
pub use framed::{FramedStream, is_tagged_for};
pub use idle::{IdleEvent, IdleHandle};
pub use stream::{Connector, ImapStream, TcpConnector, Transport, create_tls_connector};
