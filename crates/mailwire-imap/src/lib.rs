//! # mailwire-imap
//!
//! The IMAP side of the mailwire protocol layer: wire framing, a type-state
//! client that negotiates STARTTLS and SASL, and a tolerant decoder that
//! turns raw server responses into typed records.
//!
//! ## Features
//!
//! - **Type-state connection management**: credentials can only be written
//!   through a [`SecuredClient`], which only exists over an encrypted
//!   transport
//! - **Pluggable transports**: the client runs over any [`Transport`]; the
//!   default [`TcpConnector`] speaks TCP + rustls
//! - **SASL**: PLAIN, XOAUTH2 and OAUTHBEARER with or without SASL-IR
//! - **IDLE support**: server-pushed changes via RFC 2177
//! - **Tolerant decoding**: [`decode`] never fails on malformed input
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailwire_imap::{Client, ConnectionConfig, Security, TcpConnector};
//! use mailwire_oauth::SaslMechanism;
//!
//! #[tokio::main]
//! async fn main() -> mailwire_imap::Result<()> {
//!     let config = ConnectionConfig::builder("imap.example.com")
//!         .security(Security::StartTls)
//!         .build();
//!     let client = Client::connect(&TcpConnector, &config).await?;
//!     let client = client.starttls(&config.host).await?;
//!
//!     let Ok(secured) = client.into_secured() else {
//!         unreachable!("STARTTLS succeeded");
//!     };
//!     let mut client = secured
//!         .authenticate(SaslMechanism::Plain, "user@example.com", "app-password")
//!         .await?;
//!
//!     for folder in client.list("", "*").await? {
//!         println!("{} ({})", folder.display_name, folder.server_path);
//!     }
//!
//!     let (mut inbox, meta) = client.select("INBOX").await?;
//!     println!("{} messages, UIDVALIDITY {}", meta.message_count, meta.uid_validity);
//!     inbox.logout().await
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! NotAuthenticated ── starttls() ──→ NotAuthenticated (secure)
//!        │
//!   into_secured()
//!        ▼
//!  SecuredClient ── authenticate()/login() ──→ Authenticated
//!                                                  │
//!                                          select()/examine()
//!                                                  ▼
//!                                              Selected ── close() ──→ Authenticated
//! ```
//!
//! ## Modules
//!
//! - [`command`]: command builders and serialization
//! - [`connection`]: transports, framing and the type-state client
//! - [`decode`]: response decoder (folders, headers, bodies, structures)
//! - [`parser`]: sans-I/O status-line parser
//! - [`types`]: capabilities, response codes, mailbox names

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
pub mod decode;
mod error;
pub mod parser;
pub mod types;

pub use command::{Command, FetchAttribute, SearchCriteria, TagGenerator, UidSet};
pub use connection::{
    Authenticated, Client, ConfigBuilder, ConnectionConfig, Connector, FramedStream, IdleEvent,
    IdleHandle, ImapStream, NotAuthenticated, SecuredClient, Security, Selected, TcpConnector,
    Transport,
};
pub use decode::{FolderInfo, SelectMetadata};
pub use error::{Error, Result};
pub use parser::{Response, ResponseParser, UntaggedResponse};
pub use types::{Capability, Mailbox, MailboxAttribute, ResponseCode, Status, Tag};
