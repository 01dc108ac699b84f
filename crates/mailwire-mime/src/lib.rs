//! # mailwire-mime
//!
//! MIME decoding helpers used by the IMAP response decoder.
//!
//! ## Features
//!
//! - **Transfer encodings**: Base64 and Quoted-Printable (RFC 2045), lenient
//!   about line breaks and stray whitespace the way real servers send them
//! - **Encoded words**: RFC 2047 `=?charset?B|Q?...?=` sequences anywhere in a
//!   header value, with adjacent-word whitespace collapsing
//! - **Charsets**: any WHATWG-registered label (KOI8-R, ISO-8859-x, ISO-2022-JP,
//!   Windows-125x, ...) to UTF-8
//! - **Header blocks**: unfolding of continuation lines, case-insensitive
//!   lookup, address-list splitting
//!
//! ## Quick Start
//!
//! ```
//! use mailwire_mime::{HeaderBlock, decode_header_value};
//!
//! let block = HeaderBlock::parse(b"Subject: =?utf-8?Q?H=C3=A9llo?=\r\n world\r\n\r\n");
//! let subject = block.get("subject").map(decode_header_value);
//! assert_eq!(subject.as_deref(), Some("Héllo world"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod charset;
pub mod encoding;
mod error;
pub mod header;

pub use charset::decode_charset;
pub use encoding::{
    TransferEncoding, decode_base64, decode_header_value, decode_quoted_printable,
    decode_transfer, encode_base64,
};
pub use error::{Error, Result};
pub use header::{HeaderBlock, split_address_list};
