//! Status-line parsing, independent of any socket.
//!
//! [`Lexer`] splits a line into tokens; [`ResponseParser`] turns a framed
//! response into a tagged completion, an untagged condition, a
//! continuation request or raw data for [`crate::decode`].
//!
//! ```
//! use mailwire_imap::parser::{Response, ResponseParser, UntaggedResponse};
//!
//! let greeting = ResponseParser::parse(b"* OK IMAP4rev1 server ready\r\n").unwrap();
//! let Response::Untagged(UntaggedResponse::Ok { text, .. }) = greeting else {
//!     panic!("greeting should be an untagged OK");
//! };
//! assert_eq!(text, "IMAP4rev1 server ready");
//! ```

pub mod lexer;
pub mod response;

pub use lexer::{Lexer, Token};
pub use response::{Response, ResponseParser, UntaggedResponse};
