//! Decoding of raw server responses into typed records.
//!
//! Every function here is pure and total: malformed input degrades to empty
//! or `None` fields instead of an error, and the anomaly is reported through
//! `tracing::trace!`. Inputs are exactly what
//! [`FramedStream::read_response`](crate::FramedStream::read_response) and
//! [`Client::execute`](crate::Client::execute) hand back: one byte buffer per
//! response, literals inlined.
//!
//! # Example
//!
//! ```
//! use mailwire_imap::decode::parse_folder_listing;
//!
//! let folder = parse_folder_listing(br#"* LIST (\HasNoChildren \Sent) "/" "[Gmail]/Sent Mail""#)
//!     .unwrap();
//! assert_eq!(folder.display_name, "Sent Mail");
//! assert!(folder.has_attribute("\\Sent"));
//! ```

mod body;
mod date;
mod folder;
mod header;
mod select;
pub(crate) mod sexp;
mod structure;
mod utf7;

pub use body::{AttachmentInfo, EmailBodyRecord, decode_body_record, extract_body_parts_by_section};
pub use date::parse_date;
pub use folder::{FolderInfo, parse_folder_listing};
pub use header::{EmailHeaderRecord, parse_header_records};
pub use select::{SelectMetadata, parse_flags, parse_search_uids, parse_select_metadata};
pub use structure::{BodyNode, BodyStructureNode, parse_body_structure, parse_body_tree};
pub use utf7::decode_mailbox_name;
