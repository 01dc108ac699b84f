//! Commands this client sends.
//!
//! The set is closed: negotiation, folder listing, selection, UID search
//! and fetch, and IDLE.

mod serialize;
mod tag_generator;
mod types;

use crate::types::Mailbox;

pub use tag_generator::TagGenerator;
pub use types::{FetchAttribute, SearchCriteria, UidSet};

use serialize::Line;

/// IMAP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // Any state
    /// CAPABILITY command.
    Capability,
    /// NOOP command.
    Noop,
    /// LOGOUT command.
    Logout,

    // Not authenticated
    /// STARTTLS command.
    StartTls,
    /// LOGIN command.
    Login {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
    /// AUTHENTICATE command.
    Authenticate {
        /// SASL mechanism name.
        mechanism: String,
        /// Base64 initial response sent inline (SASL-IR).
        initial_response: Option<String>,
    },

    // Authenticated
    /// LIST command.
    List {
        /// Reference name.
        reference: String,
        /// Mailbox pattern.
        pattern: String,
    },
    /// XLIST command (pre-SPECIAL-USE Gmail).
    Xlist {
        /// Reference name.
        reference: String,
        /// Mailbox pattern.
        pattern: String,
    },
    /// SELECT command.
    Select {
        /// Mailbox to select.
        mailbox: Mailbox,
    },
    /// EXAMINE command (read-only SELECT).
    Examine {
        /// Mailbox to examine.
        mailbox: Mailbox,
    },

    // Selected
    /// CLOSE command.
    Close,
    /// UID SEARCH command.
    UidSearch {
        /// Search criteria.
        criteria: SearchCriteria,
    },
    /// UID FETCH command.
    UidFetch {
        /// UIDs to fetch.
        uids: UidSet,
        /// Items to fetch.
        items: Vec<FetchAttribute>,
    },
    /// IDLE command.
    Idle,
    /// DONE (ends IDLE; sent without a tag).
    Done,
}

impl Command {
    /// Encodes the command under `tag`, CRLF included. `DONE` is untagged.
    #[must_use]
    pub fn serialize(&self, tag: &str) -> Vec<u8> {
        if matches!(self, Self::Done) {
            return b"DONE\r\n".to_vec();
        }

        let mut line = Line::tagged(tag, self.name());
        match self {
            Self::Login { username, password } => {
                line.astring(username).astring(password);
            }
            Self::Authenticate {
                mechanism,
                initial_response,
            } => {
                line.raw(mechanism);
                // RFC 4959 spells an empty initial response as "=".
                match initial_response.as_deref() {
                    Some("") => {
                        line.raw("=");
                    }
                    Some(ir) => {
                        line.raw(ir);
                    }
                    None => {}
                }
            }
            Self::List { reference, pattern }
            | Self::Xlist { reference, pattern } => {
                line.astring(reference).pattern(pattern);
            }
            Self::Select { mailbox } | Self::Examine { mailbox } => {
                line.astring(mailbox.as_str());
            }
            Self::UidSearch { criteria } => {
                line.search(criteria);
            }
            Self::UidFetch { uids, items } => {
                line.raw(&uids.to_string()).fetch_items(items);
            }
            Self::Capability
            | Self::Noop
            | Self::Logout
            | Self::StartTls
            | Self::Close
            | Self::Idle
            | Self::Done => {}
        }
        line.finish()
    }

    /// Whether the encoded line carries a secret and must not be logged.
    #[must_use]
    pub const fn is_sensitive(&self) -> bool {
        matches!(self, Self::Login { .. } | Self::Authenticate { .. })
    }

    /// Keyword(s) without arguments.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Capability => "CAPABILITY",
            Self::Noop => "NOOP",
            Self::Logout => "LOGOUT",
            Self::StartTls => "STARTTLS",
            Self::Login { .. } => "LOGIN",
            Self::Authenticate { .. } => "AUTHENTICATE",
            Self::List { .. } => "LIST",
            Self::Xlist { .. } => "XLIST",
            Self::Select { .. } => "SELECT",
            Self::Examine { .. } => "EXAMINE",
            Self::Close => "CLOSE",
            Self::UidSearch { .. } => "UID SEARCH",
            Self::UidFetch { .. } => "UID FETCH",
            Self::Idle => "IDLE",
            Self::Done => "DONE",
        }
    }
}
