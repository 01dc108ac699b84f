//! Type-state markers for client connection states.
//!
//! `Selected` is the only state that carries data: the mailbox it was
//! entered with and what SELECT reported about it.

use crate::decode::SelectMetadata;
use crate::types::Mailbox;

/// Connected and greeted; only negotiation commands are valid.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotAuthenticated;

/// Logged in; mailbox-level commands are valid.
#[derive(Debug, Clone, Copy, Default)]
pub struct Authenticated;

/// A mailbox is open.
#[derive(Debug, Clone)]
pub struct Selected {
    pub(crate) mailbox: Mailbox,
    pub(crate) read_only: bool,
    pub(crate) metadata: SelectMetadata,
}

impl Selected {
    /// Returns the selected mailbox.
    #[must_use]
    pub const fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    /// Returns true if the mailbox was opened with EXAMINE.
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Returns what the server reported when the mailbox was opened.
    #[must_use]
    pub const fn metadata(&self) -> &SelectMetadata {
        &self.metadata
    }
}
