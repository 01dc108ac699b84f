//! LIST / LSUB / XLIST rows.

use std::collections::BTreeSet;

use tracing::trace;

use super::select::SelectMetadata;
use super::sexp::{Node, parse_nodes};
use super::utf7::decode_mailbox_name;
use crate::types::MailboxAttribute;

/// A mailbox as discovered by LIST.
///
/// `uid_validity` is 0 until the folder has been selected; see
/// [`with_select_metadata`](Self::with_select_metadata).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderInfo {
    /// Final path segment, decoded from modified UTF-7.
    pub display_name: String,
    /// Full path as the server spells it; use this to SELECT.
    pub server_path: String,
    /// Attribute tags verbatim (`\HasNoChildren`, `\Sent`, ...).
    pub attribute_tags: BTreeSet<String>,
    /// Hierarchy delimiter; `None` for a flat namespace.
    pub delimiter: Option<char>,
    /// UIDVALIDITY from the last SELECT.
    pub uid_validity: u32,
    /// Message count from the last SELECT.
    pub message_count: u32,
}

impl FolderInfo {
    /// Returns a copy carrying the results of selecting this folder.
    #[must_use]
    pub fn with_select_metadata(&self, metadata: &SelectMetadata) -> Self {
        Self {
            uid_validity: metadata.uid_validity,
            message_count: metadata.message_count,
            ..self.clone()
        }
    }

    /// Returns true if the folder carries `tag`, ignoring case.
    #[must_use]
    pub fn has_attribute(&self, tag: &str) -> bool {
        self.attribute_tags
            .iter()
            .any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// Returns the attribute tags as typed values.
    #[must_use]
    pub fn attributes(&self) -> Vec<MailboxAttribute> {
        self.attribute_tags
            .iter()
            .map(|t| MailboxAttribute::parse(t))
            .collect()
    }

    /// Returns true unless the server marked the folder `\Noselect` or
    /// `\NonExistent`.
    #[must_use]
    pub fn is_selectable(&self) -> bool {
        !self.attributes().iter().any(MailboxAttribute::is_unselectable)
    }
}

/// Parses one `* LIST (attrs) "delim" path` row.
///
/// `LSUB` and `XLIST` rows are accepted too. The path may be quoted, an
/// atom or a literal. Anything else yields `None`.
#[must_use]
pub fn parse_folder_listing(line: &[u8]) -> Option<FolderInfo> {
    let nodes = parse_nodes(line);
    let mut iter = nodes.iter();

    if !iter.next().is_some_and(|n| n.is_atom("*")) {
        return None;
    }
    let kind = iter.next()?;
    if !(kind.is_atom("LIST") || kind.is_atom("LSUB") || kind.is_atom("XLIST")) {
        return None;
    }

    let Some(attrs) = iter.next().and_then(Node::list) else {
        trace!("listing without attribute group");
        return None;
    };
    let attribute_tags: BTreeSet<String> = attrs.iter().filter_map(Node::text).collect();

    let delimiter = match iter.next()? {
        Node::Nil => None,
        node => node.text().and_then(|s| s.chars().next()),
    };

    let Some(server_path) = iter.next().and_then(Node::text) else {
        trace!("listing without a path");
        return None;
    };

    let last_segment = match delimiter {
        Some(d) => server_path.rsplit(d).next().unwrap_or(server_path.as_str()),
        None => server_path.as_str(),
    };
    let display_name = decode_mailbox_name(last_segment);

    Some(FolderInfo {
        display_name,
        server_path,
        attribute_tags,
        delimiter,
        uid_validity: 0,
        message_count: 0,
    })
}
