//! Mailbox names and LIST attributes.

use std::fmt;

/// A mailbox name in its wire form (modified UTF-7 is not decoded).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Mailbox(String);

impl Mailbox {
    /// Wraps a wire name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// `INBOX`.
    #[must_use]
    pub fn inbox() -> Self {
        Self::new("INBOX")
    }

    /// The wire name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `INBOX` is case-insensitive; every other name is not.
    #[must_use]
    pub fn is_inbox(&self) -> bool {
        self.0.eq_ignore_ascii_case("INBOX")
    }
}

impl AsRef<str> for Mailbox {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Mailbox {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A flag from the attribute list of a LIST, LSUB or XLIST row.
///
/// Role attributes cover RFC 6154 SPECIAL-USE plus the older Gmail XLIST
/// spellings (`\AllMail`, `\Spam`, `\Starred`, `\Inbox`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MailboxAttribute {
    /// `\Noselect`
    NoSelect,
    /// `\NonExistent` (RFC 5258)
    NonExistent,
    /// `\HasNoChildren`
    HasNoChildren,
    /// `\HasChildren`
    HasChildren,
    /// `\Marked`
    Marked,
    /// `\Unmarked`
    Unmarked,
    /// `\Subscribed`
    Subscribed,
    /// `\All` or `\AllMail`
    All,
    /// `\Archive`
    Archive,
    /// `\Drafts`
    Drafts,
    /// `\Flagged` or `\Starred`
    Flagged,
    /// `\Junk` or `\Spam`
    Junk,
    /// `\Sent`
    Sent,
    /// `\Trash`
    Trash,
    /// `\Important` (RFC 8457)
    Important,
    /// `\Inbox`
    Inbox,
    /// Anything else, verbatim.
    Unknown(String),
}

const KNOWN: &[(&str, MailboxAttribute)] = &[
    ("\\NOSELECT", MailboxAttribute::NoSelect),
    ("\\NONEXISTENT", MailboxAttribute::NonExistent),
    ("\\HASNOCHILDREN", MailboxAttribute::HasNoChildren),
    ("\\HASCHILDREN", MailboxAttribute::HasChildren),
    ("\\MARKED", MailboxAttribute::Marked),
    ("\\UNMARKED", MailboxAttribute::Unmarked),
    ("\\SUBSCRIBED", MailboxAttribute::Subscribed),
    ("\\ALL", MailboxAttribute::All),
    ("\\ALLMAIL", MailboxAttribute::All),
    ("\\ARCHIVE", MailboxAttribute::Archive),
    ("\\DRAFTS", MailboxAttribute::Drafts),
    ("\\FLAGGED", MailboxAttribute::Flagged),
    ("\\STARRED", MailboxAttribute::Flagged),
    ("\\JUNK", MailboxAttribute::Junk),
    ("\\SPAM", MailboxAttribute::Junk),
    ("\\SENT", MailboxAttribute::Sent),
    ("\\TRASH", MailboxAttribute::Trash),
    ("\\IMPORTANT", MailboxAttribute::Important),
    ("\\INBOX", MailboxAttribute::Inbox),
];

impl MailboxAttribute {
    /// Maps a raw attribute, ignoring case. Never fails.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        KNOWN
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(raw))
            .map_or_else(|| Self::Unknown(raw.to_string()), |(_, attr)| attr.clone())
    }

    /// `\Noselect` and `\NonExistent` rows cannot be opened.
    #[must_use]
    pub const fn is_unselectable(&self) -> bool {
        matches!(self, Self::NoSelect | Self::NonExistent)
    }

    /// Whether the attribute names a folder role rather than a structural
    /// property.
    #[must_use]
    pub const fn is_role(&self) -> bool {
        matches!(
            self,
            Self::All
                | Self::Archive
                | Self::Drafts
                | Self::Flagged
                | Self::Junk
                | Self::Sent
                | Self::Trash
                | Self::Important
                | Self::Inbox
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbox_ignores_case_only_for_itself() {
        assert!(Mailbox::from("inbox").is_inbox());
        assert!(Mailbox::inbox().is_inbox());
        assert!(!Mailbox::new("INBOX/Receipts").is_inbox());
        assert_eq!(Mailbox::new("Archive").to_string(), "Archive");
    }

    #[test]
    fn xlist_spellings_fold_into_special_use() {
        for (raw, want) in [
            ("\\Sent", MailboxAttribute::Sent),
            ("\\JUNK", MailboxAttribute::Junk),
            ("\\Spam", MailboxAttribute::Junk),
            ("\\AllMail", MailboxAttribute::All),
            ("\\Starred", MailboxAttribute::Flagged),
            ("\\Inbox", MailboxAttribute::Inbox),
        ] {
            assert_eq!(MailboxAttribute::parse(raw), want, "{raw}");
            assert!(want.is_role());
        }
    }

    #[test]
    fn structural_flags() {
        assert!(MailboxAttribute::parse("\\Noselect").is_unselectable());
        assert!(MailboxAttribute::parse("\\NonExistent").is_unselectable());
        assert!(!MailboxAttribute::parse("\\HasChildren").is_unselectable());
        assert!(!MailboxAttribute::HasChildren.is_role());
    }

    #[test]
    fn unknown_keeps_original_text() {
        assert_eq!(
            MailboxAttribute::parse("\\X-Custom"),
            MailboxAttribute::Unknown("\\X-Custom".to_string())
        );
    }
}
