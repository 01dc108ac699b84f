//! Folder roles.
//!
//! [`classify`] maps a mailbox onto a [`FolderRole`] using three tiers, the
//! strongest first:
//!
//! 1. special-use attributes (`\Sent`, `\Junk`, ...)
//! 2. `INBOX`, then the provider's well-known paths
//! 3. a substring heuristic on the last path segment
//!
//! [`should_sync`] is a separate decision and does not look at the role.

use std::fmt;

use mailwire_imap::{FolderInfo, MailboxAttribute};
use mailwire_imap::decode::decode_mailbox_name;
use serde::{Deserialize, Serialize};

use crate::provider::ProviderProfile;

/// What a folder is for.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum FolderRole {
    /// Incoming mail.
    Inbox,
    /// Sent mail.
    Sent,
    /// Unsent drafts.
    Drafts,
    /// Deleted mail.
    Trash,
    /// Junk mail.
    Spam,
    /// Flagged messages (a virtual view on most servers).
    Starred,
    /// Archived or "all mail".
    Archive,
    /// Anything else.
    #[default]
    Custom,
}

impl FolderRole {
    /// Roles that at most one mailbox per account may hold.
    #[must_use]
    pub const fn is_exclusive(self) -> bool {
        matches!(
            self,
            Self::Inbox | Self::Sent | Self::Drafts | Self::Trash | Self::Spam
        )
    }

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inbox => "inbox",
            Self::Sent => "sent",
            Self::Drafts => "drafts",
            Self::Trash => "trash",
            Self::Spam => "spam",
            Self::Starred => "starred",
            Self::Archive => "archive",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for FolderRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which rule produced a role. Earlier variants are stronger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ClassificationTier {
    /// A special-use attribute.
    Attribute,
    /// `INBOX` or a provider well-known path.
    WellKnownPath,
    /// The name heuristic.
    NameHeuristic,
    /// Nothing matched.
    Fallback,
}

/// A role together with the tier that chose it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// The role.
    pub role: FolderRole,
    /// The rule that produced it.
    pub tier: ClassificationTier,
}

/// Attribute-to-role table, checked in order. XLIST spellings such as
/// `\AllMail` and `\Starred` arrive already folded by
/// [`MailboxAttribute::parse`].
const ATTRIBUTE_ROLES: &[(MailboxAttribute, FolderRole)] = &[
    (MailboxAttribute::Inbox, FolderRole::Inbox),
    (MailboxAttribute::Sent, FolderRole::Sent),
    (MailboxAttribute::Drafts, FolderRole::Drafts),
    (MailboxAttribute::Trash, FolderRole::Trash),
    (MailboxAttribute::Junk, FolderRole::Spam),
    (MailboxAttribute::All, FolderRole::Archive),
    (MailboxAttribute::Archive, FolderRole::Archive),
    (MailboxAttribute::Flagged, FolderRole::Starred),
];

/// Classifies a mailbox.
///
/// ```
/// use mailwire_core::folder::{FolderRole, classify};
/// use mailwire_core::provider::ProviderRegistry;
///
/// let generic = ProviderRegistry::built_in().generic();
/// assert_eq!(classify("[Gmail]/Sent Mail", &["\\Sent"], &generic), FolderRole::Sent);
/// assert_eq!(classify("Unread Receipts", &[] as &[&str], &generic), FolderRole::Custom);
/// ```
#[must_use]
pub fn classify<A: AsRef<str>>(
    path: &str,
    attributes: &[A],
    provider: &ProviderProfile,
) -> FolderRole {
    classify_detailed(path, attributes, provider).role
}

/// Classifies a mailbox and reports which tier decided.
#[must_use]
pub fn classify_detailed<A: AsRef<str>>(
    path: &str,
    attributes: &[A],
    provider: &ProviderProfile,
) -> Classification {
    let segment = decode_mailbox_name(last_segment(path));
    classify_parts(path, &segment, attributes.iter().map(AsRef::<str>::as_ref), provider)
}

/// Classifies a discovered folder, splitting on its declared delimiter.
#[must_use]
pub fn classify_folder(folder: &FolderInfo, provider: &ProviderProfile) -> Classification {
    classify_parts(
        &folder.server_path,
        &folder.display_name,
        folder.attribute_tags.iter().map(String::as_str),
        provider,
    )
}

fn classify_parts<'a>(
    path: &str,
    segment: &str,
    attributes: impl Iterator<Item = &'a str>,
    provider: &ProviderProfile,
) -> Classification {
    let attributes: Vec<MailboxAttribute> = attributes.map(MailboxAttribute::parse).collect();
    if let Some(role) = ATTRIBUTE_ROLES
        .iter()
        .find(|(attr, _)| attributes.contains(attr))
        .map(|(_, role)| *role)
    {
        return Classification {
            role,
            tier: ClassificationTier::Attribute,
        };
    }

    if path.eq_ignore_ascii_case("INBOX") {
        return Classification {
            role: FolderRole::Inbox,
            tier: ClassificationTier::WellKnownPath,
        };
    }
    if let Some(role) = provider.hint_for(path) {
        return Classification {
            role,
            tier: ClassificationTier::WellKnownPath,
        };
    }

    match name_heuristic(segment) {
        Some(role) => Classification {
            role,
            tier: ClassificationTier::NameHeuristic,
        },
        None => Classification {
            role: FolderRole::Custom,
            tier: ClassificationTier::Fallback,
        },
    }
}

/// Substring rules on the folder name. The first rule that matches wins.
fn name_heuristic(segment: &str) -> Option<FolderRole> {
    let name = segment.to_lowercase();
    let has = |needle: &str| name.contains(needle);
    let word = |needle: &str| {
        name.split(|c: char| !c.is_alphanumeric())
            .any(|w| w == needle)
    };

    if has("sent") {
        Some(FolderRole::Sent)
    } else if has("draft") {
        Some(FolderRole::Drafts)
    } else if has("trash") || has("deleted") || word("bin") {
        Some(FolderRole::Trash)
    } else if has("spam") || has("junk") || has("bulk") {
        Some(FolderRole::Spam)
    } else if has("archive") || has("all mail") {
        Some(FolderRole::Archive)
    } else if has("starred") || has("flagged") {
        Some(FolderRole::Starred)
    } else {
        None
    }
}

/// Last segment of `path`. The delimiter is unknown here, so `/` and `.`
/// both split.
fn last_segment(path: &str) -> &str {
    path.rsplit(['/', '.'])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(path)
}

/// Assigns roles to a whole folder list.
///
/// Inbox, sent, drafts, trash and spam go to at most one folder each: the
/// folder classified by the strongest tier keeps the role, ties go to the
/// earlier folder, and the rest become [`FolderRole::Custom`]. The result is
/// parallel to `folders`.
#[must_use]
pub fn assign_roles(folders: &[FolderInfo], provider: &ProviderProfile) -> Vec<FolderRole> {
    let classified: Vec<Classification> = folders
        .iter()
        .map(|f| classify_folder(f, provider))
        .collect();

    let mut winners: Vec<(FolderRole, usize)> = Vec::new();
    for (index, c) in classified.iter().enumerate() {
        if !c.role.is_exclusive() {
            continue;
        }
        match winners.iter_mut().find(|(role, _)| *role == c.role) {
            Some(winner) if c.tier < classified[winner.1].tier => winner.1 = index,
            Some(_) => {}
            None => winners.push((c.role, index)),
        }
    }

    classified
        .iter()
        .enumerate()
        .map(|(index, c)| {
            let keeps = !c.role.is_exclusive()
                || winners
                    .iter()
                    .any(|&(role, winner)| role == c.role && winner == index);
            if keeps { c.role } else { FolderRole::Custom }
        })
        .collect()
}

/// Returns true if the folder's messages should be synced.
///
/// Containers that cannot be selected, the `\Important` view, the label
/// provider's `\All` (XLIST `\AllMail`) view and the provider's excluded
/// paths are skipped.
#[must_use]
pub fn should_sync<A: AsRef<str>>(
    path: &str,
    attributes: &[A],
    provider: &ProviderProfile,
) -> bool {
    let attributes: Vec<MailboxAttribute> = attributes
        .iter()
        .map(|a| MailboxAttribute::parse(a.as_ref()))
        .collect();

    if attributes.iter().any(MailboxAttribute::is_unselectable) {
        return false;
    }
    if attributes.contains(&MailboxAttribute::Important) {
        return false;
    }
    if provider.labels_as_folders && attributes.contains(&MailboxAttribute::All) {
        return false;
    }
    !provider.is_excluded(path)
}

/// [`should_sync`] for a discovered folder.
#[must_use]
pub fn should_sync_folder(folder: &FolderInfo, provider: &ProviderProfile) -> bool {
    let attributes: Vec<&str> = folder.attribute_tags.iter().map(String::as_str).collect();
    should_sync(&folder.server_path, &attributes, provider)
}
