//! Command argument types.

use std::fmt;

use chrono::NaiveDate;

/// A set of UIDs in wire form (`1:4,7,9:*`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UidSet {
    ranges: Vec<(u32, Option<u32>)>,
}

impl UidSet {
    /// A single UID.
    #[must_use]
    pub fn single(uid: u32) -> Self {
        Self {
            ranges: vec![(uid, Some(uid))],
        }
    }

    /// An inclusive range; `None` as the end means "up to the highest UID".
    #[must_use]
    pub fn range(start: u32, end: Option<u32>) -> Self {
        Self {
            ranges: vec![(start, end)],
        }
    }

    /// Builds a compact set from arbitrary UIDs, collapsing consecutive runs.
    ///
    /// Returns `None` for an empty slice, since an empty set is not
    /// expressible on the wire.
    #[must_use]
    pub fn from_uids(uids: &[u32]) -> Option<Self> {
        let mut sorted = uids.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        let mut ranges: Vec<(u32, Option<u32>)> = Vec::new();
        for uid in sorted {
            match ranges.last_mut() {
                Some((_, Some(end))) if end.checked_add(1) == Some(uid) => *end = uid,
                _ => ranges.push((uid, Some(uid))),
            }
        }
        if ranges.is_empty() {
            None
        } else {
            Some(Self { ranges })
        }
    }
}

impl fmt::Display for UidSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (start, end)) in self.ranges.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            match end {
                Some(end) if end == start => write!(f, "{start}")?,
                Some(end) => write!(f, "{start}:{end}")?,
                None => write!(f, "{start}:*")?,
            }
        }
        Ok(())
    }
}

/// A FETCH data item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchAttribute {
    /// UID
    Uid,
    /// FLAGS
    Flags,
    /// INTERNALDATE
    InternalDate,
    /// RFC822.SIZE
    Rfc822Size,
    /// BODYSTRUCTURE
    BodyStructure,
    /// `BODY.PEEK[section]`, which does not set `\Seen`.
    BodyPeek(String),
}

impl FetchAttribute {
    /// The header-only fetch used for envelope sync.
    #[must_use]
    pub fn header_fields() -> Self {
        Self::BodyPeek(
            "HEADER.FIELDS (MESSAGE-ID IN-REPLY-TO REFERENCES FROM TO CC BCC SUBJECT DATE \
             AUTHENTICATION-RESULTS)"
                .to_string(),
        )
    }
}

/// SEARCH criteria the sync engine issues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchCriteria {
    /// All messages.
    All,
    /// Messages without `\Seen`.
    Unseen,
    /// Internal date on or after the given day.
    Since(NaiveDate),
    /// Messages with UIDs in the set.
    Uid(UidSet),
    /// All of the given criteria.
    And(Vec<Self>),
}
