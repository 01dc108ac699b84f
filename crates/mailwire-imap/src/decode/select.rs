//! SELECT/EXAMINE results, SEARCH results and flag lists.

use std::collections::BTreeSet;

use tracing::trace;

/// What SELECT or EXAMINE reported about a mailbox.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectMetadata {
    /// UIDVALIDITY epoch; 0 when the server did not send one.
    pub uid_validity: u32,
    /// Message count from `* n EXISTS`.
    pub message_count: u32,
    /// Predicted next UID.
    pub uid_next: Option<u32>,
}

/// Extracts mailbox metadata from SELECT/EXAMINE responses.
pub fn parse_select_metadata(lines: &[impl AsRef<[u8]>]) -> SelectMetadata {
    let mut meta = SelectMetadata::default();
    let mut saw_validity = false;
    let mut saw_exists = false;

    for raw in lines {
        let line = String::from_utf8_lossy(raw.as_ref());
        let line = line.trim_end();
        let upper = line.to_ascii_uppercase();

        if !saw_validity && let Some(n) = number_after(line, &upper, "UIDVALIDITY") {
            meta.uid_validity = n;
            saw_validity = true;
        }
        if meta.uid_next.is_none() {
            meta.uid_next = number_after(line, &upper, "UIDNEXT");
        }
        if !saw_exists
            && upper.ends_with(" EXISTS")
            && let Some(n) = line
                .split_whitespace()
                .rev()
                .nth(1)
                .and_then(|s| s.parse().ok())
        {
            meta.message_count = n;
            saw_exists = true;
        }
    }

    if !saw_validity {
        trace!("no UIDVALIDITY in select responses");
    }
    meta
}

/// First run of digits after `marker`.
fn number_after(line: &str, upper: &str, marker: &str) -> Option<u32> {
    let start = upper.find(marker)? + marker.len();
    let digits: String = line[start..]
        .trim_start()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

/// Collects UIDs from `* SEARCH` responses.
///
/// Non-numeric tokens are skipped and a trailing `(MODSEQ n)` is ignored.
pub fn parse_search_uids(lines: &[impl AsRef<[u8]>]) -> Vec<u32> {
    let mut uids = Vec::new();
    for raw in lines {
        let line = String::from_utf8_lossy(raw.as_ref());
        let mut words = line.split_whitespace();
        if words.next() != Some("*")
            || !words.next().is_some_and(|w| w.eq_ignore_ascii_case("SEARCH"))
        {
            continue;
        }
        for word in words {
            if word.starts_with('(') {
                break;
            }
            match word.parse() {
                Ok(uid) => uids.push(uid),
                Err(_) => trace!(word, "non-numeric search token"),
            }
        }
    }
    uids
}

/// Parses a flag list like `(\Seen $Forwarded)`.
///
/// Surrounding parentheses are optional; an empty list is an empty set.
#[must_use]
pub fn parse_flags(text: &str) -> BTreeSet<String> {
    text.trim()
        .trim_start_matches('(')
        .trim_end_matches(')')
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_metadata() {
        let lines: &[&[u8]] = &[
            b"* FLAGS (\\Answered \\Flagged \\Deleted \\Seen \\Draft)",
            b"* 172 EXISTS",
            b"* 1 RECENT",
            b"* OK [UNSEEN 12] Message 12 is first unseen",
            b"* OK [UIDVALIDITY 3857529045] UIDs valid",
            b"* OK [UIDNEXT 4392] Predicted next UID",
            b"A0002 OK [READ-WRITE] SELECT completed",
        ];
        let meta = parse_select_metadata(lines);
        assert_eq!(
            meta,
            SelectMetadata {
                uid_validity: 3_857_529_045,
                message_count: 172,
                uid_next: Some(4392),
            }
        );
    }

    #[test]
    fn select_metadata_defaults() {
        let lines: Vec<Vec<u8>> = vec![b"A1 OK done".to_vec()];
        assert_eq!(parse_select_metadata(&lines), SelectMetadata::default());
    }

    #[test]
    fn first_exists_wins() {
        let lines: &[&[u8]] = &[b"* 5 EXISTS\r\n", b"* 7 EXISTS\r\n"];
        assert_eq!(parse_select_metadata(lines).message_count, 5);
    }

    #[test]
    fn search_uids() {
        let lines: &[&[u8]] = &[
            b"* SEARCH 2 84 882\r\n",
            b"* SEARCH 4 x 5 (MODSEQ 917162500)\r\n",
            b"A1 OK SEARCH completed\r\n",
        ];
        assert_eq!(parse_search_uids(lines), vec![2, 84, 882, 4, 5]);
    }

    #[test]
    fn search_without_matches() {
        let lines: &[&[u8]] = &[b"* SEARCH\r\n", b"A1 OK\r\n"];
        assert!(parse_search_uids(lines).is_empty());
    }

    #[test]
    fn flags() {
        let flags = parse_flags("(\\Seen \\Flagged $Forwarded)");
        assert_eq!(flags.len(), 3);
        assert!(flags.contains("\\Seen"));
        assert!(parse_flags("()").is_empty());
        assert!(parse_flags("").is_empty());
    }
}
