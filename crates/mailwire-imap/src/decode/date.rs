//! Message and INTERNALDATE timestamps.

use chrono::{DateTime, FixedOffset};
use tracing::trace;

const FORMATS: &[&str] = &[
    "%a, %d %b %Y %H:%M:%S %z",
    "%d %b %Y %H:%M:%S %z",
    "%d-%b-%Y %H:%M:%S %z",
    "%a, %d %b %Y %H:%M %z",
    "%d %b %Y %H:%M %z",
];

/// Obsolete zone names from RFC 5322 §4.3.
const ZONES: &[(&str, &str)] = &[
    ("UT", "+0000"),
    ("GMT", "+0000"),
    ("UTC", "+0000"),
    ("Z", "+0000"),
    ("EST", "-0500"),
    ("EDT", "-0400"),
    ("CST", "-0600"),
    ("CDT", "-0500"),
    ("MST", "-0700"),
    ("MDT", "-0600"),
    ("PST", "-0800"),
    ("PDT", "-0700"),
];

/// Parses a `Date:` header or an INTERNALDATE value.
///
/// Tries the full RFC 2822 form, the form without a weekday, then the IMAP
/// INTERNALDATE form (`02-Jan-2024 10:00:00 +0000`). A trailing comment like
/// `(UTC)` and obsolete zone names are accepted.
#[must_use]
pub fn parse_date(text: &str) -> Option<DateTime<FixedOffset>> {
    let normalized = normalize(text);
    if normalized.is_empty() {
        return None;
    }

    let parsed = FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(&normalized, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc2822(&normalized).ok());
    if parsed.is_none() {
        trace!(text, "unparseable date");
    }
    parsed
}

fn normalize(text: &str) -> String {
    let mut s = text.trim();
    while s.ends_with(')') {
        match s.rfind('(') {
            Some(open) => s = s[..open].trim_end(),
            None => break,
        }
    }

    let mut words: Vec<String> = s.split_whitespace().map(str::to_string).collect();
    // Single-digit days: " 2-Jan-2024" in INTERNALDATE.
    if let Some(first) = words.first_mut()
        && first.len() == 10
        && first.as_bytes().get(1) == Some(&b'-')
    {
        first.insert(0, '0');
    }
    if let Some(last) = words.last_mut()
        && let Some((_, offset)) = ZONES
            .iter()
            .find(|(name, _)| last.eq_ignore_ascii_case(name))
    {
        *last = (*offset).to_string();
    }
    words.join(" ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Datelike, Timelike};

    use super::*;

    #[test]
    fn rfc2822_with_weekday() {
        let d = parse_date("Tue, 02 Jan 2024 10:00:00 +0100").unwrap();
        assert_eq!((d.year(), d.month(), d.day(), d.hour()), (2024, 1, 2, 10));
        assert_eq!(d.offset().local_minus_utc(), 3600);
    }

    #[test]
    fn without_weekday_and_single_digit_day() {
        let d = parse_date("2 Jan 2024 10:00:00 -0500").unwrap();
        assert_eq!(d.day(), 2);
    }

    #[test]
    fn internaldate_format() {
        let d = parse_date("02-Jan-2024 10:00:00 +0000").unwrap();
        assert_eq!(d.month(), 1);
        let d = parse_date(" 2-Jan-2024 10:00:00 +0000").unwrap();
        assert_eq!(d.day(), 2);
    }

    #[test]
    fn trailing_comment_and_obsolete_zone() {
        let d = parse_date("Tue, 02 Jan 2024 10:00:00 +0000 (UTC)").unwrap();
        assert_eq!(d.hour(), 10);
        let d = parse_date("Tue, 02 Jan 2024 10:00:00 PST").unwrap();
        assert_eq!(d.offset().local_minus_utc(), -8 * 3600);
        let d = parse_date("Tue, 02 Jan 2024 10:00:00 GMT").unwrap();
        assert_eq!(d.offset().local_minus_utc(), 0);
    }

    #[test]
    fn garbage_is_none() {
        assert!(parse_date("").is_none());
        assert!(parse_date("yesterday").is_none());
        assert!(parse_date("(just a comment)").is_none());
    }
}
