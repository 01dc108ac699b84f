//! Header records from `UID FETCH (UID FLAGS ... BODY.PEEK[HEADER...])`.

use std::collections::BTreeSet;

use chrono::{DateTime, FixedOffset};
use mailwire_mime::{HeaderBlock, decode_header_value, split_address_list};
use tracing::trace;

use super::date::parse_date;
use super::sexp::{Node, literal_header, parse_nodes, quoted};

/// The bookkeeping view of one message.
///
/// `uid` is only meaningful together with the folder's UIDVALIDITY.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailHeaderRecord {
    /// Message UID.
    pub uid: u32,
    /// `Message-ID`.
    pub message_id: Option<String>,
    /// `In-Reply-To`.
    pub in_reply_to: Option<String>,
    /// `References`, one entry per message id.
    pub references: Vec<String>,
    /// `From`, decoded.
    pub from: Option<String>,
    /// `To` addresses.
    pub to: Vec<String>,
    /// `Cc` addresses.
    pub cc: Vec<String>,
    /// `Bcc` addresses.
    pub bcc: Vec<String>,
    /// `Subject`, decoded.
    pub subject: Option<String>,
    /// `Date`, falling back to INTERNALDATE.
    pub date: Option<DateTime<FixedOffset>>,
    /// IMAP flags.
    pub flags: BTreeSet<String>,
    /// `RFC822.SIZE`.
    pub size_bytes: u64,
    /// `Authentication-Results`.
    pub auth_results: Option<String>,
}

/// Decodes FETCH responses into header records.
///
/// Each input buffer may hold one or several `* n FETCH` responses. Message
/// bytes inside literals never start a new record. Responses without a UID
/// are skipped.
pub fn parse_header_records(lines: &[impl AsRef<[u8]>]) -> Vec<EmailHeaderRecord> {
    lines
        .iter()
        .flat_map(|raw| split_fetch_fragments(raw.as_ref()))
        .filter_map(parse_fragment)
        .collect()
}

/// Splits a buffer at lines starting with `* n FETCH`, skipping over
/// literals and quoted strings.
fn split_fetch_fragments(input: &[u8]) -> Vec<&[u8]> {
    let mut fragments = Vec::new();
    let mut start = None;
    let mut pos = 0;
    let mut line_start = true;

    while pos < input.len() {
        if line_start && starts_fetch(&input[pos..]) {
            if let Some(s) = start {
                fragments.push(&input[s..pos]);
            }
            start = Some(pos);
        }
        line_start = false;

        match input[pos] {
            b'{' => {
                if let Some((len, data)) = literal_header(input, pos) {
                    pos = data.saturating_add(len).min(input.len());
                } else {
                    pos += 1;
                }
            }
            b'"' => pos = quoted(input, pos).1,
            b'\n' => {
                pos += 1;
                line_start = true;
            }
            _ => pos += 1,
        }
    }
    if let Some(s) = start {
        fragments.push(&input[s..]);
    }
    fragments
}

fn starts_fetch(line: &[u8]) -> bool {
    let Some(rest) = line.strip_prefix(b"* ") else {
        return false;
    };
    let digits = rest.iter().take_while(|b| b.is_ascii_digit()).count();
    digits > 0
        && rest
            .get(digits..digits + 7)
            .is_some_and(|w| w.eq_ignore_ascii_case(b" FETCH "))
}

fn parse_fragment(fragment: &[u8]) -> Option<EmailHeaderRecord> {
    let nodes = parse_nodes(fragment);
    let Some(items) = nodes.iter().find_map(Node::list) else {
        trace!("FETCH response without item list");
        return None;
    };

    let mut uid = None;
    let mut record = EmailHeaderRecord::default();
    let mut internal_date = None;
    let mut header = None;

    let mut iter = items.iter();
    while let Some(key) = iter.next() {
        let Node::Atom(name) = key else {
            trace!(?key, "unexpected FETCH item");
            continue;
        };
        let Some(value) = iter.next() else {
            trace!(%name, "FETCH item without value");
            break;
        };
        let name = name.to_ascii_uppercase();
        match name.as_str() {
            "UID" => uid = value.number().and_then(|n| u32::try_from(n).ok()),
            "FLAGS" => {
                record.flags = value
                    .list()
                    .map(|flags| flags.iter().filter_map(Node::text).collect())
                    .unwrap_or_default();
            }
            "RFC822.SIZE" => record.size_bytes = value.number().unwrap_or(0),
            "INTERNALDATE" => internal_date = value.text().as_deref().and_then(parse_date),
            _ if is_header_item(&name) => header = value.bytes(),
            _ => trace!(%name, "ignoring FETCH item"),
        }
    }

    let Some(uid) = uid else {
        trace!("FETCH response without UID");
        return None;
    };
    record.uid = uid;

    if let Some(raw) = header {
        apply_headers(&mut record, &HeaderBlock::parse(&raw));
    }
    if record.date.is_none() {
        record.date = internal_date;
    }
    Some(record)
}

fn is_header_item(name: &str) -> bool {
    name.starts_with("BODY[HEADER")
        || name.starts_with("BODY.PEEK[HEADER")
        || name == "BODY[]"
        || name == "RFC822.HEADER"
        || name == "RFC822"
}

fn apply_headers(record: &mut EmailHeaderRecord, block: &HeaderBlock) {
    let single = |name: &str| {
        block
            .get(name)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    let decoded = |name: &str| single(name).map(|v| decode_header_value(&v));
    let addresses = |name: &str| {
        block
            .get_all(name)
            .into_iter()
            .flat_map(split_address_list)
            .map(|a| decode_header_value(&a))
            .collect::<Vec<_>>()
    };

    record.message_id = single("Message-ID");
    record.in_reply_to = single("In-Reply-To");
    record.references = block
        .get("References")
        .map(|v| v.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();
    record.from = decoded("From");
    record.to = addresses("To");
    record.cc = addresses("Cc");
    record.bcc = addresses("Bcc");
    record.subject = decoded("Subject");
    record.date = block.get("Date").and_then(parse_date);
    record.auth_results = single("Authentication-Results");
}
