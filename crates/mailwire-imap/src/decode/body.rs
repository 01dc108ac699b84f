//! Body sections and body records.

use std::collections::BTreeMap;

use mailwire_mime::{decode_charset, decode_transfer};
use tracing::trace;

use super::sexp::{literal_header, quoted};
use super::structure::BodyStructureNode;

/// Decoded text content of one message plus its attachment list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailBodyRecord {
    /// Message UID.
    pub uid: u32,
    /// First non-attachment `text/plain` part.
    pub plain_text: Option<String>,
    /// First non-attachment `text/html` part.
    pub html_text: Option<String>,
    /// Attachments, in document order.
    pub attachments: Vec<AttachmentInfo>,
}

/// An attachment listed in a body record. The payload is not fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentInfo {
    /// Section number for a later `BODY[part_id]` fetch.
    pub part_id: String,
    /// File name, if the part declared one.
    pub filename: Option<String>,
    /// Lowercased `type/subtype`.
    pub mime_type: String,
    /// Encoded size in bytes.
    pub size_bytes: u64,
    /// `Content-ID`, for inline images.
    pub content_id: Option<String>,
}

impl From<&BodyStructureNode> for AttachmentInfo {
    fn from(part: &BodyStructureNode) -> Self {
        Self {
            part_id: part.part_id.clone(),
            filename: part.filename.clone(),
            mime_type: part.mime_type.clone(),
            size_bytes: part.size_bytes,
            content_id: part.content_id.clone(),
        }
    }
}

const MARKER: &[u8] = b"BODY[";

/// Collects every `BODY[section]` value in a FETCH response.
///
/// Literal values are taken by their declared length, so message bytes that
/// look like another section marker stay inside the value. Section names are
/// uppercased.
#[must_use]
pub fn extract_body_parts_by_section(response: &[u8]) -> BTreeMap<String, Vec<u8>> {
    let mut sections = BTreeMap::new();
    let mut pos = 0;

    while pos < response.len() {
        match response[pos] {
            b'{' => {
                pos = match literal_header(response, pos) {
                    Some((len, data)) => data.saturating_add(len).min(response.len()),
                    None => pos + 1,
                };
            }
            b'"' => pos = quoted(response, pos).1,
            _ if at_marker(response, pos) => {
                let (section, value, next) = read_section(response, pos + MARKER.len());
                sections.insert(section, value);
                pos = next;
            }
            _ => pos += 1,
        }
    }
    sections
}

fn at_marker(input: &[u8], pos: usize) -> bool {
    let boundary = pos == 0 || matches!(input[pos - 1], b' ' | b'(');
    boundary
        && input
            .get(pos..pos + MARKER.len())
            .is_some_and(|w| w.eq_ignore_ascii_case(MARKER))
}

/// Reads `section]<origin> value` starting just after `BODY[`.
fn read_section(input: &[u8], start: usize) -> (String, Vec<u8>, usize) {
    let close = input[start..]
        .iter()
        .position(|&b| b == b']')
        .map_or(input.len(), |i| start + i);
    let section = String::from_utf8_lossy(&input[start..close]).to_ascii_uppercase();

    let mut pos = (close + 1).min(input.len());
    if input.get(pos) == Some(&b'<') {
        pos = input[pos..]
            .iter()
            .position(|&b| b == b'>')
            .map_or(input.len(), |i| pos + i + 1);
    }
    while input.get(pos) == Some(&b' ') {
        pos += 1;
    }

    if let Some((len, data)) = literal_header(input, pos) {
        let end = data.saturating_add(len).min(input.len());
        if end - data < len {
            trace!(%section, expected = len, got = end - data, "truncated section literal");
        }
        return (section, input[data..end].to_vec(), end);
    }

    match input.get(pos) {
        Some(b'"') => {
            let (value, next) = quoted(input, pos);
            (section, value, next)
        }
        _ if input
            .get(pos..pos + 3)
            .is_some_and(|w| w.eq_ignore_ascii_case(b"NIL")) =>
        {
            (section, Vec::new(), pos + 3)
        }
        _ => {
            trace!(%section, "section value without length prefix");
            let end = scan_unprefixed(input, pos);
            (section, input[pos..end].to_vec(), end)
        }
    }
}

/// End of an unprefixed value: the next section marker or the closing
/// parenthesis of the FETCH list.
fn scan_unprefixed(input: &[u8], start: usize) -> usize {
    let mut pos = start;
    while pos < input.len() {
        if input[pos] == b' ' && at_marker(input, pos + 1) {
            return pos;
        }
        if input[pos] == b')' && matches!(input.get(pos + 1), None | Some(b'\r' | b'\n')) {
            return pos;
        }
        pos += 1;
    }
    pos
}

/// Pairs structure leaves with fetched sections and decodes the text parts.
///
/// A single-part message's text may arrive as `BODY[TEXT]` instead of
/// `BODY[1]`; both are accepted.
#[must_use]
pub fn decode_body_record(
    uid: u32,
    parts: &[BodyStructureNode],
    sections: &BTreeMap<String, Vec<u8>>,
) -> EmailBodyRecord {
    let single_part = parts.len() == 1;
    let content = |part: &BodyStructureNode| -> Option<String> {
        let raw = sections.get(&part.part_id).or_else(|| {
            single_part
                .then(|| sections.get("TEXT"))
                .flatten()
        });
        let Some(raw) = raw else {
            trace!(uid, part = %part.part_id, "text part was not fetched");
            return None;
        };
        let bytes = decode_transfer(raw, part.transfer_encoding);
        Some(decode_charset(&bytes, &part.charset))
    };
    let first_text = |mime: &str| {
        parts
            .iter()
            .filter(|p| !p.is_attachment && p.mime_type == mime)
            .find_map(&content)
    };

    EmailBodyRecord {
        uid,
        plain_text: first_text("text/plain"),
        html_text: first_text("text/html"),
        attachments: parts
            .iter()
            .filter(|p| p.is_attachment)
            .map(AttachmentInfo::from)
            .collect(),
    }
}
