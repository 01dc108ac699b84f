//! Modified UTF-7 mailbox names (RFC 3501 §5.1.3).

use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use tracing::trace;
use utf7_imap::decode_utf7_imap;

/// Decodes a modified UTF-7 mailbox name to UTF-8.
///
/// `&-` is a literal ampersand; `&...-` holds UTF-16BE in base64 with `,`
/// in place of `/`. Input that does not decode is returned verbatim.
///
/// ```
/// use mailwire_imap::decode::decode_mailbox_name;
///
/// assert_eq!(decode_mailbox_name("Entw&APw-rfe"), "Entwürfe");
/// assert_eq!(decode_mailbox_name("Q&-A"), "Q&A");
/// ```
#[must_use]
pub fn decode_mailbox_name(raw: &str) -> String {
    try_decode(raw).unwrap_or_else(|| {
        trace!(raw, "mailbox name is not valid modified UTF-7");
        raw.to_string()
    })
}

/// Hands each shifted segment to `utf7_imap` on its own.
///
/// `utf7_imap` panics on a segment it cannot decode, so every segment is
/// checked before it is handed over.
fn try_decode(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let dash = after.find('-')?;
        let segment = &after[..dash];
        if segment.is_empty() {
            out.push('&');
        } else if is_utf16_segment(segment) {
            out.push_str(&decode_utf7_imap(format!("&{segment}-")));
        } else {
            return None;
        }
        rest = &after[dash + 1..];
    }
    out.push_str(rest);
    Some(out)
}

fn is_utf16_segment(segment: &str) -> bool {
    let Ok(bytes) = STANDARD_NO_PAD.decode(segment.replace(',', "/")) else {
        return false;
    };
    if bytes.len() % 2 != 0 {
        return false;
    }
    let units = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
    char::decode_utf16(units).all(|unit| unit.is_ok())
}
