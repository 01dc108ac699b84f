//! MIME encoding and decoding utilities.
//!
//! Supports Base64, Quoted-Printable, and RFC 2047 header decoding.
//! Decoders are lenient: mail in the wild routinely violates line-length and
//! padding rules, and a bad byte must not lose the rest of the body.

use crate::charset::decode_charset;
use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decodes Base64 data, ignoring embedded whitespace and line breaks.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &[u8]) -> Result<Vec<u8>> {
    let compact: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    STANDARD.decode(compact).map_err(Into::into)
}

/// Decodes Quoted-Printable data (RFC 2045).
///
/// Soft line breaks are removed. Malformed escapes are kept verbatim.
#[must_use]
pub fn decode_quoted_printable(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        let byte = data[i];
        if byte != b'=' {
            result.push(byte);
            i += 1;
            continue;
        }

        // Soft line break
        match data.get(i + 1..i + 3) {
            Some([b'\r', b'\n']) => {
                i += 3;
                continue;
            }
            Some([b'\n', _]) => {
                i += 2;
                continue;
            }
            _ => {}
        }
        if data.get(i + 1) == Some(&b'\n') {
            i += 2;
            continue;
        }

        // Hex encoded byte
        match data.get(i + 1..i + 3).and_then(hex_byte) {
            Some(decoded) => {
                result.push(decoded);
                i += 3;
            }
            None => {
                result.push(b'=');
                i += 1;
            }
        }
    }

    result
}

fn hex_byte(pair: &[u8]) -> Option<u8> {
    let s = std::str::from_utf8(pair).ok()?;
    u8::from_str_radix(s, 16).ok()
}

/// Content-Transfer-Encoding of a MIME part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferEncoding {
    /// 7bit (default).
    #[default]
    SevenBit,
    /// 8bit.
    EightBit,
    /// binary.
    Binary,
    /// base64.
    Base64,
    /// quoted-printable.
    QuotedPrintable,
}

impl TransferEncoding {
    /// Parses an encoding label; unknown labels fall back to 7bit.
    #[must_use]
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "8bit" => Self::EightBit,
            "binary" => Self::Binary,
            _ => Self::SevenBit,
        }
    }
}

/// Undoes a transfer encoding.
///
/// Base64 that fails to decode is returned unchanged rather than dropped.
#[must_use]
pub fn decode_transfer(data: &[u8], encoding: TransferEncoding) -> Vec<u8> {
    match encoding {
        TransferEncoding::Base64 => decode_base64(data).unwrap_or_else(|_| data.to_vec()),
        TransferEncoding::QuotedPrintable => decode_quoted_printable(data),
        TransferEncoding::SevenBit | TransferEncoding::EightBit | TransferEncoding::Binary => {
            data.to_vec()
        }
    }
}

/// Decodes a single RFC 2047 encoded word.
///
/// Format: `=?charset?encoding?encoded-text?=`
///
/// # Errors
///
/// Returns an error if the input is not a well-formed encoded word.
pub fn decode_encoded_word(word: &str) -> Result<String> {
    let inner = word
        .strip_prefix("=?")
        .and_then(|w| w.strip_suffix("?="))
        .ok_or_else(|| Error::MalformedWord(word.to_string()))?;

    let mut parts = inner.splitn(3, '?');
    let (Some(charset), Some(encoding), Some(text)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(Error::MalformedWord(word.to_string()));
    };

    // RFC 2231 language suffix: charset*lang
    let charset = charset.split('*').next().unwrap_or(charset);

    let bytes = match encoding.to_ascii_uppercase().as_str() {
        "B" => decode_base64(text.as_bytes())?,
        "Q" => decode_quoted_printable(text.replace('_', " ").as_bytes()),
        other => return Err(Error::UnknownEncoding(other.to_string())),
    };

    Ok(decode_charset(&bytes, charset))
}

/// Decodes every encoded word inside a header value.
///
/// Whitespace between two adjacent encoded words is dropped as RFC 2047
/// requires; malformed words are left as they are. Never fails.
#[must_use]
pub fn decode_header_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    let mut pending_space = String::new();
    let mut last_was_word = false;

    while !rest.is_empty() {
        let Some(start) = rest.find("=?") else {
            out.push_str(&pending_space);
            out.push_str(rest);
            return out;
        };

        let (before, candidate) = rest.split_at(start);
        let Some(len) = encoded_word_len(candidate) else {
            out.push_str(&pending_space);
            out.push_str(before);
            out.push_str("=?");
            pending_space.clear();
            last_was_word = false;
            rest = &candidate[2..];
            continue;
        };

        let word = &candidate[..len];
        match decode_encoded_word(word) {
            Ok(decoded) => {
                let only_space = before.chars().all(char::is_whitespace);
                if !(last_was_word && only_space) {
                    out.push_str(&pending_space);
                    out.push_str(before);
                }
                out.push_str(&decoded);
                last_was_word = true;
            }
            Err(_) => {
                out.push_str(&pending_space);
                out.push_str(before);
                out.push_str(word);
                last_was_word = false;
            }
        }
        pending_space.clear();
        rest = &candidate[len..];

        // Hold trailing whitespace back until we know whether another word follows.
        let ws = rest.len() - rest.trim_start().len();
        if last_was_word && ws > 0 {
            pending_space.push_str(&rest[..ws]);
            rest = &rest[ws..];
        }
    }

    out.push_str(&pending_space);
    out
}

/// Length of the encoded word at the start of `s`, if one is there.
fn encoded_word_len(s: &str) -> Option<usize> {
    let body = s.strip_prefix("=?")?;
    // charset ? encoding ? text ?=
    let q1 = body.find('?')?;
    let after_charset = &body[q1 + 1..];
    let q2 = after_charset.find('?')?;
    if q2 != 1 {
        return None;
    }
    let text = &after_charset[q2 + 1..];
    let end = text.find("?=")?;
    if text[..end].contains(char::is_whitespace) {
        return None;
    }
    Some(2 + q1 + 1 + q2 + 1 + end + 2)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_encode_decode() {
        let data = b"Hello, World!";
        let encoded = encode_base64(data);
        assert_eq!(encoded, "SGVsbG8sIFdvcmxkIQ==");

        let decoded = decode_base64(encoded.as_bytes()).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_base64_with_line_breaks() {
        let decoded = decode_base64(b"SGVsbG8s\r\nIFdvcmxkIQ==\r\n").unwrap();
        assert_eq!(decoded, b"Hello, World!");
    }

    #[test]
    fn test_quoted_printable_decode() {
        assert_eq!(decode_quoted_printable(b"Hello, World!"), b"Hello, World!");
        assert_eq!(decode_quoted_printable(b"H=C3=A9llo"), "Héllo".as_bytes());
    }

    #[test]
    fn test_quoted_printable_soft_line_break() {
        assert_eq!(decode_quoted_printable(b"Hello=\r\nWorld"), b"HelloWorld");
        assert_eq!(decode_quoted_printable(b"Hello=\nWorld"), b"HelloWorld");
    }

    #[test]
    fn test_quoted_printable_malformed_escape_kept() {
        assert_eq!(decode_quoted_printable(b"50=ZZ off"), b"50=ZZ off");
    }

    #[test]
    fn test_transfer_encoding_parse() {
        assert_eq!(TransferEncoding::parse("BASE64"), TransferEncoding::Base64);
        assert_eq!(
            TransferEncoding::parse("Quoted-Printable"),
            TransferEncoding::QuotedPrintable
        );
        assert_eq!(TransferEncoding::parse("x-uuencode"), TransferEncoding::SevenBit);
    }

    #[test]
    fn test_decode_transfer_bad_base64_is_kept() {
        assert_eq!(decode_transfer(b"%%%", TransferEncoding::Base64), b"%%%");
    }

    #[test]
    fn test_rfc2047_decode() {
        assert_eq!(decode_encoded_word("=?utf-8?B?SMOpbGxv?=").unwrap(), "Héllo");
        assert_eq!(decode_encoded_word("=?utf-8?Q?H=C3=A9llo?=").unwrap(), "Héllo");
        assert_eq!(
            decode_encoded_word("=?ISO-8859-1?Q?caf=E9_au_lait?=").unwrap(),
            "café au lait"
        );
        assert!(decode_encoded_word("plain").is_err());
    }

    #[test]
    fn test_rfc2047_non_latin_charsets() {
        assert_eq!(decode_encoded_word("=?KOI8-R?B?8NLJ18XU?=").unwrap(), "Привет");
        assert_eq!(decode_encoded_word("=?ISO-8859-2?B?o/NkvA==?=").unwrap(), "Łódź");
        assert_eq!(
            decode_encoded_word("=?ISO-2022-JP?B?GyRCRnxLXDhsGyhC?=").unwrap(),
            "日本語"
        );
    }

    #[test]
    fn test_header_value_mixed() {
        assert_eq!(
            decode_header_value("Re: =?utf-8?Q?caf=C3=A9?= tonight"),
            "Re: café tonight"
        );
    }

    #[test]
    fn test_header_value_adjacent_words_join() {
        assert_eq!(
            decode_header_value("=?utf-8?Q?Hello_?= =?utf-8?Q?World?="),
            "Hello World"
        );
    }

    #[test]
    fn test_header_value_malformed_left_alone() {
        assert_eq!(decode_header_value("a =? b"), "a =? b");
        assert_eq!(decode_header_value("plain subject"), "plain subject");
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn header_without_encoded_words_is_unchanged(s in "[^=]{0,64}") {
                prop_assert_eq!(decode_header_value(&s), s);
            }

            #[test]
            fn header_decode_never_panics(s in "\\PC{0,96}") {
                let _ = decode_header_value(&s);
            }

            #[test]
            fn quoted_printable_without_escapes_is_identity(data in proptest::collection::vec(any::<u8>().prop_filter("no =", |b| *b != b'='), 0..128)) {
                prop_assert_eq!(decode_quoted_printable(&data), data);
            }
        }
    }
}
