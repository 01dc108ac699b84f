//! Charset conversion to UTF-8.
//!
//! Labels resolve through the WHATWG registry in `encoding_rs`, so aliases
//! such as `latin1`, `cp1252` or `koi8r` work. A label nothing recognises is
//! decoded as UTF-8 with replacement characters, which keeps ASCII intact.

use encoding_rs::Encoding;
use tracing::trace;

/// Decodes `bytes` in the given charset label into a `String`.
///
/// Labels are matched case-insensitively. Never fails.
#[must_use]
pub fn decode_charset(bytes: &[u8], charset: &str) -> String {
    let label = charset.trim().trim_matches('"');
    let Some(encoding) = Encoding::for_label(label.as_bytes()) else {
        trace!(charset = label, "unrecognised charset, decoding as UTF-8");
        return String::from_utf8_lossy(bytes).into_owned();
    };
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_passthrough() {
        assert_eq!(decode_charset("héllo".as_bytes(), "UTF-8"), "héllo");
    }

    #[test]
    fn latin1() {
        assert_eq!(decode_charset(&[0x68, 0xE9], "ISO-8859-1"), "hé");
        assert_eq!(decode_charset(&[0x68, 0xE9], "\"latin1\""), "hé");
    }

    #[test]
    fn windows_1252_smart_quotes() {
        assert_eq!(decode_charset(&[0x93, 0x61, 0x94], "windows-1252"), "\u{201C}a\u{201D}");
    }

    #[test]
    fn cyrillic_koi8_r() {
        let bytes = [0xF0, 0xD2, 0xC9, 0xD7, 0xC5, 0xD4];
        assert_eq!(decode_charset(&bytes, "koi8-r"), "Привет");
        assert_eq!(decode_charset(&bytes, "KOI8-R"), "Привет");
    }

    #[test]
    fn central_european_iso_8859_2() {
        assert_eq!(decode_charset(&[0xA3, 0xF3, 0x64, 0xBC], "ISO-8859-2"), "Łódź");
    }

    #[test]
    fn stateful_iso_2022_jp() {
        let bytes = b"\x1b$BF|K\\8l\x1b(B";
        assert_eq!(decode_charset(bytes, "ISO-2022-JP"), "日本語");
    }

    #[test]
    fn unknown_charset_is_lossy_utf8() {
        assert_eq!(decode_charset(&[0x61, 0xFF], "x-unknown"), "a\u{FFFD}");
    }
}
