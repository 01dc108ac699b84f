//! Wire encoding of command arguments.

use super::types::{FetchAttribute, SearchCriteria};

/// Accumulates one command line.
pub(super) struct Line {
    buf: Vec<u8>,
}

impl Line {
    pub(super) fn tagged(tag: &str, keyword: &str) -> Self {
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(tag.as_bytes());
        buf.push(b' ');
        buf.extend_from_slice(keyword.as_bytes());
        Self { buf }
    }

    /// Appends ` ` and then `raw` unchanged.
    pub(super) fn raw(&mut self, raw: &str) -> &mut Self {
        self.buf.push(b' ');
        self.buf.extend_from_slice(raw.as_bytes());
        self
    }

    /// Appends an astring: bare when it is a valid atom, quoted otherwise.
    pub(super) fn astring(&mut self, value: &str) -> &mut Self {
        self.buf.push(b' ');
        if is_bare_atom(value, false) {
            self.buf.extend_from_slice(value.as_bytes());
        } else {
            self.quoted(value);
        }
        self
    }

    /// Appends a LIST pattern. `%` and `*` stay bare.
    pub(super) fn pattern(&mut self, pattern: &str) -> &mut Self {
        self.buf.push(b' ');
        if is_bare_atom(pattern, true) {
            self.buf.extend_from_slice(pattern.as_bytes());
        } else {
            self.quoted(pattern);
        }
        self
    }

    pub(super) fn fetch_items(&mut self, items: &[FetchAttribute]) -> &mut Self {
        let names: Vec<String> = items.iter().map(fetch_item).collect();
        self.raw(&format!("({})", names.join(" ")))
    }

    pub(super) fn search(&mut self, criteria: &SearchCriteria) -> &mut Self {
        let mut keys = Vec::new();
        search_keys(criteria, &mut keys);
        if keys.is_empty() {
            keys.push("ALL".to_string());
        }
        self.raw(&keys.join(" "))
    }

    pub(super) fn finish(mut self) -> Vec<u8> {
        self.buf.extend_from_slice(b"\r\n");
        self.buf
    }

    fn quoted(&mut self, value: &str) {
        self.buf.push(b'"');
        for byte in value.bytes() {
            if matches!(byte, b'"' | b'\\') {
                self.buf.push(b'\\');
            }
            self.buf.push(byte);
        }
        self.buf.push(b'"');
    }
}

fn is_bare_atom(value: &str, wildcards: bool) -> bool {
    !value.is_empty()
        && value.bytes().all(|b| {
            (wildcards && matches!(b, b'%' | b'*'))
                || (b.is_ascii_graphic()
                    && !matches!(b, b'"' | b'\\' | b'(' | b')' | b'{' | b'%' | b'*' | b']'))
        })
}

fn fetch_item(item: &FetchAttribute) -> String {
    match item {
        FetchAttribute::Uid => "UID".to_string(),
        FetchAttribute::Flags => "FLAGS".to_string(),
        FetchAttribute::InternalDate => "INTERNALDATE".to_string(),
        FetchAttribute::Rfc822Size => "RFC822.SIZE".to_string(),
        FetchAttribute::BodyStructure => "BODYSTRUCTURE".to_string(),
        FetchAttribute::BodyPeek(section) => format!("BODY.PEEK[{section}]"),
    }
}

fn search_keys(criteria: &SearchCriteria, out: &mut Vec<String>) {
    match criteria {
        SearchCriteria::All => out.push("ALL".to_string()),
        SearchCriteria::Unseen => out.push("UNSEEN".to_string()),
        SearchCriteria::Since(date) => out.push(format!("SINCE {}", date.format("%-d-%b-%Y"))),
        SearchCriteria::Uid(set) => out.push(format!("UID {set}")),
        SearchCriteria::And(all) => all.iter().for_each(|c| search_keys(c, out)),
    }
}
