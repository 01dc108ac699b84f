//! BODYSTRUCTURE trees (RFC 3501 §7.4.2).

use mailwire_mime::{TransferEncoding, decode_charset, decode_header_value};
use tracing::trace;

use super::sexp::{Node, parse_nodes};

/// A leaf MIME part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyStructureNode {
    /// Dotted section number, usable in `BODY[...]`.
    pub part_id: String,
    /// Lowercased `type/subtype`.
    pub mime_type: String,
    /// Attachment file name, if any.
    pub filename: Option<String>,
    /// Encoded size in bytes.
    pub size_bytes: u64,
    /// `Content-ID`.
    pub content_id: Option<String>,
    /// True if the part should be listed as an attachment.
    pub is_attachment: bool,
    /// `Content-Transfer-Encoding`.
    pub transfer_encoding: TransferEncoding,
    /// Declared charset, `UTF-8` if none.
    pub charset: String,
}

/// A MIME part tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyNode {
    /// `multipart/*` container. The root container has an empty `part_id`.
    Multipart {
        /// Dotted section number.
        part_id: String,
        /// Lowercased subtype (`mixed`, `alternative`, ...).
        subtype: String,
        /// Child parts in order.
        children: Vec<Self>,
    },
    /// Leaf part.
    Part(BodyStructureNode),
}

impl BodyNode {
    /// Returns the leaf parts in document order.
    #[must_use]
    pub fn leaves(&self) -> Vec<&BodyStructureNode> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a BodyStructureNode>) {
        match self {
            Self::Multipart { children, .. } => {
                for child in children {
                    child.collect_leaves(out);
                }
            }
            Self::Part(part) => out.push(part),
        }
    }
}

/// Parses a BODYSTRUCTURE response and returns its leaf parts.
///
/// Accepts a whole `* n FETCH (... BODYSTRUCTURE (...))` response or a bare
/// parenthesized structure. Returns an empty list when nothing decodes.
#[must_use]
pub fn parse_body_structure(response: &[u8]) -> Vec<BodyStructureNode> {
    parse_body_tree(response)
        .map(|tree| tree.leaves().into_iter().cloned().collect())
        .unwrap_or_default()
}

/// Parses a BODYSTRUCTURE response into a part tree.
#[must_use]
pub fn parse_body_tree(response: &[u8]) -> Option<BodyNode> {
    let nodes = parse_nodes(response);
    let structure = match find_structure(&nodes) {
        Some(found) => found,
        None => match nodes.first() {
            Some(Node::List(items)) => items.as_slice(),
            _ => {
                trace!("no BODYSTRUCTURE item in response");
                return None;
            }
        },
    };
    build(structure, "")
}

/// Finds the list following a `BODYSTRUCTURE` (or `BODY`) item.
fn find_structure(nodes: &[Node]) -> Option<&[Node]> {
    for (i, node) in nodes.iter().enumerate() {
        if node.is_atom("BODYSTRUCTURE") || node.is_atom("BODY") {
            if let Some(items) = nodes.get(i + 1).and_then(Node::list) {
                return Some(items);
            }
        } else if let Some(items) = node.list()
            && let Some(found) = find_structure(items)
        {
            return Some(found);
        }
    }
    None
}

fn child_id(parent: &str, index: usize) -> String {
    if parent.is_empty() {
        index.to_string()
    } else {
        format!("{parent}.{index}")
    }
}

fn build(items: &[Node], part_id: &str) -> Option<BodyNode> {
    if items.is_empty() {
        trace!(part_id, "empty body structure group");
        return None;
    }

    if matches!(items.first(), Some(Node::List(_))) {
        let mut children = Vec::new();
        let mut subtype = None;
        for item in items {
            match item {
                Node::List(child) => {
                    let id = child_id(part_id, children.len() + 1);
                    if let Some(node) = build(child, &id) {
                        children.push(node);
                    }
                }
                other => {
                    subtype = other.text();
                    break;
                }
            }
        }
        return Some(BodyNode::Multipart {
            part_id: part_id.to_string(),
            subtype: subtype.map_or_else(|| "mixed".to_string(), |s| s.to_ascii_lowercase()),
            children,
        });
    }

    let id = if part_id.is_empty() { "1" } else { part_id };
    Some(BodyNode::Part(leaf(items, id)))
}

fn leaf(items: &[Node], part_id: &str) -> BodyStructureNode {
    let field = |i: usize| items.get(i);
    let text = |i: usize| field(i).and_then(Node::text);

    let media_type = text(0).unwrap_or_else(|| "text".to_string());
    let subtype = text(1).unwrap_or_else(|| "plain".to_string());
    let mime_type = format!("{media_type}/{subtype}").to_ascii_lowercase();
    let params = parameters(field(2));

    let ext_start = if mime_type.starts_with("text/") {
        8
    } else if mime_type == "message/rfc822" {
        10
    } else {
        7
    };
    let (disposition, disposition_params) = match field(ext_start + 1).and_then(Node::list) {
        Some(d) => (
            d.first()
                .and_then(Node::text)
                .map(|s| s.to_ascii_lowercase()),
            parameters(d.get(1)),
        ),
        None => (None, Vec::new()),
    };

    let filename = parameter(&disposition_params, "filename").or_else(|| parameter(&params, "name"));
    let is_attachment = filename.is_some()
        || match disposition.as_deref() {
            Some("attachment") => true,
            Some("inline") => !mime_type.starts_with("text/"),
            _ => false,
        };

    BodyStructureNode {
        part_id: part_id.to_string(),
        charset: parameter(&params, "charset").unwrap_or_else(|| "UTF-8".to_string()),
        mime_type,
        filename,
        size_bytes: field(6).and_then(Node::number).unwrap_or(0),
        content_id: text(3)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        is_attachment,
        transfer_encoding: text(5)
            .map(|s| TransferEncoding::parse(&s))
            .unwrap_or_default(),
    }
}

/// Reads a `("key" "value" ...)` list; keys are lowercased.
fn parameters(node: Option<&Node>) -> Vec<(String, String)> {
    let Some(items) = node.and_then(Node::list) else {
        return Vec::new();
    };
    items
        .chunks(2)
        .filter_map(|pair| match pair {
            [key, value] => Some((key.text()?.to_ascii_lowercase(), value.text()?)),
            _ => None,
        })
        .collect()
}

/// Looks up a parameter, honouring RFC 2231 extended and continued values.
fn parameter(params: &[(String, String)], name: &str) -> Option<String> {
    if let Some((_, value)) = params.iter().find(|(k, _)| k == name) {
        return Some(decode_header_value(value));
    }

    let extended = format!("{name}*");
    if let Some((_, value)) = params.iter().find(|(k, _)| *k == extended) {
        return Some(decode_extended(value));
    }

    let mut joined = String::new();
    let mut first_extended = false;
    for index in 0usize.. {
        let plain = format!("{name}*{index}");
        let encoded = format!("{plain}*");
        if let Some((_, value)) = params.iter().find(|(k, _)| *k == encoded) {
            first_extended |= index == 0;
            joined.push_str(value);
        } else if let Some((_, value)) = params.iter().find(|(k, _)| *k == plain) {
            joined.push_str(value);
        } else {
            break;
        }
    }
    if joined.is_empty() {
        None
    } else if first_extended {
        Some(decode_extended(&joined))
    } else {
        Some(decode_header_value(&joined))
    }
}

/// Decodes `charset'language'percent-encoded` values.
fn decode_extended(value: &str) -> String {
    let mut pieces = value.splitn(3, '\'');
    match (pieces.next(), pieces.next(), pieces.next()) {
        (Some(charset), Some(_language), Some(encoded)) => {
            let charset = if charset.is_empty() { "UTF-8" } else { charset };
            decode_charset(&percent_decode(encoded), charset)
        }
        _ => String::from_utf8_lossy(&percent_decode(value)).into_owned(),
    }
}

fn percent_decode(value: &str) -> Vec<u8> {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && let Some(hex) = bytes.get(i + 1..i + 3)
            && let Ok(hex) = std::str::from_utf8(hex)
            && let Ok(byte) = u8::from_str_radix(hex, 16)
        {
            out.push(byte);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeSet;
    use std::fmt::Write;

    use proptest::prelude::*;

    use super::*;

    const ALTERNATIVE_IN_MIXED: &[u8] = b"* 7 FETCH (UID 42 BODYSTRUCTURE (\
        (\"text\" \"plain\" (\"charset\" \"iso-8859-1\") NIL NIL \"quoted-printable\" 120 4 NIL NIL NIL NIL)\
        ((\"text\" \"plain\" (\"charset\" \"utf-8\") NIL NIL \"7bit\" 30 1 NIL NIL NIL NIL)\
        (\"text\" \"html\" (\"charset\" \"utf-8\") NIL NIL \"base64\" 88 2 NIL NIL NIL NIL) \"alternative\" (\"boundary\" \"b2\") NIL NIL)\
        \"mixed\" (\"boundary\" \"b1\") NIL NIL))\r\n";

    #[test]
    fn nested_part_ids() {
        let parts = parse_body_structure(ALTERNATIVE_IN_MIXED);
        let ids: Vec<&str> = parts.iter().map(|p| p.part_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2.1", "2.2"]);
        assert_eq!(parts[0].charset, "iso-8859-1");
        assert_eq!(parts[0].transfer_encoding, TransferEncoding::QuotedPrintable);
        assert_eq!(parts[2].mime_type, "text/html");
        assert_eq!(parts[2].size_bytes, 88);
        assert!(parts.iter().all(|p| !p.is_attachment));
    }

    #[test]
    fn tree_shape() {
        let tree = parse_body_tree(ALTERNATIVE_IN_MIXED).unwrap();
        let BodyNode::Multipart { part_id, subtype, children } = tree else {
            panic!("expected multipart root");
        };
        assert_eq!(part_id, "");
        assert_eq!(subtype, "mixed");
        assert_eq!(children.len(), 2);
        assert!(matches!(
            &children[1],
            BodyNode::Multipart { part_id, subtype, .. } if part_id == "2" && subtype == "alternative"
        ));
    }

    #[test]
    fn single_part_is_one() {
        let parts = parse_body_structure(
            b"(\"TEXT\" \"PLAIN\" (\"CHARSET\" \"US-ASCII\") NIL NIL \"7BIT\" 3028 92)",
        );
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].part_id, "1");
        assert_eq!(parts[0].mime_type, "text/plain");
        assert_eq!(parts[0].charset, "US-ASCII");
    }

    #[test]
    fn attachment_with_encoded_filename() {
        let parts = parse_body_structure(
            b"* 1 FETCH (BODYSTRUCTURE ((\"text\" \"plain\" NIL NIL NIL \"7bit\" 10 1 NIL NIL NIL NIL)\
            (\"application\" \"pdf\" (\"name\" \"=?UTF-8?Q?R=C3=A9sum=C3=A9.pdf?=\") \"<cv@x>\" NIL \"base64\" 5000 NIL \
            (\"attachment\" (\"filename\" \"=?UTF-8?Q?R=C3=A9sum=C3=A9.pdf?=\")) NIL NIL) \"mixed\"))",
        );
        assert_eq!(parts.len(), 2);
        let pdf = &parts[1];
        assert_eq!(pdf.part_id, "2");
        assert!(pdf.is_attachment);
        assert_eq!(pdf.filename.as_deref(), Some("Résumé.pdf"));
        assert_eq!(pdf.content_id.as_deref(), Some("<cv@x>"));
        assert_eq!(pdf.transfer_encoding, TransferEncoding::Base64);
        assert_eq!(pdf.charset, "UTF-8");
    }

    #[test]
    fn rfc2231_filename() {
        let parts = parse_body_structure(
            b"(\"application\" \"octet-stream\" NIL NIL NIL \"base64\" 10 NIL \
            (\"attachment\" (\"filename*\" \"utf-8''%E2%82%AC%20rates.txt\")) NIL NIL)",
        );
        assert_eq!(parts[0].filename.as_deref(), Some("€ rates.txt"));

        let parts = parse_body_structure(
            b"(\"application\" \"octet-stream\" NIL NIL NIL \"base64\" 10 NIL \
            (\"attachment\" (\"filename*0\" \"long\" \"filename*1\" \"name.txt\")) NIL NIL)",
        );
        assert_eq!(parts[0].filename.as_deref(), Some("longname.txt"));
    }

    #[test]
    fn inline_image_without_filename_is_attachment() {
        let parts = parse_body_structure(
            b"((\"text\" \"html\" NIL NIL NIL \"7bit\" 10 1 NIL (\"inline\" NIL) NIL NIL)\
            (\"image\" \"png\" NIL \"<logo>\" NIL \"base64\" 400 NIL (\"inline\" NIL) NIL NIL) \"related\")",
        );
        assert!(!parts[0].is_attachment);
        assert!(parts[1].is_attachment);
        assert_eq!(parts[1].filename, None);
    }

    #[test]
    fn message_rfc822_extension_offset() {
        let parts = parse_body_structure(
            b"(\"message\" \"rfc822\" NIL NIL NIL \"7bit\" 900 \
            (NIL \"Fwd\" NIL NIL NIL NIL NIL NIL NIL NIL) \
            (\"text\" \"plain\" NIL NIL NIL \"7bit\" 10 1) 20 NIL (\"attachment\" NIL) NIL NIL)",
        );
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].mime_type, "message/rfc822");
        assert!(parts[0].is_attachment);
    }

    #[test]
    fn empty_structure() {
        assert!(parse_body_structure(b"* 1 FETCH (BODYSTRUCTURE ())").is_empty());
        assert!(parse_body_structure(b"* 1 FETCH (UID 4)").is_empty());
        assert!(parse_body_structure(b"").is_empty());
    }

    #[derive(Debug, Clone)]
    enum Shape {
        Leaf { text: bool, attachment: bool },
        Multi(Vec<Self>),
    }

    fn shape() -> impl Strategy<Value = Shape> {
        let leaf = (any::<bool>(), any::<bool>())
            .prop_map(|(text, attachment)| Shape::Leaf { text, attachment });
        leaf.prop_recursive(4, 24, 4, |inner| {
            proptest::collection::vec(inner, 1..4).prop_map(Shape::Multi)
        })
    }

    fn encode(shape: &Shape, out: &mut String) {
        match shape {
            Shape::Leaf { text, attachment } => {
                let (kind, sub, lines) = if *text {
                    ("text", "plain", " 1")
                } else {
                    ("application", "zip", "")
                };
                let disposition = if *attachment {
                    "(\"attachment\" (\"filename\" \"a.bin\"))"
                } else {
                    "NIL"
                };
                let _ = write!(
                    out,
                    "(\"{kind}\" \"{sub}\" NIL NIL NIL \"base64\" 10{lines} NIL {disposition} NIL NIL)"
                );
            }
            Shape::Multi(children) => {
                out.push('(');
                for child in children {
                    encode(child, out);
                }
                out.push_str(" \"mixed\" NIL NIL NIL)");
            }
        }
    }

    fn expected(shape: &Shape, out: &mut Vec<bool>) {
        match shape {
            Shape::Leaf { attachment, .. } => out.push(*attachment),
            Shape::Multi(children) => children.iter().for_each(|c| expected(c, out)),
        }
    }

    proptest! {
        #[test]
        fn leaves_match_terminal_parts(shape in shape()) {
            let mut encoded = String::from("* 1 FETCH (BODYSTRUCTURE ");
            encode(&shape, &mut encoded);
            encoded.push(')');

            let parts = parse_body_structure(encoded.as_bytes());
            let mut want = Vec::new();
            expected(&shape, &mut want);
            prop_assert_eq!(parts.len(), want.len());

            let ids: BTreeSet<&str> = parts.iter().map(|p| p.part_id.as_str()).collect();
            prop_assert_eq!(ids.len(), parts.len());

            let got: Vec<bool> = parts.iter().map(|p| p.is_attachment).collect();
            prop_assert_eq!(got, want);
        }

        #[test]
        fn never_panics(input in proptest::collection::vec(any::<u8>(), 0..512)) {
            let _ = parse_body_tree(&input);
        }
    }
}
