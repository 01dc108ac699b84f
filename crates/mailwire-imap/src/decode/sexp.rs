//! Tolerant tokenizer for parenthesized IMAP data.
//!
//! Turns a response into a tree of atoms, strings and lists. Unlike the
//! status-line lexer it never fails: an unclosed list is closed at end of
//! input, a stray `)` is dropped, a truncated literal yields what arrived.

use tracing::trace;

/// Deeper groups are flattened into their parent.
const MAX_DEPTH: usize = 64;

/// One element of a parenthesized response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Bare atom, including bracketed section specs (`BODY[1.2]<0>`).
    Atom(String),
    /// Quoted string or literal payload.
    Str(Vec<u8>),
    /// `NIL`
    Nil,
    /// Parenthesized list.
    List(Vec<Self>),
}

impl Node {
    /// Returns the text of an atom or string.
    pub fn text(&self) -> Option<String> {
        match self {
            Self::Atom(s) => Some(s.clone()),
            Self::Str(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
            Self::Nil | Self::List(_) => None,
        }
    }

    /// Returns the raw bytes of an atom or string; `NIL` is empty.
    pub fn bytes(&self) -> Option<Vec<u8>> {
        match self {
            Self::Atom(s) => Some(s.as_bytes().to_vec()),
            Self::Str(bytes) => Some(bytes.clone()),
            Self::Nil => Some(Vec::new()),
            Self::List(_) => None,
        }
    }

    /// Parses an atom or string as a number.
    pub fn number(&self) -> Option<u64> {
        self.text()?.trim().parse().ok()
    }

    /// Returns the children of a list.
    pub fn list(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns true for an atom equal to `name`, ignoring case.
    pub fn is_atom(&self, name: &str) -> bool {
        matches!(self, Self::Atom(s) if s.eq_ignore_ascii_case(name))
    }
}

/// Tokenizes `input` into a sequence of top-level nodes.
pub fn parse_nodes(input: &[u8]) -> Vec<Node> {
    let mut parser = Parser { input, pos: 0 };
    parser.sequence(0)
}

/// Reads a `{n}` or `{n+}` literal header at `pos`, returning the payload
/// length and the offset just past the header's line break.
pub fn literal_header(input: &[u8], pos: usize) -> Option<(usize, usize)> {
    if input.get(pos) != Some(&b'{') {
        return None;
    }
    let mut end = pos + 1;
    while input.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    let digits = std::str::from_utf8(&input[pos + 1..end]).ok()?;
    let len: usize = digits.parse().ok()?;
    if input.get(end) == Some(&b'+') {
        end += 1;
    }
    if input.get(end) != Some(&b'}') {
        return None;
    }
    end += 1;
    if input.get(end..end + 2) == Some(b"\r\n") {
        end += 2;
    } else if input.get(end) == Some(&b'\n') {
        end += 1;
    } else {
        return None;
    }
    Some((len, end))
}

/// Reads a quoted string starting at `pos` (which must hold `"`), returning
/// the unescaped bytes and the offset after the closing quote.
pub fn quoted(input: &[u8], pos: usize) -> (Vec<u8>, usize) {
    let mut out = Vec::new();
    let mut i = pos + 1;
    while let Some(&b) = input.get(i) {
        match b {
            b'"' => return (out, i + 1),
            b'\\' if i + 1 < input.len() => {
                out.push(input[i + 1]);
                i += 2;
            }
            _ => {
                out.push(b);
                i += 1;
            }
        }
    }
    trace!(pos, "unterminated quoted string");
    (out, i)
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl Parser<'_> {
    fn sequence(&mut self, depth: usize) -> Vec<Node> {
        let mut nodes = Vec::new();
        while let Some(&b) = self.input.get(self.pos) {
            match b {
                b' ' | b'\t' | b'\r' | b'\n' => self.pos += 1,
                b'(' if depth >= MAX_DEPTH => {
                    trace!(pos = self.pos, "nesting too deep");
                    self.pos += 1;
                }
                b'(' => {
                    self.pos += 1;
                    nodes.push(Node::List(self.sequence(depth + 1)));
                }
                b')' => {
                    self.pos += 1;
                    if depth > 0 {
                        return nodes;
                    }
                    trace!(pos = self.pos, "unbalanced closing parenthesis");
                }
                b'"' => {
                    let (bytes, next) = quoted(self.input, self.pos);
                    self.pos = next;
                    nodes.push(Node::Str(bytes));
                }
                b'{' => nodes.push(self.literal()),
                _ => nodes.push(self.atom()),
            }
        }
        if depth > 0 {
            trace!(depth, "unclosed list at end of input");
        }
        nodes
    }

    fn literal(&mut self) -> Node {
        let Some((len, start)) = literal_header(self.input, self.pos) else {
            return self.atom();
        };
        let end = start.saturating_add(len).min(self.input.len());
        if end - start < len {
            trace!(expected = len, got = end - start, "truncated literal");
        }
        self.pos = end;
        Node::Str(self.input[start..end].to_vec())
    }

    fn atom(&mut self) -> Node {
        let start = self.pos;
        let mut bracket = 0usize;
        while let Some(&b) = self.input.get(self.pos) {
            match b {
                b'[' => bracket += 1,
                b']' => bracket = bracket.saturating_sub(1),
                b' ' | b'(' | b')' | b'"' | b'\r' | b'\n' if bracket == 0 => break,
                b'\r' | b'\n' => break,
                _ => {}
            }
            self.pos += 1;
        }
        if self.pos == start {
            // `{` that was not a literal header.
            self.pos += 1;
        }
        let text = String::from_utf8_lossy(&self.input[start..self.pos]).into_owned();
        if text.eq_ignore_ascii_case("NIL") {
            Node::Nil
        } else {
            Node::Atom(text)
        }
    }
}
