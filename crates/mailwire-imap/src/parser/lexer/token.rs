//! Lexer tokens.

/// A single lexical element of a server line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// Bare atom, borrowed from the input.
    Atom(&'a str),
    /// Quoted string with escapes removed.
    QuotedString(String),
    /// `{n}` literal payload.
    Literal(Vec<u8>),
    /// Unsigned number that fits in 32 bits.
    Number(u32),
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// A single space.
    Space,
    /// `*` untagged prefix.
    Asterisk,
    /// `+` continuation prefix.
    Plus,
    /// `NIL` in any case.
    Nil,
    /// Line terminator (CRLF or a bare LF/CR).
    Crlf,
    /// End of input.
    Eof,
}
