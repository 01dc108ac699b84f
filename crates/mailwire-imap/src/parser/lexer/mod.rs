//! Tokenizer for server status lines.
//!
//! Structure is checked strictly; content is not. Quoted strings keep
//! unknown escapes and invalid UTF-8 is replaced rather than rejected,
//! because real servers send both.

#![allow(clippy::missing_errors_doc)]

mod token;

pub use token::Token;

use crate::{Error, Result};

/// Cursor over one server line.
pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Starts at the first byte of `input`.
    #[must_use]
    pub const fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    /// Byte offset of the cursor.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Current byte, if any.
    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    /// Consumes and returns the current byte.
    pub fn advance(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    fn rest(&self) -> &'a [u8] {
        self.input.get(self.pos..).unwrap_or_default()
    }

    fn eat(&mut self, prefix: &[u8]) -> bool {
        let hit = self.rest().starts_with(prefix);
        if hit {
            self.pos += prefix.len();
        }
        hit
    }

    fn span_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a [u8] {
        let rest = self.rest();
        let len = rest.iter().position(|&b| !pred(b)).unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }

    /// Produces the next token. At the end of input this is [`Token::Eof`]
    /// forever.
    pub fn next_token(&mut self) -> Result<Token<'a>> {
        let Some(byte) = self.peek() else {
            return Ok(Token::Eof);
        };

        let punct = match byte {
            b' ' => Some(Token::Space),
            b'(' => Some(Token::LParen),
            b')' => Some(Token::RParen),
            b'[' => Some(Token::LBracket),
            b']' => Some(Token::RBracket),
            b'*' => Some(Token::Asterisk),
            b'+' => Some(Token::Plus),
            _ => None,
        };
        if let Some(token) = punct {
            self.pos += 1;
            return Ok(token);
        }

        match byte {
            b'\r' | b'\n' => {
                if !self.eat(b"\r\n") {
                    self.pos += 1;
                }
                Ok(Token::Crlf)
            }
            b'"' => self.quoted(),
            b'{' => self.literal(),
            _ if is_atom_char(byte) => self.atom(),
            _ => Err(self.error(format!("unexpected byte {byte:#04x}"))),
        }
    }

    fn quoted(&mut self) -> Result<Token<'a>> {
        self.pos += 1;
        let mut text = Vec::new();
        loop {
            let byte = self
                .advance()
                .ok_or_else(|| self.error("unterminated quoted string"))?;
            match byte {
                b'"' => break,
                b'\\' => text.push(
                    self.advance()
                        .ok_or_else(|| self.error("unterminated quoted string"))?,
                ),
                other => text.push(other),
            }
        }
        Ok(Token::QuotedString(String::from_utf8_lossy(&text).into_owned()))
    }

    fn literal(&mut self) -> Result<Token<'a>> {
        self.pos += 1;
        let digits = self.span_while(|b| b.is_ascii_digit());
        let size: usize = std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| self.error("bad literal size"))?;

        // `{n+}` is the non-synchronizing form; the payload is the same.
        self.eat(b"+");
        if !self.eat(b"}\r\n") {
            return Err(self.error("literal size not followed by }CRLF"));
        }

        let payload = self
            .rest()
            .get(..size)
            .ok_or_else(|| self.error("literal shorter than announced"))?;
        self.pos += size;
        Ok(Token::Literal(payload.to_vec()))
    }

    fn atom(&mut self) -> Result<Token<'a>> {
        let start = self.pos;
        let raw = self.span_while(is_atom_char);
        let text = std::str::from_utf8(raw).map_err(|_| Error::Parse {
            position: start,
            message: "atom is not UTF-8".to_string(),
        })?;

        if raw.iter().all(u8::is_ascii_digit) {
            return text
                .parse()
                .map(Token::Number)
                .map_err(|_| self.error("number exceeds 32 bits"));
        }
        if text.eq_ignore_ascii_case("NIL") {
            return Ok(Token::Nil);
        }
        Ok(Token::Atom(text))
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::Parse {
            position: self.pos,
            message: message.into(),
        }
    }

    /// Requires the next token to be a space.
    pub fn expect_space(&mut self) -> Result<()> {
        match self.next_token()? {
            Token::Space => Ok(()),
            other => Err(self.error(format!("wanted space, found {other:?}"))),
        }
    }

    /// Requires the next token to be an atom and returns it.
    pub fn read_atom_string(&mut self) -> Result<&'a str> {
        match self.next_token()? {
            Token::Atom(atom) => Ok(atom),
            other => Err(self.error(format!("wanted atom, found {other:?}"))),
        }
    }

    /// Takes everything up to the line terminator, trimmed.
    pub fn read_text(&mut self) -> String {
        let text = self.span_while(|b| b != b'\r' && b != b'\n');
        String::from_utf8_lossy(text).trim().to_string()
    }

    /// Skips a run of spaces.
    pub fn skip_spaces(&mut self) {
        self.span_while(|b| b == b' ');
    }
}

/// ATOM-CHAR from RFC 9051, widened with `\` so `\Seen` is one atom.
/// Brackets and braces always split, so `BODY[TEXT]` lexes in pieces.
#[must_use]
pub const fn is_atom_char(b: u8) -> bool {
    b.is_ascii_graphic()
        && !matches!(
            b,
            b'(' | b')' | b'[' | b']' | b'{' | b'}' | b'"' | b'%' | b'*'
        )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn tokens(input: &[u8]) -> Vec<Token<'_>> {
        let mut lexer = Lexer::new(input);
        let mut out = Vec::new();
        loop {
            let token = lexer.next_token().unwrap();
            if token == Token::Eof {
                return out;
            }
            out.push(token);
        }
    }

    #[test]
    fn tagged_status_line() {
        let mut lexer = Lexer::new(b"A0001 OK LOGIN completed\r\n");
        assert_eq!(lexer.read_atom_string().unwrap(), "A0001");
        lexer.expect_space().unwrap();
        assert_eq!(lexer.next_token().unwrap(), Token::Atom("OK"));
        lexer.skip_spaces();
        assert_eq!(lexer.read_text(), "LOGIN completed");
        assert_eq!(lexer.next_token().unwrap(), Token::Crlf);
        assert_eq!(lexer.next_token().unwrap(), Token::Eof);
        assert_eq!(lexer.next_token().unwrap(), Token::Eof);
    }

    #[test]
    fn digits_nil_and_mixed_atoms() {
        assert_eq!(
            tokens(b"123 nil 4a"),
            [
                Token::Number(123),
                Token::Space,
                Token::Nil,
                Token::Space,
                Token::Atom("4a"),
            ]
        );
        assert!(Lexer::new(b"99999999999").next_token().is_err());
    }

    #[test]
    fn quoted_keeps_unknown_escapes() {
        assert_eq!(
            tokens(b"\"a \\\"b\\\" \\x\""),
            [Token::QuotedString("a \"b\" x".to_string())]
        );
        assert!(Lexer::new(b"\"open").next_token().is_err());
        assert!(Lexer::new(b"\"trailing\\").next_token().is_err());
    }

    #[test]
    fn response_code_and_flags() {
        assert_eq!(
            tokens(b"[UIDNEXT 100] (\\Seen)"),
            [
                Token::LBracket,
                Token::Atom("UIDNEXT"),
                Token::Space,
                Token::Number(100),
                Token::RBracket,
                Token::Space,
                Token::LParen,
                Token::Atom("\\Seen"),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn literals() {
        assert_eq!(tokens(b"{5}\r\nhello"), [Token::Literal(b"hello".to_vec())]);
        assert_eq!(tokens(b"{2+}\r\nhi"), [Token::Literal(b"hi".to_vec())]);
        assert!(Lexer::new(b"{9}\r\nhello").next_token().is_err());
        assert!(Lexer::new(b"{5}hello").next_token().is_err());
    }

    #[test]
    fn bare_line_feed_ends_line() {
        assert_eq!(tokens(b"OK\n"), [Token::Atom("OK"), Token::Crlf]);
    }

    #[test]
    fn atom_char_class() {
        for b in [b'A', b'\\', b'=', b'+', b'.'] {
            assert!(is_atom_char(b), "{}", char::from(b));
        }
        for b in [b' ', b'(', b'"', b'%', b'[', b']', b'{', b'*', 0x7f] {
            assert!(!is_atom_char(b), "{}", char::from(b));
        }
    }
}
