//! Status-line parser.
//!
//! Classifies one framed server response as tagged, untagged or
//! continuation, and pulls out the pieces the session layer acts on:
//! status, bracketed response code, capability lists and mailbox counters.
//! Data-bearing responses (FETCH payloads, LIST rows) are left to the
//! tolerant decoders in [`crate::decode`].

#![allow(clippy::missing_errors_doc)]

use super::lexer::{Lexer, Token};
use crate::types::{Capability, ResponseCode, Status, Tag};
use crate::{Error, Result};

/// One complete server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Completion of a command.
    Tagged {
        /// Tag echoed from the command.
        tag: Tag,
        /// Completion status.
        status: Status,
        /// Optional bracketed response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// Untagged data or status.
    Untagged(UntaggedResponse),
    /// Continuation request (`+ ...`).
    Continuation {
        /// Text after the `+`, often base64.
        text: String,
    },
}

/// Untagged responses the session layer distinguishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UntaggedResponse {
    /// `* OK`
    Ok {
        /// Response code.
        code: Option<ResponseCode>,
        /// Text.
        text: String,
    },
    /// `* NO`
    No {
        /// Response code.
        code: Option<ResponseCode>,
        /// Text.
        text: String,
    },
    /// `* BAD`
    Bad {
        /// Response code.
        code: Option<ResponseCode>,
        /// Text.
        text: String,
    },
    /// `* PREAUTH` greeting.
    PreAuth {
        /// Response code.
        code: Option<ResponseCode>,
        /// Text.
        text: String,
    },
    /// `* BYE`
    Bye {
        /// Response code.
        code: Option<ResponseCode>,
        /// Text.
        text: String,
    },
    /// `* CAPABILITY ...`
    Capability(Vec<Capability>),
    /// `* FLAGS (...)`
    Flags(Vec<String>),
    /// `* n EXISTS`
    Exists(u32),
    /// `* n RECENT`
    Recent(u32),
    /// `* n EXPUNGE`
    Expunge(u32),
    /// `* n FETCH (...)`, payload left undecoded.
    Fetch {
        /// Message sequence number.
        seq: u32,
    },
    /// Anything else, kept as the raw line.
    Other(String),
}

impl UntaggedResponse {
    /// Returns the response code carried by a status response.
    #[must_use]
    pub const fn code(&self) -> Option<&ResponseCode> {
        match self {
            Self::Ok { code, .. }
            | Self::No { code, .. }
            | Self::Bad { code, .. }
            | Self::PreAuth { code, .. }
            | Self::Bye { code, .. } => code.as_ref(),
            _ => None,
        }
    }
}

/// Parser for framed server responses.
pub struct ResponseParser;

impl ResponseParser {
    /// Parses one framed response (as returned by the framed stream).
    pub fn parse(input: &[u8]) -> Result<Response> {
        let mut lexer = Lexer::new(input);

        match lexer.next_token()? {
            Token::Asterisk => {
                lexer.expect_space()?;
                Ok(Response::Untagged(Self::parse_untagged(&mut lexer, input)?))
            }
            Token::Plus => {
                lexer.skip_spaces();
                Ok(Response::Continuation {
                    text: lexer.read_text(),
                })
            }
            Token::Atom(tag) => Self::parse_tagged(&mut lexer, Tag::new(tag)),
            Token::Number(n) => Self::parse_tagged(&mut lexer, Tag::new(n.to_string())),
            token => Err(Self::unexpected(&lexer, &format!("{token:?}"))),
        }
    }

    fn parse_tagged(lexer: &mut Lexer<'_>, tag: Tag) -> Result<Response> {
        lexer.expect_space()?;
        let keyword = lexer.read_atom_string()?;
        let status = Status::parse(keyword).ok_or_else(|| Error::Parse {
            position: lexer.position(),
            message: format!("unknown completion status: {keyword}"),
        })?;
        let (code, text) = Self::parse_resp_text(lexer)?;
        Ok(Response::Tagged {
            tag,
            status,
            code,
            text,
        })
    }

    fn parse_untagged(lexer: &mut Lexer<'_>, raw: &[u8]) -> Result<UntaggedResponse> {
        match lexer.next_token()? {
            Token::Atom(keyword) => {
                if let Some(status) = Status::parse(keyword) {
                    let (code, text) = Self::parse_resp_text(lexer)?;
                    return Ok(match status {
                        Status::Ok => UntaggedResponse::Ok { code, text },
                        Status::No => UntaggedResponse::No { code, text },
                        Status::Bad => UntaggedResponse::Bad { code, text },
                        Status::PreAuth => UntaggedResponse::PreAuth { code, text },
                        Status::Bye => UntaggedResponse::Bye { code, text },
                    });
                }
                match keyword.to_ascii_uppercase().as_str() {
                    "CAPABILITY" => Ok(UntaggedResponse::Capability(Self::parse_capabilities(
                        lexer,
                    )?)),
                    "FLAGS" => {
                        lexer.skip_spaces();
                        Ok(UntaggedResponse::Flags(Self::parse_flag_list(lexer)?))
                    }
                    _ => Ok(UntaggedResponse::Other(raw_text(raw))),
                }
            }
            Token::Number(n) => {
                lexer.expect_space()?;
                let keyword = lexer.read_atom_string()?;
                Ok(match keyword.to_ascii_uppercase().as_str() {
                    "EXISTS" => UntaggedResponse::Exists(n),
                    "RECENT" => UntaggedResponse::Recent(n),
                    "EXPUNGE" => UntaggedResponse::Expunge(n),
                    "FETCH" => UntaggedResponse::Fetch { seq: n },
                    _ => UntaggedResponse::Other(raw_text(raw)),
                })
            }
            _ => Ok(UntaggedResponse::Other(raw_text(raw))),
        }
    }

    /// Parses `[code] text` following a status keyword.
    fn parse_resp_text(lexer: &mut Lexer<'_>) -> Result<(Option<ResponseCode>, String)> {
        lexer.skip_spaces();
        let code = if lexer.peek() == Some(b'[') {
            lexer.advance();
            let code = Self::parse_response_code(lexer)?;
            lexer.skip_spaces();
            Some(code)
        } else {
            None
        };
        Ok((code, lexer.read_text()))
    }

    fn parse_response_code(lexer: &mut Lexer<'_>) -> Result<ResponseCode> {
        let name = lexer.read_atom_string()?;
        let code = match name.to_ascii_uppercase().as_str() {
            "ALERT" => ResponseCode::Alert,
            "READ-ONLY" => ResponseCode::ReadOnly,
            "READ-WRITE" => ResponseCode::ReadWrite,
            "AUTHENTICATIONFAILED" => ResponseCode::AuthenticationFailed,
            "AUTHORIZATIONFAILED" => ResponseCode::AuthorizationFailed,
            "EXPIRED" => ResponseCode::Expired,
            "PRIVACYREQUIRED" => ResponseCode::PrivacyRequired,
            "CONTACTADMIN" => ResponseCode::ContactAdmin,
            "UNAVAILABLE" => ResponseCode::Unavailable,
            "INUSE" => ResponseCode::InUse,
            "LIMIT" => ResponseCode::Limit,
            "CAPABILITY" => {
                let caps = Self::read_until_bracket(lexer)
                    .split_whitespace()
                    .map(Capability::parse)
                    .collect();
                return Ok(ResponseCode::Capability(caps));
            }
            "UIDNEXT" | "UIDVALIDITY" | "UNSEEN" => {
                let arg = Self::read_until_bracket(lexer);
                let Ok(n) = arg.trim().parse::<u32>() else {
                    return Ok(ResponseCode::Unknown(format!("{name} {arg}")));
                };
                return Ok(match name.to_ascii_uppercase().as_str() {
                    "UIDNEXT" => ResponseCode::UidNext(n),
                    "UIDVALIDITY" => ResponseCode::UidValidity(n),
                    _ => ResponseCode::Unseen(n),
                });
            }
            _ => {
                let arg = Self::read_until_bracket(lexer);
                let raw = if arg.is_empty() {
                    name.to_string()
                } else {
                    format!("{name} {arg}")
                };
                return Ok(ResponseCode::Unknown(raw));
            }
        };
        // Skip any argument we do not model.
        Self::read_until_bracket(lexer);
        Ok(code)
    }

    /// Consumes everything up to and including the closing `]`.
    fn read_until_bracket(lexer: &mut Lexer<'_>) -> String {
        let mut out = Vec::new();
        while let Some(b) = lexer.advance() {
            if b == b']' {
                break;
            }
            out.push(b);
        }
        String::from_utf8_lossy(&out).trim().to_string()
    }

    fn parse_capabilities(lexer: &mut Lexer<'_>) -> Result<Vec<Capability>> {
        let mut caps = Vec::new();
        loop {
            match lexer.next_token()? {
                Token::Space => {}
                Token::Atom(s) => caps.push(Capability::parse(s)),
                Token::Number(n) => caps.push(Capability::Unknown(n.to_string())),
                Token::Crlf | Token::Eof => break,
                token => return Err(Self::unexpected(lexer, &format!("{token:?}"))),
            }
        }
        Ok(caps)
    }

    fn parse_flag_list(lexer: &mut Lexer<'_>) -> Result<Vec<String>> {
        if lexer.next_token()? != Token::LParen {
            return Err(Self::unexpected(lexer, "flag list"));
        }
        let mut flags = Vec::new();
        loop {
            match lexer.next_token()? {
                Token::Space => {}
                Token::RParen => break,
                Token::Atom(s) => flags.push(s.to_string()),
                // `\*` lexes as atom `\` followed by asterisk.
                Token::Asterisk => {
                    if flags.last().is_some_and(|f| f == "\\") {
                        flags.pop();
                    }
                    flags.push("\\*".to_string());
                }
                token => return Err(Self::unexpected(lexer, &format!("{token:?}"))),
            }
        }
        Ok(flags)
    }

    fn unexpected(lexer: &Lexer<'_>, what: &str) -> Error {
        Error::Parse {
            position: lexer.position(),
            message: format!("unexpected {what}"),
        }
    }
}

fn raw_text(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).trim_end().to_string()
}
