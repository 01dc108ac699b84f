//! SASL authentication mechanisms.
//!
//! Implements:
//! - PLAIN (RFC 4616) - address and app password in one blob
//! - OAUTHBEARER (RFC 7628) - standard `OAuth2` bearer framing
//! - XOAUTH2 (Google/Microsoft proprietary) - legacy bearer framing

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;

/// A SASL mechanism the client knows how to frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaslMechanism {
    /// PLAIN with an app-specific password.
    Plain,
    /// Proprietary `OAuth2` framing.
    XOAuth2,
    /// RFC 7628 `OAuth2` framing.
    OAuthBearer,
}

impl SaslMechanism {
    /// Returns the IANA mechanism name used on the wire.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::XOAuth2 => "XOAUTH2",
            Self::OAuthBearer => "OAUTHBEARER",
        }
    }

    /// Returns true for the bearer-token mechanisms.
    #[must_use]
    pub const fn is_oauth(self) -> bool {
        matches!(self, Self::XOAuth2 | Self::OAuthBearer)
    }

    /// Parses a mechanism name (case-insensitive).
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "PLAIN" => Some(Self::Plain),
            "XOAUTH2" => Some(Self::XOAuth2),
            "OAUTHBEARER" => Some(Self::OAuthBearer),
            _ => None,
        }
    }

    /// Builds the base64 initial response for this mechanism.
    ///
    /// `secret` is the app password for PLAIN and the access token otherwise.
    #[must_use]
    pub fn initial_response(self, user: &str, secret: &str) -> String {
        match self {
            Self::Plain => plain_response(user, secret),
            Self::XOAuth2 => xoauth2_response(user, secret),
            Self::OAuthBearer => oauthbearer_response(user, secret),
        }
    }
}

impl fmt::Display for SaslMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Generates PLAIN initial response (RFC 4616).
///
/// Format: `\0<username>\0<password>` (base64 encoded). The authorization
/// identity is left empty.
///
/// # Example
///
/// ```
/// use mailwire_oauth::sasl::plain_response;
///
/// assert_eq!(plain_response("test", "pass"), "AHRlc3QAcGFzcw==");
/// ```
#[must_use]
pub fn plain_response(username: &str, password: &str) -> String {
    let auth_string = format!("\0{username}\0{password}");
    STANDARD.encode(auth_string.as_bytes())
}

/// Generates OAUTHBEARER initial response (RFC 7628).
///
/// Format: `n,a=<user>,\x01auth=Bearer <token>\x01\x01`
#[must_use]
pub fn oauthbearer_response(user: &str, token: &str) -> String {
    let auth_string = format!("n,a={user},\x01auth=Bearer {token}\x01\x01");
    STANDARD.encode(auth_string.as_bytes())
}

/// Generates XOAUTH2 initial response.
///
/// Format: `user=<user>\x01auth=Bearer <token>\x01\x01`
#[must_use]
pub fn xoauth2_response(user: &str, token: &str) -> String {
    let auth_string = format!("user={user}\x01auth=Bearer {token}\x01\x01");
    STANDARD.encode(auth_string.as_bytes())
}

/// Parses an `OAuth2` error response from the server.
///
/// `OAuth2` errors are JSON-encoded: `{"status":"401", "schemes":"bearer", "scope":"..."}`
///
/// # Errors
///
/// Returns an error if the response cannot be parsed.
pub fn parse_oauth_error(response: &str) -> Result<OAuthError, serde_json::Error> {
    serde_json::from_str(response)
}

/// Decodes the base64 payload of a `+` challenge sent after a bearer token
/// was refused.
///
/// Returns `None` when the payload is empty or not the expected JSON.
#[must_use]
pub fn decode_failure_challenge(payload: &str) -> Option<OAuthError> {
    let payload = payload.trim();
    if payload.is_empty() {
        return None;
    }
    let bytes = STANDARD.decode(payload).ok()?;
    let text = String::from_utf8(bytes).ok()?;
    parse_oauth_error(&text).ok()
}

/// `OAuth2` error response from server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OAuthError {
    /// HTTP-style status code.
    pub status: String,
    /// Authentication schemes supported.
    #[serde(default)]
    pub schemes: String,
    /// `OAuth2` scope required.
    #[serde(default)]
    pub scope: Option<String>,
}

impl OAuthError {
    /// Returns true when the status indicates a server-side or rate-limit
    /// condition rather than a bad token.
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self.status == "429" || self.status.starts_with('5')
    }
}

impl fmt::Display for OAuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status {}", self.status)?;
        if let Some(scope) = &self.scope {
            write!(f, ", scope {scope}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn decoded(blob: &str) -> String {
        String::from_utf8(STANDARD.decode(blob).unwrap()).unwrap()
    }

    #[test]
    fn test_oauthbearer_format() {
        let blob = SaslMechanism::OAuthBearer.initial_response("test@test.com", "abc");
        assert_eq!(decoded(&blob), "n,a=test@test.com,\x01auth=Bearer abc\x01\x01");
    }

    #[test]
    fn test_xoauth2_format() {
        let blob = SaslMechanism::XOAuth2.initial_response("test@test.com", "abc");
        assert_eq!(decoded(&blob), "user=test@test.com\x01auth=Bearer abc\x01\x01");
    }

    #[test]
    fn test_plain_format() {
        let blob = SaslMechanism::Plain.initial_response("user", "pass@word!");
        assert_eq!(decoded(&blob), "\0user\0pass@word!");
    }

    #[test]
    fn test_blob_hides_secret() {
        let blob = oauthbearer_response("user@example.com", "token");
        assert!(!blob.contains("user@example.com"));
        assert!(!blob.contains("token"));
    }

    #[test]
    fn test_mechanism_names() {
        assert_eq!(SaslMechanism::parse("xoauth2"), Some(SaslMechanism::XOAuth2));
        assert_eq!(SaslMechanism::parse("CRAM-MD5"), None);
        assert_eq!(SaslMechanism::OAuthBearer.to_string(), "OAUTHBEARER");
        assert!(SaslMechanism::XOAuth2.is_oauth());
        assert!(!SaslMechanism::Plain.is_oauth());
    }

    #[test]
    fn test_parse_oauth_error() {
        let json = r#"{"status":"401","schemes":"bearer","scope":"https://mail.google.com/"}"#;
        let error = parse_oauth_error(json).unwrap();

        assert_eq!(error.status, "401");
        assert_eq!(error.schemes, "bearer");
        assert_eq!(error.scope.as_deref(), Some("https://mail.google.com/"));
        assert!(!error.is_temporary());
    }

    #[test]
    fn test_decode_failure_challenge() {
        let payload = STANDARD.encode(br#"{"status":"503"}"#);
        let error = decode_failure_challenge(&payload).unwrap();
        assert_eq!(error.status, "503");
        assert!(error.is_temporary());

        assert!(decode_failure_challenge("").is_none());
        assert!(decode_failure_challenge("not base64!").is_none());
    }
}
