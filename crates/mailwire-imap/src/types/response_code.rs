//! Response codes.

use super::Capability;

/// Bracketed response code from a status response.
///
/// These provide additional information about command completion. The
/// RFC 5530 codes are what tell a rejected credential apart from a server
/// that is temporarily unable to authenticate anyone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCode {
    /// ALERT: Human-readable message that MUST be shown to user.
    Alert,
    /// CAPABILITY response.
    Capability(Vec<Capability>),
    /// READ-ONLY: Mailbox selected as read-only.
    ReadOnly,
    /// READ-WRITE: Mailbox selected as read-write.
    ReadWrite,
    /// UIDNEXT: Next UID to be assigned.
    UidNext(u32),
    /// UIDVALIDITY: Unique identifier validity value.
    UidValidity(u32),
    /// UNSEEN: First unseen message sequence number.
    Unseen(u32),
    /// AUTHENTICATIONFAILED (RFC 5530).
    AuthenticationFailed,
    /// AUTHORIZATIONFAILED (RFC 5530).
    AuthorizationFailed,
    /// EXPIRED (RFC 5530).
    Expired,
    /// PRIVACYREQUIRED (RFC 5530).
    PrivacyRequired,
    /// CONTACTADMIN (RFC 5530).
    ContactAdmin,
    /// UNAVAILABLE (RFC 5530).
    Unavailable,
    /// INUSE (RFC 5530).
    InUse,
    /// LIMIT (RFC 5530).
    Limit,
    /// Unknown response code with its raw text.
    Unknown(String),
}

impl ResponseCode {
    /// Returns true for codes that mean the credential itself was refused.
    #[must_use]
    pub const fn is_credential_failure(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed
                | Self::AuthorizationFailed
                | Self::Expired
                | Self::ContactAdmin
        )
    }

    /// Returns true for codes that mean "try again later".
    #[must_use]
    pub const fn is_temporary(&self) -> bool {
        matches!(self, Self::Unavailable | Self::InUse | Self::Limit)
    }
}
