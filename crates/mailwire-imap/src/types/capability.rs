//! Completion status and CAPABILITY atoms.

/// Status keyword of a tagged completion or untagged condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// `OK`
    Ok,
    /// `NO`: the command ran and failed.
    No,
    /// `BAD`: the command was not understood.
    Bad,
    /// `PREAUTH` greeting.
    PreAuth,
    /// `BYE`: the server is hanging up.
    Bye,
}

impl Status {
    /// `OK` and `PREAUTH` count as success.
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok | Self::PreAuth)
    }

    /// Matches a keyword without regard to case.
    #[must_use]
    pub fn parse(keyword: &str) -> Option<Self> {
        [
            ("OK", Self::Ok),
            ("NO", Self::No),
            ("BAD", Self::Bad),
            ("PREAUTH", Self::PreAuth),
            ("BYE", Self::Bye),
        ]
        .into_iter()
        .find_map(|(name, status)| keyword.eq_ignore_ascii_case(name).then_some(status))
    }
}

/// One advertised capability.
///
/// Only atoms that steer negotiation get a variant; the rest survive in
/// [`Capability::Unknown`] with their original spelling.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    /// `IMAP4rev1`
    Imap4Rev1,
    /// `IMAP4rev2`
    Imap4Rev2,
    /// `IDLE` (RFC 2177)
    Idle,
    /// `STARTTLS`
    StartTls,
    /// `LOGINDISABLED`
    LoginDisabled,
    /// `SASL-IR` (RFC 4959)
    SaslIr,
    /// `AUTH=<mechanism>`, mechanism upper-cased.
    Auth(String),
    /// `SPECIAL-USE` (RFC 6154)
    SpecialUse,
    /// `XLIST`, Gmail's predecessor of SPECIAL-USE.
    XList,
    /// `ID` (RFC 2971)
    Id,
    /// Anything else.
    Unknown(String),
}

const NAMED: &[(&str, Capability)] = &[
    ("IMAP4rev1", Capability::Imap4Rev1),
    ("IMAP4rev2", Capability::Imap4Rev2),
    ("IDLE", Capability::Idle),
    ("STARTTLS", Capability::StartTls),
    ("LOGINDISABLED", Capability::LoginDisabled),
    ("SASL-IR", Capability::SaslIr),
    ("SPECIAL-USE", Capability::SpecialUse),
    ("XLIST", Capability::XList),
    ("ID", Capability::Id),
];

impl Capability {
    /// Classifies one atom from a CAPABILITY list.
    #[must_use]
    pub fn parse(atom: &str) -> Self {
        if let Some((name, mechanism)) = atom.split_once('=')
            && name.eq_ignore_ascii_case("AUTH")
        {
            return Self::Auth(mechanism.to_ascii_uppercase());
        }
        NAMED
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(atom))
            .map_or_else(|| Self::Unknown(atom.to_string()), |(_, cap)| cap.clone())
    }

    /// Mechanism name of an `AUTH=` entry.
    #[must_use]
    pub fn auth_mechanism(&self) -> Option<&str> {
        if let Self::Auth(mechanism) = self {
            Some(mechanism)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auth(mechanism) => write!(f, "AUTH={mechanism}"),
            Self::Unknown(atom) => f.write_str(atom),
            named => {
                let name = NAMED
                    .iter()
                    .find_map(|(name, cap)| (cap == named).then_some(*name))
                    .unwrap_or_default();
                f.write_str(name)
            }
        }
    }
}
