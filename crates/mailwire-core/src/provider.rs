//! Provider profiles and the built-in registry.
//!
//! Everything that differs between mail providers is data in a
//! [`ProviderProfile`]: endpoints, the auth method, connection limits, the
//! IDLE refresh cadence and the well-known folder paths. Adding a provider
//! means adding a table entry, either here or through
//! [`ProviderRegistry::with_overrides_json`].

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use mailwire_imap::{ConnectionConfig, Security};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::folder::FolderRole;

/// Identifier of the fallback profile.
pub const GENERIC_PROVIDER: &str = "generic";

/// How a provider expects clients to authenticate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthMethod {
    /// Bearer token (XOAUTH2 or OAUTHBEARER).
    #[serde(rename = "oauth2")]
    OAuth2,
    /// Address and app password packed into SASL PLAIN, or LOGIN.
    PasswordPlain,
}

/// Everything the protocol layer needs to know about one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderProfile {
    /// Stable identifier (`gmail`, `outlook`, ...).
    pub identifier: String,
    /// Human-readable name.
    pub display_name: String,
    /// Address domains served by this provider.
    #[serde(default)]
    pub domains: Vec<String>,
    /// IMAP server hostname.
    pub imap_host: String,
    /// IMAP server port.
    #[serde(default = "default_imap_port")]
    pub imap_port: u16,
    /// IMAP transport security.
    #[serde(default)]
    pub imap_security: Security,
    /// SMTP server hostname.
    #[serde(default)]
    pub smtp_host: String,
    /// SMTP server port.
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    /// SMTP transport security.
    #[serde(default = "default_smtp_security")]
    pub smtp_security: Security,
    /// Declared auth method; `None` means infer it from capabilities.
    #[serde(default)]
    pub auth_mechanism: Option<AuthMethod>,
    /// Concurrent sessions allowed per account.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Seconds between IDLE re-issues.
    #[serde(default = "default_idle_refresh")]
    pub idle_refresh_interval_seconds: u64,
    /// Full server paths with a known role, matched case-insensitively.
    #[serde(default)]
    pub folder_name_hints: BTreeMap<String, FolderRole>,
    /// Server paths that are never synced.
    #[serde(default)]
    pub excluded_paths: BTreeSet<String>,
    /// The client must APPEND sent mail to the sent folder itself.
    #[serde(default)]
    pub requires_sent_append: bool,
    /// Folders are labels; one message may appear in several of them.
    #[serde(default)]
    pub labels_as_folders: bool,
}

const fn default_imap_port() -> u16 {
    993
}

const fn default_smtp_port() -> u16 {
    587
}

const fn default_smtp_security() -> Security {
    Security::StartTls
}

const fn default_max_connections() -> usize {
    5
}

const fn default_idle_refresh() -> u64 {
    540
}

impl ProviderProfile {
    /// A profile for a server entered by hand. The auth method is inferred
    /// at connect time.
    #[must_use]
    pub fn manual(imap_host: impl Into<String>, imap_port: u16, imap_security: Security) -> Self {
        let imap_host = imap_host.into();
        Self {
            identifier: format!("manual:{imap_host}"),
            display_name: imap_host.clone(),
            domains: Vec::new(),
            imap_host,
            imap_port,
            imap_security,
            smtp_host: String::new(),
            smtp_port: default_smtp_port(),
            smtp_security: default_smtp_security(),
            auth_mechanism: None,
            max_connections: default_max_connections(),
            idle_refresh_interval_seconds: default_idle_refresh(),
            folder_name_hints: BTreeMap::new(),
            excluded_paths: BTreeSet::new(),
            requires_sent_append: true,
            labels_as_folders: false,
        }
    }

    /// Guesses `imap.<domain>` with implicit TLS for an unknown domain.
    #[must_use]
    pub fn discovered(domain: &str) -> Self {
        let domain = domain.trim().to_ascii_lowercase();
        let mut profile = Self::manual(format!("imap.{domain}"), 993, Security::Implicit);
        profile.identifier = format!("discovered:{domain}");
        profile.smtp_host = format!("smtp.{domain}");
        profile.domains = vec![domain];
        profile
    }

    /// Connection settings for the IMAP endpoint.
    #[must_use]
    pub fn imap_config(&self) -> ConnectionConfig {
        ConnectionConfig::builder(self.imap_host.clone())
            .port(self.imap_port)
            .security(self.imap_security)
            .build()
    }

    /// How often a long-poll session re-issues IDLE.
    #[must_use]
    pub const fn idle_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.idle_refresh_interval_seconds)
    }

    /// Returns the role this provider assigns to `path`, if any.
    #[must_use]
    pub fn hint_for(&self, path: &str) -> Option<FolderRole> {
        self.folder_name_hints
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(path))
            .map(|(_, role)| *role)
    }

    /// Returns true if `path` is on the exclusion list.
    #[must_use]
    pub fn is_excluded(&self, path: &str) -> bool {
        self.excluded_paths
            .iter()
            .any(|p| p.eq_ignore_ascii_case(path))
    }

    /// Returns true if this provider serves `domain`.
    #[must_use]
    pub fn serves_domain(&self, domain: &str) -> bool {
        self.domains
            .iter()
            .any(|d| d.eq_ignore_ascii_case(domain.trim()))
    }
}

/// Lookup table of provider profiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRegistry {
    profiles: Vec<ProviderProfile>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::built_in()
    }
}

impl ProviderRegistry {
    /// The registry shipped with the library.
    #[must_use]
    pub fn built_in() -> Self {
        Self {
            profiles: vec![gmail(), outlook(), yahoo(), icloud(), fastmail(), generic()],
        }
    }

    /// Merges user profiles from a JSON array.
    ///
    /// A profile whose identifier already exists replaces it; new profiles
    /// take precedence over built-ins in domain lookups.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is not an array of profiles.
    pub fn with_overrides_json(mut self, json: &str) -> crate::Result<Self> {
        let overrides: Vec<ProviderProfile> = serde_json::from_str(json)?;
        for profile in overrides {
            self.insert(profile);
        }
        Ok(self)
    }

    /// Adds or replaces a profile.
    pub fn insert(&mut self, profile: ProviderProfile) {
        if let Some(existing) = self
            .profiles
            .iter_mut()
            .find(|p| p.identifier == profile.identifier)
        {
            debug!(provider = %profile.identifier, "replacing provider profile");
            *existing = profile;
        } else {
            debug!(provider = %profile.identifier, "adding provider profile");
            self.profiles.insert(0, profile);
        }
    }

    /// All profiles, in lookup order.
    #[must_use]
    pub fn profiles(&self) -> &[ProviderProfile] {
        &self.profiles
    }

    /// Finds a profile by identifier.
    #[must_use]
    pub fn get(&self, identifier: &str) -> Option<&ProviderProfile> {
        self.profiles.iter().find(|p| p.identifier == identifier)
    }

    /// Finds the profile serving `domain`.
    #[must_use]
    pub fn lookup_by_domain(&self, domain: &str) -> Option<&ProviderProfile> {
        self.profiles.iter().find(|p| p.serves_domain(domain))
    }

    /// Finds the profile serving the domain of `address`.
    #[must_use]
    pub fn lookup_by_email(&self, address: &str) -> Option<&ProviderProfile> {
        let (_, domain) = address.rsplit_once('@')?;
        self.lookup_by_domain(domain)
    }

    /// Returns the matching profile for `address`, or a discovered one.
    #[must_use]
    pub fn resolve(&self, address: &str) -> ProviderProfile {
        if let Some(profile) = self.lookup_by_email(address) {
            return profile.clone();
        }
        match address.rsplit_once('@') {
            Some((_, domain)) if !domain.trim().is_empty() => {
                debug!(domain, "no known provider, guessing endpoints");
                ProviderProfile::discovered(domain)
            }
            _ => self.generic(),
        }
    }

    /// The fallback profile.
    #[must_use]
    pub fn generic(&self) -> ProviderProfile {
        self.get(GENERIC_PROVIDER).cloned().unwrap_or_else(generic)
    }
}

fn hints<const N: usize>(entries: [(&str, FolderRole); N]) -> BTreeMap<String, FolderRole> {
    entries
        .into_iter()
        .map(|(path, role)| (path.to_string(), role))
        .collect()
}

fn paths<const N: usize>(entries: [&str; N]) -> BTreeSet<String> {
    entries.into_iter().map(str::to_string).collect()
}

fn domains<const N: usize>(entries: [&str; N]) -> Vec<String> {
    entries.into_iter().map(str::to_string).collect()
}

// Gmail drops IDLE after about ten minutes.
fn gmail() -> ProviderProfile {
    let mut folder_name_hints = BTreeMap::new();
    for root in ["[Gmail]", "[Google Mail]"] {
        for (name, role) in [
            ("Sent Mail", FolderRole::Sent),
            ("Drafts", FolderRole::Drafts),
            ("Trash", FolderRole::Trash),
            ("Bin", FolderRole::Trash),
            ("Spam", FolderRole::Spam),
            ("Starred", FolderRole::Starred),
            ("All Mail", FolderRole::Archive),
        ] {
            folder_name_hints.insert(format!("{root}/{name}"), role);
        }
    }
    ProviderProfile {
        identifier: "gmail".to_string(),
        display_name: "Gmail".to_string(),
        domains: domains(["gmail.com", "googlemail.com"]),
        imap_host: "imap.gmail.com".to_string(),
        imap_port: 993,
        imap_security: Security::Implicit,
        smtp_host: "smtp.gmail.com".to_string(),
        smtp_port: 587,
        smtp_security: Security::StartTls,
        auth_mechanism: Some(AuthMethod::OAuth2),
        max_connections: 15,
        idle_refresh_interval_seconds: 540,
        folder_name_hints,
        excluded_paths: paths(["[Gmail]/Important", "[Google Mail]/Important"]),
        requires_sent_append: false,
        labels_as_folders: true,
    }
}

fn outlook() -> ProviderProfile {
    ProviderProfile {
        identifier: "outlook".to_string(),
        display_name: "Outlook.com".to_string(),
        domains: domains([
            "outlook.com",
            "hotmail.com",
            "live.com",
            "msn.com",
            "hotmail.co.uk",
            "outlook.co.uk",
        ]),
        imap_host: "outlook.office365.com".to_string(),
        imap_port: 993,
        imap_security: Security::Implicit,
        smtp_host: "smtp.office365.com".to_string(),
        smtp_port: 587,
        smtp_security: Security::StartTls,
        auth_mechanism: Some(AuthMethod::OAuth2),
        max_connections: 8,
        idle_refresh_interval_seconds: 1500,
        folder_name_hints: hints([
            ("Sent Items", FolderRole::Sent),
            ("Drafts", FolderRole::Drafts),
            ("Deleted Items", FolderRole::Trash),
            ("Junk Email", FolderRole::Spam),
            ("Archive", FolderRole::Archive),
        ]),
        excluded_paths: paths(["Outbox", "Conversation History", "Sync Issues"]),
        requires_sent_append: false,
        labels_as_folders: false,
    }
}

fn yahoo() -> ProviderProfile {
    ProviderProfile {
        identifier: "yahoo".to_string(),
        display_name: "Yahoo Mail".to_string(),
        domains: domains([
            "yahoo.com",
            "yahoo.co.uk",
            "yahoo.fr",
            "yahoo.de",
            "ymail.com",
            "rocketmail.com",
        ]),
        imap_host: "imap.mail.yahoo.com".to_string(),
        imap_port: 993,
        imap_security: Security::Implicit,
        smtp_host: "smtp.mail.yahoo.com".to_string(),
        smtp_port: 465,
        smtp_security: Security::Implicit,
        auth_mechanism: Some(AuthMethod::PasswordPlain),
        max_connections: 5,
        idle_refresh_interval_seconds: 1080,
        folder_name_hints: hints([
            ("Sent", FolderRole::Sent),
            ("Draft", FolderRole::Drafts),
            ("Trash", FolderRole::Trash),
            ("Bulk Mail", FolderRole::Spam),
            ("Archive", FolderRole::Archive),
        ]),
        excluded_paths: BTreeSet::new(),
        requires_sent_append: true,
        labels_as_folders: false,
    }
}

fn icloud() -> ProviderProfile {
    ProviderProfile {
        identifier: "icloud".to_string(),
        display_name: "iCloud Mail".to_string(),
        domains: domains(["icloud.com", "me.com", "mac.com"]),
        imap_host: "imap.mail.me.com".to_string(),
        imap_port: 993,
        imap_security: Security::Implicit,
        smtp_host: "smtp.mail.me.com".to_string(),
        smtp_port: 587,
        smtp_security: Security::StartTls,
        auth_mechanism: Some(AuthMethod::PasswordPlain),
        max_connections: 5,
        idle_refresh_interval_seconds: 1080,
        folder_name_hints: hints([
            ("Sent Messages", FolderRole::Sent),
            ("Drafts", FolderRole::Drafts),
            ("Deleted Messages", FolderRole::Trash),
            ("Junk", FolderRole::Spam),
            ("Archive", FolderRole::Archive),
        ]),
        excluded_paths: BTreeSet::new(),
        requires_sent_append: true,
        labels_as_folders: false,
    }
}

fn fastmail() -> ProviderProfile {
    ProviderProfile {
        identifier: "fastmail".to_string(),
        display_name: "Fastmail".to_string(),
        domains: domains(["fastmail.com", "fastmail.fm", "messagingengine.com"]),
        imap_host: "imap.fastmail.com".to_string(),
        imap_port: 993,
        imap_security: Security::Implicit,
        smtp_host: "smtp.fastmail.com".to_string(),
        smtp_port: 465,
        smtp_security: Security::Implicit,
        auth_mechanism: Some(AuthMethod::PasswordPlain),
        max_connections: 10,
        idle_refresh_interval_seconds: 1500,
        folder_name_hints: hints([
            ("INBOX.Sent", FolderRole::Sent),
            ("INBOX.Drafts", FolderRole::Drafts),
            ("INBOX.Trash", FolderRole::Trash),
            ("INBOX.Spam", FolderRole::Spam),
            ("INBOX.Archive", FolderRole::Archive),
        ]),
        excluded_paths: BTreeSet::new(),
        requires_sent_append: true,
        labels_as_folders: false,
    }
}

fn generic() -> ProviderProfile {
    let mut profile = ProviderProfile::manual(String::new(), 993, Security::Implicit);
    profile.identifier = GENERIC_PROVIDER.to_string();
    profile.display_name = "Other IMAP server".to_string();
    profile
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_email_domain() {
        let registry = ProviderRegistry::built_in();
        let gmail = registry.lookup_by_email("someone@GMail.com").unwrap();
        assert_eq!(gmail.identifier, "gmail");
        assert_eq!(gmail.imap_host, "imap.gmail.com");
        assert_eq!(gmail.auth_mechanism, Some(AuthMethod::OAuth2));
        assert!(gmail.labels_as_folders);

        assert_eq!(registry.lookup_by_domain("me.com").unwrap().identifier, "icloud");
        assert!(registry.lookup_by_email("no-at-sign").is_none());
        assert!(registry.lookup_by_domain("example.org").is_none());
    }

    #[test]
    fn idle_refresh_stays_under_server_timeouts() {
        let registry = ProviderRegistry::built_in();
        let gmail = registry.get("gmail").unwrap();
        assert!(gmail.idle_refresh_interval() < Duration::from_secs(600));
        for profile in registry.profiles() {
            assert!(profile.idle_refresh_interval() < Duration::from_secs(29 * 60));
            assert!(profile.max_connections > 0);
        }
    }

    #[test]
    fn hints_and_exclusions_ignore_case() {
        let registry = ProviderRegistry::built_in();
        let gmail = registry.get("gmail").unwrap();
        assert_eq!(gmail.hint_for("[gmail]/sent mail"), Some(FolderRole::Sent));
        assert_eq!(gmail.hint_for("[Google Mail]/Bin"), Some(FolderRole::Trash));
        assert_eq!(gmail.hint_for("Receipts"), None);
        assert!(gmail.is_excluded("[GMAIL]/Important"));
    }

    #[test]
    fn imap_config_uses_profile_endpoint() {
        let registry = ProviderRegistry::built_in();
        let config = registry.get("outlook").unwrap().imap_config();
        assert_eq!(config.host, "outlook.office365.com");
        assert_eq!(config.port, 993);
        assert_eq!(config.security, Security::Implicit);
    }

    #[test]
    fn resolve_falls_back_to_discovery() {
        let registry = ProviderRegistry::built_in();
        let profile = registry.resolve("me@example.org");
        assert_eq!(profile.imap_host, "imap.example.org");
        assert_eq!(profile.auth_mechanism, None);
        assert!(profile.serves_domain("example.org"));

        assert_eq!(registry.resolve("garbage").identifier, GENERIC_PROVIDER);
    }

    #[test]
    fn overrides_replace_and_extend() {
        let json = r#"[
            {
                "identifier": "gmail",
                "displayName": "Gmail (work)",
                "domains": ["gmail.com"],
                "imapHost": "imap.gmail.com",
                "authMechanism": "oauth2",
                "maxConnections": 4,
                "idleRefreshIntervalSeconds": 300,
                "labelsAsFolders": true
            },
            {
                "identifier": "corp",
                "displayName": "Corp mail",
                "domains": ["corp.example", "gmail.com"],
                "imapHost": "mail.corp.example",
                "imapPort": 143,
                "imapSecurity": "starttls",
                "authMechanism": "passwordPlain",
                "folderNameHints": { "Gesendet": "sent" },
                "excludedPaths": ["Public"]
            }
        ]"#;
        let registry = ProviderRegistry::built_in().with_overrides_json(json).unwrap();

        let gmail = registry.get("gmail").unwrap();
        assert_eq!(gmail.max_connections, 4);
        assert_eq!(gmail.imap_security, Security::Implicit);
        assert!(gmail.folder_name_hints.is_empty());

        let corp = registry.lookup_by_domain("corp.example").unwrap();
        assert_eq!(corp.imap_port, 143);
        assert_eq!(corp.imap_security, Security::StartTls);
        assert_eq!(corp.auth_mechanism, Some(AuthMethod::PasswordPlain));
        assert_eq!(corp.hint_for("gesendet"), Some(FolderRole::Sent));
        assert_eq!(corp.max_connections, 5);
        assert!(!corp.requires_sent_append);
        // New profiles win domain lookups.
        assert_eq!(registry.lookup_by_domain("gmail.com").unwrap().identifier, "corp");
    }

    #[test]
    fn malformed_overrides_are_an_error() {
        assert!(
            ProviderRegistry::built_in()
                .with_overrides_json(r#"{"identifier": "x"}"#)
                .is_err()
        );
    }

    #[test]
    fn profile_json_round_trip() {
        let registry = ProviderRegistry::built_in();
        let yahoo = registry.get("yahoo").unwrap();
        let json = serde_json::to_string(yahoo).unwrap();
        assert!(json.contains("\"authMechanism\":\"passwordPlain\""));
        let back: ProviderProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(&back, yahoo);
    }
}
