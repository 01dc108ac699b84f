//! Negotiation against scripted servers.

#![allow(clippy::unwrap_used)]

mod common;

use chrono::{Duration as ChronoDuration, Utc};
use mailwire_core::negotiate::{
    AuthError, Credentials, Mechanism, NegotiateError, NegotiationState, Negotiator,
    TransportError,
};
use mailwire_core::provider::{ProviderProfile, ProviderRegistry};
use mailwire_imap::Security;
use mailwire_oauth::{EmailResolutionStrategy, SaslMechanism, Token};
use tokio_test::io::Builder;

use common::{PLAIN_IR, Scripted, ScriptedConnector};

fn app_password() -> Credentials {
    Credentials::AppPassword {
        username: "user@example.com".to_string(),
        password: "app-secret".to_string(),
    }
}

fn oauth(address: &str, token: &str) -> Credentials {
    Credentials::OAuthToken {
        token: Token::bearer(token),
        strategy: EmailResolutionStrategy::UserSupplied(address.to_string()),
    }
}

fn implicit() -> ProviderProfile {
    ProviderProfile::manual("imap.example.com", 993, Security::Implicit)
}

#[tokio::test]
async fn starttls_upgrade_then_plain() {
    let before = Builder::new()
        .read(b"* OK [CAPABILITY IMAP4rev1 STARTTLS LOGINDISABLED] ready\r\n")
        .write(b"A0000 STARTTLS\r\n")
        .read(b"A0000 OK Begin TLS negotiation now\r\n")
        .build();
    let after = Builder::new()
        .write(b"A0001 CAPABILITY\r\n")
        .read(b"* CAPABILITY IMAP4rev1 SASL-IR AUTH=PLAIN\r\n")
        .read(b"A0001 OK done\r\n")
        .write(format!("A0002 AUTHENTICATE PLAIN {PLAIN_IR}\r\n").as_bytes())
        .read(b"A0002 OK [CAPABILITY IMAP4rev1 IDLE] authenticated\r\n")
        .build();

    let negotiator = Negotiator::new(ScriptedConnector::one(Scripted::upgradable(before, after)));
    let profile = ProviderProfile::manual("imap.example.com", 143, Security::StartTls);

    let client = negotiator.negotiate(&profile, &app_password()).await.unwrap();
    assert!(client.is_secure());
    assert!(client.supports_idle());
}

#[tokio::test]
async fn missing_starttls_stops_before_credentials() {
    let mock = Builder::new()
        .read(b"* OK [CAPABILITY IMAP4rev1 AUTH=PLAIN] ready\r\n")
        .build();
    let negotiator = Negotiator::new(ScriptedConnector::one(Scripted::plain(mock)));
    let profile = ProviderProfile::manual("imap.example.com", 143, Security::StartTls);

    let err = negotiator.negotiate(&profile, &app_password()).await.unwrap_err();
    match err {
        NegotiateError::Transport { state, source } => {
            assert_eq!(state, NegotiationState::TransportConnected);
            assert!(matches!(source, TransportError::UpgradeNotAdvertised { ref host } if host == "imap.example.com"));
        }
        other => panic!("expected transport error, got {other:?}"),
    }
}

#[tokio::test]
async fn plaintext_profile_is_refused() {
    let mock = Builder::new()
        .read(b"* OK [CAPABILITY IMAP4rev1 AUTH=PLAIN] ready\r\n")
        .build();
    let negotiator = Negotiator::new(ScriptedConnector::one(Scripted::plain(mock)));
    let profile = ProviderProfile::manual("imap.example.com", 143, Security::None);

    let err = negotiator.negotiate(&profile, &app_password()).await.unwrap_err();
    assert!(matches!(
        err,
        NegotiateError::Transport { source: TransportError::Insecure { .. }, .. }
    ));
}

#[tokio::test]
async fn implicit_tls_must_be_secure() {
    let mock = Builder::new()
        .read(b"* OK [CAPABILITY IMAP4rev1 AUTH=PLAIN] ready\r\n")
        .build();
    let negotiator = Negotiator::new(ScriptedConnector::one(Scripted::plain(mock)));

    let err = negotiator.negotiate(&implicit(), &app_password()).await.unwrap_err();
    assert!(matches!(
        err,
        NegotiateError::Transport { source: TransportError::Handshake { .. }, .. }
    ));
}

#[tokio::test]
async fn connect_failure_is_reported_disconnected() {
    let negotiator = Negotiator::new(ScriptedConnector::new(Vec::new()));
    let err = negotiator.negotiate(&implicit(), &app_password()).await.unwrap_err();
    assert!(matches!(
        err,
        NegotiateError::Transport { state: NegotiationState::Disconnected, .. }
    ));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn unavailable_is_a_temporary_failure() {
    let mock = Builder::new()
        .read(b"* OK [CAPABILITY IMAP4rev1 SASL-IR AUTH=PLAIN] ready\r\n")
        .write(format!("A0000 AUTHENTICATE PLAIN {PLAIN_IR}\r\n").as_bytes())
        .read(b"A0000 NO [UNAVAILABLE] Authentication backend down\r\n")
        .build();
    let negotiator = Negotiator::new(ScriptedConnector::one(Scripted::tls(mock)));

    let err = negotiator.negotiate(&implicit(), &app_password()).await.unwrap_err();
    assert!(err.is_retryable());
    assert!(matches!(
        err,
        NegotiateError::Auth(AuthError::TemporaryFailure { mechanism: Mechanism::Plain, .. })
    ));
}

#[tokio::test]
async fn rejected_token_explains_how_to_recover() {
    let ir = SaslMechanism::XOAuth2.initial_response("user@gmail.com", "ya29.token");
    let mock = Builder::new()
        .read(b"* OK [CAPABILITY IMAP4rev1 SASL-IR AUTH=XOAUTH2 AUTH=PLAIN] ready\r\n")
        .write(format!("A0000 AUTHENTICATE XOAUTH2 {ir}\r\n").as_bytes())
        .read(b"A0000 NO [AUTHENTICATIONFAILED] Invalid credentials (Failure)\r\n")
        .build();
    let negotiator = Negotiator::new(ScriptedConnector::one(Scripted::tls(mock)));
    let gmail = ProviderRegistry::built_in().get("gmail").cloned().unwrap();

    let err = negotiator
        .negotiate(&gmail, &oauth("user@gmail.com", "ya29.token"))
        .await
        .unwrap_err();
    assert!(!err.is_retryable());
    assert!(matches!(
        err,
        NegotiateError::Auth(AuthError::CredentialRejected { mechanism: Mechanism::XOAuth2, .. })
    ));
    assert!(err.to_string().contains("Sign in again"));
}

#[tokio::test]
async fn bearer_challenge_status_decides_retry() {
    let jwt = "eyJhbGciOiJub25lIn0.eyJlbWFpbCI6InVzZXJAZXhhbXBsZS5jb20ifQ.sig";
    let ir = SaslMechanism::OAuthBearer.initial_response("user@example.com", "tok");
    let mock = Builder::new()
        .read(b"* OK [CAPABILITY IMAP4rev1 SASL-IR AUTH=OAUTHBEARER AUTH=XOAUTH2] ready\r\n")
        .write(format!("A0000 AUTHENTICATE OAUTHBEARER {ir}\r\n").as_bytes())
        .read(b"+ eyJzdGF0dXMiOiI1MDMiLCJzY2hlbWVzIjoiYmVhcmVyIn0=\r\n")
        .write(b"AQ==\r\n")
        .read(b"A0000 NO SASL authentication failed\r\n")
        .build();
    let negotiator = Negotiator::new(ScriptedConnector::one(Scripted::tls(mock)));
    let credentials = Credentials::OAuthToken {
        token: Token::bearer("tok"),
        strategy: EmailResolutionStrategy::IdentityToken(jwt.to_string()),
    };

    let err = negotiator.negotiate(&implicit(), &credentials).await.unwrap_err();
    assert!(err.is_retryable());
    assert!(err.to_string().contains("bearer status 503"));
}

#[tokio::test]
async fn unreadable_identity_token_never_reaches_the_server() {
    let mock = Builder::new()
        .read(b"* OK [CAPABILITY IMAP4rev1 SASL-IR AUTH=OAUTHBEARER] ready\r\n")
        .build();
    let negotiator = Negotiator::new(ScriptedConnector::one(Scripted::tls(mock)));
    let credentials = Credentials::OAuthToken {
        token: Token::bearer("tok"),
        strategy: EmailResolutionStrategy::IdentityToken("not-a-jwt".to_string()),
    };

    let err = negotiator.negotiate(&implicit(), &credentials).await.unwrap_err();
    assert!(matches!(
        err,
        NegotiateError::Auth(AuthError::IdentityUnresolved { mechanism: Mechanism::OAuthBearer, .. })
    ));
}

#[tokio::test]
async fn expired_token_is_rejected_locally() {
    let mock = Builder::new()
        .read(b"* OK [CAPABILITY IMAP4rev1 SASL-IR AUTH=XOAUTH2] ready\r\n")
        .build();
    let negotiator = Negotiator::new(ScriptedConnector::one(Scripted::tls(mock)));
    let credentials = Credentials::OAuthToken {
        token: Token::bearer("old").with_expires_at(Utc::now() - ChronoDuration::minutes(5)),
        strategy: EmailResolutionStrategy::UserSupplied("user@example.com".to_string()),
    };

    let err = negotiator.negotiate(&implicit(), &credentials).await.unwrap_err();
    assert!(matches!(
        err,
        NegotiateError::Auth(AuthError::CredentialRejected { mechanism: Mechanism::XOAuth2, .. })
    ));
}

#[tokio::test]
async fn login_fallback_without_auth_plain() {
    let mock = Builder::new()
        .read(b"* OK [CAPABILITY IMAP4rev1] ready\r\n")
        .write(b"A0000 LOGIN user@example.com app-secret\r\n")
        .read(b"A0000 OK LOGIN completed\r\n")
        .write(b"A0001 CAPABILITY\r\n")
        .read(b"* CAPABILITY IMAP4rev1 IDLE\r\nA0001 OK\r\n")
        .build();
    let negotiator = Negotiator::new(ScriptedConnector::one(Scripted::tls(mock)));

    let client = negotiator.negotiate(&implicit(), &app_password()).await.unwrap();
    assert!(client.supports_idle());
}

#[tokio::test]
async fn no_usable_mechanism() {
    let mock = Builder::new()
        .read(b"* OK [CAPABILITY IMAP4rev1 LOGINDISABLED AUTH=XOAUTH2] ready\r\n")
        .build();
    let negotiator = Negotiator::new(ScriptedConnector::one(Scripted::tls(mock)));

    let err = negotiator.negotiate(&implicit(), &app_password()).await.unwrap_err();
    assert!(matches!(
        err,
        NegotiateError::Auth(AuthError::MechanismUnsupported { .. })
    ));
}
