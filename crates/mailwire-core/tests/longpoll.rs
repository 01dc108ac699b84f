//! IDLE refresh cadence.

#![allow(clippy::unwrap_used)]

mod common;

use std::ops::ControlFlow;
use std::time::Duration;

use mailwire_core::longpoll::{watch, watch_for};
use mailwire_core::negotiate::{Credentials, Negotiator};
use mailwire_core::provider::{ProviderProfile, ProviderRegistry};
use mailwire_imap::{Authenticated, Client, Error, IdleEvent, Security};
use tokio::time::Instant;
use tokio_test::io::{Builder, Mock};

use common::{PLAIN_IR, Scripted, ScriptedConnector};

fn login_script<'a>(builder: &'a mut Builder, capabilities: &str) -> &'a mut Builder {
    builder
        .read(b"* OK [CAPABILITY IMAP4rev1 SASL-IR AUTH=PLAIN] ready\r\n")
        .write(format!("A0000 AUTHENTICATE PLAIN {PLAIN_IR}\r\n").as_bytes())
        .read(format!("A0000 OK [CAPABILITY {capabilities}] welcome\r\n").as_bytes())
        .write(b"A0001 SELECT INBOX\r\n")
        .read(b"* 3 EXISTS\r\nA0001 OK [READ-WRITE] SELECT completed\r\n")
}

async fn login(mock: Mock) -> Client<Scripted, Authenticated> {
    let negotiator = Negotiator::new(ScriptedConnector::one(Scripted::tls(mock)));
    let profile = ProviderProfile::manual("imap.example.com", 993, Security::Implicit);
    let credentials = Credentials::AppPassword {
        username: "user@example.com".to_string(),
        password: "app-secret".to_string(),
    };
    negotiator.negotiate(&profile, &credentials).await.unwrap()
}

#[tokio::test(start_paused = true)]
async fn idle_is_reissued_before_the_server_drops_it() {
    let mock = login_script(&mut Builder::new(), "IMAP4rev1 IDLE")
        .write(b"A0002 IDLE\r\n")
        .read(b"+ idling\r\n")
        .write(b"DONE\r\n")
        .read(b"A0002 OK IDLE terminated\r\n")
        .write(b"A0003 IDLE\r\n")
        .read(b"+ idling\r\n")
        .wait(Duration::from_secs(20))
        .read(b"* 4 EXISTS\r\n")
        .write(b"DONE\r\n")
        .read(b"A0003 OK IDLE terminated\r\n")
        .build();

    let (mut inbox, _) = login(mock).await.select("INBOX").await.unwrap();
    let started = Instant::now();
    let mut events = Vec::new();

    watch(&mut inbox, Duration::from_secs(60), |event| {
        events.push(event);
        ControlFlow::Break(())
    })
    .await
    .unwrap();

    assert_eq!(events, vec![IdleEvent::Exists(4)]);
    assert!(started.elapsed() >= Duration::from_secs(80));
}

#[tokio::test(start_paused = true)]
async fn events_keep_the_round_open() {
    let mock = login_script(&mut Builder::new(), "IMAP4rev1 IDLE")
        .write(b"A0002 IDLE\r\n")
        .read(b"+ idling\r\n")
        .read(b"* 4 EXISTS\r\n")
        .read(b"* 1 EXPUNGE\r\n")
        .write(b"DONE\r\n")
        .read(b"A0002 OK IDLE terminated\r\n")
        .build();

    let (mut inbox, _) = login(mock).await.select("INBOX").await.unwrap();
    let mut seen = 0;
    let gmail = ProviderRegistry::built_in().get("gmail").cloned().unwrap();

    watch_for(&mut inbox, &gmail, |event| {
        seen += 1;
        if event == IdleEvent::Expunge(1) {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    })
    .await
    .unwrap();
    assert_eq!(seen, 2);
}

#[tokio::test]
async fn requires_idle_support() {
    let mock = login_script(&mut Builder::new(), "IMAP4rev1").build();
    let (mut inbox, _) = login(mock).await.select("INBOX").await.unwrap();

    let err = watch(&mut inbox, Duration::from_secs(60), |_| ControlFlow::Break(()))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)));
}
