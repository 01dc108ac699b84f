//! Pool scheduling, limits and cancellation.

#![allow(clippy::unwrap_used)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mailwire_core::negotiate::{AuthError, Mechanism, NegotiateError};
use mailwire_core::pool::{
    AccountId, CheckoutPriority, ConnectionPool, PoolConfig, PoolError, SessionFactory,
};
use mailwire_core::provider::ProviderRegistry;
use mailwire_core::time::MockClock;
use tokio_test::{assert_pending, assert_ready_err, assert_ready_ok, task};

/// A fake session that remembers who opened it.
#[derive(Debug)]
struct FakeSession {
    serial: u32,
    account: AccountId,
}

#[derive(Default)]
struct FakeFactory {
    opened: AtomicU32,
    open_delay: Option<Duration>,
    failing: Option<AccountId>,
}

impl FakeFactory {
    fn opened(&self) -> u32 {
        self.opened.load(Ordering::SeqCst)
    }
}

impl SessionFactory for FakeFactory {
    type Session = FakeSession;

    async fn open(&self, account: &AccountId) -> Result<FakeSession, PoolError> {
        if let Some(delay) = self.open_delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.as_ref() == Some(account) {
            return Err(NegotiateError::from(AuthError::TemporaryFailure {
                mechanism: Mechanism::Plain,
                detail: "backend down".to_string(),
            })
            .into());
        }
        let serial = self.opened.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(FakeSession {
            serial,
            account: account.clone(),
        })
    }
}

fn config(global_ceiling: usize) -> PoolConfig {
    PoolConfig {
        global_ceiling,
        checkout_timeout: Duration::from_secs(30),
        idle_timeout: Duration::from_secs(300),
    }
}

fn pool(global_ceiling: usize, accounts: &[(&str, usize)]) -> ConnectionPool<FakeFactory> {
    pool_with(FakeFactory::default(), global_ceiling, accounts)
}

fn pool_with(
    factory: FakeFactory,
    global_ceiling: usize,
    accounts: &[(&str, usize)],
) -> ConnectionPool<FakeFactory> {
    let pool = ConnectionPool::new(factory, config(global_ceiling));
    for (id, max) in accounts {
        pool.register_account(AccountId::from(*id), *max);
    }
    pool
}

#[tokio::test]
async fn returned_sessions_are_reused() {
    let pool = pool(10, &[("a", 2)]);
    let a = AccountId::from("a");

    let first = pool.checkout(&a, CheckoutPriority::Normal).await.unwrap();
    assert_eq!(first.serial, 1);
    assert_eq!(first.account().as_str(), "a");
    assert_eq!((*first).account, a);
    drop(first);

    let again = pool.checkout(&a, CheckoutPriority::Normal).await.unwrap();
    assert_eq!(again.serial, 1);
    assert_eq!(pool.factory().opened(), 1);
    assert_eq!(pool.stats().checked_out(), 1);
}

#[tokio::test]
async fn unknown_account_fails_immediately() {
    let pool = pool(10, &[]);
    let err = pool
        .checkout(&AccountId::from("nobody"), CheckoutPriority::Normal)
        .await
        .unwrap_err();
    assert!(matches!(err, PoolError::UnknownAccount(_)));
}

#[tokio::test]
async fn per_account_ceiling_queues_extra_checkouts() {
    let pool = pool(10, &[("a", 2)]);
    let a = AccountId::from("a");

    let first = pool.checkout(&a, CheckoutPriority::Normal).await.unwrap();
    let _second = pool.checkout(&a, CheckoutPriority::Normal).await.unwrap();

    let mut third = task::spawn(pool.checkout(&a, CheckoutPriority::Normal));
    assert_pending!(third.poll());
    assert_eq!(pool.stats().waiting, 1);
    assert_eq!(pool.account_stats(&a).unwrap().open, 2);

    drop(first);
    assert!(third.is_woken());
    let third = assert_ready_ok!(third.poll());
    assert_eq!(third.serial, 1);
    assert_eq!(pool.factory().opened(), 2);
}

#[tokio::test(start_paused = true)]
async fn checkout_times_out_when_nothing_frees_up() {
    let pool = pool(10, &[("a", 1)]);
    let a = AccountId::from("a");
    let _held = pool.checkout(&a, CheckoutPriority::Interactive).await.unwrap();

    let err = pool
        .checkout(&a, CheckoutPriority::Interactive)
        .await
        .unwrap_err();
    match err {
        PoolError::CheckoutTimeout { account, waited } => {
            assert_eq!(account, a);
            assert!(waited >= Duration::from_secs(30));
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(pool.stats().waiting, 0);
}

#[tokio::test(start_paused = true)]
async fn focused_account_then_priority_then_arrival() {
    let pool = pool(1, &[("a", 2), ("b", 2)]);
    let a = AccountId::from("a");
    let b = AccountId::from("b");
    let order = Arc::new(Mutex::new(Vec::new()));

    let held = pool.checkout(&a, CheckoutPriority::Normal).await.unwrap();

    let mut handles = Vec::new();
    for (name, account, priority) in [
        ("a-background", a.clone(), CheckoutPriority::Background),
        ("a-interactive", a.clone(), CheckoutPriority::Interactive),
        ("b", b.clone(), CheckoutPriority::Normal),
    ] {
        let pool = pool.clone();
        let order = Arc::clone(&order);
        handles.push(tokio::spawn(async move {
            let session = pool.checkout(&account, priority).await.unwrap();
            order.lock().unwrap().push(name);
            tokio::time::sleep(Duration::from_millis(10)).await;
            drop(session);
        }));
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert_eq!(pool.stats().waiting, 3);

    pool.set_focused_account(Some(b));
    drop(held);
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(
        *order.lock().unwrap(),
        vec!["b", "a-interactive", "a-background"]
    );
    assert!(pool.stats().open <= 1);
}

#[tokio::test]
async fn global_ceiling_evicts_idle_session_of_other_account() {
    let pool = pool(1, &[("a", 1), ("b", 1)]);
    let a = AccountId::from("a");
    let b = AccountId::from("b");

    drop(pool.checkout(&a, CheckoutPriority::Normal).await.unwrap());
    assert_eq!(pool.stats().idle, 1);

    let session = pool.checkout(&b, CheckoutPriority::Normal).await.unwrap();
    assert_eq!(session.account(), &b);
    assert_eq!(pool.stats().open, 1);
    assert_eq!(pool.account_stats(&a).unwrap().open, 0);
}

#[tokio::test]
async fn cancelled_waiter_leaves_the_queue() {
    let pool = pool(10, &[("a", 1)]);
    let a = AccountId::from("a");
    let _held = pool.checkout(&a, CheckoutPriority::Normal).await.unwrap();

    let mut waiter = task::spawn(pool.checkout(&a, CheckoutPriority::Normal));
    assert_pending!(waiter.poll());
    assert_eq!(pool.stats().waiting, 1);

    drop(waiter);
    assert_eq!(pool.stats().waiting, 0);
}

#[tokio::test]
async fn grant_sent_to_a_cancelled_waiter_is_returned() {
    let pool = pool(10, &[("a", 1)]);
    let a = AccountId::from("a");
    let held = pool.checkout(&a, CheckoutPriority::Normal).await.unwrap();

    let mut waiter = task::spawn(pool.checkout(&a, CheckoutPriority::Normal));
    assert_pending!(waiter.poll());

    // The session is handed to the waiter, which never looks at it.
    drop(held);
    assert!(waiter.is_woken());
    drop(waiter);

    let stats = pool.stats();
    assert_eq!((stats.open, stats.idle, stats.waiting), (1, 1, 0));
    let reused = pool.checkout(&a, CheckoutPriority::Normal).await.unwrap();
    assert_eq!(reused.serial, 1);
}

#[tokio::test(start_paused = true)]
async fn cancelled_open_releases_reserved_slot() {
    let factory = FakeFactory {
        open_delay: Some(Duration::from_secs(5)),
        ..FakeFactory::default()
    };
    let pool = pool_with(factory, 10, &[("a", 1)]);
    let a = AccountId::from("a");

    let mut opening = task::spawn(pool.checkout(&a, CheckoutPriority::Normal));
    assert_pending!(opening.poll());
    assert_eq!(pool.account_stats(&a).unwrap().open, 1);

    drop(opening);
    assert_eq!(pool.account_stats(&a).unwrap().open, 0);
    assert_eq!(pool.stats().open, 0);

    let session = pool.checkout(&a, CheckoutPriority::Normal).await.unwrap();
    assert_eq!(session.serial, 1);
}

#[tokio::test]
async fn failed_open_releases_reserved_slot() {
    let factory = FakeFactory {
        failing: Some(AccountId::from("a")),
        ..FakeFactory::default()
    };
    let pool = pool_with(factory, 10, &[("a", 1)]);
    let a = AccountId::from("a");

    let err = pool
        .checkout(&a, CheckoutPriority::Normal)
        .await
        .unwrap_err();
    assert!(matches!(err, PoolError::Session(_)));
    assert!(err.is_retryable());
    assert_eq!(pool.stats().open, 0);
}

#[tokio::test]
async fn discarded_session_frees_its_slot() {
    let pool = pool(10, &[("a", 1)]);
    let a = AccountId::from("a");

    let session = pool.checkout(&a, CheckoutPriority::Normal).await.unwrap();
    session.discard();
    assert_eq!(pool.stats().open, 0);

    let fresh = pool.checkout(&a, CheckoutPriority::Normal).await.unwrap();
    assert_eq!(fresh.serial, 2);
}

#[tokio::test]
async fn removing_an_account_revokes_waiters_and_closes_sessions() {
    let pool = pool(10, &[("a", 1), ("b", 1)]);
    let a = AccountId::from("a");
    let held = pool.checkout(&a, CheckoutPriority::Normal).await.unwrap();
    drop(pool.checkout(&AccountId::from("b"), CheckoutPriority::Normal).await.unwrap());

    let mut waiter = task::spawn(pool.checkout(&a, CheckoutPriority::Normal));
    assert_pending!(waiter.poll());

    pool.remove_account(&a);
    assert!(waiter.is_woken());
    let err = assert_ready_err!(waiter.poll());
    assert!(matches!(err, PoolError::AccountRemoved(_)));
    drop(waiter);

    drop(held);
    let stats = pool.stats();
    assert_eq!((stats.accounts, stats.open, stats.idle), (1, 1, 1));
    assert!(matches!(
        pool.checkout(&a, CheckoutPriority::Normal).await,
        Err(PoolError::UnknownAccount(_))
    ));
}

#[tokio::test]
async fn provider_profile_sets_the_ceiling() {
    let registry = ProviderRegistry::built_in();
    let gmail = registry.get("gmail").unwrap();
    let pool = pool(100, &[]);
    let a = AccountId::from("a");

    pool.register_profile(a.clone(), gmail);
    assert_eq!(pool.account_stats(&a).unwrap().max, gmail.max_connections);

    let mut tight = gmail.clone();
    tight.max_connections = 1;
    pool.register_profile(a.clone(), &tight);
    assert_eq!(pool.account_stats(&a).unwrap().max, 1);

    let held = pool.checkout(&a, CheckoutPriority::Normal).await.unwrap();
    let mut waiter = task::spawn(pool.checkout(&a, CheckoutPriority::Normal));
    assert_pending!(waiter.poll());
    drop(held);
    assert!(waiter.is_woken());
    assert_ready_ok!(waiter.poll());
}

#[tokio::test]
async fn reclaim_closes_only_expired_sessions() {
    let clock = Arc::new(MockClock::new());
    let pool = ConnectionPool::with_clock(FakeFactory::default(), config(10), clock.clone());
    pool.register_account(AccountId::from("a"), 2);
    let a = AccountId::from("a");

    let first = pool.checkout(&a, CheckoutPriority::Normal).await.unwrap();
    let second = pool.checkout(&a, CheckoutPriority::Normal).await.unwrap();
    drop(first);
    clock.advance(Duration::from_secs(200));
    drop(second);

    clock.advance(Duration::from_secs(99));
    assert_eq!(pool.reclaim_idle(), 0);

    clock.advance(Duration::from_secs(1));
    assert_eq!(pool.reclaim_idle(), 1);
    assert_eq!(pool.stats().idle, 1);

    clock.advance(Duration::from_secs(200));
    assert_eq!(pool.reclaim_idle(), 1);
    assert_eq!(pool.stats().open, 0);
}

#[tokio::test(start_paused = true)]
async fn reaper_reclaims_in_the_background() {
    let pool = pool(10, &[("a", 1)]);
    let a = AccountId::from("a");
    drop(pool.checkout(&a, CheckoutPriority::Normal).await.unwrap());

    let reaper = pool.spawn_reaper(Duration::from_secs(60));
    tokio::time::sleep(Duration::from_secs(250)).await;
    assert_eq!(pool.stats().idle, 1);

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(pool.stats().open, 0);

    drop(pool);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(reaper.is_finished());
}
