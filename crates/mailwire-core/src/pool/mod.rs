//! Authenticated session pool.
//!
//! Every account has its own ceiling and all accounts share a global one.
//! A checkout that would exceed either waits in a single queue, bounded by
//! [`PoolConfig::checkout_timeout`]. Whenever capacity frees up the queue is
//! served in rank order:
//!
//! 1. the focused account (the one on screen)
//! 2. [`CheckoutPriority`], interactive first
//! 3. arrival order
//!
//! A waiter blocked only by the global ceiling may evict an idle session of
//! another account. Sessions idle longer than [`PoolConfig::idle_timeout`]
//! are closed by [`ConnectionPool::reclaim_idle`] or the background reaper.
//!
//! Dropping a pending checkout gives back whatever it held: the queue entry,
//! a grant that was sent but not yet received, or a reserved slot whose
//! session was still being opened.
//!
//! # Example
//!
//! ```ignore
//! let pool = ConnectionPool::new(factory, PoolConfig::default());
//! pool.register_profile(AccountId::from("work"), &profile);
//! pool.set_focused_account(Some(AccountId::from("work")));
//!
//! let mut session = pool.checkout(&"work".into(), CheckoutPriority::Interactive).await?;
//! session.noop().await?;
//! // back in the pool on drop
//! ```

mod config;
mod factory;

use std::cmp::Reverse;
use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

pub use self::config::{CheckoutPriority, DEFAULT_IDLE_TIMEOUT, PoolConfig};
pub use self::factory::{AccountBinding, CredentialKind, NegotiatingFactory, SessionFactory};
use crate::credentials::CredentialError;
use crate::negotiate::NegotiateError;
use crate::provider::ProviderProfile;
use crate::time::{Clock, SystemClock};

/// Identifies an account within the pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Creates an id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for AccountId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Checkout failures.
#[derive(Debug, Error)]
pub enum PoolError {
    /// No capacity freed up in time.
    #[error("No session for {account} became available within {waited:?}")]
    CheckoutTimeout {
        /// Account asked for.
        account: AccountId,
        /// Time spent queued.
        waited: Duration,
    },

    /// The account was removed while the checkout waited.
    #[error("Account {0} was removed")]
    AccountRemoved(AccountId),

    /// The account was never registered.
    #[error("Account {0} is not registered")]
    UnknownAccount(AccountId),

    /// Opening a new session failed.
    #[error(transparent)]
    Session(#[from] NegotiateError),

    /// The account's secret could not be read.
    #[error(transparent)]
    Credentials(#[from] CredentialError),
}

impl PoolError {
    /// Returns true if retrying the checkout may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::CheckoutTimeout { .. } => true,
            Self::Session(e) => e.is_retryable(),
            Self::AccountRemoved(_) | Self::UnknownAccount(_) | Self::Credentials(_) => false,
        }
    }
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Registered accounts.
    pub accounts: usize,
    /// Sessions open or being opened, checked out or idle.
    pub open: usize,
    /// Sessions sitting in the pool.
    pub idle: usize,
    /// Queued checkouts.
    pub waiting: usize,
}

impl PoolStats {
    /// Sessions currently lent out or being opened.
    #[must_use]
    pub const fn checked_out(&self) -> usize {
        self.open.saturating_sub(self.idle)
    }
}

/// Occupancy of one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountStats {
    /// Per-account ceiling.
    pub max: usize,
    /// Sessions open or being opened.
    pub open: usize,
    /// Sessions sitting in the pool.
    pub idle: usize,
}

enum Grant<S> {
    Reuse(S),
    Create,
}

impl<S> Grant<S> {
    fn into_session(self) -> Option<S> {
        match self {
            Self::Reuse(session) => Some(session),
            Self::Create => None,
        }
    }
}

struct IdleSession<S> {
    session: S,
    since: Instant,
}

struct Slot<S> {
    max: usize,
    /// Includes idle sessions and reserved slots.
    open: usize,
    idle: Vec<IdleSession<S>>,
    generation: u64,
}

struct Waiter<S> {
    id: u64,
    account: AccountId,
    generation: u64,
    priority: CheckoutPriority,
    tx: oneshot::Sender<Grant<S>>,
}

struct State<S> {
    accounts: HashMap<AccountId, Slot<S>>,
    /// Includes sessions of removed accounts that are still checked out.
    open_total: usize,
    waiters: Vec<Waiter<S>>,
    focused: Option<AccountId>,
    next_id: u64,
    next_generation: u64,
}

impl<S> State<S> {
    fn new() -> Self {
        Self {
            accounts: HashMap::new(),
            open_total: 0,
            waiters: Vec::new(),
            focused: None,
            next_id: 0,
            next_generation: 0,
        }
    }

    /// Returns a session or a reserved slot. Yields the session back if it
    /// cannot be pooled.
    fn give_back(
        &mut self,
        account: &AccountId,
        generation: u64,
        session: Option<S>,
        now: Instant,
    ) -> Option<S> {
        match self
            .accounts
            .get_mut(account)
            .filter(|slot| slot.generation == generation)
        {
            Some(slot) => match session {
                Some(session) => {
                    slot.idle.push(IdleSession { session, since: now });
                    None
                }
                None => {
                    slot.open = slot.open.saturating_sub(1);
                    self.open_total = self.open_total.saturating_sub(1);
                    None
                }
            },
            None => {
                self.open_total = self.open_total.saturating_sub(1);
                session
            }
        }
    }

    fn evict_for(&mut self, account: &AccountId) -> Option<S> {
        let (victim, index) = self
            .accounts
            .iter()
            .filter(|(id, _)| *id != account)
            .flat_map(|(id, slot)| {
                slot.idle
                    .iter()
                    .enumerate()
                    .map(move |(i, idle)| (idle.since, id, i))
            })
            .min_by_key(|(since, _, _)| *since)
            .map(|(_, id, i)| (id.clone(), i))?;

        let slot = self.accounts.get_mut(&victim)?;
        let idle = slot.idle.remove(index);
        slot.open = slot.open.saturating_sub(1);
        self.open_total = self.open_total.saturating_sub(1);
        debug!(evicted = %victim, for_account = %account, "evicting idle session");
        Some(idle.session)
    }

    fn try_grant(
        &mut self,
        account: &AccountId,
        ceiling: usize,
        closed: &mut Vec<S>,
    ) -> Option<Grant<S>> {
        let slot = self.accounts.get_mut(account)?;
        if let Some(idle) = slot.idle.pop() {
            return Some(Grant::Reuse(idle.session));
        }
        if slot.open >= slot.max {
            return None;
        }
        if self.open_total >= ceiling {
            closed.push(self.evict_for(account)?);
        }
        let slot = self.accounts.get_mut(account)?;
        slot.open += 1;
        self.open_total += 1;
        Some(Grant::Create)
    }

    /// Serves queued checkouts in rank order. Returns sessions to close.
    fn dispatch(&mut self, ceiling: usize, now: Instant) -> Vec<S> {
        let mut closed = Vec::new();
        if self.waiters.is_empty() {
            return closed;
        }

        let focused = self.focused.clone();
        self.waiters.sort_by_key(|w| {
            (
                focused.as_ref() != Some(&w.account),
                Reverse(w.priority),
                w.id,
            )
        });

        let mut i = 0;
        while i < self.waiters.len() {
            let waiter = &self.waiters[i];
            if waiter.tx.is_closed() || !self.accounts.contains_key(&waiter.account) {
                self.waiters.remove(i);
                continue;
            }
            let account = waiter.account.clone();
            match self.try_grant(&account, ceiling, &mut closed) {
                Some(grant) => {
                    let waiter = self.waiters.remove(i);
                    trace!(%account, waiter = waiter.id, "granting checkout");
                    if let Err(grant) = waiter.tx.send(grant) {
                        closed.extend(self.give_back(
                            &account,
                            waiter.generation,
                            grant.into_session(),
                            now,
                        ));
                    }
                }
                None => i += 1,
            }
        }
        closed
    }
}

struct Shared<F: SessionFactory> {
    factory: F,
    config: PoolConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<State<F::Session>>,
}

impl<F: SessionFactory> Shared<F> {
    fn lock(&self) -> MutexGuard<'_, State<F::Session>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn give_back(&self, account: &AccountId, generation: u64, session: Option<F::Session>) {
        let now = self.clock.now();
        let mut state = self.lock();
        let mut closed: Vec<_> = state
            .give_back(account, generation, session, now)
            .into_iter()
            .collect();
        closed.extend(state.dispatch(self.config.global_ceiling, now));
        drop(state);
        drop(closed);
    }
}

/// A queued checkout. Dropping it before the grant is taken hands back
/// whatever was granted.
struct Waiting<'a, F: SessionFactory> {
    shared: &'a Shared<F>,
    account: &'a AccountId,
    generation: u64,
    id: u64,
    rx: oneshot::Receiver<Grant<F::Session>>,
    armed: bool,
}

impl<F: SessionFactory> Drop for Waiting<'_, F> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let now = self.shared.clock.now();
        let mut state = self.shared.lock();
        let mut closed = Vec::new();
        if let Some(pos) = state.waiters.iter().position(|w| w.id == self.id) {
            state.waiters.remove(pos);
        } else {
            self.rx.close();
            if let Ok(grant) = self.rx.try_recv() {
                trace!(account = %self.account, "returning grant of cancelled checkout");
                closed.extend(state.give_back(
                    self.account,
                    self.generation,
                    grant.into_session(),
                    now,
                ));
                closed.extend(state.dispatch(self.shared.config.global_ceiling, now));
            }
        }
        drop(state);
        drop(closed);
    }
}

/// A slot reserved for a session being opened.
struct Reservation<'a, F: SessionFactory> {
    shared: &'a Shared<F>,
    account: &'a AccountId,
    generation: u64,
    armed: bool,
}

impl<F: SessionFactory> Drop for Reservation<'_, F> {
    fn drop(&mut self) {
        if self.armed {
            self.shared.give_back(self.account, self.generation, None);
        }
    }
}

/// Shared pool of authenticated sessions. Cloning shares the pool.
pub struct ConnectionPool<F: SessionFactory> {
    shared: Arc<Shared<F>>,
}

impl<F: SessionFactory> Clone for ConnectionPool<F> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<F: SessionFactory> fmt::Debug for ConnectionPool<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("config", &self.shared.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl<F: SessionFactory> ConnectionPool<F> {
    /// Creates a pool that opens sessions with `factory`.
    pub fn new(factory: F, config: PoolConfig) -> Self {
        Self::with_clock(factory, config, Arc::new(SystemClock))
    }

    /// Creates a pool that timestamps idle sessions with `clock`.
    pub fn with_clock(factory: F, config: PoolConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            shared: Arc::new(Shared {
                factory,
                config,
                clock,
                state: Mutex::new(State::new()),
            }),
        }
    }

    /// The session factory.
    pub fn factory(&self) -> &F {
        &self.shared.factory
    }

    /// The pool configuration.
    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// Registers `account` with at most `max_sessions` open at once, or
    /// updates the ceiling of a registered account.
    pub fn register_account(&self, account: AccountId, max_sessions: usize) {
        let max = max_sessions.max(1);
        let now = self.shared.clock.now();
        let mut guard = self.shared.lock();
        let state = &mut *guard;
        if let Some(slot) = state.accounts.get_mut(&account) {
            slot.max = max;
        } else {
            let generation = state.next_generation;
            state.next_generation += 1;
            state.accounts.insert(
                account.clone(),
                Slot {
                    max,
                    open: 0,
                    idle: Vec::new(),
                    generation,
                },
            );
        }
        debug!(%account, max, "registered account");
        let closed = state.dispatch(self.shared.config.global_ceiling, now);
        drop(guard);
        drop(closed);
    }

    /// Registers `account` with the ceiling its provider allows.
    pub fn register_profile(&self, account: AccountId, profile: &ProviderProfile) {
        self.register_account(account, profile.max_connections);
    }

    /// Removes `account`: closes its idle sessions, fails its queued
    /// checkouts and closes its checked-out sessions when they come back.
    pub fn remove_account(&self, account: &AccountId) {
        let now = self.shared.clock.now();
        let mut state = self.shared.lock();
        let Some(slot) = state.accounts.remove(account) else {
            return;
        };
        state.open_total = state.open_total.saturating_sub(slot.idle.len());
        let (revoked, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut state.waiters)
            .into_iter()
            .partition(|w| &w.account == account);
        state.waiters = kept;
        if state.focused.as_ref() == Some(account) {
            state.focused = None;
        }
        let closed = state.dispatch(self.shared.config.global_ceiling, now);
        drop(state);

        info!(
            %account,
            closed = slot.idle.len(),
            revoked = revoked.len(),
            "removed account"
        );
        drop(slot);
        drop(revoked);
        drop(closed);
    }

    /// Sets the account whose checkouts are served first.
    pub fn set_focused_account(&self, account: Option<AccountId>) {
        let now = self.shared.clock.now();
        let mut state = self.shared.lock();
        debug!(focused = ?account, "focus changed");
        state.focused = account;
        let closed = state.dispatch(self.shared.config.global_ceiling, now);
        drop(state);
        drop(closed);
    }

    /// Checks out a session for `account`, reusing an idle one or opening a
    /// new one.
    ///
    /// Waits up to [`PoolConfig::checkout_timeout`] for capacity. Dropping
    /// the returned future cancels the checkout cleanly.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::CheckoutTimeout`] if no capacity freed up in
    /// time, [`PoolError::UnknownAccount`] or [`PoolError::AccountRemoved`]
    /// for missing accounts, and the factory's error if opening failed.
    pub async fn checkout(
        &self,
        account: &AccountId,
        priority: CheckoutPriority,
    ) -> Result<PooledSession<F>, PoolError> {
        let shared = &*self.shared;
        let started = tokio::time::Instant::now();
        let mut waiting = {
            let now = shared.clock.now();
            let mut state = shared.lock();
            let generation = match state.accounts.get(account) {
                Some(slot) => slot.generation,
                None => return Err(PoolError::UnknownAccount(account.clone())),
            };
            let (tx, rx) = oneshot::channel();
            let id = state.next_id;
            state.next_id += 1;
            state.waiters.push(Waiter {
                id,
                account: account.clone(),
                generation,
                priority,
                tx,
            });
            let closed = state.dispatch(shared.config.global_ceiling, now);
            drop(state);
            drop(closed);
            Waiting {
                shared,
                account,
                generation,
                id,
                rx,
                armed: true,
            }
        };

        let grant =
            match tokio::time::timeout(shared.config.checkout_timeout, &mut waiting.rx).await {
                Ok(Ok(grant)) => grant,
                Ok(Err(_)) => {
                    waiting.armed = false;
                    return Err(PoolError::AccountRemoved(account.clone()));
                }
                Err(_) => {
                    let waited = started.elapsed();
                    warn!(%account, ?priority, ?waited, "checkout timed out");
                    return Err(PoolError::CheckoutTimeout {
                        account: account.clone(),
                        waited,
                    });
                }
            };
        waiting.armed = false;
        let generation = waiting.generation;
        drop(waiting);

        let session = match grant {
            Grant::Reuse(session) => {
                trace!(%account, "reusing idle session");
                session
            }
            Grant::Create => {
                let mut reservation = Reservation {
                    shared,
                    account,
                    generation,
                    armed: true,
                };
                let session = shared.factory.open(account).await.inspect_err(|e| {
                    warn!(%account, error = %e, "could not open session");
                })?;
                reservation.armed = false;
                debug!(%account, "opened session");
                session
            }
        };

        Ok(PooledSession {
            shared: Arc::clone(&self.shared),
            account: account.clone(),
            generation,
            session: Some(session),
        })
    }

    /// Closes sessions idle longer than [`PoolConfig::idle_timeout`].
    /// Returns how many were closed.
    pub fn reclaim_idle(&self) -> usize {
        let shared = &*self.shared;
        let now = shared.clock.now();
        let timeout = shared.config.idle_timeout;
        let mut state = shared.lock();
        let state_ref = &mut *state;

        let mut expired = Vec::new();
        for (account, slot) in &mut state_ref.accounts {
            let before = expired.len();
            let mut i = 0;
            while i < slot.idle.len() {
                if shared.clock.has_elapsed(slot.idle[i].since, timeout) {
                    expired.push(slot.idle.remove(i).session);
                } else {
                    i += 1;
                }
            }
            let closed = expired.len() - before;
            if closed > 0 {
                slot.open = slot.open.saturating_sub(closed);
                debug!(%account, closed, "closing idle sessions");
            }
        }
        state_ref.open_total = state_ref.open_total.saturating_sub(expired.len());
        let evicted = state_ref.dispatch(shared.config.global_ceiling, now);
        drop(state);

        let count = expired.len();
        if count > 0 {
            info!(count, idle_timeout = ?timeout, "reclaimed idle sessions");
        }
        drop(expired);
        drop(evicted);
        count
    }

    /// Runs [`reclaim_idle`](Self::reclaim_idle) every `period` until the
    /// pool is dropped.
    pub fn spawn_reaper(&self, period: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.shared);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match weak.upgrade() {
                    Some(shared) => {
                        Self { shared }.reclaim_idle();
                    }
                    None => break,
                }
            }
            trace!("pool dropped, reaper exiting");
        })
    }

    /// Current occupancy.
    pub fn stats(&self) -> PoolStats {
        let state = self.shared.lock();
        PoolStats {
            accounts: state.accounts.len(),
            open: state.open_total,
            idle: state.accounts.values().map(|s| s.idle.len()).sum(),
            waiting: state.waiters.len(),
        }
    }

    /// Occupancy of `account`, `None` if it is not registered.
    pub fn account_stats(&self, account: &AccountId) -> Option<AccountStats> {
        let state = self.shared.lock();
        state.accounts.get(account).map(|slot| AccountStats {
            max: slot.max,
            open: slot.open,
            idle: slot.idle.len(),
        })
    }
}

/// A checked-out session. Goes back to the pool on drop.
pub struct PooledSession<F: SessionFactory> {
    shared: Arc<Shared<F>>,
    account: AccountId,
    generation: u64,
    session: Option<F::Session>,
}

impl<F: SessionFactory> PooledSession<F> {
    /// Account the session belongs to.
    pub const fn account(&self) -> &AccountId {
        &self.account
    }

    /// Closes the session instead of returning it, freeing its slot.
    pub fn discard(mut self) {
        if let Some(session) = self.session.take() {
            debug!(account = %self.account, "discarding session");
            drop(session);
        }
    }
}

impl<F: SessionFactory> Deref for PooledSession<F> {
    type Target = F::Session;

    #[allow(clippy::expect_used)]
    fn deref(&self) -> &Self::Target {
        // only taken in discard and drop
        self.session.as_ref().expect("pooled session present until dropped")
    }
}

impl<F: SessionFactory> DerefMut for PooledSession<F> {
    #[allow(clippy::expect_used)]
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session.as_mut().expect("pooled session present until dropped")
    }
}

impl<F: SessionFactory> Drop for PooledSession<F> {
    fn drop(&mut self) {
        self.shared
            .give_back(&self.account, self.generation, self.session.take());
    }
}

impl<F: SessionFactory> fmt::Debug for PooledSession<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledSession")
            .field("account", &self.account)
            .finish_non_exhaustive()
    }
}
