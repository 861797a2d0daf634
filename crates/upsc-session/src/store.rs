//! The session store: the single owner of auth state.
//!
//! `SessionStore` is an explicit context object, not a global. Create one
//! at application start, [`start`](SessionStore::start) it, hand clones to
//! whoever needs to read or act on auth state, and
//! [`teardown`](SessionStore::teardown) it on shutdown.
//!
//! # Writers
//!
//! Four paths write the shared state: the bootstrapper, the auth-event
//! listener, the user actions, and retry. None of them holds a lock across
//! a backend call. Instead, every write is a closure run under the watch
//! channel's lock that first re-checks whether its result is still wanted:
//!
//! - **liveness**: nothing is written after teardown;
//! - **generation**: a bootstrap attempt only writes while it is the
//!   latest attempt (retry and sign-in/out supersede it);
//! - **user tag**: a profile is only written if the user it was fetched
//!   for is still the current user.
//!
//! Because the check and the write happen under the same lock, a stale
//! result can never slip in between.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use upsc_auth::{AuthBackend, BackendConfig, Profile, UserId};

use crate::{AuthError, ProfileResolver, SessionState, StoreConfig, listener};

pub(crate) struct StoreInner<B: AuthBackend> {
    pub(crate) backend: Arc<B>,
    pub(crate) resolver: ProfileResolver<B>,
    pub(crate) settings: StoreConfig,
    config: Mutex<BackendConfig>,
    state: watch::Sender<SessionState>,
    alive: AtomicBool,
    /// Id of the latest bootstrap attempt.
    generation: AtomicU64,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl<B: AuthBackend> Drop for StoreInner<B> {
    fn drop(&mut self) {
        let handle = self
            .listener
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

/// Handle to the process-wide auth state.
///
/// Cheap to clone; all clones share one store.
pub struct SessionStore<B: AuthBackend> {
    pub(crate) inner: Arc<StoreInner<B>>,
}

impl<B: AuthBackend> Clone for SessionStore<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: AuthBackend> SessionStore<B> {
    /// Creates a store in its initial state (`loading = true`, nobody
    /// signed in). Nothing runs until [`start`](Self::start).
    pub fn new(backend: Arc<B>, config: BackendConfig, settings: StoreConfig) -> Self {
        let settings = settings.validated();
        let resolver =
            ProfileResolver::new(Arc::clone(&backend), settings.profile_cache_capacity);
        let (state, _) = watch::channel(SessionState::default());

        Self {
            inner: Arc::new(StoreInner {
                backend,
                resolver,
                settings,
                config: Mutex::new(config),
                state,
                alive: AtomicBool::new(true),
                generation: AtomicU64::new(0),
                listener: Mutex::new(None),
            }),
        }
    }

    /// Subscribes to auth events and kicks off the session restore.
    ///
    /// Returns immediately; watch [`subscribe`](Self::subscribe) or await
    /// [`wait_until_settled`](Self::wait_until_settled) for the outcome.
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) {
        if !self.is_alive() {
            warn!("start called on a torn-down session store");
            return;
        }

        {
            let mut listener = lock(&self.inner.listener);
            if listener.is_none() {
                *listener = Some(listener::spawn(&self.inner));
            }
        }

        let store = self.clone();
        tokio::spawn(async move {
            store.bootstrap().await;
        });
    }

    /// Shuts the store down.
    ///
    /// After this returns, the auth subscription is gone and no pending
    /// operation will write state again. Calling it twice is harmless.
    pub async fn teardown(&self) {
        if !self.inner.alive.swap(false, Ordering::SeqCst) {
            return;
        }
        // Wait out any write that checked liveness just before the swap.
        self.inner.state.send_if_modified(|_| false);

        let handle = lock(&self.inner.listener).take();
        if let Some(handle) = handle {
            handle.abort();
            // Resolves once the task (and its receiver) has been dropped.
            let _ = handle.await;
        }
        info!("session store torn down");
    }

    /// Replaces the auth listener with a fresh subscription.
    ///
    /// Notifications still queued on the old subscription are dropped with
    /// it, and any handling in progress is cancelled. Returns once the old
    /// task can no longer write. A store that was never started stays
    /// without a listener.
    pub(crate) async fn resubscribe(&self) {
        let old = {
            let mut listener = lock(&self.inner.listener);
            let Some(old) = listener.take() else {
                return;
            };
            *listener = Some(listener::spawn(&self.inner));
            old
        };
        old.abort();
        let _ = old.await;
        debug!("auth listener resubscribed, queued notifications dropped");
    }

    pub fn is_alive(&self) -> bool {
        self.inner.alive.load(Ordering::SeqCst)
    }

    // -- Read surface -----------------------------------------------------

    /// A copy of the current state.
    pub fn snapshot(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// A receiver that is notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Waits until no restore is in flight and returns that state.
    pub async fn wait_until_settled(&self) -> SessionState {
        let mut rx = self.inner.state.subscribe();
        let settled = match rx.wait_for(|state| !state.loading).await {
            Ok(state) => state.clone(),
            // The sender lives in `inner`, which we hold; unreachable in
            // practice.
            Err(_) => self.snapshot(),
        };
        settled
    }

    /// The backend this store talks to.
    pub fn backend(&self) -> &Arc<B> {
        &self.inner.backend
    }

    /// The profile resolver (and its cache).
    pub fn profiles(&self) -> &ProfileResolver<B> {
        &self.inner.resolver
    }

    /// The current connection configuration.
    pub fn config(&self) -> BackendConfig {
        lock(&self.inner.config).clone()
    }

    /// Replaces the connection configuration.
    ///
    /// Takes effect on the next [`retry`](Self::retry), sign-in or sign-up.
    pub fn update_config(&self, config: BackendConfig) {
        *lock(&self.inner.config) = config;
        debug!("backend configuration updated");
    }

    pub(crate) fn ensure_alive(&self) -> Result<(), AuthError> {
        if self.is_alive() {
            Ok(())
        } else {
            Err(AuthError::Closed)
        }
    }

    // -- Guarded writes ---------------------------------------------------

    /// Runs `f` under the state lock if the store is alive. `f` returns
    /// whether it changed anything; subscribers are notified only then.
    fn modify(&self, f: impl FnOnce(&mut SessionState) -> bool) -> bool {
        let alive = &self.inner.alive;
        self.inner
            .state
            .send_if_modified(|state| alive.load(Ordering::SeqCst) && f(state))
    }

    /// Unconditional write (subject to liveness).
    pub(crate) fn write(&self, f: impl FnOnce(&mut SessionState)) -> bool {
        self.modify(|state| {
            f(state);
            true
        })
    }

    /// Write on behalf of bootstrap attempt `generation`; dropped if a
    /// newer attempt has started or the attempt was superseded.
    pub(crate) fn write_if_current(
        &self,
        generation: u64,
        f: impl FnOnce(&mut SessionState),
    ) -> bool {
        let current = &self.inner.generation;
        self.modify(|state| {
            if current.load(Ordering::SeqCst) != generation {
                return false;
            }
            f(state);
            true
        })
    }

    /// Starts a new bootstrap attempt: `loading = true`, `error` cleared.
    ///
    /// Returns the attempt's generation, or `None` after teardown.
    pub(crate) fn begin_attempt(&self) -> Option<u64> {
        let counter = &self.inner.generation;
        let mut generation = None;
        self.modify(|state| {
            generation = Some(counter.fetch_add(1, Ordering::SeqCst) + 1);
            state.loading = true;
            state.error = None;
            true
        });
        generation
    }

    /// Applies an authoritative identity change (sign-in, sign-out).
    ///
    /// Any in-flight bootstrap attempt is superseded and `loading` is
    /// settled, so a slow restore can't overwrite the newer identity.
    pub(crate) fn supersede_attempt(&self, f: impl FnOnce(&mut SessionState)) -> bool {
        let counter = &self.inner.generation;
        self.modify(|state| {
            counter.fetch_add(1, Ordering::SeqCst);
            if state.loading {
                debug!("in-flight session restore superseded");
            }
            state.loading = false;
            f(state);
            true
        })
    }

    /// Writes `profile` only if `user_id` is still the signed-in user.
    pub(crate) fn write_profile(&self, user_id: &UserId, profile: Option<Profile>) -> bool {
        let written = self.modify(|state| {
            if state.user_id() != Some(user_id) {
                return false;
            }
            state.profile = profile;
            true
        });
        if !written {
            debug!(%user_id, "discarded profile result for superseded user");
        }
        written
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
