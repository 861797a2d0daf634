//! Startup session restore.
//!
//! The flow for one attempt:
//!   1. Validate the backend configuration → fail fast, no network call
//!   2. Race the restore (session fetch + profile lookup) against the
//!      init timeout
//!   3. Settle: write the outcome and set `loading = false`
//!
//! Every path settles. If the attempt is cancelled or panics before it
//! settles, [`SettleGuard`] does it on drop.

use tracing::{debug, info, warn};
use upsc_auth::{AuthBackend, unix_now};

use crate::{AuthError, SessionState, SessionStore};

/// Why a restore failed, which decides what happens to the identity.
enum RestoreFailure {
    /// Couldn't fetch the session: identity is cleared.
    Session(AuthError),
    /// Session restored but its profile couldn't be fetched: identity kept.
    Profile(AuthError),
}

/// Drop guard that settles a bootstrap attempt if it never settled itself.
struct SettleGuard<'a, B: AuthBackend> {
    store: &'a SessionStore<B>,
    generation: u64,
    settled: bool,
}

impl<B: AuthBackend> SettleGuard<'_, B> {
    /// Applies `f` and clears `loading`, if this attempt is still current.
    fn settle(&mut self, f: impl FnOnce(&mut SessionState)) {
        self.settled = true;
        let written = self.store.write_if_current(self.generation, |state| {
            f(state);
            state.loading = false;
        });
        if !written {
            debug!(generation = self.generation, "bootstrap result discarded");
        }
    }
}

impl<B: AuthBackend> Drop for SettleGuard<'_, B> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        self.store.write_if_current(self.generation, |state| {
            state.loading = false;
            state.error = Some(AuthError::Backend("session restore aborted".into()));
        });
    }
}

impl<B: AuthBackend> SessionStore<B> {
    /// Runs one bootstrap attempt to completion.
    ///
    /// Starting an attempt supersedes any earlier one still in flight;
    /// its late results are discarded.
    pub(crate) async fn bootstrap(&self) {
        let Some(generation) = self.begin_attempt() else {
            debug!("store torn down, skipping bootstrap");
            return;
        };
        let mut guard = SettleGuard {
            store: self,
            generation,
            settled: false,
        };

        if let Err(err) = self.config().validate() {
            warn!(error = %err, "backend configuration invalid");
            guard.settle(|state| {
                state.clear_identity();
                state.error = Some(AuthError::Configuration(err));
            });
            return;
        }

        let timeout = self.inner.settings.init_timeout();
        match tokio::time::timeout(timeout, self.restore(generation)).await {
            Ok(Ok(())) => guard.settle(|_| {}),
            Ok(Err(RestoreFailure::Session(err))) => {
                warn!(error = %err, network = err.is_retryable(), "session fetch failed");
                guard.settle(|state| {
                    state.clear_identity();
                    state.error = Some(err);
                });
            }
            Ok(Err(RestoreFailure::Profile(err))) => {
                warn!(error = %err, "profile fetch failed during session restore");
                guard.settle(|state| {
                    state.profile = None;
                    state.error = Some(err);
                });
            }
            Err(_) => {
                warn!(timeout_secs = timeout.as_secs(), "session restore timed out");
                guard.settle(|state| {
                    state.clear_identity();
                    state.error = Some(AuthError::Timeout(timeout));
                });
            }
        }
    }

    /// Fetches the persisted session and its profile, writing each as it
    /// arrives. Does not touch `loading`.
    async fn restore(&self, generation: u64) -> Result<(), RestoreFailure> {
        let session = self
            .inner
            .backend
            .get_session()
            .await
            .map_err(|err| RestoreFailure::Session(err.into()))?;

        let session = session.filter(|session| {
            let expired = session.is_expired_at(unix_now());
            if expired {
                info!(user_id = %session.user.id, "persisted session expired, ignoring");
            }
            !expired
        });

        let Some(session) = session else {
            info!("no persisted session");
            self.write_if_current(generation, SessionState::clear_identity);
            return Ok(());
        };

        let user_id = session.user.id.clone();
        info!(%user_id, "session restored");
        self.write_if_current(generation, |state| state.set_session(Some(session)));

        let profile = self
            .inner
            .resolver
            .resolve(&user_id)
            .await
            .map_err(RestoreFailure::Profile)?;
        if profile.is_none() {
            info!(%user_id, "restored user has no profile yet");
        }

        self.write_if_current(generation, |state| {
            if state.user_id() == Some(&user_id) {
                state.profile = profile;
            }
        });
        Ok(())
    }
}
