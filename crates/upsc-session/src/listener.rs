//! Standing subscription to backend auth-state changes.
//!
//! One task per store drains the subscription. Notifications are handled
//! strictly one at a time, in arrival order, including the profile lookup
//! each one triggers, so a later notification can never be applied before
//! an earlier one finishes.
//!
//! The task only holds a `Weak` reference to the store between
//! notifications; dropping every store handle (or calling teardown) ends it
//! and drops the receiver, which unsubscribes from the backend. A local
//! sign-out replaces the task with a fresh subscription, discarding
//! whatever was still queued.

use std::sync::{Arc, Weak};

use tokio::task::JoinHandle;
use tracing::{debug, warn};
use upsc_auth::{AuthBackend, AuthChange, AuthEvent};

use crate::SessionStore;
use crate::store::StoreInner;

pub(crate) fn spawn<B: AuthBackend>(inner: &Arc<StoreInner<B>>) -> JoinHandle<()> {
    let mut changes = inner.backend.subscribe();
    let weak: Weak<StoreInner<B>> = Arc::downgrade(inner);

    tokio::spawn(async move {
        while let Some(change) = changes.recv().await {
            let Some(inner) = weak.upgrade() else {
                break;
            };
            let store = SessionStore { inner };
            if !store.is_alive() {
                break;
            }
            store.handle_auth_change(change).await;
        }
        debug!("auth listener stopped");
    })
}

impl<B: AuthBackend> SessionStore<B> {
    /// Applies one notification.
    ///
    /// `user`/`session` are written immediately and `error` is cleared.
    /// The profile follows once looked up; a failed lookup degrades to
    /// `profile = None` without raising an error.
    pub(crate) async fn handle_auth_change(&self, change: AuthChange) {
        let AuthChange { event, session } = change;
        let user_id = session.as_ref().map(|s| s.user.id.clone());
        debug!(%event, user_id = ?user_id, "auth state changed");

        let apply = |state: &mut crate::SessionState| {
            state.set_session(session);
            state.error = None;
        };
        if event == AuthEvent::SignedOut {
            self.inner.resolver.clear();
        }
        // Explicit sign-in/out is newer than whatever a pending restore
        // will report.
        match event {
            AuthEvent::SignedIn | AuthEvent::SignedOut => {
                self.supersede_attempt(apply);
            }
            _ => {
                self.write(apply);
            }
        }

        let Some(user_id) = user_id else {
            return;
        };

        let profile = match self.inner.resolver.resolve(&user_id).await {
            Ok(profile) => profile,
            Err(err) => {
                warn!(%user_id, error = %err, "background profile refresh failed");
                None
            }
        };
        self.write_profile(&user_id, profile);
    }
}
