//! User-initiated actions: sign in, sign up, sign out, retry.
//!
//! None of these panic or leave the state half-written. Sign-in and
//! sign-up failures are returned to the caller for local display and never
//! touch the global `error`.

use tracing::{debug, error, info, warn};
use upsc_auth::{AuthBackend, NewProfile, Profile, Role, User, unix_now};

use crate::{AuthError, SessionStore};

/// Outcome of a successful [`SessionStore::sign_in`].
///
/// The credential check succeeded and the user is signed in. The profile
/// lookup that follows may still have failed; that failure is reported in
/// `profile_error` so the caller can decide how loud to be about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedIn {
    pub user: User,
    pub profile: Option<Profile>,
    pub profile_error: Option<AuthError>,
}

impl<B: AuthBackend> SessionStore<B> {
    /// Signs in with email and password.
    ///
    /// The email is trimmed. On success the new user and session are
    /// written at once (superseding any pending restore), then the profile
    /// is looked up and written if that user is still signed in.
    ///
    /// # Errors
    /// - [`AuthError::Configuration`]: connection settings invalid
    /// - [`AuthError::Authentication`]: credentials rejected
    /// - [`AuthError::Network`]: backend unreachable
    /// - [`AuthError::Backend`]: anything else
    /// - [`AuthError::Closed`]: store torn down
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SignedIn, AuthError> {
        self.ensure_alive()?;
        let email = email.trim();
        self.config().validate()?;

        let session = self
            .inner
            .backend
            .sign_in_with_password(email, password)
            .await
            .map_err(|err| {
                let err = AuthError::from(err);
                warn!(error = %err, "sign-in failed");
                err
            })?;

        let user = session.user.clone();
        info!(user_id = %user.id, "signed in");
        self.supersede_attempt(|state| {
            state.set_session(Some(session));
            state.error = None;
        });

        let (profile, profile_error) = match self.inner.resolver.resolve(&user.id).await {
            Ok(profile) => (profile, None),
            Err(err) => {
                warn!(user_id = %user.id, error = %err, "profile lookup after sign-in failed");
                (None, Some(err))
            }
        };
        self.write_profile(&user.id, profile.clone());

        Ok(SignedIn {
            user,
            profile,
            profile_error,
        })
    }

    /// Registers a new account and its profile.
    ///
    /// Does not sign in. The created profile is put in the cache, so the
    /// first sign-in doesn't need a lookup.
    ///
    /// # Errors
    /// - [`AuthError::ProfileCreation`]: the credential exists but the
    ///   profile insert failed; the account is half-registered
    /// - otherwise as for [`sign_in`](Self::sign_in)
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
        role: Role,
    ) -> Result<User, AuthError> {
        self.ensure_alive()?;
        let email = email.trim();
        self.config().validate()?;

        let user = self
            .inner
            .backend
            .sign_up(email, password)
            .await
            .map_err(|err| {
                let err = AuthError::from(err);
                warn!(error = %err, "sign-up failed");
                err
            })?;
        info!(user_id = %user.id, %role, "account created");

        let record = NewProfile {
            id: user.id.clone(),
            email: user.email.clone(),
            full_name: full_name.trim().to_string(),
            role,
        };
        if let Err(err) = self.inner.backend.insert_profile(record.clone()).await {
            error!(user_id = %user.id, error = %err, "profile insert failed after account creation");
            return Err(AuthError::ProfileCreation {
                user_id: user.id,
                reason: err.to_string(),
            });
        }

        self.inner.resolver.prime(record.into_profile(unix_now()));
        Ok(user)
    }

    /// Signs out.
    ///
    /// A backend failure is logged and otherwise ignored: `user`,
    /// `profile`, `session` and the whole profile cache are cleared no
    /// matter what. Notifications the listener had not handled yet are
    /// dropped, so a stale sign-in can't restore the old user afterwards.
    ///
    /// Does nothing after teardown.
    pub async fn sign_out(&self) {
        if self.ensure_alive().is_err() {
            debug!("sign-out on a torn-down store ignored");
            return;
        }
        self.resubscribe().await;

        if let Err(err) = self.inner.backend.sign_out().await {
            warn!(error = %err, "backend sign-out failed, clearing local session anyway");
        }
        self.inner.resolver.clear();
        self.supersede_attempt(|state| state.clear_identity());
        info!("signed out");
    }

    /// Clears the error and re-runs the session restore from the top,
    /// configuration check included.
    ///
    /// Safe to call repeatedly: each call supersedes the previous attempt.
    pub async fn retry(&self) {
        info!("retrying session restore");
        self.bootstrap().await;
    }

    /// Looks the current user's profile up again.
    ///
    /// Meant for the "profile not found" screen. Returns `Ok(None)` when
    /// nobody is signed in or the profile still doesn't exist.
    pub async fn refresh_profile(&self) -> Result<Option<Profile>, AuthError> {
        self.ensure_alive()?;
        let Some(user_id) = self.snapshot().user.map(|u| u.id) else {
            return Ok(None);
        };

        let profile = self.inner.resolver.resolve(&user_id).await?;
        self.write_profile(&user_id, profile.clone());
        Ok(profile)
    }
}
