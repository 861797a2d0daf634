//! The session state exposed to consumers.

use upsc_auth::{Profile, Role, Session, User, UserId};

use crate::AuthError;

/// Aggregate auth state: who is signed in, their profile, and whether the
/// store is still starting up or stuck on an error.
///
/// Invariants maintained by the store:
/// - `loading` is `true` only while a session restore is in flight.
/// - `error.is_some()` implies `!loading`.
/// - `user` is always the user of `session`.
/// - `profile`, when present, belongs to `user`. It may lag behind `user`
///   while being fetched, but never shows another user's record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub user: Option<User>,
    pub profile: Option<Profile>,
    pub session: Option<Session>,
    pub loading: bool,
    pub error: Option<AuthError>,
}

/// The state before the first restore resolves.
impl Default for SessionState {
    fn default() -> Self {
        Self {
            user: None,
            profile: None,
            session: None,
            loading: true,
            error: None,
        }
    }
}

impl SessionState {
    /// The current user's id, if signed in.
    pub fn user_id(&self) -> Option<&UserId> {
        self.user.as_ref().map(|u| &u.id)
    }

    /// The role on the current profile, if one is loaded.
    pub fn role(&self) -> Option<Role> {
        self.profile.as_ref().map(|p| p.role)
    }

    pub fn is_admin(&self) -> bool {
        self.role() == Some(Role::Admin)
    }

    pub fn is_student(&self) -> bool {
        self.role() == Some(Role::Student)
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Replaces the session and derives `user` from it.
    ///
    /// A profile belonging to anyone but the new user is dropped.
    pub(crate) fn set_session(&mut self, session: Option<Session>) {
        self.user = session.as_ref().map(|s| s.user.clone());
        self.session = session;
        let keep = matches!(
            (&self.profile, &self.user),
            (Some(profile), Some(user)) if profile.id == user.id
        );
        if !keep {
            self.profile = None;
        }
    }

    pub(crate) fn clear_identity(&mut self) {
        self.user = None;
        self.profile = None;
        self.session = None;
    }
}
