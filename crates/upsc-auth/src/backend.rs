//! The backend contract.
//!
//! The tracker doesn't implement authentication or storage itself. It
//! consumes a hosted service through the [`AuthBackend`] trait: a handful of
//! async calls, each of which may fail. Production code plugs in an HTTP
//! client; tests and the demo plug in
//! [`MemoryBackend`](crate::MemoryBackend).

use std::future::Future;

use tokio::sync::mpsc;

use crate::{AuthChange, BackendError, NewProfile, Profile, Session, User, UserId};

/// The authentication-and-storage capabilities the session layer consumes.
///
/// # Trait bounds
///
/// - `Send + Sync` → one backend is shared by the bootstrap task, the
///   auth-event listener, and every UI action.
/// - `'static` → it lives as long as the session store.
///
/// Every returned future is `Send` so the store can drive it from spawned
/// tasks.
pub trait AuthBackend: Send + Sync + 'static {
    /// Restores the persisted session, if any.
    fn get_session(
        &self,
    ) -> impl Future<Output = Result<Option<Session>, BackendError>> + Send;

    /// Subscribes to auth-state changes.
    ///
    /// Notifications arrive in the order the backend emits them. Dropping
    /// the receiver unsubscribes.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<AuthChange>;

    /// Checks an email/password pair and opens a session.
    ///
    /// # Returns
    /// - `Ok(Session)`: credentials accepted; the session carries the user
    /// - `Err(BackendError::InvalidCredentials)`: rejected
    fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Session, BackendError>> + Send;

    /// Creates a credential entry. Does not open a session.
    fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<User, BackendError>> + Send;

    /// Ends the backend session.
    fn sign_out(&self) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Point lookup of a profile row.
    ///
    /// # Returns
    /// - `Err(BackendError::NotFound)`: the user has no profile yet
    fn select_profile(
        &self,
        id: &UserId,
    ) -> impl Future<Output = Result<Profile, BackendError>> + Send;

    /// Inserts a profile row.
    fn insert_profile(
        &self,
        record: NewProfile,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;
}
