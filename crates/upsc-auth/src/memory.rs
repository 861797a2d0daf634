//! In-memory backend with fault injection.
//!
//! Behaves like the hosted service from the tracker's point of view:
//! accounts, a persisted session, profile rows, and auth-change
//! notifications. On top of that it can be told to go offline, to answer
//! slowly (per call kind or per user), or to fail specific calls. Latency is
//! implemented with `tokio::time::sleep`, so tests running on paused time
//! stay instant and deterministic.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rand::Rng;
use tokio::sync::mpsc;

use crate::{
    AuthBackend, AuthChange, AuthEvent, BackendError, NewProfile, Profile, Role,
    Session, User, UserId, unix_now,
};

/// Lifetime of sessions issued by this backend.
const SESSION_LIFETIME_SECS: u64 = 3600;

/// Shortest password the backend accepts at sign-up.
const MIN_PASSWORD_LEN: usize = 6;

/// How many times each backend call has been made.
///
/// Tests use this to prove a call did (or did not) happen, e.g. that a
/// cached profile was served without a lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub get_session: usize,
    pub sign_in: usize,
    pub sign_up: usize,
    pub sign_out: usize,
    pub select_profile: usize,
    pub insert_profile: usize,
}

struct Account {
    password: String,
    user: User,
}

#[derive(Default)]
struct Faults {
    offline: bool,
    latency: Duration,
    session_latency: Option<Duration>,
    profile_latency: HashMap<UserId, Duration>,
    session_error: Option<BackendError>,
    profile_error: Option<BackendError>,
    insert_error: Option<BackendError>,
    sign_out_error: Option<BackendError>,
}

#[derive(Default)]
struct MemoryState {
    /// Keyed by lowercase email.
    accounts: HashMap<String, Account>,
    profiles: HashMap<UserId, Profile>,
    persisted: Option<Session>,
    subscribers: Vec<mpsc::UnboundedSender<AuthChange>>,
    faults: Faults,
    calls: CallCounts,
}

impl MemoryState {
    fn check_online(&self) -> Result<(), BackendError> {
        if self.faults.offline {
            Err(BackendError::Network("backend unreachable".into()))
        } else {
            Ok(())
        }
    }

    /// Delivers a change to every live subscriber, dropping closed ones.
    fn emit(&mut self, change: AuthChange) {
        self.subscribers
            .retain(|tx| tx.send(change.clone()).is_ok());
    }
}

/// An [`AuthBackend`] that keeps everything in process memory.
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    /// Creates an empty backend: no accounts, no session, online, no latency.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -- Seeding ----------------------------------------------------------

    /// Registers a credential without a profile row.
    pub fn add_account(&self, email: &str, password: &str) -> User {
        let user = User {
            id: UserId::new(random_hex::<16>()),
            email: email.trim().to_string(),
        };
        self.lock().accounts.insert(
            email.trim().to_ascii_lowercase(),
            Account {
                password: password.to_string(),
                user: user.clone(),
            },
        );
        user
    }

    /// Stores a profile row for `user`.
    pub fn add_profile(&self, user: &User, full_name: &str, role: Role) -> Profile {
        let profile = NewProfile {
            id: user.id.clone(),
            email: user.email.clone(),
            full_name: full_name.to_string(),
            role,
        }
        .into_profile(unix_now());
        self.lock()
            .profiles
            .insert(profile.id.clone(), profile.clone());
        profile
    }

    /// Registers a credential together with its profile row.
    pub fn add_user(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
        role: Role,
    ) -> User {
        let user = self.add_account(email, password);
        self.add_profile(&user, full_name, role);
        user
    }

    /// Persists a fresh session for `user`, as if a previous run had
    /// signed in. Returns the session.
    pub fn persist_session_for(&self, user: &User) -> Session {
        let session = issue_session(user.clone());
        self.lock().persisted = Some(session.clone());
        session
    }

    /// Replaces the persisted session verbatim.
    pub fn set_persisted_session(&self, session: Option<Session>) {
        self.lock().persisted = session;
    }

    /// Simulates a sign-in from another tab: persists a session for `user`
    /// and notifies subscribers.
    pub fn sign_in_elsewhere(&self, user: &User) -> Session {
        let session = issue_session(user.clone());
        let mut state = self.lock();
        state.persisted = Some(session.clone());
        state.emit(AuthChange::new(AuthEvent::SignedIn, Some(session.clone())));
        session
    }

    /// Pushes an arbitrary notification to subscribers.
    pub fn emit(&self, change: AuthChange) {
        self.lock().emit(change);
    }

    // -- Fault injection --------------------------------------------------

    /// While offline, every call fails with [`BackendError::Network`].
    pub fn set_offline(&self, offline: bool) {
        self.lock().faults.offline = offline;
    }

    /// Latency applied to every call without a more specific setting.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().faults.latency = latency;
    }

    /// Latency of `get_session` only.
    pub fn set_session_latency(&self, latency: Duration) {
        self.lock().faults.session_latency = Some(latency);
    }

    /// Latency of profile lookups for one user.
    pub fn set_profile_latency(&self, id: &UserId, latency: Duration) {
        self.lock()
            .faults
            .profile_latency
            .insert(id.clone(), latency);
    }

    /// Makes `get_session` fail with `error` (or succeed again with `None`).
    pub fn fail_session_fetch(&self, error: Option<BackendError>) {
        self.lock().faults.session_error = error;
    }

    /// Makes every profile lookup fail with `error`.
    pub fn fail_profile_lookups(&self, error: Option<BackendError>) {
        self.lock().faults.profile_error = error;
    }

    /// Makes profile inserts fail with `error`.
    pub fn fail_profile_insert(&self, error: Option<BackendError>) {
        self.lock().faults.insert_error = error;
    }

    /// Makes `sign_out` fail with `error`.
    pub fn fail_sign_out(&self, error: Option<BackendError>) {
        self.lock().faults.sign_out_error = error;
    }

    // -- Inspection -------------------------------------------------------

    /// Snapshot of the call counters.
    pub fn calls(&self) -> CallCounts {
        self.lock().calls
    }

    /// Number of subscribers whose receiver is still alive.
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.lock();
        state.subscribers.retain(|tx| !tx.is_closed());
        state.subscribers.len()
    }

    /// The stored profile row for `id`, if any.
    pub fn profile(&self, id: &UserId) -> Option<Profile> {
        self.lock().profiles.get(id).cloned()
    }

    /// The persisted session, if any.
    pub fn persisted_session(&self) -> Option<Session> {
        self.lock().persisted.clone()
    }

    /// Returns `true` if an account exists for `email`.
    pub fn has_account(&self, email: &str) -> bool {
        self.lock()
            .accounts
            .contains_key(&email.trim().to_ascii_lowercase())
    }
}

impl AuthBackend for MemoryBackend {
    async fn get_session(&self) -> Result<Option<Session>, BackendError> {
        let latency = {
            let mut state = self.lock();
            state.calls.get_session += 1;
            state.faults.session_latency.unwrap_or(state.faults.latency)
        };
        pause(latency).await;

        let state = self.lock();
        state.check_online()?;
        if let Some(err) = state.faults.session_error.clone() {
            return Err(err);
        }
        Ok(state.persisted.clone())
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<AuthChange> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().subscribers.push(tx);
        rx
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError> {
        let latency = {
            let mut state = self.lock();
            state.calls.sign_in += 1;
            state.faults.latency
        };
        pause(latency).await;

        let mut state = self.lock();
        state.check_online()?;
        let user = match state.accounts.get(&email.trim().to_ascii_lowercase()) {
            Some(account) if account.password == password => account.user.clone(),
            _ => return Err(BackendError::InvalidCredentials),
        };

        let session = issue_session(user);
        state.persisted = Some(session.clone());
        state.emit(AuthChange::new(AuthEvent::SignedIn, Some(session.clone())));
        tracing::debug!(user_id = %session.user.id, "memory backend: signed in");
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<User, BackendError> {
        let latency = {
            let mut state = self.lock();
            state.calls.sign_up += 1;
            state.faults.latency
        };
        pause(latency).await;

        {
            let state = self.lock();
            state.check_online()?;
            if !email.contains('@') {
                return Err(BackendError::rejected(
                    "validation_failed",
                    "unable to validate email address",
                ));
            }
            if password.len() < MIN_PASSWORD_LEN {
                return Err(BackendError::rejected(
                    "weak_password",
                    format!("password should be at least {MIN_PASSWORD_LEN} characters"),
                ));
            }
            if state.accounts.contains_key(&email.trim().to_ascii_lowercase()) {
                return Err(BackendError::rejected(
                    "user_already_exists",
                    "user already registered",
                ));
            }
        }
        Ok(self.add_account(email, password))
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        let latency = {
            let mut state = self.lock();
            state.calls.sign_out += 1;
            state.faults.latency
        };
        pause(latency).await;

        let mut state = self.lock();
        state.check_online()?;
        if let Some(err) = state.faults.sign_out_error.clone() {
            return Err(err);
        }
        state.persisted = None;
        state.emit(AuthChange::new(AuthEvent::SignedOut, None));
        Ok(())
    }

    async fn select_profile(&self, id: &UserId) -> Result<Profile, BackendError> {
        let latency = {
            let mut state = self.lock();
            state.calls.select_profile += 1;
            state
                .faults
                .profile_latency
                .get(id)
                .copied()
                .unwrap_or(state.faults.latency)
        };
        pause(latency).await;

        let state = self.lock();
        state.check_online()?;
        if let Some(err) = state.faults.profile_error.clone() {
            return Err(err);
        }
        state.profiles.get(id).cloned().ok_or(BackendError::NotFound)
    }

    async fn insert_profile(&self, record: NewProfile) -> Result<(), BackendError> {
        let latency = {
            let mut state = self.lock();
            state.calls.insert_profile += 1;
            state.faults.latency
        };
        pause(latency).await;

        let mut state = self.lock();
        state.check_online()?;
        if let Some(err) = state.faults.insert_error.clone() {
            return Err(err);
        }
        if state.profiles.contains_key(&record.id) {
            return Err(BackendError::rejected(
                "23505",
                "duplicate key value violates unique constraint",
            ));
        }
        let profile = record.into_profile(unix_now());
        state.profiles.insert(profile.id.clone(), profile);
        Ok(())
    }
}

async fn pause(latency: Duration) {
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }
}

fn issue_session(user: User) -> Session {
    Session {
        access_token: random_hex::<32>(),
        refresh_token: random_hex::<16>(),
        expires_at: unix_now() + SESSION_LIFETIME_SECS,
        user,
    }
}

/// `N` random bytes rendered as lowercase hex.
fn random_hex<const N: usize>() -> String {
    let mut bytes = [0u8; N];
    rand::rng().fill(&mut bytes[..]);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
