//! Integration tests for user actions and the auth-event listener.
//!
//! Uses `MemoryBackend` as the hosted service and paused Tokio time so
//! slow profile lookups can be staged precisely.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use upsc_auth::{
    AuthChange, AuthEvent, BackendConfig, BackendError, MemoryBackend, Role,
};
use upsc_session::{AuthError, SessionState, SessionStore, StoreConfig};

// =========================================================================
// Helpers
// =========================================================================

fn valid_config() -> BackendConfig {
    BackendConfig::new("https://tracker.backend.example", "anon-key-123")
}

/// A started store that has finished its (empty) session restore.
async fn started_store(backend: &Arc<MemoryBackend>) -> SessionStore<MemoryBackend> {
    let store =
        SessionStore::new(Arc::clone(backend), valid_config(), StoreConfig::default());
    store.start();
    store.wait_until_settled().await;
    store
}

async fn tick() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Waits (on virtual time) until `pred` holds, failing after 30 s.
async fn wait_for(
    store: &SessionStore<MemoryBackend>,
    pred: impl FnMut(&SessionState) -> bool,
) -> SessionState {
    let mut rx = store.subscribe();
    let found = tokio::time::timeout(Duration::from_secs(30), rx.wait_for(pred))
        .await
        .expect("condition not reached in time")
        .expect("store dropped")
        .clone();
    found
}

/// Counts every observed state where a profile belongs to someone other
/// than the current user, or where an error coexists with `loading`.
fn watch_invariants(store: &SessionStore<MemoryBackend>) -> Arc<AtomicUsize> {
    let violations = Arc::new(AtomicUsize::new(0));
    let mut rx = store.subscribe();
    let counter = Arc::clone(&violations);
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let state = rx.borrow_and_update().clone();
            let foreign_profile = match (&state.profile, &state.user) {
                (Some(profile), Some(user)) => profile.id != user.id,
                (Some(_), None) => true,
                _ => false,
            };
            if foreign_profile || (state.error.is_some() && state.loading) {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }
    });
    violations
}

// =========================================================================
// sign_in()
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_sign_in_admin_sets_user_profile_and_flag() {
    let backend = Arc::new(MemoryBackend::new());
    let admin = backend.add_user("admin@example.org", "hunter22", "Ada", Role::Admin);
    let store = started_store(&backend).await;

    let signed_in = store
        .sign_in("  admin@example.org ", "hunter22")
        .await
        .expect("valid credentials");

    assert_eq!(signed_in.user.id, admin.id);
    assert_eq!(signed_in.profile.as_ref().map(|p| p.role), Some(Role::Admin));
    assert!(signed_in.profile_error.is_none());

    let state = store.snapshot();
    assert_eq!(state.user_id(), Some(&admin.id));
    assert!(state.session.is_some());
    assert!(state.is_admin());
    assert!(!state.is_student());
}

#[tokio::test(start_paused = true)]
async fn test_sign_in_wrong_password_returns_error_without_global_error() {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_user("s@example.org", "hunter22", "S", Role::Student);
    let store = started_store(&backend).await;

    let result = store.sign_in("s@example.org", "wrong").await;

    assert!(matches!(result, Err(AuthError::Authentication(_))));
    let state = store.snapshot();
    assert!(state.error.is_none(), "sign-in errors stay local");
    assert!(state.user.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_sign_in_offline_is_network_error() {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_user("s@example.org", "hunter22", "S", Role::Student);
    let store = started_store(&backend).await;
    backend.set_offline(true);

    let result = store.sign_in("s@example.org", "hunter22").await;

    assert!(matches!(result, Err(AuthError::Network(_))));
    assert!(store.snapshot().error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_sign_in_invalid_config_skips_backend() {
    let backend = Arc::new(MemoryBackend::new());
    let store = started_store(&backend).await;
    store.update_config(BackendConfig::new("https://tracker.backend.example", ""));

    let result = store.sign_in("s@example.org", "hunter22").await;

    assert!(matches!(result, Err(AuthError::Configuration(_))));
    assert_eq!(backend.calls().sign_in, 0);
}

#[tokio::test(start_paused = true)]
async fn test_sign_in_without_profile_row_leaves_profile_empty() {
    let backend = Arc::new(MemoryBackend::new());
    let user = backend.add_account("new@example.org", "hunter22");
    let store = started_store(&backend).await;

    let signed_in = store.sign_in("new@example.org", "hunter22").await.unwrap();

    assert!(signed_in.profile.is_none());
    assert!(signed_in.profile_error.is_none(), "absent profile is not an error");
    let state = store.snapshot();
    assert_eq!(state.user_id(), Some(&user.id));
    assert!(state.profile.is_none());
    assert!(state.error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_sign_in_profile_lookup_failure_is_reported_not_raised() {
    let backend = Arc::new(MemoryBackend::new());
    let user = backend.add_user("s@example.org", "hunter22", "S", Role::Student);
    let store = started_store(&backend).await;
    backend.fail_profile_lookups(Some(BackendError::Network("reset".into())));

    let signed_in = store.sign_in("s@example.org", "hunter22").await.unwrap();

    assert_eq!(signed_in.profile_error, Some(AuthError::Network("reset".into())));
    let state = store.snapshot();
    assert_eq!(state.user_id(), Some(&user.id));
    assert!(state.profile.is_none());
    assert!(state.error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_sign_in_supersedes_slow_restore() {
    let backend = Arc::new(MemoryBackend::new());
    let restored = backend.add_user("old@example.org", "hunter22", "Old", Role::Admin);
    let fresh = backend.add_user("new@example.org", "hunter22", "New", Role::Student);
    backend.persist_session_for(&restored);
    backend.set_session_latency(Duration::from_secs(5));
    let store =
        SessionStore::new(Arc::clone(&backend), valid_config(), StoreConfig::default());
    store.start();
    tick().await;
    assert!(store.snapshot().loading);

    store.sign_in("new@example.org", "hunter22").await.unwrap();
    assert!(!store.snapshot().loading, "sign-in settles loading");

    tokio::time::sleep(Duration::from_secs(10)).await;

    let state = store.snapshot();
    assert_eq!(state.user_id(), Some(&fresh.id), "restore result must be discarded");
    assert!(state.is_student());
    assert!(state.error.is_none());
}

// =========================================================================
// sign_up()
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_sign_up_student_creates_profile_and_primes_cache() {
    let backend = Arc::new(MemoryBackend::new());
    let store = started_store(&backend).await;

    let user = store
        .sign_up(" stu@example.org ", "hunter22", " Stu Dent ", Role::Student)
        .await
        .expect("sign-up succeeds");

    let stored = backend.profile(&user.id).expect("profile row created");
    assert_eq!(stored.role, Role::Student);
    assert_eq!(stored.full_name, "Stu Dent");
    assert_eq!(stored.email, "stu@example.org");
    assert!(store.snapshot().user.is_none(), "sign-up does not sign in");

    let signed_in = store.sign_in("stu@example.org", "hunter22").await.unwrap();

    assert_eq!(signed_in.profile.map(|p| p.role), Some(Role::Student));
    assert!(store.snapshot().is_student());
    assert_eq!(backend.calls().select_profile, 0, "served from the primed cache");
}

#[tokio::test(start_paused = true)]
async fn test_sign_up_profile_insert_failure_reports_half_registration() {
    let backend = Arc::new(MemoryBackend::new());
    let store = started_store(&backend).await;
    backend.fail_profile_insert(Some(BackendError::rejected("42501", "denied by policy")));

    let result = store
        .sign_up("stu@example.org", "hunter22", "Stu", Role::Student)
        .await;

    let (user_id, reason) = match result {
        Err(AuthError::ProfileCreation { user_id, reason }) => (user_id, reason),
        other => panic!("expected ProfileCreation, got {other:?}"),
    };
    assert!(reason.contains("denied by policy"));
    assert!(backend.has_account("stu@example.org"), "credential exists");
    assert!(backend.profile(&user_id).is_none(), "profile does not");
    assert!(store.profiles().cached(&user_id).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_sign_up_existing_email_is_backend_error() {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_account("taken@example.org", "hunter22");
    let store = started_store(&backend).await;

    let result = store
        .sign_up("taken@example.org", "hunter22", "T", Role::Student)
        .await;

    assert!(matches!(result, Err(AuthError::Backend(_))));
    assert_eq!(backend.calls().insert_profile, 0);
}

// =========================================================================
// sign_out()
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_sign_out_clears_state_and_cache() {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_user("s@example.org", "hunter22", "S", Role::Student);
    let store = started_store(&backend).await;
    store.sign_in("s@example.org", "hunter22").await.unwrap();
    assert_eq!(store.profiles().cache_len(), 1);

    store.sign_out().await;

    let state = store.snapshot();
    assert!(state.user.is_none());
    assert!(state.profile.is_none());
    assert!(state.session.is_none());
    assert_eq!(store.profiles().cache_len(), 0);
    assert!(backend.persisted_session().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_sign_out_backend_failure_still_clears_locally() {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_user("s@example.org", "hunter22", "S", Role::Student);
    let store = started_store(&backend).await;
    store.sign_in("s@example.org", "hunter22").await.unwrap();
    backend.fail_sign_out(Some(BackendError::Network("reset".into())));

    store.sign_out().await;

    let state = store.snapshot();
    assert!(state.user.is_none());
    assert!(state.profile.is_none());
    assert!(state.session.is_none());
    assert_eq!(store.profiles().cache_len(), 0);
    assert!(state.error.is_none(), "sign-out failure is not fatal");
}

#[tokio::test(start_paused = true)]
async fn test_sign_out_right_after_sign_in_drops_queued_notification() {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_user("s@example.org", "hunter22", "S", Role::Student);
    let store = started_store(&backend).await;

    // No yield in between: the SignedIn notification is still queued.
    store.sign_in("s@example.org", "hunter22").await.unwrap();
    store.sign_out().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let state = store.snapshot();
    assert!(state.user.is_none());
    assert!(state.profile.is_none());
    assert_eq!(store.profiles().cache_len(), 0);
    assert_eq!(backend.subscriber_count(), 1, "listener resubscribed");
}

#[tokio::test(start_paused = true)]
async fn test_sign_out_failure_right_after_sign_in_keeps_user_out() {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_user("s@example.org", "hunter22", "S", Role::Student);
    let store = started_store(&backend).await;
    backend.fail_sign_out(Some(BackendError::Network("reset".into())));

    store.sign_in("s@example.org", "hunter22").await.unwrap();
    store.sign_out().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let state = store.snapshot();
    assert!(state.user.is_none(), "stale sign-in must not restore the user");
    assert!(state.session.is_none());
    assert_eq!(store.profiles().cache_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_sign_out_cancels_in_flight_listener_lookup() {
    let backend = Arc::new(MemoryBackend::new());
    let user = backend.add_user("s@example.org", "hunter22", "S", Role::Student);
    backend.set_profile_latency(&user.id, Duration::from_secs(5));
    let store = started_store(&backend).await;

    backend.sign_in_elsewhere(&user);
    wait_for(&store, |s| s.user.is_some()).await;
    store.sign_out().await;
    tokio::time::sleep(Duration::from_secs(10)).await;

    let state = store.snapshot();
    assert!(state.user.is_none());
    assert!(state.profile.is_none());
    assert_eq!(store.profiles().cache_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_sign_out_after_teardown_skips_backend() {
    let backend = Arc::new(MemoryBackend::new());
    let store = started_store(&backend).await;
    store.teardown().await;

    store.sign_out().await;

    assert_eq!(backend.calls().sign_out, 0);
    assert_eq!(backend.subscriber_count(), 0, "no listener respawned");
}

// =========================================================================
// Auth-event listener
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_sign_in_elsewhere_populates_user_and_profile() {
    let backend = Arc::new(MemoryBackend::new());
    let admin = backend.add_user("admin@example.org", "hunter22", "Ada", Role::Admin);
    let store = started_store(&backend).await;

    backend.sign_in_elsewhere(&admin);
    let state = wait_for(&store, |s| s.profile.is_some()).await;

    assert_eq!(state.user_id(), Some(&admin.id));
    assert!(state.is_admin());
}

#[tokio::test(start_paused = true)]
async fn test_event_clears_global_error() {
    let backend = Arc::new(MemoryBackend::new());
    let user = backend.add_user("s@example.org", "hunter22", "S", Role::Student);
    backend.set_offline(true);
    let store = started_store(&backend).await;
    assert!(store.snapshot().error.is_some());

    backend.set_offline(false);
    backend.sign_in_elsewhere(&user);
    let state = wait_for(&store, |s| s.profile.is_some()).await;

    assert!(state.error.is_none());
    assert_eq!(state.user_id(), Some(&user.id));
}

#[tokio::test(start_paused = true)]
async fn test_signed_out_event_clears_identity() {
    let backend = Arc::new(MemoryBackend::new());
    let user = backend.add_user("s@example.org", "hunter22", "S", Role::Student);
    backend.persist_session_for(&user);
    let store = started_store(&backend).await;
    assert!(store.snapshot().is_student());

    assert_eq!(store.profiles().cache_len(), 1);

    backend.emit(AuthChange::new(AuthEvent::SignedOut, None));
    let state = wait_for(&store, |s| s.user.is_none()).await;

    assert!(state.profile.is_none());
    assert!(state.session.is_none());
    assert_eq!(store.profiles().cache_len(), 0, "sign-out elsewhere empties the cache");
}

#[tokio::test(start_paused = true)]
async fn test_token_refresh_keeps_profile_without_lookup() {
    let backend = Arc::new(MemoryBackend::new());
    let user = backend.add_user("s@example.org", "hunter22", "S", Role::Student);
    backend.persist_session_for(&user);
    let store = started_store(&backend).await;
    let lookups = backend.calls().select_profile;
    let old_token = store.snapshot().session.unwrap().access_token;

    let refreshed = backend.persist_session_for(&user);
    backend.emit(AuthChange::new(AuthEvent::TokenRefreshed, Some(refreshed.clone())));
    let state = wait_for(&store, |s| {
        s.session.as_ref().is_some_and(|session| session.access_token != old_token)
    })
    .await;

    assert_eq!(state.session, Some(refreshed));
    assert!(state.is_student(), "profile survives a token refresh");
    tick().await;
    assert_eq!(backend.calls().select_profile, lookups, "cache hit, no lookup");
}

#[tokio::test(start_paused = true)]
async fn test_background_refresh_failure_degrades_to_no_profile() {
    let backend = Arc::new(MemoryBackend::new());
    let user = backend.add_user("s@example.org", "hunter22", "S", Role::Student);
    let store = started_store(&backend).await;
    backend.fail_profile_lookups(Some(BackendError::Network("reset".into())));

    backend.sign_in_elsewhere(&user);
    wait_for(&store, |s| s.user.is_some()).await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    let state = store.snapshot();
    assert_eq!(state.user_id(), Some(&user.id));
    assert!(state.profile.is_none());
    assert!(state.error.is_none(), "background failures never raise the global error");
}

#[tokio::test(start_paused = true)]
async fn test_newer_notification_wins_over_slow_profile_fetch() {
    let backend = Arc::new(MemoryBackend::new());
    let slow = backend.add_user("b@example.org", "hunter22", "B", Role::Admin);
    let fast = backend.add_user("a@example.org", "hunter22", "A", Role::Student);
    backend.set_profile_latency(&slow.id, Duration::from_secs(5));
    let store = started_store(&backend).await;
    let violations = watch_invariants(&store);

    backend.sign_in_elsewhere(&slow);
    tick().await;
    backend.sign_in_elsewhere(&fast);

    tokio::time::sleep(Duration::from_secs(10)).await;

    let state = store.snapshot();
    assert_eq!(state.user_id(), Some(&fast.id));
    assert_eq!(state.profile.as_ref().map(|p| &p.id), Some(&fast.id));
    assert!(state.is_student());
    assert_eq!(violations.load(Ordering::SeqCst), 0, "no cross-user profile observed");
}

#[tokio::test(start_paused = true)]
async fn test_sign_in_wins_over_listener_fetch_for_previous_user() {
    let backend = Arc::new(MemoryBackend::new());
    let slow = backend.add_user("b@example.org", "hunter22", "B", Role::Admin);
    let fast = backend.add_user("a@example.org", "hunter22", "A", Role::Student);
    backend.set_profile_latency(&slow.id, Duration::from_secs(5));
    let store = started_store(&backend).await;
    let violations = watch_invariants(&store);

    backend.sign_in_elsewhere(&slow);
    tick().await;
    let signed_in = store.sign_in("a@example.org", "hunter22").await.unwrap();
    assert_eq!(signed_in.profile.map(|p| p.id), Some(fast.id.clone()));

    tokio::time::sleep(Duration::from_secs(10)).await;

    let state = store.snapshot();
    assert_eq!(state.user_id(), Some(&fast.id));
    assert_eq!(state.profile.as_ref().map(|p| &p.id), Some(&fast.id));
    assert_eq!(violations.load(Ordering::SeqCst), 0);
}

// =========================================================================
// refresh_profile()
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_refresh_profile_picks_up_late_row() {
    let backend = Arc::new(MemoryBackend::new());
    let user = backend.add_account("late@example.org", "hunter22");
    let store = started_store(&backend).await;
    store.sign_in("late@example.org", "hunter22").await.unwrap();
    assert!(store.snapshot().profile.is_none());

    backend.add_profile(&user, "Late", Role::Student);
    let profile = store.refresh_profile().await.unwrap();

    assert_eq!(profile.map(|p| p.role), Some(Role::Student));
    assert!(store.snapshot().is_student());
}

#[tokio::test(start_paused = true)]
async fn test_refresh_profile_signed_out_is_none() {
    let backend = Arc::new(MemoryBackend::new());
    let store = started_store(&backend).await;

    assert_eq!(store.refresh_profile().await, Ok(None));
    assert_eq!(backend.calls().select_profile, 0);
}

// =========================================================================
// teardown()
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_teardown_unsubscribes_and_freezes_state() {
    let backend = Arc::new(MemoryBackend::new());
    let user = backend.add_user("s@example.org", "hunter22", "S", Role::Student);
    let store = started_store(&backend).await;
    assert_eq!(backend.subscriber_count(), 1);
    let before = store.snapshot();

    store.teardown().await;

    assert!(!store.is_alive());
    assert_eq!(backend.subscriber_count(), 0);
    backend.sign_in_elsewhere(&user);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(store.snapshot(), before);

    let result = store.sign_in("s@example.org", "hunter22").await;
    assert_eq!(result, Err(AuthError::Closed));

    // Second teardown is a no-op.
    store.teardown().await;
}

#[tokio::test(start_paused = true)]
async fn test_teardown_during_restore_discards_result() {
    let backend = Arc::new(MemoryBackend::new());
    let user = backend.add_user("s@example.org", "hunter22", "S", Role::Student);
    backend.persist_session_for(&user);
    backend.set_session_latency(Duration::from_secs(2));
    let store =
        SessionStore::new(Arc::clone(&backend), valid_config(), StoreConfig::default());
    store.start();
    tick().await;

    store.teardown().await;
    tokio::time::sleep(Duration::from_secs(5)).await;

    let state = store.snapshot();
    assert!(state.user.is_none(), "no write after teardown");
}
