//! Scripted walkthrough of the auth layer against the in-memory backend.
//!
//! Run with `RUST_LOG=debug` to see the store's decisions as they happen.
//! An optional first argument names a JSON config file; otherwise the
//! environment is used, falling back to a built-in demo endpoint.

use std::sync::Arc;

use serde::Serialize;
use upsc_tracker::prelude::*;

#[derive(Serialize)]
struct Step<'a> {
    step: &'a str,
    user: Option<&'a str>,
    role: Option<Role>,
    loading: bool,
    error: Option<String>,
    admin_gate: String,
    student_gate: String,
}

fn report<B: AuthBackend>(tracker: &Tracker<B>, step: &str) {
    let state = tracker.store().snapshot();
    let line = Step {
        step,
        user: state.user.as_ref().map(|u| u.email.as_str()),
        role: state.role(),
        loading: state.loading,
        error: state.error.as_ref().map(ToString::to_string),
        admin_gate: tracker.gate().evaluate(&state, GateRequirement::admin()).to_string(),
        student_gate: tracker
            .gate()
            .evaluate(&state, GateRequirement::student())
            .to_string(),
    };
    match serde_json::to_string(&line) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::error!(error = %e, "failed to encode step"),
    }
}

fn load_config() -> Result<TrackerConfig, TrackerError> {
    if let Some(path) = std::env::args().nth(1) {
        return TrackerConfig::load(path);
    }
    let mut config = TrackerConfig::from_env()?;
    if !config.backend.is_valid() {
        tracing::info!("no backend configured, using the demo endpoint");
        config.backend = BackendConfig::new("https://demo.upsc-tracker.example", "demo-anon-key");
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), TrackerError> {
    upsc_tracker::init_tracing();

    let backend = Arc::new(MemoryBackend::new());
    let admin = backend.add_user("admin@upsc.example", "admin-pass", "Asha Admin", Role::Admin);
    backend.persist_session_for(&admin);

    let tracker = Tracker::<MemoryBackend>::builder().config(load_config()?).build(Arc::clone(&backend));
    report(&tracker, "created");

    tracker.start();
    tracker.store().wait_until_settled().await;
    report(&tracker, "restored");

    tracker.store().sign_out().await;
    report(&tracker, "signed out");

    tracker
        .store()
        .sign_up("ravi@upsc.example", "student-pass", "Ravi Student", Role::Student)
        .await?;
    let signed_in = tracker
        .store()
        .sign_in("ravi@upsc.example", "student-pass")
        .await?;
    report(&tracker, "student signed in");
    if let Some(profile) = signed_in.profile {
        println!(
            "{{\"landing\":{}}}",
            serde_json::to_string(tracker.gate().home_for(profile.role))?
        );
    }

    if let Err(e) = tracker.store().sign_in("ravi@upsc.example", "wrong").await {
        tracing::warn!(error = %e, "expected failure");
    }
    report(&tracker, "bad password attempt");

    let newcomer = backend.add_account("nisha@upsc.example", "nisha-pass");
    backend.sign_in_elsewhere(&newcomer);
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    report(&tracker, "signed in from another tab");

    backend.add_profile(&newcomer, "Nisha", Role::Student);
    tracker.store().refresh_profile().await?;
    report(&tracker, "profile refreshed");

    tracker.shutdown().await;
    Ok(())
}
