//! # UPSC Tracker auth
//!
//! Client-side authentication and session orchestration for the UPSC
//! Tracker study app.
//!
//! The app talks to a hosted auth-and-database backend through the
//! [`AuthBackend`](upsc_auth::AuthBackend) trait. This crate restores the
//! persisted session at startup, keeps it in sync with backend
//! notifications, resolves each user's profile (and therefore role), and
//! gates routes by role.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use upsc_tracker::prelude::*;
//!
//! # async fn run() -> Result<(), TrackerError> {
//! upsc_tracker::init_tracing();
//!
//! let tracker = Tracker::<MemoryBackend>::builder()
//!     .config(TrackerConfig::from_env()?)
//!     .build(Arc::new(MemoryBackend::new()));
//! tracker.start();
//!
//! match tracker.check_settled(GateRequirement::admin()).await {
//!     GateDecision::Render => { /* show the admin console */ }
//!     other => println!("{other}"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `memory` (default): re-exports
//!   [`MemoryBackend`](upsc_auth::MemoryBackend) in the prelude

mod app;
mod config;
mod error;
mod logging;

pub use app::{Tracker, TrackerBuilder};
pub use config::{ENV_BACKEND_ANON_KEY, ENV_BACKEND_URL, ENV_INIT_TIMEOUT_SECS, TrackerConfig};
pub use error::TrackerError;
pub use logging::{DEFAULT_FILTER, init_tracing};

pub use upsc_auth as auth;
pub use upsc_gate as gate;
pub use upsc_session as session;

pub mod prelude {
    pub use crate::{Tracker, TrackerBuilder, TrackerConfig, TrackerError};
    pub use upsc_auth::{AuthBackend, BackendConfig, Profile, Role, User, UserId};
    #[cfg(feature = "memory")]
    pub use upsc_auth::MemoryBackend;
    pub use upsc_gate::{GateDecision, GateRequirement, GateRoutes, RouteGate};
    pub use upsc_session::{AuthError, SessionState, SessionStore, SignedIn, StoreConfig};
}
