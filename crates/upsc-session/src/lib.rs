//! Auth session orchestration for UPSC Tracker.
//!
//! This crate owns "who is signed in" for the whole app:
//!
//! 1. **Bootstrap**: restore a persisted session once at startup, under a
//!    timeout, with a retry path
//! 2. **Auth events**: a standing subscription to backend session changes
//!    (sign-in in another tab, token refresh, sign-out)
//! 3. **Profiles**: resolve the signed-in user's profile through a bounded
//!    cache ([`ProfileResolver`], [`ProfileCache`])
//! 4. **Actions**: sign in, sign up, sign out, retry
//!
//! Everything is exposed through one context object, [`SessionStore`],
//! whose state ([`SessionState`]) is published on a `watch` channel.
//!
//! # How it fits in the stack
//!
//! ```text
//! Gate Layer (above)            ← reads SessionState to allow/deny routes
//!     ↕
//! Session Layer (this crate)    ← owns and reconciles auth state
//!     ↕
//! Backend Layer (below)         ← AuthBackend trait, identity types
//! ```

mod actions;
mod bootstrap;
mod cache;
mod config;
mod error;
mod listener;
mod resolver;
mod state;
mod store;

pub use actions::SignedIn;
pub use cache::ProfileCache;
pub use config::StoreConfig;
pub use error::AuthError;
pub use resolver::ProfileResolver;
pub use state::SessionState;
pub use store::SessionStore;
