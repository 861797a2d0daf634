//! Backend capability layer for UPSC Tracker.
//!
//! The tracker doesn't talk to a database or run its own auth server. All
//! of that lives in a hosted authentication-and-storage service. This crate
//! describes what the app needs from that service, nothing more:
//!
//! 1. **Identity types**: [`User`], [`Session`], [`Profile`], [`Role`]
//! 2. **The backend contract**: the [`AuthBackend`] trait
//! 3. **Connection config**: [`BackendConfig`] and its validation
//! 4. **An in-memory backend**: [`MemoryBackend`] (feature `memory`), used
//!    by tests and the demo
//!
//! # How it fits in the stack
//!
//! ```text
//! Gate Layer (upsc-gate)        ← decides what a route may render
//!     ↕
//! Session Layer (upsc-session)  ← owns session state, talks to the backend
//!     ↕
//! Backend Layer (this crate)    ← identity types + backend capability trait
//! ```
//!
//! # Feature Flags
//!
//! - `memory` (default): in-memory [`MemoryBackend`] with fault injection

#![allow(async_fn_in_trait)]

mod backend;
mod config;
mod error;
#[cfg(feature = "memory")]
mod memory;
mod types;

pub use backend::AuthBackend;
pub use config::{BackendConfig, ConfigError};
pub use error::BackendError;
#[cfg(feature = "memory")]
pub use memory::{CallCounts, MemoryBackend};
pub use types::{
    AuthChange, AuthEvent, NewProfile, Profile, Role, Session, User, UserId,
    unix_now,
};
