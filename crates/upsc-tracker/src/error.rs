//! Unified error type for the tracker.

use upsc_auth::{BackendError, ConfigError};
use upsc_session::AuthError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// An auth-session error (sign-in, sign-up, restore).
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// A raw backend error.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Invalid backend connection settings.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An environment variable held a value that couldn't be parsed.
    #[error("invalid value {value:?} for {name}")]
    InvalidEnv { name: &'static str, value: String },

    /// Reading the configuration file failed.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file isn't valid JSON for [`TrackerConfig`](crate::TrackerConfig).
    #[error("failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),
}
