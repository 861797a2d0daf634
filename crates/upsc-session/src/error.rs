//! Error types for the session layer.

use std::time::Duration;

use upsc_auth::{BackendError, ConfigError, UserId};

/// Errors surfaced by the session store.
///
/// Initialization failures land in [`SessionState::error`](crate::SessionState)
/// and block the UI behind a retry gate. Sign-in and sign-up failures are
/// returned to the caller instead. A missing profile is not an error at all.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Backend connection settings are missing or malformed.
    /// Fatal until the configuration is corrected.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// The backend could not be reached. Retryable.
    #[error("network error: {0}")]
    Network(String),

    /// The backend rejected the credentials or the session.
    /// Resubmitting the same credentials won't help.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Session restore didn't finish within the bounded wait. Retryable.
    #[error("session restore timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The credential was created but the profile row was not.
    /// The account exists in a half-registered state.
    #[error("account {user_id} was created but its profile was not: {reason}")]
    ProfileCreation { user_id: UserId, reason: String },

    /// Any other backend failure.
    #[error("backend error: {0}")]
    Backend(String),

    /// The store was torn down; no further actions are accepted.
    #[error("session store is shut down")]
    Closed,
}

impl AuthError {
    /// Returns `true` if trying again may succeed without any change
    /// on the user's side.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }
}

impl From<BackendError> for AuthError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::InvalidCredentials => {
                Self::Authentication("invalid login credentials".into())
            }
            BackendError::Network(msg) => Self::Network(msg),
            BackendError::NotFound => Self::Backend("no matching row".into()),
            BackendError::Rejected { code, message } => {
                Self::Backend(format!("{message} ({code})"))
            }
            BackendError::Unexpected(msg) => Self::Backend(msg),
        }
    }
}
