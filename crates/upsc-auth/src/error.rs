//! Error types for backend calls.

/// Errors a backend call can come back with.
///
/// The session layer classifies these into its own taxonomy; the backend
/// only has to say what went wrong on the wire.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The backend rejected the email/password pair.
    #[error("invalid login credentials")]
    InvalidCredentials,

    /// The request never got a response (offline, DNS, connection reset).
    #[error("network failure: {0}")]
    Network(String),

    /// A point lookup matched no row. For profile lookups this is a normal
    /// outcome, not a failure.
    #[error("no matching row")]
    NotFound,

    /// The backend answered but refused the request
    /// (duplicate account, weak password, row-level policy, ...).
    #[error("request rejected ({code}): {message}")]
    Rejected { code: String, message: String },

    /// Anything else.
    #[error("unexpected backend failure: {0}")]
    Unexpected(String),
}

impl BackendError {
    /// Shorthand for a [`BackendError::Rejected`].
    pub fn rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Returns `true` for connectivity failures.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}
