//! Backend connection configuration.
//!
//! Two values are required: the project endpoint and its public access key.
//! Builds routinely ship with the template values still in place, so
//! validation rejects placeholder-looking values as well as empty ones.

use serde::{Deserialize, Serialize};

/// Substrings that mark a value as an unfilled template.
const PLACEHOLDER_MARKERS: &[&str] = &[
    "your-project",
    "your_project",
    "your-anon-key",
    "your_anon_key",
    "placeholder",
    "changeme",
];

/// Errors found while validating a [`BackendConfig`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A required value is empty or missing.
    #[error("missing backend setting: {0}")]
    Missing(&'static str),

    /// The value still looks like a template placeholder.
    #[error("backend setting {0} still holds a placeholder value")]
    Placeholder(&'static str),

    /// The endpoint is not an http(s) URL with a host.
    #[error("backend url is not a valid http(s) url: {0}")]
    InvalidUrl(String),
}

/// Connection parameters for the hosted backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Project endpoint, e.g. `https://abc123.example.co`.
    #[serde(default)]
    pub url: String,

    /// Public (anonymous) access key.
    #[serde(default)]
    pub anon_key: String,
}

impl BackendConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            anon_key: anon_key.into(),
        }
    }

    /// Checks that both values are present and well-formed.
    ///
    /// # Errors
    /// - [`ConfigError::Missing`]: a value is empty
    /// - [`ConfigError::Placeholder`]: a value still holds template text
    /// - [`ConfigError::InvalidUrl`]: the url isn't `http(s)://host...`
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.url.trim();
        let key = self.anon_key.trim();

        if url.is_empty() {
            return Err(ConfigError::Missing("url"));
        }
        if key.is_empty() {
            return Err(ConfigError::Missing("anon_key"));
        }
        if looks_like_placeholder(url) {
            return Err(ConfigError::Placeholder("url"));
        }
        if looks_like_placeholder(key) {
            return Err(ConfigError::Placeholder("anon_key"));
        }

        let host = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"))
            .ok_or_else(|| ConfigError::InvalidUrl(url.to_string()))?;
        if host.is_empty() || host.starts_with('/') || host.contains(' ') {
            return Err(ConfigError::InvalidUrl(url.to_string()));
        }
        Ok(())
    }

    /// Returns `true` if [`validate`](Self::validate) would succeed.
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

fn looks_like_placeholder(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    if lower.starts_with('<') && lower.ends_with('>') {
        return true;
    }
    PLACEHOLDER_MARKERS.iter().any(|marker| lower.contains(marker))
}
