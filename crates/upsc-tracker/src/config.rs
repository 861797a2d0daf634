//! Application configuration: backend connection, store tunables, routes.
//!
//! Loaded from a JSON file, a JSON string, or environment variables. Any
//! section left out falls back to its defaults. Connection settings are
//! only *checked* at bootstrap, so a missing URL or key loads fine and
//! then surfaces as a configuration error in the session state.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;
use upsc_auth::BackendConfig;
use upsc_gate::GateRoutes;
use upsc_session::StoreConfig;

use crate::TrackerError;

/// Backend URL.
pub const ENV_BACKEND_URL: &str = "UPSC_BACKEND_URL";
/// Backend anonymous (public) API key.
pub const ENV_BACKEND_ANON_KEY: &str = "UPSC_BACKEND_ANON_KEY";
/// Optional override of the restore timeout, in whole seconds.
pub const ENV_INIT_TIMEOUT_SECS: &str = "UPSC_INIT_TIMEOUT_SECS";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub backend: BackendConfig,
    pub store: StoreConfig,
    pub routes: GateRoutes,
}

impl TrackerConfig {
    /// Parses a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, TrackerError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TrackerError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&text)?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Builds a config from the process environment.
    ///
    /// See [`from_lookup`](Self::from_lookup).
    pub fn from_env() -> Result<Self, TrackerError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from `lookup`, which maps a variable name to its
    /// value.
    ///
    /// Reads [`ENV_BACKEND_URL`], [`ENV_BACKEND_ANON_KEY`] and, optionally,
    /// [`ENV_INIT_TIMEOUT_SECS`]. Unset connection variables become empty
    /// strings. Only an unparseable timeout is an error here.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, TrackerError> {
        let mut config = Self {
            backend: BackendConfig::new(
                lookup(ENV_BACKEND_URL).unwrap_or_default(),
                lookup(ENV_BACKEND_ANON_KEY).unwrap_or_default(),
            ),
            ..Self::default()
        };

        if let Some(raw) = lookup(ENV_INIT_TIMEOUT_SECS) {
            config.store.init_timeout_secs =
                raw.trim().parse().map_err(|_| TrackerError::InvalidEnv {
                    name: ENV_INIT_TIMEOUT_SECS,
                    value: raw.clone(),
                })?;
        }
        Ok(config)
    }
}
