//! Session store settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Tunables for the session store.
///
/// Sensible defaults are provided; override only what you need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// How long (in seconds) the startup session restore may take before
    /// it is abandoned with a timeout error.
    ///
    /// Default: 10 seconds.
    pub init_timeout_secs: u64,

    /// Maximum number of profiles kept in the profile cache.
    ///
    /// Default: 64.
    pub profile_cache_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            init_timeout_secs: 10,
            profile_cache_capacity: 64,
        }
    }
}

impl StoreConfig {
    /// The restore timeout as a `Duration`.
    pub fn init_timeout(&self) -> Duration {
        Duration::from_secs(self.init_timeout_secs)
    }

    /// Fixes out-of-range values so the config is safe to use.
    ///
    /// Called by [`SessionStore::new`](crate::SessionStore::new). A zero
    /// timeout would fail every restore instantly and a zero-capacity cache
    /// could never hold the signed-in profile, so both are raised to 1.
    pub fn validated(mut self) -> Self {
        if self.init_timeout_secs == 0 {
            warn!("init_timeout_secs is 0, using 1");
            self.init_timeout_secs = 1;
        }
        if self.profile_cache_capacity == 0 {
            warn!("profile_cache_capacity is 0, using 1");
            self.profile_cache_capacity = 1;
        }
        self
    }
}
