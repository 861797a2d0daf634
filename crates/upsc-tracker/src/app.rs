//! `Tracker` builder: one session store plus its route gate.
//!
//! This is the entry point for embedding the auth layer in an app. It ties
//! together backend → session store → route gate.

use std::sync::Arc;

use upsc_auth::{AuthBackend, BackendConfig};
use upsc_gate::{GateDecision, GateRequirement, GateRoutes, RouteGate};
use upsc_session::{SessionStore, StoreConfig};

use crate::TrackerConfig;

/// Builder for a [`Tracker`].
///
/// # Example
///
/// ```rust,ignore
/// use upsc_tracker::prelude::*;
///
/// let tracker = Tracker::builder()
///     .config(TrackerConfig::from_env()?)
///     .build(Arc::new(my_backend));
/// tracker.start();
/// let decision = tracker.check_settled(GateRequirement::admin()).await;
/// ```
pub struct TrackerBuilder {
    backend_config: BackendConfig,
    store_config: StoreConfig,
    routes: GateRoutes,
}

impl TrackerBuilder {
    /// Creates a builder with default settings and an empty (invalid)
    /// backend configuration.
    pub fn new() -> Self {
        Self {
            backend_config: BackendConfig::default(),
            store_config: StoreConfig::default(),
            routes: GateRoutes::default(),
        }
    }

    /// Takes every section from a loaded [`TrackerConfig`].
    pub fn config(mut self, config: TrackerConfig) -> Self {
        self.backend_config = config.backend;
        self.store_config = config.store;
        self.routes = config.routes;
        self
    }

    /// Sets the backend connection settings.
    pub fn backend_config(mut self, config: BackendConfig) -> Self {
        self.backend_config = config;
        self
    }

    /// Sets the session store tunables.
    pub fn store_config(mut self, config: StoreConfig) -> Self {
        self.store_config = config;
        self
    }

    /// Sets the gate's redirect targets.
    pub fn routes(mut self, routes: GateRoutes) -> Self {
        self.routes = routes;
        self
    }

    /// Builds the tracker around `backend`. Nothing runs until
    /// [`Tracker::start`].
    pub fn build<B: AuthBackend>(self, backend: Arc<B>) -> Tracker<B> {
        Tracker {
            store: SessionStore::new(backend, self.backend_config, self.store_config),
            gate: RouteGate::new(self.routes),
        }
    }
}

impl Default for TrackerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A session store and the gate that reads it.
pub struct Tracker<B: AuthBackend> {
    store: SessionStore<B>,
    gate: RouteGate,
}

impl<B: AuthBackend> Tracker<B> {
    pub fn builder() -> TrackerBuilder {
        TrackerBuilder::new()
    }

    /// Starts the auth listener and the session restore.
    pub fn start(&self) {
        tracing::info!("UPSC Tracker auth starting");
        self.store.start();
    }

    pub fn store(&self) -> &SessionStore<B> {
        &self.store
    }

    pub fn gate(&self) -> &RouteGate {
        &self.gate
    }

    /// Gate decision for the current state, which may still be `Loading`.
    pub fn check(&self, requirement: GateRequirement) -> GateDecision {
        self.gate.evaluate(&self.store.snapshot(), requirement)
    }

    /// Gate decision once the session restore has settled.
    pub async fn check_settled(&self, requirement: GateRequirement) -> GateDecision {
        let state = self.store.wait_until_settled().await;
        self.gate.evaluate(&state, requirement)
    }

    /// Tears the store down.
    pub async fn shutdown(&self) {
        self.store.teardown().await;
    }
}
