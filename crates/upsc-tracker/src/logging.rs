//! Tracing setup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "upsc_tracker=info,upsc_session=info";

/// Installs a global `tracing` subscriber: `RUST_LOG` (or
/// [`DEFAULT_FILTER`]) plus a fmt layer.
///
/// Returns `false` if a subscriber was already installed, which makes it
/// safe to call from tests and embedding applications alike.
pub fn init_tracing() -> bool {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}
