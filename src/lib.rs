pub mod cache; // Query cache: dedup, gating, invalidation
pub mod config;
pub mod core_state; // Injected context: API + cache
pub mod form; // Form controller, schema, diagnosis tags
pub mod gateway; // REST gateway (HTTP + mock)
pub mod modal; // Edit / register / delete flows
pub mod models;
pub mod session;
pub mod views; // List, detail, search, current user

pub use core_state::{CoreError, CoreState};

use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber. `RUST_LOG` wins over the default filter.
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing() {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("{} v{} starting", config::APP_NAME, config::APP_VERSION);
    }
}
