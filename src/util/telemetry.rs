//! Telemetry helpers for structured logging and tracing.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_DIRECTIVE: &str = "prometheus_task_pipeline=info";

/// Install a fmt subscriber filtered by `RUST_LOG` (or [`DEFAULT_LOG_DIRECTIVE`]).
///
/// Does nothing if the application already installed a global subscriber.
/// Thread names are included because pipeline work runs on whichever caller
/// thread happens to drive it.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVE));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .try_init();
}
