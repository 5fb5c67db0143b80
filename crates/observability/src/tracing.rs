//! Tracing/logging initialization.

use tracing_subscriber::EnvFilter;

/// Initialize JSON logging to stderr.
///
/// `RUST_LOG` takes precedence over `default_directive`. Safe to call
/// multiple times (subsequent calls are no-ops).
pub fn init(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    // Stdout stays free for the CLI's own output.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
