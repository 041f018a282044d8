//! Telemetry initialization.
//!
//! Controlled by `RUST_LOG` (standard `tracing_subscriber::EnvFilter` syntax).
//! Emits structured JSON events to stderr so orchestrator runs can be piped
//! into log aggregation without a separate parser.

use tracing_subscriber::EnvFilter;

/// Initialize the process-wide tracing subscriber. Call once at the top of `main`.
pub fn init() {
    use tracing_subscriber::layer::SubscriberExt as _;
    use tracing_subscriber::util::SubscriberInitExt as _;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();
}
