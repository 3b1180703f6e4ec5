//! Logging setup.
//!
//! Structured logging via `tracing`, with noisy library modules filtered
//! to `warn` so business logs stay readable at `info`.

use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Noisy modules that should be filtered to warn level.
///
/// These produce high-volume debug/trace logs (connection pools, TLS
/// handshakes, WebSocket frames) without useful business context.
pub const NOISY_MODULES: &[&str] = &[
    "hyper",
    "hyper_util",
    "reqwest",
    "h2",
    "rustls",
    "tokio_util",
    "tungstenite",
];

/// Build the default EnvFilter with noise suppression.
///
/// `RUST_LOG` overrides everything when set.
fn build_filter(log_level: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    let mut directives = String::from(log_level);
    for module in NOISY_MODULES {
        directives.push_str(&format!(",{}=warn", module));
    }

    EnvFilter::new(&directives)
}

/// Initialize logging at the given base level.
pub fn init_logging(log_level: &str) {
    let filter = build_filter(log_level);

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_ansi(true)
        .with_target(true)
        .with_file(false)
        .with_line_number(false);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();

    tracing::info!(
        log_level = %log_level,
        noise_filtered = NOISY_MODULES.len(),
        "Logging initialized"
    );
}
