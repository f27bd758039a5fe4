#![deny(missing_docs)]
//! Shared helpers for hashring tests.

/// Install a tracing subscriber honoring the `RUST_LOG` environment
/// variable, defaulting to INFO.
///
/// Call this at the top of a test to see the ring's collision machinery
/// narrate itself, e.g. `RUST_LOG=hashring=trace`. Repeated calls are
/// fine; only the first installs.
pub fn enable_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing::Level::INFO.into())
                .from_env_lossy(),
        )
        .with_test_writer()
        .try_init();
}
