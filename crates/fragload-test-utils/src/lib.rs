#![forbid(unsafe_code)]

//! Shared test utilities for the fragload workspace.

pub mod http_server;
pub mod transport;

pub use http_server::{REQUESTED_RANGE, TestHttpServer, ranged};
pub use transport::{RecordedRequest, Reply, ScriptedNetwork, ScriptedTransport};

/// Install a `tracing` subscriber writing through the test harness.
///
/// Honours `RUST_LOG`; safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
