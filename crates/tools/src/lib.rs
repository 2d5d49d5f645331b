//! lanevm Tools
//!
//! Logging bootstrap and the sample programs driven by the `lanevm-demo` CLI.

pub mod samples;

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize logging with a default filter.
///
/// Use `RUST_LOG` environment variable to override the default filter.
/// Default is `info`, with compiler and VM summaries at `debug`.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,lanevm_vm=debug"));

    fmt().with_env_filter(filter).with_target(false).init();
}
