//! Tracing initialization.
//!
//! Diagnostics go to stderr so they never mix with the run log on stdout.
//! `OPENMETA_LOG` (or `RUST_LOG`) sets the filter, `OPENMETA_LOG_JSON=1`
//! switches to JSON lines.

use tracing_subscriber::{prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "warn";

/// Initialize tracing. Call once at process startup; later calls are no-ops.
pub fn init_tracing(verbose: bool) {
    let filter = std::env::var("OPENMETA_LOG")
        .ok()
        .and_then(|spec| EnvFilter::try_new(spec).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| {
            EnvFilter::new(if verbose {
                "openmeta_testbench=debug,info"
            } else {
                DEFAULT_FILTER
            })
        });

    let json = std::env::var("OPENMETA_LOG_JSON").is_ok_and(|v| v == "1");

    let _ = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .try_init()
    };
}
