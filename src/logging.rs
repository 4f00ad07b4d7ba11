//! Logging prelude module for convenient access to tracing macros.
//!
//! This module provides convenient re-exports of common tracing macros
//! to reduce verbosity and maintain consistency across the codebase.
//!
//! # Usage
//!
//! ```ignore
//! use crate::logging::*;
//!
//! info!("This is an info message");
//! warn!("This is a warning");
//! error!("An error occurred");
//! debug!("Debug information");
//! trace!("Detailed trace information");
//! ```

pub use tracing::{debug, error, info, trace, warn};

/// Initialize the tracing subscriber with environment filter support.
///
/// By default, logs at INFO level and above are displayed. Control the log level
/// with the `RUST_LOG` environment variable:
///
/// ```bash
/// RUST_LOG=debug ingestctl ingest ...
/// RUST_LOG=ingestctl::scheduler=trace,ingestctl::whitelist=debug ingestctl ingest ...
/// ```
pub fn init_tracing() {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
		)
		.with_writer(std::io::stderr)
		.init();
}

// vim: ts=4
