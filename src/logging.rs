//! Logging prelude module for convenient access to tracing macros.
//!
//! # Usage
//!
//! ```ignore
//! use crate::logging::*;
//!
//! info!("backup pass finished");
//! warn!("provider skipped");
//! ```

pub use tracing::{debug, error, info, trace, warn};

/// Initialize the tracing subscriber with environment filter support.
///
/// Logs at `default_level` unless overridden through `RUST_LOG`:
///
/// ```bash
/// RUST_LOG=debug backr watch
/// RUST_LOG=backr::coalescer=trace backr watch
/// ```
pub fn init_tracing(default_level: &str) {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level.to_string())),
		)
		.with_writer(std::io::stderr)
		.init();
}

// vim: ts=4
