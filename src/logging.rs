//! Logging prelude module for convenient access to tracing macros.
//!
//! This module provides convenient re-exports of common tracing macros
//! to reduce verbosity and maintain consistency across the codebase.
//!
//! # Usage
//!
//! ```ignore
//! use recsync::logging::*;
//!
//! info!("This is an info message");
//! warn!("This is a warning");
//! ```

pub use tracing::{debug, error, info, trace, warn};

use tracing_subscriber::EnvFilter;

use crate::config::LogFormat;

/// Initialize the tracing subscriber with environment filter support.
///
/// `level` applies when `RUST_LOG` is unset; otherwise the environment wins:
///
/// ```bash
/// RUST_LOG=debug recsync simulate
/// RUST_LOG=recsync::protocol=trace recsync simulate
/// ```
///
/// Output goes to stderr so stdout stays free for `--json` reports. A
/// second call is a no-op.
pub fn init_tracing(level: &str, format: LogFormat) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
	let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
	let result = match format {
		LogFormat::Json => builder.json().try_init(),
		LogFormat::Compact => builder.compact().try_init(),
		LogFormat::Pretty => builder.try_init(),
	};
	if let Err(e) = result {
		debug!("tracing already initialized: {}", e);
	}
}

// vim: ts=4
