//! Configuration for recsync sessions
//!
//! The configuration follows a priority chain:
//! 1. Built-in defaults (Config::default())
//! 2. Config file (TOML, or JSON when the path ends in `.json`)
//! 3. CLI flags (highest priority)

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::SyncError;
use crate::protocol::HEADER_LEN;

// ============================================================================
// MAIN CONFIGURATION STRUCT
// ============================================================================

/// Configuration for sync sessions, the CLI and the loopback emulator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
	// ========================================================================
	// OUTPUT
	// ========================================================================
	/// Directory the CLI writes assembled recordings to
	pub output_dir: PathBuf,

	/// Prefix of generated recording names
	pub file_prefix: String,

	// ========================================================================
	// SESSION TIMING
	// ========================================================================
	/// Pause between the last transfer and session teardown
	pub completion_pause_ms: u64,

	/// Elapsed-time counter period
	pub tick_interval_ms: u64,

	/// Watchdog for a silent device; 0 disables it
	pub response_timeout_secs: u64,

	// ========================================================================
	// DEVICE BEHAVIOUR
	// ========================================================================
	/// Set the device clock from the host after connecting
	pub sync_clock_on_connect: bool,

	/// Ask the device for its fast transfer mode before a batch
	pub high_speed_transfers: bool,

	// ========================================================================
	// LOGGING
	// ========================================================================
	/// Log level (trace, debug, info, warn, error)
	pub log_level: String,

	/// Log format
	pub log_format: LogFormat,

	// ========================================================================
	// EMULATOR
	// ========================================================================
	/// Loopback device used by `recsync simulate`
	pub emulator: EmulatorConfig,
}

impl Default for Config {
	fn default() -> Self {
		Config {
			output_dir: PathBuf::from("recordings"),
			file_prefix: "recording".to_string(),

			completion_pause_ms: 1500,
			tick_interval_ms: 1000,
			response_timeout_secs: 0,

			sync_clock_on_connect: true,
			high_speed_transfers: true,

			log_level: "info".to_string(),
			log_format: LogFormat::Pretty,

			emulator: EmulatorConfig::default(),
		}
	}
}

impl Config {
	/// Load from a file; JSON when the extension is `.json`, TOML otherwise
	pub fn load(path: &Path) -> Result<Self, SyncError> {
		let text = fs::read_to_string(path)?;
		match path.extension().and_then(|e| e.to_str()) {
			Some("json") => {
				let config: Config = serde_json::from_str(&text).map_err(|e| {
					SyncError::InvalidConfig { message: format!("{}: {}", path.display(), e) }
				})?;
				config.validate()?;
				Ok(config)
			}
			_ => Self::from_toml_str(&text),
		}
	}

	pub fn from_toml_str(text: &str) -> Result<Self, SyncError> {
		let config: Config = toml::from_str(text)
			.map_err(|e| SyncError::InvalidConfig { message: e.to_string() })?;
		config.validate()?;
		Ok(config)
	}

	pub fn validate(&self) -> Result<(), SyncError> {
		if self.tick_interval_ms == 0 {
			return Err(SyncError::InvalidConfig {
				message: "tickIntervalMs must be greater than zero".to_string(),
			});
		}
		if self.file_prefix.is_empty() || self.file_prefix.contains(&['/', '\\'][..]) {
			return Err(SyncError::InvalidConfig {
				message: format!("invalid filePrefix {:?}", self.file_prefix),
			});
		}
		self.emulator.validate()
	}

	pub fn completion_pause(&self) -> Duration {
		Duration::from_millis(self.completion_pause_ms)
	}

	pub fn tick_interval(&self) -> Duration {
		Duration::from_millis(self.tick_interval_ms.max(1))
	}

	pub fn response_timeout(&self) -> Option<Duration> {
		match self.response_timeout_secs {
			0 => None,
			secs => Some(Duration::from_secs(secs)),
		}
	}
}

// ============================================================================
// NESTED CONFIGURATION STRUCTS
// ============================================================================

/// Loopback emulator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmulatorConfig {
	/// Recordings the emulated device holds
	pub file_count: usize,

	/// Length of each recording in seconds
	pub file_seconds: u32,

	/// FileData payload size
	pub chunk_size: usize,

	/// Largest notification the emulated link delivers at once
	pub mtu: usize,
}

impl Default for EmulatorConfig {
	fn default() -> Self {
		EmulatorConfig { file_count: 3, file_seconds: 2, chunk_size: 480, mtu: 244 }
	}
}

impl EmulatorConfig {
	pub fn validate(&self) -> Result<(), SyncError> {
		if self.chunk_size == 0 || self.chunk_size > u16::MAX as usize - 2 {
			return Err(SyncError::InvalidConfig {
				message: format!("emulator chunkSize {} out of range", self.chunk_size),
			});
		}
		if self.mtu <= HEADER_LEN {
			return Err(SyncError::InvalidConfig {
				message: format!("emulator mtu must exceed the {}-byte header", HEADER_LEN),
			});
		}
		Ok(())
	}
}

// ============================================================================
// ENUMERATIONS
// ============================================================================

/// Log format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
	Json,
	#[default]
	Pretty,
	Compact,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_config_default() {
		let config = Config::default();
		assert_eq!(config.file_prefix, "recording");
		assert_eq!(config.tick_interval(), Duration::from_secs(1));
		assert_eq!(config.response_timeout(), None);
		assert!(config.sync_clock_on_connect);
		assert!(config.validate().is_ok());
	}

	#[test]
	fn test_toml_overrides() {
		let config = Config::from_toml_str(
			r#"
			filePrefix = "meeting"
			completionPauseMs = 0
			responseTimeoutSecs = 5
			logFormat = "json"

			[emulator]
			fileCount = 7
			"#,
		)
		.unwrap();
		assert_eq!(config.file_prefix, "meeting");
		assert_eq!(config.completion_pause(), Duration::ZERO);
		assert_eq!(config.response_timeout(), Some(Duration::from_secs(5)));
		assert_eq!(config.log_format, LogFormat::Json);
		assert_eq!(config.emulator.file_count, 7);
		assert_eq!(config.emulator.chunk_size, 480);
	}

	#[test]
	fn test_validation() {
		assert!(Config::from_toml_str("tickIntervalMs = 0").is_err());
		assert!(Config::from_toml_str("filePrefix = \"a/b\"").is_err());
		assert!(Config::from_toml_str("[emulator]\nmtu = 6").is_err());
		assert!(Config::from_toml_str("[emulator]\nchunkSize = 0").is_err());
		assert!(Config::from_toml_str("logFormat = \"fancy\"").is_err());
	}

	#[test]
	fn test_config_serialization() {
		let config = Config::default();
		let json = serde_json::to_string(&config).expect("Failed to serialize");
		let deserialized: Config = serde_json::from_str(&json).expect("Failed to deserialize");
		assert_eq!(config.file_prefix, deserialized.file_prefix);
		assert_eq!(config.emulator.mtu, deserialized.emulator.mtu);
	}
}

// vim: ts=4
