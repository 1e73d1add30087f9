//! Library API tests using SyncBuilder and the CLI progress callback
//!
//! This test suite covers:
//! - SyncBuilder configuration (fluent API)
//! - Configuration validation before connecting
//! - Selection of a subset of the catalog
//! - Writing recordings to disk through CliProgressCallback

use bytes::Bytes;
use std::fs;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use recsync::audio::WAV_HEADER_LEN;
use recsync::callbacks::CallbackBuilder;
use recsync::config::Config;
use recsync::emulator::{LoopbackDevice, Pairing};
use recsync::error::SyncError;
use recsync::progress::CliProgressCallback;
use recsync::protocol::FileId;
use recsync::sync::{sync_all, SyncBuilder};

// ============================================================================
// Helper Functions for Test Setup
// ============================================================================

fn quick_config() -> Config {
	let mut config = Config::default();
	config.completion_pause_ms = 0;
	config
}

fn device_with(files: &[(&str, usize, u32)]) -> LoopbackDevice {
	files.iter().fold(LoopbackDevice::new("api"), |device, (name, len, created_at)| {
		device.with_recording(name.as_bytes(), Bytes::from(vec![7u8; *len]), *created_at)
	})
}

// ============================================================================
// SyncBuilder
// ============================================================================

#[tokio::test]
async fn test_builder_downloads_everything_by_default() {
	let names = Arc::new(Mutex::new(Vec::new()));
	let seen = names.clone();
	let callbacks = CallbackBuilder::new()
		.on_file_ready(move |file, _| seen.lock().unwrap().push(file.name))
		.build();

	let summary = SyncBuilder::new()
		.config(quick_config())
		.callbacks(callbacks)
		.run(device_with(&[("one", 10, 1), ("two", 20, 2)]))
		.await
		.unwrap();

	assert!(summary.is_complete());
	assert_eq!(summary.completed(), 2);
	let names = names.lock().unwrap();
	assert_eq!(names.len(), 2);
	assert!(names.iter().all(|n| n.starts_with("recording-") && n.ends_with(".wav")));
	assert_ne!(names[0], names[1]);
}

#[tokio::test]
async fn test_builder_selection() {
	let summary = SyncBuilder::new()
		.config(quick_config())
		.select(vec![FileId(b"two".to_vec())])
		.run(device_with(&[("one", 10, 1), ("two", 20, 2), ("three", 30, 3)]))
		.await
		.unwrap();

	assert_eq!(summary.requested(), 1);
	assert_eq!(summary.outcomes[0].file.display_name, "two");
}

#[tokio::test]
async fn test_builder_rejects_unknown_selection() {
	let device = device_with(&[("one", 10, 1)]);
	let result = SyncBuilder::new()
		.config(quick_config())
		.select(vec![FileId(b"missing".to_vec())])
		.run(device)
		.await;
	assert!(matches!(result, Err(SyncError::UnknownFile(_))));
}

#[tokio::test]
async fn test_builder_validates_config_before_connecting() {
	let mut config = quick_config();
	config.file_prefix = String::new();
	let result = SyncBuilder::new().config(config).build(device_with(&[]));
	assert!(matches!(result, Err(SyncError::InvalidConfig { .. })));
}

#[tokio::test]
async fn test_cancelled_pairing_surfaces_as_cancelled() {
	let device = device_with(&[("one", 10, 1)]).with_pairing(Pairing::Cancel);
	let result = SyncBuilder::new().config(quick_config()).run(device).await;
	let err = result.unwrap_err();
	assert!(err.is_cancellation());
	assert_eq!(err.user_message(), "Sync cancelled.");
}

#[tokio::test(start_paused = true)]
async fn test_sync_all_with_defaults() {
	// Default config pauses before teardown; paused time skips it
	let summary = sync_all(device_with(&[("a", 5, 1), ("b", 0, 2)])).await.unwrap();
	assert_eq!(summary.completed(), 2);
	assert!(!summary.aborted);
}

// ============================================================================
// CLI progress callback
// ============================================================================

#[tokio::test]
async fn test_cli_callback_writes_wave_files() {
	let temp_dir = TempDir::new().expect("Failed to create temp dir");
	let display = Arc::new(CliProgressCallback::new(temp_dir.path().to_path_buf()).quiet(true));

	let summary = SyncBuilder::new()
		.config(quick_config())
		.callbacks(Box::new(display.clone()))
		.run(device_with(&[("one", 100, 1), ("two", 50, 2)]))
		.await
		.unwrap();
	assert_eq!(summary.completed(), 2);

	let saved = display.saved();
	assert_eq!(saved.len(), 2);
	let mut sizes: Vec<_> = saved.iter().map(|p| fs::metadata(p).unwrap().len() as usize).collect();
	sizes.sort_unstable();
	assert_eq!(sizes, vec![WAV_HEADER_LEN + 50, WAV_HEADER_LEN + 100]);
	assert!(saved.iter().all(|p| p.starts_with(temp_dir.path())));
}

#[tokio::test]
async fn test_summary_serializes_to_json() {
	let summary = SyncBuilder::new()
		.config(quick_config())
		.run(device_with(&[("one", 10, 1)]))
		.await
		.unwrap();

	let json = serde_json::to_value(&summary).unwrap();
	assert_eq!(json["aborted"], false);
	assert_eq!(json["outcomes"][0]["file"], "one");
	assert_eq!(json["outcomes"][0]["status"], "completed");
	assert_eq!(json["outcomes"][0]["bytes"], WAV_HEADER_LEN + 10);
	assert!(json["sessionId"].is_string());
}

// vim: ts=4
