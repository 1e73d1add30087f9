//! Progress display callback for the CLI
//!
//! Draws a one-line transfer bar on stderr and saves delivered recordings
//! into the output directory.

pub mod constants;

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Instant;
use tracing::{error, info};

use crate::callbacks::{ProgressStats, SyncCallbacks};
use crate::error::{SyncError, TransferFailure};
use crate::protocol::{ConnectionState, DeviceEvent, DeviceStatus, RemoteFile};
use crate::types::{AssembledFile, BatchSummary};

/// Progress display constants
pub use constants::*;

/// Shared state for progress tracking
#[derive(Debug)]
pub struct ProgressState {
	pub last_update: Mutex<Instant>,
	/// Files written so far
	pub saved: Mutex<Vec<PathBuf>>,
}

impl ProgressState {
	/// Create a new progress state
	pub fn new() -> Self {
		Self { last_update: Mutex::new(Instant::now()), saved: Mutex::new(Vec::new()) }
	}
}

impl Default for ProgressState {
	fn default() -> Self {
		Self::new()
	}
}

/// CLI progress callback
pub struct CliProgressCallback {
	state: ProgressState,
	output_dir: PathBuf,
	quiet: bool,
}

impl CliProgressCallback {
	/// Save recordings into `output_dir`
	pub fn new(output_dir: PathBuf) -> Self {
		Self { state: ProgressState::new(), output_dir, quiet: false }
	}

	/// Suppress the progress bar and the listing
	pub fn quiet(mut self, quiet: bool) -> Self {
		self.quiet = quiet;
		self
	}

	pub fn saved(&self) -> Vec<PathBuf> {
		self.state.saved.lock().unwrap_or_else(|e| e.into_inner()).clone()
	}

	fn line(&self, text: &str) {
		if !self.quiet {
			let _ = writeln!(std::io::stderr(), "\r{}", text);
		}
	}
}

/// Render the bar for `percent`
pub fn progress_bar(percent: u8) -> String {
	let ratio = (percent.min(100) as f64) / 100.0;
	let filled = (ratio * PROGRESS_BAR_WIDTH as f64) as usize;
	format!("[{}{}]", "=".repeat(filled), " ".repeat(PROGRESS_BAR_WIDTH - filled))
}

impl SyncCallbacks for CliProgressCallback {
	fn on_state_change(&self, state: ConnectionState) {
		info!("→ {:?}", state);
	}

	fn on_status(&self, status: &DeviceStatus) {
		let battery = status.battery_percent.map(|p| format!("{}%", p)).unwrap_or_else(|| "?".into());
		let firmware = status.firmware.map(|v| v.to_string()).unwrap_or_else(|| "?".into());
		let storage = match status.capacity {
			Some(c) => format!("{:.1}/{:.1} MB", c.used as f64 / 1e6, c.total as f64 / 1e6),
			None => "?".to_string(),
		};
		self.line(&format!("  Battery {} | Firmware {} | Storage {}", battery, firmware, storage));
	}

	fn on_catalog(&self, files: &[RemoteFile]) {
		self.line(&format!("  {} recordings on device", files.len()));
		for file in files {
			self.line(&format!(
				"    {:<20} {:>5}s {:>10.1} KB",
				file.display_name,
				file.duration_seconds,
				file.size_bytes as f64 / BYTES_PER_KB
			));
		}
	}

	fn on_progress(&self, stats: ProgressStats) {
		if self.quiet {
			return;
		}
		// Throttle redraws, but always draw the final state
		let mut last = self.state.last_update.lock().unwrap_or_else(|e| e.into_inner());
		if stats.percent < 100 && last.elapsed().as_millis() < UPDATE_THROTTLE_MS {
			return;
		}
		*last = Instant::now();
		drop(last);

		let _ = write!(
			std::io::stderr(),
			"\r  [{}/{}] {} {} {:>3}% {:.1}/{:.1} KB {}s",
			stats.file_index,
			stats.files_total,
			stats.file_name,
			progress_bar(stats.percent),
			stats.percent,
			stats.received as f64 / BYTES_PER_KB,
			stats.expected as f64 / BYTES_PER_KB,
			stats.elapsed.as_secs()
		);
		let _ = std::io::stderr().flush();
	}

	fn on_file_ready(&self, file: AssembledFile, _is_batch: bool) {
		let path = self.output_dir.join(&file.name);
		match fs::write(&path, &file.bytes) {
			Ok(()) => {
				self.line(&format!("  Saved {} -> {}", file.source.display_name, path.display()));
				self.state.saved.lock().unwrap_or_else(|e| e.into_inner()).push(path);
			}
			Err(e) => error!("Failed to write {}: {}", path.display(), e),
		}
	}

	fn on_file_failed(&self, file: &RemoteFile, failure: &TransferFailure) {
		self.line(&format!("  {}: {}", file.display_name, failure.user_message()));
	}

	fn on_batch_complete(&self, summary: &BatchSummary) {
		self.line(&format!(
			"  Done: {} saved, {} failed, {} skipped in {:.1}s",
			summary.completed(),
			summary.failed(),
			summary.skipped(),
			summary.elapsed.as_secs_f64()
		));
	}

	fn on_device_event(&self, event: &DeviceEvent) {
		if let DeviceEvent::Button(button) = event {
			self.line(&format!("  Button: {:?}", button));
		}
	}

	fn on_error(&self, error: &SyncError) {
		self.line(&format!("  {}", error.user_message()));
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_progress_bar_bounds() {
		assert_eq!(progress_bar(0), format!("[{}]", " ".repeat(PROGRESS_BAR_WIDTH)));
		assert_eq!(progress_bar(100), format!("[{}]", "=".repeat(PROGRESS_BAR_WIDTH)));
		assert_eq!(progress_bar(250), progress_bar(100));
	}

	#[test]
	fn test_file_ready_writes_output() {
		let dir = tempfile::tempdir().unwrap();
		let callback = CliProgressCallback::new(dir.path().to_path_buf()).quiet(true);
		let source = RemoteFile::new(b"REC1".to_vec(), 4, 0, 0);
		callback.on_file_ready(
			AssembledFile { name: "recording-x.wav".into(), bytes: vec![1, 2, 3], source },
			false,
		);
		let saved = callback.saved();
		assert_eq!(saved.len(), 1);
		assert_eq!(fs::read(&saved[0]).unwrap(), vec![1, 2, 3]);
	}
}

// vim: ts=4
