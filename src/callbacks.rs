//! Callback traits for progress reporting and event handling

use std::sync::Arc;
use std::time::Duration;

use crate::error::{SyncError, TransferFailure};
use crate::protocol::{ConnectionState, DeviceEvent, DeviceStatus, RemoteFile};
use crate::types::{AssembledFile, BatchSummary};

// Type aliases to reduce complexity
type StateFn = dyn Fn(ConnectionState) + Send + Sync;
type StatusFn = dyn Fn(&DeviceStatus) + Send + Sync;
type CatalogFn = dyn Fn(&[RemoteFile]) + Send + Sync;
type ProgressFn = dyn Fn(ProgressStats) + Send + Sync;
type FileReadyFn = dyn Fn(AssembledFile, bool) + Send + Sync;
type FileFailedFn = dyn Fn(&RemoteFile, &TransferFailure) + Send + Sync;
type BatchFn = dyn Fn(&BatchSummary) + Send + Sync;
type DeviceEventFn = dyn Fn(&DeviceEvent) + Send + Sync;
type ErrorFn = dyn Fn(&SyncError) + Send + Sync;

/// Progress of the file currently downloading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressStats {
	/// 1-based position of the file in the batch
	pub file_index: usize,

	/// Files in the batch
	pub files_total: usize,

	/// Display name of the current file
	pub file_name: String,

	/// Bytes received for the current file
	pub received: u64,

	/// Size announced by the device
	pub expected: u64,

	/// 0..=100, rounded down
	pub percent: u8,

	/// Time since the current file started
	pub elapsed: Duration,
}

/// Combined callback handler for all session events
///
/// Every method has a no-op default. Calls are made from the task that
/// drives the session, one at a time.
pub trait SyncCallbacks: Send + Sync {
	/// Connectivity state changed
	fn on_state_change(&self, _state: ConnectionState) {}

	/// Device status was queried or pushed
	fn on_status(&self, _status: &DeviceStatus) {}

	/// File catalog is ready, newest first
	fn on_catalog(&self, _files: &[RemoteFile]) {}

	/// Called with progress update
	fn on_progress(&self, _stats: ProgressStats) {}

	/// A file arrived intact; `is_batch` is true when more than one file was selected
	fn on_file_ready(&self, _file: AssembledFile, _is_batch: bool) {}

	/// A single file failed; the batch continues unless the link is gone
	fn on_file_failed(&self, _file: &RemoteFile, _failure: &TransferFailure) {}

	/// Fires once after the last file of a batch, success or not
	fn on_batch_complete(&self, _summary: &BatchSummary) {}

	/// Button presses, live audio and status pushes
	fn on_device_event(&self, _event: &DeviceEvent) {}

	/// Session-level failure other than a cancellation
	fn on_error(&self, _error: &SyncError) {}
}

/// Default callback implementation that does nothing
pub struct NoCallbacks;

impl SyncCallbacks for NoCallbacks {}

impl<T: SyncCallbacks + ?Sized> SyncCallbacks for Arc<T> {
	fn on_state_change(&self, state: ConnectionState) {
		(**self).on_state_change(state)
	}

	fn on_status(&self, status: &DeviceStatus) {
		(**self).on_status(status)
	}

	fn on_catalog(&self, files: &[RemoteFile]) {
		(**self).on_catalog(files)
	}

	fn on_progress(&self, stats: ProgressStats) {
		(**self).on_progress(stats)
	}

	fn on_file_ready(&self, file: AssembledFile, is_batch: bool) {
		(**self).on_file_ready(file, is_batch)
	}

	fn on_file_failed(&self, file: &RemoteFile, failure: &TransferFailure) {
		(**self).on_file_failed(file, failure)
	}

	fn on_batch_complete(&self, summary: &BatchSummary) {
		(**self).on_batch_complete(summary)
	}

	fn on_device_event(&self, event: &DeviceEvent) {
		(**self).on_device_event(event)
	}

	fn on_error(&self, error: &SyncError) {
		(**self).on_error(error)
	}
}

/// Builder for callbacks using function closures
#[derive(Default)]
pub struct CallbackBuilder {
	state: Option<Box<StateFn>>,
	status: Option<Box<StatusFn>>,
	catalog: Option<Box<CatalogFn>>,
	progress: Option<Box<ProgressFn>>,
	file_ready: Option<Box<FileReadyFn>>,
	file_failed: Option<Box<FileFailedFn>>,
	batch: Option<Box<BatchFn>>,
	device_event: Option<Box<DeviceEventFn>>,
	error: Option<Box<ErrorFn>>,
}

impl CallbackBuilder {
	/// Create a new callback builder
	pub fn new() -> Self {
		Self::default()
	}

	pub fn on_state_change<F>(mut self, callback: F) -> Self
	where
		F: Fn(ConnectionState) + Send + Sync + 'static,
	{
		self.state = Some(Box::new(callback));
		self
	}

	pub fn on_status<F>(mut self, callback: F) -> Self
	where
		F: Fn(&DeviceStatus) + Send + Sync + 'static,
	{
		self.status = Some(Box::new(callback));
		self
	}

	pub fn on_catalog<F>(mut self, callback: F) -> Self
	where
		F: Fn(&[RemoteFile]) + Send + Sync + 'static,
	{
		self.catalog = Some(Box::new(callback));
		self
	}

	/// Set progress callback
	pub fn on_progress<F>(mut self, callback: F) -> Self
	where
		F: Fn(ProgressStats) + Send + Sync + 'static,
	{
		self.progress = Some(Box::new(callback));
		self
	}

	/// Set the per-file delivery callback
	pub fn on_file_ready<F>(mut self, callback: F) -> Self
	where
		F: Fn(AssembledFile, bool) + Send + Sync + 'static,
	{
		self.file_ready = Some(Box::new(callback));
		self
	}

	pub fn on_file_failed<F>(mut self, callback: F) -> Self
	where
		F: Fn(&RemoteFile, &TransferFailure) + Send + Sync + 'static,
	{
		self.file_failed = Some(Box::new(callback));
		self
	}

	/// Set the batch completion callback
	pub fn on_batch_complete<F>(mut self, callback: F) -> Self
	where
		F: Fn(&BatchSummary) + Send + Sync + 'static,
	{
		self.batch = Some(Box::new(callback));
		self
	}

	pub fn on_device_event<F>(mut self, callback: F) -> Self
	where
		F: Fn(&DeviceEvent) + Send + Sync + 'static,
	{
		self.device_event = Some(Box::new(callback));
		self
	}

	/// Set error callback
	pub fn on_error<F>(mut self, callback: F) -> Self
	where
		F: Fn(&SyncError) + Send + Sync + 'static,
	{
		self.error = Some(Box::new(callback));
		self
	}

	/// Build the callbacks handler
	pub fn build(self) -> Box<dyn SyncCallbacks> {
		Box::new(CompositeCallbacks {
			state: self.state,
			status: self.status,
			catalog: self.catalog,
			progress: self.progress,
			file_ready: self.file_ready,
			file_failed: self.file_failed,
			batch: self.batch,
			device_event: self.device_event,
			error: self.error,
		})
	}
}

/// Internal composite callbacks implementation
struct CompositeCallbacks {
	state: Option<Box<StateFn>>,
	status: Option<Box<StatusFn>>,
	catalog: Option<Box<CatalogFn>>,
	progress: Option<Box<ProgressFn>>,
	file_ready: Option<Box<FileReadyFn>>,
	file_failed: Option<Box<FileFailedFn>>,
	batch: Option<Box<BatchFn>>,
	device_event: Option<Box<DeviceEventFn>>,
	error: Option<Box<ErrorFn>>,
}

impl SyncCallbacks for CompositeCallbacks {
	fn on_state_change(&self, state: ConnectionState) {
		if let Some(ref callback) = self.state {
			callback(state);
		}
	}

	fn on_status(&self, status: &DeviceStatus) {
		if let Some(ref callback) = self.status {
			callback(status);
		}
	}

	fn on_catalog(&self, files: &[RemoteFile]) {
		if let Some(ref callback) = self.catalog {
			callback(files);
		}
	}

	fn on_progress(&self, stats: ProgressStats) {
		if let Some(ref callback) = self.progress {
			callback(stats);
		}
	}

	fn on_file_ready(&self, file: AssembledFile, is_batch: bool) {
		if let Some(ref callback) = self.file_ready {
			callback(file, is_batch);
		}
	}

	fn on_file_failed(&self, file: &RemoteFile, failure: &TransferFailure) {
		if let Some(ref callback) = self.file_failed {
			callback(file, failure);
		}
	}

	fn on_batch_complete(&self, summary: &BatchSummary) {
		if let Some(ref callback) = self.batch {
			callback(summary);
		}
	}

	fn on_device_event(&self, event: &DeviceEvent) {
		if let Some(ref callback) = self.device_event {
			callback(event);
		}
	}

	fn on_error(&self, error: &SyncError) {
		if let Some(ref callback) = self.error {
			callback(error);
		}
	}
}


// vim: ts=4
