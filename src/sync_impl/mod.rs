//! Sync orchestrator
//!
//! Drives one device pairing through connect, status query, listing and a
//! strictly sequential download batch. The device serves a single command
//! channel, so every phase is awaited before the next one starts.
//!
//! ```text
//! idle -> searching -> connected -> syncing -> (disconnected) -> idle
//! ```

pub mod state;
pub mod timer;

pub use self::state::{SessionSnapshot, SyncSession};
pub use self::timer::ElapsedTimer;

use chrono::{DateTime, Local, TimeZone};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::audio;
use crate::callbacks::{ProgressStats, SyncCallbacks};
use crate::config::Config;
use crate::error::SyncError;
use crate::protocol::{
	ConnectionState, DeviceClient, DeviceEvent, DeviceLink, DeviceStatus, FileId, LinkError,
	RemoteFile, Request,
};
use crate::transfer::{list_files, Download, TransferEvent, TransferProgress};
use crate::types::{AssembledFile, BatchSummary, FileOutcome, FileResult};
use crate::util::{unix_now, CancelSource, CancelToken};

/// Orchestrates one device session
///
/// The orchestrator is the sole writer of session state; observers read it
/// through [`subscribe`](Self::subscribe) snapshots or the callbacks.
pub struct SyncOrchestrator<L: DeviceLink> {
	client: DeviceClient<L>,
	core: SessionCore,
}

/// Everything except the client, so it can be updated while a download
/// holds the client borrowed
struct SessionCore {
	config: Config,
	callbacks: Box<dyn SyncCallbacks>,
	session: SyncSession,
	events: mpsc::UnboundedReceiver<DeviceEvent>,
	snapshot: Arc<watch::Sender<SessionSnapshot>>,
	cancel: Arc<CancelSource>,
	timer: ElapsedTimer,
	namer: ArtifactNamer,
}

impl<L: DeviceLink> SyncOrchestrator<L> {
	pub fn new(link: L, config: Config, callbacks: Box<dyn SyncCallbacks>) -> Self {
		let (tx, rx) = mpsc::unbounded_channel();
		let client = DeviceClient::new(link)
			.with_events(tx)
			.with_response_timeout(config.response_timeout());
		let (snapshot, _) = watch::channel(SessionSnapshot::default());
		let namer = ArtifactNamer::new(&config.file_prefix);
		Self {
			client,
			core: SessionCore {
				config,
				callbacks,
				session: SyncSession::new(),
				events: rx,
				snapshot: Arc::new(snapshot),
				cancel: Arc::new(CancelSource::new()),
				timer: ElapsedTimer::new(),
				namer,
			},
		}
	}

	pub fn state(&self) -> ConnectionState {
		self.core.session.connection_state
	}

	pub fn status(&self) -> &DeviceStatus {
		&self.core.session.device_status
	}

	pub fn catalog(&self) -> &[RemoteFile] {
		&self.core.session.catalog
	}

	pub fn session_id(&self) -> Option<Uuid> {
		self.core.session.id
	}

	pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
		self.core.snapshot.subscribe()
	}

	/// Handle that closes the session from another task
	///
	/// Cancelling during `open` abandons the phase waiting on the device.
	/// During a batch it stops the download in flight and skips the rest.
	/// Either way the session is torn down.
	pub fn cancel_handle(&self) -> Arc<CancelSource> {
		self.core.cancel.clone()
	}

	/// Whether the per-file elapsed counter is ticking
	pub fn is_timing(&self) -> bool {
		self.core.timer.is_running()
	}

	pub fn client(&self) -> &DeviceClient<L> {
		&self.client
	}

	pub fn link(&self) -> &L {
		self.client.link()
	}

	pub fn link_mut(&mut self) -> &mut L {
		self.client.link_mut()
	}

	// ========================================================================
	// CONNECT, STATUS, CATALOG
	// ========================================================================

	/// Connect, sync the device clock, query status and load the catalog
	///
	/// A cancelled device selection returns [`SyncError::Cancelled`] and
	/// leaves the session idle without reporting an error. So does firing
	/// the [`cancel_handle`](Self::cancel_handle) while any phase is waiting
	/// on the device.
	pub async fn open(&mut self) -> Result<(), SyncError> {
		if self.core.session.connection_state != ConnectionState::Idle {
			return Err(SyncError::Busy);
		}
		self.core.cancel.reset();
		let id = self.core.session.begin();
		let result = self.open_inner().instrument(info_span!("session", id = %id)).await;
		if let Err(e) = &result {
			self.abort(e).await;
		}
		result
	}

	async fn open_inner(&mut self) -> Result<(), SyncError> {
		let cancel = self.core.cancel.token();
		self.core.set_state(ConnectionState::Searching);
		match cancellable(&cancel, self.client.connect()).await {
			Ok(()) => {}
			Err(Phase::Cancelled) | Err(Phase::Failed(LinkError::PairingCancelled)) => {
				return Err(SyncError::Cancelled)
			}
			Err(Phase::Failed(e)) => return Err(SyncError::Connect(e)),
		}
		self.core.set_state(ConnectionState::Connected);
		info!("Connected to {}", self.client.link().name());

		if self.core.config.sync_clock_on_connect {
			cancellable(&cancel, self.client.send(&Request::SyncTime(unix_now()))).await?;
		}
		cancellable(&cancel, self.query_status()).await?;

		let catalog = cancellable(&cancel, list_files(&mut self.client)).await?;
		self.core.drain_events();
		self.core.session.catalog = catalog;
		self.core.callbacks.on_catalog(&self.core.session.catalog);
		self.core.publish();
		Ok(())
	}

	/// Battery, version, capacity, in that order
	///
	/// A value the device does not deliver stays unknown; only a lost
	/// link fails the query.
	async fn query_status(&mut self) -> Result<(), SyncError> {
		for request in vec![Request::GetBattery, Request::GetVersion, Request::GetCapacity] {
			let command = request.command();
			match self.client.request(request).await {
				Ok(response) => {
					if let Some(update) = response.status_update() {
						self.core.session.apply_status(update);
					}
				}
				Err(e) if e.is_disconnect() => return Err(e.into()),
				Err(e) => warn!("{} failed, leaving it unknown: {}", command, e),
			}
		}
		self.core.drain_events();
		let status = &self.core.session.device_status;
		debug!("device status: {:?}", status);
		self.core.callbacks.on_status(status);
		self.core.publish();
		Ok(())
	}

	/// Re-query device status on an open session
	pub async fn refresh_status(&mut self) -> Result<(), SyncError> {
		if !self.core.session.is_open() {
			return Err(SyncError::NotConnected);
		}
		let cancel = self.core.cancel.token();
		let result = cancellable(&cancel, self.query_status()).await.map_err(SyncError::from);
		if let Err(e) = &result {
			self.abort(e).await;
		}
		result
	}

	// ========================================================================
	// SELECTION
	// ========================================================================

	/// Replace the selection; unknown ids are rejected as a whole
	pub fn select<I>(&mut self, ids: I) -> Result<(), SyncError>
	where
		I: IntoIterator<Item = FileId>,
	{
		if !self.core.session.is_open() {
			return Err(SyncError::NotConnected);
		}
		self.core.session.select(ids)?;
		self.core.publish();
		Ok(())
	}

	pub fn select_all(&mut self) -> Result<(), SyncError> {
		if !self.core.session.is_open() {
			return Err(SyncError::NotConnected);
		}
		self.core.session.select_all();
		self.core.publish();
		Ok(())
	}

	// ========================================================================
	// BATCH
	// ========================================================================

	/// Download the selection one file at a time, then close the session
	///
	/// Per-file failures, a lost link included, are reported through
	/// `on_file_failed` and the batch moves on. Only a cancel skips the
	/// rest. The batch hook fires exactly once, after teardown.
	pub async fn sync_selected(&mut self) -> Result<BatchSummary, SyncError> {
		match self.core.session.connection_state {
			ConnectionState::Connected => {}
			ConnectionState::Syncing => return Err(SyncError::Busy),
			_ => return Err(SyncError::NotConnected),
		}
		let id = self.core.session.id.unwrap_or_else(Uuid::nil);
		let summary = self.run_batch(id).instrument(info_span!("session", id = %id)).await;
		self.core.callbacks.on_batch_complete(&summary);
		Ok(summary)
	}

	async fn run_batch(&mut self, id: Uuid) -> BatchSummary {
		let queue = self.core.session.selected_files();
		let total = queue.len();
		let is_batch = total > 1;
		let started = Instant::now();
		let mut summary = BatchSummary::new(id);

		self.core.set_state(ConnectionState::Syncing);
		info!("Syncing {} files", total);

		let mut link_lost = false;
		if self.core.config.high_speed_transfers && total > 0 {
			if let Err(e) = self.client.send(&Request::EnableHighSpeed(true)).await {
				warn!("Could not enable high-speed mode: {}", e);
				link_lost = e.is_disconnect();
			}
		}

		for (index, file) in queue.into_iter().enumerate() {
			if self.core.cancel.is_cancelled() {
				summary.outcomes.push(FileOutcome { file, result: FileResult::Skipped });
				continue;
			}
			let result = self.download(&file, index + 1, total, is_batch).await;
			if let FileResult::Failed(failure) = &result {
				link_lost |= failure.is_session_fatal();
			}
			summary.outcomes.push(FileOutcome { file, result });
		}

		self.core.timer.stop();
		summary.aborted = self.core.cancel.is_cancelled();
		summary.elapsed = started.elapsed();
		info!(
			"Batch finished: {} of {} files, {} failed{}",
			summary.completed(),
			total,
			summary.failed(),
			if summary.aborted { ", aborted" } else { "" }
		);

		if link_lost {
			self.core.set_state(ConnectionState::Disconnected);
		}
		if !summary.aborted {
			let cancel = self.core.cancel.token();
			tokio::select! {
				biased;
				_ = cancel.cancelled() => debug!("completion pause cut short"),
				_ = tokio::time::sleep(self.core.config.completion_pause()) => {}
			}
		}
		self.close().await;
		summary
	}

	async fn download(&mut self, file: &RemoteFile, index: usize, total: usize, is_batch: bool) -> FileResult {
		let core = &mut self.core;
		core.session.current = Some(file.clone());
		core.session.progress =
			Some(TransferProgress { received: 0, expected: file.size_bytes, percent: 0 });
		core.timer.start(core.config.tick_interval(), core.snapshot.clone());
		core.publish();
		info!("[{}/{}] Downloading {} ({} bytes)", index, total, file.display_name, file.size_bytes);

		let mut download = Download::new(&mut self.client, file.clone(), core.cancel.token());
		let mut result = FileResult::Cancelled;
		while let Some(event) = download.next().await {
			core.drain_events();
			match event {
				TransferEvent::Started { expected_size } => {
					if expected_size != file.size_bytes {
						debug!("device sends {} bytes, catalog listed {}", expected_size, file.size_bytes);
					}
					core.report_progress(file, index, total, download.session().progress());
				}
				TransferEvent::Progress(progress) => core.report_progress(file, index, total, progress),
				TransferEvent::Completed(done) => {
					let bytes = audio::convert_to_container(&done.chunks);
					let name = core.namer.next_name(Local::now());
					let len = bytes.len();
					core.callbacks.on_file_ready(
						AssembledFile { name: name.clone(), bytes, source: done.file },
						is_batch,
					);
					result = FileResult::Completed { name, bytes: len };
				}
				TransferEvent::Failed(failure) => {
					core.callbacks.on_file_failed(file, &failure);
					result = FileResult::Failed(failure);
				}
				TransferEvent::Cancelled => result = FileResult::Cancelled,
			}
		}

		core.session.current = None;
		core.publish();
		result
	}

	// ========================================================================
	// TEARDOWN
	// ========================================================================

	/// Stop the timer, disconnect and reset every session field
	///
	/// Safe to call at any point and any number of times.
	pub async fn close(&mut self) {
		self.core.timer.stop();
		let previous = self.core.session.connection_state;
		if previous != ConnectionState::Idle || self.core.session.id.is_some() {
			if let Err(e) = self.client.disconnect().await {
				debug!("disconnect: {}", e);
			}
		}
		self.core.drain_events();
		self.core.session.reset();
		self.core.cancel.reset();
		if previous != ConnectionState::Idle {
			info!("Session closed");
			self.core.callbacks.on_state_change(ConnectionState::Idle);
		}
		self.core.publish();
	}

	async fn abort(&mut self, error: &SyncError) {
		if let SyncError::Protocol(e) = error {
			if e.is_disconnect() {
				self.core.set_state(ConnectionState::Disconnected);
			}
		}
		self.close().await;
		if error.is_cancellation() {
			info!("Device selection cancelled");
		} else {
			warn!("Session failed: {}", error);
			self.core.callbacks.on_error(error);
		}
	}
}

impl SessionCore {
	fn set_state(&mut self, state: ConnectionState) {
		if self.session.connection_state == state {
			return;
		}
		debug!("state {:?} -> {:?}", self.session.connection_state, state);
		self.session.connection_state = state;
		self.callbacks.on_state_change(state);
		self.publish();
	}

	fn publish(&self) {
		self.snapshot.send_replace(self.session.snapshot(self.timer.elapsed_secs()));
	}

	fn report_progress(&mut self, file: &RemoteFile, index: usize, total: usize, progress: TransferProgress) {
		self.session.progress = Some(progress);
		let elapsed = self.timer.elapsed();
		self.snapshot.send_modify(|s| {
			s.progress = Some(progress);
			s.elapsed_secs = elapsed.as_secs();
		});
		self.callbacks.on_progress(ProgressStats {
			file_index: index,
			files_total: total,
			file_name: file.display_name.clone(),
			received: progress.received,
			expected: progress.expected,
			percent: progress.percent,
			elapsed,
		});
	}

	/// Deliver queued out-of-band events to the callbacks
	fn drain_events(&mut self) {
		while let Ok(event) = self.events.try_recv() {
			match &event {
				DeviceEvent::StatusPush(update) => {
					self.session.apply_status(*update);
					self.callbacks.on_status(&self.session.device_status);
					self.publish();
				}
				DeviceEvent::Button(button) => info!("Button: {:?}", button),
				DeviceEvent::Connectivity(state) => debug!("transport reports {:?}", state),
				DeviceEvent::AudioStream { .. } => {}
			}
			self.callbacks.on_device_event(&event);
		}
	}
}

// ============================================================================
// CANCELLATION
// ============================================================================

/// How a cancellable phase ended early
enum Phase<E> {
	Cancelled,
	Failed(E),
}

impl<E> From<Phase<E>> for SyncError
where
	SyncError: From<E>,
{
	fn from(phase: Phase<E>) -> Self {
		match phase {
			Phase::Cancelled => SyncError::Cancelled,
			Phase::Failed(e) => e.into(),
		}
	}
}

/// Run one device exchange, giving up as soon as `cancel` fires
///
/// The exchange future is dropped on cancel; the teardown that follows
/// disconnects the link, so nothing half-read survives.
async fn cancellable<T, E, F>(cancel: &CancelToken, phase: F) -> Result<T, Phase<E>>
where
	F: Future<Output = Result<T, E>>,
{
	tokio::select! {
		biased;
		_ = cancel.cancelled() => Err(Phase::Cancelled),
		result = phase => result.map_err(Phase::Failed),
	}
}

// ============================================================================
// ARTIFACT NAMING
// ============================================================================

/// Generates `<prefix>-<YYYYMMDD-HHMMSS-mmm>.wav`
///
/// Two files finished within the same millisecond get a numeric suffix.
struct ArtifactNamer {
	prefix: String,
	last_stamp: String,
	repeats: u32,
}

impl ArtifactNamer {
	fn new(prefix: &str) -> Self {
		Self { prefix: prefix.to_string(), last_stamp: String::new(), repeats: 0 }
	}

	fn next_name<Tz: TimeZone>(&mut self, now: DateTime<Tz>) -> String
	where
		Tz::Offset: fmt::Display,
	{
		let stamp = now.format("%Y%m%d-%H%M%S-%3f").to_string();
		if stamp == self.last_stamp {
			self.repeats += 1;
			return format!("{}-{}-{}.wav", self.prefix, stamp, self.repeats);
		}
		self.last_stamp = stamp;
		self.repeats = 0;
		format!("{}-{}.wav", self.prefix, self.last_stamp)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::{Timelike, Utc};

	#[test]
	fn test_artifact_names() {
		let mut namer = ArtifactNamer::new("recording");
		let t = Utc
			.with_ymd_and_hms(2024, 3, 9, 14, 5, 7)
			.unwrap()
			.with_nanosecond(42_000_000)
			.unwrap();
		assert_eq!(namer.next_name(t), "recording-20240309-140507-042.wav");
		assert_eq!(namer.next_name(t), "recording-20240309-140507-042-1.wav");
		assert_eq!(namer.next_name(t), "recording-20240309-140507-042-2.wav");
		let later = t.with_nanosecond(43_000_000).unwrap();
		assert_eq!(namer.next_name(later), "recording-20240309-140507-043.wav");
	}
}

// vim: ts=4
