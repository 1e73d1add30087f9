//! Session state owned by the orchestrator

use std::collections::BTreeSet;
use uuid::Uuid;

use crate::error::SyncError;
use crate::protocol::{ConnectionState, DeviceStatus, FileId, RemoteFile, StatusUpdate};
use crate::transfer::TransferProgress;

/// Top-level connect/list/download state for one device pairing
#[derive(Debug, Default)]
pub struct SyncSession {
	/// Set when a connection is established; tags log output
	pub id: Option<Uuid>,
	pub connection_state: ConnectionState,
	pub device_status: DeviceStatus,
	/// Newest first
	pub catalog: Vec<RemoteFile>,
	pub selection: BTreeSet<FileId>,
	pub current: Option<RemoteFile>,
	pub progress: Option<TransferProgress>,
}

impl SyncSession {
	pub fn new() -> Self {
		Self::default()
	}

	/// Start a fresh session id
	pub fn begin(&mut self) -> Uuid {
		let id = Uuid::new_v4();
		self.id = Some(id);
		id
	}

	/// Clear every field back to Idle
	pub fn reset(&mut self) {
		*self = Self::default();
	}

	/// Connected or syncing
	pub fn is_open(&self) -> bool {
		matches!(self.connection_state, ConnectionState::Connected | ConnectionState::Syncing)
	}

	pub fn apply_status(&mut self, update: StatusUpdate) {
		match update {
			StatusUpdate::Battery(pct) => self.device_status.battery_percent = Some(pct),
			StatusUpdate::Capacity(cap) => self.device_status.capacity = Some(cap),
			StatusUpdate::Version(v) => self.device_status.firmware = Some(v),
		}
	}

	/// Replace the selection; every id must be in the catalog
	pub fn select<I>(&mut self, ids: I) -> Result<(), SyncError>
	where
		I: IntoIterator<Item = FileId>,
	{
		let mut selection = BTreeSet::new();
		for id in ids {
			if !self.catalog.iter().any(|f| f.raw_name == id.0) {
				return Err(SyncError::UnknownFile(id));
			}
			selection.insert(id);
		}
		self.selection = selection;
		Ok(())
	}

	pub fn select_all(&mut self) {
		self.selection = self.catalog.iter().map(RemoteFile::id).collect();
	}

	/// Selected files in catalog order
	pub fn selected_files(&self) -> Vec<RemoteFile> {
		self.catalog.iter().filter(|f| self.selection.contains(&f.id())).cloned().collect()
	}

	pub fn snapshot(&self, elapsed_secs: u64) -> SessionSnapshot {
		SessionSnapshot {
			session_id: self.id,
			state: self.connection_state,
			status: self.device_status.clone(),
			catalog: self.catalog.clone(),
			selected: self.selection.len(),
			current_file: self.current.as_ref().map(|f| f.display_name.clone()),
			progress: self.progress,
			elapsed_secs,
		}
	}
}

/// Read-only view of the session for presentation layers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
	pub session_id: Option<Uuid>,
	pub state: ConnectionState,
	pub status: DeviceStatus,
	pub catalog: Vec<RemoteFile>,
	pub selected: usize,
	pub current_file: Option<String>,
	pub progress: Option<TransferProgress>,
	pub elapsed_secs: u64,
}


// vim: ts=4
