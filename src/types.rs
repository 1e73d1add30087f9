//! Session-level result types handed to callers

use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

use crate::error::TransferFailure;
use crate::protocol::RemoteFile;

/// A finished recording, wrapped in its audio container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledFile {
	/// Generated name, `<prefix>-<YYYYMMDD-HHMMSS-mmm>.wav`
	pub name: String,
	pub bytes: Vec<u8>,
	/// Catalog entry the file was downloaded from
	pub source: RemoteFile,
}

/// How one selected file ended
#[derive(Clone, PartialEq, Debug)]
pub enum FileResult {
	Completed { name: String, bytes: usize },
	Failed(TransferFailure),
	/// Stopped by the device or the host
	Cancelled,
	/// Never attempted because the batch was cancelled
	Skipped,
}

#[derive(Clone, PartialEq, Debug)]
pub struct FileOutcome {
	pub file: RemoteFile,
	pub result: FileResult,
}

impl Serialize for FileOutcome {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		let mut state = serializer.serialize_struct("FileOutcome", 4)?;
		state.serialize_field("file", &self.file.display_name)?;
		match &self.result {
			FileResult::Completed { name, bytes } => {
				state.serialize_field("status", "completed")?;
				state.serialize_field("name", name)?;
				state.serialize_field("bytes", bytes)?;
			}
			FileResult::Failed(failure) => {
				state.serialize_field("status", "failed")?;
				state.serialize_field("reason", failure.user_message())?;
				state.serialize_field("failure", failure)?;
			}
			FileResult::Cancelled => state.serialize_field("status", "cancelled")?,
			FileResult::Skipped => state.serialize_field("status", "skipped")?,
		}
		state.end()
	}
}

/// Result of a sync batch; delivered exactly once per batch
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
	pub session_id: Uuid,
	pub outcomes: Vec<FileOutcome>,
	/// Batch stopped early by a cancel
	pub aborted: bool,
	#[serde(serialize_with = "serialize_millis")]
	pub elapsed: Duration,
}

impl BatchSummary {
	pub fn new(session_id: Uuid) -> Self {
		Self { session_id, outcomes: Vec::new(), aborted: false, elapsed: Duration::ZERO }
	}

	pub fn requested(&self) -> usize {
		self.outcomes.len()
	}

	pub fn completed(&self) -> usize {
		self.count(|r| matches!(r, FileResult::Completed { .. }))
	}

	pub fn failed(&self) -> usize {
		self.count(|r| matches!(r, FileResult::Failed(_)))
	}

	pub fn skipped(&self) -> usize {
		self.count(|r| matches!(r, FileResult::Skipped | FileResult::Cancelled))
	}

	/// Every selected file arrived
	pub fn is_complete(&self) -> bool {
		!self.aborted && self.completed() == self.requested()
	}

	fn count(&self, pred: impl Fn(&FileResult) -> bool) -> usize {
		self.outcomes.iter().filter(|o| pred(&o.result)).count()
	}
}

fn serialize_millis<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
	serializer.serialize_u64(d.as_millis().min(u64::MAX as u128) as u64)
}


// vim: ts=4
