//! Single-file transfer session
//!
//! Owns the received chunks for one download. Chunks are appended in
//! arrival order; the transport guarantees send order, so there is no
//! reordering or gap filling here.

use bytes::Bytes;
use tracing::{debug, warn};

use super::TransferState;
use crate::error::TransferFailure;
use crate::protocol::{RemoteFile, Request, Response};

/// Progress after a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
	pub received: u64,
	pub expected: u64,
	pub percent: u8,
}

/// Verified payload of a finished transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedTransfer {
	pub file: RemoteFile,
	pub chunks: Vec<Bytes>,
}

impl CompletedTransfer {
	pub fn byte_len(&self) -> usize {
		self.chunks.iter().map(|c| c.len()).sum()
	}
}

/// Events produced while a transfer advances
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEvent {
	/// Device acknowledged the request with the expected size
	Started { expected_size: u64 },
	Progress(TransferProgress),
	Completed(CompletedTransfer),
	Failed(TransferFailure),
	Cancelled,
}

impl TransferEvent {
	pub fn is_terminal(&self) -> bool {
		matches!(
			self,
			TransferEvent::Completed(_) | TransferEvent::Failed(_) | TransferEvent::Cancelled
		)
	}
}

/// State for one in-flight download
#[derive(Debug)]
pub struct TransferSession {
	target: RemoteFile,
	chunks: Vec<Bytes>,
	received: u64,
	expected_size: Option<u64>,
	state: TransferState,
}

impl TransferSession {
	/// New session in the Requested state
	pub fn new(target: RemoteFile) -> Self {
		Self {
			target,
			chunks: Vec::new(),
			received: 0,
			expected_size: None,
			state: TransferState::Requested,
		}
	}

	/// Request that starts this transfer; carries the raw name verbatim
	pub fn request(&self) -> Request {
		Request::RequestImportFile(self.target.raw_name.clone())
	}

	pub fn target(&self) -> &RemoteFile {
		&self.target
	}

	pub fn state(&self) -> TransferState {
		self.state
	}

	pub fn received(&self) -> u64 {
		self.received
	}

	pub fn expected_size(&self) -> Option<u64> {
		self.expected_size
	}

	pub fn progress(&self) -> TransferProgress {
		let expected = self.expected_size.unwrap_or(0);
		TransferProgress { received: self.received, expected, percent: percent(self.received, expected) }
	}

	/// Feed one response; `None` when it does not advance this transfer
	pub fn apply(&mut self, response: &Response) -> Option<TransferEvent> {
		match (self.state, response) {
			(TransferState::Requested, Response::ImportStarted { size }) => {
				debug!("import of {} started: {} bytes", self.target.display_name, size);
				self.expected_size = Some(*size);
				self.state = TransferState::Importing;
				Some(TransferEvent::Started { expected_size: *size })
			}
			(TransferState::Importing, Response::FileData(chunk)) => {
				self.received += chunk.len() as u64;
				self.chunks.push(chunk.clone());
				Some(TransferEvent::Progress(self.progress()))
			}
			(TransferState::Importing, Response::ImportComplete) => Some(self.complete()),
			(TransferState::Requested, Response::ImportStopped)
			| (TransferState::Importing, Response::ImportStopped) => {
				debug!("device stopped import of {}", self.target.display_name);
				Some(self.cancel())
			}
			(TransferState::Importing, Response::ImportStarted { size }) => {
				warn!("Duplicate import start ({} bytes) for {}", size, self.target.display_name);
				None
			}
			_ => None,
		}
	}

	/// Cancel from the host side, discarding partial bytes
	pub fn cancel(&mut self) -> TransferEvent {
		if self.state.is_terminal() {
			return self.terminal_event();
		}
		self.discard();
		self.state = TransferState::Cancelled;
		TransferEvent::Cancelled
	}

	/// Fail the transfer, discarding partial bytes
	pub fn fail(&mut self, failure: TransferFailure) -> TransferEvent {
		if self.state.is_terminal() {
			return self.terminal_event();
		}
		self.discard();
		self.state = TransferState::Failed;
		TransferEvent::Failed(failure)
	}

	fn complete(&mut self) -> TransferEvent {
		let expected = self.expected_size.unwrap_or(0);
		if self.received != expected {
			return self.fail(TransferFailure::SizeMismatch { expected, received: self.received });
		}
		self.state = TransferState::Completed;
		let chunks = std::mem::take(&mut self.chunks);
		TransferEvent::Completed(CompletedTransfer { file: self.target.clone(), chunks })
	}

	fn terminal_event(&self) -> TransferEvent {
		match self.state {
			TransferState::Cancelled => TransferEvent::Cancelled,
			_ => TransferEvent::Failed(TransferFailure::Protocol {
				message: "transfer already finished".to_string(),
			}),
		}
	}

	fn discard(&mut self) {
		self.chunks.clear();
		self.received = 0;
	}
}

fn percent(received: u64, expected: u64) -> u8 {
	if expected == 0 {
		return 100;
	}
	(received.saturating_mul(100) / expected).min(100) as u8
}

#[cfg(test)]
mod tests {
	use super::*;

	fn target(size: u64) -> RemoteFile {
		RemoteFile::new(b"REC0001".to_vec(), size, 1, 1_700_000_000)
	}

	fn data(len: usize) -> Response {
		Response::FileData(Bytes::from(vec![0xAB; len]))
	}

	#[test]
	fn test_exact_size_completes() {
		let mut session = TransferSession::new(target(300));
		assert_eq!(session.request(), Request::RequestImportFile(b"REC0001".to_vec()));
		assert_eq!(
			session.apply(&Response::ImportStarted { size: 300 }),
			Some(TransferEvent::Started { expected_size: 300 })
		);
		let ev = session.apply(&data(100)).unwrap();
		assert_eq!(
			ev,
			TransferEvent::Progress(TransferProgress { received: 100, expected: 300, percent: 33 })
		);
		session.apply(&data(200));
		match session.apply(&Response::ImportComplete) {
			Some(TransferEvent::Completed(done)) => {
				assert_eq!(done.byte_len(), 300);
				assert_eq!(done.chunks.len(), 2);
			}
			other => panic!("unexpected {:?}", other),
		}
		assert_eq!(session.state(), TransferState::Completed);
	}

	#[test]
	fn test_shortfall_fails_despite_completion_signal() {
		let mut session = TransferSession::new(target(300));
		session.apply(&Response::ImportStarted { size: 300 });
		session.apply(&data(299));
		assert_eq!(
			session.apply(&Response::ImportComplete),
			Some(TransferEvent::Failed(TransferFailure::SizeMismatch { expected: 300, received: 299 }))
		);
		assert_eq!(session.state(), TransferState::Failed);
	}

	#[test]
	fn test_overrun_fails() {
		let mut session = TransferSession::new(target(10));
		session.apply(&Response::ImportStarted { size: 10 });
		session.apply(&data(11));
		assert!(matches!(
			session.apply(&Response::ImportComplete),
			Some(TransferEvent::Failed(TransferFailure::SizeMismatch { .. }))
		));
	}

	#[test]
	fn test_zero_length_file() {
		let mut session = TransferSession::new(target(0));
		session.apply(&Response::ImportStarted { size: 0 });
		assert_eq!(session.progress().percent, 100);
		assert!(matches!(session.apply(&Response::ImportComplete), Some(TransferEvent::Completed(_))));
	}

	#[test]
	fn test_device_stop_cancels_and_discards() {
		let mut session = TransferSession::new(target(100));
		session.apply(&Response::ImportStarted { size: 100 });
		session.apply(&data(50));
		assert_eq!(session.apply(&Response::ImportStopped), Some(TransferEvent::Cancelled));
		assert_eq!(session.received(), 0);
		assert_eq!(session.state(), TransferState::Cancelled);
		assert_eq!(session.apply(&data(50)), None);
	}

	#[test]
	fn test_data_before_start_is_ignored() {
		let mut session = TransferSession::new(target(100));
		assert_eq!(session.apply(&data(10)), None);
		assert_eq!(session.apply(&Response::ImportComplete), None);
		assert_eq!(session.state(), TransferState::Requested);
	}

	#[test]
	fn test_fail_is_sticky() {
		let mut session = TransferSession::new(target(100));
		session.apply(&Response::ImportStarted { size: 100 });
		assert_eq!(
			session.fail(TransferFailure::Disconnected),
			TransferEvent::Failed(TransferFailure::Disconnected)
		);
		assert!(matches!(session.cancel(), TransferEvent::Failed(TransferFailure::Protocol { .. })));
		assert_eq!(session.state(), TransferState::Failed);
	}

	#[test]
	fn test_percent_rounds_down_and_clamps() {
		assert_eq!(percent(1, 3), 33);
		assert_eq!(percent(3, 3), 100);
		assert_eq!(percent(5, 3), 100);
	}
}

// vim: ts=4
