//! Error types for recsync operations

use std::error::Error;
use std::fmt;
use std::io;

use serde::Serialize;

use crate::protocol::{FileId, LinkError, ProtocolError};

/// Main error type for sync sessions
#[derive(Debug)]
pub enum SyncError {
	/// User backed out of device selection or closed the session
	Cancelled,

	/// Connect attempt failed
	Connect(LinkError),

	/// Session-level protocol failure (status query, listing)
	Protocol(ProtocolError),

	/// Operation needs a connected session
	NotConnected,

	/// A batch is already running on this session
	Busy,

	/// Selected file is not in the catalog
	UnknownFile(FileId),

	/// Invalid configuration
	InvalidConfig { message: String },

	/// I/O error
	Io(io::Error),

	/// Generic error message
	Other { message: String },
}

impl SyncError {
	/// Cancellation closes the session silently
	pub fn is_cancellation(&self) -> bool {
		matches!(self, SyncError::Cancelled | SyncError::Connect(LinkError::PairingCancelled))
	}

	/// Short message suitable for showing to a user
	pub fn user_message(&self) -> String {
		match self {
			SyncError::Cancelled | SyncError::Connect(LinkError::PairingCancelled) => {
				"Sync cancelled.".to_string()
			}
			SyncError::Connect(_) => "Could not connect to the recorder.".to_string(),
			SyncError::Protocol(e) if e.is_disconnect() => "The recorder disconnected.".to_string(),
			SyncError::Protocol(ProtocolError::Timeout) => {
				"The recorder stopped responding.".to_string()
			}
			SyncError::Protocol(_) => "Could not read from the recorder.".to_string(),
			SyncError::NotConnected => "The recorder is not connected.".to_string(),
			SyncError::Busy => "A sync is already in progress.".to_string(),
			SyncError::UnknownFile(_) => "That recording is no longer on the device.".to_string(),
			SyncError::InvalidConfig { .. } => "The sync configuration is invalid.".to_string(),
			SyncError::Io(_) => "Could not save the recording.".to_string(),
			SyncError::Other { message } => message.clone(),
		}
	}
}

impl fmt::Display for SyncError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncError::Cancelled => write!(f, "Operation cancelled"),
			SyncError::Connect(e) => write!(f, "Connect failed: {}", e),
			SyncError::Protocol(e) => write!(f, "Protocol error: {}", e),
			SyncError::NotConnected => write!(f, "Session not connected"),
			SyncError::Busy => write!(f, "Sync already in progress"),
			SyncError::UnknownFile(id) => write!(f, "Unknown file: {}", id),
			SyncError::InvalidConfig { message } => {
				write!(f, "Invalid configuration: {}", message)
			}
			SyncError::Io(e) => write!(f, "I/O error: {}", e),
			SyncError::Other { message } => write!(f, "{}", message),
		}
	}
}

impl Error for SyncError {}

impl From<io::Error> for SyncError {
	fn from(e: io::Error) -> Self {
		SyncError::Io(e)
	}
}

impl From<ProtocolError> for SyncError {
	fn from(e: ProtocolError) -> Self {
		SyncError::Protocol(e)
	}
}

impl From<String> for SyncError {
	fn from(e: String) -> Self {
		SyncError::Other { message: e }
	}
}

/// Why a single file transfer ended without a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TransferFailure {
	/// Device signalled completion with the wrong byte count
	SizeMismatch { expected: u64, received: u64 },

	/// Link dropped mid-transfer
	Disconnected,

	/// Device stopped responding within the watchdog period
	Timeout,

	/// Frame or command level failure
	Protocol { message: String },
}

impl TransferFailure {
	/// Short message suitable for showing to a user
	pub fn user_message(&self) -> &'static str {
		match self {
			TransferFailure::SizeMismatch { .. } => "The recording arrived incomplete.",
			TransferFailure::Disconnected => "The recorder disconnected during the transfer.",
			TransferFailure::Timeout => "The recorder stopped responding during the transfer.",
			TransferFailure::Protocol { .. } => "The transfer failed.",
		}
	}

	/// Failures that end the whole session rather than one file
	pub fn is_session_fatal(&self) -> bool {
		matches!(self, TransferFailure::Disconnected)
	}
}

impl fmt::Display for TransferFailure {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			TransferFailure::SizeMismatch { expected, received } => {
				write!(f, "Size mismatch: expected {} bytes, received {}", expected, received)
			}
			TransferFailure::Disconnected => write!(f, "Device disconnected"),
			TransferFailure::Timeout => write!(f, "Device timed out"),
			TransferFailure::Protocol { message } => write!(f, "Protocol error: {}", message),
		}
	}
}

impl Error for TransferFailure {}

impl From<ProtocolError> for TransferFailure {
	fn from(e: ProtocolError) -> Self {
		match e {
			ProtocolError::Link(LinkError::Disconnected) => TransferFailure::Disconnected,
			ProtocolError::Link(LinkError::NotConnected) => TransferFailure::Disconnected,
			ProtocolError::Timeout => TransferFailure::Timeout,
			other => TransferFailure::Protocol { message: other.to_string() },
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_cancellation_detection() {
		assert!(SyncError::Cancelled.is_cancellation());
		assert!(SyncError::Connect(LinkError::PairingCancelled).is_cancellation());
		assert!(!SyncError::Connect(LinkError::ConnectFailed { message: "x".into() })
			.is_cancellation());
	}

	#[test]
	fn test_user_messages_hide_protocol_details() {
		let err = SyncError::Protocol(ProtocolError::Unrecognized { data_type: 3, command: Some(9) });
		assert!(!err.user_message().contains("0x"));
		let err = SyncError::Protocol(ProtocolError::Link(LinkError::Disconnected));
		assert_eq!(err.user_message(), "The recorder disconnected.");
	}

	#[test]
	fn test_transfer_failure_from_protocol() {
		assert_eq!(
			TransferFailure::from(ProtocolError::Link(LinkError::Disconnected)),
			TransferFailure::Disconnected
		);
		assert_eq!(TransferFailure::from(ProtocolError::Timeout), TransferFailure::Timeout);
		assert!(TransferFailure::Disconnected.is_session_fatal());
		assert!(!TransferFailure::Timeout.is_session_fatal());
	}
}

// vim: ts=4
