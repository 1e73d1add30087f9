//! Protocol error types
//!
//! Link-level failures come from the transport collaborator; protocol
//! failures wrap them and add frame/command level problems.

use std::fmt;

/// Failure reported by the wireless transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
	/// User backed out of device selection
	PairingCancelled,
	/// Connect attempt failed for any other reason
	ConnectFailed { message: String },
	/// Device dropped the connection
	Disconnected,
	/// Outbound write was rejected
	WriteFailed { message: String },
	/// Operation attempted on a link that is not connected
	NotConnected,
}

impl fmt::Display for LinkError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			LinkError::PairingCancelled => write!(f, "Device selection cancelled"),
			LinkError::ConnectFailed { message } => write!(f, "Connect failed: {}", message),
			LinkError::Disconnected => write!(f, "Device disconnected"),
			LinkError::WriteFailed { message } => write!(f, "Write failed: {}", message),
			LinkError::NotConnected => write!(f, "Device not connected"),
		}
	}
}

impl std::error::Error for LinkError {}

/// Protocol error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
	/// Transport failure
	Link(LinkError),
	/// Response body too short or otherwise undecodable
	MalformedBody { what: &'static str, len: usize },
	/// (dataType, command) pair outside the known enumerations
	Unrecognized { data_type: u8, command: Option<u8> },
	/// Device stopped answering within the watchdog period
	Timeout,
	/// Generic protocol violation
	ProtocolViolation(String),
}

impl ProtocolError {
	/// The link is gone; nothing further can be exchanged
	pub fn is_disconnect(&self) -> bool {
		matches!(self, ProtocolError::Link(LinkError::Disconnected | LinkError::NotConnected))
	}
}

impl fmt::Display for ProtocolError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ProtocolError::Link(e) => write!(f, "Link error: {}", e),
			ProtocolError::MalformedBody { what, len } => {
				write!(f, "Malformed {} body ({} bytes)", what, len)
			}
			ProtocolError::Unrecognized { data_type, command } => match command {
				Some(c) => write!(f, "Unrecognized frame type {:#04x}/{:#04x}", data_type, c),
				None => write!(f, "Unrecognized frame type {:#04x}", data_type),
			},
			ProtocolError::Timeout => write!(f, "Timed out waiting for device response"),
			ProtocolError::ProtocolViolation(msg) => write!(f, "Protocol violation: {}", msg),
		}
	}
}

impl std::error::Error for ProtocolError {}

impl From<LinkError> for ProtocolError {
	fn from(e: LinkError) -> Self {
		ProtocolError::Link(e)
	}
}

impl From<&str> for ProtocolError {
	fn from(e: &str) -> Self {
		ProtocolError::ProtocolViolation(e.to_string())
	}
}

// vim: ts=4
