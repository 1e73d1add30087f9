//! Protocol data types
//!
//! The closed enumerations multiplexed over the frame payload, plus the
//! catalog and status values decoded from device responses.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// DATA TYPES AND COMMANDS
// ============================================================================

/// Top-level category carried in the first payload byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DataType {
	Control = 0x01,
	AudioStream = 0x02,
	FileTransfer = 0x03,
	ButtonCommand = 0x04,
}

impl DataType {
	pub fn from_u8(b: u8) -> Option<Self> {
		match b {
			0x01 => Some(Self::Control),
			0x02 => Some(Self::AudioStream),
			0x03 => Some(Self::FileTransfer),
			0x04 => Some(Self::ButtonCommand),
			_ => None,
		}
	}
}

/// Opcode that is never written to the wire
///
/// A Control frame carrying only its DataType byte is a battery query.
pub const IMPLICIT_OPCODE: u8 = 0x00;

/// Device control opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ControlCommand {
	GetBattery = 0x00,
	RetBattery = 0x01,
	SyncTime = 0x02,
	GetCapacity = 0x03,
	RetCapacity = 0x04,
	GetVersion = 0x05,
	RetVersion = 0x06,
	EnableHighSpeed = 0x07,
}

impl ControlCommand {
	pub fn from_u8(b: u8) -> Option<Self> {
		match b {
			0x00 => Some(Self::GetBattery),
			0x01 => Some(Self::RetBattery),
			0x02 => Some(Self::SyncTime),
			0x03 => Some(Self::GetCapacity),
			0x04 => Some(Self::RetCapacity),
			0x05 => Some(Self::GetVersion),
			0x06 => Some(Self::RetVersion),
			0x07 => Some(Self::EnableHighSpeed),
			_ => None,
		}
	}
}

/// Live audio streaming opcodes (device initiated)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AudioStreamCommand {
	StreamStart = 0x01,
	StreamData = 0x02,
	StreamStop = 0x03,
}

impl AudioStreamCommand {
	pub fn from_u8(b: u8) -> Option<Self> {
		match b {
			0x01 => Some(Self::StreamStart),
			0x02 => Some(Self::StreamData),
			0x03 => Some(Self::StreamStop),
			_ => None,
		}
	}
}

/// File listing and transfer opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FileCommand {
	GetFileList = 0x01,
	RetFileList = 0x02,
	RequestImportFile = 0x03,
	StartImportFile = 0x04,
	FileData = 0x05,
	ImportComplete = 0x06,
	StopImport = 0x07,
	ListTransferComplete = 0x08,
}

impl FileCommand {
	pub fn from_u8(b: u8) -> Option<Self> {
		match b {
			0x01 => Some(Self::GetFileList),
			0x02 => Some(Self::RetFileList),
			0x03 => Some(Self::RequestImportFile),
			0x04 => Some(Self::StartImportFile),
			0x05 => Some(Self::FileData),
			0x06 => Some(Self::ImportComplete),
			0x07 => Some(Self::StopImport),
			0x08 => Some(Self::ListTransferComplete),
			_ => None,
		}
	}
}

/// Physical button events pushed by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ButtonCommand {
	SinglePress = 0x01,
	DoublePress = 0x02,
	LongPress = 0x03,
}

impl ButtonCommand {
	pub fn from_u8(b: u8) -> Option<Self> {
		match b {
			0x01 => Some(Self::SinglePress),
			0x02 => Some(Self::DoublePress),
			0x03 => Some(Self::LongPress),
			_ => None,
		}
	}
}

/// A fully-qualified opcode: DataType plus the command within it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
	Control(ControlCommand),
	AudioStream(AudioStreamCommand),
	FileTransfer(FileCommand),
	Button(ButtonCommand),
}

impl Command {
	pub fn data_type(&self) -> DataType {
		match self {
			Command::Control(_) => DataType::Control,
			Command::AudioStream(_) => DataType::AudioStream,
			Command::FileTransfer(_) => DataType::FileTransfer,
			Command::Button(_) => DataType::ButtonCommand,
		}
	}

	/// Opcode byte as written on the wire, `None` for the implicit opcode
	pub fn wire_code(&self) -> Option<u8> {
		let code = match self {
			Command::Control(c) => *c as u8,
			Command::AudioStream(c) => *c as u8,
			Command::FileTransfer(c) => *c as u8,
			Command::Button(c) => *c as u8,
		};
		match (self.data_type(), code) {
			(DataType::Control, IMPLICIT_OPCODE) => None,
			_ => Some(code),
		}
	}

	/// Resolve a raw (dataType, command) pair; `None` when unrecognized
	pub fn from_wire(data_type: u8, command: Option<u8>) -> Option<Self> {
		let data_type = DataType::from_u8(data_type)?;
		match (data_type, command) {
			(DataType::Control, None) => Some(Command::Control(ControlCommand::GetBattery)),
			(DataType::Control, Some(IMPLICIT_OPCODE)) => None,
			(DataType::Control, Some(c)) => ControlCommand::from_u8(c).map(Command::Control),
			(DataType::AudioStream, Some(c)) => {
				AudioStreamCommand::from_u8(c).map(Command::AudioStream)
			}
			(DataType::FileTransfer, Some(c)) => FileCommand::from_u8(c).map(Command::FileTransfer),
			(DataType::ButtonCommand, Some(c)) => ButtonCommand::from_u8(c).map(Command::Button),
			(_, None) => None,
		}
	}
}

impl fmt::Display for Command {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Command::Control(c) => write!(f, "Control/{:?}", c),
			Command::AudioStream(c) => write!(f, "AudioStream/{:?}", c),
			Command::FileTransfer(c) => write!(f, "FileTransfer/{:?}", c),
			Command::Button(c) => write!(f, "Button/{:?}", c),
		}
	}
}

// ============================================================================
// REMOTE FILES
// ============================================================================

/// Identifier of a device file: its raw name bytes
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileId(pub Vec<u8>);

impl FileId {
	pub fn as_bytes(&self) -> &[u8] {
		&self.0
	}
}

impl fmt::Display for FileId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", hex::encode(&self.0))
	}
}

/// Catalog entry for a file resident on the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
	/// Device-native identifier, sent back verbatim in transfer requests
	pub raw_name: Vec<u8>,
	pub display_name: String,
	pub size_bytes: u64,
	pub duration_seconds: u32,
	/// Device timestamp, seconds since the unix epoch
	pub created_at: u32,
}

impl RemoteFile {
	pub fn new(raw_name: Vec<u8>, size_bytes: u64, duration_seconds: u32, created_at: u32) -> Self {
		let display_name = display_name_for(&raw_name);
		Self { raw_name, display_name, size_bytes, duration_seconds, created_at }
	}

	pub fn id(&self) -> FileId {
		FileId(self.raw_name.clone())
	}
}

/// Human-readable form of a raw name; never used for protocol purposes
pub fn display_name_for(raw: &[u8]) -> String {
	let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
	let text = String::from_utf8_lossy(&raw[..end]);
	let trimmed = text.trim();
	if trimmed.is_empty() {
		hex::encode(raw)
	} else {
		trimmed.to_string()
	}
}

/// Sort a catalog newest first; ties keep device order
pub fn sort_newest_first(files: &mut [RemoteFile]) {
	files.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

// ============================================================================
// DEVICE STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareVersion {
	pub major: u8,
	pub minor: u8,
	pub patch: u8,
}

impl fmt::Display for FirmwareVersion {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
	}
}

/// Storage usage in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capacity {
	pub used: u64,
	pub total: u64,
}

/// Last known device status; fields stay `None` until reported
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
	pub battery_percent: Option<u8>,
	pub firmware: Option<FirmwareVersion>,
	pub capacity: Option<Capacity>,
}

/// Session connectivity, mirrored from the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionState {
	Idle,
	Searching,
	Connected,
	Syncing,
	Disconnected,
}

impl Default for ConnectionState {
	fn default() -> Self {
		ConnectionState::Idle
	}
}


// vim: ts=4
