//! Typed request/response model
//!
//! Maps raw (dataType, command, body) triples onto strongly typed messages
//! and records which response answers which request.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::codec::Frame;
use super::error::ProtocolError;
use super::types::*;

/// Entries the file list body can carry before the count byte overflows
pub const MAX_PAGE_ENTRIES: usize = u8::MAX as usize;

/// Commands sent from host to device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
	/// Set the device clock, unix seconds
	SyncTime(u32),
	GetBattery,
	GetCapacity,
	GetVersion,
	EnableHighSpeed(bool),
	GetFileList,
	/// Ask for a file by its raw name
	RequestImportFile(Vec<u8>),
	StopImport,
}

impl Request {
	pub fn command(&self) -> Command {
		match self {
			Request::SyncTime(_) => Command::Control(ControlCommand::SyncTime),
			Request::GetBattery => Command::Control(ControlCommand::GetBattery),
			Request::GetCapacity => Command::Control(ControlCommand::GetCapacity),
			Request::GetVersion => Command::Control(ControlCommand::GetVersion),
			Request::EnableHighSpeed(_) => Command::Control(ControlCommand::EnableHighSpeed),
			Request::GetFileList => Command::FileTransfer(FileCommand::GetFileList),
			Request::RequestImportFile(_) => Command::FileTransfer(FileCommand::RequestImportFile),
			Request::StopImport => Command::FileTransfer(FileCommand::StopImport),
		}
	}

	pub fn body(&self) -> Bytes {
		match self {
			Request::SyncTime(secs) => Bytes::copy_from_slice(&secs.to_le_bytes()),
			Request::EnableHighSpeed(on) => Bytes::copy_from_slice(&[*on as u8]),
			Request::RequestImportFile(raw_name) => Bytes::copy_from_slice(raw_name),
			_ => Bytes::new(),
		}
	}

	/// Response command that answers this request, if the device sends one
	///
	/// Multi-frame exchanges (listing, import) are driven by the transfer
	/// state machine and report their first expected command here.
	pub fn expected_response(&self) -> Option<Command> {
		match self {
			Request::GetBattery => Some(Command::Control(ControlCommand::RetBattery)),
			Request::GetCapacity => Some(Command::Control(ControlCommand::RetCapacity)),
			Request::GetVersion => Some(Command::Control(ControlCommand::RetVersion)),
			Request::GetFileList => Some(Command::FileTransfer(FileCommand::RetFileList)),
			Request::RequestImportFile(_) => {
				Some(Command::FileTransfer(FileCommand::StartImportFile))
			}
			Request::SyncTime(_) | Request::EnableHighSpeed(_) | Request::StopImport => None,
		}
	}

	/// Whether `response` is the counterpart this request waits for
	pub fn accepts(&self, response: &Response) -> bool {
		self.expected_response() == Some(response.command())
	}

	/// Build a request from a decoded frame (device side of the link)
	pub fn parse(frame: &Frame) -> Result<Self, ProtocolError> {
		let command = resolve(frame)?;
		let body = frame.body();
		let request = match command {
			Command::Control(ControlCommand::SyncTime) => {
				Request::SyncTime(read_u32(&body, "sync time")?)
			}
			Command::Control(ControlCommand::GetBattery) => Request::GetBattery,
			Command::Control(ControlCommand::GetCapacity) => Request::GetCapacity,
			Command::Control(ControlCommand::GetVersion) => Request::GetVersion,
			Command::Control(ControlCommand::EnableHighSpeed) => {
				Request::EnableHighSpeed(body.first().map(|b| *b != 0).unwrap_or(false))
			}
			Command::FileTransfer(FileCommand::GetFileList) => Request::GetFileList,
			Command::FileTransfer(FileCommand::RequestImportFile) => {
				Request::RequestImportFile(body.to_vec())
			}
			Command::FileTransfer(FileCommand::StopImport) => Request::StopImport,
			other => {
				return Err(ProtocolError::ProtocolViolation(format!(
					"{} is not a host request",
					other
				)))
			}
		};
		Ok(request)
	}
}

/// Messages sent from device to host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
	Battery(u8),
	Capacity(Capacity),
	Version(FirmwareVersion),
	/// One page of catalog entries
	FileListPage(Vec<RemoteFile>),
	ListComplete,
	ImportStarted { size: u64 },
	FileData(Bytes),
	ImportComplete,
	/// Device cancelled the transfer in progress
	ImportStopped,
	Button(ButtonCommand),
	AudioStream { command: AudioStreamCommand, data: Bytes },
}

impl Response {
	pub fn command(&self) -> Command {
		match self {
			Response::Battery(_) => Command::Control(ControlCommand::RetBattery),
			Response::Capacity(_) => Command::Control(ControlCommand::RetCapacity),
			Response::Version(_) => Command::Control(ControlCommand::RetVersion),
			Response::FileListPage(_) => Command::FileTransfer(FileCommand::RetFileList),
			Response::ListComplete => Command::FileTransfer(FileCommand::ListTransferComplete),
			Response::ImportStarted { .. } => Command::FileTransfer(FileCommand::StartImportFile),
			Response::FileData(_) => Command::FileTransfer(FileCommand::FileData),
			Response::ImportComplete => Command::FileTransfer(FileCommand::ImportComplete),
			Response::ImportStopped => Command::FileTransfer(FileCommand::StopImport),
			Response::Button(b) => Command::Button(*b),
			Response::AudioStream { command, .. } => Command::AudioStream(*command),
		}
	}

	/// Status value carried by this response, if any
	pub fn status_update(&self) -> Option<StatusUpdate> {
		match self {
			Response::Battery(pct) => Some(StatusUpdate::Battery(*pct)),
			Response::Capacity(cap) => Some(StatusUpdate::Capacity(*cap)),
			Response::Version(v) => Some(StatusUpdate::Version(*v)),
			_ => None,
		}
	}

	/// Unsolicited frames delivered outside any request/response exchange
	pub fn is_out_of_band(&self) -> bool {
		matches!(self, Response::Button(_) | Response::AudioStream { .. })
	}

	pub fn body(&self) -> Bytes {
		match self {
			Response::Battery(pct) => Bytes::copy_from_slice(&[*pct]),
			Response::Capacity(cap) => {
				let mut buf = BytesMut::with_capacity(8);
				buf.put_u32_le((cap.used / 1024).min(u32::MAX as u64) as u32);
				buf.put_u32_le((cap.total / 1024).min(u32::MAX as u64) as u32);
				buf.freeze()
			}
			Response::Version(v) => Bytes::copy_from_slice(&[v.major, v.minor, v.patch]),
			Response::FileListPage(files) => encode_file_list_page(files),
			Response::ImportStarted { size } => {
				Bytes::copy_from_slice(&((*size).min(u32::MAX as u64) as u32).to_le_bytes())
			}
			Response::FileData(data) => data.clone(),
			Response::AudioStream { data, .. } => data.clone(),
			_ => Bytes::new(),
		}
	}

	/// Decode a validated frame into a typed response
	pub fn parse(frame: &Frame) -> Result<Self, ProtocolError> {
		let command = resolve(frame)?;
		let body = frame.body();
		let response = match command {
			Command::Control(ControlCommand::RetBattery) => {
				let pct = *body.first().ok_or(ProtocolError::MalformedBody {
					what: "battery",
					len: body.len(),
				})?;
				Response::Battery(pct.min(100))
			}
			Command::Control(ControlCommand::RetCapacity) => {
				if body.len() < 8 {
					return Err(ProtocolError::MalformedBody { what: "capacity", len: body.len() });
				}
				let mut b = &body[..];
				let used = b.get_u32_le() as u64 * 1024;
				let total = b.get_u32_le() as u64 * 1024;
				Response::Capacity(Capacity { used, total })
			}
			Command::Control(ControlCommand::RetVersion) => {
				if body.len() < 3 {
					return Err(ProtocolError::MalformedBody { what: "version", len: body.len() });
				}
				Response::Version(FirmwareVersion { major: body[0], minor: body[1], patch: body[2] })
			}
			Command::FileTransfer(FileCommand::RetFileList) => {
				Response::FileListPage(decode_file_list_page(&body)?)
			}
			Command::FileTransfer(FileCommand::ListTransferComplete) => Response::ListComplete,
			Command::FileTransfer(FileCommand::StartImportFile) => {
				Response::ImportStarted { size: read_u32(&body, "import start")? as u64 }
			}
			Command::FileTransfer(FileCommand::FileData) => Response::FileData(body),
			Command::FileTransfer(FileCommand::ImportComplete) => Response::ImportComplete,
			Command::FileTransfer(FileCommand::StopImport) => Response::ImportStopped,
			Command::Button(b) => Response::Button(b),
			Command::AudioStream(c) => Response::AudioStream { command: c, data: body },
			other => {
				return Err(ProtocolError::ProtocolViolation(format!(
					"{} is not a device response",
					other
				)))
			}
		};
		Ok(response)
	}
}

/// Out-of-band notifications delivered to the orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
	Button(ButtonCommand),
	/// Status value pushed without a matching request
	StatusPush(StatusUpdate),
	/// Live audio frame; carried for observers, never stored
	AudioStream { command: AudioStreamCommand, len: usize },
	/// Connectivity change other than a disconnect
	Connectivity(ConnectionState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusUpdate {
	Battery(u8),
	Capacity(Capacity),
	Version(FirmwareVersion),
}

impl DeviceEvent {
	/// Classify a response that arrived outside its exchange
	pub fn from_unsolicited(response: &Response) -> Option<Self> {
		match response {
			Response::Button(b) => Some(DeviceEvent::Button(*b)),
			Response::AudioStream { command, data } => {
				Some(DeviceEvent::AudioStream { command: *command, len: data.len() })
			}
			other => other.status_update().map(DeviceEvent::StatusPush),
		}
	}
}

/// Encode one RetFileList page
///
/// `u8 count`, then per entry: `u8 name_len, name, u32 size, u32 duration,
/// u32 created_at`. Names longer than 255 bytes and entries past
/// [`MAX_PAGE_ENTRIES`] are cut off.
pub fn encode_file_list_page(files: &[RemoteFile]) -> Bytes {
	let files = &files[..files.len().min(MAX_PAGE_ENTRIES)];
	let mut buf = BytesMut::with_capacity(1 + files.len() * 24);
	buf.put_u8(files.len() as u8);
	for file in files {
		let name = &file.raw_name[..file.raw_name.len().min(u8::MAX as usize)];
		buf.put_u8(name.len() as u8);
		buf.put_slice(name);
		buf.put_u32_le(file.size_bytes.min(u32::MAX as u64) as u32);
		buf.put_u32_le(file.duration_seconds);
		buf.put_u32_le(file.created_at);
	}
	buf.freeze()
}

/// Decode one RetFileList page
pub fn decode_file_list_page(body: &[u8]) -> Result<Vec<RemoteFile>, ProtocolError> {
	let malformed = || ProtocolError::MalformedBody { what: "file list", len: body.len() };
	let mut b = body;
	if !b.has_remaining() {
		return Err(malformed());
	}
	let count = b.get_u8() as usize;
	let mut files = Vec::with_capacity(count);
	for _ in 0..count {
		if b.remaining() < 1 {
			return Err(malformed());
		}
		let name_len = b.get_u8() as usize;
		if b.remaining() < name_len + 12 {
			return Err(malformed());
		}
		let raw_name = b[..name_len].to_vec();
		b.advance(name_len);
		let size = b.get_u32_le() as u64;
		let duration = b.get_u32_le();
		let created_at = b.get_u32_le();
		files.push(RemoteFile::new(raw_name, size, duration, created_at));
	}
	Ok(files)
}

fn resolve(frame: &Frame) -> Result<Command, ProtocolError> {
	let data_type = frame.data_type().ok_or(ProtocolError::MalformedBody { what: "frame", len: 0 })?;
	let command = frame.command();
	Command::from_wire(data_type, command)
		.ok_or(ProtocolError::Unrecognized { data_type, command })
}

fn read_u32(body: &[u8], what: &'static str) -> Result<u32, ProtocolError> {
	if body.len() < 4 {
		return Err(ProtocolError::MalformedBody { what, len: body.len() });
	}
	let mut b = body;
	Ok(b.get_u32_le())
}


// vim: ts=4
