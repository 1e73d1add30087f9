//! In-process loopback device
//!
//! Implements the device side of the wire protocol behind the
//! [`DeviceLink`] trait: it decodes written frames, answers with framed
//! notifications split at the MTU, pages the file list and streams file
//! data one chunk per notification round. Faults can be injected per file
//! to exercise every failure path of the sync engine without a radio.

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use std::collections::VecDeque;
use tracing::{debug, trace, warn};

use crate::audio::DEVICE_FORMAT;
use crate::config::EmulatorConfig;
use crate::protocol::{
	encode, ButtonCommand, Capacity, ConnectionState, DeviceLink, FirmwareVersion, FrameBuffer,
	LinkError, LinkEvent, LinkResult, RemoteFile, Request, Response, SequenceCounter,
};

/// Catalog entries per RetFileList page
pub const PAGE_SIZE: usize = 8;

/// Creation time of the first generated recording
const BASE_TIME: u32 = 1_700_000_000;

/// Misbehaviour of one file transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferFault {
	/// Announce the full size but send this many bytes fewer
	ShortBy(usize),
	/// Device stops the import after this many chunks
	StopAfter(usize),
	/// Link drops after this many chunks
	DisconnectAfter(usize),
	/// The chunk at this index goes out with a damaged checksum
	CorruptChunk(usize),
	/// Device stops sending after this many chunks without saying so
	StallAfter(usize),
	/// A button press arrives after this many chunks
	ButtonAfter(usize, ButtonCommand),
}

/// How the emulated device selection ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pairing {
	Accept,
	/// User backs out of the selection dialog
	Cancel,
	Fail(String),
}

struct StoredFile {
	entry: RemoteFile,
	data: Bytes,
	fault: Option<TransferFault>,
}

struct ActiveImport {
	data: Bytes,
	offset: usize,
	chunk: usize,
	fault: Option<TransferFault>,
}

pub struct LoopbackDevice {
	name: String,
	files: Vec<StoredFile>,
	chunk_size: usize,
	mtu: usize,
	pairing: Pairing,
	connected: bool,
	silent: bool,
	inbox: FrameBuffer,
	outbox: VecDeque<LinkEvent>,
	sequence: SequenceCounter,
	active: Option<ActiveImport>,
	battery: u8,
	firmware: FirmwareVersion,
	total_kib: u32,
	clock: Option<u32>,
	high_speed: bool,
	requests: Vec<Request>,
}

impl LoopbackDevice {
	/// Empty device with default chunking
	pub fn new(name: &str) -> Self {
		let defaults = EmulatorConfig::default();
		Self {
			name: name.to_string(),
			files: Vec::new(),
			chunk_size: defaults.chunk_size,
			mtu: defaults.mtu,
			pairing: Pairing::Accept,
			connected: false,
			silent: false,
			inbox: FrameBuffer::new(),
			outbox: VecDeque::new(),
			sequence: SequenceCounter::new(),
			active: None,
			battery: 87,
			firmware: FirmwareVersion { major: 1, minor: 4, patch: 2 },
			total_kib: 64 * 1024,
			clock: None,
			high_speed: false,
			requests: Vec::new(),
		}
	}

	/// Device holding `file_count` generated recordings
	pub fn from_config(config: &EmulatorConfig) -> Self {
		let mut device = Self::new("loopback").with_chunk_size(config.chunk_size).with_mtu(config.mtu);
		for i in 0..config.file_count {
			let name = format!("REC{:04}.PCM", i + 1);
			let created_at = BASE_TIME.saturating_add(i as u32 * 600);
			device = device.with_recording(name.as_bytes(), synthetic_pcm(config.file_seconds), created_at);
		}
		device
	}

	pub fn with_recording(mut self, raw_name: &[u8], data: Bytes, created_at: u32) -> Self {
		let duration = DEVICE_FORMAT.duration_secs(data.len() as u64);
		let entry = RemoteFile::new(raw_name.to_vec(), data.len() as u64, duration, created_at);
		self.files.push(StoredFile { entry, data, fault: None });
		self
	}

	/// Attach a fault to the recording with this raw name
	pub fn with_fault(mut self, raw_name: &[u8], fault: TransferFault) -> Self {
		match self.files.iter_mut().find(|f| f.entry.raw_name == raw_name) {
			Some(file) => file.fault = Some(fault),
			None => warn!("No recording {} to attach {:?} to", hex::encode(raw_name), fault),
		}
		self
	}

	pub fn with_pairing(mut self, pairing: Pairing) -> Self {
		self.pairing = pairing;
		self
	}

	pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
		self.chunk_size = chunk_size.max(1);
		self
	}

	pub fn with_mtu(mut self, mtu: usize) -> Self {
		self.mtu = mtu.max(1);
		self
	}

	pub fn with_battery(mut self, percent: u8) -> Self {
		self.battery = percent;
		self
	}

	/// Stop answering anything
	pub fn set_silent(&mut self, silent: bool) {
		self.silent = silent;
	}

	/// Queue an unsolicited button frame
	pub fn press_button(&mut self, button: ButtonCommand) {
		self.respond(Response::Button(button));
	}

	/// Queue an unsolicited battery frame
	pub fn push_battery(&mut self, percent: u8) {
		self.battery = percent;
		self.respond(Response::Battery(percent));
	}

	/// Catalog in device order
	pub fn recordings(&self) -> Vec<RemoteFile> {
		self.files.iter().map(|f| f.entry.clone()).collect()
	}

	/// PCM payload of a stored recording
	pub fn recording_data(&self, raw_name: &[u8]) -> Option<Bytes> {
		self.files.iter().find(|f| f.entry.raw_name == raw_name).map(|f| f.data.clone())
	}

	/// Every request decoded so far, in arrival order
	pub fn requests(&self) -> &[Request] {
		&self.requests
	}

	/// Last time set by SyncTime
	pub fn clock(&self) -> Option<u32> {
		self.clock
	}

	pub fn high_speed(&self) -> bool {
		self.high_speed
	}

	pub fn is_connected(&self) -> bool {
		self.connected
	}

	fn capacity(&self) -> Capacity {
		let used: u64 = self.files.iter().map(|f| f.data.len() as u64).sum();
		let used_kib = (used + 1023) / 1024;
		Capacity { used: used_kib * 1024, total: self.total_kib as u64 * 1024 }
	}

	// ========================================================================
	// DEVICE SIDE OF THE PROTOCOL
	// ========================================================================

	fn handle(&mut self, request: Request) {
		match request {
			Request::SyncTime(secs) => self.clock = Some(secs),
			Request::GetBattery => self.respond(Response::Battery(self.battery)),
			Request::GetVersion => self.respond(Response::Version(self.firmware)),
			Request::GetCapacity => {
				let capacity = self.capacity();
				self.respond(Response::Capacity(capacity))
			}
			Request::EnableHighSpeed(on) => self.high_speed = on,
			Request::GetFileList => {
				let entries = self.recordings();
				for page in entries.chunks(PAGE_SIZE) {
					self.respond(Response::FileListPage(page.to_vec()));
				}
				self.respond(Response::ListComplete);
			}
			Request::RequestImportFile(raw_name) => self.start_import(&raw_name),
			Request::StopImport => {
				if self.active.take().is_some() {
					debug!("host stopped the import");
				}
			}
		}
	}

	fn start_import(&mut self, raw_name: &[u8]) {
		if self.active.is_some() {
			warn!("Import requested while another is running; dropping the old one");
			self.active = None;
		}
		let Some(index) = self.files.iter().position(|f| f.entry.raw_name == raw_name) else {
			debug!("no recording named {}", hex::encode(raw_name));
			self.respond(Response::ImportStopped);
			return;
		};
		let file = &self.files[index];
		let size = file.entry.size_bytes;
		let fault = file.fault.clone();
		let data = match fault {
			Some(TransferFault::ShortBy(missing)) => {
				file.data.slice(..file.data.len().saturating_sub(missing))
			}
			_ => file.data.clone(),
		};
		self.respond(Response::ImportStarted { size });
		self.active = Some(ActiveImport { data, offset: 0, chunk: 0, fault });
	}

	/// Queue the next frame of the running import; false when nothing was queued
	fn step_import(&mut self) -> bool {
		let Some(mut import) = self.active.take() else {
			return false;
		};
		let at = import.chunk;
		match import.fault.clone() {
			Some(TransferFault::StopAfter(n)) if n == at => {
				self.respond(Response::ImportStopped);
				return true;
			}
			Some(TransferFault::DisconnectAfter(n)) if n == at => {
				self.drop_link();
				return true;
			}
			Some(TransferFault::StallAfter(n)) if n == at => return false,
			Some(TransferFault::ButtonAfter(n, button)) if n == at => {
				self.respond(Response::Button(button));
				import.fault = None;
				self.active = Some(import);
				return true;
			}
			_ => {}
		}

		if import.offset >= import.data.len() {
			self.respond(Response::ImportComplete);
			return true;
		}
		let end = (import.offset + self.chunk_size).min(import.data.len());
		let chunk = import.data.slice(import.offset..end);
		let corrupt = import.fault == Some(TransferFault::CorruptChunk(at));
		self.queue_frame(Response::FileData(chunk), corrupt);
		import.offset = end;
		import.chunk += 1;
		self.active = Some(import);
		true
	}

	fn drop_link(&mut self) {
		debug!("[{}] dropping the link", self.name);
		self.connected = false;
		self.active = None;
		self.outbox.push_back(LinkEvent::Disconnected);
	}

	fn respond(&mut self, response: Response) {
		self.queue_frame(response, false);
	}

	/// Frame a response and queue it in MTU-sized notifications
	fn queue_frame(&mut self, response: Response, corrupt: bool) {
		let command = response.command();
		let seq = self.sequence.next();
		let mut frame = encode(seq, command.data_type() as u8, command.wire_code(), &response.body()).to_vec();
		if corrupt {
			frame[2] ^= 0xFF;
		}
		trace!("[{}] queue seq={} {}", self.name, seq, command);
		let mut frame = Bytes::from(frame);
		while frame.len() > self.mtu {
			self.outbox.push_back(LinkEvent::Notification(frame.split_to(self.mtu)));
		}
		if !frame.is_empty() {
			self.outbox.push_back(LinkEvent::Notification(frame));
		}
	}
}

#[async_trait]
impl DeviceLink for LoopbackDevice {
	fn name(&self) -> &str {
		&self.name
	}

	async fn connect(&mut self) -> LinkResult<()> {
		match &self.pairing {
			Pairing::Accept => {}
			Pairing::Cancel => return Err(LinkError::PairingCancelled),
			Pairing::Fail(message) => return Err(LinkError::ConnectFailed { message: message.clone() }),
		}
		self.connected = true;
		self.inbox.clear();
		self.outbox.clear();
		self.active = None;
		self.outbox.push_back(LinkEvent::StateChanged(ConnectionState::Connected));
		Ok(())
	}

	async fn disconnect(&mut self) -> LinkResult<()> {
		self.connected = false;
		self.active = None;
		self.inbox.clear();
		self.outbox.clear();
		Ok(())
	}

	async fn write(&mut self, frame: &[u8]) -> LinkResult<()> {
		if !self.connected {
			return Err(LinkError::NotConnected);
		}
		if self.silent {
			return Ok(());
		}
		self.inbox.push(frame);
		while let Some(frame) = self.inbox.next_frame() {
			if !frame.is_valid() {
				warn!("[{}] dropping host frame seq={} with bad checksum", self.name, frame.sequence());
				continue;
			}
			match Request::parse(&frame) {
				Ok(request) => {
					self.requests.push(request.clone());
					self.handle(request);
				}
				Err(e) => warn!("[{}] ignoring host frame seq={}: {}", self.name, frame.sequence(), e),
			}
		}
		Ok(())
	}

	async fn recv(&mut self) -> LinkResult<LinkEvent> {
		loop {
			if let Some(event) = self.outbox.pop_front() {
				return Ok(event);
			}
			if !self.connected {
				return Err(LinkError::NotConnected);
			}
			if self.silent || !self.step_import() {
				// Nothing will ever arrive without another write
				return std::future::pending().await;
			}
		}
	}
}

/// Deterministic 16 kHz mono PCM test tone
pub fn synthetic_pcm(seconds: u32) -> Bytes {
	let samples = DEVICE_FORMAT.sample_rate as usize * seconds as usize;
	let mut buf = BytesMut::with_capacity(samples * 2);
	for i in 0..samples {
		let phase = (i % 64) as i32;
		let level = if phase < 32 { phase - 16 } else { 48 - phase };
		buf.put_i16_le((level * 1024) as i16);
	}
	buf.freeze()
}


// vim: ts=4
