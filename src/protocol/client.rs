//! Device client: single-channel request/response driver
//!
//! Owns the link and turns its notification stream into typed responses.
//! The device serves one outstanding request at a time, so the client
//! never pipelines: callers await each exchange before starting the next.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use super::codec::{encode, Frame, FrameBuffer, SequenceCounter};
use super::error::{LinkError, ProtocolError};
use super::messages::{DeviceEvent, Request, Response};
use super::traits::{DeviceLink, LinkEvent, LinkResult};
use super::types::{Command, ConnectionState};

/// Result type for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Frame counters for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientStats {
	pub frames_sent: u64,
	pub frames_received: u64,
	pub invalid_frames: u64,
	pub unrecognized_frames: u64,
}

/// Protocol client over a [`DeviceLink`]
pub struct DeviceClient<L: DeviceLink> {
	link: L,
	sequence: SequenceCounter,
	buffer: FrameBuffer,
	events: Option<mpsc::UnboundedSender<DeviceEvent>>,
	response_timeout: Option<Duration>,
	stats: ClientStats,
}

impl<L: DeviceLink> DeviceClient<L> {
	pub fn new(link: L) -> Self {
		Self {
			link,
			sequence: SequenceCounter::new(),
			buffer: FrameBuffer::new(),
			events: None,
			response_timeout: None,
			stats: ClientStats::default(),
		}
	}

	/// Route out-of-band device events to `tx`
	pub fn with_events(mut self, tx: mpsc::UnboundedSender<DeviceEvent>) -> Self {
		self.events = Some(tx);
		self
	}

	/// Fail a wait for the device after `limit`; `None` waits indefinitely
	pub fn with_response_timeout(mut self, limit: Option<Duration>) -> Self {
		self.response_timeout = limit;
		self
	}

	pub fn link(&self) -> &L {
		&self.link
	}

	pub fn link_mut(&mut self) -> &mut L {
		&mut self.link
	}

	pub fn stats(&self) -> ClientStats {
		self.stats
	}

	pub async fn connect(&mut self) -> LinkResult<()> {
		self.buffer.clear();
		self.link.connect().await
	}

	pub async fn disconnect(&mut self) -> LinkResult<()> {
		self.buffer.clear();
		self.link.disconnect().await
	}

	/// Encode and write a request without waiting for an answer
	pub async fn send(&mut self, request: &Request) -> ProtocolResult<()> {
		let command = request.command();
		let seq = self.sequence.next();
		let bytes = encode(seq, command.data_type() as u8, command.wire_code(), &request.body());
		trace!("[{}] -> seq={} {}: {}", self.link.name(), seq, command, hex::encode(&bytes));
		self.link.write(&bytes).await?;
		self.stats.frames_sent += 1;
		Ok(())
	}

	/// Send a request and wait for its counterpart response
	///
	/// Status values that arrive while waiting are forwarded as pushes;
	/// anything else unexpected is dropped with a diagnostic.
	pub async fn request(&mut self, request: Request) -> ProtocolResult<Response> {
		let expected = request.expected_response().ok_or_else(|| {
			ProtocolError::ProtocolViolation(format!("{} has no response", request.command()))
		})?;
		self.send(&request).await?;

		loop {
			let response = self.next_response().await?;
			if response.command() == expected {
				return Ok(response);
			}
			self.divert(&response, expected);
		}
	}

	/// Hand a response that arrived outside its exchange to the event channel
	pub fn divert(&self, response: &Response, waiting_for: Command) {
		match DeviceEvent::from_unsolicited(response) {
			Some(event) => self.emit(event),
			None => warn!("Ignoring {} while waiting for {}", response.command(), waiting_for),
		}
	}

	/// Next valid, recognized, in-band response from the device
	pub async fn next_response(&mut self) -> ProtocolResult<Response> {
		loop {
			while let Some(frame) = self.buffer.next_frame() {
				let Some(response) = self.accept(frame) else {
					continue;
				};
				if response.is_out_of_band() {
					if let Some(event) = DeviceEvent::from_unsolicited(&response) {
						self.emit(event);
					}
					continue;
				}
				return Ok(response);
			}

			match self.recv_event().await? {
				LinkEvent::Notification(bytes) => {
					trace!("[{}] <- {}", self.link.name(), hex::encode(&bytes));
					self.buffer.push(&bytes);
				}
				LinkEvent::Disconnected | LinkEvent::StateChanged(ConnectionState::Disconnected) => {
					debug!("[{}] link dropped with {} bytes pending", self.link.name(), self.buffer.pending());
					self.buffer.clear();
					return Err(LinkError::Disconnected.into());
				}
				LinkEvent::StateChanged(state) => self.emit(DeviceEvent::Connectivity(state)),
			}
		}
	}

	fn accept(&mut self, frame: Frame) -> Option<Response> {
		self.stats.frames_received += 1;
		if !frame.is_valid() {
			self.stats.invalid_frames += 1;
			warn!(
				"Dropping frame seq={} with bad checksum {:#06x} ({} bytes)",
				frame.sequence(),
				frame.checksum(),
				frame.length()
			);
			return None;
		}
		match Response::parse(&frame) {
			Ok(response) => Some(response),
			Err(e) => {
				self.stats.unrecognized_frames += 1;
				warn!("Ignoring frame seq={}: {}", frame.sequence(), e);
				None
			}
		}
	}

	async fn recv_event(&mut self) -> ProtocolResult<LinkEvent> {
		match self.response_timeout {
			Some(limit) => match tokio::time::timeout(limit, self.link.recv()).await {
				Ok(event) => Ok(event?),
				Err(_) => Err(ProtocolError::Timeout),
			},
			None => Ok(self.link.recv().await?),
		}
	}

	fn emit(&self, event: DeviceEvent) {
		if let Some(tx) = &self.events {
			let _ = tx.send(event);
		} else {
			debug!("No listener for device event {:?}", event);
		}
	}
}

// vim: ts=4
