//! Packet codec
//!
//! Frame layout, 6-byte header then payload:
//!
//! ```text
//! +-------+----------+--------------+-------------+-------------------------------+
//! | 0x5A  | sequence | checksum (BE)| length (LE) | dataType | command? | body... |
//! +-------+----------+--------------+-------------+-------------------------------+
//!   1 byte   1 byte      2 bytes       2 bytes        length bytes
//! ```
//!
//! The checksum covers the little-endian length field followed by the
//! payload. Magic and sequence are not covered; device firmware depends on
//! this exact layout.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::{trace, warn};

use super::crc::CCITT;

/// First byte of every frame
pub const MAGIC: u8 = 0x5A;

/// Fixed header size
pub const HEADER_LEN: usize = 6;

/// Largest payload the 16-bit length field can describe
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

/// A decoded frame; immutable once constructed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
	sequence: u8,
	checksum: u16,
	payload: Bytes,
	valid: bool,
}

impl Frame {
	pub fn sequence(&self) -> u8 {
		self.sequence
	}

	/// Checksum as transmitted
	pub fn checksum(&self) -> u16 {
		self.checksum
	}

	pub fn length(&self) -> usize {
		self.payload.len()
	}

	pub fn payload(&self) -> &Bytes {
		&self.payload
	}

	/// True iff the recomputed checksum equals the transmitted one
	pub fn is_valid(&self) -> bool {
		self.valid
	}

	/// Size of this frame on the wire
	pub fn wire_len(&self) -> usize {
		HEADER_LEN + self.payload.len()
	}

	/// First payload byte; `None` for an empty payload
	pub fn data_type(&self) -> Option<u8> {
		self.payload.first().copied()
	}

	pub fn command(&self) -> Option<u8> {
		self.payload.get(1).copied()
	}

	pub fn body(&self) -> Bytes {
		if self.payload.len() > 2 {
			self.payload.slice(2..)
		} else {
			Bytes::new()
		}
	}
}

/// Checksum over the little-endian length field and the payload
pub fn frame_checksum(payload: &[u8]) -> u16 {
	let mut digest = CCITT.digest();
	digest.update(&(payload.len() as u16).to_le_bytes());
	digest.update(payload);
	digest.finalize()
}

/// Encode a frame
///
/// The command byte is omitted entirely when `command` is `None`. A body
/// is only meaningful after a command; without one the receiver would read
/// its first byte as the opcode.
///
/// A payload longer than [`MAX_PAYLOAD_LEN`] cannot be described by the
/// length field. Debug builds panic on it; release builds log and cut it
/// to fit, which the receiver will see as a short message.
pub fn encode(sequence: u8, data_type: u8, command: Option<u8>, body: &[u8]) -> Bytes {
	let mut payload = BytesMut::with_capacity(2 + body.len());
	payload.put_u8(data_type);
	if let Some(command) = command {
		payload.put_u8(command);
	}
	payload.put_slice(body);
	debug_assert!(
		payload.len() <= MAX_PAYLOAD_LEN,
		"payload of {} bytes exceeds the length field",
		payload.len()
	);
	if payload.len() > MAX_PAYLOAD_LEN {
		warn!("Truncating {}-byte payload to {} bytes", payload.len(), MAX_PAYLOAD_LEN);
		payload.truncate(MAX_PAYLOAD_LEN);
	}

	let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
	buf.put_u8(MAGIC);
	buf.put_u8(sequence);
	buf.put_u16(frame_checksum(&payload));
	buf.put_u16_le(payload.len() as u16);
	buf.put_slice(&payload);
	buf.freeze()
}

/// Decode one frame from the start of `bytes`
///
/// Returns `None` when fewer than 6 bytes are available, the magic byte
/// mismatches, or the declared length exceeds the available bytes. A
/// checksum mismatch still yields a frame, with `is_valid() == false`.
pub fn decode(bytes: &[u8]) -> Option<Frame> {
	if bytes.len() < HEADER_LEN || bytes[0] != MAGIC {
		return None;
	}
	let mut header = &bytes[1..HEADER_LEN];
	let sequence = header.get_u8();
	let checksum = header.get_u16();
	let length = header.get_u16_le() as usize;
	let payload = bytes.get(HEADER_LEN..HEADER_LEN + length)?;

	let valid = frame_checksum(payload) == checksum;
	Some(Frame { sequence, checksum, payload: Bytes::copy_from_slice(payload), valid })
}

/// Reassembles frames from an arbitrarily fragmented byte stream
#[derive(Debug, Default)]
pub struct FrameBuffer {
	buf: BytesMut,
	discarded: u64,
}

impl FrameBuffer {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push(&mut self, bytes: &[u8]) {
		self.buf.extend_from_slice(bytes);
	}

	/// Bytes waiting for the rest of their frame
	pub fn pending(&self) -> usize {
		self.buf.len()
	}

	/// Bytes dropped while hunting for a magic byte
	pub fn discarded(&self) -> u64 {
		self.discarded
	}

	/// Next complete frame, or `None` until more bytes arrive
	///
	/// A damaged frame is still returned, but its length field is not
	/// trusted when an intact frame starts inside it. An incomplete head
	/// frame followed by an intact one is treated as a corrupted length
	/// and dropped, so one flipped length byte cannot stall the stream.
	pub fn next_frame(&mut self) -> Option<Frame> {
		loop {
			self.resync();
			match decode(&self.buf) {
				Some(frame) if frame.is_valid() => {
					self.buf.advance(frame.wire_len());
					return Some(frame);
				}
				Some(frame) => {
					let skip = self.intact_frame_within(frame.wire_len()).unwrap_or_else(|| frame.wire_len());
					self.buf.advance(skip);
					return Some(frame);
				}
				None => {
					let skip = self.intact_frame_within(self.buf.len())?;
					trace!("head frame never completes, skipping {} bytes to an intact frame", skip);
					self.discarded += skip as u64;
					self.buf.advance(skip);
				}
			}
		}
	}

	pub fn clear(&mut self) {
		self.buf.clear();
	}

	/// Offset of the first intact frame starting in `1..end`
	fn intact_frame_within(&self, end: usize) -> Option<usize> {
		let end = end.min(self.buf.len());
		(1..end).filter(|&i| self.buf[i] == MAGIC).find(|&i| {
			decode(&self.buf[i..]).map(|frame| frame.is_valid()).unwrap_or(false)
		})
	}

	fn resync(&mut self) {
		let skip = match self.buf.iter().position(|&b| b == MAGIC) {
			Some(0) => return,
			Some(pos) => pos,
			None => self.buf.len(),
		};
		if skip > 0 {
			trace!("dropping {} bytes before frame start: {}", skip, hex::encode(&self.buf[..skip]));
			self.discarded += skip as u64;
			self.buf.advance(skip);
		}
	}
}

/// Per-sender frame counter, wraps modulo 256
#[derive(Debug, Default, Clone)]
pub struct SequenceCounter {
	next: u8,
}

impl SequenceCounter {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn next(&mut self) -> u8 {
		let seq = self.next;
		self.next = self.next.wrapping_add(1);
		seq
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::protocol::types::{ControlCommand, DataType};

	#[test]
	fn test_get_battery_example() {
		let bytes = encode(5, DataType::Control as u8, None, &[]);
		assert_eq!(&bytes[..2], &[0x5A, 0x05]);
		assert_eq!(&bytes[4..6], &[0x01, 0x00]);
		assert_eq!(&bytes[6..], &[DataType::Control as u8]);

		// Checksum covers length + payload only
		let expected = crate::protocol::crc::checksum(&[0x01, 0x00, 0x01]);
		assert_eq!(&bytes[2..4], &expected.to_be_bytes());
	}

	#[test]
	fn test_command_and_body_layout() {
		let bytes = encode(
			0xFF,
			DataType::Control as u8,
			Some(ControlCommand::SyncTime as u8),
			&[1, 2, 3, 4],
		);
		assert_eq!(bytes.len(), HEADER_LEN + 6);
		assert_eq!(&bytes[4..6], &[0x06, 0x00]);
		let frame = decode(&bytes).unwrap();
		assert!(frame.is_valid());
		assert_eq!(frame.sequence(), 0xFF);
		assert_eq!(frame.data_type(), Some(0x01));
		assert_eq!(frame.command(), Some(0x02));
		assert_eq!(&frame.body()[..], &[1, 2, 3, 4]);
	}

	#[test]
	fn test_checksum_ignores_magic_and_sequence() {
		let a = encode(1, 3, Some(5), b"abc");
		let b = encode(200, 3, Some(5), b"abc");
		assert_eq!(&a[2..4], &b[2..4]);
	}

	#[test]
	fn test_decode_short_buffers() {
		assert!(decode(&[]).is_none());
		assert!(decode(&[0x5A, 0, 0, 0, 0]).is_none());
		let bytes = encode(0, 3, Some(5), &[9; 10]);
		for cut in 0..bytes.len() {
			assert!(decode(&bytes[..cut]).is_none(), "cut at {}", cut);
		}
	}

	#[test]
	fn test_decode_bad_magic() {
		let mut bytes = encode(0, 1, None, &[]).to_vec();
		bytes[0] = 0xA5;
		assert!(decode(&bytes).is_none());
	}

	#[test]
	fn test_corrupt_checksum_marks_invalid() {
		let mut bytes = encode(0, 3, Some(5), b"hello").to_vec();
		let last = bytes.len() - 1;
		bytes[last] ^= 0x01;
		let frame = decode(&bytes).unwrap();
		assert!(!frame.is_valid());
	}

	#[test]
	fn test_decode_ignores_trailing_bytes() {
		let mut bytes = encode(7, 3, Some(6), &[]).to_vec();
		bytes.extend_from_slice(&[0x5A, 0x01]);
		let frame = decode(&bytes).unwrap();
		assert_eq!(frame.wire_len(), HEADER_LEN + 2);
	}

	#[test]
	fn test_frame_buffer_reassembles_fragments() {
		let mut stream = Vec::new();
		stream.extend_from_slice(&encode(1, 3, Some(5), &[1; 40]));
		stream.extend_from_slice(&encode(2, 3, Some(6), &[]));

		let mut buffer = FrameBuffer::new();
		let mut frames = Vec::new();
		for piece in stream.chunks(7) {
			buffer.push(piece);
			while let Some(frame) = buffer.next_frame() {
				frames.push(frame);
			}
		}
		assert_eq!(frames.len(), 2);
		assert_eq!(frames[0].sequence(), 1);
		assert_eq!(frames[1].sequence(), 2);
		assert_eq!(buffer.pending(), 0);
	}

	#[test]
	fn test_frame_buffer_skips_garbage() {
		let mut buffer = FrameBuffer::new();
		buffer.push(&[0x00, 0x13, 0x37]);
		buffer.push(&encode(9, 1, None, &[]));
		let frame = buffer.next_frame().unwrap();
		assert_eq!(frame.sequence(), 9);
		assert_eq!(buffer.discarded(), 3);
	}

	#[test]
	fn test_corrupted_length_does_not_swallow_following_frames() {
		let mut damaged = encode(1, 3, Some(5), &[7; 2]).to_vec();
		// Declared length 4 becomes 0x4004
		damaged[5] = 0x40;

		let mut buffer = FrameBuffer::new();
		buffer.push(&damaged);
		assert!(buffer.next_frame().is_none());

		let mut frames = Vec::new();
		for seq in 2..21u8 {
			buffer.push(&encode(seq, 3, Some(5), &[seq; 8]));
			while let Some(frame) = buffer.next_frame() {
				frames.push(frame);
			}
		}
		assert_eq!(frames.len(), 19);
		assert!(frames.iter().all(|f| f.is_valid()));
		assert_eq!(frames[0].sequence(), 2);
		assert_eq!(buffer.pending(), 0);
		assert_eq!(buffer.discarded(), damaged.len() as u64);
	}

	#[test]
	fn test_damaged_frame_with_long_length_yields_inner_frames() {
		// Length grows from 4 to 4 + 14, so the damaged frame spans the next one
		let mut damaged = encode(1, 3, Some(5), &[7; 2]).to_vec();
		damaged[4] += 14;
		let inner = encode(2, 3, Some(6), &[]);
		let tail = encode(3, 3, Some(5), &[1; 4]);

		let mut buffer = FrameBuffer::new();
		buffer.push(&damaged);
		buffer.push(&inner);
		buffer.push(&tail);

		let mut frames = Vec::new();
		while let Some(frame) = buffer.next_frame() {
			frames.push(frame);
		}
		let sequences: Vec<_> = frames.iter().filter(|f| f.is_valid()).map(|f| f.sequence()).collect();
		assert_eq!(sequences, vec![2, 3]);
		assert_eq!(buffer.pending(), 0);
	}

	#[test]
	#[cfg(debug_assertions)]
	#[should_panic(expected = "exceeds the length field")]
	fn test_oversize_payload_is_rejected() {
		encode(0, 3, Some(5), &vec![0; MAX_PAYLOAD_LEN]);
	}

	#[test]
	fn test_largest_payload_round_trips() {
		let body = vec![0x11; MAX_PAYLOAD_LEN - 2];
		let frame = decode(&encode(0, 3, Some(5), &body)).unwrap();
		assert!(frame.is_valid());
		assert_eq!(frame.body().len(), body.len());
	}

	#[test]
	fn test_sequence_wraps() {
		let mut seq = SequenceCounter::new();
		for expected in 0..=255u8 {
			assert_eq!(seq.next(), expected);
		}
		assert_eq!(seq.next(), 0);
	}
}

// vim: ts=4
