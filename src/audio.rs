//! Audio container assembly
//!
//! The device records 16-bit signed little-endian PCM, mono, 16 kHz. The
//! format is a fixed contract with the firmware, not negotiated. Received
//! bytes are wrapped in a minimal 44-byte RIFF/WAVE header.

use bytes::{Buf, BufMut};

/// Header size of the canonical PCM WAVE layout
pub const WAV_HEADER_LEN: usize = 44;

/// PCM format tag
pub const FORMAT_PCM: u16 = 1;

/// Sample layout of device recordings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
	pub sample_rate: u32,
	pub channels: u16,
	pub bits_per_sample: u16,
}

/// Fixed device format
pub const DEVICE_FORMAT: AudioFormat =
	AudioFormat { sample_rate: 16_000, channels: 1, bits_per_sample: 16 };

impl AudioFormat {
	pub fn block_align(&self) -> u16 {
		self.channels * (self.bits_per_sample / 8)
	}

	pub fn byte_rate(&self) -> u32 {
		self.sample_rate * self.block_align() as u32
	}

	/// Whole seconds of audio in `bytes` of PCM
	pub fn duration_secs(&self, bytes: u64) -> u32 {
		let rate = self.byte_rate() as u64;
		if rate == 0 {
			return 0;
		}
		(bytes / rate).min(u32::MAX as u64) as u32
	}
}

/// Wrap device PCM chunks in a WAVE container
pub fn convert_to_container<C: AsRef<[u8]>>(chunks: &[C]) -> Vec<u8> {
	convert_with_format(chunks, DEVICE_FORMAT)
}

/// Wrap PCM chunks in a WAVE container with an explicit format
///
/// Allocates the output once. Empty input yields a valid 44-byte file.
pub fn convert_with_format<C: AsRef<[u8]>>(chunks: &[C], format: AudioFormat) -> Vec<u8> {
	let data_len: usize = chunks.iter().map(|c| c.as_ref().len()).sum();
	let mut buf = Vec::with_capacity(WAV_HEADER_LEN + data_len);
	write_header(&mut buf, format, data_len as u32);
	for chunk in chunks {
		buf.put_slice(chunk.as_ref());
	}
	buf
}

fn write_header(buf: &mut Vec<u8>, format: AudioFormat, data_len: u32) {
	// RIFF chunk
	buf.put_slice(b"RIFF");
	buf.put_u32_le(36u32.saturating_add(data_len));
	buf.put_slice(b"WAVE");
	// fmt subchunk
	buf.put_slice(b"fmt ");
	buf.put_u32_le(16);
	buf.put_u16_le(FORMAT_PCM);
	buf.put_u16_le(format.channels);
	buf.put_u32_le(format.sample_rate);
	buf.put_u32_le(format.byte_rate());
	buf.put_u16_le(format.block_align());
	buf.put_u16_le(format.bits_per_sample);
	// data subchunk
	buf.put_slice(b"data");
	buf.put_u32_le(data_len);
}

/// Parsed canonical WAVE header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
	pub riff_len: u32,
	pub format_tag: u16,
	pub format: AudioFormat,
	pub byte_rate: u32,
	pub block_align: u16,
	pub data_len: u32,
}

impl WavHeader {
	/// Parse the 44-byte canonical header; `None` for anything else
	pub fn parse(bytes: &[u8]) -> Option<Self> {
		if bytes.len() < WAV_HEADER_LEN
			|| &bytes[0..4] != b"RIFF"
			|| &bytes[8..12] != b"WAVE"
			|| &bytes[12..16] != b"fmt "
			|| &bytes[36..40] != b"data"
		{
			return None;
		}
		let mut b = &bytes[4..8];
		let riff_len = b.get_u32_le();
		let mut b = &bytes[20..36];
		let format_tag = b.get_u16_le();
		let channels = b.get_u16_le();
		let sample_rate = b.get_u32_le();
		let byte_rate = b.get_u32_le();
		let block_align = b.get_u16_le();
		let bits_per_sample = b.get_u16_le();
		let mut b = &bytes[40..44];
		let data_len = b.get_u32_le();
		Some(Self {
			riff_len,
			format_tag,
			format: AudioFormat { sample_rate, channels, bits_per_sample },
			byte_rate,
			block_align,
			data_len,
		})
	}
}


// vim: ts=4
