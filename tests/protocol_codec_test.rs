/// Property tests for the frame codec and checksum engine
use proptest::prelude::*;

use recsync::protocol::crc::{checksum_bitwise, CCITT, POLYNOMIAL};
use recsync::protocol::{decode, encode, FrameBuffer, Request, Response, HEADER_LEN};

#[test]
fn test_get_battery_wire_bytes() {
	let request = Request::GetBattery;
	let command = request.command();
	let bytes = encode(5, command.data_type() as u8, command.wire_code(), &request.body());
	assert_eq!(&bytes[..2], &[0x5A, 0x05]);
	assert_eq!(&bytes[4..6], &[0x01, 0x00]);
	assert_eq!(&bytes[6..], &[0x01]);

	let frame = decode(&bytes).unwrap();
	assert!(frame.is_valid());
	assert_eq!(Request::parse(&frame).unwrap(), Request::GetBattery);
}

#[test]
fn test_known_response_frame() {
	// RetBattery, 64%
	let bytes = encode(9, 0x01, Some(0x01), &[64]);
	let frame = decode(&bytes).unwrap();
	assert_eq!(frame.sequence(), 9);
	assert_eq!(Response::parse(&frame).unwrap(), Response::Battery(64));
}

#[test]
fn test_short_buffers_yield_none() {
	let bytes = encode(1, 0x03, Some(0x05), &[1, 2, 3, 4]);
	for len in 0..bytes.len() {
		assert!(decode(&bytes[..len]).is_none(), "prefix of {} bytes decoded", len);
	}
}

proptest! {
	#[test]
	fn prop_round_trip(
		seq in any::<u8>(),
		data_type in any::<u8>(),
		command in any::<u8>(),
		body in proptest::collection::vec(any::<u8>(), 0..600),
	) {
		let bytes = encode(seq, data_type, Some(command), &body);
		let frame = decode(&bytes).unwrap();
		prop_assert!(frame.is_valid());
		prop_assert_eq!(frame.sequence(), seq);
		prop_assert_eq!(frame.data_type(), Some(data_type));
		prop_assert_eq!(frame.command(), Some(command));
		prop_assert_eq!(&frame.body()[..], &body[..]);
		prop_assert_eq!(frame.wire_len(), bytes.len());
	}

	#[test]
	fn prop_round_trip_without_command(seq in any::<u8>(), data_type in any::<u8>()) {
		let frame = decode(&encode(seq, data_type, None, &[])).unwrap();
		prop_assert!(frame.is_valid());
		prop_assert_eq!(frame.data_type(), Some(data_type));
		prop_assert_eq!(frame.command(), None);
		prop_assert!(frame.body().is_empty());
	}

	#[test]
	fn prop_table_matches_bitwise(data in proptest::collection::vec(any::<u8>(), 0..1024)) {
		prop_assert_eq!(CCITT.checksum(&data), checksum_bitwise(POLYNOMIAL, &data));
	}

	#[test]
	fn prop_single_bit_flip_detected(
		body in proptest::collection::vec(any::<u8>(), 0..256),
		bit in any::<usize>(),
	) {
		let bytes = encode(0, 0x03, Some(0x05), &body);
		let mut damaged = bytes.to_vec();
		let payload_bits = (damaged.len() - HEADER_LEN) * 8;
		let bit = bit % payload_bits;
		damaged[HEADER_LEN + bit / 8] ^= 1 << (bit % 8);
		let frame = decode(&damaged).unwrap();
		prop_assert!(!frame.is_valid());
	}

	#[test]
	fn prop_decode_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
		let _ = decode(&bytes);
		let mut buffer = FrameBuffer::new();
		buffer.push(&bytes);
		while buffer.next_frame().is_some() {}
	}

	#[test]
	fn prop_reassembly_is_split_independent(
		bodies in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..40), 1..6),
		split in 1usize..17,
	) {
		let mut stream = Vec::new();
		for (i, body) in bodies.iter().enumerate() {
			stream.extend_from_slice(&encode(i as u8, 0x03, Some(0x05), body));
		}

		let mut buffer = FrameBuffer::new();
		let mut frames = Vec::new();
		for piece in stream.chunks(split) {
			buffer.push(piece);
			while let Some(frame) = buffer.next_frame() {
				frames.push(frame);
			}
		}

		prop_assert_eq!(frames.len(), bodies.len());
		for (i, (frame, body)) in frames.iter().zip(&bodies).enumerate() {
			prop_assert!(frame.is_valid());
			prop_assert_eq!(frame.sequence(), i as u8);
			prop_assert_eq!(&frame.body()[..], &body[..]);
		}
		prop_assert_eq!(buffer.pending(), 0);
	}
}

// vim: ts=4
