//! CRC-16/CCITT checksum used to authenticate every frame
//!
//! Polynomial 0x1021, MSB-first, zero initial register, no final XOR
//! (the XMODEM parameterisation). The lookup table is computed at compile
//! time and owned by the [`Crc16`] value, so there is no lazily built global.

/// Generator polynomial
pub const POLYNOMIAL: u16 = 0x1021;

/// Table-driven CRC-16/CCITT engine
#[derive(Debug, Clone)]
pub struct Crc16 {
	table: [u16; 256],
}

/// Engine built at compile time, shared by the codec
pub const CCITT: Crc16 = Crc16::new(POLYNOMIAL);

impl Crc16 {
	/// Build the engine for `poly`
	pub const fn new(poly: u16) -> Self {
		Self { table: build_table(poly) }
	}

	/// Table entry for one byte value
	pub fn entry(&self, index: u8) -> u16 {
		self.table[index as usize]
	}

	/// Start an incremental computation
	pub fn digest(&self) -> Digest<'_> {
		Digest { crc: self, value: 0 }
	}

	/// Checksum of a contiguous buffer
	pub fn checksum(&self, bytes: &[u8]) -> u16 {
		let mut digest = self.digest();
		digest.update(bytes);
		digest.finalize()
	}
}

impl Default for Crc16 {
	fn default() -> Self {
		CCITT
	}
}

/// Running checksum over several non-contiguous slices
pub struct Digest<'a> {
	crc: &'a Crc16,
	value: u16,
}

impl Digest<'_> {
	pub fn update(&mut self, bytes: &[u8]) {
		let mut crc = self.value;
		for &b in bytes {
			let idx = ((crc >> 8) as u8) ^ b;
			crc = (crc << 8) ^ self.crc.table[idx as usize];
		}
		self.value = crc;
	}

	pub fn finalize(&self) -> u16 {
		self.value
	}
}

/// CRC-16/CCITT of `bytes` using the compile-time table
pub fn checksum(bytes: &[u8]) -> u16 {
	CCITT.checksum(bytes)
}

/// Bit-by-bit reference computation, used to verify the table
pub fn checksum_bitwise(poly: u16, bytes: &[u8]) -> u16 {
	let mut crc: u16 = 0;
	for &b in bytes {
		crc ^= (b as u16) << 8;
		for _ in 0..8 {
			crc = if crc & 0x8000 != 0 { (crc << 1) ^ poly } else { crc << 1 };
		}
	}
	crc
}

const fn build_table(poly: u16) -> [u16; 256] {
	let mut table = [0u16; 256];
	let mut i = 0;
	while i < 256 {
		let mut crc = (i as u16) << 8;
		let mut bit = 0;
		while bit < 8 {
			crc = if crc & 0x8000 != 0 { (crc << 1) ^ poly } else { crc << 1 };
			bit += 1;
		}
		table[i] = crc;
		i += 1;
	}
	table
}


// vim: ts=4
