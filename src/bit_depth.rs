use std::io::Cursor;
use bitstream_io::{BitReader, BitRead, BitWriter, BitWrite, BigEndian};


/// Pack one row of palette indices at `bits` per pixel, leftmost pixel in
/// the highest bits. The result is byte aligned but not padded to a stride.
pub fn pack_row(indices: &[u8], bits: u32) -> Vec<u8> {
	if bits == 8 {
		return indices.to_vec();
	}

	let mask: u8 = ((1u16 << bits) - 1) as u8;
	let mut packed: Vec<u8> = Vec::with_capacity((indices.len() * bits as usize + 7) / 8);
	let mut bit_writer = BitWriter::endian(&mut packed, BigEndian);

	// Writes into a Vec cannot fail
	for &index in indices {
		let _ = bit_writer.write(bits, index & mask);
	}

	let _ = bit_writer.byte_align();
	bit_writer.into_writer();

	return packed;
}


/// Inverse of `pack_row`. Missing trailing bytes read as index 0.
pub fn unpack_row(packed: &[u8], bits: u32, width: usize) -> Vec<u8> {
	if bits == 8 {
		let mut indices: Vec<u8> = packed.iter().take(width).copied().collect();
		indices.resize(width, 0);
		return indices;
	}

	let mut bit_reader = BitReader::endian(Cursor::new(packed), BigEndian);
	let mut indices: Vec<u8> = Vec::with_capacity(width);

	for _pixel in 0..width {
		match bit_reader.read::<u8>(bits) {
			Ok(index) => indices.push(index),
			_ => break,
		}
	}

	indices.resize(width, 0);
	return indices;
}


#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn packs_one_bit_rows_msb_first() {
		assert_eq!(pack_row(&[1, 0, 1, 1, 0, 0, 0, 1, 1], 1), vec![0b1011_0001, 0b1000_0000]);
	}

	#[test]
	fn unpacks_what_was_packed() {
		let indices: Vec<u8> = vec![3, 15, 0, 7, 9];
		let packed: Vec<u8> = pack_row(&indices, 4);

		assert_eq!(packed, vec![0x3F, 0x07, 0x90]);
		assert_eq!(unpack_row(&packed, 4, indices.len()), indices);
	}

	#[test]
	fn short_input_reads_as_zero() {
		assert_eq!(unpack_row(&[0xFF], 4, 4), vec![15, 15, 0, 0]);
		assert_eq!(unpack_row(&[7], 8, 3), vec![7, 0, 0]);
	}
}
