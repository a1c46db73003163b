use std::fmt;
use bmp_rust::bmp::{BMP, BITMAPFILEHEADER, DIBHEADER};

use crate::error::{ImageError, Result};
use crate::shared_types::{Bitmap, ColorDepth};

pub const FILE_HEADER_SIZE: usize = 14;
pub const CORE_HEADER_SIZE: usize = 12;
pub const INFO_HEADER_SIZE: usize = 40;

pub const BI_RGB: u32 = 0;
pub const BI_BITFIELDS: u32 = 3;
pub const BI_ALPHABITFIELDS: u32 = 6;

// 96 DPI
const PIXELS_PER_METER: i32 = 3780;


/// BITMAPFILEHEADER plus the fields of the DIB header this tool uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BmpHeader {
	pub file_size: u32,
	pub pixel_offset: u32,
	pub header_size: u32,
	pub width: u32,
	pub height: i32,
	pub bit_count: u16,
	pub compression: u32,
	pub image_size: u32,
	pub x_pixels_per_meter: i32,
	pub y_pixels_per_meter: i32,
	pub colors_used: u32,
}

impl BmpHeader {
	/// Header for writing `bitmap` as a bottom-up BITMAPINFOHEADER file.
	pub fn for_bitmap(bitmap: &Bitmap) -> BmpHeader {
		let palette_size: u32 = bitmap.palette().len() as u32 * 4;
		let pixel_offset: u32 = (FILE_HEADER_SIZE + INFO_HEADER_SIZE) as u32 + palette_size;
		let image_size: u32 = bitmap.data().len() as u32;

		return BmpHeader {
			file_size: pixel_offset + image_size,
			pixel_offset,
			header_size: INFO_HEADER_SIZE as u32,
			width: bitmap.width(),
			height: bitmap.height() as i32,
			bit_count: bitmap.depth().bits() as u16,
			compression: BI_RGB,
			image_size,
			x_pixels_per_meter: PIXELS_PER_METER,
			y_pixels_per_meter: PIXELS_PER_METER,
			colors_used: bitmap.palette().len() as u32,
		};
	}

	pub fn is_core_header(&self) -> bool {
		return self.header_size as usize == CORE_HEADER_SIZE;
	}

	pub fn top_down(&self) -> bool {
		return self.height < 0;
	}

	/// Offset of the color table, past any bitfield masks.
	pub fn palette_offset(&self) -> usize {
		let mut offset: usize = FILE_HEADER_SIZE + self.header_size as usize;

		// Masks follow a plain BITMAPINFOHEADER only; V4/V5 embed them
		if self.header_size as usize == INFO_HEADER_SIZE {
			match self.compression {
				BI_BITFIELDS => offset += 12,
				BI_ALPHABITFIELDS => offset += 16,
				_ => (),
			}
		}

		return offset;
	}

	pub fn get_bytes(&self) -> Vec<u8> {
		let mut bytes: Vec<u8> = Vec::with_capacity(FILE_HEADER_SIZE + INFO_HEADER_SIZE);

		// BITMAPFILEHEADER
		bytes.extend_from_slice(b"BM");
		bytes.extend_from_slice(&self.file_size.to_le_bytes());
		bytes.extend_from_slice(&[0x00; 4]);
		bytes.extend_from_slice(&self.pixel_offset.to_le_bytes());

		// BITMAPINFOHEADER
		bytes.extend_from_slice(&(INFO_HEADER_SIZE as u32).to_le_bytes());
		bytes.extend_from_slice(&(self.width as i32).to_le_bytes());
		bytes.extend_from_slice(&self.height.to_le_bytes());
		bytes.extend_from_slice(&1u16.to_le_bytes());
		bytes.extend_from_slice(&self.bit_count.to_le_bytes());
		bytes.extend_from_slice(&self.compression.to_le_bytes());
		bytes.extend_from_slice(&self.image_size.to_le_bytes());
		bytes.extend_from_slice(&self.x_pixels_per_meter.to_le_bytes());
		bytes.extend_from_slice(&self.y_pixels_per_meter.to_le_bytes());
		bytes.extend_from_slice(&self.colors_used.to_le_bytes());

		// biClrImportant, all colors
		bytes.extend_from_slice(&[0x00; 4]);

		return bytes;
	}
}

impl fmt::Display for BmpHeader {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(f, "file size: {}, pixel offset: {}", self.file_size, self.pixel_offset)?;
		writeln!(f, "header size: {}, size: {}x{}, bit count: {}", self.header_size, self.width, self.height, self.bit_count)?;
		return write!(
			f,
			"compression: {}, image size: {}, resolution: {}x{}, colors used: {}",
			self.compression, self.image_size, self.x_pixels_per_meter, self.y_pixels_per_meter, self.colors_used
		);
	}
}


fn u32_at(bytes: &[u8], offset: usize) -> u32 {
	return u32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]]);
}

fn i32_at(bytes: &[u8], offset: usize) -> i32 {
	return i32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]]);
}


/// Parse the file and DIB headers of a BMP file.
pub fn get_header(bytes: &[u8]) -> Result<BmpHeader> {
	if bytes.len() < FILE_HEADER_SIZE + 4 || &bytes[0..2] != b"BM" {
		return Err(ImageError::format("missing BMP file header"));
	}

	// bmp_rust indexes without bounds checks, so the DIB header must be complete
	let header_size: usize = u32_at(bytes, FILE_HEADER_SIZE) as usize;
	if header_size != CORE_HEADER_SIZE && header_size < INFO_HEADER_SIZE {
		return Err(ImageError::format(format!("unknown DIB header size {}", header_size)));
	}

	if bytes.len() < FILE_HEADER_SIZE + header_size {
		return Err(ImageError::format("truncated DIB header"));
	}

	let mut bmp: BMP = BMP::new(1i32, 1u32, Some([0u8, 0u8, 0u8, 0u8]));
	bmp.contents = bytes.to_vec();

	let file_header: BITMAPFILEHEADER = BMP::get_header(&bmp);

	let dib_header: DIBHEADER;
	match BMP::get_dib_header(&bmp) {
		Ok(header) => dib_header = header,
		_ => return Err(ImageError::format("could not read DIB header")),
	}

	// Fields bmp_rust leaves out or stringifies are read directly
	let compression: u32;
	let image_size: u32;
	let x_pixels_per_meter: i32;
	let y_pixels_per_meter: i32;
	let colors_used: u32;

	if header_size >= INFO_HEADER_SIZE {
		compression = u32_at(bytes, FILE_HEADER_SIZE + 16);
		image_size = u32_at(bytes, FILE_HEADER_SIZE + 20);
		x_pixels_per_meter = i32_at(bytes, FILE_HEADER_SIZE + 24);
		y_pixels_per_meter = i32_at(bytes, FILE_HEADER_SIZE + 28);
		colors_used = u32_at(bytes, FILE_HEADER_SIZE + 32);
	}
	else {
		compression = BI_RGB;
		image_size = 0;
		x_pixels_per_meter = 0;
		y_pixels_per_meter = 0;
		colors_used = 0;
	}

	return Ok(BmpHeader {
		file_size: u32_at(bytes, 2),
		pixel_offset: file_header.bfOffBits as u32,
		header_size: dib_header.size as u32,
		width: dib_header.width as u32,
		height: dib_header.height as i32,
		bit_count: dib_header.bitcount as u16,
		compression,
		image_size,
		x_pixels_per_meter,
		y_pixels_per_meter,
		colors_used,
	});
}


#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn written_header_reads_back() {
		let bitmap = Bitmap::new(3, 2, ColorDepth::Eight, vec![[1, 2, 3], [4, 5, 6]]).unwrap();
		let header: BmpHeader = BmpHeader::for_bitmap(&bitmap);

		let mut bytes: Vec<u8> = header.get_bytes();
		assert_eq!(bytes.len(), FILE_HEADER_SIZE + INFO_HEADER_SIZE);
		bytes.resize(header.file_size as usize, 0);

		let parsed: BmpHeader = get_header(&bytes).unwrap();
		assert_eq!(parsed, header);
		assert_eq!(parsed.pixel_offset, 14 + 40 + 8);
		assert_eq!(parsed.palette_offset(), 54);
	}

	#[test]
	fn rejects_other_magic() {
		assert!(get_header(b"PK\x03\x04 not a bitmap at all").is_err());
	}

	#[test]
	fn rejects_truncated_dib_header() {
		let mut bytes: Vec<u8> = b"BM".to_vec();
		bytes.extend_from_slice(&[0; 12]);
		bytes.extend_from_slice(&40u32.to_le_bytes());
		bytes.extend_from_slice(&[0; 8]);

		assert!(matches!(get_header(&bytes), Err(ImageError::Format { .. })));
	}
}
