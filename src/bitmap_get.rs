use std::fs;
use std::io::Cursor;
use std::path::Path;

use tracing::debug;

use crate::bmp_header::{self, BmpHeader, BI_RGB, BI_BITFIELDS, BI_ALPHABITFIELDS};
use crate::bit_depth;
use crate::error::{ImageError, Result};
use crate::shared_types::{stride_for, Bitmap, ColorDepth, Rgb, Rgba};

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

const BMP_COLOR_24: usize = 3;
const BMP_COLOR_32: usize = 4;


pub fn load_bitmap(source_file: &Path) -> Result<Bitmap> {
	let bytes: Vec<u8> = fs::read(source_file).map_err(|source| ImageError::read(source_file, source))?;
	debug!(path = %source_file.display(), bytes = bytes.len(), "loaded bitmap file");

	return decode(&bytes);
}


/// Decode a BMP or PNG file, chosen by magic number.
pub fn decode(bytes: &[u8]) -> Result<Bitmap> {
	if bytes.starts_with(b"BM") {
		return decode_bmp(bytes);
	}

	if bytes.starts_with(&PNG_SIGNATURE) {
		return decode_png(bytes);
	}

	return Err(ImageError::format("unrecognized file signature, expected BMP or PNG"));
}


pub fn decode_bmp(bytes: &[u8]) -> Result<Bitmap> {
	let header: BmpHeader = bmp_header::get_header(bytes)?;

	let depth: ColorDepth = match ColorDepth::from_bits(header.bit_count) {
		Some(depth) => depth,
		None => return Err(ImageError::format(format!("unsupported color depth {}", header.bit_count))),
	};

	match header.compression {
		BI_RGB => (),
		BI_BITFIELDS | BI_ALPHABITFIELDS if depth == ColorDepth::ThirtyTwo => (),
		other => return Err(ImageError::format(format!("unsupported compression {}", other))),
	}

	let width: u32 = header.width;
	let height: u32 = header.height.unsigned_abs();
	if width == 0 || height == 0 {
		return Err(ImageError::format(format!("invalid size {}x{}", header.width, header.height)));
	}

	// Color table
	let mut palette: Vec<Rgb> = Vec::new();

	if let Some(capacity) = depth.color_count() {
		let color_count: usize = match header.colors_used {
			0 => capacity,
			value => (value as usize).min(capacity),
		};

		let color_size: usize = if header.is_core_header() { BMP_COLOR_24 } else { BMP_COLOR_32 };
		let start: usize = header.palette_offset();
		let end: usize = start + color_count * color_size;

		if end > bytes.len() {
			return Err(ImageError::format("truncated color table"));
		}

		for entry in bytes[start..end].chunks_exact(color_size) {
			palette.push([entry[2], entry[1], entry[0]]);
		}
	}

	// Pixel array
	let stride: usize = stride_for(width, depth);
	let start: usize = header.pixel_offset as usize;
	let pixel_array_len: usize = stride * height as usize;

	if start.checked_add(pixel_array_len).map_or(true, |end| end > bytes.len()) {
		return Err(ImageError::format("pixel data truncated"));
	}

	let pixel_array: &[u8] = &bytes[start..start + pixel_array_len];
	let mut values: Vec<u32> = Vec::with_capacity(width as usize * height as usize);
	let mut alpha_seen: bool = false;

	for y in 0..height as usize {
		let source_row: usize = if header.top_down() { y } else { height as usize - 1 - y };
		let row: &[u8] = &pixel_array[source_row * stride..(source_row + 1) * stride];

		match depth {
			ColorDepth::TwentyFour => {
				for bgr in row[..width as usize * 3].chunks_exact(3) {
					values.push(u32::from_be_bytes([bgr[2], bgr[1], bgr[0], 0xFF]));
				}
			},

			ColorDepth::ThirtyTwo => {
				for bgra in row[..width as usize * 4].chunks_exact(4) {
					alpha_seen |= bgra[3] != 0;
					values.push(u32::from_be_bytes([bgra[2], bgra[1], bgra[0], bgra[3]]));
				}
			},

			_ => {
				for index in bit_depth::unpack_row(row, depth.bits(), width as usize) {
					values.push(index as u32);
				}
			},
		}
	}

	// Plain 32-bit files usually leave the alpha byte zeroed
	if depth == ColorDepth::ThirtyTwo && !alpha_seen {
		for value in values.iter_mut() {
			*value |= 0xFF;
		}
	}

	if depth.is_indexed() {
		// Indices past a short color table read as black
		let highest: usize = values.iter().copied().max().unwrap_or(0) as usize;
		if highest >= palette.len() {
			debug!(colors = palette.len(), highest, "padding short color table");
			palette.resize(highest + 1, [0, 0, 0]);
		}
	}

	return Bitmap::from_values(width, height, depth, palette, &values);
}


/// Decode a PNG into a direct-color bitmap: 32-bit when any pixel is not
/// fully opaque, 24-bit otherwise.
pub fn decode_png(bytes: &[u8]) -> Result<Bitmap> {
	let mut decoder = png::Decoder::new(Cursor::new(bytes));
	decoder.set_transformations(png::Transformations::normalize_to_color8());
	let mut reader = decoder.read_info()?;

	let mut buffer: Vec<u8> = vec![0; reader.output_buffer_size()];
	let frame = reader.next_frame(&mut buffer)?;

	let width: usize = frame.width as usize;
	let mut pixels: Vec<Rgba> = Vec::with_capacity(width * frame.height as usize);

	for y in 0..frame.height as usize {
		let row: &[u8] = &buffer[y * frame.line_size..(y + 1) * frame.line_size];

		match frame.color_type {
			png::ColorType::Grayscale => {
				for &gray in &row[..width] {
					pixels.push([gray, gray, gray, 0xFF]);
				}
			},

			png::ColorType::GrayscaleAlpha => {
				for pair in row[..width * 2].chunks_exact(2) {
					pixels.push([pair[0], pair[0], pair[0], pair[1]]);
				}
			},

			png::ColorType::Rgb => {
				for rgb in row[..width * 3].chunks_exact(3) {
					pixels.push([rgb[0], rgb[1], rgb[2], 0xFF]);
				}
			},

			png::ColorType::Rgba => {
				for rgba in row[..width * 4].chunks_exact(4) {
					pixels.push([rgba[0], rgba[1], rgba[2], rgba[3]]);
				}
			},

			// Expanded by normalize_to_color8
			png::ColorType::Indexed => {
				return Err(ImageError::format("PNG palette was not expanded"));
			},
		}
	}

	let keep_alpha: bool = pixels.iter().any(|pixel| pixel[3] != 0xFF);
	return Bitmap::from_rgba_pixels(frame.width, frame.height, &pixels, keep_alpha);
}


#[cfg(test)]
mod tests {
	use super::*;

	fn bmp_file(header_size: u32, bit_count: u16, width: i32, height: i32, palette: &[[u8; 4]], pixels: &[u8]) -> Vec<u8> {
		let pixel_offset: u32 = 14 + header_size + palette.len() as u32 * 4;
		let mut bytes: Vec<u8> = b"BM".to_vec();
		bytes.extend_from_slice(&(pixel_offset + pixels.len() as u32).to_le_bytes());
		bytes.extend_from_slice(&[0; 4]);
		bytes.extend_from_slice(&pixel_offset.to_le_bytes());
		bytes.extend_from_slice(&header_size.to_le_bytes());
		bytes.extend_from_slice(&width.to_le_bytes());
		bytes.extend_from_slice(&height.to_le_bytes());
		bytes.extend_from_slice(&1u16.to_le_bytes());
		bytes.extend_from_slice(&bit_count.to_le_bytes());
		bytes.extend_from_slice(&[0; 4]);
		bytes.extend_from_slice(&(pixels.len() as u32).to_le_bytes());
		bytes.extend_from_slice(&[0; 8]);
		bytes.extend_from_slice(&(palette.len() as u32).to_le_bytes());
		bytes.extend_from_slice(&[0; 4]);
		for entry in palette {
			bytes.extend_from_slice(entry);
		}
		bytes.extend_from_slice(pixels);
		bytes
	}

	#[test]
	fn decodes_bottom_up_indexed_bmp() {
		// BGRA entries: blue, red
		let palette: [[u8; 4]; 2] = [[255, 0, 0, 0], [0, 0, 255, 0]];
		// bottom row first: 0 1 / 1 0
		let pixels: [u8; 8] = [0, 1, 0, 0, 1, 0, 0, 0];
		let bitmap = decode(&bmp_file(40, 8, 2, 2, &palette, &pixels)).unwrap();

		assert_eq!(bitmap.depth(), ColorDepth::Eight);
		assert_eq!(bitmap.palette(), &[[0, 0, 255], [255, 0, 0]]);
		assert_eq!(bitmap.values(), vec![1, 0, 0, 1]);
	}

	#[test]
	fn decodes_top_down_rgb_bmp() {
		let pixels: [u8; 8] = [1, 2, 3, 0, 4, 5, 6, 0];
		let bitmap = decode(&bmp_file(40, 24, 1, -2, &[], &pixels)).unwrap();

		assert_eq!(bitmap.pixel(0, 0), [3, 2, 1, 0xFF]);
		assert_eq!(bitmap.pixel(0, 1), [6, 5, 4, 0xFF]);
	}

	#[test]
	fn zero_alpha_32_bit_bmp_is_opaque() {
		let pixels: [u8; 4] = [10, 20, 30, 0];
		let bitmap = decode(&bmp_file(40, 32, 1, 1, &[], &pixels)).unwrap();

		assert_eq!(bitmap.pixel(0, 0), [30, 20, 10, 0xFF]);
	}

	#[test]
	fn truncated_pixels_are_a_format_error() {
		let bytes: Vec<u8> = bmp_file(40, 24, 4, 4, &[], &[0; 8]);
		assert!(matches!(decode(&bytes), Err(ImageError::Format { .. })));
	}

	#[test]
	fn unsupported_depth_is_a_format_error() {
		let bytes: Vec<u8> = bmp_file(40, 16, 1, 1, &[], &[0; 4]);
		assert!(matches!(decode(&bytes), Err(ImageError::Format { .. })));
	}

	#[test]
	fn unknown_signature_is_a_format_error() {
		assert!(matches!(decode(b"GIF89a......"), Err(ImageError::Format { .. })));
	}
}
