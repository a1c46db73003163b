use std::collections::HashSet;
use std::fmt;

use clap::ValueEnum;

use crate::bit_depth;
use crate::error::{ImageError, Result};

pub type Rgb = [u8; 3];
pub type Rgba = [u8; 4];

#[derive(Debug, PartialEq, Eq, Copy, Clone, Hash)]
pub enum ColorDepth {
	One,
	Four,
	Eight,
	TwentyFour,
	ThirtyTwo,
}

impl ColorDepth {
	pub fn from_bits(bits: u16) -> Option<ColorDepth> {
		match bits {
			1 => Some(ColorDepth::One),
			4 => Some(ColorDepth::Four),
			8 => Some(ColorDepth::Eight),
			24 => Some(ColorDepth::TwentyFour),
			32 => Some(ColorDepth::ThirtyTwo),
			_ => None,
		}
	}

	pub fn for_color_count(count: usize) -> Option<ColorDepth> {
		match count {
			2 => Some(ColorDepth::One),
			16 => Some(ColorDepth::Four),
			256 => Some(ColorDepth::Eight),
			_ => None,
		}
	}

	pub fn bits(self) -> u32 {
		match self {
			ColorDepth::One => 1,
			ColorDepth::Four => 4,
			ColorDepth::Eight => 8,
			ColorDepth::TwentyFour => 24,
			ColorDepth::ThirtyTwo => 32,
		}
	}

	pub fn is_indexed(self) -> bool {
		return self.bits() <= 8;
	}

	/// Palette capacity for indexed depths.
	pub fn color_count(self) -> Option<usize> {
		if self.is_indexed() {
			return Some(1usize << self.bits());
		}

		return None;
	}
}

impl fmt::Display for ColorDepth {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		return write!(f, "{}-bit", self.bits());
	}
}


#[derive(Debug, PartialEq, Eq, Copy, Clone, ValueEnum)]
pub enum Axis {
	Horizontal,
	Vertical,
}


#[derive(Debug, PartialEq, Eq, Copy, Clone, ValueEnum)]
pub enum QuantizeMethod {
	/// Keep the most frequent colors
	Naive,
	/// Median-cut color boxes
	MedianCut,
	/// Delegate to the external `pngquant` tool
	PngQuant,
	/// Delegate to the external ImageMagick `magick` tool
	ImageMagick,
}

impl QuantizeMethod {
	pub fn name(self) -> &'static str {
		match self {
			QuantizeMethod::Naive => "Naive",
			QuantizeMethod::MedianCut => "MedianCut",
			QuantizeMethod::PngQuant => "PngQuant",
			QuantizeMethod::ImageMagick => "ImageMagick",
		}
	}

	pub fn is_external(self) -> bool {
		return matches!(self, QuantizeMethod::PngQuant | QuantizeMethod::ImageMagick);
	}
}


#[derive(Debug, PartialEq, Eq, Copy, Clone, ValueEnum)]
pub enum ResizeMethod {
	Nearest,
	Bilinear,
	Bicubic,
	Lanczos,
}

impl ResizeMethod {
	pub fn name(self) -> &'static str {
		match self {
			ResizeMethod::Nearest => "Nearest",
			ResizeMethod::Bilinear => "Bilinear",
			ResizeMethod::Bicubic => "Bicubic",
			ResizeMethod::Lanczos => "Lanczos",
		}
	}
}


/// In-memory raster image.
///
/// Rows are stored top-down, each padded to a multiple of 4 bytes, so
/// `data.len() == height * stride` always holds. Indexed depths pack pixels
/// most significant bits first; 24 and 32-bit rows hold BGR and BGRA bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
	width: u32,
	height: u32,
	depth: ColorDepth,
	palette: Vec<Rgb>,
	data: Vec<u8>,
}

pub fn stride_for(width: u32, depth: ColorDepth) -> usize {
	return ((depth.bits() as usize * width as usize + 31) / 32) * 4;
}

fn validate_layout(width: u32, height: u32, depth: ColorDepth, palette: &[Rgb]) -> Result<()> {
	if width == 0 || height == 0 {
		return Err(ImageError::dimension(format!("empty bitmap {}x{}", width, height)));
	}

	match depth.color_count() {
		Some(capacity) => {
			if palette.is_empty() || palette.len() > capacity {
				return Err(ImageError::format(format!(
					"{} bitmap needs 1 to {} palette entries, got {}",
					depth, capacity, palette.len()
				)));
			}
		},

		None => {
			if !palette.is_empty() {
				return Err(ImageError::format(format!("{} bitmap cannot carry a palette", depth)));
			}
		},
	}

	return Ok(());
}

fn rgba_value(color: Rgba) -> u32 {
	return u32::from_be_bytes(color);
}

fn value_rgba(value: u32) -> Rgba {
	return value.to_be_bytes();
}

impl Bitmap {
	/// Blank bitmap, every pixel set to palette index 0 or transparent black.
	pub fn new(width: u32, height: u32, depth: ColorDepth, palette: Vec<Rgb>) -> Result<Bitmap> {
		validate_layout(width, height, depth, &palette)?;
		let data: Vec<u8> = vec![0; height as usize * stride_for(width, depth)];

		return Ok(Bitmap { width, height, depth, palette, data });
	}

	pub fn from_raw(width: u32, height: u32, depth: ColorDepth, palette: Vec<Rgb>, data: Vec<u8>) -> Result<Bitmap> {
		validate_layout(width, height, depth, &palette)?;

		let expected: usize = height as usize * stride_for(width, depth);
		if data.len() != expected {
			return Err(ImageError::format(format!(
				"pixel buffer holds {} bytes, {}x{} {} needs {}",
				data.len(), width, height, depth, expected
			)));
		}

		return Ok(Bitmap { width, height, depth, palette, data });
	}

	/// Build from one value per pixel, row-major: palette indices for indexed
	/// depths, `0xRRGGBBAA` words for direct depths.
	pub fn from_values(width: u32, height: u32, depth: ColorDepth, palette: Vec<Rgb>, values: &[u32]) -> Result<Bitmap> {
		validate_layout(width, height, depth, &palette)?;

		let pixel_count: usize = width as usize * height as usize;
		if values.len() != pixel_count {
			return Err(ImageError::dimension(format!(
				"{} pixel values for a {}x{} bitmap",
				values.len(), width, height
			)));
		}

		let stride: usize = stride_for(width, depth);
		let mut data: Vec<u8> = Vec::with_capacity(stride * height as usize);

		for row in values.chunks(width as usize) {
			let row_start: usize = data.len();

			match depth {
				ColorDepth::TwentyFour => {
					for &value in row {
						let [r, g, b, _] = value_rgba(value);
						data.extend_from_slice(&[b, g, r]);
					}
				},

				ColorDepth::ThirtyTwo => {
					for &value in row {
						let [r, g, b, a] = value_rgba(value);
						data.extend_from_slice(&[b, g, r, a]);
					}
				},

				_ => {
					let mut indices: Vec<u8> = Vec::with_capacity(row.len());
					for &value in row {
						if value as usize >= palette.len() {
							return Err(ImageError::format(format!(
								"pixel index {} outside palette of {} colors",
								value, palette.len()
							)));
						}
						indices.push(value as u8);
					}
					data.extend_from_slice(&bit_depth::pack_row(&indices, depth.bits()));
				},
			}

			data.resize(row_start + stride, 0);
		}

		return Ok(Bitmap { width, height, depth, palette, data });
	}

	/// Direct-color bitmap from RGBA pixels. Alpha is dropped unless
	/// `keep_alpha` selects the 32-bit layout.
	pub fn from_rgba_pixels(width: u32, height: u32, pixels: &[Rgba], keep_alpha: bool) -> Result<Bitmap> {
		let depth: ColorDepth = if keep_alpha { ColorDepth::ThirtyTwo } else { ColorDepth::TwentyFour };
		let values: Vec<u32> = pixels.iter().map(|&color| rgba_value(color)).collect();

		return Bitmap::from_values(width, height, depth, Vec::new(), &values);
	}

	pub fn width(&self) -> u32 {
		return self.width;
	}

	pub fn height(&self) -> u32 {
		return self.height;
	}

	pub fn size(&self) -> (u32, u32) {
		return (self.width, self.height);
	}

	pub fn depth(&self) -> ColorDepth {
		return self.depth;
	}

	pub fn palette(&self) -> &[Rgb] {
		return &self.palette;
	}

	pub fn data(&self) -> &[u8] {
		return &self.data;
	}

	pub fn stride(&self) -> usize {
		return stride_for(self.width, self.depth);
	}

	pub fn row_bytes(&self, y: u32) -> &[u8] {
		let stride: usize = self.stride();
		let start: usize = y as usize * stride;
		return &self.data[start..start + stride];
	}

	/// Per-pixel values of one row, in the encoding `from_values` accepts.
	pub fn row_values(&self, y: u32) -> Vec<u32> {
		let row: &[u8] = self.row_bytes(y);
		let width: usize = self.width as usize;

		match self.depth {
			ColorDepth::TwentyFour => row[..width * 3]
				.chunks_exact(3)
				.map(|bgr| rgba_value([bgr[2], bgr[1], bgr[0], 0xFF]))
				.collect(),

			ColorDepth::ThirtyTwo => row[..width * 4]
				.chunks_exact(4)
				.map(|bgra| rgba_value([bgra[2], bgra[1], bgra[0], bgra[3]]))
				.collect(),

			_ => bit_depth::unpack_row(row, self.depth.bits(), width)
				.into_iter()
				.map(u32::from)
				.collect(),
		}
	}

	pub fn values(&self) -> Vec<u32> {
		let mut values: Vec<u32> = Vec::with_capacity(self.width as usize * self.height as usize);
		for y in 0..self.height {
			values.extend(self.row_values(y));
		}

		return values;
	}

	/// Resolved color of every pixel, row-major. Indexed and 24-bit pixels
	/// are opaque.
	pub fn rgba_pixels(&self) -> Vec<Rgba> {
		let values: Vec<u32> = self.values();

		if !self.depth.is_indexed() {
			return values.into_iter().map(value_rgba).collect();
		}

		return values
			.into_iter()
			.map(|index| match self.palette.get(index as usize) {
				Some(&[r, g, b]) => [r, g, b, 0xFF],
				None => [0, 0, 0, 0xFF],
			})
			.collect();
	}

	pub fn pixel(&self, x: u32, y: u32) -> Rgba {
		let value: u32 = self.row_values(y)[x as usize];

		if self.depth.is_indexed() {
			let [r, g, b] = self.palette.get(value as usize).copied().unwrap_or([0, 0, 0]);
			return [r, g, b, 0xFF];
		}

		return value_rgba(value);
	}

	/// Number of distinct colors present in the pixel data. Unreferenced
	/// palette entries do not count.
	pub fn color_used(&self) -> usize {
		let colors: HashSet<Rgba> = self.rgba_pixels().into_iter().collect();
		return colors.len();
	}
}


#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn stride_is_padded_to_four_bytes() {
		assert_eq!(stride_for(1, ColorDepth::One), 4);
		assert_eq!(stride_for(33, ColorDepth::One), 8);
		assert_eq!(stride_for(9, ColorDepth::Four), 8);
		assert_eq!(stride_for(5, ColorDepth::Eight), 8);
		assert_eq!(stride_for(3, ColorDepth::TwentyFour), 12);
		assert_eq!(stride_for(5, ColorDepth::TwentyFour), 16);
		assert_eq!(stride_for(3, ColorDepth::ThirtyTwo), 12);
	}

	#[test]
	fn buffer_length_matches_height_times_stride() {
		let palette: Vec<Rgb> = vec![[0, 0, 0], [255, 255, 255]];
		let values: Vec<u32> = (0..7 * 3).map(|i| i % 2).collect();
		let bitmap = Bitmap::from_values(7, 3, ColorDepth::One, palette, &values).unwrap();

		assert_eq!(bitmap.data().len(), 3 * bitmap.stride());
		assert_eq!(bitmap.values(), values);
	}

	#[test]
	fn four_bit_pixels_pack_high_nibble_first() {
		let palette: Vec<Rgb> = (0..16).map(|i| [i as u8; 3]).collect();
		let bitmap = Bitmap::from_values(3, 1, ColorDepth::Four, palette, &[1, 2, 3]).unwrap();

		assert_eq!(&bitmap.data()[..2], &[0x12, 0x30]);
	}

	#[test]
	fn direct_pixels_are_stored_bgr() {
		let bitmap = Bitmap::from_rgba_pixels(1, 1, &[[10, 20, 30, 40]], false).unwrap();

		assert_eq!(&bitmap.data()[..3], &[30, 20, 10]);
		assert_eq!(bitmap.pixel(0, 0), [10, 20, 30, 0xFF]);
	}

	#[test]
	fn index_outside_palette_is_rejected() {
		let palette: Vec<Rgb> = vec![[0, 0, 0], [1, 1, 1]];
		let result = Bitmap::from_values(2, 1, ColorDepth::Four, palette, &[0, 5]);

		assert!(matches!(result, Err(ImageError::Format { .. })));
	}

	#[test]
	fn direct_depth_rejects_palette() {
		let result = Bitmap::new(2, 2, ColorDepth::TwentyFour, vec![[0, 0, 0]]);
		assert!(result.is_err());
	}

	#[test]
	fn color_used_ignores_unreferenced_palette_entries() {
		let palette: Vec<Rgb> = vec![[0, 0, 0], [255, 0, 0], [0, 255, 0], [0, 0, 0]];
		let bitmap = Bitmap::from_values(4, 1, ColorDepth::Four, palette, &[0, 1, 3, 1]).unwrap();

		// entries 0 and 3 are the same color
		assert_eq!(bitmap.color_used(), 2);
	}
}
