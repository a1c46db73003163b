use std::borrow::Cow;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::bmp_header::BmpHeader;
use crate::error::{ImageError, Result};
use crate::quantize;
use crate::shared_types::{Bitmap, ColorDepth};


#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum FileFormat {
	Bmp,
	Png,
}

impl FileFormat {
	pub fn from_path(path: &Path) -> Result<FileFormat> {
		let extension: String = path
			.extension()
			.map(|os_str| os_str.to_string_lossy().to_ascii_lowercase())
			.unwrap_or_default();

		match &extension as &str {
			"bmp" => Ok(FileFormat::Bmp),
			"png" => Ok(FileFormat::Png),
			_ => Err(ImageError::UnsupportedFileType { extension }),
		}
	}
}


/// Serialize `bitmap`, converting to `target_depth` first when it differs
/// from the bitmap's own depth. Reducing to an indexed depth re-quantizes
/// with the default method.
pub fn encode(bitmap: &Bitmap, target_depth: Option<ColorDepth>, format: FileFormat) -> Result<Vec<u8>> {
	let converted: Cow<'_, Bitmap> = match target_depth {
		Some(depth) if depth != bitmap.depth() => Cow::Owned(quantize::to_depth(bitmap, depth)?),
		_ => Cow::Borrowed(bitmap),
	};

	match format {
		FileFormat::Bmp => Ok(make_bmp(&converted)),
		FileFormat::Png => make_png(&converted),
	}
}


pub fn save_bitmap(bitmap: &Bitmap, target_path: &Path, target_depth: Option<ColorDepth>) -> Result<()> {
	let format: FileFormat = FileFormat::from_path(target_path)?;
	let bytes: Vec<u8> = encode(bitmap, target_depth, format)?;

	fs::write(target_path, &bytes).map_err(|source| ImageError::write(target_path, source))?;
	debug!(path = %target_path.display(), bytes = bytes.len(), "saved bitmap");

	return Ok(());
}


pub fn make_bmp(bitmap: &Bitmap) -> Vec<u8> {
	let header: BmpHeader = BmpHeader::for_bitmap(bitmap);
	let mut bmp_data: Vec<u8> = header.get_bytes();

	// Color table, BGR plus a reserved byte
	for &[r, g, b] in bitmap.palette() {
		bmp_data.extend_from_slice(&[b, g, r, 0x00]);
	}

	// Rows are already padded, write them upside-down
	for y in (0..bitmap.height()).rev() {
		bmp_data.extend_from_slice(bitmap.row_bytes(y));
	}

	return bmp_data;
}


pub fn make_png(bitmap: &Bitmap) -> Result<Vec<u8>> {
	let width: usize = bitmap.width() as usize;
	let mut image_data: Vec<u8> = Vec::with_capacity(bitmap.data().len());

	for y in 0..bitmap.height() {
		let row: &[u8] = bitmap.row_bytes(y);

		match bitmap.depth() {
			ColorDepth::TwentyFour => {
				for bgr in row[..width * 3].chunks_exact(3) {
					image_data.extend_from_slice(&[bgr[2], bgr[1], bgr[0]]);
				}
			},

			ColorDepth::ThirtyTwo => {
				for bgra in row[..width * 4].chunks_exact(4) {
					image_data.extend_from_slice(&[bgra[2], bgra[1], bgra[0], bgra[3]]);
				}
			},

			// PNG packs indices the same way, minus the row padding
			depth => {
				let byte_width: usize = (width * depth.bits() as usize + 7) / 8;
				image_data.extend_from_slice(&row[..byte_width]);
			},
		}
	}

	let mut png_data: Vec<u8> = Vec::new();
	{
		let mut encoder = png::Encoder::new(&mut png_data, bitmap.width(), bitmap.height());

		match bitmap.depth() {
			ColorDepth::TwentyFour => {
				encoder.set_color(png::ColorType::Rgb);
				encoder.set_depth(png::BitDepth::Eight);
			},

			ColorDepth::ThirtyTwo => {
				encoder.set_color(png::ColorType::Rgba);
				encoder.set_depth(png::BitDepth::Eight);
			},

			depth => {
				encoder.set_color(png::ColorType::Indexed);
				encoder.set_depth(match depth {
					ColorDepth::One => png::BitDepth::One,
					ColorDepth::Four => png::BitDepth::Four,
					_ => png::BitDepth::Eight,
				});

				let rgb_palette: Vec<u8> = bitmap.palette().iter().flatten().copied().collect();
				encoder.set_palette(rgb_palette);
			},
		}

		let mut writer = encoder.write_header()?;
		writer.write_image_data(&image_data)?;
		writer.finish()?;
	}

	return Ok(png_data);
}
