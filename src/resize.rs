use image::imageops::{self, FilterType};
use image::{RgbImage, RgbaImage};

use crate::error::{ImageError, Result};
use crate::shared_types::{Bitmap, ColorDepth, ResizeMethod, Rgba};


/// `width * percent / 100` and likewise for height, rounded to the nearest
/// pixel and never below one.
pub fn scaled_size(width: u32, height: u32, percent: u32) -> (u32, u32) {
	let scale = |length: u32| -> u32 {
		let scaled: u64 = (length as u64 * percent as u64 + 50) / 100;
		scaled.clamp(1, u32::MAX as u64) as u32
	};

	(scale(width), scale(height))
}


pub fn resize_percent(bitmap: &Bitmap, percent: u32, method: ResizeMethod) -> Result<Bitmap> {
	let (width, height) = scaled_size(bitmap.width(), bitmap.height(), percent);
	resize(bitmap, width, height, method)
}


/// Scale to `width` x `height`. Nearest maps stored pixels directly and keeps
/// the depth and palette; the interpolating kernels produce direct color.
pub fn resize(bitmap: &Bitmap, width: u32, height: u32, method: ResizeMethod) -> Result<Bitmap> {
	if width == 0 || height == 0 {
		return Err(ImageError::dimension(format!("cannot resize to {}x{}", width, height)));
	}

	let filter: FilterType = match method {
		ResizeMethod::Nearest => return resize_nearest(bitmap, width, height),
		ResizeMethod::Bilinear => FilterType::Triangle,
		ResizeMethod::Bicubic => FilterType::CatmullRom,
		ResizeMethod::Lanczos => FilterType::Lanczos3,
	};

	let keep_alpha: bool = bitmap.depth() == ColorDepth::ThirtyTwo;
	let pixels: Vec<Rgba> = bitmap.rgba_pixels();
	let failed = || ImageError::dimension(format!("pixel buffer does not match {}x{}", bitmap.width(), bitmap.height()));

	let resized: Vec<Rgba> = if keep_alpha {
		let flat: Vec<u8> = pixels.iter().flatten().copied().collect();
		let source: RgbaImage = RgbaImage::from_raw(bitmap.width(), bitmap.height(), flat).ok_or_else(failed)?;

		imageops::resize(&source, width, height, filter)
			.into_raw()
			.chunks_exact(4)
			.map(|rgba| [rgba[0], rgba[1], rgba[2], rgba[3]])
			.collect()
	}
	else {
		let flat: Vec<u8> = pixels.iter().flat_map(|p| [p[0], p[1], p[2]]).collect();
		let source: RgbImage = RgbImage::from_raw(bitmap.width(), bitmap.height(), flat).ok_or_else(failed)?;

		imageops::resize(&source, width, height, filter)
			.into_raw()
			.chunks_exact(3)
			.map(|rgb| [rgb[0], rgb[1], rgb[2], 0xFF])
			.collect()
	};

	Bitmap::from_rgba_pixels(width, height, &resized, keep_alpha)
}


fn resize_nearest(bitmap: &Bitmap, width: u32, height: u32) -> Result<Bitmap> {
	let source_width: u64 = bitmap.width() as u64;
	let source_height: u64 = bitmap.height() as u64;
	let source_values: Vec<u32> = bitmap.values();

	let mut values: Vec<u32> = Vec::with_capacity(width as usize * height as usize);

	for y in 0..height as u64 {
		let source_y: u64 = y * source_height / height as u64;
		let row_start: usize = (source_y * source_width) as usize;

		for x in 0..width as u64 {
			let source_x: u64 = x * source_width / width as u64;
			values.push(source_values[row_start + source_x as usize]);
		}
	}

	Bitmap::from_values(width, height, bitmap.depth(), bitmap.palette().to_vec(), &values)
}
