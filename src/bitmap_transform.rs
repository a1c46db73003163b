use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ImageError, Result};
use crate::quantize;
use crate::shared_types::{Axis, Bitmap, ColorDepth};

static SPLIT_DIM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)(?:x(\d+))?").expect("valid split dims pattern"));


/// Parse the split size list: whitespace separated tokens, each `size` or
/// `sizexcount`. Parsing stops at the first token that does not start with
/// a number, and once the sizes cover more than `extent` pixels; the size
/// that crosses `extent` is kept so `split` still rejects the list.
pub fn parse_split_dims(text: &str, extent: u32) -> Vec<u32> {
	let mut dims: Vec<u32> = Vec::new();
	let mut total: u64 = 0;

	for token in text.split_whitespace() {
		let captures = match SPLIT_DIM.captures(token) {
			Some(captures) => captures,
			None => break,
		};

		let size: u32 = match captures[1].parse() {
			Ok(size) => size,
			_ => break,
		};

		let count: u64 = match captures.get(2).map(|count| count.as_str().parse::<u64>()) {
			Some(Ok(count)) => count,
			Some(_) => break,
			None => 1,
		};

		// zero sizes are invalid, one is enough for the error
		let room: u64 = match size {
			0 => 1,
			_ => (extent as u64).saturating_sub(total) / size as u64 + 1,
		};
		let taken: u64 = count.min(room);

		dims.extend(std::iter::repeat(size).take(taken as usize));
		total += size as u64 * taken;

		if total > extent as u64 {
			break;
		}
	}

	return dims;
}


pub fn flip(axis: Axis, bitmap: &Bitmap) -> Result<Bitmap> {
	let width: usize = bitmap.width() as usize;
	let mut values: Vec<u32> = Vec::with_capacity(width * bitmap.height() as usize);

	match axis {
		Axis::Horizontal => {
			for y in 0..bitmap.height() {
				let mut row: Vec<u32> = bitmap.row_values(y);
				row.reverse();
				values.extend(row);
			}
		},

		Axis::Vertical => {
			for y in (0..bitmap.height()).rev() {
				values.extend(bitmap.row_values(y));
			}
		},
	}

	return Bitmap::from_values(bitmap.width(), bitmap.height(), bitmap.depth(), bitmap.palette().to_vec(), &values);
}


/// Default tile sizes: square tiles along the strip's short side.
fn square_tiles(extent: u32, tile: u32) -> Result<Vec<u32>> {
	if tile > extent || extent % tile != 0 {
		return Err(ImageError::dimension(format!(
			"{} pixels do not divide into square tiles of {}",
			extent, tile
		)));
	}

	return Ok(vec![tile; (extent / tile) as usize]);
}


/// Cut `bitmap` into tiles along `axis`. Horizontal cuts columns (tiles side
/// by side), vertical cuts rows.
pub fn split(bitmap: &Bitmap, axis: Axis, dims: Option<&[u32]>) -> Result<Vec<Bitmap>> {
	let extent: u32 = match axis {
		Axis::Horizontal => bitmap.width(),
		Axis::Vertical => bitmap.height(),
	};

	let sizes: Vec<u32> = match dims {
		Some(dims) => {
			if dims.is_empty() || dims.contains(&0) {
				return Err(ImageError::dimension(format!("invalid split sizes {:?}", dims)));
			}

			let total: u64 = dims.iter().map(|&size| size as u64).sum();
			if total > extent as u64 {
				return Err(ImageError::dimension(format!(
					"split sizes add up to {} but the bitmap is {} pixels along the axis",
					total, extent
				)));
			}

			dims.to_vec()
		},

		None => match axis {
			Axis::Horizontal => square_tiles(bitmap.width(), bitmap.height())?,
			Axis::Vertical => square_tiles(bitmap.height(), bitmap.width())?,
		},
	};

	let values: Vec<u32> = bitmap.values();
	let width: usize = bitmap.width() as usize;
	let mut tiles: Vec<Bitmap> = Vec::with_capacity(sizes.len());
	let mut offset: usize = 0;

	for size in sizes {
		let size_usize: usize = size as usize;
		let tile: Bitmap = match axis {
			Axis::Horizontal => {
				let tile_values: Vec<u32> = values
					.chunks(width)
					.flat_map(|row| row[offset..offset + size_usize].iter().copied())
					.collect();
				Bitmap::from_values(size, bitmap.height(), bitmap.depth(), bitmap.palette().to_vec(), &tile_values)?
			},

			Axis::Vertical => {
				let tile_values: &[u32] = &values[offset * width..(offset + size_usize) * width];
				Bitmap::from_values(bitmap.width(), size, bitmap.depth(), bitmap.palette().to_vec(), tile_values)?
			},
		};

		tiles.push(tile);
		offset += size_usize;
	}

	return Ok(tiles);
}


/// Depth the concatenation is built in. Indexed inputs sharing
/// depth and palette stay indexed; anything else becomes direct color.
fn common_depth(bitmaps: &[Bitmap]) -> ColorDepth {
	let first: &Bitmap = &bitmaps[0];
	let shared_palette: bool = bitmaps
		.iter()
		.all(|bitmap| bitmap.depth() == first.depth() && bitmap.palette() == first.palette());

	if first.depth().is_indexed() && shared_palette {
		return first.depth();
	}

	if bitmaps.iter().any(|bitmap| bitmap.depth() == ColorDepth::ThirtyTwo) {
		return ColorDepth::ThirtyTwo;
	}

	return ColorDepth::TwentyFour;
}


/// Join bitmaps along `axis`. Every input must have the same extent across
/// the axis (height for horizontal, width for vertical); nothing is padded.
pub fn concat(axis: Axis, bitmaps: &[Bitmap]) -> Result<Bitmap> {
	if bitmaps.is_empty() {
		return Err(ImageError::dimension("nothing to concatenate"));
	}

	let cross: u32 = match axis {
		Axis::Horizontal => bitmaps[0].height(),
		Axis::Vertical => bitmaps[0].width(),
	};

	for (index, bitmap) in bitmaps.iter().enumerate() {
		let extent: u32 = match axis {
			Axis::Horizontal => bitmap.height(),
			Axis::Vertical => bitmap.width(),
		};

		if extent != cross {
			return Err(ImageError::dimension(format!(
				"bitmap {} is {}x{}, expected {} {}",
				index,
				bitmap.width(),
				bitmap.height(),
				match axis { Axis::Horizontal => "height", Axis::Vertical => "width" },
				cross
			)));
		}
	}

	let depth: ColorDepth = common_depth(bitmaps);
	let mut unified: Vec<Bitmap> = Vec::with_capacity(bitmaps.len());
	for bitmap in bitmaps {
		unified.push(quantize::to_depth(bitmap, depth)?);
	}

	let palette = unified[0].palette().to_vec();
	let (width, height) = match axis {
		Axis::Horizontal => (unified.iter().map(Bitmap::width).sum::<u32>(), cross),
		Axis::Vertical => (cross, unified.iter().map(Bitmap::height).sum::<u32>()),
	};

	let mut values: Vec<u32> = Vec::with_capacity(width as usize * height as usize);

	match axis {
		Axis::Horizontal => {
			for y in 0..height {
				for bitmap in &unified {
					values.extend(bitmap.row_values(y));
				}
			}
		},

		Axis::Vertical => {
			for bitmap in &unified {
				values.extend(bitmap.values());
			}
		},
	}

	return Bitmap::from_values(width, height, depth, palette, &values);
}
