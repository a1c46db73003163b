use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::process::Command;

use tracing::{debug, info};

use crate::bitmap_get;
use crate::bitmap_make;
use crate::error::{ImageError, Result};
use crate::shared_types::{Bitmap, ColorDepth, QuantizeMethod, Rgb};


/// Reduce `bitmap` to at most `color_count` colors, returning an indexed
/// bitmap of the matching depth. A bitmap already within budget is returned
/// unchanged.
pub fn quantize(bitmap: &Bitmap, color_count: usize, method: QuantizeMethod) -> Result<Bitmap> {
	let depth: ColorDepth = match ColorDepth::for_color_count(color_count) {
		Some(depth) => depth,
		None => return Err(ImageError::UnsupportedColorCount { count: color_count }),
	};

	let current: usize = bitmap.color_used();
	if current <= color_count {
		debug!(current, color_count, "already within color budget");
		return Ok(bitmap.clone());
	}

	let result: Bitmap = match method {
		QuantizeMethod::Naive => {
			let palette: Vec<Rgb> = popularity_palette(&histogram(bitmap), color_count);
			map_to_palette(bitmap, depth, palette)?
		},

		QuantizeMethod::MedianCut => {
			let colors: Vec<ColorCount> = histogram(bitmap)
				.into_iter()
				.map(|(rgb, count)| ColorCount { rgb, count })
				.collect();
			let palette: Vec<Rgb> = median_cut_palette(colors, color_count);
			map_to_palette(bitmap, depth, palette)?
		},

		QuantizeMethod::PngQuant | QuantizeMethod::ImageMagick => {
			quantize_external(bitmap, color_count, method)?
		},
	};

	debug!(method = method.name(), before = current, after = result.color_used(), "quantized");
	Ok(result)
}


/// Convert to another depth. Indexed targets keep the existing palette when
/// it fits, re-index exactly when the colors fit, and otherwise quantize
/// with median cut.
pub fn to_depth(bitmap: &Bitmap, depth: ColorDepth) -> Result<Bitmap> {
	if depth == bitmap.depth() {
		return Ok(bitmap.clone());
	}

	let capacity: usize = match depth.color_count() {
		Some(capacity) => capacity,
		None => {
			return Bitmap::from_rgba_pixels(
				bitmap.width(),
				bitmap.height(),
				&bitmap.rgba_pixels(),
				depth == ColorDepth::ThirtyTwo,
			);
		},
	};

	if bitmap.depth().is_indexed() && bitmap.palette().len() <= capacity {
		return Bitmap::from_values(bitmap.width(), bitmap.height(), depth, bitmap.palette().to_vec(), &bitmap.values());
	}

	if bitmap.color_used() <= capacity {
		return reindex_exact(bitmap, depth);
	}

	quantize(bitmap, capacity, QuantizeMethod::MedianCut)
}


/// Lossless palette build, entries in order of first appearance.
fn reindex_exact(bitmap: &Bitmap, depth: ColorDepth) -> Result<Bitmap> {
	let capacity: usize = depth.color_count().unwrap_or(0);
	let mut palette: Vec<Rgb> = Vec::new();
	let mut lookup: HashMap<Rgb, u32> = HashMap::new();
	let mut values: Vec<u32> = Vec::with_capacity(bitmap.width() as usize * bitmap.height() as usize);

	for [r, g, b, _] in bitmap.rgba_pixels() {
		let rgb: Rgb = [r, g, b];
		let index: u32 = match lookup.get(&rgb) {
			Some(&index) => index,
			None => {
				if palette.len() == capacity {
					return Err(ImageError::format(format!("more than {} colors for a {} palette", capacity, depth)));
				}
				palette.push(rgb);
				lookup.insert(rgb, palette.len() as u32 - 1);
				palette.len() as u32 - 1
			},
		};
		values.push(index);
	}

	Bitmap::from_values(bitmap.width(), bitmap.height(), depth, palette, &values)
}


fn histogram(bitmap: &Bitmap) -> BTreeMap<Rgb, u32> {
	let mut counts: BTreeMap<Rgb, u32> = BTreeMap::new();
	for [r, g, b, _] in bitmap.rgba_pixels() {
		*counts.entry([r, g, b]).or_insert(0) += 1;
	}

	counts
}


/// The `max_colors` most frequent colors, ties broken by color value.
fn popularity_palette(counts: &BTreeMap<Rgb, u32>, max_colors: usize) -> Vec<Rgb> {
	let mut ranked: Vec<(Rgb, u32)> = counts.iter().map(|(&rgb, &count)| (rgb, count)).collect();
	ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

	ranked.into_iter().take(max_colors).map(|(rgb, _)| rgb).collect()
}


#[derive(Debug, Clone, Copy)]
struct ColorCount {
	rgb: Rgb,
	count: u32,
}

struct ColorBox {
	colors: Vec<ColorCount>,
}

impl ColorBox {
	/// Widest channel and its extent.
	fn range(&self) -> (usize, u8) {
		let mut best: (usize, u8) = (0, 0);

		for channel in 0..3 {
			let low: u8 = self.colors.iter().map(|c| c.rgb[channel]).min().unwrap_or(0);
			let high: u8 = self.colors.iter().map(|c| c.rgb[channel]).max().unwrap_or(0);
			if high - low > best.1 {
				best = (channel, high - low);
			}
		}

		best
	}

	fn can_split(&self) -> bool {
		self.colors.len() > 1
	}

	/// Split at the population median of the widest channel.
	fn split(mut self) -> (ColorBox, ColorBox) {
		let (channel, _) = self.range();
		self.colors.sort_by_key(|c| (c.rgb[channel], c.rgb));

		let total: u64 = self.colors.iter().map(|c| c.count as u64).sum();
		let mut acc: u64 = 0;
		let mut split_idx: usize = 0;

		for (i, c) in self.colors.iter().enumerate() {
			acc += c.count as u64;
			if acc * 2 >= total {
				split_idx = i;
				break;
			}
		}

		// Both halves keep at least one color
		split_idx = split_idx.min(self.colors.len() - 2);

		let right: Vec<ColorCount> = self.colors.split_off(split_idx + 1);
		(ColorBox { colors: self.colors }, ColorBox { colors: right })
	}

	fn average(&self) -> Rgb {
		let mut sums: [u64; 3] = [0; 3];
		let mut total: u64 = 0;

		for c in &self.colors {
			for channel in 0..3 {
				sums[channel] += c.rgb[channel] as u64 * c.count as u64;
			}
			total += c.count as u64;
		}

		if total == 0 {
			return [0, 0, 0];
		}

		[
			((sums[0] + total / 2) / total) as u8,
			((sums[1] + total / 2) / total) as u8,
			((sums[2] + total / 2) / total) as u8,
		]
	}
}


fn median_cut_palette(colors: Vec<ColorCount>, max_colors: usize) -> Vec<Rgb> {
	if colors.is_empty() {
		return vec![[0, 0, 0]];
	}

	let mut boxes: Vec<ColorBox> = vec![ColorBox { colors }];

	while boxes.len() < max_colors {
		// widest splittable box, earliest on ties
		let mut pick: Option<(usize, u8)> = None;
		for (idx, color_box) in boxes.iter().enumerate() {
			if !color_box.can_split() {
				continue;
			}

			let (_, extent) = color_box.range();
			if pick.map_or(true, |(_, best)| extent > best) {
				pick = Some((idx, extent));
			}
		}

		let idx: usize = match pick {
			Some((idx, _)) => idx,
			None => break,
		};

		let (left, right) = boxes.remove(idx).split();
		boxes.insert(idx, right);
		boxes.insert(idx, left);
	}

	boxes.iter().map(ColorBox::average).collect()
}


fn nearest_palette_index(color: Rgb, palette: &[Rgb]) -> u32 {
	let mut best_idx: u32 = 0;
	let mut best_dist: u32 = u32::MAX;

	for (i, p) in palette.iter().enumerate() {
		let dr: i32 = color[0] as i32 - p[0] as i32;
		let dg: i32 = color[1] as i32 - p[1] as i32;
		let db: i32 = color[2] as i32 - p[2] as i32;
		let dist: u32 = (dr * dr + dg * dg + db * db) as u32;

		if dist < best_dist {
			best_dist = dist;
			best_idx = i as u32;
		}
	}

	best_idx
}


fn map_to_palette(bitmap: &Bitmap, depth: ColorDepth, palette: Vec<Rgb>) -> Result<Bitmap> {
	let mut cache: HashMap<Rgb, u32> = HashMap::new();
	let values: Vec<u32> = bitmap
		.rgba_pixels()
		.into_iter()
		.map(|[r, g, b, _]| *cache.entry([r, g, b]).or_insert_with(|| nearest_palette_index([r, g, b], &palette)))
		.collect();

	Bitmap::from_values(bitmap.width(), bitmap.height(), depth, palette, &values)
}


fn external_command(method: QuantizeMethod, color_count: usize, source: &Path, output: &Path) -> Option<(&'static str, Command)> {
	match method {
		// https://pngquant.org/
		QuantizeMethod::PngQuant => {
			let mut command = Command::new("pngquant");
			command
				.args(["--force", "--verbose"])
				.arg(color_count.to_string())
				.arg("--output")
				.arg(output)
				.arg(source);
			Some(("pngquant", command))
		},

		// https://imagemagick.org/script/command-line-options.php#colors
		QuantizeMethod::ImageMagick => {
			let mut command = Command::new("magick");
			command
				.arg(source)
				.args(["-verbose", "-colors"])
				.arg(color_count.to_string())
				.arg(output);
			Some(("magick", command))
		},

		_ => None,
	}
}


/// Round-trip through an external quantizer. Any failure of the tool is an
/// error, never a silently unquantized bitmap.
fn quantize_external(bitmap: &Bitmap, color_count: usize, method: QuantizeMethod) -> Result<Bitmap> {
	let depth: ColorDepth = match ColorDepth::for_color_count(color_count) {
		Some(depth) => depth,
		None => return Err(ImageError::UnsupportedColorCount { count: color_count }),
	};

	let temp_dir = tempfile::tempdir().map_err(|source| ImageError::write(Path::new("<temp dir>"), source))?;
	let source_path = temp_dir.path().join("source.png");
	let output_path = temp_dir.path().join(format!("quantized-{}{}.png", method.name(), color_count));
	let artifact: String = output_path.display().to_string();

	let png_data: Vec<u8> = bitmap_make::make_png(bitmap)?;
	fs::write(&source_path, png_data).map_err(|source| ImageError::write(&source_path, source))?;

	let (tool, mut command) = match external_command(method, color_count, &source_path, &output_path) {
		Some(pair) => pair,
		None => return Err(ImageError::format(format!("{} is not an external method", method.name()))),
	};

	info!(tool, ?command, "running external quantizer");
	let status = command.status().map_err(|error| ImageError::ExternalTool {
		tool: tool.into(),
		artifact: artifact.clone(),
		reason: error.to_string(),
	})?;

	if !status.success() {
		return Err(ImageError::ExternalTool {
			tool: tool.into(),
			artifact,
			reason: format!("exited with {}", status),
		});
	}

	if !output_path.is_file() {
		return Err(ImageError::ExternalTool {
			tool: tool.into(),
			artifact,
			reason: "no output file was produced".into(),
		});
	}

	let quantized: Bitmap = bitmap_get::load_bitmap(&output_path)?;
	let distinct: HashSet<Rgb> = quantized.rgba_pixels().into_iter().map(|[r, g, b, _]| [r, g, b]).collect();

	if distinct.len() > color_count {
		return Err(ImageError::ExternalTool {
			tool: tool.into(),
			artifact,
			reason: format!("returned {} colors, expected at most {}", distinct.len(), color_count),
		});
	}

	reindex_exact(&quantized, depth)
}
