//! File-level commands and the fixed toolbar recipes built on top of the
//! bitmap primitives.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::bitmap_get::load_bitmap;
use crate::bitmap_make::save_bitmap;
use crate::bitmap_transform;
use crate::bmp_header::{self, BmpHeader};
use crate::error::{ImageError, Result};
use crate::quantize;
use crate::resize;
use crate::shared_types::{Axis, Bitmap, ColorDepth, QuantizeMethod, ResizeMethod};

/// Icon sizes every toolbar is generated for.
pub const STANDARD_SIZES: [u32; 5] = [16, 24, 32, 40, 48];

const NOTEPAD2_TOOLBAR: [&str; 26] = [
	"New",          // IDT_FILE_NEW
	"Open",         // IDT_FILE_OPEN
	"Browse",       // IDT_FILE_BROWSE
	"Save",         // IDT_FILE_SAVE
	"Undo",         // IDT_EDIT_UNDO
	"Redo",         // IDT_EDIT_REDO
	"Cut",          // IDT_EDIT_CUT
	"Copy",         // IDT_EDIT_COPY
	"Paste",        // IDT_EDIT_PASTE
	"Find",         // IDT_EDIT_FIND
	"Replace",      // IDT_EDIT_REPLACE
	"WordWrap",     // IDT_VIEW_WORDWRAP
	"ZoomIn",       // IDT_VIEW_ZOOMIN
	"ZoomOut",      // IDT_VIEW_ZOOMOUT
	"Scheme",       // IDT_VIEW_SCHEME
	"SchemeConfig", // IDT_VIEW_SCHEMECONFIG
	"Exit",         // IDT_FILE_EXIT
	"SaveAs",       // IDT_FILE_SAVEAS
	"SaveCopy",     // IDT_FILE_SAVECOPY
	"Delete",       // IDT_EDIT_DELETE
	"Print",        // IDT_FILE_PRINT
	"OpenFav",      // IDT_FILE_OPENFAV
	"AddToFav",     // IDT_FILE_ADDTOFAV
	"ToggleFolds",  // IDT_VIEW_TOGGLEFOLDS
	"Launch",       // IDT_FILE_LAUNCH
	"AlwaysOnTop",  // IDT_VIEW_ALWAYSONTOP
];

#[derive(Debug, Clone, Copy)]
enum IconSet {
	Metapath,
	Common,
}

const METAPATH_TOOLBAR: [(IconSet, &str); 15] = [
	(IconSet::Metapath, "Back"),             // IDT_HISTORY_BACK
	(IconSet::Metapath, "Forward"),          // IDT_HISTORY_FORWARD
	(IconSet::Metapath, "UpperDirectory"),   // IDT_UP_DIR
	(IconSet::Metapath, "RootDirectory"),    // IDT_ROOT_DIR
	(IconSet::Common, "OpenFav"),            // IDT_VIEW_FAVORITES
	(IconSet::Metapath, "PreviousFile"),     // IDT_FILE_PREV
	(IconSet::Metapath, "NextFile"),         // IDT_FILE_NEXT
	(IconSet::Common, "Launch"),             // IDT_FILE_RUN
	(IconSet::Metapath, "Quickview"),        // IDT_FILE_QUICKVIEW
	(IconSet::Common, "SaveAs"),             // IDT_FILE_SAVEAS
	(IconSet::Common, "Copy"),               // IDT_FILE_COPYMOVE
	(IconSet::Metapath, "DeleteRecycleBin"), // IDT_FILE_DELETE_RECYCLE
	(IconSet::Common, "Delete"),             // IDT_FILE_DELETE_PERM
	(IconSet::Metapath, "DeleteFilter"),     // IDT_VIEW_FILTER TB_DEL_FILTER_BMP
	(IconSet::Metapath, "Filter"),           // IDT_VIEW_FILTER TB_ADD_FILTER_BMP
];


fn file_stem(path: &Path) -> String {
	path.file_stem().map(|stem| stem.to_string_lossy().into_owned()).unwrap_or_default()
}

/// Extension including the leading dot, or an empty string.
fn dotted_extension(path: &Path) -> String {
	path.extension().map(|ext| format!(".{}", ext.to_string_lossy())).unwrap_or_default()
}

fn sibling(path: &Path, name: String) -> PathBuf {
	match path.parent() {
		Some(parent) => parent.join(name),
		None => PathBuf::from(name),
	}
}

fn axis_name(axis: Axis) -> &'static str {
	match axis {
		Axis::Horizontal => "horizontal",
		Axis::Vertical => "vertical",
	}
}


/// Load, optionally quantize to the color count of `depth`, then save at
/// `depth`. Returns the output path.
pub fn convert_image(path: &Path, out_path: Option<&Path>, depth: Option<ColorDepth>, quantize: bool, method: Option<QuantizeMethod>) -> Result<PathBuf> {
	let out_path: PathBuf = match out_path {
		Some(out_path) => out_path.to_path_buf(),
		None if dotted_extension(path).eq_ignore_ascii_case(".bmp") => sibling(path, format!("{}-converted.bmp", file_stem(path))),
		None => sibling(path, format!("{}.bmp", file_stem(path))),
	};

	info!("convert image: {} => {}", path.display(), out_path.display());
	let mut bitmap: Bitmap = load_bitmap(path)?;

	if let Some(color_count) = depth.and_then(ColorDepth::color_count) {
		let current: usize = bitmap.color_used();

		if quantize && current > color_count {
			bitmap = quantize::quantize(&bitmap, color_count, method.unwrap_or(QuantizeMethod::MedianCut))?;

			let name: &str = method.map_or("Default", QuantizeMethod::name);
			info!("quantize image {}: {} => {}", name, current, bitmap.color_used());
		}
	}

	save_bitmap(&bitmap, &out_path, depth)?;
	Ok(out_path)
}


/// Header fields and artifacts written by `dump_bitmap`.
#[derive(Debug)]
pub struct BitmapDump {
	pub header: Option<BmpHeader>,
	pub size: (u32, u32),
	pub depth: ColorDepth,
	pub color_used: usize,
	pub data_path: PathBuf,
	pub dump_path: PathBuf,
}

/// Write the raw pixel buffer to `<path>.data` and a re-encoded copy to
/// `<stem>-dump.bmp`.
pub fn dump_bitmap(path: &Path) -> Result<BitmapDump> {
	info!("dump bitmap: {}", path.display());

	let bytes: Vec<u8> = fs::read(path).map_err(|source| ImageError::read(path, source))?;
	let header: Option<BmpHeader> = bmp_header::get_header(&bytes).ok();
	let bitmap: Bitmap = crate::bitmap_get::decode(&bytes)?;

	let mut data_name = path.as_os_str().to_owned();
	data_name.push(".data");
	let data_path: PathBuf = PathBuf::from(data_name);
	info!("write: {} {}", data_path.display(), bitmap.data().len());
	fs::write(&data_path, bitmap.data()).map_err(|source| ImageError::write(&data_path, source))?;

	let dump_path: PathBuf = sibling(path, format!("{}-dump.bmp", file_stem(path)));
	info!("write: {}", dump_path.display());
	save_bitmap(&bitmap, &dump_path, None)?;

	Ok(BitmapDump {
		header,
		size: bitmap.size(),
		depth: bitmap.depth(),
		color_used: bitmap.color_used(),
		data_path,
		dump_path,
	})
}


pub fn concat_images(axis: Axis, paths: &[PathBuf], out_path: &Path, depth: Option<ColorDepth>) -> Result<()> {
	let names: Vec<String> = paths.iter().map(|path| path.display().to_string()).collect();
	info!("concat {}: {} => {}", axis_name(axis), names.join(", "), out_path.display());

	let mut bitmaps: Vec<Bitmap> = Vec::with_capacity(paths.len());
	for path in paths {
		bitmaps.push(load_bitmap(path)?);
	}

	let bitmap: Bitmap = bitmap_transform::concat(axis, &bitmaps)?;
	save_bitmap(&bitmap, out_path, depth)
}


/// Split into tiles saved as `<index><ext>` inside `out_dir` (default
/// `<stem>-split`). `ext` defaults to the source extension.
/// `dims` is a split size list as `bitmap_transform::parse_split_dims` reads it.
pub fn split_image(axis: Axis, path: &Path, dims: Option<&str>, out_dir: Option<&Path>, ext: Option<&str>) -> Result<Vec<PathBuf>> {
	let out_dir: PathBuf = match out_dir {
		Some(out_dir) => out_dir.to_path_buf(),
		None => sibling(path, format!("{}-split", file_stem(path))),
	};

	let ext: String = match ext {
		Some(ext) if ext.starts_with('.') => ext.to_string(),
		Some(ext) => format!(".{}", ext),
		None => dotted_extension(path),
	};

	info!("split {}: {} {:?} => {}", axis_name(axis), path.display(), dims, out_dir.display());

	let bitmap: Bitmap = load_bitmap(path)?;
	let extent: u32 = match axis {
		Axis::Horizontal => bitmap.width(),
		Axis::Vertical => bitmap.height(),
	};

	let sizes: Option<Vec<u32>> = match dims {
		Some(text) => {
			let sizes: Vec<u32> = bitmap_transform::parse_split_dims(text, extent);
			if sizes.is_empty() {
				return Err(ImageError::dimension(format!("'{}' has no split sizes", text)));
			}
			Some(sizes)
		},
		None => None,
	};

	let tiles: Vec<Bitmap> = bitmap_transform::split(&bitmap, axis, sizes.as_deref())?;

	fs::create_dir_all(&out_dir).map_err(|source| ImageError::write(&out_dir, source))?;

	let mut written: Vec<PathBuf> = Vec::with_capacity(tiles.len());
	for (index, tile) in tiles.iter().enumerate() {
		let tile_path: PathBuf = out_dir.join(format!("{}{}", index, ext));
		save_bitmap(tile, &tile_path, None)?;
		written.push(tile_path);
	}

	Ok(written)
}


pub fn flip_image(axis: Axis, path: &Path, out_path: Option<&Path>) -> Result<PathBuf> {
	let out_path: PathBuf = match out_path {
		Some(out_path) => out_path.to_path_buf(),
		None => sibling(path, format!("{}-flip{}", file_stem(path), dotted_extension(path))),
	};

	info!("flip {}: {} => {}", axis_name(axis), path.display(), out_path.display());

	let bitmap: Bitmap = bitmap_transform::flip(axis, &load_bitmap(path)?)?;
	save_bitmap(&bitmap, &out_path, None)?;

	Ok(out_path)
}


fn resized_toolbar_path(path: &Path, height: u32, percent: u32, method: ResizeMethod) -> PathBuf {
	sibling(path, format!("{}_{}_{}_{}{}", file_stem(path), height, percent, method.name(), dotted_extension(path)))
}

/// Resize the whole strip in one pass.
pub fn resize_toolbar_whole(path: &Path, percent: u32, method: ResizeMethod, out_path: Option<&Path>) -> Result<PathBuf> {
	let bitmap: Bitmap = load_bitmap(path)?;
	let (width, height) = resize::scaled_size(bitmap.width(), bitmap.height(), percent);

	info!(
		"resize toolbar bitmap {} {}: {:?} => {:?}",
		percent, method.name(), bitmap.size(), (width, height)
	);

	let resized: Bitmap = resize::resize(&bitmap, width, height, method)?;
	let out_path: PathBuf = match out_path {
		Some(out_path) => out_path.to_path_buf(),
		None => resized_toolbar_path(path, height, percent, method),
	};

	save_bitmap(&resized, &out_path, None)?;
	Ok(out_path)
}

/// Resize every square icon of the strip on its own, then reassemble.
/// Kernels never sample across icon borders this way.
pub fn resize_toolbar_each(path: &Path, percent: u32, method: ResizeMethod, out_path: Option<&Path>) -> Result<PathBuf> {
	let resized: Bitmap = resize_strip_each(&load_bitmap(path)?, percent, method)?;

	let out_path: PathBuf = match out_path {
		Some(out_path) => out_path.to_path_buf(),
		None => resized_toolbar_path(path, resized.height(), percent, method),
	};

	save_bitmap(&resized, &out_path, None)?;
	Ok(out_path)
}

/// In-memory half of `resize_toolbar_each`.
pub fn resize_strip_each(strip: &Bitmap, percent: u32, method: ResizeMethod) -> Result<Bitmap> {
	let icons: Vec<Bitmap> = bitmap_transform::split(strip, Axis::Horizontal, None)?;
	let (width, height) = resize::scaled_size(icons[0].width(), icons[0].height(), percent);

	info!(
		"resize toolbar bitmap {} {}: {:?} => {:?}",
		percent, method.name(), icons[0].size(), (width, height)
	);

	let mut resized: Vec<Bitmap> = Vec::with_capacity(icons.len());
	for icon in &icons {
		resized.push(resize::resize(icon, width, height, method)?);
	}

	bitmap_transform::concat(Axis::Horizontal, &resized)
}


fn size_dir(images_dir: &Path, size: u32) -> PathBuf {
	images_dir.join(format!("{}x{}", size, size))
}

pub fn make_notepad2_toolbar(size: u32, images_dir: &Path, out_dir: &Path) -> Result<PathBuf> {
	let icons: PathBuf = size_dir(images_dir, size);
	let paths: Vec<PathBuf> = NOTEPAD2_TOOLBAR.iter().map(|name| icons.join(format!("{}.png", name))).collect();

	let out_path: PathBuf = out_dir.join(format!("Toolbar{}.bmp", size));
	concat_images(Axis::Horizontal, &paths, &out_path, None)?;
	Ok(out_path)
}

pub fn make_metapath_toolbar(size: u32, images_dir: &Path, out_dir: &Path) -> Result<PathBuf> {
	let metapath: PathBuf = size_dir(&images_dir.join("metapath"), size);
	let common: PathBuf = size_dir(images_dir, size);

	let paths: Vec<PathBuf> = METAPATH_TOOLBAR
		.iter()
		.map(|&(set, name)| match set {
			IconSet::Metapath => metapath.join(format!("{}.png", name)),
			IconSet::Common => common.join(format!("{}.png", name)),
		})
		.collect();

	let out_path: PathBuf = out_dir.join(format!("Toolbar{}.bmp", size));
	concat_images(Axis::Horizontal, &paths, &out_path, None)?;
	Ok(out_path)
}

/// Folder, navigation and encoding bitmaps for every standard size.
pub fn make_other_bitmaps(images_dir: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
	let mut written: Vec<PathBuf> = Vec::new();

	for size in STANDARD_SIZES {
		let depth: ColorDepth = if size == 16 { ColorDepth::TwentyFour } else { ColorDepth::Eight };
		let icons: PathBuf = size_dir(images_dir, size);
		written.push(convert_image(&icons.join("Open.png"), Some(&out_dir.join(format!("OpenFolder{}.bmp", size))), Some(depth), true, None)?);
	}

	for size in STANDARD_SIZES {
		let icons: PathBuf = size_dir(images_dir, size);
		written.push(convert_image(&icons.join("Next.png"), Some(&out_dir.join(format!("Next{}.bmp", size))), Some(ColorDepth::Four), false, None)?);
		written.push(convert_image(&icons.join("Prev.png"), Some(&out_dir.join(format!("Prev{}.bmp", size))), Some(ColorDepth::Four), false, None)?);
	}

	for size in STANDARD_SIZES {
		let depth: ColorDepth = if size == 16 { ColorDepth::TwentyFour } else { ColorDepth::Eight };
		let icons: PathBuf = size_dir(images_dir, size);
		let out_path: PathBuf = out_dir.join(format!("Encoding{}.bmp", size));

		concat_images(Axis::Horizontal, &[icons.join("Encoding.png"), icons.join("EncodingGray.png")], &out_path, Some(depth))?;
		written.push(out_path);
	}

	Ok(written)
}


#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn resized_name_carries_height_percent_and_method() {
		let path: PathBuf = resized_toolbar_path(Path::new("res/Toolbar.bmp"), 32, 200, ResizeMethod::Lanczos);
		assert_eq!(path, PathBuf::from("res/Toolbar_32_200_Lanczos.bmp"));
	}

	#[test]
	fn toolbar_recipes_have_fixed_icon_counts() {
		assert_eq!(NOTEPAD2_TOOLBAR.len(), 26);
		assert_eq!(METAPATH_TOOLBAR.len(), 15);
		assert_eq!(NOTEPAD2_TOOLBAR[0], "New");
		assert_eq!(NOTEPAD2_TOOLBAR[25], "AlwaysOnTop");
	}

	#[test]
	fn dotted_extension_keeps_case() {
		assert_eq!(dotted_extension(Path::new("a/b.PNG")), ".PNG");
		assert_eq!(dotted_extension(Path::new("a/b")), "");
	}
}
