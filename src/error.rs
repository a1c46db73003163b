use std::borrow::Cow;
use std::io;
use std::path::Path;

use thiserror::Error;


/// Failures of the bitmap pipeline. Each one is fatal to the file being
/// processed; there is no partial result.
#[derive(Debug, Error)]
pub enum ImageError {
	#[error("bad bitmap: {reason}")]
	Format { reason: Cow<'static, str> },

	#[error("dimension mismatch: {reason}")]
	Dimension { reason: Cow<'static, str> },

	#[error("unsupported quantize target of {count} colors, expected 2, 16 or 256")]
	UnsupportedColorCount { count: usize },

	#[error("unsupported file type '{extension}', expected .bmp or .png")]
	UnsupportedFileType { extension: String },

	#[error("{tool} failed for '{artifact}': {reason}")]
	ExternalTool {
		tool: Cow<'static, str>,
		artifact: String,
		reason: String,
	},

	#[error("failed to read '{path}': {source}")]
	Read {
		path: String,
		#[source]
		source: io::Error,
	},

	#[error("failed to write '{path}': {source}")]
	Write {
		path: String,
		#[source]
		source: io::Error,
	},

	#[error("PNG decode failed: {0}")]
	PngDecode(#[from] png::DecodingError),

	#[error("PNG encode failed: {0}")]
	PngEncode(#[from] png::EncodingError),
}

impl ImageError {
	pub fn format(reason: impl Into<Cow<'static, str>>) -> Self {
		ImageError::Format { reason: reason.into() }
	}

	pub fn dimension(reason: impl Into<Cow<'static, str>>) -> Self {
		ImageError::Dimension { reason: reason.into() }
	}

	pub fn read(path: &Path, source: io::Error) -> Self {
		ImageError::Read { path: path.display().to_string(), source }
	}

	pub fn write(path: &Path, source: io::Error) -> Self {
		ImageError::Write { path: path.display().to_string(), source }
	}
}

pub type Result<T> = std::result::Result<T, ImageError>;


/// Failures of the release builder that stop the whole batch. Failing
/// external commands are not errors; they are logged and the batch moves on.
#[derive(Debug, Error)]
pub enum ReleaseError {
	#[error("I/O error on '{path}': {source}")]
	Io {
		path: String,
		#[source]
		source: io::Error,
	},

	#[error("invalid release config '{path}': {source}")]
	Config {
		path: String,
		#[source]
		source: toml::de::Error,
	},

	#[error("could not read version from '{path}': {reason}")]
	Version { path: String, reason: &'static str },
}

impl ReleaseError {
	pub fn io(path: &Path, source: io::Error) -> Self {
		ReleaseError::Io { path: path.display().to_string(), source }
	}
}
