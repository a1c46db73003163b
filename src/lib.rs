//! Build tooling for Notepad2: toolbar bitmap pipeline, Scintilla interface
//! auditor and the release packaging matrix.

pub mod error;
pub mod shared_types;
pub mod param_validator;
pub mod bit_depth;
pub mod bmp_header;
pub mod bitmap_get;
pub mod bitmap_make;
pub mod bitmap_transform;
pub mod quantize;
pub mod resize;
pub mod recipes;
pub mod iface_check;
pub mod release_config;
pub mod release_build;

pub use error::{ImageError, ReleaseError};
pub use shared_types::{Axis, Bitmap, ColorDepth, QuantizeMethod, ResizeMethod, Rgb, Rgba};
