//! Value parsers for the command line.

use crate::shared_types::ColorDepth;


pub fn parse_depth(argument: &str) -> Result<ColorDepth, String> {
	let bits: u16 = argument
		.trim_end_matches("bit")
		.trim_end_matches('-')
		.parse()
		.map_err(|_| format!("'{}' is not a bit depth", argument))?;

	return ColorDepth::from_bits(bits).ok_or_else(|| format!("unsupported bit depth {}, expected 1, 4, 8, 24 or 32", bits));
}


pub fn parse_percent(argument: &str) -> Result<u32, String> {
	let percent: u32 = argument
		.trim_end_matches('%')
		.parse()
		.map_err(|_| format!("'{}' is not a percentage", argument))?;

	if percent == 0 {
		return Err("percentage must be above zero".to_string());
	}

	return Ok(percent);
}


/// Quantize targets are palette capacities.
pub fn parse_color_count(argument: &str) -> Result<usize, String> {
	match argument.parse::<usize>() {
		Ok(count @ (2 | 16 | 256)) => Ok(count),
		Ok(count) => Err(format!("unsupported color count {}, expected 2, 16 or 256", count)),
		_ => Err(format!("'{}' is not a color count", argument)),
	}
}
