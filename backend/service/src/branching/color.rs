//! Branch colors.

use thiserror::Error;

/// The 16 basic named colors of CSS.
pub const BASIC_COLORS: [&str; 16] = [
	"black", "silver", "gray", "white", "maroon", "red", "purple", "fuchsia", "green", "lime",
	"olive", "yellow", "navy", "blue", "teal", "aqua",
];

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ColorError {
	#[error("malformed color {0:?}, expected #RGB, #RRGGBB or a basic color name")]
	Malformed(String),
}

/// Normalizes an optional color.
///
/// Blank colors are treated as absent. Hex colors and names are lowercased.
pub fn normalize_color(color: Option<&str>) -> Result<Option<String>, ColorError> {
	let Some(color) = color.map(str::trim).filter(|color| !color.is_empty()) else {
		return Ok(None);
	};
	let lower = color.to_ascii_lowercase();
	if let Some(hex) = lower.strip_prefix('#') {
		if matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit()) {
			return Ok(Some(lower));
		}
	} else if BASIC_COLORS.contains(&lower.as_str()) {
		return Ok(Some(lower));
	}
	Err(ColorError::Malformed(color.to_string()))
}
