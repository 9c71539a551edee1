//! Output dimension calculation.
//!
//! Converts aspect-ratio strings and quality presets into pixel dimensions
//! the generation API accepts: both sides a multiple of 8 and within
//! [`MIN_DIMENSION`, `MAX_DIMENSION`].

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Smallest width or height accepted by the API.
pub const MIN_DIMENSION: u32 = 128;

/// Largest width or height accepted by the API.
pub const MAX_DIMENSION: u32 = 2048;

/// Every dimension must be a multiple of this.
pub const DIMENSION_STEP: u32 = 8;

/// Resolved output size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Quality preset used to pick a size for an aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    Low,
    #[default]
    Medium,
    High,
    Ultra,
}

impl Quality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Low => "low",
            Quality::Medium => "medium",
            Quality::High => "high",
            Quality::Ultra => "ultra",
        }
    }

    /// Length of the longer side when the ratio is not in the preset table.
    pub fn target_size(&self) -> u32 {
        match self {
            Quality::Low => 640,
            Quality::Medium => 1280,
            Quality::High => 1920,
            Quality::Ultra => 2048,
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Quality {
    type Err = DimensionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Quality::Low),
            "medium" => Ok(Quality::Medium),
            "high" => Ok(Quality::High),
            "ultra" => Ok(Quality::Ultra),
            _ => Err(DimensionError::UnknownQuality(s.to_string())),
        }
    }
}

/// Parsed `W:H` aspect ratio. Parts may be fractional (`2.39:1`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AspectRatio {
    pub width: f64,
    pub height: f64,
}

impl AspectRatio {
    /// Widescreen (16:9)
    pub const LANDSCAPE: AspectRatio = AspectRatio {
        width: 16.0,
        height: 9.0,
    };

    /// Vertical video (9:16)
    pub const PORTRAIT: AspectRatio = AspectRatio {
        width: 9.0,
        height: 16.0,
    };

    /// Square (1:1)
    pub const SQUARE: AspectRatio = AspectRatio {
        width: 1.0,
        height: 1.0,
    };

    /// Returns the aspect ratio as a decimal.
    pub fn as_f64(&self) -> f64 {
        self.width / self.height
    }

    pub fn is_landscape_or_square(&self) -> bool {
        self.width >= self.height
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

impl FromStr for AspectRatio {
    type Err = DimensionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 2 {
            return Err(DimensionError::InvalidAspectRatio(s.to_string()));
        }

        let parse_part = |part: &str| -> Result<f64, DimensionError> {
            let value: f64 = part
                .trim()
                .parse()
                .map_err(|_| DimensionError::InvalidAspectRatio(s.to_string()))?;
            if !value.is_finite() || value <= 0.0 {
                return Err(DimensionError::InvalidAspectRatio(s.to_string()));
            }
            Ok(value)
        };

        Ok(AspectRatio {
            width: parse_part(parts[0])?,
            height: parse_part(parts[1])?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DimensionError {
    #[error("Invalid aspect ratio '{0}', expected two positive numbers as 'W:H'")]
    InvalidAspectRatio(String),
    #[error("Unknown quality preset '{0}', expected one of low, medium, high, ultra")]
    UnknownQuality(String),
}

// (ratio, [low, medium, high, ultra])
const PRESET_TABLE: [(&str, [(u32, u32); 4]); 6] = [
    ("16:9", [(640, 360), (1280, 720), (1920, 1080), (2048, 1152)]),
    ("4:3", [(640, 480), (1024, 768), (1600, 1200), (2048, 1536)]),
    ("1:1", [(480, 480), (720, 720), (1080, 1080), (2048, 2048)]),
    ("9:16", [(360, 640), (720, 1280), (1080, 1920), (1152, 2048)]),
    ("3:4", [(480, 640), (768, 1024), (1200, 1600), (1536, 2048)]),
    ("21:9", [(640, 272), (1280, 544), (2048, 880), (2048, 880)]),
];

/// Ratios with hand-picked sizes in the preset table.
pub fn supported_aspect_ratios() -> impl Iterator<Item = &'static str> {
    PRESET_TABLE.iter().map(|(ratio, _)| *ratio)
}

/// Compute dimensions for `ratio`, fixing one side at `target_size`.
///
/// With `prefer_width` the width is fixed and the height follows the ratio,
/// otherwise the height is fixed. Both sides are rounded to the nearest
/// multiple of 8 (half up) and then clamped into the accepted range.
pub fn calculate_from_aspect_ratio(
    ratio: &str,
    target_size: u32,
    prefer_width: bool,
) -> Result<Dimensions, DimensionError> {
    let ratio: AspectRatio = ratio.parse()?;
    let target = f64::from(target_size);

    let (width, height) = if prefer_width {
        (target, (target * ratio.height / ratio.width).round())
    } else {
        ((target * ratio.width / ratio.height).round(), target)
    };

    Ok(Dimensions {
        width: clamp_dimension(round_to_step(width)),
        height: clamp_dimension(round_to_step(height)),
    })
}

/// Look up the preset size for `ratio` at `quality`.
///
/// Ratios outside the preset table are computed with
/// [`calculate_from_aspect_ratio`], fixing the longer side at the quality's
/// target size.
pub fn common_dimensions(ratio: &str, quality: Quality) -> Result<Dimensions, DimensionError> {
    let parsed: AspectRatio = ratio.parse()?;
    let canonical = parsed.to_string();

    if let Some((_, sizes)) = PRESET_TABLE.iter().find(|(r, _)| *r == canonical) {
        let (width, height) = sizes[quality_index(quality)];
        return Ok(Dimensions { width, height });
    }

    calculate_from_aspect_ratio(
        &canonical,
        quality.target_size(),
        parsed.is_landscape_or_square(),
    )
}

/// True if the value is in range and a multiple of 8.
pub fn is_valid_dimension(value: u32) -> bool {
    (MIN_DIMENSION..=MAX_DIMENSION).contains(&value) && value % DIMENSION_STEP == 0
}

fn quality_index(quality: Quality) -> usize {
    match quality {
        Quality::Low => 0,
        Quality::Medium => 1,
        Quality::High => 2,
        Quality::Ultra => 3,
    }
}

fn round_to_step(value: f64) -> u32 {
    let step = f64::from(DIMENSION_STEP);
    let rounded = (value / step + 0.5).floor() * step;
    if rounded <= 0.0 {
        0
    } else if rounded >= f64::from(u32::MAX) {
        u32::MAX - (u32::MAX % DIMENSION_STEP)
    } else {
        rounded as u32
    }
}

fn clamp_dimension(value: u32) -> u32 {
    value.clamp(MIN_DIMENSION, MAX_DIMENSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_dimensions_table() {
        let cases = [
            ("16:9", Quality::High, (1920, 1080)),
            ("16:9", Quality::Low, (640, 360)),
            ("4:3", Quality::High, (1600, 1200)),
            ("1:1", Quality::High, (1080, 1080)),
            ("9:16", Quality::High, (1080, 1920)),
            ("21:9", Quality::High, (2048, 880)),
        ];

        for (ratio, quality, (width, height)) in cases {
            assert_eq!(
                common_dimensions(ratio, quality).unwrap(),
                Dimensions::new(width, height),
                "{} @ {}",
                ratio,
                quality
            );
        }
    }

    #[test]
    fn test_table_entries_are_valid() {
        for ratio in supported_aspect_ratios() {
            for quality in [Quality::Low, Quality::Medium, Quality::High, Quality::Ultra] {
                let dims = common_dimensions(ratio, quality).unwrap();
                assert!(is_valid_dimension(dims.width), "{} {}", ratio, dims);
                assert!(is_valid_dimension(dims.height), "{} {}", ratio, dims);
            }
        }
    }

    #[test]
    fn test_common_dimensions_fallback() {
        // 2:1 is not in the table: width fixed at 1920
        let dims = common_dimensions("2:1", Quality::High).unwrap();
        assert_eq!(dims, Dimensions::new(1920, 960));

        // Portrait fallback fixes the height
        let dims = common_dimensions("1:2", Quality::Medium).unwrap();
        assert_eq!(dims, Dimensions::new(640, 1280));
    }

    #[test]
    fn test_calculate_prefer_width() {
        let dims = calculate_from_aspect_ratio("16:9", 1280, true).unwrap();
        assert_eq!(dims, Dimensions::new(1280, 720));
    }

    #[test]
    fn test_calculate_prefer_height() {
        let dims = calculate_from_aspect_ratio("16:9", 720, false).unwrap();
        assert_eq!(dims, Dimensions::new(1280, 720));
    }

    #[test]
    fn test_calculate_rounds_to_multiple_of_8() {
        // 1000 * 9 / 16 = 562.5 -> 563 -> 560
        let dims = calculate_from_aspect_ratio("16:9", 1000, true).unwrap();
        assert_eq!(dims, Dimensions::new(1000, 560));
    }

    #[test]
    fn test_calculate_rounds_half_up() {
        // 1:1 at 100 -> 100 is exactly between 96 and 104 -> 104, then clamped to 128
        let dims = calculate_from_aspect_ratio("1:1", 100, true).unwrap();
        assert_eq!(dims, Dimensions::new(128, 128));

        // 1020 / 8 = 127.5 -> 1024
        let dims = calculate_from_aspect_ratio("1:1", 1020, true).unwrap();
        assert_eq!(dims, Dimensions::new(1024, 1024));
    }

    #[test]
    fn test_calculate_clamps_after_rounding() {
        let dims = calculate_from_aspect_ratio("32:9", 2048, true).unwrap();
        assert_eq!(dims, Dimensions::new(2048, 576));

        let dims = calculate_from_aspect_ratio("10:1", 1000, true).unwrap();
        assert_eq!(dims, Dimensions::new(1000, 128));

        let dims = calculate_from_aspect_ratio("16:9", 4000, true).unwrap();
        assert_eq!(dims, Dimensions::new(2048, 2048));
    }

    #[test]
    fn test_calculate_outputs_always_valid() {
        let ratios = ["16:9", "4:3", "1:1", "9:16", "3:4", "21:9", "2.39:1", "7:5", "1:7"];
        for ratio in ratios {
            for target in (0..=4096).step_by(37) {
                for prefer_width in [true, false] {
                    let dims = calculate_from_aspect_ratio(ratio, target, prefer_width).unwrap();
                    assert!(is_valid_dimension(dims.width), "{} {} -> {}", ratio, target, dims);
                    assert!(is_valid_dimension(dims.height), "{} {} -> {}", ratio, target, dims);
                }
            }
        }
    }

    #[test]
    fn test_invalid_ratios() {
        for ratio in ["", "16", "16:9:1", "a:b", "0:9", "16:-9", "16:", ":9", "inf:1", "NaN:1"] {
            assert!(
                matches!(
                    calculate_from_aspect_ratio(ratio, 1024, true),
                    Err(DimensionError::InvalidAspectRatio(_))
                ),
                "expected '{}' to be rejected",
                ratio
            );
        }
    }

    #[test]
    fn test_aspect_ratio_parse() {
        let ratio: AspectRatio = "2.39:1".parse().unwrap();
        assert!((ratio.as_f64() - 2.39).abs() < f64::EPSILON);
        assert_eq!(" 9 : 16 ".parse::<AspectRatio>().unwrap(), AspectRatio::PORTRAIT);
        assert_eq!(AspectRatio::LANDSCAPE.to_string(), "16:9");
    }

    #[test]
    fn test_quality_parse() {
        assert_eq!("HIGH".parse::<Quality>().unwrap(), Quality::High);
        assert_eq!("ultra".parse::<Quality>().unwrap(), Quality::Ultra);
        assert!("extreme".parse::<Quality>().is_err());
    }
}
