//! Generation requests and their validation.

use std::collections::BTreeMap;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::dimensions::{
    common_dimensions, Dimensions, Quality, DIMENSION_STEP, MAX_DIMENSION, MIN_DIMENSION,
};

/// Maximum prompt length in characters.
pub const MAX_PROMPT_CHARS: usize = 4000;

pub const MIN_DURATION_SECONDS: u32 = 1;
pub const MAX_DURATION_SECONDS: u32 = 60;

pub const MIN_FRAME_RATE: u32 = 12;
pub const MAX_FRAME_RATE: u32 = 60;

pub const MAX_VARIANTS: u32 = 4;

/// How the output size is chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SizeSpec {
    /// Caller-picked pixel size.
    Explicit { width: u32, height: u32 },
    /// Size looked up from an aspect ratio and a quality preset.
    AspectRatio { ratio: String, quality: Quality },
}

impl SizeSpec {
    pub fn explicit(width: u32, height: u32) -> Self {
        Self::Explicit { width, height }
    }

    pub fn aspect_ratio(ratio: impl Into<String>, quality: Quality) -> Self {
        Self::AspectRatio {
            ratio: ratio.into(),
            quality,
        }
    }
}

/// A video generation request as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GenerationRequest {
    /// Text prompt describing the video
    pub prompt: String,
    /// Output size
    pub size: SizeSpec,
    /// Video length in seconds
    pub duration_seconds: u32,
    /// Frames per second
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_rate: Option<u32>,
    /// Seed for reproducible output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Free-form quality tag forwarded to the API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_tag: Option<String>,
    /// Free-form style tag forwarded to the API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    /// Number of videos to generate for this job
    #[serde(default = "default_variants")]
    pub variants: u32,
    /// Caller metadata attached to the job
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

fn default_variants() -> u32 {
    1
}

impl GenerationRequest {
    /// Create a request with the required fields and a 5 second duration.
    pub fn new(prompt: impl Into<String>, size: SizeSpec) -> Self {
        Self {
            prompt: prompt.into(),
            size,
            duration_seconds: 5,
            frame_rate: None,
            seed: None,
            quality_tag: None,
            style: None,
            variants: default_variants(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_duration(mut self, seconds: u32) -> Self {
        self.duration_seconds = seconds;
        self
    }

    pub fn with_frame_rate(mut self, fps: u32) -> Self {
        self.frame_rate = Some(fps);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_quality_tag(mut self, tag: impl Into<String>) -> Self {
        self.quality_tag = Some(tag.into());
        self
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    pub fn with_variants(mut self, variants: u32) -> Self {
        self.variants = variants;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Resolve the final output size.
    ///
    /// Explicit sizes are returned as given; range checks happen in
    /// [`GenerationRequest::validate`].
    pub fn resolve_dimensions(&self) -> Result<Dimensions, FieldErrors> {
        match &self.size {
            SizeSpec::Explicit { width, height } => Ok(Dimensions::new(*width, *height)),
            SizeSpec::AspectRatio { ratio, quality } => common_dimensions(ratio, *quality)
                .map_err(|e| FieldErrors::single("aspect_ratio", e.to_string())),
        }
    }

    /// Resolve dimensions and check every field, collecting all violations.
    pub fn validate(&self) -> Result<ValidatedRequest, FieldErrors> {
        let mut errors = FieldErrors::default();

        let prompt_chars = self.prompt.chars().count();
        if self.prompt.trim().is_empty() {
            errors.add("prompt", "Prompt is required");
        } else if prompt_chars > MAX_PROMPT_CHARS {
            errors.add(
                "prompt",
                format!(
                    "Prompt must be at most {} characters (got {})",
                    MAX_PROMPT_CHARS, prompt_chars
                ),
            );
        }

        let dimensions = match self.resolve_dimensions() {
            Ok(dims) => {
                check_dimension(&mut errors, "width", dims.width);
                check_dimension(&mut errors, "height", dims.height);
                Some(dims)
            }
            Err(resolve_errors) => {
                errors.merge(resolve_errors);
                None
            }
        };

        if !(MIN_DURATION_SECONDS..=MAX_DURATION_SECONDS).contains(&self.duration_seconds) {
            errors.add(
                "duration_seconds",
                format!(
                    "Duration must be between {} and {} seconds",
                    MIN_DURATION_SECONDS, MAX_DURATION_SECONDS
                ),
            );
        }

        if let Some(fps) = self.frame_rate {
            if !(MIN_FRAME_RATE..=MAX_FRAME_RATE).contains(&fps) {
                errors.add(
                    "frame_rate",
                    format!(
                        "Frame rate must be between {} and {} fps",
                        MIN_FRAME_RATE, MAX_FRAME_RATE
                    ),
                );
            }
        }

        if !(1..=MAX_VARIANTS).contains(&self.variants) {
            errors.add(
                "variants",
                format!("Variants must be between 1 and {}", MAX_VARIANTS),
            );
        }

        match dimensions {
            Some(dimensions) if errors.is_empty() => Ok(ValidatedRequest {
                request: self.clone(),
                dimensions,
            }),
            _ => Err(errors),
        }
    }
}

fn check_dimension(errors: &mut FieldErrors, field: &str, value: u32) {
    if !(MIN_DIMENSION..=MAX_DIMENSION).contains(&value) {
        errors.add(
            field,
            format!(
                "{} must be between {} and {} pixels (got {})",
                capitalize(field),
                MIN_DIMENSION,
                MAX_DIMENSION,
                value
            ),
        );
    } else if value % DIMENSION_STEP != 0 {
        errors.add(
            field,
            format!(
                "{} must be divisible by {} (got {})",
                capitalize(field),
                DIMENSION_STEP,
                value
            ),
        );
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// A request that passed validation, with its resolved dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    request: GenerationRequest,
    dimensions: Dimensions,
}

impl ValidatedRequest {
    pub fn request(&self) -> &GenerationRequest {
        &self.request
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }
}

/// Validation failures keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn merge(&mut self, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains_field(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(|v| v.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn into_inner(self) -> BTreeMap<String, Vec<String>> {
        self.0
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, messages)| format!("{}: {}", field, messages.join("; ")))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}
