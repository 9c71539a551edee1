//! Shared data models for the VGen video generation client.
//!
//! This crate provides Serde-serializable types for:
//! - Output dimensions, aspect ratios and quality presets
//! - Generation requests and their validation
//! - Job identifiers, statuses and snapshots

pub mod dimensions;
pub mod job;
pub mod request;

// Re-export common types
pub use dimensions::{
    calculate_from_aspect_ratio, common_dimensions, AspectRatio, DimensionError, Dimensions,
    Quality,
};
pub use job::{JobId, JobSnapshot, JobStatus};
pub use request::{FieldErrors, GenerationRequest, SizeSpec, ValidatedRequest};
