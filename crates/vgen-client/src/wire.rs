//! JSON shapes exchanged with the API.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use vgen_models::ValidatedRequest;

// =============================================================================
// Video jobs
// =============================================================================

/// Body of `POST .../video/generations/jobs`.
#[derive(Debug, Serialize)]
pub struct CreateJobRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub width: u32,
    pub height: u32,
    pub n_seconds: u32,
    pub n_variants: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<&'a str>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: &'a BTreeMap<String, String>,
}

impl<'a> CreateJobRequest<'a> {
    pub fn new(model: &'a str, validated: &'a ValidatedRequest) -> Self {
        let request = validated.request();
        let dimensions = validated.dimensions();
        Self {
            model,
            prompt: &request.prompt,
            width: dimensions.width,
            height: dimensions.height,
            n_seconds: request.duration_seconds,
            n_variants: request.variants,
            fps: request.frame_rate,
            seed: request.seed,
            quality: request.quality_tag.as_deref(),
            style: request.style.as_deref(),
            metadata: &request.metadata,
        }
    }
}

/// Response to job creation.
#[derive(Debug, Deserialize)]
pub struct CreateJobResponse {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// One rendered output of a job.
#[derive(Debug, Clone, Deserialize)]
pub struct Generation {
    pub id: String,
}

/// Response to `GET .../video/generations/jobs/{id}`.
#[derive(Debug, Deserialize)]
pub struct JobStatusResponse {
    #[serde(default)]
    pub id: Option<String>,
    pub status: String,
    #[serde(default)]
    pub generations: Vec<Generation>,
    /// Direct result link, sent by older API revisions.
    #[serde(default, alias = "videoUrl", alias = "video_url")]
    pub result_url: Option<String>,
    #[serde(default)]
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub failure_code: Option<String>,
    /// Unix seconds
    #[serde(default)]
    pub created_at: Option<i64>,
    /// Unix seconds
    #[serde(default)]
    pub updated_at: Option<i64>,
    /// Unix seconds
    #[serde(default)]
    pub finished_at: Option<i64>,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Error bodies come either wrapped (`{"error": {...}}`) or flat.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ErrorBody {
    Wrapped { error: ErrorDetail },
    Flat(ErrorDetail),
}

impl ErrorBody {
    pub fn into_detail(self) -> ErrorDetail {
        match self {
            ErrorBody::Wrapped { error } => error,
            ErrorBody::Flat(detail) => detail,
        }
    }
}

// =============================================================================
// Chat completions
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub messages: Vec<ChatMessage<'a>>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Serialize)]
pub struct ChatMessage<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatReply,
}

#[derive(Debug, Deserialize)]
pub struct ChatReply {
    #[serde(default)]
    pub content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use vgen_models::{GenerationRequest, Quality, SizeSpec};

    #[test]
    fn test_create_job_request_uses_resolved_dimensions() {
        let validated = GenerationRequest::new("A lighthouse in a storm", SizeSpec::aspect_ratio("16:9", Quality::High))
            .with_duration(10)
            .validate()
            .unwrap();

        let json = serde_json::to_value(CreateJobRequest::new("sora", &validated)).unwrap();
        assert_eq!(json["model"], "sora");
        assert_eq!(json["width"], 1920);
        assert_eq!(json["height"], 1080);
        assert_eq!(json["n_seconds"], 10);
        assert_eq!(json["n_variants"], 1);
        assert!(json.get("fps").is_none());
        assert!(json.get("metadata").is_none());
    }

    #[test]
    fn test_status_response_minimal() {
        let parsed: JobStatusResponse = serde_json::from_str(r#"{"status":"queued"}"#).unwrap();
        assert_eq!(parsed.status, "queued");
        assert!(parsed.generations.is_empty());
        assert!(parsed.result_url.is_none());
    }

    #[test]
    fn test_status_response_legacy_video_url() {
        let parsed: JobStatusResponse =
            serde_json::from_str(r#"{"status":"succeeded","videoUrl":"https://cdn/v.mp4"}"#).unwrap();
        assert_eq!(parsed.result_url.as_deref(), Some("https://cdn/v.mp4"));
    }

    #[test]
    fn test_error_body_shapes() {
        let wrapped: ErrorBody =
            serde_json::from_str(r#"{"error":{"code":"BadRequest","message":"prompt too long"}}"#).unwrap();
        let detail = wrapped.into_detail();
        assert_eq!(detail.code.as_deref(), Some("BadRequest"));
        assert_eq!(detail.message.as_deref(), Some("prompt too long"));

        let flat: ErrorBody = serde_json::from_str(r#"{"message":"nope"}"#).unwrap();
        assert_eq!(flat.into_detail().message.as_deref(), Some("nope"));
    }
}
