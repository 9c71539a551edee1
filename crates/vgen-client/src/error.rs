//! Client error types.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use vgen_models::FieldErrors;

/// Result type for client operations.
pub type VideoGenResult<T> = Result<T, VideoGenError>;

/// Boxed underlying cause of a network failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Every failure a public client operation can report.
#[derive(Debug, Error)]
pub enum VideoGenError {
    #[error("Validation failed: {0}")]
    ValidationFailed(FieldErrors),

    #[error("Authentication failed: check the API key and its access to the deployment")]
    AuthenticationFailed,

    #[error("Resource not found: {resource_id}")]
    NotFound { resource_id: String },

    #[error("Rate limited{}", format_retry_after(.retry_after))]
    RateLimited { retry_after: Option<Duration> },

    #[error("Request timed out after {:.1}s", .duration.as_secs_f64())]
    TimedOut { duration: Duration },

    #[error("Network error: {0}")]
    Network(#[source] BoxError),

    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("Job failed: {message}")]
    JobFailed {
        message: String,
        code: Option<String>,
    },

    #[error("Job was cancelled")]
    JobCancelled,

    #[error("API error {status_code}: {message}")]
    Api { status_code: u16, message: String },

    #[error("Download to {} failed: {source}", .path.display())]
    DownloadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn format_retry_after(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(d) => format!(", retry after {}ms", d.as_millis()),
        None => String::new(),
    }
}

impl VideoGenError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationFailed(FieldErrors::single(field, message))
    }

    pub fn not_found(resource_id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_id: resource_id.into(),
        }
    }

    pub fn protocol(detail: impl Into<String>) -> Self {
        Self::ProtocolViolation(detail.into())
    }

    pub fn network(cause: impl Into<BoxError>) -> Self {
        Self::Network(cause.into())
    }

    pub fn download_failed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::DownloadFailed {
            path: path.into(),
            source,
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            VideoGenError::Network(_) | VideoGenError::RateLimited { .. }
        )
    }

    /// Server-suggested wait before retrying, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            VideoGenError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// HTTP status this error was classified from, for metrics.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            VideoGenError::ValidationFailed(_) => Some(400),
            VideoGenError::AuthenticationFailed => Some(401),
            VideoGenError::NotFound { .. } => Some(404),
            VideoGenError::RateLimited { .. } => Some(429),
            VideoGenError::Api { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    /// Short stable label for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            VideoGenError::ValidationFailed(_) => "validation_failed",
            VideoGenError::AuthenticationFailed => "authentication_failed",
            VideoGenError::NotFound { .. } => "not_found",
            VideoGenError::RateLimited { .. } => "rate_limited",
            VideoGenError::TimedOut { .. } => "timed_out",
            VideoGenError::Network(_) => "network_error",
            VideoGenError::ProtocolViolation(_) => "protocol_violation",
            VideoGenError::JobFailed { .. } => "job_failed",
            VideoGenError::JobCancelled => "job_cancelled",
            VideoGenError::Api { .. } => "api_error",
            VideoGenError::DownloadFailed { .. } => "download_failed",
        }
    }
}

impl From<FieldErrors> for VideoGenError {
    fn from(errors: FieldErrors) -> Self {
        Self::ValidationFailed(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(VideoGenError::network("connection reset").is_retryable());
        assert!(VideoGenError::RateLimited { retry_after: None }.is_retryable());

        assert!(!VideoGenError::AuthenticationFailed.is_retryable());
        assert!(!VideoGenError::not_found("job-1").is_retryable());
        assert!(!VideoGenError::validation("prompt", "required").is_retryable());
        assert!(!VideoGenError::TimedOut {
            duration: Duration::from_secs(1)
        }
        .is_retryable());
    }

    #[test]
    fn test_retry_after_getter() {
        let err = VideoGenError::RateLimited {
            retry_after: Some(Duration::from_millis(2500)),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_millis(2500)));
        assert_eq!(err.to_string(), "Rate limited, retry after 2500ms");
        assert_eq!(VideoGenError::AuthenticationFailed.retry_after(), None);
    }

    #[test]
    fn test_http_status_getter() {
        assert_eq!(VideoGenError::AuthenticationFailed.http_status(), Some(401));
        assert_eq!(
            VideoGenError::Api {
                status_code: 502,
                message: "bad gateway".into()
            }
            .http_status(),
            Some(502)
        );
        assert_eq!(VideoGenError::JobCancelled.http_status(), None);
    }

    #[test]
    fn test_display_messages() {
        let err = VideoGenError::TimedOut {
            duration: Duration::from_millis(1500),
        };
        assert_eq!(err.to_string(), "Request timed out after 1.5s");

        let err = VideoGenError::validation("width", "too small");
        assert_eq!(err.to_string(), "Validation failed: width: too small");
    }
}
