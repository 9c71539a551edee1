//! Mapping of transport outcomes onto [`VideoGenError`].
//!
//! Every non-2xx status and every transport failure maps to exactly one
//! error kind; nothing leaves the client unclassified.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use vgen_models::FieldErrors;

use crate::error::VideoGenError;
use crate::transport::TransportError;
use crate::wire::ErrorBody;

/// Classify a non-success HTTP response.
///
/// `resource_id` names what was requested and is carried by `NotFound`.
pub fn classify_response(
    status: u16,
    headers: &HeaderMap,
    body: &[u8],
    resource_id: &str,
) -> VideoGenError {
    match status {
        401 | 403 => VideoGenError::AuthenticationFailed,
        404 => VideoGenError::not_found(resource_id),
        429 => VideoGenError::RateLimited {
            retry_after: parse_retry_after(headers, Utc::now()),
        },
        400 => {
            let (_, message) = error_message(status, body);
            VideoGenError::ValidationFailed(FieldErrors::single("request", message))
        }
        _ => {
            let (_, message) = error_message(status, body);
            VideoGenError::Api {
                status_code: status,
                message,
            }
        }
    }
}

/// Classify a failure that happened before a status code was received.
pub fn classify_transport_error(error: TransportError, timeout: Duration) -> VideoGenError {
    match error {
        TransportError::Timeout => VideoGenError::TimedOut { duration: timeout },
        TransportError::Network(cause) => VideoGenError::Network(cause),
    }
}

/// Extract the server's error code and message.
///
/// Falls back to the raw body text when it is not a JSON error object, and
/// to the bare status when the body is empty.
pub fn error_message(status: u16, body: &[u8]) -> (Option<String>, String) {
    if let Ok(parsed) = serde_json::from_slice::<ErrorBody>(body) {
        let detail = parsed.into_detail();
        if let Some(message) = detail.message.filter(|m| !m.trim().is_empty()) {
            return (detail.code, message);
        }
    }

    let text = String::from_utf8_lossy(body).trim().to_string();
    if text.is_empty() {
        (None, format!("HTTP {}", status))
    } else {
        (None, text)
    }
}

/// Read the server's retry hint.
///
/// Checks `retry-after-ms` first, then `retry-after` as delta seconds or as
/// an HTTP date (relative to `now`; dates in the past yield zero).
pub fn parse_retry_after(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
    if let Some(ms) = header_str(headers, "retry-after-ms").and_then(|v| v.parse::<u64>().ok()) {
        return Some(Duration::from_millis(ms));
    }

    let value = header_str(headers, "retry-after")?;

    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    if let Ok(secs) = value.parse::<f64>() {
        if secs.is_finite() && secs >= 0.0 {
            return Some(Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX));
        }
    }

    let date = DateTime::parse_from_rfc2822(value).ok()?;
    Some(
        (date.with_timezone(&Utc) - now)
            .to_std()
            .unwrap_or(Duration::ZERO),
    )
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
