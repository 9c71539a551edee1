//! Client configuration.

use std::fmt;
use std::time::Duration;

use reqwest::header::HeaderValue;
use thiserror::Error;
use url::Url;

use crate::retry::RetryPolicy;

/// Default API version for video generation endpoints.
pub const DEFAULT_API_VERSION: &str = "preview";

/// Default API version for chat completion endpoints.
pub const DEFAULT_CHAT_API_VERSION: &str = "2024-10-21";

/// Default video model deployment.
pub const DEFAULT_DEPLOYMENT: &str = "sora";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{0} cannot be empty")]
    Empty(&'static str),

    #[error("Invalid endpoint URL '{0}': {1}")]
    InvalidEndpoint(String, String),

    #[error("{0} contains characters that are not allowed in an HTTP header")]
    InvalidHeaderValue(&'static str),
}

/// Settings for talking to the video generation API.
#[derive(Clone)]
pub struct VideoGenConfig {
    /// Base URL of the resource, e.g. `https://my-resource.openai.azure.com`
    pub endpoint: Url,
    /// API key sent in the `api-key` header
    pub api_key: String,
    /// Video model deployment name
    pub deployment: String,
    /// `api-version` query value for video endpoints
    pub api_version: String,
    /// Chat deployment used for prompt enhancement
    pub chat_deployment: Option<String>,
    /// `api-version` query value for chat endpoints
    pub chat_api_version: String,
    /// Per-request timeout
    pub http_timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Retry policy for single requests
    pub retry: RetryPolicy,
    /// Delay between status polls
    pub poll_interval: Duration,
    /// Deadline for waiting on a job
    pub max_wait: Duration,
}

impl VideoGenConfig {
    /// Create a config with defaults for everything but the endpoint and key.
    pub fn new(endpoint: &str, api_key: impl Into<String>) -> Result<Self, ConfigError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ConfigError::Empty("VGEN_API_KEY"));
        }
        if HeaderValue::from_str(&api_key).is_err() {
            return Err(ConfigError::InvalidHeaderValue("VGEN_API_KEY"));
        }

        Ok(Self {
            endpoint: parse_endpoint(endpoint)?,
            api_key,
            deployment: DEFAULT_DEPLOYMENT.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            chat_deployment: None,
            chat_api_version: DEFAULT_CHAT_API_VERSION.to_string(),
            http_timeout: Duration::from_secs(120),
            connect_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            poll_interval: Duration::from_secs(5),
            max_wait: Duration::from_secs(600),
        })
    }

    /// Create config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let endpoint = std::env::var("VGEN_ENDPOINT").map_err(|_| ConfigError::Missing("VGEN_ENDPOINT"))?;
        if endpoint.trim().is_empty() {
            return Err(ConfigError::Empty("VGEN_ENDPOINT"));
        }
        let api_key = std::env::var("VGEN_API_KEY").map_err(|_| ConfigError::Missing("VGEN_API_KEY"))?;

        let mut config = Self::new(&endpoint, api_key)?;

        if let Some(deployment) = non_empty_var("VGEN_DEPLOYMENT") {
            config.deployment = deployment;
        }
        if let Some(version) = non_empty_var("VGEN_API_VERSION") {
            config.api_version = version;
        }
        config.chat_deployment = non_empty_var("VGEN_CHAT_DEPLOYMENT");
        if let Some(version) = non_empty_var("VGEN_CHAT_API_VERSION") {
            config.chat_api_version = version;
        }

        config.http_timeout = Duration::from_secs(parse_var("VGEN_HTTP_TIMEOUT_SECS").unwrap_or(120));
        config.connect_timeout = Duration::from_secs(parse_var("VGEN_CONNECT_TIMEOUT_SECS").unwrap_or(10));
        config.retry = RetryPolicy::from_env();
        config.poll_interval = Duration::from_secs(parse_var("VGEN_POLL_INTERVAL_SECS").unwrap_or(5));
        config.max_wait = Duration::from_secs(parse_var("VGEN_MAX_WAIT_SECS").unwrap_or(600));

        Ok(config)
    }

    pub fn with_deployment(mut self, deployment: impl Into<String>) -> Self {
        self.deployment = deployment.into();
        self
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    pub fn with_chat_deployment(mut self, deployment: impl Into<String>) -> Self {
        self.chat_deployment = Some(deployment.into());
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn with_polling(mut self, poll_interval: Duration, max_wait: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.max_wait = max_wait;
        self
    }

    /// Endpoint without a trailing slash, for building request URLs.
    pub fn base_url(&self) -> &str {
        self.endpoint.as_str().trim_end_matches('/')
    }
}

impl fmt::Debug for VideoGenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoGenConfig")
            .field("endpoint", &self.base_url())
            .field("api_key", &"<redacted>")
            .field("deployment", &self.deployment)
            .field("api_version", &self.api_version)
            .field("chat_deployment", &self.chat_deployment)
            .field("chat_api_version", &self.chat_api_version)
            .field("http_timeout", &self.http_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("retry", &self.retry)
            .field("poll_interval", &self.poll_interval)
            .field("max_wait", &self.max_wait)
            .finish()
    }
}

fn parse_endpoint(endpoint: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(endpoint.trim())
        .map_err(|e| ConfigError::InvalidEndpoint(endpoint.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEndpoint(
            endpoint.to_string(),
            "scheme must be http or https".to_string(),
        ));
    }
    Ok(url)
}

pub(crate) fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
