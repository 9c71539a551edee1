//! HTTP transport seam.
//!
//! The lifecycle controller talks to the API only through [`Transport`], so
//! tests can script responses and callers can share one connection pool
//! across jobs. [`ReqwestTransport`] is the production implementation.

use std::fmt;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt, TryStreamExt};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use thiserror::Error;
use tracing::debug;
use url::{Origin, Url};

use crate::config::VideoGenConfig;
use crate::error::BoxError;

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "api-key";

/// Header carrying a per-request correlation id.
pub const CLIENT_REQUEST_ID_HEADER: &str = "x-ms-client-request-id";

/// Streamed response body.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, TransportError>> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A logical API request.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            body: None,
        }
    }

    pub fn post(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            body: Some(body),
        }
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self {
            method: Method::Delete,
            url: url.into(),
            body: None,
        }
    }
}

/// Response with a fully buffered body.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Response whose body has not been read yet.
pub struct StreamingResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: ByteStream,
}

impl StreamingResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Read the whole body into memory.
    pub async fn buffer(self) -> Result<ApiResponse, TransportError> {
        let body: Vec<u8> = self
            .body
            .try_fold(Vec::new(), |mut acc, chunk| async move {
                acc.extend_from_slice(&chunk);
                Ok::<_, TransportError>(acc)
            })
            .await?;

        Ok(ApiResponse {
            status: self.status,
            headers: self.headers,
            body,
        })
    }
}

impl fmt::Debug for StreamingResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Failures below the HTTP status level.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The client-side request timeout elapsed.
    #[error("request timed out")]
    Timeout,

    /// Connection, TLS, DNS or body-read failure.
    #[error("network failure: {0}")]
    Network(#[source] BoxError),
}

impl TransportError {
    pub fn network(cause: impl Into<BoxError>) -> Self {
        Self::Network(cause.into())
    }
}

/// Executes logical API requests.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and return the response with an unread body.
    async fn execute_streaming(&self, request: ApiRequest) -> Result<StreamingResponse, TransportError>;

    /// Send a request and buffer the response body.
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        self.execute_streaming(request).await?.buffer().await
    }
}

// =============================================================================
// Reqwest transport
// =============================================================================

/// [`Transport`] backed by a pooled `reqwest::Client`.
///
/// The API key is only attached to requests for the configured endpoint's
/// origin; result URLs on other hosts are fetched without it.
#[derive(Clone)]
pub struct ReqwestTransport {
    http: Client,
    credentials: Option<(Origin, HeaderValue)>,
}

impl ReqwestTransport {
    /// Build a client with the configured timeouts and API key.
    pub fn new(config: &VideoGenConfig) -> Result<Self, TransportError> {
        let mut api_key = HeaderValue::from_str(&config.api_key).map_err(TransportError::network)?;
        api_key.set_sensitive(true);

        let http = Client::builder()
            .timeout(config.http_timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("vgen-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(TransportError::network)?;

        Ok(Self {
            http,
            credentials: Some((config.endpoint.origin(), api_key)),
        })
    }

    /// Wrap an existing client. The caller is responsible for auth headers.
    pub fn from_client(http: Client) -> Self {
        Self {
            http,
            credentials: None,
        }
    }

    fn api_key_for(&self, url: &str) -> Option<&HeaderValue> {
        let (origin, api_key) = self.credentials.as_ref()?;
        let target = Url::parse(url).ok()?;
        (target.origin() == *origin).then_some(api_key)
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::network(e)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute_streaming(&self, request: ApiRequest) -> Result<StreamingResponse, TransportError> {
        let request_id = uuid::Uuid::new_v4().to_string();
        debug!(method = %request.method, url = %request.url, request_id = %request_id, "Sending request");

        let builder = match request.method {
            Method::Get => self.http.get(&request.url),
            Method::Post => self.http.post(&request.url),
            Method::Delete => self.http.delete(&request.url),
        };
        let builder = builder.header(CLIENT_REQUEST_ID_HEADER, request_id);
        let builder = match self.api_key_for(&request.url) {
            Some(api_key) => builder.header(API_KEY_HEADER, api_key.clone()),
            None => {
                debug!(url = %request.url, "Request is outside the API endpoint, sending without the API key");
                builder
            }
        };
        let builder = match &request.body {
            Some(body) => builder.json(body),
            None => builder,
        };

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(map_reqwest_error))
            .boxed();

        Ok(StreamingResponse {
            status,
            headers,
            body,
        })
    }
}
