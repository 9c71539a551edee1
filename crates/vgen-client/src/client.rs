//! Video generation job lifecycle.
//!
//! [`VideoGenClient`] submits jobs, polls them, waits for a terminal state
//! under a deadline, and downloads the result. Every request goes through
//! the configured [`RetryPolicy`](crate::retry::RetryPolicy).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tracing::{debug, info, info_span, warn, Instrument};
use vgen_models::{GenerationRequest, JobId, JobSnapshot, JobStatus};

use crate::classify::{classify_response, classify_transport_error};
use crate::config::VideoGenConfig;
use crate::error::{VideoGenError, VideoGenResult};
use crate::metrics::{record_poll, record_request};
use crate::transport::{ApiRequest, ApiResponse, ByteStream, ReqwestTransport, StreamingResponse, Transport};
use crate::wire::{CreateJobRequest, CreateJobResponse, JobStatusResponse};

/// How long and how often to poll a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Delay between consecutive polls
    pub poll_interval: Duration,
    /// Total time allowed before giving up
    pub max_wait: Duration,
}

impl WaitOptions {
    pub fn new(poll_interval: Duration, max_wait: Duration) -> Self {
        Self {
            poll_interval,
            max_wait,
        }
    }

    /// Use the intervals configured on the client.
    pub fn from_config(config: &VideoGenConfig) -> Self {
        Self::new(config.poll_interval, config.max_wait)
    }
}

/// Outcome of an operation that the caller may cancel.
///
/// Cancellation is requested by the caller and is not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion<T> {
    Finished(T),
    Cancelled,
}

impl<T> Completion<T> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Completion::Cancelled)
    }

    /// The finished value, or `None` when cancelled.
    pub fn into_option(self) -> Option<T> {
        match self {
            Completion::Finished(value) => Some(value),
            Completion::Cancelled => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Completion<U> {
        match self {
            Completion::Finished(value) => Completion::Finished(f(value)),
            Completion::Cancelled => Completion::Cancelled,
        }
    }
}

/// A finished and downloaded job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedVideo {
    pub job_id: JobId,
    pub result_url: String,
    pub path: PathBuf,
    pub bytes: u64,
}

/// Client for the video generation API.
///
/// Cheap to clone; clones share the transport and its connection pool.
#[derive(Clone)]
pub struct VideoGenClient {
    config: Arc<VideoGenConfig>,
    transport: Arc<dyn Transport>,
}

impl VideoGenClient {
    /// Create a client with the default HTTP transport.
    pub fn new(config: VideoGenConfig) -> VideoGenResult<Self> {
        let transport = ReqwestTransport::new(&config)
            .map_err(|e| classify_transport_error(e, config.http_timeout))?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a client over a custom transport.
    pub fn with_transport(config: VideoGenConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config: Arc::new(config),
            transport,
        }
    }

    pub fn config(&self) -> &VideoGenConfig {
        &self.config
    }

    // =========================================================================
    // Job operations
    // =========================================================================

    /// Validate a request and submit it as a new job.
    ///
    /// Invalid requests fail with `ValidationFailed` before any network call.
    pub async fn submit(&self, request: &GenerationRequest) -> VideoGenResult<JobId> {
        let validated = request.validate().map_err(|errors| {
            warn!(fields = %errors, "Rejected generation request");
            VideoGenError::ValidationFailed(errors)
        })?;

        let body = serde_json::to_value(CreateJobRequest::new(&self.config.deployment, &validated))
            .map_err(|e| VideoGenError::protocol(format!("Failed to encode job request: {}", e)))?;

        let response = self
            .send("create_job", "video/generations/jobs", ApiRequest::post(self.jobs_url(), body))
            .await?;
        let created: CreateJobResponse = decode(&response, "job creation")?;

        if created.id.trim().is_empty() {
            return Err(VideoGenError::protocol("Job creation response has an empty id"));
        }

        let job_id = JobId::from(created.id);
        info!(
            job_id = %job_id,
            dimensions = %validated.dimensions(),
            duration_seconds = request.duration_seconds,
            "Submitted video generation job"
        );
        Ok(job_id)
    }

    /// Fetch the current state of a job.
    pub async fn poll(&self, job_id: &JobId) -> VideoGenResult<JobSnapshot> {
        let response = self
            .send("get_job", job_id.as_str(), ApiRequest::get(self.job_url(job_id)))
            .await?;
        let body: JobStatusResponse = decode(&response, "job status")?;
        let snapshot = self.snapshot_from(job_id, body)?;

        record_poll(snapshot.status.as_str());
        debug!(
            job_id = %job_id,
            status = %snapshot.status,
            progress = snapshot.progress,
            "Polled job"
        );
        Ok(snapshot)
    }

    /// Poll until the job reaches a terminal state, the deadline passes, or
    /// `cancel` flips to `true`.
    ///
    /// Returns the result URL on success. A job the server reports as failed
    /// or cancelled is an error; cancellation through `cancel` is not.
    pub async fn wait_for_completion(
        &self,
        job_id: &JobId,
        options: WaitOptions,
        mut cancel: Option<watch::Receiver<bool>>,
    ) -> VideoGenResult<Completion<String>> {
        let span = info_span!("vgen_wait", job_id = %job_id);

        async move {
            let start = tokio::time::Instant::now();
            // A max_wait past the clock's range means no deadline.
            let deadline = start.checked_add(options.max_wait);
            let mut last: Option<JobSnapshot> = None;
            let mut polls = 0u32;

            loop {
                if is_cancelled(&cancel) {
                    info!(polls, "Wait cancelled by caller");
                    return Ok(Completion::Cancelled);
                }

                if deadline.is_some_and(|deadline| tokio::time::Instant::now() >= deadline) {
                    warn!(
                        polls,
                        last_status = %last.as_ref().map(|s| s.status).unwrap_or_default(),
                        max_wait_secs = options.max_wait.as_secs_f64(),
                        "Job did not finish before the deadline"
                    );
                    return Err(VideoGenError::TimedOut {
                        duration: options.max_wait,
                    });
                }

                let snapshot = self.poll(job_id).await?;
                polls += 1;

                match snapshot.status {
                    JobStatus::Succeeded => {
                        let url = snapshot.result_url.ok_or_else(|| {
                            VideoGenError::protocol(format!("Job {} succeeded without a result URL", job_id))
                        })?;
                        info!(
                            polls,
                            elapsed_secs = start.elapsed().as_secs_f64(),
                            "Job succeeded"
                        );
                        return Ok(Completion::Finished(url));
                    }
                    JobStatus::Failed => {
                        let message = snapshot
                            .error_message
                            .unwrap_or_else(|| "Job failed without a reason".to_string());
                        warn!(polls, error = %message, "Job failed");
                        return Err(VideoGenError::JobFailed {
                            message,
                            code: snapshot.error_code,
                        });
                    }
                    JobStatus::Cancelled => {
                        warn!(polls, "Job was cancelled on the server");
                        return Err(VideoGenError::JobCancelled);
                    }
                    JobStatus::Pending | JobStatus::Running | JobStatus::Unknown => {
                        if snapshot.status == JobStatus::Unknown {
                            debug!("Server reported an unrecognized status, still waiting");
                        }
                        match last.as_mut() {
                            Some(previous) => {
                                previous.overlay(snapshot);
                            }
                            None => last = Some(snapshot),
                        }
                    }
                }

                let delay = match deadline {
                    Some(deadline) => options
                        .poll_interval
                        .min(deadline.saturating_duration_since(tokio::time::Instant::now())),
                    None => options.poll_interval,
                };

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancelled(&mut cancel) => {
                        info!(polls, "Wait cancelled by caller");
                        return Ok(Completion::Cancelled);
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Download a result to `destination`, creating parent directories.
    ///
    /// Returns the number of bytes written. A partially written file is
    /// removed when the transfer fails.
    pub async fn download(&self, result_url: &str, destination: impl AsRef<Path>) -> VideoGenResult<u64> {
        let destination = destination.as_ref();
        if result_url.trim().is_empty() {
            return Err(VideoGenError::validation("result_url", "Result URL cannot be empty"));
        }

        let response = self
            .send_streaming("download", result_url, ApiRequest::get(result_url))
            .await?;

        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| VideoGenError::download_failed(destination, e))?;
        }

        let file = tokio::fs::File::create(destination)
            .await
            .map_err(|e| VideoGenError::download_failed(destination, e))?;

        match Self::write_body(response.body, file, destination).await {
            Ok(bytes) => {
                info!(path = %destination.display(), bytes, "Downloaded video");
                Ok(bytes)
            }
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(destination).await {
                    debug!(path = %destination.display(), "Failed to remove partial download: {}", cleanup);
                }
                Err(e)
            }
        }
    }

    /// Submit, wait, and download in one call.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        destination: impl AsRef<Path>,
        options: WaitOptions,
        cancel: Option<watch::Receiver<bool>>,
    ) -> VideoGenResult<Completion<GeneratedVideo>> {
        let destination = destination.as_ref();
        let job_id = self.submit(request).await?;

        let result_url = match self.wait_for_completion(&job_id, options, cancel).await? {
            Completion::Finished(url) => url,
            Completion::Cancelled => return Ok(Completion::Cancelled),
        };

        let bytes = self.download(&result_url, destination).await?;
        Ok(Completion::Finished(GeneratedVideo {
            job_id,
            result_url,
            path: destination.to_path_buf(),
            bytes,
        }))
    }

    /// Delete a job on the server.
    pub async fn delete_job(&self, job_id: &JobId) -> VideoGenResult<()> {
        self.send("delete_job", job_id.as_str(), ApiRequest::delete(self.job_url(job_id)))
            .await?;
        info!(job_id = %job_id, "Deleted job");
        Ok(())
    }

    // =========================================================================
    // URLs
    // =========================================================================

    fn jobs_url(&self) -> String {
        format!(
            "{}/openai/v1/video/generations/jobs?api-version={}",
            self.config.base_url(),
            urlencoding::encode(&self.config.api_version)
        )
    }

    fn job_url(&self, job_id: &JobId) -> String {
        format!(
            "{}/openai/v1/video/generations/jobs/{}?api-version={}",
            self.config.base_url(),
            urlencoding::encode(job_id.as_str()),
            urlencoding::encode(&self.config.api_version)
        )
    }

    fn content_url(&self, generation_id: &str) -> String {
        format!(
            "{}/openai/v1/video/generations/{}/content/video?api-version={}",
            self.config.base_url(),
            urlencoding::encode(generation_id),
            urlencoding::encode(&self.config.api_version)
        )
    }

    pub(crate) fn chat_url(&self, deployment: &str) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.config.base_url(),
            urlencoding::encode(deployment),
            urlencoding::encode(&self.config.chat_api_version)
        )
    }

    // =========================================================================
    // Request execution
    // =========================================================================

    /// Execute a buffered request with retries, tracing and metrics.
    pub(crate) async fn send(
        &self,
        operation: &str,
        resource_id: &str,
        request: ApiRequest,
    ) -> VideoGenResult<ApiResponse> {
        self.execute_request(operation, resource_id, async {
            self.config
                .retry
                .run(operation, || async {
                    let response = self
                        .transport
                        .execute(request.clone())
                        .await
                        .map_err(|e| classify_transport_error(e, self.config.http_timeout))?;
                    if response.is_success() {
                        Ok(response)
                    } else {
                        Err(classify_response(response.status, &response.headers, &response.body, resource_id))
                    }
                })
                .await
        })
        .await
    }

    /// Like [`send`](Self::send) but leaves the body unread on success.
    async fn send_streaming(
        &self,
        operation: &str,
        resource_id: &str,
        request: ApiRequest,
    ) -> VideoGenResult<StreamingResponse> {
        self.execute_request(operation, resource_id, async {
            self.config
                .retry
                .run(operation, || async {
                    let response = self
                        .transport
                        .execute_streaming(request.clone())
                        .await
                        .map_err(|e| classify_transport_error(e, self.config.http_timeout))?;
                    if response.is_success() {
                        return Ok(response);
                    }
                    let status = response.status;
                    let buffered = response
                        .buffer()
                        .await
                        .map_err(|e| classify_transport_error(e, self.config.http_timeout))?;
                    Err(classify_response(status, &buffered.headers, &buffered.body, resource_id))
                })
                .await
        })
        .await
    }

    async fn execute_request<T, F>(&self, operation: &str, resource_id: &str, fut: F) -> VideoGenResult<T>
    where
        F: std::future::Future<Output = VideoGenResult<T>>,
    {
        let span = info_span!("vgen_request", operation = %operation, resource = %resource_id);

        let start = Instant::now();
        let result = fut.instrument(span).await;
        let latency_ms = start.elapsed().as_millis() as f64;

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        record_request(operation, outcome, latency_ms);

        result
    }

    async fn write_body(mut body: ByteStream, mut file: tokio::fs::File, path: &Path) -> VideoGenResult<u64> {
        let mut written = 0u64;
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| VideoGenError::download_failed(path, std::io::Error::other(e)))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| VideoGenError::download_failed(path, e))?;
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| VideoGenError::download_failed(path, e))?;
        Ok(written)
    }

    fn snapshot_from(&self, job_id: &JobId, body: JobStatusResponse) -> VideoGenResult<JobSnapshot> {
        let status = JobStatus::from_server(&body.status);
        let id = body
            .id
            .filter(|id| !id.trim().is_empty())
            .map(JobId::from)
            .unwrap_or_else(|| job_id.clone());

        let mut snapshot = if status == JobStatus::Succeeded {
            let url = body
                .result_url
                .filter(|url| !url.trim().is_empty())
                .or_else(|| {
                    body.generations
                        .iter()
                        .find(|g| !g.id.trim().is_empty())
                        .map(|g| self.content_url(&g.id))
                })
                .ok_or_else(|| {
                    VideoGenError::protocol(format!(
                        "Job {} succeeded but reported neither a result URL nor a generation",
                        job_id
                    ))
                })?;
            JobSnapshot::succeeded(id, url)
        } else {
            let mut snapshot = JobSnapshot::in_status(id, status);
            if let Some(progress) = body.progress.filter(|p| p.is_finite()) {
                snapshot = snapshot.with_progress(progress.clamp(0.0, 100.0).round() as u8);
            }
            snapshot
        };

        snapshot = snapshot.with_error(
            body.failure_reason.filter(|r| !r.trim().is_empty()),
            body.failure_code,
        );
        snapshot.created_at = body.created_at.and_then(from_unix);
        snapshot.updated_at = body.updated_at.and_then(from_unix);
        snapshot.completed_at = body.finished_at.and_then(from_unix);
        snapshot.metadata = body.metadata.unwrap_or_default().into_iter().collect();

        Ok(snapshot)
    }
}

impl std::fmt::Debug for VideoGenClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoGenClient")
            .field("endpoint", &self.config.base_url())
            .field("deployment", &self.config.deployment)
            .finish_non_exhaustive()
    }
}

fn decode<T: DeserializeOwned>(response: &ApiResponse, what: &str) -> VideoGenResult<T> {
    serde_json::from_slice(&response.body).map_err(|e| {
        let preview: String = response.text().chars().take(200).collect();
        VideoGenError::protocol(format!("Malformed {} response ({}): {}", what, e, preview))
    })
}

fn from_unix(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}

fn is_cancelled(cancel: &Option<watch::Receiver<bool>>) -> bool {
    cancel.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
}

/// Resolves once cancellation is requested. Never resolves without a
/// receiver or after the sender is dropped.
async fn cancelled(cancel: &mut Option<watch::Receiver<bool>>) {
    match cancel {
        Some(rx) => {
            if rx.wait_for(|c| *c).await.is_err() {
                std::future::pending::<()>().await;
            }
        }
        None => std::future::pending::<()>().await,
    }
}
