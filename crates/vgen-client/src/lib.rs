//! Client for a remote text-to-video generation API.
//!
//! This crate provides:
//! - Job submission, status polling and result download
//! - Waiting for completion under a deadline with caller cancellation
//! - A closed error taxonomy and the HTTP status classifier behind it
//! - Retry with exponential backoff for transient failures
//! - Prompt enhancement through a chat-completion deployment

pub mod classify;
pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod prompt;
pub mod retry;
pub mod transport;
pub mod wire;


pub use client::{Completion, GeneratedVideo, VideoGenClient, WaitOptions};
pub use config::{ConfigError, VideoGenConfig};
pub use error::{VideoGenError, VideoGenResult};
pub use prompt::{extract_suggestions, PromptEnhancement};
pub use retry::RetryPolicy;
pub use transport::{ApiRequest, ApiResponse, ReqwestTransport, StreamingResponse, Transport, TransportError};
