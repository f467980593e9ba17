//! Chat completion provider abstractions.
//!
//! The proxy talks to the model through [`ChatProvider`], so the Ollama
//! client can be swapped for a scripted mock in tests.

pub mod mock;
pub mod ollama;

use crate::models::ChatMessage;
use async_trait::async_trait;
use std::pin::Pin;
use thiserror::Error;
use tokio_stream::Stream;

/// Error type for provider operations.
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// The endpoint refused or could not accept the connection.
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Request timed out")]
    Timeout,

    /// The endpoint answered with a non-success status or an in-band error.
    #[error("API error: {0}")]
    Api(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            ProviderError::Connect(err.to_string())
        } else if err.is_timeout() {
            ProviderError::Timeout
        } else if err.is_decode() {
            ProviderError::InvalidResponse(err.to_string())
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

/// Stream chunk for streaming responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
    /// Incremental text fragment.
    Text(String),

    /// Final chunk with usage stats, when the endpoint reports them.
    Complete {
        prompt_tokens: Option<u32>,
        output_tokens: Option<u32>,
    },
}

/// Type alias for provider streams.
pub type ProviderStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, ProviderError>> + Send>>;

#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Single buffered completion; returns the raw assistant content.
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, ProviderError>;

    /// Streaming completion. The stream yields text fragments and ends with
    /// either [`StreamChunk::Complete`] or an error.
    async fn chat_stream(&self, messages: &[ChatMessage]) -> Result<ProviderStream, ProviderError>;

    /// Names of the models the endpoint can serve.
    async fn list_models(&self) -> Result<Vec<String>, ProviderError>;
}
