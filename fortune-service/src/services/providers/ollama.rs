//! Ollama chat provider implementation.
//!
//! Talks to a local Ollama server over its native `/api/chat` and
//! `/api/tags` endpoints. Streaming responses arrive as newline-delimited
//! JSON and are relayed through a channel so the HTTP handler never blocks
//! on the upstream connection.

use super::{ChatProvider, ProviderError, ProviderStream, StreamChunk};
use crate::config::OllamaConfig;
use crate::models::ChatMessage;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_stream::wrappers::ReceiverStream;

/// Upper bound for the model-listing probe.
pub const STATUS_TIMEOUT: Duration = Duration::from_secs(5);

pub struct OllamaProvider {
    config: OllamaConfig,
    client: Client,
}

impl OllamaProvider {
    pub fn new(config: OllamaConfig) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/{}", self.config.base_url, path)
    }

    async fn open_chat(
        &self,
        messages: &[ChatMessage],
        stream: bool,
    ) -> Result<Response, ProviderError> {
        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages,
            stream,
        };

        tracing::debug!(
            model = %self.config.model,
            message_count = messages.len(),
            stream,
            "Sending chat request to Ollama"
        );

        let response = self
            .client
            .post(self.api_url("chat"))
            .json(&request)
            .send()
            .await?;

        ensure_success(response).await
    }
}

#[async_trait]
impl ChatProvider for OllamaProvider {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        let call = async {
            let response = self.open_chat(messages, false).await?;
            let body: ChatCompletionResponse = response.json().await?;

            if let Some(error) = body.error {
                return Err(ProviderError::Api(error));
            }

            Ok::<String, ProviderError>(body.message.map(|m| m.content).unwrap_or_default())
        };

        timeout(self.config.timeout(), call)
            .await
            .map_err(|_| ProviderError::Timeout)?
    }

    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
    ) -> Result<ProviderStream, ProviderError> {
        let response = timeout(self.config.timeout(), self.open_chat(messages, true))
            .await
            .map_err(|_| ProviderError::Timeout)??;

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(relay_ndjson(
            response.bytes_stream(),
            tx,
            self.config.timeout(),
        ));

        Ok(Box::pin(ReceiverStream::new(rx)) as ProviderStream)
    }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        let response = self
            .client
            .get(self.api_url("tags"))
            .timeout(STATUS_TIMEOUT)
            .send()
            .await?;

        let tags: TagsResponse = ensure_success(response).await?.json().await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

async fn ensure_success(response: Response) -> Result<Response, ProviderError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let error_text = response.text().await.unwrap_or_default();
    Err(ProviderError::Api(format!(
        "Ollama returned {}: {}",
        status, error_text
    )))
}

/// Forward an NDJSON body to `tx` as [`StreamChunk`]s.
///
/// Lines that do not parse are skipped. The loop ends (dropping the upstream
/// body) when the receiver goes away, the upstream reports `done`, fails, or
/// stays silent for longer than `idle_timeout`.
pub async fn relay_ndjson<S, B, E>(
    stream: S,
    tx: mpsc::Sender<Result<StreamChunk, ProviderError>>,
    idle_timeout: Duration,
) where
    S: Stream<Item = Result<B, E>> + Send,
    B: AsRef<[u8]> + Send,
    E: Into<ProviderError> + Send,
{
    let mut stream = Box::pin(stream);
    let mut buffer: Vec<u8> = Vec::new();

    loop {
        let next = tokio::select! {
            _ = tx.closed() => {
                tracing::debug!("Client disconnected; closing upstream stream");
                return;
            }
            next = timeout(idle_timeout, stream.next()) => next,
        };

        let chunk = match next {
            Err(_) => {
                let _ = tx.send(Err(ProviderError::Timeout)).await;
                return;
            }
            Ok(None) => break,
            Ok(Some(Err(e))) => {
                let _ = tx.send(Err(e.into())).await;
                return;
            }
            Ok(Some(Ok(bytes))) => bytes,
        };

        buffer.extend_from_slice(chunk.as_ref());

        while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = buffer.drain(..=pos).collect();
            if forward_line(&line, &tx).await {
                return;
            }
        }
    }

    // Upstream closed; the last line may lack a trailing newline.
    if forward_line(&buffer, &tx).await {
        return;
    }

    let _ = tx
        .send(Ok(StreamChunk::Complete {
            prompt_tokens: None,
            output_tokens: None,
        }))
        .await;
}

/// Send whatever `line` carries; returns true once the relay is finished.
async fn forward_line(line: &[u8], tx: &mpsc::Sender<Result<StreamChunk, ProviderError>>) -> bool {
    let Some(parsed) = parse_line(line) else {
        return false;
    };

    if let Some(error) = parsed.error {
        let _ = tx.send(Err(ProviderError::Api(error))).await;
        return true;
    }

    if let Some(message) = parsed.message {
        if !message.content.is_empty()
            && tx.send(Ok(StreamChunk::Text(message.content))).await.is_err()
        {
            return true;
        }
    }

    if parsed.done {
        let _ = tx
            .send(Ok(StreamChunk::Complete {
                prompt_tokens: parsed.prompt_eval_count,
                output_tokens: parsed.eval_count,
            }))
            .await;
        return true;
    }

    false
}

fn parse_line(line: &[u8]) -> Option<StreamLine> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return None;
    }

    match serde_json::from_slice::<StreamLine>(line) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            tracing::debug!(error = %e, "Skipping malformed stream line");
            None
        }
    }
}

// ============================================================================
// Ollama API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    message: Option<ResponseMessage>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct StreamLine {
    #[serde(default)]
    message: Option<ResponseMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
}
