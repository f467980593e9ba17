//! Chat relay between the browser and the completion endpoint.
//!
//! Upstream failures never become HTTP errors here. They are rendered as
//! readable text so the client always has something to show in the chat.

use super::prompt::build_messages;
use super::providers::{ChatProvider, ProviderError, StreamChunk};
use crate::config::OllamaConfig;
use crate::models::{ChatRequest, StatusReport};
use futures::future::ready;
use futures::stream::{self, BoxStream, StreamExt};
use serde::Serialize;
use std::sync::Arc;

/// Shown when the model answers with nothing but whitespace.
pub const EMPTY_REPLY_PLACEHOLDER: &str =
    "(The model returned an empty response. Please try asking again.)";

/// One server-sent event on `/api/chat/stream`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StreamEvent {
    Content { content: String },
    Done { done: bool },
    Error { error: String },
}

impl StreamEvent {
    pub fn done() -> Self {
        StreamEvent::Done { done: true }
    }
}

#[derive(Clone)]
pub struct ChatProxy {
    provider: Arc<dyn ChatProvider>,
    config: OllamaConfig,
}

impl ChatProxy {
    pub fn new(provider: Arc<dyn ChatProvider>, config: OllamaConfig) -> Self {
        Self { provider, config }
    }

    /// Buffered chat. Always yields a reply string.
    pub async fn reply(&self, request: &ChatRequest) -> String {
        let messages = build_messages(&request.lot, &request.history, &request.message);

        match self.provider.chat(&messages).await {
            Ok(content) => {
                let content = content.trim();
                if content.is_empty() {
                    tracing::warn!(lot_id = request.lot.id, "Model returned empty content");
                    EMPTY_REPLY_PLACEHOLDER.to_string()
                } else {
                    content.to_string()
                }
            }
            Err(e) => {
                tracing::warn!(lot_id = request.lot.id, error = %e, "Chat request failed");
                describe_failure(&self.config, &e)
            }
        }
    }

    /// Streaming chat: content events, then exactly one `done` or `error`.
    pub async fn stream(&self, request: &ChatRequest) -> BoxStream<'static, StreamEvent> {
        let messages = build_messages(&request.lot, &request.history, &request.message);
        let lot_id = request.lot.id;

        let upstream = match self.provider.chat_stream(&messages).await {
            Ok(upstream) => upstream,
            Err(e) => {
                tracing::warn!(lot_id, error = %e, "Failed to open chat stream");
                let event = StreamEvent::Error {
                    error: describe_failure(&self.config, &e),
                };
                return stream::once(ready(event)).boxed();
            }
        };

        let config = self.config.clone();
        upstream
            .filter(|chunk| ready(!matches!(chunk, Ok(StreamChunk::Text(t)) if t.is_empty())))
            .map(Some)
            // `None` marks the end of the upstream stream.
            .chain(stream::once(ready(None)))
            .scan(false, move |finished, chunk| {
                if *finished {
                    return ready(None);
                }

                let event = match chunk {
                    None => {
                        tracing::debug!(lot_id, "Upstream ended without a completion chunk");
                        *finished = true;
                        StreamEvent::done()
                    }
                    Some(Ok(StreamChunk::Text(content))) => StreamEvent::Content { content },
                    Some(Ok(StreamChunk::Complete {
                        prompt_tokens,
                        output_tokens,
                    })) => {
                        tracing::info!(
                            lot_id,
                            ?prompt_tokens,
                            ?output_tokens,
                            "Chat stream completed"
                        );
                        *finished = true;
                        StreamEvent::done()
                    }
                    Some(Err(e)) => {
                        tracing::warn!(lot_id, error = %e, "Chat stream failed");
                        *finished = true;
                        StreamEvent::Error {
                            error: describe_failure(&config, &e),
                        }
                    }
                };

                ready(Some(event))
            })
            .boxed()
    }

    /// Probe the endpoint's model list.
    pub async fn status(&self) -> StatusReport {
        let url = self.config.base_url.clone();
        let model = self.config.model.clone();

        match self.provider.list_models().await {
            Ok(models) => {
                let available = has_model(&models, &model);
                let message = if available {
                    format!("Ollama is running and model '{}' is available.", model)
                } else {
                    format!(
                        "Ollama is running but model '{}' is not installed. Run `ollama pull {}`.",
                        model, model
                    )
                };

                StatusReport {
                    ok: available,
                    url,
                    model,
                    models: Some(models),
                    message,
                }
            }
            Err(ProviderError::Connect(_)) => StatusReport {
                message: format!(
                    "Cannot connect to Ollama at {}. Start it with `ollama serve`.",
                    url
                ),
                ok: false,
                url,
                model,
                models: None,
            },
            Err(e) => StatusReport {
                message: format!("Failed to query Ollama at {}: {}", url, e),
                ok: false,
                url,
                model,
                models: None,
            },
        }
    }
}

/// Turn an upstream failure into text for the chat bubble.
pub fn describe_failure(config: &OllamaConfig, err: &ProviderError) -> String {
    match err {
        ProviderError::Connect(_) => format!(
            "Cannot connect to the local model server at {}. Please start Ollama \
             (`ollama serve`) and make sure the model is installed (`ollama pull {}`), \
             then try again.",
            config.base_url, config.model
        ),
        ProviderError::Timeout => format!(
            "The model did not respond within {} seconds. It may still be loading; \
             please try again shortly.",
            config.timeout_secs
        ),
        other => format!("Something went wrong while talking to the model: {}", other),
    }
}

/// Ollama lists `name:tag`; a configured name without a tag means `:latest`.
fn has_model(models: &[String], wanted: &str) -> bool {
    models.iter().any(|name| {
        name == wanted
            || (!wanted.contains(':')
                && name
                    .strip_suffix(":latest")
                    .is_some_and(|base| base == wanted))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChatMessage, FortuneLot};
    use crate::services::providers::mock::{MockBehavior, MockChatProvider};

    fn config() -> OllamaConfig {
        OllamaConfig {
            base_url: "http://localhost:11434".to_string(),
            model: "qwen2.5:7b".to_string(),
            timeout_secs: 42,
        }
    }

    fn request(history: Vec<ChatMessage>) -> ChatRequest {
        ChatRequest {
            message: "Will my journey go well?".to_string(),
            history,
            lot: FortuneLot {
                id: 3,
                number: "第三籤".to_string(),
                level: "中吉".to_string(),
                title: "董永遇仙".to_string(),
                poem: "臨風冒雨去還鄉".to_string(),
                story: String::new(),
                meaning: "先難後易".to_string(),
                explanation: "守舊待時".to_string(),
            },
        }
    }

    fn proxy_for(provider: MockChatProvider) -> (ChatProxy, Arc<MockChatProvider>) {
        let provider = Arc::new(provider);
        (ChatProxy::new(provider.clone(), config()), provider)
    }

    #[tokio::test]
    async fn reply_is_trimmed() {
        let (proxy, _) = proxy_for(MockChatProvider::replying("  good fortune \n"));
        assert_eq!(proxy.reply(&request(vec![])).await, "good fortune");
    }

    #[tokio::test]
    async fn blank_reply_becomes_placeholder() {
        let (proxy, _) = proxy_for(MockChatProvider::replying("   "));
        assert_eq!(proxy.reply(&request(vec![])).await, EMPTY_REPLY_PLACEHOLDER);
    }

    #[tokio::test]
    async fn connect_failure_names_url_and_fix() {
        let (proxy, _) = proxy_for(MockChatProvider::failing(ProviderError::Connect(
            "refused".to_string(),
        )));
        let reply = proxy.reply(&request(vec![])).await;
        assert!(reply.contains("http://localhost:11434"));
        assert!(reply.contains("ollama serve"));
    }

    #[tokio::test]
    async fn timeout_names_configured_seconds() {
        let (proxy, _) = proxy_for(MockChatProvider::failing(ProviderError::Timeout));
        let reply = proxy.reply(&request(vec![])).await;
        assert!(reply.contains("42 seconds"));
    }

    #[tokio::test]
    async fn other_failure_carries_detail() {
        let (proxy, _) = proxy_for(MockChatProvider::failing(ProviderError::Api(
            "model 'x' not found".to_string(),
        )));
        let reply = proxy.reply(&request(vec![])).await;
        assert!(reply.contains("model 'x' not found"));
    }

    #[tokio::test]
    async fn upstream_never_sees_more_than_ten_history_entries() {
        let (proxy, provider) = proxy_for(MockChatProvider::replying("ok"));
        let history = (0..30)
            .map(|i| ChatMessage::user(format!("turn {}", i)))
            .collect();

        proxy.reply(&request(history)).await;

        let calls = provider.calls();
        let sent = &calls[0];
        // system prompt + 10 history entries + current message
        assert_eq!(sent.len(), 12);
        assert_eq!(sent[1].content, "turn 20");
    }

    #[tokio::test]
    async fn stream_emits_content_then_done() {
        let (proxy, _) = proxy_for(MockChatProvider::new(MockBehavior::Fragments(vec![
            "a".to_string(),
            String::new(),
            "b".to_string(),
            "c".to_string(),
        ])));

        let events: Vec<_> = proxy.stream(&request(vec![])).await.collect().await;

        assert_eq!(
            events,
            vec![
                StreamEvent::Content { content: "a".to_string() },
                StreamEvent::Content { content: "b".to_string() },
                StreamEvent::Content { content: "c".to_string() },
                StreamEvent::done(),
            ]
        );
    }

    #[tokio::test]
    async fn stream_error_is_terminal() {
        let (proxy, _) = proxy_for(MockChatProvider::new(MockBehavior::FailAfter(
            vec!["a".to_string()],
            ProviderError::Timeout,
        )));

        let events: Vec<_> = proxy.stream(&request(vec![])).await.collect().await;

        assert_eq!(events.len(), 2);
        assert!(matches!(&events[1], StreamEvent::Error { error } if error.contains("42 seconds")));
    }

    #[tokio::test]
    async fn stream_without_completion_still_ends_with_done() {
        let (proxy, _) = proxy_for(MockChatProvider::new(MockBehavior::Unterminated(vec![
            "a".to_string(),
            "b".to_string(),
        ])));

        let events: Vec<_> = proxy.stream(&request(vec![])).await.collect().await;

        assert_eq!(
            events,
            vec![
                StreamEvent::Content { content: "a".to_string() },
                StreamEvent::Content { content: "b".to_string() },
                StreamEvent::done(),
            ]
        );
    }

    #[tokio::test]
    async fn stream_emits_single_terminal_event_after_completion() {
        let (proxy, _) = proxy_for(MockChatProvider::replying("a"));

        let events: Vec<_> = proxy.stream(&request(vec![])).await.collect().await;

        let terminal = events
            .iter()
            .filter(|e| !matches!(e, StreamEvent::Content { .. }))
            .count();
        assert_eq!(terminal, 1);
        assert_eq!(events.last(), Some(&StreamEvent::done()));
    }

    #[tokio::test]
    async fn stream_open_failure_yields_single_error() {
        let (proxy, _) = proxy_for(MockChatProvider::failing(ProviderError::Connect(
            "refused".to_string(),
        )));

        let events: Vec<_> = proxy.stream(&request(vec![])).await.collect().await;

        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], StreamEvent::Error { error } if error.contains("ollama serve")));
    }

    #[test]
    fn stream_events_serialize_to_wire_shape() {
        let content = serde_json::to_string(&StreamEvent::Content {
            content: "hi".to_string(),
        })
        .unwrap();
        assert_eq!(content, r#"{"content":"hi"}"#);
        assert_eq!(
            serde_json::to_string(&StreamEvent::done()).unwrap(),
            r#"{"done":true}"#
        );
    }

    #[tokio::test]
    async fn status_reports_available_model() {
        let (proxy, _) = proxy_for(MockChatProvider::replying("").with_models(&["qwen2.5:7b"]));
        let report = proxy.status().await;
        assert!(report.ok);
        assert_eq!(report.models, Some(vec!["qwen2.5:7b".to_string()]));
    }

    #[tokio::test]
    async fn status_names_missing_model() {
        let (proxy, _) = proxy_for(MockChatProvider::replying("").with_models(&["llama3:latest"]));
        let report = proxy.status().await;
        assert!(!report.ok);
        assert!(report.message.contains("qwen2.5:7b"));
        assert!(report.models.is_some());
    }

    #[tokio::test]
    async fn status_distinguishes_refused_connection() {
        let (proxy, _) = proxy_for(MockChatProvider::failing(ProviderError::Connect(
            "refused".to_string(),
        )));
        let report = proxy.status().await;
        assert!(!report.ok);
        assert!(report.message.contains("Cannot connect"));
        assert!(report.models.is_none());

        let (proxy, _) = proxy_for(MockChatProvider::failing(ProviderError::Api(
            "500".to_string(),
        )));
        let report = proxy.status().await;
        assert!(report.message.starts_with("Failed to query Ollama"));
    }

    #[test]
    fn untagged_model_matches_latest() {
        let models = vec!["llama3:latest".to_string()];
        assert!(has_model(&models, "llama3"));
        assert!(has_model(&models, "llama3:latest"));
        assert!(!has_model(&models, "llama3:8b"));
    }
}
