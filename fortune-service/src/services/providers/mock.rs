//! Mock provider implementation for testing.

use super::{ChatProvider, ProviderError, ProviderStream, StreamChunk};
use crate::models::ChatMessage;
use async_trait::async_trait;
use std::sync::Mutex;

/// What the mock answers with.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Buffered replies return the concatenation; streams yield each fragment.
    Fragments(Vec<String>),

    /// Every call fails with this error.
    Fail(ProviderError),

    /// Streams yield the fragments, then fail mid-way.
    FailAfter(Vec<String>, ProviderError),

    /// Streams yield the fragments and end without a completion chunk.
    Unterminated(Vec<String>),
}

/// Scripted provider that records the message lists it receives.
pub struct MockChatProvider {
    behavior: MockBehavior,
    models: Vec<String>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl MockChatProvider {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            models: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::new(MockBehavior::Fragments(vec![text.to_string()]))
    }

    pub fn failing(error: ProviderError) -> Self {
        Self::new(MockBehavior::Fail(error))
    }

    pub fn with_models(mut self, models: &[&str]) -> Self {
        self.models = models.iter().map(|m| m.to_string()).collect();
        self
    }

    /// Message lists received so far, oldest first.
    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    fn record(&self, messages: &[ChatMessage]) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages.to_vec());
        }
    }
}

#[async_trait]
impl ChatProvider for MockChatProvider {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        self.record(messages);

        match &self.behavior {
            MockBehavior::Fragments(parts) | MockBehavior::Unterminated(parts) => {
                Ok(parts.concat())
            }
            MockBehavior::Fail(error) | MockBehavior::FailAfter(_, error) => Err(error.clone()),
        }
    }

    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
    ) -> Result<ProviderStream, ProviderError> {
        self.record(messages);

        let chunks: Vec<Result<StreamChunk, ProviderError>> = match &self.behavior {
            MockBehavior::Fail(error) => return Err(error.clone()),
            MockBehavior::Fragments(parts) => parts
                .iter()
                .map(|p| Ok(StreamChunk::Text(p.clone())))
                .chain(std::iter::once(Ok(StreamChunk::Complete {
                    prompt_tokens: None,
                    output_tokens: None,
                })))
                .collect(),
            MockBehavior::FailAfter(parts, error) => parts
                .iter()
                .map(|p| Ok(StreamChunk::Text(p.clone())))
                .chain(std::iter::once(Err(error.clone())))
                .collect(),
            MockBehavior::Unterminated(parts) => parts
                .iter()
                .map(|p| Ok(StreamChunk::Text(p.clone())))
                .collect(),
        };

        Ok(Box::pin(tokio_stream::iter(chunks)))
    }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        match &self.behavior {
            MockBehavior::Fail(error) => Err(error.clone()),
            _ => Ok(self.models.clone()),
        }
    }
}
