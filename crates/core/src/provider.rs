//! Provider trait — the abstraction over model clients.
//!
//! A Provider knows how to send a conversation history to a language model
//! and get the next message back, either whole or as a stream of chunks.
//! Concrete HTTP clients live outside this workspace; the engine only sees
//! this trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::ProviderError;
use crate::message::Message;

/// A single chunk in a streaming response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Partial content delta
    #[serde(default)]
    pub content: Option<String>,

    /// The assembled message, present only on the final chunk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,

    /// Whether this is the final chunk
    #[serde(default)]
    pub done: bool,
}

/// The core Provider trait.
///
/// The agent loop calls `generate()` or `stream()` without knowing which
/// model is behind it. A model that answers with nothing must surface
/// [`ProviderError::NoResponse`] so callers can tell it apart from a
/// transport failure.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai", "ollama").
    fn name(&self) -> &str;

    /// Send the full history and get the model's next message.
    async fn generate(&self, history: &[Message]) -> std::result::Result<Message, ProviderError>;

    /// Send the history and get a stream of response chunks.
    ///
    /// Default implementation calls `generate()` and wraps the result as a single final chunk.
    async fn stream(
        &self,
        history: &[Message],
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<StreamChunk, ProviderError>>,
        ProviderError,
    > {
        let message = self.generate(history).await?;
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        let _ = tx
            .send(Ok(StreamChunk {
                content: Some(message.content.clone()),
                message: Some(message),
                done: true,
            }))
            .await;
        Ok(rx)
    }

    /// Health check — can we reach the model?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}

/// A provider that replays a fixed script of replies, in order.
///
/// Used by tests and by the CLI's replay mode. Once the script is exhausted
/// every further call reports [`ProviderError::NoResponse`].
#[derive(Debug)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<std::result::Result<String, ProviderError>>>,
    seen: Mutex<Vec<Vec<Message>>>,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    /// Replay the given texts as assistant messages.
    pub fn new<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_replies(texts.into_iter().map(|t| Ok(t.into())))
    }

    /// Replay a mix of texts and failures.
    pub fn with_replies<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = std::result::Result<String, ProviderError>>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            seen: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Sleep before every reply, to simulate model latency.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `generate` calls received so far.
    pub fn call_count(&self) -> usize {
        self.seen.lock().map(|s| s.len()).unwrap_or_default()
    }

    /// The history passed to each call, oldest call first.
    pub fn histories(&self) -> Vec<Vec<Message>> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, history: &[Message]) -> std::result::Result<Message, ProviderError> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(history.to_vec());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self
            .replies
            .lock()
            .map_err(|_| ProviderError::Request("script lock poisoned".into()))?
            .pop_front();
        match next {
            Some(Ok(text)) => Ok(Message::assistant(text)),
            Some(Err(e)) => Err(e),
            None => Err(ProviderError::NoResponse),
        }
    }
}
