//! `Transport` trait — abstraction over LLM backends.
//!
//! Providers (OpenAI, Anthropic, Ollama, …) implement this trait so a
//! dispatcher can be pointed at any supported backend via the
//! `[llm] provider` config field. Retries, rate limiting, timeouts and
//! cancellation all live behind this boundary.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use super::Message;

/// Abstraction over LLM chat backends.
///
/// Each provider translates the shared [`Message`] list into its own
/// wire format and returns the model's reply as plain text.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends the ordered messages and returns the model's raw text.
    ///
    /// `model_hint` is the client-level model override. When `None`,
    /// the provider uses its configured default model.
    async fn send(&self, messages: &[Message], model_hint: Option<&str>) -> Result<String>;

    /// Human-readable description of the provider and model.
    ///
    /// Used in logs, e.g. `"openai (gpt-4o-mini)"`.
    fn description(&self) -> String;
}

/// A backend whose client library only offers blocking calls.
pub trait BlockingTransport: Send + Sync + 'static {
    fn send_blocking(&self, messages: &[Message], model_hint: Option<&str>) -> Result<String>;

    fn description(&self) -> String;
}

/// Runs a [`BlockingTransport`] on tokio's blocking pool so it can be used
/// wherever a [`Transport`] is expected.
pub struct Blocking<T> {
    inner: Arc<T>,
}

impl<T: BlockingTransport> Blocking<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }
}

#[async_trait]
impl<T: BlockingTransport> Transport for Blocking<T> {
    async fn send(&self, messages: &[Message], model_hint: Option<&str>) -> Result<String> {
        let inner = Arc::clone(&self.inner);
        let messages = messages.to_vec();
        let model_hint = model_hint.map(String::from);
        tokio::task::spawn_blocking(move || inner.send_blocking(&messages, model_hint.as_deref()))
            .await?
    }

    fn description(&self) -> String {
        self.inner.description()
    }
}
