//! Ollama API provider.
//!
//! Calls `POST {host}/api/chat` with an Ollama-native request format.
//!
//! Key differences from Anthropic:
//! - System prompt is sent as a `role: "system"` message (not a top-level field).
//! - Token usage: `prompt_eval_count` / `eval_count` (may be absent).
//! - Must set `stream: false` for synchronous responses.
//! - No API key.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::client::Transport;
use super::Message;
use crate::config::LlmConfig;

/// Default Ollama API base URL.
const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";

// ── Ollama API request types ─────────────────────────────

/// Ollama `/api/chat` request body.
#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<Message>,
    stream: bool,
    options: OllamaOptions,
}

/// Ollama generation options.
#[derive(Debug, Serialize)]
struct OllamaOptions {
    num_predict: u32,
}

// ── Ollama API response types ────────────────────────────

/// Ollama `/api/chat` response.
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaResponseMessage,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

/// Message in an Ollama response.
#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    content: String,
}

// ── OllamaTransport ──────────────────────────────────────

/// Client for the Ollama API.
pub struct OllamaTransport {
    client: Client,
    config: LlmConfig,
    host: String,
}

impl OllamaTransport {
    /// Creates a new Ollama transport from configuration.
    ///
    /// If `config.host` is `None`, defaults to `http://localhost:11434`.
    pub fn new(config: LlmConfig) -> Self {
        let host = config
            .host
            .clone()
            .unwrap_or_else(|| DEFAULT_OLLAMA_HOST.to_string());
        // Strip trailing slash for consistent URL construction
        let host = host.trim_end_matches('/').to_string();
        Self {
            client: Client::new(),
            config,
            host,
        }
    }

    fn build_request(&self, messages: &[Message], model_hint: Option<&str>) -> OllamaChatRequest {
        OllamaChatRequest {
            model: model_hint.unwrap_or(&self.config.model).to_string(),
            messages: messages.to_vec(),
            stream: false,
            options: OllamaOptions {
                num_predict: self.config.max_tokens_per_request,
            },
        }
    }
}

#[async_trait]
impl Transport for OllamaTransport {
    async fn send(&self, messages: &[Message], model_hint: Option<&str>) -> Result<String> {
        let request = self.build_request(messages, model_hint);
        let url = format!("{}/api/chat", self.host);

        debug!(
            "Calling Ollama API ({}) with {} messages",
            request.model,
            messages.len()
        );

        let response = self.client.post(&url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Ollama API error ({status}): {body}");
        }

        let resp: OllamaChatResponse = response.json().await?;

        let input_tokens = resp.prompt_eval_count.unwrap_or(0);
        let output_tokens = resp.eval_count.unwrap_or(0);

        info!("LLM response: {input_tokens} in / {output_tokens} out tokens");

        Ok(resp.message.content)
    }

    fn description(&self) -> String {
        format!("{} ({})", self.config.provider, self.config.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(host: Option<&str>) -> LlmConfig {
        LlmConfig {
            provider: "ollama".to_string(),
            model: "llama3.2".to_string(),
            api_key: String::new(),
            max_tokens_per_request: 4096,
            host: host.map(String::from),
        }
    }

    #[test]
    fn test_description() {
        let transport = OllamaTransport::new(config(None));
        assert_eq!(transport.description(), "ollama (llama3.2)");
    }

    #[test]
    fn test_default_host() {
        let transport = OllamaTransport::new(config(None));
        assert_eq!(transport.host, "http://localhost:11434");
    }

    #[test]
    fn test_custom_host() {
        let transport = OllamaTransport::new(config(Some("http://myserver:11434/")));
        // Trailing slash should be stripped
        assert_eq!(transport.host, "http://myserver:11434");
    }

    // ── Request serialization ────────────────────────────

    #[test]
    fn test_request_serialization() {
        let transport = OllamaTransport::new(config(None));
        let request = transport.build_request(
            &[Message::system("Be warm."), Message::user("Hello")],
            None,
        );
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "llama3.2");
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["num_predict"], 4096);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "Hello");
    }

    #[test]
    fn test_request_uses_model_hint() {
        let transport = OllamaTransport::new(config(None));
        let request = transport.build_request(&[Message::user("Hi")], Some("mistral"));
        assert_eq!(request.model, "mistral");
    }

    // ── Response parsing ─────────────────────────────────

    #[test]
    fn test_response_parsing() {
        let json = r#"{
            "message": {"role": "assistant", "content": "Hello!"},
            "done_reason": "stop",
            "prompt_eval_count": 100,
            "eval_count": 50
        }"#;
        let resp: OllamaChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.message.content, "Hello!");
        assert_eq!(resp.prompt_eval_count, Some(100));
        assert_eq!(resp.eval_count, Some(50));
    }

    #[test]
    fn test_response_parsing_missing_optional_fields() {
        let json = r#"{
            "message": {"role": "assistant", "content": "Hi!"}
        }"#;
        let resp: OllamaChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.message.content, "Hi!");
        assert!(resp.prompt_eval_count.is_none());
        assert!(resp.eval_count.is_none());
    }
}
