//! OpenAI Chat Completions provider.
//!
//! Calls `POST {host}/v1/chat/completions` with bearer auth. Any server
//! speaking the same protocol (vLLM, LiteLLM, Azure-style gateways) works
//! by pointing `[llm] host` at it.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::client::Transport;
use super::Message;
use crate::config::LlmConfig;

const DEFAULT_OPENAI_HOST: &str = "https://api.openai.com";

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

/// Client for the OpenAI Chat Completions API
pub struct OpenAiTransport {
    client: Client,
    config: LlmConfig,
    host: String,
}

impl OpenAiTransport {
    pub fn new(config: LlmConfig) -> Self {
        let host = config
            .host
            .as_deref()
            .unwrap_or(DEFAULT_OPENAI_HOST)
            .trim_end_matches('/')
            .to_string();
        Self {
            client: Client::new(),
            config,
            host,
        }
    }

    fn build_request(&self, messages: &[Message], model_hint: Option<&str>) -> ChatRequest {
        ChatRequest {
            model: model_hint.unwrap_or(&self.config.model).to_string(),
            messages: messages.to_vec(),
            max_tokens: self.config.max_tokens_per_request,
        }
    }
}

/// Text of the first choice. A missing `content` (refusals, tool-only
/// replies) yields an empty string.
fn extract_text(resp: ChatResponse) -> Result<String> {
    let choice = resp
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("OpenAI API returned no choices"))?;
    Ok(choice.message.content.unwrap_or_default())
}

#[async_trait]
impl Transport for OpenAiTransport {
    async fn send(&self, messages: &[Message], model_hint: Option<&str>) -> Result<String> {
        let request = self.build_request(messages, model_hint);

        debug!(
            "Calling OpenAI API ({}) with {} messages",
            request.model,
            messages.len()
        );

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.host))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI API error ({status}): {body}");
        }

        let resp: ChatResponse = response.json().await?;

        let (input_tokens, output_tokens) = resp
            .usage
            .as_ref()
            .map(|u| (u.prompt_tokens, u.completion_tokens))
            .unwrap_or((0, 0));

        info!("LLM response: {input_tokens} in / {output_tokens} out tokens");

        extract_text(resp)
    }

    fn description(&self) -> String {
        format!("{} ({})", self.config.provider, self.config.model)
    }
}
