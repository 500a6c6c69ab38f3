//! Anthropic Messages API provider.
//!
//! Calls `POST {host}/v1/messages`. System messages are lifted into the
//! top-level `system` field; the remaining messages keep their order.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::client::Transport;
use super::{Message, Role};
use crate::config::LlmConfig;

const DEFAULT_ANTHROPIC_HOST: &str = "https://api.anthropic.com";

/// Client for the Anthropic Messages API
pub struct AnthropicTransport {
    client: Client,
    config: LlmConfig,
    host: String,
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

impl AnthropicTransport {
    pub fn new(config: LlmConfig) -> Self {
        let host = config
            .host
            .as_deref()
            .unwrap_or(DEFAULT_ANTHROPIC_HOST)
            .trim_end_matches('/')
            .to_string();
        Self {
            client: Client::new(),
            config,
            host,
        }
    }

    fn build_request(&self, messages: &[Message], model_hint: Option<&str>) -> MessagesRequest {
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();

        MessagesRequest {
            model: model_hint.unwrap_or(&self.config.model).to_string(),
            max_tokens: self.config.max_tokens_per_request,
            system: (!system.is_empty()).then(|| system.join("\n\n")),
            messages: messages
                .iter()
                .filter(|m| m.role != Role::System)
                .cloned()
                .collect(),
        }
    }
}

/// Concatenates the text blocks of a response.
fn extract_text(resp: &MessagesResponse) -> String {
    resp.content
        .iter()
        .filter_map(|block| {
            if block.block_type == "text" {
                block.text.clone()
            } else {
                None
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Transport for AnthropicTransport {
    async fn send(&self, messages: &[Message], model_hint: Option<&str>) -> Result<String> {
        let request = self.build_request(messages, model_hint);

        debug!(
            "Calling Claude API ({}) with {} messages",
            request.model,
            request.messages.len()
        );

        let response = self
            .client
            .post(format!("{}/v1/messages", self.host))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            anyhow::bail!("Claude API error ({status}): {body}");
        }

        let resp: MessagesResponse = response.json().await?;
        let text = extract_text(&resp);

        let (input_tokens, output_tokens) = resp
            .usage
            .map(|u| (u.input_tokens, u.output_tokens))
            .unwrap_or((0, 0));

        info!("LLM response: {input_tokens} in / {output_tokens} out tokens");

        Ok(text)
    }

    fn description(&self) -> String {
        format!("{} ({})", self.config.provider, self.config.model)
    }
}
