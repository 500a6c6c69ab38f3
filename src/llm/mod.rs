pub mod anthropic;
pub mod client;
pub mod ollama;
pub mod openai;

use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::LlmConfig;

pub use anthropic::AnthropicTransport;
pub use client::{Blocking, BlockingTransport, Transport};
pub use ollama::OllamaTransport;
pub use openai::OpenAiTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One chat message sent to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Builds the transport selected by the `[llm] provider` config field.
pub fn from_config(config: &LlmConfig) -> Result<Arc<dyn Transport>> {
    let transport: Arc<dyn Transport> = match config.provider.as_str() {
        "openai" => Arc::new(OpenAiTransport::new(config.clone())),
        "anthropic" => Arc::new(AnthropicTransport::new(config.clone())),
        "ollama" => Arc::new(OllamaTransport::new(config.clone())),
        other => anyhow::bail!(
            "Unsupported LLM provider: '{other}'. \
             Supported: 'openai', 'anthropic', 'ollama'."
        ),
    };
    info!("LLM transport: {}", transport.description());
    Ok(transport)
}
