use serde::Deserialize;

use crate::declaration::{build_client, ClientDeclaration, ClientRegistry};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    /// Declared clients, registered by [`Config::build_registry`]
    #[serde(default)]
    pub clients: Vec<ClientDeclaration>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// "openai", "anthropic" or "ollama"
    pub provider: String,
    /// Default model, used when a client declares no override
    pub model: String,
    /// Supports ${ENV_VAR} substitution
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens_per_request: u32,
    /// Base URL override (self-hosted gateways, Ollama on another machine)
    #[serde(default)]
    pub host: Option<String>,
}

fn default_max_tokens() -> u32 {
    4096
}

fn expand_env(value: &str) -> anyhow::Result<String> {
    Ok(shellexpand::env(value)?.into_owned())
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let mut config: Config = toml::from_str(content)?;
        // Only credentials and endpoints see ${VAR} expansion; prompt text is literal
        config.llm.api_key = expand_env(&config.llm.api_key)?;
        if let Some(host) = config.llm.host.take() {
            config.llm.host = Some(expand_env(&host)?);
        }
        Ok(config)
    }

    /// Builds and registers a spec for every declared client.
    pub fn build_registry(&self) -> anyhow::Result<ClientRegistry> {
        let mut registry = ClientRegistry::new();
        for declaration in &self.clients {
            registry.register(build_client(declaration.clone())?)?;
        }
        Ok(registry)
    }
}
