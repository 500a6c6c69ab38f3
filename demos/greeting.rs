//! A typed greeting service backed by a real LLM provider.
//!
//! ```text
//! OPENAI_API_KEY=sk-... cargo run --example greeting -- [CONFIG_PATH] [NAME]
//! ```
//!
//! `CONFIG_PATH` defaults to `config/greeting.toml`, `NAME` to "Iron Man".

use anyhow::{Context, Result};
use async_trait::async_trait;
use llm_mapper::{llm, BoundOperation, Config, Dispatcher, InvocationError, Json, SpecError};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct ActorInfo {
    name: String,
    most_famous_movie: String,
    age: u32,
}

#[async_trait]
trait GreetingService: Send + Sync {
    async fn greet(&self, name: &str) -> Result<String, InvocationError>;

    async fn greet_with_details(
        &self,
        name: &str,
        age: u32,
        city: &str,
    ) -> Result<String, InvocationError>;

    async fn personalized_greeting(&self, name: &str, age: u32) -> Result<String, InvocationError>;

    async fn actor_info(&self, name: &str) -> Result<ActorInfo, InvocationError>;
}

/// Forwards each trait method to its bound operation.
struct GreetingClient {
    greet: BoundOperation<String>,
    greet_with_details: BoundOperation<String>,
    personalized_greeting: BoundOperation<String>,
    actor_info: BoundOperation<Json<ActorInfo>>,
}

impl GreetingClient {
    fn new(dispatcher: &Dispatcher) -> Result<Self, SpecError> {
        Ok(Self {
            greet: dispatcher.bind("greet")?,
            greet_with_details: dispatcher.bind("greet_with_details")?,
            personalized_greeting: dispatcher.bind("personalized_greeting")?,
            actor_info: dispatcher.bind("actor_info")?,
        })
    }
}

#[async_trait]
impl GreetingService for GreetingClient {
    async fn greet(&self, name: &str) -> Result<String, InvocationError> {
        self.greet.call(vec![json!(name)]).await
    }

    async fn greet_with_details(
        &self,
        name: &str,
        age: u32,
        city: &str,
    ) -> Result<String, InvocationError> {
        self.greet_with_details
            .call(vec![json!(name), json!(age), json!(city)])
            .await
    }

    async fn personalized_greeting(&self, name: &str, age: u32) -> Result<String, InvocationError> {
        self.personalized_greeting
            .call(vec![json!(name), json!(age)])
            .await
    }

    async fn actor_info(&self, name: &str) -> Result<ActorInfo, InvocationError> {
        Ok(self.actor_info.call(vec![json!(name)]).await?.into_inner())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("llm_mapper=info,greeting=info")),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/greeting.toml".to_string());
    let name = std::env::args()
        .nth(2)
        .unwrap_or_else(|| "Iron Man".to_string());

    info!("Loading configuration from {config_path}");
    let config = Config::load(&config_path)?;
    let registry = config.build_registry()?;
    let transport = llm::from_config(&config.llm)?;

    let spec = registry
        .get("GreetingService")
        .context("config declares no GreetingService client")?;
    let dispatcher = Dispatcher::new(spec, transport);
    let service: Box<dyn GreetingService> = Box::new(GreetingClient::new(&dispatcher)?);

    println!("{}", service.greet(&name).await?);
    println!("{}", service.greet_with_details(&name, 48, "New York").await?);
    println!("{}", service.personalized_greeting(&name, 48).await?);

    match service.actor_info("Tom Cruise").await {
        Ok(actor) => println!(
            "{} is best known for {} (age {})",
            actor.name, actor.most_famous_movie, actor.age
        ),
        Err(InvocationError::Coercion(e)) => {
            eprintln!("Model answer did not parse: {e}\n--- raw ---\n{}", e.raw_text());
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
