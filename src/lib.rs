//! Declarative, typed LLM clients.
//!
//! A client is declared once — operations, prompt templates, parameter
//! binding names, return shapes — and every call then goes through the same
//! pipeline: render the prompt, send it to the model, coerce the reply.
//!
//! Modules:
//! - `declaration`: client declarations, validated specs, registration.
//! - `prompt`: template rendering and call descriptor resolution.
//! - `output`: response coercion, format instructions, structured parsing.
//! - `dispatch`: the per-client dispatcher and typed operation handles.
//! - `llm`: the transport boundary and the OpenAI/Anthropic/Ollama providers.
//! - `config`: TOML configuration with `${ENV}` expansion.
//! - `error`: the spec / coercion / upstream error taxonomy.

pub mod config;
pub mod declaration;
pub mod dispatch;
pub mod error;
pub mod llm;
pub mod output;
pub mod prompt;

pub use config::{Config, LlmConfig};
pub use declaration::{
    build_client, ClientDeclaration, ClientRegistry, ClientSpec, OperationDeclaration,
    OperationSpec, ParamDeclaration, ParamSpec, ReturnShape, Schema,
};
pub use dispatch::{Args, BoundOperation, Dispatcher};
pub use error::{CoercionError, InvocationError, ParseError, SpecError};
pub use llm::{Message, Role, Transport};
pub use output::{Json, Output, ReturnType};
