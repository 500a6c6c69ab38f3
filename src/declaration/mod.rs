//! Client declarations and their validated specs.
//!
//! A [`ClientDeclaration`] is the serializable description of one LLM
//! client interface: its operations, their prompt templates, parameter
//! binding hints, and return shapes. It can come from TOML (see
//! [`crate::config`]) or be built in code.
//!
//! [`registry::build_client`] validates a declaration once and produces an
//! immutable [`ClientSpec`]. Specs are shared read-only across any number of
//! concurrent calls; nothing downstream ever mutates them.

pub mod registry;

use std::collections::HashMap;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use registry::{build_client, ClientRegistry};

// ── Return shapes ────────────────────────────────────────

/// Named JSON Schema describing a structured return value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,
    pub definition: Value,
}

impl Schema {
    pub fn new(name: impl Into<String>, definition: Value) -> Self {
        Self {
            name: name.into(),
            definition,
        }
    }

    /// Derives the schema of a Rust type.
    pub fn of<T: JsonSchema>() -> Self {
        Self {
            name: T::schema_name().to_string(),
            definition: Value::from(schemars::schema_for!(T)),
        }
    }
}

/// Target classification of an operation's result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnShape {
    Void,
    Text,
    Structured(Schema),
}

impl ReturnShape {
    pub fn structured<T: JsonSchema>() -> Self {
        ReturnShape::Structured(Schema::of::<T>())
    }

    /// Short label used in logs and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            ReturnShape::Void => "void",
            ReturnShape::Text => "text",
            ReturnShape::Structured(_) => "structured",
        }
    }

    /// Kind plus schema name, e.g. `structured ActorInfo`.
    pub fn label(&self) -> String {
        match self {
            ReturnShape::Structured(schema) => format!("structured {}", schema.name),
            other => other.kind().to_string(),
        }
    }

    pub fn schema(&self) -> Option<&Schema> {
        match self {
            ReturnShape::Structured(schema) => Some(schema),
            _ => None,
        }
    }
}

fn default_returns() -> ReturnShape {
    ReturnShape::Text
}

// ── Declarations (unvalidated input) ─────────────────────

/// Binding hints for one parameter. Its position in the operation's
/// parameter list is its positional index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamDeclaration {
    /// Explicit binding name. Wins over everything else.
    #[serde(default)]
    pub name: Option<String>,
    /// Name recovered from the source declaration, if any.
    #[serde(default)]
    pub declared: Option<String>,
}

impl ParamDeclaration {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            declared: None,
        }
    }

    pub fn declared(name: impl Into<String>) -> Self {
        Self {
            name: None,
            declared: Some(name.into()),
        }
    }

    /// A parameter bound only by its position (`{0}`, `{1}`, …).
    pub fn positional() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationDeclaration {
    pub name: String,
    pub template: String,
    #[serde(default)]
    pub params: Vec<ParamDeclaration>,
    #[serde(default = "default_returns")]
    pub returns: ReturnShape,
}

impl OperationDeclaration {
    /// A text-returning operation with no parameters yet.
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            template: template.into(),
            params: Vec::new(),
            returns: ReturnShape::Text,
        }
    }

    pub fn param(mut self, param: ParamDeclaration) -> Self {
        self.params.push(param);
        self
    }

    pub fn returns(mut self, shape: ReturnShape) -> Self {
        self.returns = shape;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientDeclaration {
    pub name: String,
    /// Model override passed to the transport as a hint.
    #[serde(default)]
    pub model: Option<String>,
    /// Interface-wide system message.
    #[serde(default)]
    pub system_message: Option<String>,
    #[serde(default)]
    pub operations: Vec<OperationDeclaration>,
}

impl ClientDeclaration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: None,
            system_message: None,
            operations: Vec::new(),
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn system_message(mut self, message: impl Into<String>) -> Self {
        self.system_message = Some(message.into());
        self
    }

    pub fn operation(mut self, operation: OperationDeclaration) -> Self {
        self.operations.push(operation);
        self
    }
}

// ── Specs (validated, immutable) ─────────────────────────

/// One parameter of an operation, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParamSpec {
    pub explicit_name: Option<String>,
    pub declared_name: Option<String>,
    pub positional_index: usize,
}

impl ParamSpec {
    /// The key this parameter binds to in the prompt template.
    ///
    /// Resolution order: explicit name, then declared name unless it is a
    /// synthesized `argN` placeholder, then the positional index.
    pub fn binding_name(&self) -> String {
        if let Some(name) = self.explicit_name.as_deref().filter(|n| !n.trim().is_empty()) {
            return name.to_string();
        }
        if let Some(name) = self
            .declared_name
            .as_deref()
            .filter(|n| !n.trim().is_empty() && !is_synthesized_name(n))
        {
            return name.to_string();
        }
        self.positional_index.to_string()
    }
}

/// True for compiler-synthesized parameter names such as `arg0`.
fn is_synthesized_name(name: &str) -> bool {
    name.strip_prefix("arg")
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationSpec {
    pub name: String,
    pub prompt_template: String,
    pub params: Vec<ParamSpec>,
    pub return_shape: ReturnShape,
}

impl OperationSpec {
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// Validated, read-only description of one client interface.
///
/// Holds the per-operation dispatch table consulted by
/// [`Dispatcher`](crate::dispatch::Dispatcher).
#[derive(Debug, Clone)]
pub struct ClientSpec {
    pub name: String,
    pub model_name: Option<String>,
    pub system_message: Option<String>,
    operations: Vec<Arc<OperationSpec>>,
    index: HashMap<String, usize>,
}

impl ClientSpec {
    pub(crate) fn new(
        name: String,
        model_name: Option<String>,
        system_message: Option<String>,
        operations: Vec<Arc<OperationSpec>>,
    ) -> Self {
        let index = operations
            .iter()
            .enumerate()
            .map(|(i, op)| (op.name.clone(), i))
            .collect();
        Self {
            name,
            model_name,
            system_message,
            operations,
            index,
        }
    }

    /// Looks up an operation by name.
    pub fn operation(&self, name: &str) -> Option<&Arc<OperationSpec>> {
        self.index.get(name).map(|&i| &self.operations[i])
    }

    /// Operations in declaration order.
    pub fn operations(&self) -> &[Arc<OperationSpec>] {
        &self.operations
    }
}
