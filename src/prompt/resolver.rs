//! Call descriptor resolution.
//!
//! Turns an operation spec plus the caller's arguments into the exact
//! message list sent to the model. All validation happens here, before any
//! network I/O: arity, binding-name uniqueness, and placeholder coverage.

use serde_json::Value;
use tracing::debug;

use super::template::{self, VariableMap};
use crate::declaration::{ClientSpec, OperationSpec, ReturnShape};
use crate::error::SpecError;
use crate::llm::Message;
use crate::output::SchemaFormatter;

/// Everything needed to make one call. Built per invocation, never shared.
#[derive(Debug, Clone, PartialEq)]
pub struct CallDescriptor {
    /// Optional system message, then the rendered user message.
    pub messages: Vec<Message>,
    pub return_shape: ReturnShape,
}

impl CallDescriptor {
    /// The rendered user message, including any format instruction.
    pub fn user_message(&self) -> &str {
        self.messages
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or_default()
    }
}

pub fn resolve(
    op: &OperationSpec,
    client: &ClientSpec,
    args: &[Value],
    formatter: &dyn SchemaFormatter,
) -> Result<CallDescriptor, SpecError> {
    if op.prompt_template.trim().is_empty() {
        return Err(SpecError::MissingRequiredTemplate {
            operation: op.name.clone(),
        });
    }
    if args.len() != op.arity() {
        return Err(SpecError::ArityMismatch {
            operation: op.name.clone(),
            expected: op.arity(),
            actual: args.len(),
        });
    }

    let vars = bind_arguments(op, args)?;
    let mut text = template::render(&op.prompt_template, &vars)?;

    if let ReturnShape::Structured(schema) = &op.return_shape {
        let instruction = formatter.describe(schema);
        if !instruction.is_empty() {
            text.push_str("\n\n");
            text.push_str(&instruction);
        }
    }

    let mut messages = Vec::with_capacity(2);
    if let Some(system) = client
        .system_message
        .as_deref()
        .filter(|s| !s.trim().is_empty())
    {
        messages.push(Message::system(system));
    }
    messages.push(Message::user(text));

    debug!(
        "Resolved {}.{}: {} messages, returns {}",
        client.name,
        op.name,
        messages.len(),
        op.return_shape.kind()
    );

    Ok(CallDescriptor {
        messages,
        return_shape: op.return_shape.clone(),
    })
}

/// Binds each argument to its parameter's binding name.
pub fn bind_arguments(op: &OperationSpec, args: &[Value]) -> Result<VariableMap, SpecError> {
    let mut vars = VariableMap::new();
    for (param, value) in op.params.iter().zip(args) {
        vars.bind(param.binding_name(), flatten(value))?;
    }
    Ok(vars)
}

/// Text form of an argument: strings verbatim, everything else as JSON.
fn flatten(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
