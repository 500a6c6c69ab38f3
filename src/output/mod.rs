//! Response coercion.
//!
//! [`coerce`] maps the model's raw text onto the declared
//! [`ReturnShape`]: nothing for `Void`, the exact text for `Text`, a parsed
//! JSON value for `Structured`. A structured parse failure is reported with
//! the raw text attached; nothing is repaired or defaulted.
//!
//! [`ReturnType`] is the typed view used by
//! [`BoundOperation`](crate::dispatch::BoundOperation): `()`, `String`,
//! [`Json<T>`] and untyped [`serde_json::Value`].

pub mod format;
pub mod parser;

use std::ops::{Deref, DerefMut};

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::declaration::ReturnShape;
use crate::error::CoercionError;
use parser::StructuredParser;

pub use format::{JsonSchemaFormatter, SchemaFormatter};
pub use parser::JsonStructuredParser;

/// A coerced model response.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Unit,
    Text(String),
    /// `schema` is the name of the declared schema the value was parsed against.
    Structured {
        value: Value,
        raw: String,
        schema: String,
    },
}

impl Output {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Output::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Output::Structured { value, .. } => Some(value),
            _ => None,
        }
    }
}

/// Converts raw model text into the value required by `shape`.
pub fn coerce(
    raw: String,
    shape: &ReturnShape,
    parser: &dyn StructuredParser,
) -> Result<Output, CoercionError> {
    match shape {
        ReturnShape::Void => Ok(Output::Unit),
        ReturnShape::Text => Ok(Output::Text(raw)),
        ReturnShape::Structured(schema) => match parser.parse(&raw, schema) {
            Ok(value) => Ok(Output::Structured {
                value,
                raw,
                schema: schema.name.clone(),
            }),
            Err(e) => {
                warn!(
                    "Response does not match schema {}: {e} ({} chars)",
                    schema.name,
                    raw.len()
                );
                Err(CoercionError::MalformedStructuredResponse {
                    schema: schema.name.clone(),
                    raw,
                    reason: e.0,
                })
            }
        },
    }
}

// ── Typed return values ──────────────────────────────────

/// A Rust type an operation's result can be decoded into.
pub trait ReturnType: Sized {
    /// Short kind label.
    const KIND: &'static str;

    /// Label used in shape mismatch errors.
    fn label() -> String {
        Self::KIND.to_string()
    }

    /// Whether an operation declared with `shape` can produce `Self`.
    fn accepts(shape: &ReturnShape) -> bool;

    fn from_output(output: Output) -> Result<Self, CoercionError>;
}

impl ReturnType for () {
    const KIND: &'static str = "void";

    fn accepts(shape: &ReturnShape) -> bool {
        matches!(shape, ReturnShape::Void)
    }

    fn from_output(_: Output) -> Result<Self, CoercionError> {
        Ok(())
    }
}

impl ReturnType for String {
    const KIND: &'static str = "text";

    fn accepts(shape: &ReturnShape) -> bool {
        matches!(shape, ReturnShape::Text)
    }

    fn from_output(output: Output) -> Result<Self, CoercionError> {
        Ok(match output {
            Output::Text(text) => text,
            Output::Structured { raw, .. } => raw,
            Output::Unit => String::new(),
        })
    }
}

/// Untyped access to whatever the operation returns.
impl ReturnType for Value {
    const KIND: &'static str = "any";

    fn accepts(_: &ReturnShape) -> bool {
        true
    }

    fn from_output(output: Output) -> Result<Self, CoercionError> {
        Ok(match output {
            Output::Unit => Value::Null,
            Output::Text(text) => Value::String(text),
            Output::Structured { value, .. } => value,
        })
    }
}

/// A structured result decoded into `T`.
#[derive(Debug, Clone, PartialEq)]
pub struct Json<T>(pub T);

impl<T> Json<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for Json<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> DerefMut for Json<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

impl<T: DeserializeOwned + JsonSchema> ReturnType for Json<T> {
    const KIND: &'static str = "structured";

    fn label() -> String {
        format!("structured {}", T::schema_name())
    }

    /// Only operations declared with `T`'s own schema.
    fn accepts(shape: &ReturnShape) -> bool {
        matches!(shape, ReturnShape::Structured(schema) if schema.name == T::schema_name())
    }

    fn from_output(output: Output) -> Result<Self, CoercionError> {
        match output {
            Output::Structured { value, raw, schema } => serde_json::from_value(value)
                .map(Json)
                .map_err(|e| CoercionError::MalformedStructuredResponse {
                    schema,
                    raw,
                    reason: e.to_string(),
                }),
            Output::Text(raw) => Err(CoercionError::MalformedStructuredResponse {
                schema: T::schema_name().to_string(),
                raw,
                reason: "operation returned unparsed text".to_string(),
            }),
            Output::Unit => Err(CoercionError::MalformedStructuredResponse {
                schema: T::schema_name().to_string(),
                raw: String::new(),
                reason: "operation returned no value".to_string(),
            }),
        }
    }
}
