//! Error taxonomy for declared LLM calls.
//!
//! Three kinds of failure reach the caller, and they stay distinguishable:
//! - [`SpecError`] — the declaration or the call arguments are wrong.
//!   Raised before any network I/O.
//! - [`CoercionError`] — the model answered, but the text does not fit
//!   the declared return shape.
//! - [`InvocationError::Upstream`] — the transport failed (network, auth,
//!   quota). The original cause is kept as the error source.

use thiserror::Error;

/// A declaration or call-site mistake. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    #[error("operation '{operation}' expects {expected} argument(s), got {actual}")]
    ArityMismatch {
        operation: String,
        expected: usize,
        actual: usize,
    },

    #[error("binding name '{0}' is used by more than one parameter")]
    DuplicateBinding(String),

    #[error("placeholder '{{{0}}}' has no matching parameter")]
    UnresolvedPlaceholder(String),

    #[error("operation '{operation}' has an empty prompt template")]
    MissingRequiredTemplate { operation: String },

    #[error("operation '{0}' is declared more than once")]
    DuplicateOperation(String),

    #[error("no operation named '{0}'")]
    UnknownOperation(String),

    #[error("client '{0}' is registered more than once")]
    DuplicateClient(String),

    #[error("operation '{operation}' returns {declared}, but {requested} was requested")]
    ReturnShapeMismatch {
        operation: String,
        declared: String,
        requested: String,
    },

    #[error("argument {index} cannot be encoded: {reason}")]
    UnencodableArgument { index: usize, reason: String },
}

/// Failure reported by a [`StructuredParser`](crate::output::parser::StructuredParser).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ParseError(pub String);

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// The model's text did not match the declared shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoercionError {
    /// Carries the raw model text untouched, for diagnostics.
    #[error("response does not match schema '{schema}': {reason}")]
    MalformedStructuredResponse {
        schema: String,
        raw: String,
        reason: String,
    },
}

impl CoercionError {
    /// The raw model text that failed to coerce.
    pub fn raw_text(&self) -> &str {
        match self {
            CoercionError::MalformedStructuredResponse { raw, .. } => raw,
        }
    }
}

/// Everything a dispatched call can fail with.
#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("invalid call: {0}")]
    Spec(#[from] SpecError),

    #[error("unusable model response: {0}")]
    Coercion(#[from] CoercionError),

    #[error("LLM transport failed: {0}")]
    Upstream(#[source] anyhow::Error),
}

impl InvocationError {
    pub fn is_spec_error(&self) -> bool {
        matches!(self, InvocationError::Spec(_))
    }

    pub fn is_coercion_error(&self) -> bool {
        matches!(self, InvocationError::Coercion(_))
    }

    pub fn is_upstream_error(&self) -> bool {
        matches!(self, InvocationError::Upstream(_))
    }
}
