//! Client registration.
//!
//! `build_client` turns a declaration into a validated [`ClientSpec`].
//! It runs once per client, at startup, so every declaration mistake it can
//! detect surfaces before the first call is made.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info};

use super::{ClientDeclaration, ClientSpec, OperationDeclaration, OperationSpec, ParamSpec};
use crate::error::SpecError;
use crate::prompt::template;

/// Validates a declaration and builds the immutable spec for it.
pub fn build_client(declaration: ClientDeclaration) -> Result<ClientSpec, SpecError> {
    let mut names = HashSet::new();
    let mut operations = Vec::with_capacity(declaration.operations.len());

    for op in declaration.operations {
        if !names.insert(op.name.clone()) {
            return Err(SpecError::DuplicateOperation(op.name));
        }
        operations.push(Arc::new(build_operation(op)?));
    }

    let model_name = declaration.model.filter(|m| !m.trim().is_empty());
    let system_message = declaration.system_message.filter(|m| !m.trim().is_empty());

    info!(
        "Registered LLM client {} ({} operations, model: {})",
        declaration.name,
        operations.len(),
        model_name.as_deref().unwrap_or("transport default")
    );

    Ok(ClientSpec::new(
        declaration.name,
        model_name,
        system_message,
        operations,
    ))
}

fn build_operation(decl: OperationDeclaration) -> Result<OperationSpec, SpecError> {
    if decl.template.trim().is_empty() {
        return Err(SpecError::MissingRequiredTemplate {
            operation: decl.name,
        });
    }

    let params: Vec<ParamSpec> = decl
        .params
        .into_iter()
        .enumerate()
        .map(|(i, p)| ParamSpec {
            explicit_name: p.name,
            declared_name: p.declared,
            positional_index: i,
        })
        .collect();

    let mut bound = HashSet::with_capacity(params.len());
    for param in &params {
        let name = param.binding_name();
        if bound.contains(&name) {
            return Err(SpecError::DuplicateBinding(name));
        }
        bound.insert(name);
    }

    for placeholder in template::placeholders(&decl.template) {
        if !bound.contains(placeholder) {
            return Err(SpecError::UnresolvedPlaceholder(placeholder.to_string()));
        }
    }

    debug!(
        "Operation {}: {} params, returns {}",
        decl.name,
        params.len(),
        decl.returns.kind()
    );

    Ok(OperationSpec {
        name: decl.name,
        prompt_template: decl.template,
        params,
        return_shape: decl.returns,
    })
}

/// Client specs keyed by client name.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: HashMap<String, Arc<ClientSpec>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a spec. Client names must be unique.
    pub fn register(&mut self, spec: ClientSpec) -> Result<Arc<ClientSpec>, SpecError> {
        if self.clients.contains_key(&spec.name) {
            return Err(SpecError::DuplicateClient(spec.name));
        }
        let spec = Arc::new(spec);
        self.clients.insert(spec.name.clone(), Arc::clone(&spec));
        Ok(spec)
    }

    pub fn get(&self, name: &str) -> Option<Arc<ClientSpec>> {
        self.clients.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Registered client names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.clients.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
