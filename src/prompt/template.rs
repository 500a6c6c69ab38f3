//! Prompt template rendering.
//!
//! Placeholders are `{identifier}` or `{N}` tokens. Each one is replaced by
//! the value bound to that name in a [`VariableMap`]. Braces that do not
//! form a valid placeholder are copied through as-is, and substituted values
//! are never scanned again.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::SpecError;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*|[0-9]+)\}").expect("placeholder pattern is valid")
});

/// Binding name → flattened text value, built fresh for each call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableMap {
    values: HashMap<String, String>,
}

impl VariableMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` to `value`. A name can only be bound once.
    pub fn bind(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<(), SpecError> {
        let name = name.into();
        if self.values.contains_key(&name) {
            return Err(SpecError::DuplicateBinding(name));
        }
        self.values.insert(name, value.into());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Substitutes every placeholder in `template` with its bound value.
///
/// Fails with [`SpecError::UnresolvedPlaceholder`] on the first placeholder
/// that has no binding.
pub fn render(template: &str, vars: &VariableMap) -> Result<String, SpecError> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(template) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let value = vars
            .get(name.as_str())
            .ok_or_else(|| SpecError::UnresolvedPlaceholder(name.as_str().to_string()))?;
        out.push_str(&template[last..whole.start()]);
        out.push_str(value);
        last = whole.end();
    }

    out.push_str(&template[last..]);
    Ok(out)
}

/// Distinct placeholder names in order of first appearance.
pub fn placeholders(template: &str) -> Vec<&str> {
    let mut names: Vec<&str> = Vec::new();
    for caps in PLACEHOLDER.captures_iter(template) {
        if let Some(name) = caps.get(1).map(|m| m.as_str()) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}
