//! Format instructions for structured return shapes.
//!
//! The instruction is appended to the user message so the model knows
//! which JSON document it is expected to produce.

use crate::declaration::Schema;

/// Produces the textual instruction for a structured schema.
pub trait SchemaFormatter: Send + Sync {
    fn describe(&self, schema: &Schema) -> String;
}

/// Asks for a bare RFC 8259 JSON document matching a JSON Schema.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSchemaFormatter;

impl SchemaFormatter for JsonSchemaFormatter {
    fn describe(&self, schema: &Schema) -> String {
        let definition = serde_json::to_string_pretty(&schema.definition)
            .unwrap_or_else(|_| schema.definition.to_string());
        format!(
            "Your response should be in JSON format.\n\
             Do not include any explanations, only provide a RFC8259 compliant JSON response \
             following this format without deviation.\n\
             Do not include markdown code blocks in your response.\n\
             Remove the ```json markdown from the output.\n\
             Here is the JSON Schema instance your output must adhere to:\n\
             ```{definition}```"
        )
    }
}
