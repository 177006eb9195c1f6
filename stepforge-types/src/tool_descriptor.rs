//! The shape of a tool as seen by the middleware pipeline and the LLM.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::StructuredValue;

/// `(name, description, parameters-schema)` — the part of a tool that
/// is sent to the model. The typed `call(Args) -> Output` function
/// lives behind the `Tool` trait in `stepforge-tool`; this struct is
/// the erased, serializable remainder every tool produces regardless
/// of its typed signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool's name, as the model will reference it in a `ToolUse` block.
    pub name: String,
    /// Human- and model-readable description of what the tool does.
    pub description: String,
    /// JSON Schema describing the shape of `Args`.
    pub parameters: StructuredValue,
}

impl ToolDefinition {
    /// Create a new tool definition.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: StructuredValue,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// Generate a JSON Schema for `T` suitable for [`ToolDefinition::parameters`].
///
/// Thin wrapper over `schemars::schema_for!` so tool authors don't need
/// to depend on `schemars` directly just to build a definition.
pub fn schema_for<T: JsonSchema>() -> StructuredValue {
    serde_json::to_value(schemars::schema_for!(T)).expect("schema always serializes to JSON")
}
