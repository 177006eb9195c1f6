//! Structured-content conversions shared by tool arguments and outputs.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// The wire shape for tool arguments and LLM-visible payloads.
///
/// The runtime is JSON-native: permission pattern matching, middleware
/// argument re-injection, and the tool protocol all operate on this
/// value. A typed `Args`/`Output` pair is layered on top via
/// [`FromStructured`] and [`ToPromptRepresentation`].
pub type StructuredValue = serde_json::Value;

/// A type that can be reconstructed from a [`StructuredValue`].
///
/// Blanket-implemented for every `DeserializeOwned` type, so tool
/// authors never implement this by hand — it exists as a named seam
/// because the middleware pipeline re-deserializes arguments whenever
/// permission or a before-hook replaces the arguments JSON, and that
/// seam needs a trait to call through generically.
pub trait FromStructured: Sized {
    /// Reconstruct `Self` from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns the underlying `serde_json` error on shape mismatch.
    fn from_structured(value: StructuredValue) -> Result<Self, serde_json::Error>;
}

impl<T: DeserializeOwned> FromStructured for T {
    fn from_structured(value: StructuredValue) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

/// A type that can render itself as a prompt-visible string.
///
/// Every tool `Output` must implement this: the tool runner calls it
/// to build the `ToolResult` content the model sees, independent of
/// however the tool's author chose to structure the typed output.
pub trait ToPromptRepresentation {
    /// Render this value as text suitable for inclusion in a prompt.
    fn to_prompt_representation(&self) -> String;
}

impl ToPromptRepresentation for String {
    fn to_prompt_representation(&self) -> String {
        self.clone()
    }
}

impl ToPromptRepresentation for serde_json::Value {
    fn to_prompt_representation(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| self.to_string())
    }
}

/// Convert any `Serialize` value to a [`StructuredValue`].
///
/// # Errors
///
/// Returns the underlying `serde_json` error if `value` cannot be
/// represented as JSON (practically unreachable for well-formed types).
pub fn to_structured<T: Serialize>(value: &T) -> Result<StructuredValue, serde_json::Error> {
    serde_json::to_value(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Args {
        name: String,
        count: u32,
    }

    #[test]
    fn reconstructs_typed_args_from_json() {
        let value = serde_json::json!({ "name": "x", "count": 3 });
        let args = Args::from_structured(value).unwrap();
        assert_eq!(args, Args { name: "x".into(), count: 3 });
    }

    #[test]
    fn reconstruction_surfaces_shape_mismatch() {
        let value = serde_json::json!({ "name": "x" });
        assert!(Args::from_structured(value).is_err());
    }
}
