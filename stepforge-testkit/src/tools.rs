//! Toy [`Tool`] implementations for exercising the registry and
//! middleware pipeline without a real tool's side effects.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use stepforge_tool::{Tool, ToolContext};
use stepforge_types::{ExecutionError, ToPromptRepresentation};

/// Arguments shared by both fixture tools: a single free-text field.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct TextArgs {
    /// The text to operate on.
    pub text: String,
}

/// Output of [`UppercaseTool`].
#[derive(Debug, Serialize)]
pub struct UppercaseOutput {
    /// The input, upper-cased.
    pub result: String,
}

impl ToPromptRepresentation for UppercaseOutput {
    fn to_prompt_representation(&self) -> String {
        self.result.clone()
    }
}

/// Upper-cases its input. Always succeeds.
#[derive(Debug, Default)]
pub struct UppercaseTool;

#[async_trait]
impl Tool for UppercaseTool {
    type Args = TextArgs;
    type Output = UppercaseOutput;
    const NAME: &'static str = "uppercase";

    fn description(&self) -> String {
        "Upper-cases its input text".to_string()
    }

    async fn call(&self, args: TextArgs, _ctx: &ToolContext) -> Result<UppercaseOutput, ExecutionError> {
        Ok(UppercaseOutput {
            result: args.text.to_uppercase(),
        })
    }
}

/// Output of [`AlwaysFailTool`]. Never actually constructed; it exists
/// so `Tool::Output` has a concrete prompt-representable type.
#[derive(Debug, Serialize)]
pub struct Never;

impl ToPromptRepresentation for Never {
    fn to_prompt_representation(&self) -> String {
        unreachable!("AlwaysFailTool never produces a successful output")
    }
}

/// Always returns [`ExecutionError::InvalidArguments`], regardless of
/// input, to exercise middleware and guardrail failure paths.
#[derive(Debug, Default)]
pub struct AlwaysFailTool;

#[async_trait]
impl Tool for AlwaysFailTool {
    type Args = TextArgs;
    type Output = Never;
    const NAME: &'static str = "always_fail";

    fn description(&self) -> String {
        "Always fails, for exercising error paths".to_string()
    }

    async fn call(&self, _args: TextArgs, _ctx: &ToolContext) -> Result<Never, ExecutionError> {
        Err(ExecutionError::InvalidArguments(
            "always_fail rejects every call".to_string(),
        ))
    }
}
