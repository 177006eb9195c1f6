//! The typed [`Tool`] trait tool authors implement, and its object-safe
//! [`ToolDyn`] counterpart the registry actually stores.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Serialize;
use stepforge_types::{
    schema_for, ExecutionError, FromStructured, PipelineError, StepForgeError, StructuredValue,
    ToPromptRepresentation, ToolDefinition, ToolUseId,
};

use stepforge_context::{ContextKey, ExecutorContextKey};
use stepforge_types::{SessionId, TurnId};

/// Per-call context a tool's `call` is invoked with.
///
/// Session and turn identity come from the ambient executor context;
/// `tool_use_id` is specific to this one invocation and is threaded in
/// explicitly by the registry.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// The id the model assigned to this tool call.
    pub tool_use_id: ToolUseId,
    /// The session this call belongs to.
    pub session_id: SessionId,
    /// The turn this call belongs to.
    pub turn_id: TurnId,
}

impl ToolContext {
    /// Build a context for `tool_use_id`, reading session/turn identity
    /// from the ambient [`stepforge_context::ExecutorContext`].
    pub fn new(tool_use_id: ToolUseId) -> Self {
        let executor = ExecutorContextKey::current();
        Self {
            tool_use_id,
            session_id: executor.session_id,
            turn_id: executor.turn_id,
        }
    }
}

/// A tool the model may call.
///
/// `Args` is reconstructed from the structured arguments JSON on every
/// call (arguments are re-deserialized after permission or a
/// before-hook edits them); `Output` must render to a prompt-visible
/// string.
#[async_trait]
pub trait Tool: Send + Sync + 'static {
    /// Typed arguments, deserialized from the model's JSON input.
    type Args: FromStructured + JsonSchema + Send + 'static;
    /// Typed output, rendered to text for the model to see.
    type Output: ToPromptRepresentation + Serialize + Send + 'static;

    /// The tool's name, as the model references it in a tool-use block.
    const NAME: &'static str;

    /// Human- and model-readable description of what the tool does.
    fn description(&self) -> String;

    /// Execute the tool.
    async fn call(&self, args: Self::Args, ctx: &ToolContext) -> Result<Self::Output, ExecutionError>;
}

/// The erased result of a tool call: a prompt-visible rendering plus
/// the underlying structured value, for callers that want to inspect
/// it programmatically (e.g. tests, or a step reading a prior output).
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Text suitable for inclusion in the model's next turn.
    pub prompt_representation: String,
    /// The typed output, serialized to JSON.
    pub structured: StructuredValue,
    /// Set when a middleware produced this output itself, without
    /// calling `next` to reach the tool. A caller reconstructing a
    /// typed output from `structured` should treat a short-circuited
    /// result as untrustworthy for that purpose.
    pub short_circuited: bool,
}

impl ToolOutput {
    /// Build a short-circuit output: a middleware answering on the
    /// tool's behalf instead of calling `next`.
    pub fn short_circuit(prompt_representation: String, structured: StructuredValue) -> Self {
        Self {
            prompt_representation,
            structured,
            short_circuited: true,
        }
    }
}

/// Object-safe counterpart of [`Tool`], stored in the registry as
/// `Arc<dyn ToolDyn>`. Blanket-implemented for every `Tool`; tool
/// authors never implement this directly.
#[async_trait]
pub trait ToolDyn: Send + Sync {
    /// The tool's name.
    fn name(&self) -> &str;

    /// The tool's definition (name, description, parameters schema),
    /// as sent to the model.
    fn definition(&self) -> ToolDefinition;

    /// Deserialize `input`, call the tool, and render its output.
    ///
    /// `input` has already passed through any middleware that replaces
    /// arguments (permission, a before-hook); a deserialize failure at
    /// this point is a pipeline error, not the tool's own
    /// [`ExecutionError::InvalidArguments`] — it means the replacement
    /// arguments no longer fit `T::Args`, not that the tool rejected
    /// them.
    async fn call_dyn(
        &self,
        input: StructuredValue,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, StepForgeError>;
}

#[async_trait]
impl<T: Tool> ToolDyn for T {
    fn name(&self) -> &str {
        T::NAME
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(T::NAME, self.description(), schema_for::<T::Args>())
    }

    async fn call_dyn(
        &self,
        input: StructuredValue,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, StepForgeError> {
        let args = T::Args::from_structured(input.clone()).map_err(|e| {
            StepForgeError::from(PipelineError::ArgumentParseFailed {
                modified_args: input,
                cause: e.to_string(),
            })
        })?;
        let output = self.call(args, ctx).await?;
        let prompt_representation = output.to_prompt_representation();
        let structured = stepforge_types::to_structured(&output).map_err(|e| {
            StepForgeError::from(PipelineError::ArgumentParseFailed {
                modified_args: StructuredValue::Null,
                cause: format!("output failed to serialize: {e}"),
            })
        })?;
        Ok(ToolOutput {
            prompt_representation,
            structured,
            short_circuited: false,
        })
    }
}
