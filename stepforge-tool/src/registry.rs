//! Tool registry: register, look up, and execute tools through their
//! middleware chain.

use std::collections::HashMap;
use std::sync::Arc;

use stepforge_types::{
    ExecutionError, FromStructured, PipelineError, StepForgeError, StructuredValue, ToolDefinition,
    ToolUseId,
};

use crate::middleware::{Next, ToolCall, ToolMiddleware};
use crate::tool::{Tool, ToolContext, ToolDyn, ToolOutput};

/// Registry of tools, each runnable through an optional middleware
/// pipeline.
///
/// Middleware can be added globally (runs for every tool) or scoped to
/// one tool by name; a call's chain is global middleware first, then
/// that tool's own, then the tool itself.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolDyn>>,
    global_middleware: Vec<Arc<dyn ToolMiddleware>>,
    tool_middleware: HashMap<String, Vec<Arc<dyn ToolMiddleware>>>,
}

impl ToolRegistry {
    /// Create an empty registry with no tools and no middleware.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            global_middleware: Vec::new(),
            tool_middleware: HashMap::new(),
        }
    }

    /// Register a strongly-typed tool, auto-erased to `Arc<dyn ToolDyn>`.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> &mut Self {
        self.tools.insert(T::NAME.to_string(), Arc::new(tool));
        self
    }

    /// Register an already-erased tool.
    pub fn register_dyn(&mut self, tool: Arc<dyn ToolDyn>) -> &mut Self {
        self.tools.insert(tool.name().to_string(), tool);
        self
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolDyn>> {
        self.tools.get(name).cloned()
    }

    /// Definitions for every registered tool, as sent to the model.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Add middleware that wraps every tool call.
    pub fn add_middleware(&mut self, middleware: impl ToolMiddleware + 'static) -> &mut Self {
        self.global_middleware.push(Arc::new(middleware));
        self
    }

    /// Add middleware that only wraps calls to `tool_name`.
    pub fn add_tool_middleware(
        &mut self,
        tool_name: impl Into<String>,
        middleware: impl ToolMiddleware + 'static,
    ) -> &mut Self {
        self.tool_middleware
            .entry(tool_name.into())
            .or_default()
            .push(Arc::new(middleware));
        self
    }

    /// Call `name` with `input`, running it through the combined
    /// middleware chain.
    pub async fn execute(
        &self,
        name: &str,
        input: StructuredValue,
        tool_use_id: ToolUseId,
    ) -> Result<ToolOutput, StepForgeError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| StepForgeError::from(ExecutionError::ToolNotFound(name.to_string())))?;

        let call = ToolCall {
            tool_use_id: tool_use_id.clone(),
            name: name.to_string(),
            input,
        };
        let ctx = ToolContext::new(tool_use_id);

        let mut chain: Vec<Arc<dyn ToolMiddleware>> = self.global_middleware.clone();
        if let Some(per_tool) = self.tool_middleware.get(name) {
            chain.extend(per_tool.iter().cloned());
        }

        Next::new(tool.as_ref(), &chain).run(&call, &ctx).await
    }

    /// Like [`ToolRegistry::execute`], but also reconstructs the result
    /// as `T::Output`.
    ///
    /// A middleware may short-circuit the chain — return its own
    /// [`ToolOutput`] without ever invoking `next` — which the
    /// type-erased `execute` happily allows, since `ToolOutput` is
    /// already its whole contract. A typed caller has no such slack: a
    /// short-circuited payload was never produced by `T`, so rather than
    /// risk silently misparsing it as `T::Output`, this surfaces
    /// [`stepforge_types::PipelineError::MiddlewareShortCircuited`].
    pub async fn execute_typed<T: Tool>(
        &self,
        input: StructuredValue,
        tool_use_id: ToolUseId,
    ) -> Result<T::Output, StepForgeError>
    where
        T::Output: FromStructured,
    {
        let output = self.execute(T::NAME, input, tool_use_id).await?;
        if output.short_circuited {
            return Err(StepForgeError::from(PipelineError::MiddlewareShortCircuited));
        }
        T::Output::from_structured(output.structured).map_err(|e| {
            StepForgeError::from(PipelineError::ArgumentParseFailed {
                modified_args: StructuredValue::Null,
                cause: e.to_string(),
            })
        })
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use schemars::JsonSchema;
    use stepforge_types::ToPromptRepresentation;

    #[derive(Debug, Deserialize, JsonSchema)]
    struct EchoArgs {
        message: String,
    }

    #[derive(Debug, Serialize)]
    struct EchoOutput {
        echoed: String,
    }

    impl ToPromptRepresentation for EchoOutput {
        fn to_prompt_representation(&self) -> String {
            self.echoed.clone()
        }
    }

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        type Args = EchoArgs;
        type Output = EchoOutput;
        const NAME: &'static str = "echo";

        fn description(&self) -> String {
            "Echoes its input".to_string()
        }

        async fn call(&self, args: EchoArgs, _ctx: &ToolContext) -> Result<EchoOutput, ExecutionError> {
            Ok(EchoOutput { echoed: args.message })
        }
    }

    #[tokio::test]
    async fn registers_and_executes_a_typed_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Echo);

        let output = registry
            .execute(
                "echo",
                serde_json::json!({"message": "hi"}),
                ToolUseId::new("call-1"),
            )
            .await
            .unwrap();

        assert_eq!(output.prompt_representation, "hi");
    }

    #[tokio::test]
    async fn unregistered_tool_name_is_not_found() {
        let registry = ToolRegistry::new();
        let err = registry
            .execute("nope", serde_json::json!({}), ToolUseId::new("call-2"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StepForgeError::Execution(ExecutionError::ToolNotFound(_))
        ));
    }

    #[derive(Debug, Deserialize, Serialize, JsonSchema)]
    struct TypedArgs {
        value: u32,
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct TypedOutput {
        value: u32,
    }

    impl ToPromptRepresentation for TypedOutput {
        fn to_prompt_representation(&self) -> String {
            self.value.to_string()
        }
    }

    struct TypedEcho;

    #[async_trait]
    impl Tool for TypedEcho {
        type Args = TypedArgs;
        type Output = TypedOutput;
        const NAME: &'static str = "typed_echo";

        fn description(&self) -> String {
            "echoes its typed input".to_string()
        }

        async fn call(&self, args: TypedArgs, _ctx: &ToolContext) -> Result<TypedOutput, ExecutionError> {
            Ok(TypedOutput { value: args.value })
        }
    }

    #[tokio::test]
    async fn execute_typed_reconstructs_the_typed_output() {
        let mut registry = ToolRegistry::new();
        registry.register(TypedEcho);

        let output = registry
            .execute_typed::<TypedEcho>(serde_json::json!({"value": 5}), ToolUseId::new("call-4"))
            .await
            .unwrap();
        assert_eq!(output.value, 5);
    }

    #[tokio::test]
    async fn execute_typed_surfaces_a_short_circuit_as_a_pipeline_error() {
        use crate::middleware::tool_middleware_fn;

        let mut registry = ToolRegistry::new();
        registry.register(TypedEcho);
        registry.add_middleware(tool_middleware_fn(|_call, _ctx, _next| async {
            Ok(ToolOutput::short_circuit(
                "cached".to_string(),
                serde_json::json!({"value": 99}),
            ))
        }));

        let err = registry
            .execute_typed::<TypedEcho>(serde_json::json!({"value": 5}), ToolUseId::new("call-5"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StepForgeError::Pipeline(PipelineError::MiddlewareShortCircuited)
        ));
    }

    #[tokio::test]
    async fn global_middleware_wraps_every_call() {
        use crate::middleware::tool_middleware_fn;
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc as StdArc;

        let calls = StdArc::new(AtomicUsize::new(0));
        let counted = StdArc::clone(&calls);

        let mut registry = ToolRegistry::new();
        registry.register(Echo);
        registry.add_middleware(tool_middleware_fn(move |call, ctx, next| {
            let counted = StdArc::clone(&counted);
            async move {
                counted.fetch_add(1, Ordering::SeqCst);
                next.run(&call, ctx).await
            }
        }));

        registry
            .execute(
                "echo",
                serde_json::json!({"message": "hi"}),
                ToolUseId::new("call-3"),
            )
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
