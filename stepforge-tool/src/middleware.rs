//! The middleware chain a tool call passes through before reaching the
//! tool itself.
//!
//! A middleware may inspect the call, replace it before calling `next`,
//! short-circuit by returning without calling `next`, or remap the
//! result coming back. The pattern mirrors axum's `from_fn`: each
//! middleware receives a [`Next`] it can `.run()` to continue the
//! chain.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use stepforge_types::{StepForgeError, StructuredValue, ToolUseId};

use crate::tool::{ToolContext, ToolDyn, ToolOutput};

/// A tool call in flight through the pipeline.
#[derive(Debug, Clone)]
pub struct ToolCall {
    /// The id the model assigned to this call.
    pub tool_use_id: ToolUseId,
    /// The tool being called.
    pub name: String,
    /// The (possibly already-modified) JSON arguments.
    pub input: StructuredValue,
}

/// Middleware wrapping tool execution.
#[async_trait]
pub trait ToolMiddleware: Send + Sync {
    /// Process `call`, optionally delegating to `next`.
    async fn process(
        &self,
        call: &ToolCall,
        ctx: &ToolContext,
        next: Next<'_>,
    ) -> Result<ToolOutput, StepForgeError>;
}

/// The remaining middleware chain plus the tool at its end.
///
/// `Next::run` takes `self` by value but `Next` is `Copy`, so a
/// middleware that needs to invoke the rest of the chain more than once
/// (e.g. a retry wrapper) can do so across loop iterations.
#[derive(Clone, Copy)]
pub struct Next<'n> {
    tool: &'n dyn ToolDyn,
    middleware: &'n [Arc<dyn ToolMiddleware>],
}

impl<'n> Next<'n> {
    pub(crate) fn new(tool: &'n dyn ToolDyn, middleware: &'n [Arc<dyn ToolMiddleware>]) -> Self {
        Self { tool, middleware }
    }

    /// Continue the chain: run the next middleware, or, once the chain
    /// is exhausted, deserialize `call.input` and invoke the tool.
    pub async fn run(self, call: &ToolCall, ctx: &ToolContext) -> Result<ToolOutput, StepForgeError> {
        if let Some((head, tail)) = self.middleware.split_first() {
            head.process(call, ctx, Next::new(self.tool, tail)).await
        } else {
            self.tool.call_dyn(call.input.clone(), ctx).await
        }
    }
}

struct MiddlewareFn<F>(F);

#[async_trait]
impl<F, Fut> ToolMiddleware for MiddlewareFn<F>
where
    F: for<'n> Fn(ToolCall, &'n ToolContext, Next<'n>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ToolOutput, StepForgeError>> + Send,
{
    async fn process(
        &self,
        call: &ToolCall,
        ctx: &ToolContext,
        next: Next<'_>,
    ) -> Result<ToolOutput, StepForgeError> {
        (self.0)(call.clone(), ctx, next).await
    }
}

/// Build middleware from an async closure, without declaring a named type.
pub fn tool_middleware_fn<F, Fut>(f: F) -> impl ToolMiddleware
where
    F: for<'n> Fn(ToolCall, &'n ToolContext, Next<'n>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ToolOutput, StepForgeError>> + Send,
{
    MiddlewareFn(f)
}
