//! The standard middleware stack, in the order the pipeline
//! runs them: fallback, event emission, hook, permission, sandbox,
//! retry, timeout. The inner executor (deserialize + call) is not a
//! middleware — it is [`Next::run`]'s base case once the chain is
//! exhausted.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::json;
use stepforge_events::{EventBusKey, StandardEvent};
use stepforge_guardrail::SandboxConfig;
use stepforge_permission::{EvaluationContext, PermissionEvaluator, Verdict};
use stepforge_types::{DurationMs, ExecutionError, PermissionError, StepForgeError, StructuredValue};

use stepforge_context::ContextKey;

use crate::key::SandboxContextKey;
use crate::middleware::{Next, ToolCall, ToolMiddleware};
use crate::tool::{ToolContext, ToolOutput};

/// Emits `tool-call-begin` before the rest of the chain runs and
/// `tool-call-end` after, win or lose, with duration. Mandatory in the
/// standard pipeline, distinct from [`Logging`] which is a
/// tracing-only, event-bus-independent convenience.
pub struct EventEmitter;

#[async_trait]
impl ToolMiddleware for EventEmitter {
    async fn process(
        &self,
        call: &ToolCall,
        ctx: &ToolContext,
        next: Next<'_>,
    ) -> Result<ToolOutput, StepForgeError> {
        let bus = EventBusKey::current();
        bus.emit(
            StandardEvent::ToolCallBegin.as_str(),
            json!({
                "tool_use_id": call.tool_use_id.0,
                "name": call.name,
                "arguments": call.input,
                "session_id": ctx.session_id.0,
                "turn_id": ctx.turn_id.0,
            }),
        )
        .await;

        let started = Instant::now();
        let result = next.run(call, ctx).await;
        let duration = DurationMs::from(started.elapsed());

        match &result {
            Ok(output) => {
                bus.emit(
                    StandardEvent::ToolCallEnd.as_str(),
                    json!({
                        "tool_use_id": call.tool_use_id.0,
                        "name": call.name,
                        "success": true,
                        "output": output.structured,
                        "duration_ms": duration.as_millis(),
                    }),
                )
                .await;
            }
            Err(error) => {
                bus.emit(
                    StandardEvent::ToolCallEnd.as_str(),
                    json!({
                        "tool_use_id": call.tool_use_id.0,
                        "name": call.name,
                        "success": false,
                        "error": error.to_string(),
                        "duration_ms": duration.as_millis(),
                    }),
                )
                .await;
            }
        }
        result
    }
}

/// Inspects (and may rewrite) a tool call's arguments, or vetoes it
/// outright, before permission is consulted.
///
/// Blanket-implemented for closures, so most hooks never need a named
/// type.
pub trait ToolHook: Send + Sync {
    /// Return the arguments to proceed with (unchanged or rewritten),
    /// or a reason to deny the call.
    fn before_call(&self, call: &ToolCall) -> Result<StructuredValue, String>;
}

impl<F> ToolHook for F
where
    F: Fn(&ToolCall) -> Result<StructuredValue, String> + Send + Sync,
{
    fn before_call(&self, call: &ToolCall) -> Result<StructuredValue, String> {
        self(call)
    }
}

/// Runs a [`ToolHook`] before the rest of the chain. A rewritten
/// argument set is re-injected the same way permission's
/// `AllowWithModifiedArguments` is; a veto surfaces as
/// [`PermissionError::DeniedByHook`].
pub struct Hook {
    hook: Arc<dyn ToolHook>,
}

impl Hook {
    /// Wrap `hook` as middleware.
    pub fn new(hook: impl ToolHook + 'static) -> Self {
        Self { hook: Arc::new(hook) }
    }
}

#[async_trait]
impl ToolMiddleware for Hook {
    async fn process(
        &self,
        call: &ToolCall,
        ctx: &ToolContext,
        next: Next<'_>,
    ) -> Result<ToolOutput, StepForgeError> {
        match self.hook.before_call(call) {
            Ok(args) => {
                let modified = ToolCall {
                    input: args,
                    ..call.clone()
                };
                next.run(&modified, ctx).await
            }
            Err(reason) => Err(StepForgeError::Permission(PermissionError::DeniedByHook(reason))),
        }
    }
}

/// Consults a [`PermissionEvaluator`] before letting the call proceed.
pub struct Permission {
    evaluator: Arc<PermissionEvaluator>,
}

impl Permission {
    /// Wrap `evaluator` as middleware.
    pub fn new(evaluator: Arc<PermissionEvaluator>) -> Self {
        Self { evaluator }
    }
}

#[async_trait]
impl ToolMiddleware for Permission {
    async fn process(
        &self,
        call: &ToolCall,
        ctx: &ToolContext,
        next: Next<'_>,
    ) -> Result<ToolOutput, StepForgeError> {
        // `prior_calls` is populated by the session manager, which owns
        // the turn's call history; middleware running outside a session
        // (e.g. in tests) sees an empty history.
        let eval_ctx = EvaluationContext {
            session_id: ctx.session_id.clone(),
            turn_id: ctx.turn_id.clone(),
            prior_calls: Vec::new(),
        };
        match self.evaluator.evaluate(&call.name, &call.input, &eval_ctx).await {
            Verdict::Allow => next.run(call, ctx).await,
            Verdict::AllowWithModifiedArguments(args) => {
                let modified = ToolCall {
                    input: args,
                    ..call.clone()
                };
                next.run(&modified, ctx).await
            }
            Verdict::Deny(reason) => Err(StepForgeError::Permission(PermissionError::DeniedByRule(reason))),
            Verdict::Ask(reason) => {
                Err(StepForgeError::Permission(PermissionError::ApprovalRequired(reason)))
            }
        }
    }
}

/// Injects a sandbox configuration into the ambient context for the
/// duration of the call, read back by command-executing tools via
/// [`SandboxContextKey`].
pub struct Sandbox {
    config: Option<Arc<SandboxConfig>>,
}

impl Sandbox {
    /// No sandbox configured; tools see [`SandboxContextKey::default_value`].
    pub fn none() -> Self {
        Self { config: None }
    }

    /// Inject `config` for the duration of every call through this middleware.
    pub fn new(config: SandboxConfig) -> Self {
        Self {
            config: Some(Arc::new(config)),
        }
    }
}

#[async_trait]
impl ToolMiddleware for Sandbox {
    async fn process(
        &self,
        call: &ToolCall,
        ctx: &ToolContext,
        next: Next<'_>,
    ) -> Result<ToolOutput, StepForgeError> {
        SandboxContextKey::with_value(self.config.clone(), next.run(call, ctx)).await
    }
}

/// Retries a failing call with a strategy-computed delay (exponential
/// backoff from `base_delay`), up to `max_attempts` total attempts.
pub struct Retry {
    max_attempts: u32,
    base_delay: Duration,
    should_retry: Arc<dyn Fn(&StepForgeError) -> bool + Send + Sync>,
}

impl Retry {
    /// `max_attempts` total attempts (including the first), doubling
    /// `base_delay` after each failure, retrying every error.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            should_retry: Arc::new(|_| true),
        }
    }

    /// Only retry errors for which `predicate` returns `true`.
    pub fn with_predicate(
        mut self,
        predicate: impl Fn(&StepForgeError) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.should_retry = Arc::new(predicate);
        self
    }
}

#[async_trait]
impl ToolMiddleware for Retry {
    async fn process(
        &self,
        call: &ToolCall,
        ctx: &ToolContext,
        next: Next<'_>,
    ) -> Result<ToolOutput, StepForgeError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match next.run(call, ctx).await {
                Ok(output) => return Ok(output),
                Err(err) => {
                    if attempt >= self.max_attempts || !(self.should_retry)(&err) {
                        return if attempt >= self.max_attempts && attempt > 1 {
                            Err(StepForgeError::Execution(ExecutionError::RetryExhausted {
                                attempts: attempt,
                                last_error: err.to_string(),
                            }))
                        } else {
                            Err(err)
                        };
                    }
                    let delay = self.base_delay * 2u32.saturating_pow(attempt - 1);
                    tracing::debug!(tool = %call.name, attempt, ?delay, "retrying tool call");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Races the rest of the chain against a timeout.
pub struct Timeout {
    duration: Duration,
}

impl Timeout {
    /// Fail the call if it hasn't completed within `duration`.
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

#[async_trait]
impl ToolMiddleware for Timeout {
    async fn process(
        &self,
        call: &ToolCall,
        ctx: &ToolContext,
        next: Next<'_>,
    ) -> Result<ToolOutput, StepForgeError> {
        match tokio::time::timeout(self.duration, next.run(call, ctx)).await {
            Ok(result) => result,
            Err(_elapsed) => Err(StepForgeError::Execution(ExecutionError::Timeout(DurationMs::from(
                self.duration,
            )))),
        }
    }
}

/// Inspects a failed call's error and may substitute a fallback output
/// in its place, consulted only once the rest of the chain has already
/// failed.
///
/// Blanket-implemented for closures, so most error-hooks never need a
/// named type.
pub trait ErrorHook: Send + Sync {
    /// Given the call and the error it failed with, return fallback
    /// output text to substitute, or `None` to let the error propagate
    /// unchanged.
    fn on_error(&self, call: &ToolCall, error: &StepForgeError) -> Option<String>;
}

impl<F> ErrorHook for F
where
    F: Fn(&ToolCall, &StepForgeError) -> Option<String> + Send + Sync,
{
    fn on_error(&self, call: &ToolCall, error: &StepForgeError) -> Option<String> {
        self(call, error)
    }
}

/// Runs an [`ErrorHook`] when the rest of the chain fails.
///
/// A hook asking for a fallback models `PipelineError::FallbackRequested`
/// internally — this middleware is the only place that signal exists,
/// and it resolves straight into a successful, short-circuited output
/// rather than letting anything of the kind reach a caller. Typically
/// registered outermost, so it can catch a failure from anywhere deeper
/// in the chain, including the tool itself.
pub struct Fallback {
    hook: Arc<dyn ErrorHook>,
}

impl Fallback {
    /// Wrap `hook` as middleware.
    pub fn new(hook: impl ErrorHook + 'static) -> Self {
        Self { hook: Arc::new(hook) }
    }
}

#[async_trait]
impl ToolMiddleware for Fallback {
    async fn process(
        &self,
        call: &ToolCall,
        ctx: &ToolContext,
        next: Next<'_>,
    ) -> Result<ToolOutput, StepForgeError> {
        let error = match next.run(call, ctx).await {
            Ok(output) => return Ok(output),
            Err(error) => error,
        };
        match self.hook.on_error(call, &error) {
            Some(fallback_output) => Ok(ToolOutput::short_circuit(
                fallback_output.clone(),
                StructuredValue::String(fallback_output),
            )),
            None => Err(error),
        }
    }
}

/// Logs each call at `debug` level via `tracing`. Independent of the
/// event bus — a caller can add this without wiring up an
/// [`stepforge_events::EventBus`] subscriber at all.
pub struct Logging;

#[async_trait]
impl ToolMiddleware for Logging {
    async fn process(
        &self,
        call: &ToolCall,
        ctx: &ToolContext,
        next: Next<'_>,
    ) -> Result<ToolOutput, StepForgeError> {
        tracing::debug!(tool = %call.name, tool_use_id = %call.tool_use_id.0, "calling tool");
        let result = next.run(call, ctx).await;
        match &result {
            Ok(_) => tracing::debug!(tool = %call.name, "tool call succeeded"),
            Err(error) => tracing::debug!(tool = %call.name, %error, "tool call failed"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use stepforge_permission::{rule, DefaultAction, Mode, RuleSet};
    use stepforge_types::ToPromptRepresentation;

    use crate::registry::ToolRegistry;
    use crate::tool::Tool;

    #[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
    struct Args {
        #[allow(dead_code)]
        value: u32,
    }

    #[derive(Debug, serde::Serialize)]
    struct Output(u32);

    impl ToPromptRepresentation for Output {
        fn to_prompt_representation(&self) -> String {
            self.0.to_string()
        }
    }

    struct CountingTool {
        calls: Arc<AtomicU32>,
        fail_until: u32,
    }

    #[async_trait]
    impl Tool for CountingTool {
        type Args = Args;
        type Output = Output;
        const NAME: &'static str = "counting";

        fn description(&self) -> String {
            "increments on each call, failing until a threshold".into()
        }

        async fn call(&self, args: Args, _ctx: &ToolContext) -> Result<Output, ExecutionError> {
            let attempt = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt < self.fail_until {
                Err(ExecutionError::InvalidArguments("not yet".into()))
            } else {
                Ok(Output(args.value))
            }
        }
    }

    fn tool_use_id() -> stepforge_types::ToolUseId {
        stepforge_types::ToolUseId::new("test-call")
    }

    #[tokio::test]
    async fn hook_middleware_rewrites_arguments_before_the_tool_runs() {
        let mut registry = ToolRegistry::new();
        registry.register(CountingTool {
            calls: Arc::new(AtomicU32::new(0)),
            fail_until: 0,
        });
        registry.add_middleware(Hook::new(|call: &ToolCall| {
            let mut args = call.input.clone();
            args["value"] = serde_json::json!(42);
            Ok(args)
        }));

        let output = registry
            .execute("counting", serde_json::json!({"value": 1}), tool_use_id())
            .await
            .unwrap();
        assert_eq!(output.prompt_representation, "42");
    }

    #[tokio::test]
    async fn hook_middleware_can_veto_a_call() {
        let mut registry = ToolRegistry::new();
        registry.register(CountingTool {
            calls: Arc::new(AtomicU32::new(0)),
            fail_until: 0,
        });
        registry.add_middleware(Hook::new(|_call: &ToolCall| Err("no".to_string())));

        let err = registry
            .execute("counting", serde_json::json!({"value": 1}), tool_use_id())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StepForgeError::Permission(stepforge_types::PermissionError::DeniedByHook(_))
        ));
    }

    #[tokio::test]
    async fn fallback_middleware_substitutes_output_on_failure() {
        let mut registry = ToolRegistry::new();
        registry.register(CountingTool {
            calls: Arc::new(AtomicU32::new(0)),
            fail_until: u32::MAX,
        });
        registry.add_middleware(Fallback::new(|_call: &ToolCall, _error: &StepForgeError| {
            Some("used the fallback".to_string())
        }));

        let output = registry
            .execute("counting", serde_json::json!({"value": 1}), tool_use_id())
            .await
            .unwrap();
        assert_eq!(output.prompt_representation, "used the fallback");
        assert!(output.short_circuited);
    }

    #[tokio::test]
    async fn fallback_middleware_declining_lets_the_error_propagate() {
        let mut registry = ToolRegistry::new();
        registry.register(CountingTool {
            calls: Arc::new(AtomicU32::new(0)),
            fail_until: u32::MAX,
        });
        registry.add_middleware(Fallback::new(|_call: &ToolCall, _error: &StepForgeError| None));

        let err = registry
            .execute("counting", serde_json::json!({"value": 1}), tool_use_id())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StepForgeError::Execution(ExecutionError::InvalidArguments(_))
        ));
    }

    #[tokio::test]
    async fn permission_middleware_denies_a_blocked_tool() {
        let mut rules = RuleSet::new();
        rules.deny(rule("counting"));
        let evaluator = Arc::new(PermissionEvaluator::new());
        evaluator.load_rules(rules).await;

        let mut registry = ToolRegistry::new();
        registry.register(CountingTool {
            calls: Arc::new(AtomicU32::new(0)),
            fail_until: 0,
        });
        registry.add_middleware(Permission::new(evaluator));

        let err = registry
            .execute("counting", serde_json::json!({"value": 1}), tool_use_id())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StepForgeError::Permission(stepforge_types::PermissionError::DeniedByRule(_))
        ));
    }

    #[tokio::test]
    async fn permission_middleware_allows_when_default_mode_allows() {
        let evaluator = Arc::new(PermissionEvaluator::new());
        evaluator.set_default_action(DefaultAction::Allow).await;
        evaluator.set_mode(Mode::Default).await;

        let mut registry = ToolRegistry::new();
        registry.register(CountingTool {
            calls: Arc::new(AtomicU32::new(0)),
            fail_until: 0,
        });
        registry.add_middleware(Permission::new(evaluator));

        registry
            .execute("counting", serde_json::json!({"value": 7}), tool_use_id())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn retry_succeeds_once_the_tool_stops_failing() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut registry = ToolRegistry::new();
        registry.register(CountingTool {
            calls: Arc::clone(&calls),
            fail_until: 3,
        });
        registry.add_middleware(Retry::new(5, Duration::from_millis(1)));

        registry
            .execute("counting", serde_json::json!({"value": 9}), tool_use_id())
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut registry = ToolRegistry::new();
        registry.register(CountingTool {
            calls: Arc::clone(&calls),
            fail_until: 100,
        });
        registry.add_middleware(Retry::new(3, Duration::from_millis(1)));

        let err = registry
            .execute("counting", serde_json::json!({"value": 9}), tool_use_id())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StepForgeError::Execution(ExecutionError::RetryExhausted { attempts: 3, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn timeout_middleware_fails_slow_calls() {
        struct SlowTool;

        #[async_trait]
        impl Tool for SlowTool {
            type Args = Args;
            type Output = Output;
            const NAME: &'static str = "slow";

            fn description(&self) -> String {
                "sleeps past its timeout".into()
            }

            async fn call(&self, args: Args, _ctx: &ToolContext) -> Result<Output, ExecutionError> {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(Output(args.value))
            }
        }

        let mut registry = ToolRegistry::new();
        registry.register(SlowTool);
        registry.add_middleware(Timeout::new(Duration::from_millis(5)));

        let err = registry
            .execute("slow", serde_json::json!({"value": 1}), tool_use_id())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StepForgeError::Execution(ExecutionError::Timeout(_))
        ));
    }
}
