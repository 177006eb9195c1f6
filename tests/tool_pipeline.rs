//! End-to-end exercise of the tool middleware pipeline: registry,
//! permission evaluator, and the mandatory event-emitting middleware,
//! wired together the way a real caller would assemble them.

use std::sync::Arc;

use serde_json::json;

use stepforge::prelude::*;
use stepforge_context::{ExecutorContext, ExecutorContextKey};
use stepforge_permission::Mode;
use stepforge_testkit::{AlwaysFailTool, RecordingEventBus, UppercaseTool};
use stepforge_tool::standard::{EventEmitter, Permission};

fn ctx() -> (SessionId, TurnId) {
    (SessionId::new("s-pipeline"), TurnId::new("t-pipeline"))
}

#[tokio::test]
async fn allowed_tool_runs_and_emits_begin_and_end_events() {
    let mut registry = ToolRegistry::new();
    registry.register(UppercaseTool);

    let evaluator = Arc::new(PermissionEvaluator::new());
    evaluator.set_mode(Mode::Bypass).await;
    registry.add_middleware(EventEmitter);
    registry.add_middleware(Permission::new(evaluator));

    let bus = Arc::new(EventBus::new());
    let recorder = RecordingEventBus::new();
    recorder.attach_to(&bus, StandardEvent::ToolCallBegin.as_str());
    recorder.attach_to(&bus, StandardEvent::ToolCallEnd.as_str());

    let (session_id, turn_id) = ctx();
    let output = EventBusKey::with_value(
        bus,
        ExecutorContextKey::with_value(
            ExecutorContext { session_id, turn_id },
            registry.execute(
                "uppercase",
                json!({ "text": "hi" }),
                ToolUseId::new("call-1"),
            ),
        ),
    )
    .await
    .unwrap();

    assert_eq!(output.prompt_representation, "HI");
    assert_eq!(
        recorder.event_names(),
        vec!["tool-call-begin".to_string(), "tool-call-end".to_string()]
    );
}

#[tokio::test]
async fn denied_tool_never_reaches_its_call_and_surfaces_a_permission_error() {
    let mut registry = ToolRegistry::new();
    registry.register(AlwaysFailTool);

    let mut rules = RuleSet::new();
    rules.deny(Rule::new("always_fail"));
    let evaluator = Arc::new(PermissionEvaluator::new());
    evaluator.load_rules(rules).await;
    registry.add_middleware(Permission::new(evaluator));

    let result = registry
        .execute("always_fail", json!({ "text": "x" }), ToolUseId::new("call-2"))
        .await;

    assert!(matches!(
        result,
        Err(StepForgeError::Permission(PermissionError::DeniedByRule(_)))
    ));
}
