//! The interactive session manager: FIFO turn ordering over
//! concurrent producers, mid-turn steering, cooperative cancellation,
//! and hot-swappable session backings.
//!
//! The worker loop below is the one place in the crate that owns
//! mutable session state; every other entry point talks to it over an
//! unbounded channel, so the channel itself *is* the wait-queue —
//! commands are delivered in send order and processed one at a time.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;

use stepforge_context::{ContextKey, ExecutorContext, ExecutorContextKey};
use stepforge_events::{EventBus, EventBusKey, StandardEvent};
use stepforge_types::{SessionError, SessionId, StepForgeError, TurnId};

use crate::backing::SessionBacking;
use crate::storage::{SessionSnapshot, TranscriptEntry};
use crate::turn::{ToolCallRecord, TurnResponse};

enum Command {
    Send {
        content: String,
        cancel: CancellationToken,
        respond_to: oneshot::Sender<Result<TurnResponse, StepForgeError>>,
    },
    Steer(String),
    ReplaceBacking(Arc<dyn SessionBacking>),
    Snapshot(oneshot::Sender<SessionSnapshot>),
}

/// Handle returned by [`SessionManager::send`]. Awaiting it (via
/// [`SendHandle::wait`]) yields the turn's eventual result; dropping it
/// or calling [`SendHandle::cancel`] requests cancellation without
/// blocking on the result.
pub struct SendHandle {
    receiver: oneshot::Receiver<Result<TurnResponse, StepForgeError>>,
    cancel: CancellationToken,
}

impl SendHandle {
    /// Request cancellation of this call.
    ///
    /// If the call is still queued, it is skipped entirely without
    /// consuming the processing slot. If its turn has already started,
    /// the turn runs to completion on the session's worker, but this
    /// handle resolves with [`SessionError::Cancelled`] instead of the
    /// real result.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for this call's turn to be processed (or cancelled).
    pub async fn wait(self) -> Result<TurnResponse, StepForgeError> {
        match self.receiver.await {
            Ok(result) => result,
            Err(_) => Err(StepForgeError::from(SessionError::SessionClosed)),
        }
    }
}

/// Drives one conversation: a single worker task processes `send`
/// calls strictly in arrival order, draining the steering buffer at
/// the start of each turn it begins.
pub struct SessionManager {
    id: SessionId,
    tx: mpsc::UnboundedSender<Command>,
    bus: Arc<EventBus>,
}

impl SessionManager {
    /// Start a new session worker over `backing`, with a freshly
    /// generated id and an empty transcript.
    pub fn new(backing: Arc<dyn SessionBacking>) -> Self {
        Self::spawn(SessionId::new(uuid::Uuid::new_v4().to_string()), Vec::new(), backing)
    }

    /// Recreate a session from `snapshot`, wired to `backing`, without
    /// replaying any tool calls.
    pub fn restore(snapshot: SessionSnapshot, backing: Arc<dyn SessionBacking>) -> Self {
        Self::spawn(snapshot.id, snapshot.transcript, backing)
    }

    fn spawn(id: SessionId, transcript: Vec<TranscriptEntry>, backing: Arc<dyn SessionBacking>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let bus = Arc::new(EventBus::new());
        tokio::spawn(Self::run(id.clone(), transcript, rx, backing, bus.clone()));
        Self { id, tx, bus }
    }

    /// This session's id.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// The session's event bus (tool-call and turn/session lifecycle
    /// events land here).
    pub fn event_bus(&self) -> Arc<EventBus> {
        self.bus.clone()
    }

    /// Snapshot the session's transcript so far, as `{transcript, id}`.
    pub async fn snapshot(&self) -> SessionSnapshot {
        let (tx, rx) = oneshot::channel();
        let _ = self.tx.send(Command::Snapshot(tx));
        rx.await.unwrap_or_else(|_| SessionSnapshot {
            id: self.id.clone(),
            transcript: Vec::new(),
        })
    }

    /// Append a steering fragment. Drained in full, in append order, at
    /// the start of the next turn that begins processing after this
    /// call returns.
    pub fn steer(&self, fragment: impl Into<String>) {
        let _ = self.tx.send(Command::Steer(fragment.into()));
    }

    /// Replace the session's backing. The in-flight turn (if any) keeps
    /// using the reference it captured at turn-start; the next turn
    /// picks up `new_backing`.
    pub fn replace_session(&self, new_backing: Arc<dyn SessionBacking>) {
        let _ = self.tx.send(Command::ReplaceBacking(new_backing));
    }

    /// Enqueue `content` for processing.
    pub fn send(&self, content: impl Into<String>) -> SendHandle {
        let (respond_to, receiver) = oneshot::channel();
        let cancel = CancellationToken::new();
        let _ = self.tx.send(Command::Send {
            content: content.into(),
            cancel: cancel.clone(),
            respond_to,
        });
        SendHandle { receiver, cancel }
    }

    async fn run(
        id: SessionId,
        mut transcript: Vec<TranscriptEntry>,
        mut rx: mpsc::UnboundedReceiver<Command>,
        mut backing: Arc<dyn SessionBacking>,
        bus: Arc<EventBus>,
    ) {
        let tool_calls = Arc::new(AsyncMutex::new(ToolCallAccumulator::new()));
        {
            let begin_tool_calls = tool_calls.clone();
            bus.on_fn(StandardEvent::ToolCallBegin.as_str(), move |_name, payload| {
                let tool_calls = begin_tool_calls.clone();
                async move {
                    tool_calls.lock().await.begin(&payload);
                }
            });
            let end_tool_calls = tool_calls.clone();
            bus.on_fn(StandardEvent::ToolCallEnd.as_str(), move |_name, payload| {
                let tool_calls = end_tool_calls.clone();
                async move {
                    tool_calls.lock().await.end(&payload);
                }
            });
        }

        bus.emit(StandardEvent::SessionStarted.as_str(), Value::Null).await;

        let mut steering_buffer: Vec<String> = Vec::new();
        while let Some(command) = rx.recv().await {
            match command {
                Command::Steer(fragment) => steering_buffer.push(fragment),
                Command::ReplaceBacking(new_backing) => backing = new_backing,
                Command::Snapshot(respond_to) => {
                    let _ = respond_to.send(SessionSnapshot {
                        id: id.clone(),
                        transcript: transcript.clone(),
                    });
                }
                Command::Send {
                    content,
                    cancel,
                    respond_to,
                } => {
                    if cancel.is_cancelled() {
                        tracing::debug!("skipping cancelled send before it consumed the processing slot");
                        let _ = respond_to.send(Err(StepForgeError::from(SessionError::Cancelled)));
                        continue;
                    }

                    let mut full_content = steering_buffer.drain(..).collect::<Vec<_>>().join("\n");
                    if !full_content.is_empty() {
                        full_content.push('\n');
                    }
                    full_content.push_str(&content);

                    tool_calls.lock().await.reset();
                    bus.emit(StandardEvent::TurnBegin.as_str(), json!({ "content": full_content }))
                        .await;

                    let turn_backing = backing.clone();
                    let turn_id = TurnId::new(uuid::Uuid::new_v4().to_string());
                    let executor_ctx = ExecutorContext {
                        session_id: id.clone(),
                        turn_id,
                    };
                    let started = Instant::now();
                    let response = EventBusKey::with_value(
                        bus.clone(),
                        ExecutorContextKey::with_value(executor_ctx, turn_backing.respond(&full_content)),
                    )
                    .await;
                    let duration = started.elapsed().into();

                    bus.emit(StandardEvent::ResponseCompleted.as_str(), Value::Null).await;
                    tracing::debug!(success = response.is_ok(), "turn completed");
                    bus.emit(StandardEvent::TurnEnd.as_str(), Value::Null).await;

                    if let Ok(backing_response) = &response {
                        transcript.push(TranscriptEntry {
                            prompt: full_content.clone(),
                            response: backing_response.content.clone(),
                        });
                    }

                    let recorded_tool_calls = tool_calls.lock().await.take();
                    let result = response.map(|backing_response| TurnResponse {
                        content: backing_response.content,
                        raw_content: backing_response.raw_content,
                        transcript_entries: backing_response.transcript_entries,
                        tool_calls: recorded_tool_calls,
                        duration,
                    });

                    let outcome = if cancel.is_cancelled() {
                        Err(StepForgeError::from(SessionError::Cancelled))
                    } else {
                        result
                    };
                    let _ = respond_to.send(outcome);
                }
            }
        }

        bus.emit(StandardEvent::SessionEnded.as_str(), Value::Null).await;
    }
}

/// Builds [`ToolCallRecord`]s in invocation-begin order, filling in the
/// success/duration fields as each call's `tool-call-end` event lands.
struct ToolCallAccumulator {
    records: Vec<ToolCallRecord>,
    index: HashMap<String, usize>,
}

impl ToolCallAccumulator {
    fn new() -> Self {
        Self {
            records: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn reset(&mut self) {
        self.records.clear();
        self.index.clear();
    }

    fn begin(&mut self, payload: &Value) {
        let (Some(tool_use_id), Some(name)) = (
            payload.get("tool_use_id").and_then(Value::as_str),
            payload.get("name").and_then(Value::as_str),
        ) else {
            return;
        };
        self.index.insert(tool_use_id.to_string(), self.records.len());
        self.records.push(ToolCallRecord {
            tool_use_id: tool_use_id.to_string(),
            name: name.to_string(),
            success: false,
            duration: stepforge_types::DurationMs::ZERO,
        });
    }

    fn end(&mut self, payload: &Value) {
        let (Some(tool_use_id), Some(success), Some(duration_ms)) = (
            payload.get("tool_use_id").and_then(Value::as_str),
            payload.get("success").and_then(Value::as_bool),
            payload.get("duration_ms").and_then(Value::as_u64),
        ) else {
            return;
        };
        if let Some(&idx) = self.index.get(tool_use_id) {
            self.records[idx].success = success;
            self.records[idx].duration = stepforge_types::DurationMs::from_millis(duration_ms);
        }
    }

    fn take(&mut self) -> Vec<ToolCallRecord> {
        self.index.clear();
        std::mem::take(&mut self.records)
    }
}
