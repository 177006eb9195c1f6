//! Tool trait, middleware pipeline, and registry.
//!
//! ```no_run
//! use std::sync::Arc;
//! use stepforge_tool::{standard, Tool, ToolContext, ToolRegistry};
//! use stepforge_types::{ExecutionError, ToPromptRepresentation, ToolUseId};
//! use stepforge_permission::PermissionEvaluator;
//! use schemars::JsonSchema;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Deserialize, JsonSchema)]
//! struct ReadArgs { path: String }
//! #[derive(Serialize)]
//! struct ReadOutput { contents: String }
//! impl ToPromptRepresentation for ReadOutput {
//!     fn to_prompt_representation(&self) -> String { self.contents.clone() }
//! }
//!
//! struct ReadFile;
//! #[async_trait::async_trait]
//! impl Tool for ReadFile {
//!     type Args = ReadArgs;
//!     type Output = ReadOutput;
//!     const NAME: &'static str = "read_file";
//!     fn description(&self) -> String { "Reads a file".into() }
//!     async fn call(&self, args: ReadArgs, _ctx: &ToolContext) -> Result<ReadOutput, ExecutionError> {
//!         Ok(ReadOutput { contents: args.path })
//!     }
//! }
//!
//! # async fn run(evaluator: Arc<PermissionEvaluator>) {
//! let mut registry = ToolRegistry::new();
//! registry.register(ReadFile);
//! registry.add_middleware(standard::EventEmitter);
//! registry.add_middleware(standard::Permission::new(evaluator));
//!
//! registry
//!     .execute("read_file", serde_json::json!({"path": "x.txt"}), ToolUseId::new("call-1"))
//!     .await
//!     .unwrap();
//! # }
//! ```

pub mod key;
pub mod middleware;
pub mod registry;
pub mod standard;
pub mod tool;

pub use key::SandboxContextKey;
pub use middleware::{tool_middleware_fn, Next, ToolCall, ToolMiddleware};
pub use registry::ToolRegistry;
pub use standard::{ErrorHook, Fallback, Hook, ToolHook};
pub use tool::{Tool, ToolContext, ToolDyn, ToolOutput};
