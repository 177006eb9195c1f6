//! The context key a running tool reads to learn its sandbox.

use std::sync::Arc;

use stepforge_context::ContextKey;
use stepforge_guardrail::SandboxConfig;

/// Carries the sandbox configuration the [`crate::standard::Sandbox`]
/// middleware injected for the current call, if any. Command-executing
/// tools read this (rather than taking a sandbox parameter directly) so
/// they don't need to know whether they're running under a guardrail
/// chain at all.
#[derive(ContextKey)]
#[context_key(value = Option<Arc<SandboxConfig>>, default = None)]
pub struct SandboxContextKey;
