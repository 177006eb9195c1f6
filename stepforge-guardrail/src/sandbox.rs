//! Declarative sandbox configuration attached to a guardrail scope.

use serde::{Deserialize, Serialize};

/// How a sandboxed tool call may reach the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkPolicy {
    /// Network access is permitted.
    Allow,
    /// Network access is denied outright.
    Deny,
    /// No network stack is attached at all.
    Off,
}

/// The sandbox a tool call executes under.
///
/// The declarative form composed by [`crate::GuardrailChain::resolve`]
/// is deliberately minimal: an allow-list of path prefixes and a
/// network policy. Concrete enforcement (namespaces, seccomp, chroot,
/// ...) is a host concern outside this crate's scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Path prefixes a tool call executing under this sandbox may touch.
    pub allowed_paths: Vec<String>,
    /// The network policy in effect.
    pub network: NetworkPolicy,
}

impl SandboxConfig {
    /// No filesystem access, no network.
    pub fn locked_down() -> Self {
        Self {
            allowed_paths: Vec::new(),
            network: NetworkPolicy::Off,
        }
    }

    /// Unrestricted: any path, network allowed.
    pub fn unrestricted() -> Self {
        Self {
            allowed_paths: vec!["/".to_string()],
            network: NetworkPolicy::Allow,
        }
    }
}
