//! Scoped guardrail composition.
//!
//! A [`GuardrailChain`] strings together the guardrails declared at
//! each enclosing scope — outermost first, nearest to the call site
//! last — and composes them into a single
//! [`stepforge_permission::RuleSet`] plus an effective
//! [`SandboxConfig`]. Scopes only add rules relative to their parent;
//! `override` is the one exception, letting a nearer scope carve a
//! specific pattern back out of an ancestor's `deny`.
//!
//! ```
//! use stepforge_guardrail::{Guardrail, GuardrailChain};
//! use stepforge_permission::rule;
//!
//! let mut chain = GuardrailChain::new();
//! chain.push(Guardrail::new().deny(rule("Bash(rm:*)")));
//! chain.push(Guardrail::new().add_override(rule("Bash(rm:*.tmp)")));
//! let rules = chain.resolve();
//! assert_eq!(rules.deny_rules().len(), 1);
//! assert_eq!(rules.override_rules().len(), 1);
//! ```

mod guardrail;
mod sandbox;

pub use guardrail::{Guardrail, GuardrailChain};
pub use sandbox::{NetworkPolicy, SandboxConfig};
