//! The layered permission evaluator.
//!
//! Tool calls are checked against `final-deny`, `deny`, `ask`, and
//! `allow` rule bins (plus an `override` set that can carve exceptions
//! out of a parent's `deny` rules), then the current [`Mode`], then an
//! optional interactive [`PermissionHandler`], then a configured
//! [`DefaultAction`].
//!
//! ```no_run
//! use stepforge_permission::{rule, DefaultAction, EvaluationContext, Mode, PermissionEvaluator, RuleSet};
//! use serde_json::json;
//!
//! # async fn run() {
//! let evaluator = PermissionEvaluator::new();
//! let mut rules = RuleSet::new();
//! rules.allow(rule("Read"));
//! rules.deny(rule("Bash(rm:*)"));
//! evaluator.load_rules(rules).await;
//! evaluator.set_default_action(DefaultAction::Deny).await;
//!
//! let verdict = evaluator
//!     .evaluate("Read", &json!({ "path": "/tmp/x" }), &EvaluationContext::default())
//!     .await;
//! # let _ = verdict;
//! # let _ = Mode::Default;
//! # }
//! ```

mod evaluator;
mod handler;
mod mode;
mod pattern;
mod rule;
mod rule_file;

pub use evaluator::{rule, PermissionEvaluator, Verdict};
pub use handler::{EvaluationContext, HandlerDecision, PermissionHandler, PermissionRequest, ToolCallRecord};
pub use mode::{DefaultAction, Mode};
pub use pattern::Pattern;
pub use rule::{Rule, RuleSet};
pub use rule_file::{PermissionRuleFile, RuleFileError};
