//! A single scope's guardrail rules, and the ancestor chain that
//! composes them into one [`stepforge_permission::RuleSet`].

use stepforge_permission::{Rule, RuleSet};

use crate::sandbox::SandboxConfig;

/// The rules declared at one scope (e.g. one session, one sub-agent,
/// one project directory). A scope only ever ADDS rules relative to
/// its parent; the only way to narrow a parent's `deny` is `override`.
#[derive(Debug, Clone, Default)]
pub struct Guardrail {
    allow: Vec<Rule>,
    deny: Vec<Rule>,
    deny_final: Vec<Rule>,
    ask_user: Vec<Rule>,
    overrides: Vec<Rule>,
    sandboxes: Vec<SandboxConfig>,
}

impl Guardrail {
    /// An empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow calls matching `rule`.
    pub fn allow(mut self, rule: Rule) -> Self {
        self.allow.push(rule);
        self
    }

    /// Deny calls matching `rule`, unless a descendant overrides it.
    pub fn deny(mut self, rule: Rule) -> Self {
        self.deny.push(rule);
        self
    }

    /// Deny calls matching `rule`; no descendant override can remove this.
    pub fn deny_final(mut self, rule: Rule) -> Self {
        self.deny_final.push(rule);
        self
    }

    /// Require interactive approval for calls matching `rule`.
    pub fn ask_user(mut self, rule: Rule) -> Self {
        self.ask_user.push(rule);
        self
    }

    /// Carve an exception out of an ancestor's `deny(p)`, where `p`
    /// equals this override's pattern string exactly (see
    /// [`stepforge_permission::Pattern`]'s equality note). Has no
    /// effect on any ancestor's `deny_final`.
    pub fn add_override(mut self, rule: Rule) -> Self {
        self.overrides.push(rule);
        self
    }

    /// Declare the sandbox this scope executes under. Later calls in
    /// the same scope take precedence over earlier ones when this
    /// scope turns out to be the nearest one with a sandbox declared.
    pub fn sandbox(mut self, config: SandboxConfig) -> Self {
        self.sandboxes.push(config);
        self
    }
}

/// An ordered chain of scopes, outermost (root) first and innermost
/// (nearest to the call site) last.
#[derive(Debug, Clone, Default)]
pub struct GuardrailChain {
    scopes: Vec<Guardrail>,
}

impl GuardrailChain {
    /// An empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a new, nearer scope onto the chain.
    pub fn push(&mut self, scope: Guardrail) -> &mut Self {
        self.scopes.push(scope);
        self
    }

    /// Compose every scope, outermost to innermost, into a single
    /// [`RuleSet`]: each scope's bins are additive, then that scope's
    /// `override`s remove any ancestor `deny` rule (not `deny_final`)
    /// with the exact same pattern string.
    pub fn resolve(&self) -> RuleSet {
        let mut rules = RuleSet::new();
        for scope in &self.scopes {
            for rule in &scope.allow {
                rules.allow(rule.clone());
            }
            for rule in &scope.deny {
                rules.deny(rule.clone());
            }
            for rule in &scope.deny_final {
                rules.final_deny(rule.clone());
            }
            for rule in &scope.ask_user {
                rules.ask(rule.clone());
            }
            for rule in &scope.overrides {
                remove_matching_deny(&mut rules, rule);
                rules.add_override(rule.clone());
            }
        }
        rules
    }

    /// The effective sandbox: the nearest scope (searching innermost
    /// to outermost) that declared one, last-declared-wins within
    /// that scope.
    pub fn resolve_sandbox(&self) -> Option<&SandboxConfig> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.sandboxes.last())
    }
}

fn remove_matching_deny(rules: &mut RuleSet, override_rule: &Rule) {
    rules.retain_deny(|deny_rule| deny_rule.pattern_str() != override_rule.pattern_str());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stepforge_permission::rule;

    #[test]
    fn child_additions_accumulate_on_top_of_parent() {
        let mut chain = GuardrailChain::new();
        chain.push(Guardrail::new().allow(rule("Read")));
        chain.push(Guardrail::new().deny(rule("Bash(rm:*)")));
        let resolved = chain.resolve();
        assert_eq!(resolved.allow_rules().len(), 1);
        assert_eq!(resolved.deny_rules().len(), 1);
    }

    #[test]
    fn override_removes_exact_matching_parent_deny() {
        let mut chain = GuardrailChain::new();
        chain.push(Guardrail::new().deny(rule("Bash(rm:*)")));
        chain.push(Guardrail::new().add_override(rule("Bash(rm:*)")));
        let resolved = chain.resolve();
        assert!(resolved.deny_rules().is_empty());
        assert_eq!(resolved.override_rules().len(), 1);
    }

    #[test]
    fn override_never_removes_deny_final() {
        let mut chain = GuardrailChain::new();
        chain.push(Guardrail::new().deny_final(rule("Bash(sudo:*)")));
        chain.push(Guardrail::new().add_override(rule("Bash(sudo:*)")));
        let resolved = chain.resolve();
        assert_eq!(resolved.final_deny_rules().len(), 1);
    }

    #[test]
    fn override_with_a_different_pattern_does_not_remove_deny() {
        let mut chain = GuardrailChain::new();
        chain.push(Guardrail::new().deny(rule("Bash(rm:*)")));
        chain.push(Guardrail::new().add_override(rule("Bash(rm:*.tmp)")));
        let resolved = chain.resolve();
        assert_eq!(resolved.deny_rules().len(), 1);
    }

    #[test]
    fn nearest_scope_sandbox_wins() {
        let mut chain = GuardrailChain::new();
        chain.push(Guardrail::new().sandbox(SandboxConfig::unrestricted()));
        chain.push(Guardrail::new().sandbox(SandboxConfig::locked_down()));
        let resolved = chain.resolve_sandbox().unwrap();
        assert_eq!(resolved, &SandboxConfig::locked_down());
    }

    #[test]
    fn scope_with_no_sandbox_falls_back_to_ancestor() {
        let mut chain = GuardrailChain::new();
        chain.push(Guardrail::new().sandbox(SandboxConfig::locked_down()));
        chain.push(Guardrail::new().allow(rule("Read")));
        let resolved = chain.resolve_sandbox().unwrap();
        assert_eq!(resolved, &SandboxConfig::locked_down());
    }

    #[test]
    fn resolved_rules_are_usable_for_matching() {
        let mut chain = GuardrailChain::new();
        chain.push(Guardrail::new().deny(rule("Bash(rm:*)")));
        let resolved = chain.resolve();
        assert!(resolved.deny_rules()[0].matches("Bash", &json!({ "command": "rm -rf /" })));
    }
}
