//! Rules and the four-bin-plus-override rule set.

use crate::pattern::Pattern;

/// One rule: a pattern plus the reason recorded if it fires a deny.
#[derive(Debug, Clone)]
pub struct Rule {
    pattern: Pattern,
    reason: Option<String>,
}

impl Rule {
    /// Create a rule from a pattern string, with no explicit reason.
    pub fn new(pattern: &str) -> Self {
        Self {
            pattern: Pattern::parse(pattern),
            reason: None,
        }
    }

    /// Attach an explanatory reason surfaced in `deny`/`final-deny` verdicts.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// The pattern string this rule was parsed from.
    pub fn pattern_str(&self) -> &str {
        self.pattern.as_str()
    }

    /// Whether this rule's pattern matches `(tool_name, arguments)`.
    pub fn matches(&self, tool_name: &str, arguments: &serde_json::Value) -> bool {
        self.pattern.matches(tool_name, arguments)
    }

    /// The reason to surface if this rule fires a deny: the explicit
    /// reason if one was set, otherwise a default derived from the
    /// pattern string.
    pub fn reason(&self) -> String {
        self.reason
            .clone()
            .unwrap_or_else(|| format!("matched rule `{}`", self.pattern.as_str()))
    }
}

/// The rule storage: four bins plus a separate override set.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    pub(crate) final_deny: Vec<Rule>,
    pub(crate) deny: Vec<Rule>,
    pub(crate) ask: Vec<Rule>,
    pub(crate) allow: Vec<Rule>,
    pub(crate) overrides: Vec<Rule>,
}

impl RuleSet {
    /// An empty rule set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule to the `final-deny` bin.
    pub fn final_deny(&mut self, rule: Rule) -> &mut Self {
        self.final_deny.push(rule);
        self
    }

    /// Add a rule to the `deny` bin.
    pub fn deny(&mut self, rule: Rule) -> &mut Self {
        self.deny.push(rule);
        self
    }

    /// Add a rule to the `ask` bin.
    pub fn ask(&mut self, rule: Rule) -> &mut Self {
        self.ask.push(rule);
        self
    }

    /// Add a rule to the `allow` bin.
    pub fn allow(&mut self, rule: Rule) -> &mut Self {
        self.allow.push(rule);
        self
    }

    /// Add a rule to the `override` set.
    pub fn add_override(&mut self, rule: Rule) -> &mut Self {
        self.overrides.push(rule);
        self
    }

    /// Append-with-deduplication merge of `other` into `self`: rules
    /// already present (by pattern string) in the target bin are not
    /// duplicated.
    pub fn merge(&mut self, other: RuleSet) {
        merge_bin(&mut self.final_deny, other.final_deny);
        merge_bin(&mut self.deny, other.deny);
        merge_bin(&mut self.ask, other.ask);
        merge_bin(&mut self.allow, other.allow);
        merge_bin(&mut self.overrides, other.overrides);
    }

    /// The `allow` bin.
    pub fn allow_rules(&self) -> &[Rule] {
        &self.allow
    }

    /// The `deny` bin.
    pub fn deny_rules(&self) -> &[Rule] {
        &self.deny
    }

    /// The `ask` bin.
    pub fn ask_rules(&self) -> &[Rule] {
        &self.ask
    }

    /// The `final-deny` bin.
    pub fn final_deny_rules(&self) -> &[Rule] {
        &self.final_deny
    }

    /// The `override` set.
    pub fn override_rules(&self) -> &[Rule] {
        &self.overrides
    }

    /// Drop `deny` rules for which `keep` returns `false`. Used by
    /// guardrail composition to carve an override out of an ancestor's
    /// `deny` bin; never touches `final_deny`.
    pub fn retain_deny(&mut self, keep: impl FnMut(&Rule) -> bool) {
        self.deny.retain(keep);
    }
}

fn merge_bin(into: &mut Vec<Rule>, from: Vec<Rule>) {
    for rule in from {
        if !into.iter().any(|existing| existing.pattern_str() == rule.pattern_str()) {
            into.push(rule);
        }
    }
}
