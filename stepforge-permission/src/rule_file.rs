//! Loading rule sets from the on-disk permission settings format.

use serde::{Deserialize, Serialize};

use crate::mode::{DefaultAction, Mode};
use crate::rule::{Rule, RuleSet};

/// The `permissions` block of a settings file.
///
/// ```json
/// {
///   "permissions": {
///     "defaultMode": "default",
///     "allow": ["Read", "Bash(git:*)"],
///     "deny": ["Bash(rm:*)"],
///     "ask": ["WebFetch"],
///     "finalDeny": ["Bash(sudo:*)"],
///     "overrides": ["Bash(rm:*.tmp)"],
///     "toolLevels": { "Bash": "write" },
///     "maxLevel": "write"
///   }
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PermissionRuleFile {
    #[serde(default)]
    permissions: PermissionBlock,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PermissionBlock {
    #[serde(rename = "defaultMode", skip_serializing_if = "Option::is_none")]
    default_mode: Option<String>,
    #[serde(default)]
    allow: Vec<String>,
    #[serde(default)]
    deny: Vec<String>,
    #[serde(default)]
    ask: Vec<String>,
    #[serde(rename = "finalDeny", default)]
    final_deny: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    overrides: Vec<String>,
    #[serde(rename = "toolLevels", default, skip_serializing_if = "std::collections::HashMap::is_empty")]
    tool_levels: std::collections::HashMap<String, String>,
    #[serde(rename = "maxLevel", skip_serializing_if = "Option::is_none")]
    max_level: Option<String>,
}

/// Error parsing a rule file's `defaultMode` value.
#[derive(Debug, thiserror::Error)]
pub enum RuleFileError {
    /// `defaultMode` was present but not one of the recognized strings.
    #[error("unrecognized defaultMode `{0}`")]
    UnknownMode(String),
    /// The JSON itself didn't parse.
    #[error("invalid permission rule file: {0}")]
    Json(#[from] serde_json::Error),
}

impl PermissionRuleFile {
    /// Parse a rule file from its JSON text.
    pub fn from_json(text: &str) -> Result<Self, RuleFileError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Serialize back to the on-disk JSON shape.
    pub fn to_json(&self) -> Result<String, RuleFileError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The `defaultMode`, if the file specifies one.
    pub fn default_mode(&self) -> Result<Option<Mode>, RuleFileError> {
        match self.permissions.default_mode.as_deref() {
            None => Ok(None),
            Some("default") => Ok(Some(Mode::Default)),
            Some("acceptEdits") => Ok(Some(Mode::AcceptEdits)),
            Some("bypassPermissions") | Some("bypass") => Ok(Some(Mode::Bypass)),
            Some("plan") => Ok(Some(Mode::Plan)),
            Some(other) => Err(RuleFileError::UnknownMode(other.to_string())),
        }
    }

    /// Build the [`RuleSet`] this file describes.
    pub fn rule_set(&self) -> RuleSet {
        let mut rules = RuleSet::new();
        for pattern in &self.permissions.allow {
            rules.allow(Rule::new(pattern));
        }
        for pattern in &self.permissions.deny {
            rules.deny(Rule::new(pattern));
        }
        for pattern in &self.permissions.ask {
            rules.ask(Rule::new(pattern));
        }
        for pattern in &self.permissions.final_deny {
            rules.final_deny(Rule::new(pattern));
        }
        for pattern in &self.permissions.overrides {
            rules.add_override(Rule::new(pattern));
        }
        rules
    }

    /// Merge another rule file on top of this one: list-valued fields
    /// append-with-dedup, scalar fields (`defaultMode`, `maxLevel`) are
    /// overwritten by whichever file sets them last, matching the
    /// layered settings precedence (user < project < local).
    pub fn merge(&mut self, other: PermissionRuleFile) {
        if other.permissions.default_mode.is_some() {
            self.permissions.default_mode = other.permissions.default_mode;
        }
        if other.permissions.max_level.is_some() {
            self.permissions.max_level = other.permissions.max_level;
        }
        append_dedup(&mut self.permissions.allow, other.permissions.allow);
        append_dedup(&mut self.permissions.deny, other.permissions.deny);
        append_dedup(&mut self.permissions.ask, other.permissions.ask);
        append_dedup(&mut self.permissions.final_deny, other.permissions.final_deny);
        append_dedup(&mut self.permissions.overrides, other.permissions.overrides);
        for (tool, level) in other.permissions.tool_levels {
            self.permissions.tool_levels.insert(tool, level);
        }
    }

    /// Build from a [`RuleSet`] plus a default mode, for round-tripping
    /// an in-memory rule set back out to the on-disk format.
    pub fn from_rule_set(rules: &RuleSet, default_mode: Mode, _default_action: DefaultAction) -> Self {
        let mode_str = match default_mode {
            Mode::Default => "default",
            Mode::AcceptEdits => "acceptEdits",
            Mode::Bypass => "bypassPermissions",
            Mode::Plan => "plan",
        };
        PermissionRuleFile {
            permissions: PermissionBlock {
                default_mode: Some(mode_str.to_string()),
                allow: rules.allow.iter().map(|r| r.pattern_str().to_string()).collect(),
                deny: rules.deny.iter().map(|r| r.pattern_str().to_string()).collect(),
                ask: rules.ask.iter().map(|r| r.pattern_str().to_string()).collect(),
                final_deny: rules.final_deny.iter().map(|r| r.pattern_str().to_string()).collect(),
                overrides: rules.overrides.iter().map(|r| r.pattern_str().to_string()).collect(),
                tool_levels: std::collections::HashMap::new(),
                max_level: None,
            },
        }
    }
}

fn append_dedup(into: &mut Vec<String>, from: Vec<String>) {
    for item in from {
        if !into.contains(&item) {
            into.push(item);
        }
    }
}
