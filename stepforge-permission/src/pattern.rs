//! Rule pattern parsing and matching against `(tool-name, arguments)`.

use std::path::{Component, Path};

use regex::Regex;
use serde_json::Value;

/// Fields inspected when an argument-pattern needs a URL-ish value.
const DOMAIN_FIELDS: &[&str] = &["url"];
/// Fields inspected when an argument-pattern needs a command value.
const COMMAND_FIELDS: &[&str] = &["command", "executable", "argsJson"];
/// Fields inspected when an argument-pattern needs a path value.
const PATH_FIELDS: &[&str] = &["path", "file_path", "filePath", "basePath", "directory"];

const PATH_SEPARATORS: &[char] = &[' ', '/', '-', '\t', '\0'];

/// A parsed rule pattern: `ToolName` or `ToolName(argPattern)`.
#[derive(Debug, Clone)]
pub struct Pattern {
    raw: String,
    tool: ToolNamePattern,
    args: Option<ArgPattern>,
}

#[derive(Debug, Clone)]
enum ToolNamePattern {
    Any,
    Prefix(String),
    Alternation(Box<Regex>),
    Exact(String),
}

#[derive(Debug, Clone)]
enum ArgPattern {
    DomainContains(String),
    /// `PREFIX:glob` against a command field — `git:*` (prefix, match
    /// anything after the boundary) and `rm:*.tmp` (prefix, then the
    /// remainder must match the glob) are both this variant.
    CommandMatch { prefix: String, glob: Box<Regex> },
    PathGlob(Box<Regex>),
    Substring(String),
}

impl Pattern {
    /// Parse a rule pattern string.
    ///
    /// Never fails: an unparseable tool-name portion falls back to an
    /// exact-string match, which can simply never match anything odd
    /// rather than rejecting the rule file outright.
    pub fn parse(raw: &str) -> Self {
        let (name_part, arg_part) = split_tool_and_args(raw);
        Self {
            raw: raw.to_string(),
            tool: ToolNamePattern::parse(name_part),
            args: arg_part.map(ArgPattern::parse),
        }
    }

    /// The original pattern string, as written in a rule file.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether this pattern matches `(tool_name, arguments)`.
    pub fn matches(&self, tool_name: &str, arguments: &Value) -> bool {
        if !self.tool.matches(tool_name) {
            return false;
        }
        match &self.args {
            None => true,
            Some(arg_pattern) => arg_pattern.matches(arguments),
        }
    }
}

/// Two patterns are equal iff their source strings are equal.
///
/// This underlies the guardrail override rule: "removes matching
/// parent `deny(p')` where `p' ⊆ p`" is implemented conservatively as
/// exact pattern-string equality, since subset detection between
/// arbitrary glob/regex argument patterns is undecidable in general.
impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for Pattern {}

fn split_tool_and_args(raw: &str) -> (&str, Option<&str>) {
    if let Some(open) = raw.find('(') {
        if let Some(stripped) = raw.strip_suffix(')') {
            return (&raw[..open], Some(&stripped[open + 1..]));
        }
    }
    (raw, None)
}

impl ToolNamePattern {
    fn parse(name: &str) -> Self {
        if name == "*" {
            return ToolNamePattern::Any;
        }
        if let Some(prefix) = name.strip_suffix('*') {
            return ToolNamePattern::Prefix(prefix.to_string());
        }
        if name.contains('|') {
            if let Ok(re) = Regex::new(&format!("^({name})$")) {
                return ToolNamePattern::Alternation(Box::new(re));
            }
        }
        ToolNamePattern::Exact(name.to_string())
    }

    fn matches(&self, tool_name: &str) -> bool {
        match self {
            ToolNamePattern::Any => true,
            ToolNamePattern::Prefix(prefix) => tool_name.starts_with(prefix.as_str()),
            ToolNamePattern::Alternation(re) => re.is_match(tool_name),
            ToolNamePattern::Exact(name) => tool_name == name,
        }
    }
}

impl ArgPattern {
    fn parse(inner: &str) -> Self {
        if let Some(domain) = inner.strip_prefix("domain:") {
            return ArgPattern::DomainContains(domain.to_string());
        }
        if let Some(colon) = inner.find(':') {
            let prefix = &inner[..colon];
            let suffix = &inner[colon + 1..];
            if suffix.contains('*') {
                return ArgPattern::CommandMatch {
                    prefix: prefix.to_string(),
                    glob: Box::new(command_glob_to_regex(suffix)),
                };
            }
        }
        if inner.contains('*') {
            return ArgPattern::PathGlob(Box::new(glob_to_regex(inner)));
        }
        ArgPattern::Substring(inner.to_string())
    }

    fn matches(&self, arguments: &Value) -> bool {
        match self {
            ArgPattern::DomainContains(needle) => domain_contains(arguments, needle),
            ArgPattern::CommandMatch { prefix, glob } => command_matches(arguments, prefix, glob),
            ArgPattern::PathGlob(re) => path_glob_matches(arguments, re),
            ArgPattern::Substring(needle) => arguments.to_string().contains(needle.as_str()),
        }
    }
}

fn domain_contains(arguments: &Value, needle: &str) -> bool {
    let Value::Object(map) = arguments else {
        return false;
    };
    for field in DOMAIN_FIELDS {
        if let Some(Value::String(s)) = map.get(*field) {
            if s.contains(needle) {
                return true;
            }
        }
    }
    map.values().any(|v| matches!(v, Value::String(s) if s.contains(needle)))
}

fn command_matches(arguments: &Value, prefix: &str, glob: &Regex) -> bool {
    let Value::Object(map) = arguments else {
        return false;
    };
    COMMAND_FIELDS.iter().any(|field| {
        map.get(*field)
            .and_then(Value::as_str)
            .is_some_and(|s| command_boundary_and_glob(s, prefix, glob))
    })
}

/// `prefix` matches `s` only when followed by a separator character (or
/// `s` is exactly `prefix`): `git:*` matches `"git status"` but not
/// `"gitsomething"`. Once the boundary holds, the remainder (including
/// its leading separator) must satisfy `glob`.
fn command_boundary_and_glob(s: &str, prefix: &str, glob: &Regex) -> bool {
    match s.strip_prefix(prefix) {
        Some("") => true,
        Some(rest) if rest.starts_with(PATH_SEPARATORS) => glob.is_match(rest),
        _ => false,
    }
}

/// Compile a command-field glob suffix, e.g. `*` or `*.tmp`, into a
/// regex anchored over the whole remainder. Unlike path globs, `*`
/// always matches greedily — command strings aren't path-structured.
fn command_glob_to_regex(suffix: &str) -> Regex {
    let mut regex = String::from("^");
    for c in suffix.chars() {
        match c {
            '*' => regex.push_str(".*"),
            c if "\\.+^$()[]{}|?".contains(c) => {
                regex.push('\\');
                regex.push(c);
            }
            c => regex.push(c),
        }
    }
    regex.push('$');
    Regex::new(&regex).unwrap_or_else(|_| Regex::new("^.*$").expect("wildcard regex always compiles"))
}

fn path_glob_matches(arguments: &Value, re: &Regex) -> bool {
    let Value::Object(map) = arguments else {
        return false;
    };
    PATH_FIELDS.iter().any(|field| {
        map.get(*field)
            .and_then(Value::as_str)
            .is_some_and(|s| re.is_match(&normalize_path(s)))
    })
}

/// Resolve `.` and `..` components lexically, without touching the filesystem.
pub fn normalize_path(raw: &str) -> String {
    let path = Path::new(raw);
    let mut out = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.last(), Some(Component::Normal(_))) {
                    out.pop();
                } else {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out.iter().collect::<std::path::PathBuf>().to_string_lossy().into_owned()
}

/// Compile a glob pattern into a regex where `**` crosses path
/// separators and a lone `*` does not.
fn glob_to_regex(pattern: &str) -> Regex {
    let mut regex = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    regex.push_str(".*");
                } else {
                    regex.push_str("[^/]*");
                }
            }
            '?' => regex.push_str("[^/]"),
            c if "\\.+^$()[]{}|".contains(c) => {
                regex.push('\\');
                regex.push(c);
            }
            c => regex.push(c),
        }
    }
    regex.push('$');
    Regex::new(&regex).unwrap_or_else(|_| Regex::new("^$").expect("empty regex always compiles"))
}
