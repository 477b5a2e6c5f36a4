//! Route rule data model
//!
//! The serving layer consumes an ordered list of plain records: either a
//! phase marker (`{"handle": "miss"}`) or a pattern rule
//! (`{"src": ..., "dest"?: ..., "status"?: ..., "check"?: ..., "continue"?: ...}`).
//! Rules are evaluated first-match-wins in sequence order, except inside
//! `continue`-chained segments.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Routing phase introduced by a [`PhaseMarker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Miss,
    Hit,
    Rewrite,
    Error,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Miss => "miss",
            Phase::Hit => "hit",
            Phase::Rewrite => "rewrite",
            Phase::Error => "error",
        };
        f.write_str(name)
    }
}

/// Marker that switches the serving layer into a new routing phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseMarker {
    pub handle: Phase,
}

/// A single pattern/destination mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Anchored regex the request path is matched against.
    pub src: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    #[serde(rename = "check", default, skip_serializing_if = "is_false")]
    pub is_check: bool,

    #[serde(rename = "continue", default, skip_serializing_if = "is_false")]
    pub is_continue: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Rule {
    /// Rewrite rule: match `src`, forward to `dest`.
    pub fn rewrite(src: impl Into<String>, dest: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            dest: Some(dest.into()),
            ..Self::default()
        }
    }

    /// Terminal rule answering `src` with a fixed status code.
    pub fn with_status(src: impl Into<String>, status: u16) -> Self {
        Self {
            src: src.into(),
            status: Some(status),
            ..Self::default()
        }
    }

    /// Compiles the rule's pattern for request dispatch.
    pub fn matcher(&self) -> Result<regex::Regex, regex::Error> {
        regex::Regex::new(&self.src)
    }
}

/// One entry of the ordered route list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RouteRule {
    Marker(PhaseMarker),
    Rule(Rule),
}

impl RouteRule {
    pub fn miss() -> Self {
        RouteRule::Marker(PhaseMarker { handle: Phase::Miss })
    }

    /// Whether this entry is a phase marker rather than a pattern rule.
    pub fn is_marker(&self) -> bool {
        matches!(self, RouteRule::Marker(_))
    }

    pub fn as_rule(&self) -> Option<&Rule> {
        match self {
            RouteRule::Rule(rule) => Some(rule),
            RouteRule::Marker(_) => None,
        }
    }
}

impl From<Rule> for RouteRule {
    fn from(rule: Rule) -> Self {
        RouteRule::Rule(rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rule_serializes_minimal_shape() {
        let rule = Rule::rewrite("^/a$", "/a/index.js");
        let value = serde_json::to_value(&rule).unwrap();
        assert_eq!(value, json!({ "src": "^/a$", "dest": "/a/index.js" }));
    }

    #[test]
    fn test_rule_serializes_flags_and_status() {
        let rule = Rule {
            src: "^/api(/.*)?$".to_string(),
            dest: None,
            status: Some(404),
            is_check: false,
            is_continue: true,
        };
        let value = serde_json::to_value(&rule).unwrap();
        assert_eq!(
            value,
            json!({ "src": "^/api(/.*)?$", "status": 404, "continue": true })
        );
    }

    #[test]
    fn test_marker_serializes_as_handle() {
        let value = serde_json::to_value(RouteRule::miss()).unwrap();
        assert_eq!(value, json!({ "handle": "miss" }));
    }

    #[test]
    fn test_matcher_compiles_pattern() {
        let rule = Rule::rewrite("^/a/([^/]+)$", "/a/[id].js?id=$1");
        let regex = rule.matcher().unwrap();
        assert!(regex.is_match("/a/42"));
        assert!(!regex.is_match("/b/42"));
    }

    #[test]
    fn test_route_rule_round_trip() {
        let rules = vec![
            RouteRule::miss(),
            RouteRule::Rule(Rule {
                src: "^/a/([^/]+)$".to_string(),
                dest: Some("/a/[id].js?id=$1".to_string()),
                status: None,
                is_check: true,
                is_continue: false,
            }),
        ];
        let text = serde_json::to_string(&rules).unwrap();
        let parsed: Vec<RouteRule> = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, rules);
    }
}
