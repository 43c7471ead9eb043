//! Shared data models: rule groups handed to the checker and per-rule check
//! results, plus the wire schemas for rule files and the Prometheus HTTP API.

pub mod api;
pub mod rule_file;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A named collection of rules sharing one source (file or live group).
pub struct RuleGroup {
    pub name: String,
    pub file: String,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// An alerting or recording rule reduced to what the checker needs.
pub struct Rule {
    pub name: String,
    #[serde(rename = "expr")]
    pub expression: String,
}

impl Rule {
    pub fn new(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expression: expression.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
/// Outcome of checking one rule.
///
/// Every probed selector occurrence lands in exactly one of `results` or
/// `no_results`. `error` is set when the rule could not be checked to the
/// end (unparsable expression or failed probe); the lists then hold the
/// selectors classified before the failure.
pub struct CheckResult {
    pub file: String,
    pub group: String,
    pub name: String,
    pub expression: String,
    pub results: Vec<String>,
    pub no_results: Vec<String>,
    pub error: Option<String>,
}

impl CheckResult {
    pub fn new(file: &str, group: &str, rule: &Rule) -> Self {
        Self {
            file: file.to_string(),
            group: group.to_string(),
            name: rule.name.clone(),
            expression: rule.expression.clone(),
            ..Default::default()
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}
