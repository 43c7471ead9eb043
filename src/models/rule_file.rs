//! Prometheus rule file schema (`groups:` document).
//!
//! Only the fields the checker needs are modelled; `interval`, `labels`,
//! `annotations` and friends are accepted and ignored.

use super::{Rule, RuleGroup};
use serde::Deserialize;

#[derive(Deserialize, Default)]
/// Top-level rule file document.
pub struct RuleFile {
    #[serde(default)]
    pub groups: Vec<RuleFileGroup>,
}

#[derive(Deserialize)]
/// A `groups[]` entry.
pub struct RuleFileGroup {
    pub name: String,
    #[serde(default)]
    pub rules: Vec<RuleFileRule>,
}

#[derive(Deserialize)]
/// A recording (`record`) or alerting (`alert`) rule.
pub struct RuleFileRule {
    #[serde(default)]
    pub record: Option<String>,
    #[serde(default)]
    pub alert: Option<String>,
    pub expr: String,
}

impl RuleFileRule {
    /// Recording rules are named by `record`, alerts by `alert`.
    pub fn name(&self) -> String {
        self.record
            .clone()
            .filter(|r| !r.is_empty())
            .or_else(|| self.alert.clone())
            .unwrap_or_default()
    }
}

impl RuleFileGroup {
    pub fn into_rule_group(self, file: &str) -> RuleGroup {
        RuleGroup {
            name: self.name,
            file: file.to_string(),
            rules: self
                .rules
                .into_iter()
                .map(|r| Rule::new(r.name(), r.expr))
                .collect(),
        }
    }
}
