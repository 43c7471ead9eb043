//! Ignore rules for rule groups and selectors.
//!
//! Patterns are unanchored regular expressions: `kubernetes-apps` ignores
//! `kubernetes-apps-foo`. An invalid pattern never matches and never fails
//! a check.

use crate::selectors::Selector;
use regex::Regex;
use tracing::warn;

/// Metric names of the synthetic alert-state series.
const ALERT_STATE_METRICS: [&str; 2] = ["ALERTS", "ALERTS_FOR_STATE"];

/// Whether `group` matches any of `patterns`.
pub fn is_ignored_group(patterns: &[String], group: &str) -> bool {
    is_ignored(patterns, group)
}

/// Whether `selector` matches any of `patterns`.
pub fn is_ignored_selector(patterns: &[String], selector: &str) -> bool {
    is_ignored(patterns, selector)
}

fn is_ignored(patterns: &[String], text: &str) -> bool {
    patterns
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .any(|re| re.is_match(text))
}

/// Selectors over `ALERTS`/`ALERTS_FOR_STATE` end the checking of a rule.
pub fn is_alerts_selector(selector: &Selector) -> bool {
    selector
        .metric_name()
        .map(|name| ALERT_STATE_METRICS.contains(&name))
        .unwrap_or(false)
}

#[derive(Debug, Default, Clone)]
/// Pre-compiled ignore patterns shared by all checks of a cycle.
pub struct IgnoreFilter {
    selectors: Vec<Regex>,
    groups: Vec<Regex>,
}

impl IgnoreFilter {
    pub fn new(selector_patterns: &[String], group_patterns: &[String]) -> Self {
        Self {
            selectors: compile("selector", selector_patterns),
            groups: compile("group", group_patterns),
        }
    }

    pub fn ignores_group(&self, group: &str) -> bool {
        self.groups.iter().any(|re| re.is_match(group))
    }

    pub fn ignores_selector(&self, selector: &str) -> bool {
        self.selectors.iter().any(|re| re.is_match(selector))
    }
}

fn compile(kind: &str, patterns: &[String]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| match Regex::new(p) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!(kind = kind, pattern = %p, error = %e, "invalid ignore pattern, it will never match");
                None
            }
        })
        .collect()
}
