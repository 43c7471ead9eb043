//! Gauge export of a report.

use super::Builder;
use crate::error::{Error, Result};

impl Builder {
    /// Publish the report on the metrics sink. Selector gauges from the
    /// previous report are dropped first so removed rules disappear.
    pub fn to_metrics(&mut self) -> Result<()> {
        let metrics = self
            .metrics
            .clone()
            .ok_or_else(|| Error::Configuration("no metrics backend configured".into()))?;
        self.report.finalize();
        let report = &self.report;

        metrics.set_rule_groups_total(report.total_groups as f64);
        metrics.set_rules_total(report.total_rules as f64);
        metrics.set_rules_failed_total(report.total_rules_failed as f64);
        metrics.set_groups_failed_total(report.total_groups_failed as f64);
        metrics.reset_selectors();
        for (file, groups) in report.nested() {
            for (group, rules) in groups {
                for (rule, (results, no_results)) in rules {
                    metrics.set_selectors_total(file, group, rule, "failed", no_results.len() as f64);
                    metrics.set_selectors_total(file, group, rule, "success", results.len() as f64);
                }
            }
        }
        Ok(())
    }
}
