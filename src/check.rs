//! Rule checker: extraction, filtering, probing and classification.
//!
//! Two fan-out levels run on the tokio runtime:
//! - `check_rule_groups` spawns one task per rule group (`JoinSet`);
//! - `check_rule_group` spawns one task per rule and fans the results back
//!   in through an `mpsc` channel sized to the number of rules.
//!
//! Neither level is bounded by default. `max_concurrency` caps the number
//! of rules probing at the same time across all groups. Results arrive in
//! completion order; consumers key them by (file, group, name).

use crate::error::Result;
use crate::ignore::{is_alerts_selector, IgnoreFilter};
use crate::models::{CheckResult, Rule, RuleGroup};
use crate::probe::Prober;
use crate::selectors::extract_selectors;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

#[derive(Debug, Default)]
/// Everything one check cycle over many groups produced.
pub struct CycleOutcome {
    pub results: Vec<CheckResult>,
    pub groups_checked: usize,
    pub rules_checked: usize,
    pub groups_failed: usize,
}

#[derive(Clone)]
/// Checks rule groups against a prober. Cloning shares the prober, the
/// ignore patterns and the concurrency limit.
pub struct RulesChecker {
    prober: Arc<dyn Prober>,
    filter: Arc<IgnoreFilter>,
    limiter: Option<Arc<Semaphore>>,
}

impl RulesChecker {
    /// `max_concurrency == 0` leaves rule checks unbounded.
    pub fn new(prober: Arc<dyn Prober>, filter: IgnoreFilter, max_concurrency: usize) -> Self {
        Self {
            prober,
            filter: Arc::new(filter),
            limiter: (max_concurrency > 0).then(|| Arc::new(Semaphore::new(max_concurrency))),
        }
    }

    /// Check all non-ignored groups concurrently.
    ///
    /// A group task that dies is counted in `groups_failed`; the remaining
    /// groups still contribute their results.
    pub async fn check_rule_groups(&self, groups: Vec<RuleGroup>) -> CycleOutcome {
        let mut tasks = JoinSet::new();
        for group in groups {
            if self.filter.ignores_group(&group.name) {
                debug!(group = %group.name, file = %group.file, "skipping ignored rule group");
                continue;
            }
            let checker = self.clone();
            tasks.spawn(async move {
                let rules = group.rules.len();
                (rules, checker.check_rule_group(&group).await)
            });
        }

        let mut outcome = CycleOutcome::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((rules, results)) => {
                    outcome.groups_checked += 1;
                    outcome.rules_checked += rules;
                    outcome.results.extend(results);
                }
                Err(e) => {
                    error!(error = %e, "failed to check rule group");
                    outcome.groups_failed += 1;
                }
            }
        }
        outcome
    }

    /// Check every rule of `group` concurrently. Ignored groups yield nothing.
    pub async fn check_rule_group(&self, group: &RuleGroup) -> Vec<CheckResult> {
        if self.filter.ignores_group(&group.name) {
            return Vec::new();
        }
        let (tx, mut rx) = mpsc::channel(group.rules.len().max(1));
        for rule in &group.rules {
            let tx = tx.clone();
            let checker = self.clone();
            let file = group.file.clone();
            let group_name = group.name.clone();
            let rule = rule.clone();
            tokio::spawn(async move {
                let _permit = match &checker.limiter {
                    Some(limiter) => limiter.clone().acquire_owned().await.ok(),
                    None => None,
                };
                let result = checker.check_rule(&file, &group_name, &rule).await;
                let _ = tx.send(result).await;
            });
        }
        drop(tx);

        let mut results = Vec::with_capacity(group.rules.len());
        while let Some(result) = rx.recv().await {
            results.push(result);
        }
        results
    }

    /// Check a single rule. Failures are recorded on the result.
    pub async fn check_rule(&self, file: &str, group: &str, rule: &Rule) -> CheckResult {
        let mut result = CheckResult::new(file, group, rule);
        if let Err(e) = self.probe_rule(&rule.expression, &mut result).await {
            warn!(file = %file, group = %group, rule = %rule.name, error = %e, "failed to check rule");
            result.error = Some(e.to_string());
        }
        result
    }

    async fn probe_rule(&self, expression: &str, result: &mut CheckResult) -> Result<()> {
        for selector in extract_selectors(expression)? {
            if self.filter.ignores_selector(selector.text()) {
                continue;
            }
            if is_alerts_selector(&selector) {
                break;
            }
            let count = self.prober.probe_selector(selector.text()).await?;
            if count < 1.0 {
                result.no_results.push(selector.text().to_string());
            } else {
                result.results.push(selector.text().to_string());
            }
        }
        Ok(())
    }
}
