//! Check cycle orchestration: source selection, checking and reporting.

use crate::check::RulesChecker;
use crate::config::Effective;
use crate::error::{Error, Result};
use crate::ignore::IgnoreFilter;
use crate::metrics::{MetricsOptions, PrometheusMetrics};
use crate::models::RuleGroup;
use crate::probe::{PrometheusProbe, Prober};
use crate::report::{Builder, OutputFormat};
use crate::sources::{fetch_rule_groups, inline_rule_group, load_rule_files};
use reqwest::Client;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// What a finished cycle means for the exit status.
pub struct CycleSummary {
    /// At least one checked rule had a selector without data.
    pub has_no_results: bool,
    pub rules_failed: usize,
    pub groups_failed: usize,
}

/// Wires the configured sources, checker, report and metrics together.
pub struct App {
    config: Effective,
    client: Client,
    checker: RulesChecker,
    builder: Builder,
    metrics: Option<Arc<PrometheusMetrics>>,
}

fn http_client() -> Result<Client> {
    Client::builder()
        .build()
        .map_err(|e| Error::Configuration(format!("failed to create HTTP client: {}", e)))
}

impl App {
    /// One-shot check mode: the report goes to stdout in the configured format.
    pub fn new(config: Effective) -> Result<Self> {
        let client = http_client()?;
        let builder = Builder::new()
            .with_format(config.output)
            .with_color(!config.no_color);
        let prober = Self::live_prober(&config, &client);
        Ok(Self::with_parts(config, client, prober, builder))
    }

    /// Exporter mode: the report goes to a fresh metrics registry.
    pub fn exporter(config: Effective) -> Result<Self> {
        let client = http_client()?;
        let metrics = Arc::new(PrometheusMetrics::new(&MetricsOptions {
            prefix: config.metrics_prefix.clone(),
            enable_runtime_metrics: config.runtime_metrics,
        })?);
        let builder = Builder::new()
            .with_format(OutputFormat::Prometheus)
            .with_metrics(metrics.clone());
        let prober = Self::live_prober(&config, &client);
        let mut app = Self::with_parts(config, client, prober, builder);
        app.metrics = Some(metrics);
        Ok(app)
    }

    /// Assemble an app around an arbitrary prober and report builder.
    pub fn with_parts(
        config: Effective,
        client: Client,
        prober: Arc<dyn Prober>,
        builder: Builder,
    ) -> Self {
        let filter = IgnoreFilter::new(&config.ignore_selectors, &config.ignore_groups);
        let checker = RulesChecker::new(prober, filter, config.max_concurrency);
        Self {
            config,
            client,
            checker,
            builder,
            metrics: None,
        }
    }

    /// Replace the prober, keeping the ignore patterns and concurrency limit.
    pub fn with_prober(mut self, prober: Arc<dyn Prober>) -> Self {
        let filter = IgnoreFilter::new(&self.config.ignore_selectors, &self.config.ignore_groups);
        self.checker = RulesChecker::new(prober, filter, self.config.max_concurrency);
        self
    }

    fn live_prober(config: &Effective, client: &Client) -> Arc<dyn Prober> {
        Arc::new(PrometheusProbe::new(
            client.clone(),
            &config.prometheus_url,
            config.auth.clone(),
            config.check_delay,
        ))
    }

    pub fn config(&self) -> &Effective {
        &self.config
    }

    pub fn builder(&self) -> &Builder {
        &self.builder
    }

    pub fn metrics(&self) -> Option<Arc<PrometheusMetrics>> {
        self.metrics.clone()
    }

    /// Inline expressions win over rule files, which win over the live
    /// server's rule listing.
    pub async fn load_rule_groups(&self) -> Result<Vec<RuleGroup>> {
        if !self.config.check_expressions.is_empty() {
            return Ok(vec![inline_rule_group(&self.config.check_expressions)]);
        }
        if let Some(pattern) = self.config.check_files.clone() {
            let root = self.config.root.clone();
            return tokio::task::spawn_blocking(move || load_rule_files(&root, &pattern))
                .await
                .map_err(|e| Error::RuleSource(format!("rule file loader failed: {}", e)))?;
        }
        fetch_rule_groups(
            &self.client,
            &self.config.prometheus_url,
            self.config.auth.as_ref(),
        )
        .await
    }

    /// Check every rule group once and feed the outcome into the report.
    pub async fn run_check_cycle(&mut self) -> Result<CycleSummary> {
        let groups = self.load_rule_groups().await?;
        if groups.is_empty() {
            error!("no rule groups to check, verify the rule file pattern or the server's rules");
            return Err(Error::RuleSource("no rule groups to check".into()));
        }
        info!(groups = groups.len(), "checking rule groups");

        let outcome = self.checker.check_rule_groups(groups).await;
        self.builder.add_total_checked_groups(outcome.groups_checked);
        self.builder.add_total_checked_rules(outcome.rules_checked);
        self.builder.add_total_failed_groups(outcome.groups_failed);

        let mut summary = CycleSummary {
            groups_failed: outcome.groups_failed,
            ..Default::default()
        };
        for result in outcome.results {
            if result.is_failed() {
                summary.rules_failed += 1;
            } else if !result.no_results.is_empty() {
                summary.has_no_results = true;
            }
            self.builder.add_check_result(result);
        }
        info!(
            rules_failed = summary.rules_failed,
            groups_failed = summary.groups_failed,
            has_no_results = summary.has_no_results,
            "check cycle finished"
        );
        Ok(summary)
    }

    /// Run one cycle and render the report.
    pub async fn check(&mut self) -> Result<CycleSummary> {
        let summary = self.run_check_cycle().await?;
        self.builder.dump()?;
        Ok(summary)
    }
}
