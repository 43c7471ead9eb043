//! Check report: accumulates per-rule results over one check cycle and
//! renders them as a tree, JSON, YAML or Prometheus gauges.
//!
//! The report is single-use per cycle: every `dump` clears it.

mod export;
mod tree;

use crate::error::{Error, Result};
use crate::metrics::Metrics;
use crate::models::CheckResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Report output format.
pub enum OutputFormat {
    /// Colored tree (`graph`)
    #[default]
    Graph,
    Json,
    Yaml,
    /// Gauges on the metrics backend; used by the exporter mode only.
    Prometheus,
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "graph" | "tree" => Ok(OutputFormat::Graph),
            "json" => Ok(OutputFormat::Json),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            "prometheus" => Ok(OutputFormat::Prometheus),
            other => Err(Error::Configuration(format!(
                "unknown output format '{}' (expected graph|json|yaml)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// One checked rule.
pub struct Section {
    pub file: String,
    pub group: String,
    pub name: String,
    pub expression: String,
    pub no_results: Vec<String>,
    pub results: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A rule whose check ended with an error.
pub struct FailedRule {
    pub file: String,
    pub group: String,
    pub name: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
/// Report data. Serialized field names are part of the output contract.
pub struct Report {
    #[serde(rename = "results", default)]
    pub sections: Vec<Section>,
    #[serde(rename = "rules_warnings", default)]
    pub sections_count: usize,
    #[serde(rename = "groups_total", default)]
    pub total_groups: usize,
    #[serde(rename = "rules_total", default)]
    pub total_rules: usize,
    #[serde(rename = "selectors_failed_total", default)]
    pub total_selectors_failed: usize,
    #[serde(rename = "selectors_success_total", default)]
    pub total_selectors_success: usize,
    #[serde(
        rename = "ratio_failed_total",
        default = "nan",
        skip_serializing_if = "is_nan"
    )]
    ratio_failed_total: f32,
    #[serde(rename = "rules_failed", default, skip_serializing_if = "Vec::is_empty")]
    pub failed_rules: Vec<FailedRule>,
    #[serde(rename = "rules_failed_total", default)]
    pub total_rules_failed: usize,
    #[serde(rename = "groups_failed_total", default)]
    pub total_groups_failed: usize,
}

fn nan() -> f32 {
    f32::NAN
}

fn is_nan(v: &f32) -> bool {
    v.is_nan()
}

/// Per (file, group, rule) success and failure selectors, ordered by key.
pub(crate) type NestedSections<'a> =
    BTreeMap<&'a str, BTreeMap<&'a str, BTreeMap<&'a str, (Vec<&'a str>, Vec<&'a str>)>>>;

impl Report {
    /// Percentage of probed selectors without data; NaN when none were probed.
    pub fn ratio_failed_total(&self) -> f32 {
        self.ratio_failed_total
    }

    fn finalize(&mut self) {
        let total = self.total_selectors_failed + self.total_selectors_success;
        self.ratio_failed_total = (self.total_selectors_failed as f32 / total as f32) * 100.0;
    }

    /// Collapse sections sharing a (file, group, rule) key.
    pub(crate) fn nested(&self) -> NestedSections<'_> {
        let mut out: NestedSections<'_> = BTreeMap::new();
        for s in &self.sections {
            let entry = out
                .entry(s.file.as_str())
                .or_default()
                .entry(s.group.as_str())
                .or_default()
                .entry(s.name.as_str())
                .or_default();
            entry.0.extend(s.results.iter().map(String::as_str));
            entry.1.extend(s.no_results.iter().map(String::as_str));
        }
        out
    }
}

/// Accumulates and renders a `Report`.
pub struct Builder {
    report: Report,
    format: OutputFormat,
    color: bool,
    writer: Box<dyn Write + Send + Sync>,
    metrics: Option<Arc<dyn Metrics>>,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    /// Tree output to stdout with colors.
    pub fn new() -> Self {
        Self {
            report: Report::default(),
            format: OutputFormat::Graph,
            color: true,
            writer: Box::new(std::io::stdout()),
            metrics: None,
        }
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn with_writer(mut self, writer: Box<dyn Write + Send + Sync>) -> Self {
        self.writer = writer;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn report(&self) -> &Report {
        &self.report
    }

    /// Whether any section was recorded. Totals alone do not count.
    pub fn has_content(&self) -> bool {
        self.report.sections_count != 0
    }

    pub fn add_section(
        &mut self,
        file: &str,
        group: &str,
        name: &str,
        expression: &str,
        no_results: Vec<String>,
        results: Vec<String>,
    ) {
        self.report.sections_count += 1;
        self.report.total_selectors_failed += no_results.len();
        self.report.total_selectors_success += results.len();
        self.report.sections.push(Section {
            file: file.to_string(),
            group: group.to_string(),
            name: name.to_string(),
            expression: expression.to_string(),
            no_results,
            results,
        });
    }

    pub fn add_failed_rule(&mut self, file: &str, group: &str, name: &str, error: &str) {
        self.report.total_rules_failed += 1;
        self.report.failed_rules.push(FailedRule {
            file: file.to_string(),
            group: group.to_string(),
            name: name.to_string(),
            error: error.to_string(),
        });
    }

    /// Record a check result as a section, or as a failed rule when it
    /// carries an error.
    pub fn add_check_result(&mut self, result: CheckResult) {
        match result.error {
            Some(error) => self.add_failed_rule(&result.file, &result.group, &result.name, &error),
            None => self.add_section(
                &result.file,
                &result.group,
                &result.name,
                &result.expression,
                result.no_results,
                result.results,
            ),
        }
    }

    pub fn add_total_checked_groups(&mut self, count: usize) {
        self.report.total_groups += count;
    }

    pub fn add_total_checked_rules(&mut self, count: usize) {
        self.report.total_rules += count;
    }

    pub fn add_total_failed_groups(&mut self, count: usize) {
        self.report.total_groups_failed += count;
    }

    fn clear(&mut self) {
        self.report = Report::default();
    }

    pub fn to_json(&mut self) -> Result<String> {
        self.report.finalize();
        Ok(serde_json::to_string_pretty(&self.report)?)
    }

    pub fn to_yaml(&mut self) -> Result<String> {
        self.report.finalize();
        Ok(serde_yaml::to_string(&self.report)?)
    }

    /// Render the report in the configured format and clear it. A report
    /// without sections is cleared too and yields `Error::EmptyReport`,
    /// except for the gauge export, which still publishes failed rules and
    /// groups so a fully failing cycle replaces the previous one.
    pub fn dump(&mut self) -> Result<()> {
        if !self.has_content() && !self.has_failures_to_export() {
            self.clear();
            return Err(Error::EmptyReport);
        }
        let res = match self.format {
            OutputFormat::Json => self.to_json().and_then(|out| self.write_out(&out)),
            OutputFormat::Yaml => self.to_yaml().and_then(|out| self.write_out(&out)),
            OutputFormat::Graph => self.to_tree().and_then(|out| self.write_out(&out)),
            OutputFormat::Prometheus => self.to_metrics(),
        };
        self.clear();
        res
    }

    fn has_failures_to_export(&self) -> bool {
        matches!(self.format, OutputFormat::Prometheus)
            && (self.report.total_rules_failed > 0 || self.report.total_groups_failed > 0)
    }

    fn write_out(&mut self, out: &str) -> Result<()> {
        writeln!(self.writer, "{}", out.trim_end_matches('\n'))?;
        self.writer.flush()?;
        Ok(())
    }
}
