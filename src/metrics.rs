//! Gauges exported by the exporter mode.
//!
//! `Metrics` is the seam the report writes to; `PrometheusMetrics` backs it
//! with a dedicated `prometheus::Registry` served over HTTP.

use crate::error::Result;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use prometheus::{Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

const DEFAULT_NAMESPACE: &str = "promcheck";
const SUBSYSTEM: &str = "validation";
pub const DEFAULT_METRICS_PATH: &str = "/metrics";

/// Metric sink for check reports.
pub trait Metrics: Send + Sync {
    fn set_rule_groups_total(&self, value: f64);
    fn set_rules_total(&self, value: f64);
    fn set_rules_failed_total(&self, value: f64);
    fn set_groups_failed_total(&self, value: f64);
    fn set_selectors_total(&self, file: &str, group: &str, rule: &str, status: &str, value: f64);
    /// Drop every `selectors_total` series before a new report is exported.
    fn reset_selectors(&self);
    /// Mount the scrape handler at `path` on `router`.
    fn register_handler(&self, path: &str, router: Router) -> Router;
}

#[derive(Debug, Clone)]
/// Options for the Prometheus backend.
pub struct MetricsOptions {
    /// Namespace of all metric names (default: "promcheck")
    pub prefix: String,
    /// Register the process collector (Linux only)
    pub enable_runtime_metrics: bool,
}

impl Default for MetricsOptions {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_NAMESPACE.to_string(),
            enable_runtime_metrics: true,
        }
    }
}

/// Prometheus-backed metrics with its own registry.
pub struct PrometheusMetrics {
    rule_groups_total: Gauge,
    rules_total: Gauge,
    rules_failed_total: Gauge,
    groups_failed_total: Gauge,
    selectors_total: GaugeVec,
    registry: Arc<Registry>,
}

impl PrometheusMetrics {
    pub fn new(opts: &MetricsOptions) -> Result<Self> {
        let namespace = match opts.prefix.trim_end_matches('.') {
            "" => DEFAULT_NAMESPACE.to_string(),
            p => p.to_string(),
        };
        let gauge_opts = |name: &str, help: &str| {
            Opts::new(name, help)
                .namespace(namespace.clone())
                .subsystem(SUBSYSTEM)
        };

        let rule_groups_total = Gauge::with_opts(gauge_opts(
            "rule_groups_total",
            "Total number of evaluated rule groups.",
        ))?;
        let rules_total = Gauge::with_opts(gauge_opts(
            "rules_total",
            "Total number of evaluated rules.",
        ))?;
        let rules_failed_total = Gauge::with_opts(gauge_opts(
            "rules_failed_total",
            "Total number of rules that could not be checked.",
        ))?;
        let groups_failed_total = Gauge::with_opts(gauge_opts(
            "groups_failed_total",
            "Total number of rule groups that could not be checked.",
        ))?;
        let selectors_total = GaugeVec::new(
            gauge_opts("selectors_total", "Total number of evaluated selectors."),
            &["file", "group", "rule", "status"],
        )?;

        let registry = Registry::new();
        registry.register(Box::new(rule_groups_total.clone()))?;
        registry.register(Box::new(rules_total.clone()))?;
        registry.register(Box::new(rules_failed_total.clone()))?;
        registry.register(Box::new(groups_failed_total.clone()))?;
        registry.register(Box::new(selectors_total.clone()))?;

        #[cfg(target_os = "linux")]
        {
            if opts.enable_runtime_metrics {
                let process_collector = prometheus::process_collector::ProcessCollector::for_self();
                registry.register(Box::new(process_collector))?;
            }
        }

        Ok(Self {
            rule_groups_total,
            rules_total,
            rules_failed_total,
            groups_failed_total,
            selectors_total,
            registry: Arc::new(registry),
        })
    }

    /// Current registry contents in the text exposition format.
    pub fn gather_text(&self) -> Result<String> {
        encode(&self.registry)
    }
}

fn encode(registry: &Registry) -> Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = vec![];
    encoder.encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| crate::error::Error::Serialization(e.to_string()))
}

impl Metrics for PrometheusMetrics {
    fn set_rule_groups_total(&self, value: f64) {
        self.rule_groups_total.set(value);
    }

    fn set_rules_total(&self, value: f64) {
        self.rules_total.set(value);
    }

    fn set_rules_failed_total(&self, value: f64) {
        self.rules_failed_total.set(value);
    }

    fn set_groups_failed_total(&self, value: f64) {
        self.groups_failed_total.set(value);
    }

    fn set_selectors_total(&self, file: &str, group: &str, rule: &str, status: &str, value: f64) {
        self.selectors_total
            .with_label_values(&[file, group, rule, status])
            .set(value);
    }

    fn reset_selectors(&self) {
        self.selectors_total.reset();
    }

    fn register_handler(&self, path: &str, router: Router) -> Router {
        let registry = self.registry.clone();
        router.route(
            path,
            get(move || {
                let registry = registry.clone();
                async move { scrape(&registry) }
            }),
        )
    }
}

fn scrape(registry: &Registry) -> Response {
    match encode(registry) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

/// Router serving the metrics at `/metrics` and `/metrics/`; every other
/// path answers 404.
pub fn handler_for(metrics: &dyn Metrics) -> Router {
    let path = DEFAULT_METRICS_PATH.trim_end_matches('/');
    let router = metrics.register_handler(path, Router::new());
    metrics
        .register_handler(&format!("{}/", path), router)
        .fallback(|| async { StatusCode::NOT_FOUND })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> PrometheusMetrics {
        PrometheusMetrics::new(&MetricsOptions {
            prefix: "promcheck".into(),
            enable_runtime_metrics: false,
        })
        .unwrap()
    }

    #[test]
    fn test_gauges_are_namespaced() {
        let m = metrics();
        m.set_rule_groups_total(3.0);
        m.set_rules_total(7.0);
        m.set_rules_failed_total(2.0);
        m.set_groups_failed_total(1.0);
        m.set_selectors_total("a.yaml", "g", "r", "failed", 2.0);
        let text = m.gather_text().unwrap();
        assert!(text.contains("promcheck_validation_rule_groups_total 3"));
        assert!(text.contains("promcheck_validation_rules_total 7"));
        assert!(text.contains("promcheck_validation_rules_failed_total 2"));
        assert!(text.contains("promcheck_validation_groups_failed_total 1"));
        assert!(text.contains(
            r#"promcheck_validation_selectors_total{file="a.yaml",group="g",rule="r",status="failed"} 2"#
        ));
    }

    #[test]
    fn test_custom_prefix_and_reset() {
        let m = PrometheusMetrics::new(&MetricsOptions {
            prefix: "acme.".into(),
            enable_runtime_metrics: false,
        })
        .unwrap();
        m.set_selectors_total("f", "g", "r", "success", 1.0);
        assert!(m.gather_text().unwrap().contains("acme_validation_selectors_total{"));
        m.reset_selectors();
        assert!(!m.gather_text().unwrap().contains("acme_validation_selectors_total{"));
    }
}
