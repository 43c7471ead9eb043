use async_trait::async_trait;
use promcheck::app::App;
use promcheck::cli::RunArgs;
use promcheck::config::resolve_effective;
use promcheck::error::{Error, Result};
use promcheck::probe::Prober;
use promcheck::report::{Builder, OutputFormat, Report};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl SharedBuf {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

/// Series counts by selector; anything unknown has no data.
struct StaticProber(HashMap<&'static str, f64>);

#[async_trait]
impl Prober for StaticProber {
    async fn probe_selector(&self, selector: &str) -> Result<f64> {
        if selector == "flaky" {
            return Err(Error::Probe("HTTP 503 Service Unavailable".into()));
        }
        Ok(self.0.get(selector).copied().unwrap_or(0.0))
    }
}

const NODE_RULES: &str = r#"
groups:
  - name: node
    rules:
      - alert: NodeDown
        expr: up{job="node"} == 0
      - record: instance:cpu:rate5m
        expr: rate(node_cpu_seconds_total{mode!="idle"}[5m])
"#;

const APP_RULES: &str = r#"
groups:
  - name: app
    rules:
      - alert: AppSilenced
        expr: ALERTS{alertname="AppDown"} and on() app_requests_total
      - alert: AppFlaky
        expr: flaky > 0
  - name: kubernetes-apps
    rules:
      - alert: Ignored
        expr: kube_pod_info
"#;

fn prober() -> Arc<StaticProber> {
    Arc::new(StaticProber(
        [(r#"up{job="node"}"#, 3.0)].into_iter().collect(),
    ))
}

#[tokio::test]
async fn test_rule_files_end_to_end_json() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("rules")).unwrap();
    fs::write(root.join("rules/node.yaml"), NODE_RULES).unwrap();
    fs::write(root.join("rules/app.yaml"), APP_RULES).unwrap();

    let args = RunArgs {
        check_file: Some("rules/*.yaml".into()),
        ignore_group: vec!["kubernetes-apps".into()],
        ..Default::default()
    };
    let config = resolve_effective(root, &args, None).unwrap();
    let buf = SharedBuf::default();
    let builder = Builder::new()
        .with_format(OutputFormat::Json)
        .with_writer(Box::new(buf.clone()));
    let mut app = App::with_parts(config, reqwest::Client::new(), prober(), builder);

    let summary = app.check().await.unwrap();
    assert!(summary.has_no_results);
    assert_eq!(summary.rules_failed, 1);
    assert_eq!(summary.groups_failed, 0);

    let report: Report = serde_json::from_str(&buf.contents()).unwrap();
    assert_eq!(report.total_groups, 2);
    assert_eq!(report.total_rules, 4);
    assert_eq!(report.sections_count, 3);
    assert_eq!(report.total_rules_failed, 1);
    assert_eq!(report.failed_rules[0].name, "AppFlaky");
    assert!(report.failed_rules[0].error.contains("503"));

    let by_name: HashMap<&str, _> = report
        .sections
        .iter()
        .map(|s| (s.name.as_str(), s))
        .collect();
    let node_down = by_name["NodeDown"];
    assert_eq!(node_down.file, std::path::Path::new("rules").join("node.yaml").to_string_lossy());
    assert_eq!(node_down.results, vec![r#"up{job="node"}"#]);
    assert!(node_down.no_results.is_empty());

    let cpu = by_name["instance:cpu:rate5m"];
    assert_eq!(cpu.no_results, vec![r#"node_cpu_seconds_total{mode!="idle"}"#]);

    // the ALERTS selector comes first, so nothing of this rule is probed
    let silenced = by_name["AppSilenced"];
    assert!(silenced.results.is_empty() && silenced.no_results.is_empty());

    assert!(!by_name.contains_key("Ignored"));
    assert_eq!(report.total_selectors_failed, 1);
    assert_eq!(report.total_selectors_success, 1);
    assert_eq!(report.ratio_failed_total(), 50.0);
}

#[tokio::test]
async fn test_inline_expressions_render_tree() {
    let dir = tempdir().unwrap();
    let args = RunArgs {
        check_expression: vec![r#"up{job="node"} == 0"#.into(), "absent(missing_metric)".into()],
        ..Default::default()
    };
    let config = resolve_effective(dir.path(), &args, None).unwrap();
    let buf = SharedBuf::default();
    let builder = Builder::new()
        .with_color(false)
        .with_writer(Box::new(buf.clone()));
    let mut app = App::with_parts(config, reqwest::Client::new(), prober(), builder);

    app.check().await.unwrap();
    let out = buf.contents();
    assert!(out.starts_with(".\n└── [file] [manual]\n    └── [group] [inline]\n"));
    assert!(out.contains("[1/1] query-0"));
    assert!(out.contains("[0/1] query-1"));
    assert!(out.contains("[✖] missing_metric"));
    assert!(out.contains("Groups total: 1, Rules total: 2"));
    assert!(out.contains("(No Results/Total: 50.00%)"));
}
