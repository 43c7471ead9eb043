//! Configuration discovery and effective settings resolution.
//!
//! promcheck reads `promcheck.toml|yaml|yml` from the working directory (or
//! the file named by `--config`) and merges it with CLI flags to produce an
//! `Effective` config. Defaults:
//! - `prometheus.url`: `http://0.0.0.0:9090`
//! - `check.delay`: 0.1 seconds, `check.max_concurrency`: 0 (unbounded)
//! - `output.format`: `graph`
//! - `exporter.listen_addr`: `0.0.0.0:9093`, `exporter.interval`: 60 seconds
//! - `exporter.metrics_prefix`: `promcheck`
//! - `log.level`: `info`
//!
//! Overrides precedence: CLI > config file > defaults. Repeatable CLI flags
//! replace the config list when given at least once.

use crate::cli::{ExporterArgs, RunArgs};
use crate::error::{Error, Result};
use crate::probe::BasicAuth;
use crate::report::OutputFormat;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_PROMETHEUS_URL: &str = "http://0.0.0.0:9090";
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:9093";
pub const DEFAULT_CHECK_DELAY_SECS: f64 = 0.1;
pub const DEFAULT_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_METRICS_PREFIX: &str = "promcheck";
pub const DEFAULT_LOG_LEVEL: &str = "info";

const CONFIG_FILES: [&str; 3] = ["promcheck.toml", "promcheck.yaml", "promcheck.yml"];

#[derive(Debug, Default, Deserialize, Clone)]
/// Backend connection under `[prometheus]`.
pub struct PrometheusCfg {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
/// Check behavior under `[check]`.
pub struct CheckCfg {
    /// Glob of rule files, relative to the working directory
    pub files: Option<String>,
    #[serde(default)]
    pub expressions: Vec<String>,
    #[serde(default)]
    pub ignore_selectors: Vec<String>,
    #[serde(default)]
    pub ignore_groups: Vec<String>,
    /// Seconds
    pub delay: Option<f64>,
    pub max_concurrency: Option<usize>,
    pub strict: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct OutputCfg {
    pub format: Option<String>,
    pub no_color: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct ExporterCfg {
    pub listen_addr: Option<String>,
    /// Seconds
    pub interval: Option<u64>,
    pub metrics_prefix: Option<String>,
    pub runtime_metrics: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct LogCfg {
    pub level: Option<String>,
    pub json: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Clone)]
/// Root configuration loaded from `promcheck.toml|yaml`.
pub struct FileConfig {
    #[serde(default)]
    pub prometheus: PrometheusCfg,
    #[serde(default)]
    pub check: CheckCfg,
    #[serde(default)]
    pub output: OutputCfg,
    #[serde(default)]
    pub exporter: ExporterCfg,
    #[serde(default)]
    pub log: LogCfg,
}

#[derive(Debug, Clone)]
/// Fully-resolved configuration used by commands after applying precedence.
pub struct Effective {
    pub root: PathBuf,
    pub prometheus_url: String,
    pub auth: Option<BasicAuth>,
    pub check_files: Option<String>,
    pub check_expressions: Vec<String>,
    pub ignore_selectors: Vec<String>,
    pub ignore_groups: Vec<String>,
    pub check_delay: Duration,
    pub max_concurrency: usize,
    pub strict: bool,
    pub output: OutputFormat,
    pub no_color: bool,
    pub listen_addr: String,
    pub interval: Duration,
    pub metrics_prefix: String,
    pub runtime_metrics: bool,
    pub log_level: String,
    pub log_json: bool,
}

/// Load `FileConfig` from `explicit` (relative to `root`) or from the first
/// `promcheck.toml|yaml|yml` found in `root`.
///
/// A missing discovered file yields `None`; an explicit file that cannot be
/// read or parsed is an error.
pub fn load_config(root: &Path, explicit: Option<&str>) -> Result<Option<FileConfig>> {
    if let Some(p) = explicit {
        return parse_config_file(&root.join(p)).map(Some);
    }
    for name in CONFIG_FILES {
        let p = root.join(name);
        if p.exists() {
            return parse_config_file(&p).map(Some);
        }
    }
    Ok(None)
}

fn parse_config_file(path: &Path) -> Result<FileConfig> {
    let s = fs::read_to_string(path).map_err(|e| {
        Error::Configuration(format!("cannot read config file {}: {}", path.display(), e))
    })?;
    let is_toml = path.extension().and_then(|e| e.to_str()) == Some("toml");
    let parsed = if is_toml {
        toml::from_str(&s).map_err(|e| e.to_string())
    } else {
        serde_yaml::from_str(&s).map_err(|e| e.to_string())
    };
    parsed.map_err(|e| Error::Configuration(format!("invalid config file {}: {}", path.display(), e)))
}

fn list_or(cli: &[String], cfg: Vec<String>) -> Vec<String> {
    if cli.is_empty() {
        cfg
    } else {
        cli.to_vec()
    }
}

/// Resolve `Effective` by merging CLI flags, the discovered config, and
/// defaults. `exporter` is only given for the exporter subcommand.
pub fn resolve_effective(
    root: &Path,
    cli: &RunArgs,
    exporter: Option<&ExporterArgs>,
) -> Result<Effective> {
    let cfg = load_config(root, cli.config.as_deref())?.unwrap_or_default();
    let exp = exporter.cloned().unwrap_or_default();

    let prometheus_url = cli
        .prometheus_url
        .clone()
        .or(cfg.prometheus.url)
        .unwrap_or_else(|| DEFAULT_PROMETHEUS_URL.to_string());
    reqwest::Url::parse(&prometheus_url).map_err(|e| {
        Error::Configuration(format!("invalid prometheus url '{}': {}", prometheus_url, e))
    })?;

    let username = cli.prometheus_username.clone().or(cfg.prometheus.username);
    let password = cli.prometheus_password.clone().or(cfg.prometheus.password);
    let auth = BasicAuth::from_parts(username.as_deref(), password.as_deref());

    let delay_secs = cli
        .check_delay
        .or(cfg.check.delay)
        .unwrap_or(DEFAULT_CHECK_DELAY_SECS);
    let check_delay = Duration::try_from_secs_f64(delay_secs).map_err(|_| {
        Error::Configuration(format!(
            "check delay must be a non-negative number of seconds, got {}",
            delay_secs
        ))
    })?;

    let output_src = cli
        .output
        .clone()
        .or(cfg.output.format)
        .unwrap_or_else(|| "graph".to_string());
    let output: OutputFormat = output_src.parse()?;
    if output == OutputFormat::Prometheus {
        return Err(Error::Configuration(
            "output format 'prometheus' is only available in exporter mode".into(),
        ));
    }

    let interval_secs = exp
        .interval
        .or(cfg.exporter.interval)
        .unwrap_or(DEFAULT_INTERVAL_SECS);
    if interval_secs == 0 {
        return Err(Error::Configuration("exporter interval must be at least 1 second".into()));
    }

    let no_color = if cli.no_color { Some(true) } else { None };
    let strict = if cli.strict { Some(true) } else { None };
    let log_json = if cli.log_json { Some(true) } else { None };
    let runtime_metrics = if exp.no_runtime_metrics { Some(false) } else { None };

    Ok(Effective {
        root: root.to_path_buf(),
        prometheus_url,
        auth,
        check_files: cli.check_file.clone().or(cfg.check.files),
        check_expressions: list_or(&cli.check_expression, cfg.check.expressions),
        ignore_selectors: list_or(&cli.ignore_selector, cfg.check.ignore_selectors),
        ignore_groups: list_or(&cli.ignore_group, cfg.check.ignore_groups),
        check_delay,
        max_concurrency: cli.max_concurrency.or(cfg.check.max_concurrency).unwrap_or(0),
        strict: strict.or(cfg.check.strict).unwrap_or(false),
        output,
        no_color: no_color.or(cfg.output.no_color).unwrap_or(false),
        listen_addr: exp
            .listen_addr
            .or(cfg.exporter.listen_addr)
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string()),
        interval: Duration::from_secs(interval_secs),
        metrics_prefix: exp
            .metrics_prefix
            .or(cfg.exporter.metrics_prefix)
            .unwrap_or_else(|| DEFAULT_METRICS_PREFIX.to_string()),
        runtime_metrics: runtime_metrics.or(cfg.exporter.runtime_metrics).unwrap_or(true),
        log_level: cli
            .log_level
            .clone()
            .or(cfg.log.level)
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        log_json: log_json.or(cfg.log.json).unwrap_or(false),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_without_config_file() {
        let dir = tempdir().unwrap();
        let eff = resolve_effective(dir.path(), &RunArgs::default(), None).unwrap();
        assert_eq!(eff.prometheus_url, "http://0.0.0.0:9090");
        assert!(eff.auth.is_none());
        assert!(eff.check_files.is_none());
        assert_eq!(eff.check_delay, Duration::from_millis(100));
        assert_eq!(eff.max_concurrency, 0);
        assert!(!eff.strict);
        assert_eq!(eff.output, OutputFormat::Graph);
        assert_eq!(eff.listen_addr, "0.0.0.0:9093");
        assert_eq!(eff.interval, Duration::from_secs(60));
        assert_eq!(eff.metrics_prefix, "promcheck");
        assert!(eff.runtime_metrics);
        assert_eq!(eff.log_level, "info");
    }

    #[test]
    fn test_load_toml() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let mut f = fs::File::create(root.join("promcheck.toml")).unwrap();
        writeln!(
            f,
            "{}",
            r#"
[prometheus]
url = "http://prom.internal:9090"
username = "admin"
password = "secret"
[check]
files = "rules/*.yaml"
ignore_groups = ["kubernetes-apps"]
delay = 0.25
strict = true
[output]
format = "json"
[log]
level = "debug"
            "#
        )
        .unwrap();

        let eff = resolve_effective(root, &RunArgs::default(), None).unwrap();
        assert_eq!(eff.prometheus_url, "http://prom.internal:9090");
        assert_eq!(eff.auth.as_ref().map(|a| a.username.as_str()), Some("admin"));
        assert_eq!(eff.check_files.as_deref(), Some("rules/*.yaml"));
        assert_eq!(eff.ignore_groups, vec!["kubernetes-apps"]);
        assert_eq!(eff.check_delay, Duration::from_millis(250));
        assert!(eff.strict);
        assert_eq!(eff.output, OutputFormat::Json);
        assert_eq!(eff.log_level, "debug");
    }

    #[test]
    fn test_load_yaml_exporter_section() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(
            root.join("promcheck.yaml"),
            r#"
exporter:
  listen_addr: 127.0.0.1:9100
  interval: 300
  metrics_prefix: acme
  runtime_metrics: false
"#,
        )
        .unwrap();

        let eff = resolve_effective(root, &RunArgs::default(), None).unwrap();
        assert_eq!(eff.listen_addr, "127.0.0.1:9100");
        assert_eq!(eff.interval, Duration::from_secs(300));
        assert_eq!(eff.metrics_prefix, "acme");
        assert!(!eff.runtime_metrics);
    }

    #[test]
    fn test_cli_takes_precedence_over_file() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(
            root.join("promcheck.toml"),
            r#"
[check]
ignore_selectors = ["^node_"]
expressions = ["up"]
[exporter]
interval = 300
"#,
        )
        .unwrap();

        let cli = RunArgs {
            ignore_selector: vec!["^kube_".into()],
            output: Some("yaml".into()),
            no_color: true,
            ..Default::default()
        };
        let exp = ExporterArgs {
            interval: Some(10),
            no_runtime_metrics: true,
            ..Default::default()
        };
        let eff = resolve_effective(root, &cli, Some(&exp)).unwrap();
        assert_eq!(eff.ignore_selectors, vec!["^kube_"]);
        assert_eq!(eff.check_expressions, vec!["up"]);
        assert_eq!(eff.output, OutputFormat::Yaml);
        assert!(eff.no_color);
        assert_eq!(eff.interval, Duration::from_secs(10));
        assert!(!eff.runtime_metrics);
    }

    #[test]
    fn test_explicit_config_path() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("conf")).unwrap();
        fs::write(root.join("conf/custom.yml"), "check:\n  max_concurrency: 8\n").unwrap();
        let cli = RunArgs {
            config: Some("conf/custom.yml".into()),
            ..Default::default()
        };
        let eff = resolve_effective(root, &cli, None).unwrap();
        assert_eq!(eff.max_concurrency, 8);

        let missing = RunArgs {
            config: Some("conf/missing.toml".into()),
            ..Default::default()
        };
        assert!(matches!(
            resolve_effective(root, &missing, None),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_invalid_values_are_configuration_errors() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let bad = [
            RunArgs {
                prometheus_url: Some("not a url".into()),
                ..Default::default()
            },
            RunArgs {
                check_delay: Some(-1.0),
                ..Default::default()
            },
            RunArgs {
                output: Some("csv".into()),
                ..Default::default()
            },
            RunArgs {
                output: Some("prometheus".into()),
                ..Default::default()
            },
        ];
        for cli in bad {
            assert!(matches!(
                resolve_effective(root, &cli, None),
                Err(Error::Configuration(_))
            ));
        }
        fs::write(root.join("promcheck.toml"), "[check\nfiles = 1").unwrap();
        assert!(matches!(
            resolve_effective(root, &RunArgs::default(), None),
            Err(Error::Configuration(_))
        ));
    }
}
