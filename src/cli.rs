//! CLI argument parsing via `clap`.

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "promcheck",
    version,
    about = "Find PromQL rules whose selectors return no data",
    long_about = "promcheck probes every selector of every alerting and recording rule against a Prometheus-compatible server and reports the ones without data.\n\nConfiguration precedence: CLI > promcheck.toml > defaults.",
    after_help = "Examples:\n  promcheck check --prometheus-url http://localhost:9090 --check-file 'rules/*.yaml'\n  promcheck check --check-expression 'up{job=\"node\"} == 0' --output json\n  promcheck exporter --listen-addr 0.0.0.0:9093 --interval 300",
    arg_required_else_help = true
)]
/// Top-level CLI options and subcommands.
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand)]
/// Supported subcommands.
pub enum Commands {
    /// Show version
    #[command(about = "Show version", long_about = "Print the current promcheck version.")]
    Version,
    /// Run one check and print the report
    #[command(
        about = "Check rules once",
        long_about = "Probe the selectors of every rule once and print the report. With --strict the exit code is 1 when any selector returned no data.",
        after_help = "Examples:\n  promcheck check --check-file 'rules/*.yaml' --strict\n  promcheck check --ignore-group 'kubernetes-.*' --output yaml"
    )]
    Check {
        #[command(flatten)]
        args: RunArgs,
    },
    /// Check periodically and serve the results as metrics
    #[command(
        about = "Run as a metrics exporter",
        long_about = "Re-run the check on a fixed interval and expose the results as Prometheus gauges on /metrics.",
        after_help = "Examples:\n  promcheck exporter --interval 300 --metrics-prefix acme"
    )]
    Exporter {
        #[command(flatten)]
        args: RunArgs,
        #[command(flatten)]
        exporter: ExporterArgs,
    },
}

#[derive(Args, Debug, Default, Clone)]
/// Flags shared by `check` and `exporter`.
pub struct RunArgs {
    #[arg(long, help = "Config file (default: promcheck.toml|yaml|yml in the working directory)")]
    pub config: Option<String>,
    #[arg(long, help = "Prometheus base URL (default: http://0.0.0.0:9090)")]
    pub prometheus_url: Option<String>,
    #[arg(long, help = "Basic auth username")]
    pub prometheus_username: Option<String>,
    #[arg(long, help = "Basic auth password")]
    pub prometheus_password: Option<String>,
    #[arg(long, help = "Glob of rule files to check instead of the server's rules")]
    pub check_file: Option<String>,
    #[arg(long, help = "Expression to check (repeatable); takes precedence over rule files")]
    pub check_expression: Vec<String>,
    #[arg(long, help = "Regex of selectors to skip (repeatable)")]
    pub ignore_selector: Vec<String>,
    #[arg(long, help = "Regex of rule groups to skip (repeatable)")]
    pub ignore_group: Vec<String>,
    #[arg(long, help = "Seconds to wait after each probe (default: 0.1)")]
    pub check_delay: Option<f64>,
    #[arg(long, help = "Maximum rules probed at once, 0 for unbounded (default: 0)")]
    pub max_concurrency: Option<usize>,
    #[arg(long, action = clap::ArgAction::SetTrue, help = "Exit non-zero when any selector returned no data")]
    pub strict: bool,
    #[arg(long, help = "Output mode: graph|json|yaml (default: graph)")]
    pub output: Option<String>,
    #[arg(long, action = clap::ArgAction::SetTrue, help = "Disable colored output")]
    pub no_color: bool,
    #[arg(long, help = "Log level or filter directive (default: info)")]
    pub log_level: Option<String>,
    #[arg(long, action = clap::ArgAction::SetTrue, help = "Log as JSON lines")]
    pub log_json: bool,
}

#[derive(Args, Debug, Default, Clone)]
/// Flags of the `exporter` subcommand.
pub struct ExporterArgs {
    #[arg(long, help = "Address to serve metrics on (default: 0.0.0.0:9093)")]
    pub listen_addr: Option<String>,
    #[arg(long, help = "Seconds between checks (default: 60)")]
    pub interval: Option<u64>,
    #[arg(long, help = "Metric name prefix (default: promcheck)")]
    pub metrics_prefix: Option<String>,
    #[arg(long, action = clap::ArgAction::SetTrue, help = "Do not export process metrics")]
    pub no_runtime_metrics: bool,
}
