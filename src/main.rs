//! promcheck CLI binary entry point.
//! Resolves the configuration and delegates to the check or exporter mode.

use clap::Parser;
use promcheck::app::{App, CycleSummary};
use promcheck::cli::{Cli, Commands, ExporterArgs, RunArgs};
use promcheck::config::{self, Effective};
use promcheck::error::Error;
use promcheck::exporter;
use promcheck::report::OutputFormat;
use promcheck::utils::{error_prefix, note_prefix};
use std::path::Path;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const EXIT_FAILURE: u8 = 1;
const EXIT_CONFIG: u8 = 2;

fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let fmt = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        fmt.json().init();
    } else {
        fmt.init();
    }
}

fn resolve(root: &Path, args: &RunArgs, exporter: Option<&ExporterArgs>) -> Result<Effective, ExitCode> {
    match config::resolve_effective(root, args, exporter) {
        Ok(eff) => {
            if args.config.is_none() && eff.output == OutputFormat::Graph {
                if let Ok(None) = config::load_config(root, None) {
                    eprintln!("{} No promcheck.toml found; using defaults.", note_prefix());
                }
            }
            init_logging(&eff.log_level, eff.log_json);
            Ok(eff)
        }
        Err(e) => {
            eprintln!("{} {}", error_prefix(), e);
            Err(ExitCode::from(EXIT_CONFIG))
        }
    }
}

/// Strict mode fails on selectors without data and on incomplete checks.
fn strict_failure(summary: &CycleSummary) -> bool {
    summary.has_no_results || summary.rules_failed > 0 || summary.groups_failed > 0
}

async fn run_check(eff: Effective) -> ExitCode {
    let strict = eff.strict;
    let mut app = match App::new(eff) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("{} {}", error_prefix(), e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    match app.check().await {
        Ok(summary) if strict && strict_failure(&summary) => ExitCode::from(EXIT_FAILURE),
        Ok(_) => ExitCode::SUCCESS,
        Err(Error::EmptyReport) => {
            eprintln!("{} {}", error_prefix(), Error::EmptyReport);
            ExitCode::from(EXIT_FAILURE)
        }
        Err(e) => {
            error!(error = %e, "failed to check rules");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

async fn run_exporter(eff: Effective) -> ExitCode {
    let app = match App::exporter(eff) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("{} {}", error_prefix(), e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    match exporter::run(app).await {
        Ok(()) => {
            info!("exporter stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "exporter failed");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let root = match std::env::current_dir() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{} cannot determine working directory: {}", error_prefix(), e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    match cli.cmd {
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        Commands::Check { args } => match resolve(&root, &args, None) {
            Ok(eff) => run_check(eff).await,
            Err(code) => code,
        },
        Commands::Exporter { args, exporter } => match resolve(&root, &args, Some(&exporter)) {
            Ok(eff) => run_exporter(eff).await,
            Err(code) => code,
        },
    }
}
