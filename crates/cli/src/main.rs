//! swiftcheck CLI - Main Entry Point
//!
//! Runs, lists and checks the swifttranslator.com verification suite.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use swiftcheck_e2e::logging::{init_logging, LogFormat};
use swiftcheck_e2e::HarnessConfig;

mod commands;
mod output;

use commands::{check, list, probe, run};

/// Browser verification harness for the Singlish-to-Sinhala translator
#[derive(Parser)]
#[command(name = "swiftcheck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file; defaults apply when it does not exist
    #[arg(short, long, default_value = "swiftcheck.toml", env = "SWIFTCHECK_CONFIG", global = true)]
    config: PathBuf,

    /// Output format for listings
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Log encoding on stderr (text, json)
    #[arg(long, default_value = "text", global = true)]
    log_format: LogFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the verification cases
    Run(run::RunArgs),

    /// List cases without running them
    List(list::ListArgs),

    /// Validate configuration, case files and the Playwright install
    Check,

    /// Check that the translator answers over HTTP
    Probe(probe::ProbeArgs),

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_format);

    // 0 all passed, 1 cases failed, 2 the harness itself failed
    match dispatch(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            ExitCode::from(2)
        }
    }
}

async fn dispatch(cli: Cli) -> Result<bool> {
    match cli.command {
        Commands::Run(args) => run::execute(args, &cli.config).await,
        Commands::List(args) => list::execute(args, &cli.config, cli.format),
        Commands::Check => check::execute(&cli.config).await,
        Commands::Probe(args) => probe::execute(args, &cli.config).await,
        Commands::Version => {
            println!("swiftcheck v{}", env!("CARGO_PKG_VERSION"));
            println!("Target: {}", swiftcheck_e2e::config::DEFAULT_BASE_URL);
            Ok(true)
        }
    }
}

/// Configuration file overlaid with the environment
pub(crate) fn load_config(path: &Path) -> Result<HarnessConfig> {
    let mut config = HarnessConfig::load(path).with_context(|| format!("loading {}", path.display()))?;
    config.apply_env();
    Ok(config)
}
