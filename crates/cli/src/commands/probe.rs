//! Probe Command

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use swiftcheck_e2e::probe::{probe_target, ProbeConfig};

use crate::output::print_success;

#[derive(Args)]
pub struct ProbeArgs {
    /// URL to probe; defaults to the configured target
    #[arg(long)]
    pub url: Option<String>,

    /// Requests before giving up
    #[arg(long, default_value = "3")]
    pub attempts: usize,

    /// Seconds between requests
    #[arg(long, default_value = "2")]
    pub interval: u64,
}

pub async fn execute(args: ProbeArgs, config_path: &Path) -> Result<bool> {
    let config = crate::load_config(config_path)?;
    let url = args.url.unwrap_or(config.target.base_url);

    let probe = ProbeConfig {
        attempts: args.attempts,
        interval: Duration::from_secs(args.interval),
        ..ProbeConfig::new(url.clone())
    };
    let report = probe_target(&probe).await?;

    print_success(&format!(
        "{} answered {} after {} attempt(s) in {} ms",
        url,
        report.status,
        report.attempts,
        report.elapsed.as_millis()
    ));
    Ok(true)
}
