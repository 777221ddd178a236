//! Run Command

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use swiftcheck_e2e::probe::{probe_target, ProbeConfig};
use swiftcheck_e2e::{report, Browser, CaseFilter, CaseSuite, HarnessConfig, PlaywrightConfig, PlaywrightLauncher, TestRunner};
use tracing::info;

use crate::output::{print_success, print_warning, ConsoleReporter};

#[derive(Args)]
pub struct RunArgs {
    /// Only cases whose id or title contains this text
    #[arg(short, long)]
    pub grep: Option<String>,

    /// Only cases in a category (positive, negative, functional, ui, neg_fun, ...)
    #[arg(long)]
    pub category: Option<String>,

    /// Browser project to run; repeat for several
    #[arg(short, long = "project")]
    pub projects: Vec<Browser>,

    /// Parallel browser contexts per project
    #[arg(short = 'j', long)]
    pub workers: Option<usize>,

    /// Whole-case retries after a failure
    #[arg(long)]
    pub retries: Option<u32>,

    /// Run browsers without a window
    #[arg(long, conflicts_with = "headed")]
    pub headless: bool,

    /// Run browsers with a window
    #[arg(long)]
    pub headed: bool,

    /// Override the translator URL
    #[arg(long)]
    pub base_url: Option<String>,

    /// Directory holding the case files
    #[arg(long)]
    pub cases: Option<PathBuf>,

    /// Directory for results, reports and artifacts
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Fail when any case is focused with `only`
    #[arg(long)]
    pub forbid_only: bool,

    /// Probe the target over HTTP before launching browsers
    #[arg(long)]
    pub preflight: bool,
}

impl RunArgs {
    /// Flags win over the file and the environment
    fn apply(&self, config: &mut HarnessConfig) {
        if !self.projects.is_empty() {
            config.browser.projects = self.projects.clone();
        }
        if let Some(workers) = self.workers {
            config.execution.workers = workers;
        }
        if let Some(retries) = self.retries {
            config.execution.retries = retries;
        }
        if self.headless {
            config.browser.headless = true;
        }
        if self.headed {
            config.browser.headless = false;
        }
        if let Some(url) = &self.base_url {
            config.target.base_url = url.clone();
        }
        if let Some(cases) = &self.cases {
            config.cases_dir = cases.clone();
        }
        if let Some(output) = &self.output {
            config.output_dir = output.clone();
        }
        if self.forbid_only {
            config.execution.forbid_only = true;
        }
    }

    fn filter(&self) -> CaseFilter {
        CaseFilter {
            grep: self.grep.clone(),
            category: self.category.clone(),
        }
    }
}

pub async fn execute(args: RunArgs, config_path: &Path) -> Result<bool> {
    let mut config = crate::load_config(config_path)?;
    args.apply(&mut config);
    config.validate()?;

    let suite = CaseSuite::load(&config.cases_dir)?;
    let scheduled = suite.schedule(&args.filter(), config.execution.forbid_only)?;
    if scheduled.is_empty() {
        print_warning("No cases matched");
        return Ok(true);
    }
    info!("Scheduled {} of {} case(s)", scheduled.len(), suite.len());

    if args.preflight {
        let report = probe_target(&ProbeConfig::new(config.target.base_url.clone())).await?;
        info!("Target answered {} in {:?}", report.status, report.elapsed);
    }

    let launcher = PlaywrightLauncher::new(PlaywrightConfig::from_harness(&config))?;
    let runner = TestRunner::new(config, Arc::new(launcher));

    let mut reporter = ConsoleReporter::new();
    let result = runner.run(&scheduled, &mut reporter).await?;

    let output_dir = &runner.config().output_dir;
    let results = runner.write_results(&result)?;
    print_success(&format!("Results: {}", results.display()));

    if runner.config().artifacts.html_report {
        let html = report::write_html(output_dir, &result)?;
        print_success(&format!("Report: {}", html.display()));
    }
    if runner.config().artifacts.transcript_csv {
        let csv = report::write_transcript(output_dir, &result)?;
        print_success(&format!("Transcript: {}", csv.display()));
    }

    Ok(result.success())
}
