//! Check Command

use std::path::Path;

use anyhow::Result;
use swiftcheck_e2e::case::CaseFilter;
use swiftcheck_e2e::{CaseSuite, PlaywrightConfig, PlaywrightLauncher};

use crate::output::{print_error, print_success};

/// Validate everything a run needs without opening a browser
pub async fn execute(config_path: &Path) -> Result<bool> {
    let config = crate::load_config(config_path)?;
    let mut ok = true;

    match config.validate() {
        Ok(()) => print_success(&format!("Configuration valid (target {})", config.target.base_url)),
        Err(e) => {
            print_error(&e.to_string());
            ok = false;
        }
    }

    match CaseSuite::load(&config.cases_dir) {
        Ok(suite) => {
            print_success(&format!(
                "{} case(s) in {} file(s) under {}",
                suite.len(),
                suite.files.len(),
                config.cases_dir.display()
            ));
            if let Err(e) = suite.schedule(&CaseFilter::default(), config.execution.forbid_only) {
                print_error(&e.to_string());
                ok = false;
            }
        }
        Err(e) => {
            print_error(&e.to_string());
            ok = false;
        }
    }

    match PlaywrightLauncher::new(PlaywrightConfig::from_harness(&config)) {
        Ok(_) => print_success("Playwright available"),
        Err(e) => {
            print_error(&e.to_string());
            ok = false;
        }
    }

    Ok(ok)
}
