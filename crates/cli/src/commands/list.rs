//! List Commands

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use swiftcheck_e2e::case::ScheduledCase;
use swiftcheck_e2e::{CaseFilter, CaseSuite};

use crate::output::{print_list, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct ListArgs {
    /// Only cases whose id or title contains this text
    #[arg(short, long)]
    pub grep: Option<String>,

    /// Only cases in a category
    #[arg(long)]
    pub category: Option<String>,

    /// Directory holding the case files
    #[arg(long)]
    pub cases: Option<PathBuf>,
}

/// Case display wrapper for serialization
#[derive(Serialize)]
pub struct CaseDisplay {
    pub id: String,
    pub title: String,
    pub category: String,
    pub interaction: String,
    pub input: String,
    pub expected: String,
    pub flags: String,
}

impl From<&ScheduledCase> for CaseDisplay {
    fn from(scheduled: &ScheduledCase) -> Self {
        let case = &scheduled.case;
        let mut flags = Vec::new();
        if case.only {
            flags.push("only");
        }
        if case.skip {
            flags.push("skip");
        }

        Self {
            id: case.id.clone(),
            title: case.title.clone(),
            category: case
                .category()
                .map(|c| c.label().to_string())
                .unwrap_or_else(|| scheduled.group.clone()),
            interaction: case.interaction.as_str().to_string(),
            input: case.input.clone(),
            expected: case.expectation().to_string(),
            flags: flags.join(","),
        }
    }
}

impl TableDisplay for CaseDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "Title", "Category", "Interaction", "Input", "Expected", "Flags"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.title.clone(),
            self.category.clone(),
            self.interaction.clone(),
            truncate(&self.input, 40),
            truncate(&self.expected, 40),
            self.flags.clone(),
        ]
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let head: String = text.chars().take(max).collect();
        format!("{}…", head)
    }
}

pub fn execute(args: ListArgs, config_path: &Path, format: OutputFormat) -> Result<bool> {
    let mut config = crate::load_config(config_path)?;
    if let Some(cases) = args.cases {
        config.cases_dir = cases;
    }

    let suite = CaseSuite::load(&config.cases_dir)?;
    let filter = CaseFilter {
        grep: args.grep,
        category: args.category,
    };
    // Listing shows focused cases instead of refusing them
    let scheduled = suite.schedule(&filter, false)?;

    let rows: Vec<CaseDisplay> = scheduled.iter().map(CaseDisplay::from).collect();
    print_list(&rows, format)?;
    Ok(true)
}
