//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use swiftcheck_e2e::{Browser, CaseResult, CaseStatus, Reporter, TestSuiteResult};

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
    /// Plain text format
    Plain,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) -> anyhow::Result<()> {
    if items.is_empty() {
        println!("No cases found.");
        return Ok(());
    }

    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);

            table.set_header(T::headers());
            for item in items {
                table.add_row(item.row());
            }

            println!("{table}");
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(items)?);
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yaml::to_string(items)?);
        }
        OutputFormat::Plain => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    println!("---");
                }
                let row = item.row();
                for (header, value) in T::headers().iter().zip(row.iter()) {
                    println!("{}: {}", header, value);
                }
            }
        }
    }
    Ok(())
}

/// Print success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

/// Print warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "!".yellow(), message);
}

/// Writes transcription blocks and a status line per case to stdout
#[derive(Default)]
pub struct ConsoleReporter {
    projects: usize,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Reporter for ConsoleReporter {
    fn project_started(&mut self, project: Browser, cases: usize) {
        if self.projects > 0 {
            println!();
        }
        self.projects += 1;
        println!("{}", "━".repeat(60).dimmed());
        println!(" {} {}", project.as_str().cyan().bold(), format!("({} cases)", cases).dimmed());
        println!("{}", "━".repeat(60).dimmed());
    }

    fn case_finished(&mut self, result: &CaseResult) {
        for attempt in &result.attempts {
            println!("{}", attempt.log);
        }

        let name = format!("{} {}", result.case_id, result.title);
        let timing = format!("({} ms)", result.duration_ms).dimmed();
        match result.status {
            CaseStatus::Passed => println!("  {} {} {}", "✓".green(), name, timing),
            CaseStatus::Flaky => println!(
                "  {} {} {} {}",
                "✓".yellow(),
                name,
                format!("flaky after {} attempts", result.attempts.len()).yellow(),
                timing
            ),
            CaseStatus::Failed => {
                println!("  {} {} {}", "✗".red(), name.red().bold(), timing);
                if let Some(failure) = result.final_attempt().and_then(|a| a.failure.as_ref()) {
                    println!("    {} {}", failure.kind.as_str().red(), failure.message);
                }
            }
            CaseStatus::Skipped => println!("  {} {}", "-".dimmed(), format!("{} (skipped)", name).dimmed()),
        }
    }

    fn suite_finished(&mut self, result: &TestSuiteResult) {
        println!();
        let mut parts = vec![format!("{} passed", result.passed).green().to_string()];
        if result.flaky > 0 {
            parts.push(format!("{} flaky", result.flaky).yellow().to_string());
        }
        if result.failed > 0 {
            parts.push(format!("{} failed", result.failed).red().bold().to_string());
        }
        if result.skipped > 0 {
            parts.push(format!("{} skipped", result.skipped).dimmed().to_string());
        }
        println!("  {} {}", parts.join(", "), format!("({} ms)", result.duration_ms).dimmed());
    }
}
