//! File reports: HTML overview and the CSV transcript

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::case::Expectation;
use crate::error::E2eResult;
use crate::runner::{CaseResult, TestSuiteResult};

/// One spreadsheet row per case and project, taken from the final attempt
#[derive(Debug, Serialize)]
pub struct TranscriptRow<'a> {
    pub id: &'a str,
    pub title: &'a str,
    pub project: &'a str,
    pub input: &'a str,
    pub expected: &'a str,
    pub actual: &'a str,
    pub status: &'a str,
    pub attempts: usize,
}

impl<'a> TranscriptRow<'a> {
    fn from_result(result: &'a CaseResult) -> Option<Self> {
        let attempt = result.final_attempt()?;
        let expected = match &attempt.log.expectation {
            Expectation::Contains(snippet) => snippet.as_str(),
            Expectation::Empty => "",
        };
        Some(Self {
            id: &result.case_id,
            title: &result.title,
            project: result.project.as_str(),
            input: &attempt.log.input,
            expected,
            actual: attempt.log.actual.as_deref().unwrap_or_default(),
            status: result.status.as_str(),
            attempts: result.attempts.len(),
        })
    }
}

/// Write `transcript.csv`; skipped cases have no attempt and no row
pub fn write_transcript(dir: &Path, suite: &TestSuiteResult) -> E2eResult<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join("transcript.csv");

    let mut writer = csv::Writer::from_path(&path)?;
    for row in suite.cases().filter_map(TranscriptRow::from_result) {
        writer.serialize(row)?;
    }
    writer.flush()?;

    info!("Transcript written to: {}", path.display());
    Ok(path)
}

/// Write `report/index.html`
pub fn write_html(dir: &Path, suite: &TestSuiteResult) -> E2eResult<PathBuf> {
    let report_dir = dir.join("report");
    std::fs::create_dir_all(&report_dir)?;
    let path = report_dir.join("index.html");

    std::fs::write(&path, render_html(suite))?;

    info!("HTML report written to: {}", path.display());
    Ok(path)
}

pub fn render_html(suite: &TestSuiteResult) -> String {
    let mut html = String::new();

    html.push_str(&format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>swiftcheck report</title>
<style>
body {{ font-family: system-ui, sans-serif; margin: 2rem; }}
table {{ border-collapse: collapse; width: 100%; }}
th, td {{ border: 1px solid #ccc; padding: .4rem .6rem; vertical-align: top; text-align: left; }}
td.text {{ white-space: pre-wrap; }}
tr.passed td.status {{ color: #1a7f37; }}
tr.flaky td.status {{ color: #9a6700; }}
tr.failed td.status {{ color: #cf222e; font-weight: bold; }}
tr.skipped td.status {{ color: #6e7781; }}
</style>
</head>
<body>
<h1>swiftcheck report</h1>
<p>Started {started} &middot; {duration} ms &middot; {passed} passed, {flaky} flaky, {failed} failed, {skipped} skipped</p>
"#,
        started = suite.started_at.to_rfc3339(),
        duration = suite.duration_ms,
        passed = suite.passed,
        flaky = suite.flaky,
        failed = suite.failed,
        skipped = suite.skipped,
    ));

    for project in &suite.projects {
        html.push_str(&format!("<h2>{}</h2>\n", escape(project.project.as_str())));
        html.push_str(
            "<table>\n<tr><th>Case</th><th>Status</th><th>Input</th><th>Expected</th><th>Actual</th><th>Details</th></tr>\n",
        );
        for case in &project.cases {
            html.push_str(&render_row(case));
        }
        html.push_str("</table>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}

fn render_row(case: &CaseResult) -> String {
    let status = case.status.as_str();
    let name = if case.title.is_empty() {
        escape(&case.case_id)
    } else {
        format!("{}<br><small>{}</small>", escape(&case.case_id), escape(&case.title))
    };

    let Some(attempt) = case.final_attempt() else {
        return format!(
            "<tr class=\"{status}\"><td>{name}</td><td class=\"status\">{status}</td><td colspan=\"4\"></td></tr>\n"
        );
    };

    let expected = match &attempt.log.expectation {
        Expectation::Contains(snippet) => escape(snippet),
        Expectation::Empty => "<em>(empty)</em>".to_string(),
    };
    let actual = attempt
        .log
        .actual
        .as_deref()
        .map(escape)
        .unwrap_or_else(|| "<em>not captured</em>".to_string());

    let mut details = Vec::new();
    if case.attempts.len() > 1 {
        details.push(format!("{} attempts", case.attempts.len()));
    }
    if let Some(failure) = &attempt.failure {
        details.push(format!("<code>{}</code> {}", failure.kind, escape(&failure.message)));
    }
    if let Some(shot) = &attempt.screenshot {
        details.push(format!("<a href=\"{}\">screenshot</a>", escape(&file_url(&shot.path))));
    }
    if let Some(trace) = &attempt.trace {
        details.push(format!("<a href=\"{}\">trace</a>", escape(&file_url(trace))));
    }

    let status_cell = format!("{}<br><small>{} ms</small>", status, case.duration_ms);

    format!(
        "<tr class=\"{status}\"><td>{name}</td><td class=\"status\">{status_cell}</td><td class=\"text\">{input}</td><td class=\"text\">{expected}</td><td class=\"text\">{actual}</td><td>{details}</td></tr>\n",
        input = escape(&attempt.log.input),
        details = details.join("<br>"),
    )
}

fn file_url(path: &Path) -> String {
    format!("file://{}", path.display())
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
