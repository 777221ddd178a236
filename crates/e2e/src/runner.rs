//! Main test runner that orchestrates browser projects, retries and workers

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::case::{ScheduledCase, VerificationCase};
use crate::config::HarnessConfig;
use crate::error::{E2eError, E2eResult, FailureKind};
use crate::page::{BrowserLauncher, LaunchOptions, Page};
use crate::playwright::Browser;
use crate::verify::{CaseLog, Verification, Verifier};

/// Time allowed for screenshot and shutdown once an attempt has ended
const CLEANUP_GRACE: Duration = Duration::from_secs(10);

/// A file written for a failing (or traced) attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub path: PathBuf,
    pub sha256: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
    /// Output text at the moment the assertion gave up
    pub last_observed: Option<String>,
}

impl From<&E2eError> for Failure {
    fn from(err: &E2eError) -> Self {
        let last_observed = match err {
            E2eError::AssertionTimeout { actual, .. } => Some(actual.clone()),
            _ => None,
        };
        Self {
            kind: err.kind(),
            message: err.to_string(),
            last_observed,
        }
    }
}

/// Result of one execution of a case, retries included
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// 0 for the first run, 1 for the first retry
    pub attempt: u32,
    pub passed: bool,
    pub duration_ms: u64,
    pub log: CaseLog,
    pub failure: Option<Failure>,
    pub screenshot: Option<ArtifactRef>,
    pub trace: Option<PathBuf>,
}

impl AttemptRecord {
    fn from_verification(attempt: u32, verification: Verification) -> Self {
        Self {
            attempt,
            passed: verification.outcome.is_ok(),
            duration_ms: 0,
            failure: verification.outcome.as_ref().err().map(Failure::from),
            log: verification.log,
            screenshot: None,
            trace: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Passed,
    /// Passed on a retry
    Flaky,
    Failed,
    Skipped,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Passed => "passed",
            CaseStatus::Flaky => "flaky",
            CaseStatus::Failed => "failed",
            CaseStatus::Skipped => "skipped",
        }
    }

    fn from_attempts(attempts: &[AttemptRecord]) -> Self {
        match attempts.last() {
            None => CaseStatus::Skipped,
            Some(last) if !last.passed => CaseStatus::Failed,
            Some(_) if attempts.len() > 1 => CaseStatus::Flaky,
            Some(_) => CaseStatus::Passed,
        }
    }
}

/// Result of running a single case against one project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseResult {
    /// Declaration order within the run
    pub index: usize,
    pub case_id: String,
    pub title: String,
    pub group: String,
    pub project: Browser,
    pub status: CaseStatus,
    pub duration_ms: u64,
    pub attempts: Vec<AttemptRecord>,
}

impl CaseResult {
    pub fn final_attempt(&self) -> Option<&AttemptRecord> {
        self.attempts.last()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectResult {
    pub project: Browser,
    pub cases: Vec<CaseResult>,
}

/// Result of running all projects
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteResult {
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub flaky: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub projects: Vec<ProjectResult>,
}

impl TestSuiteResult {
    /// True when no case failed after retries
    pub fn success(&self) -> bool {
        self.failed == 0
    }

    pub fn cases(&self) -> impl Iterator<Item = &CaseResult> {
        self.projects.iter().flat_map(|p| p.cases.iter())
    }
}

/// Receives results in declaration order as they become available
pub trait Reporter: Send {
    fn project_started(&mut self, _project: Browser, _cases: usize) {}

    fn case_finished(&mut self, result: &CaseResult);

    fn suite_finished(&mut self, _result: &TestSuiteResult) {}
}

/// Reporter that discards everything
pub struct NullReporter;

impl Reporter for NullReporter {
    fn case_finished(&mut self, _result: &CaseResult) {}
}

/// Releases results in submission order even when they complete out of order.
///
/// Positions are assigned by the caller and must run 0, 1, 2, ...; the
/// result's own `index` is carried through untouched.
#[derive(Debug, Default)]
pub struct OrderedEmitter {
    next: usize,
    pending: BTreeMap<usize, CaseResult>,
}

impl OrderedEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept the result submitted at `position`, returning every result now in sequence
    pub fn push(&mut self, position: usize, result: CaseResult) -> Vec<CaseResult> {
        self.pending.insert(position, result);

        let mut ready = Vec::new();
        while let Some(result) = self.pending.remove(&self.next) {
            ready.push(result);
            self.next += 1;
        }
        ready
    }

    /// Whatever is still held back, in position order
    pub fn drain(&mut self) -> Vec<CaseResult> {
        std::mem::take(&mut self.pending).into_values().collect()
    }
}

/// Main verification runner
pub struct TestRunner {
    config: Arc<HarnessConfig>,
    launcher: Arc<dyn BrowserLauncher>,
    artifact_root: PathBuf,
}

impl TestRunner {
    pub fn new(config: HarnessConfig, launcher: Arc<dyn BrowserLauncher>) -> Self {
        let output_dir = if config.output_dir.is_absolute() {
            config.output_dir.clone()
        } else {
            // The driver runs from another directory, so artifact paths must be absolute
            std::env::current_dir()
                .map(|cwd| cwd.join(&config.output_dir))
                .unwrap_or_else(|_| config.output_dir.clone())
        };

        Self {
            artifact_root: output_dir.join("artifacts"),
            config: Arc::new(config),
            launcher,
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run the scheduled cases against every configured project.
    ///
    /// Results are reported in slice order; `index` values need not be contiguous.
    pub async fn run(&self, cases: &[ScheduledCase], reporter: &mut dyn Reporter) -> E2eResult<TestSuiteResult> {
        let started_at = Utc::now();
        let start = Instant::now();

        let mut projects = Vec::new();
        for project in &self.config.browser.projects {
            projects.push(self.run_project(*project, cases, reporter).await);
        }

        let mut suite = TestSuiteResult {
            started_at,
            total: 0,
            passed: 0,
            flaky: 0,
            failed: 0,
            skipped: 0,
            duration_ms: start.elapsed().as_millis() as u64,
            projects,
        };

        let statuses: Vec<CaseStatus> = suite.cases().map(|c| c.status).collect();
        for status in statuses {
            suite.total += 1;
            match status {
                CaseStatus::Passed => suite.passed += 1,
                CaseStatus::Flaky => suite.flaky += 1,
                CaseStatus::Failed => suite.failed += 1,
                CaseStatus::Skipped => suite.skipped += 1,
            }
        }

        info!("");
        info!(
            "Results: {} passed, {} flaky, {} failed, {} skipped ({} ms)",
            suite.passed, suite.flaky, suite.failed, suite.skipped, suite.duration_ms
        );

        reporter.suite_finished(&suite);
        Ok(suite)
    }

    async fn run_project(&self, project: Browser, cases: &[ScheduledCase], reporter: &mut dyn Reporter) -> ProjectResult {
        let workers = self.config.execution.workers.max(1);
        info!("Running {} case(s) on {} with {} worker(s)...", cases.len(), project, workers);
        reporter.project_started(project, cases.len());

        let mut emitter = OrderedEmitter::new();
        let mut results = Vec::with_capacity(cases.len());

        // Order by slice position so callers may pass a filtered subset
        let mut finished = stream::iter(cases.iter().enumerate())
            .map(|(position, scheduled)| async move { (position, self.run_case(project, scheduled).await) })
            .buffer_unordered(workers);

        while let Some((position, result)) = finished.next().await {
            for ready in emitter.push(position, result) {
                reporter.case_finished(&ready);
                results.push(ready);
            }
        }
        for leftover in emitter.drain() {
            reporter.case_finished(&leftover);
            results.push(leftover);
        }

        ProjectResult {
            project,
            cases: results,
        }
    }

    /// Run one case with whole-case retries
    pub async fn run_case(&self, project: Browser, scheduled: &ScheduledCase) -> CaseResult {
        let case = &scheduled.case;
        let start = Instant::now();
        let mut attempts = Vec::new();

        if case.skip {
            debug!("Skipping {}", case.id);
        } else {
            for attempt in 0..=self.config.execution.retries {
                if attempt > 0 {
                    warn!("Retrying {} on {} (retry #{})", case.id, project, attempt);
                }
                let record = self.run_attempt(project, scheduled, attempt).await;
                let passed = record.passed;
                attempts.push(record);
                if passed {
                    break;
                }
            }
        }

        let status = CaseStatus::from_attempts(&attempts);
        let duration_ms = start.elapsed().as_millis() as u64;

        match status {
            CaseStatus::Passed | CaseStatus::Flaky => info!("✓ {} ({} ms)", case.id, duration_ms),
            CaseStatus::Failed => error!(
                "✗ {} - {}",
                case.id,
                attempts
                    .last()
                    .and_then(|a| a.failure.as_ref())
                    .map(|f| f.message.as_str())
                    .unwrap_or("unknown error")
            ),
            CaseStatus::Skipped => {}
        }

        CaseResult {
            index: scheduled.index,
            case_id: case.id.clone(),
            title: case.title.clone(),
            group: scheduled.group.clone(),
            project,
            status,
            duration_ms,
            attempts,
        }
    }

    async fn run_attempt(&self, project: Browser, scheduled: &ScheduledCase, attempt: u32) -> AttemptRecord {
        let case = &scheduled.case;
        let start = Instant::now();
        let budget = Duration::from_millis(self.config.timing.case_timeout_ms);
        let span = info_span!("attempt", case_id = %case.id, project = %project, attempt);
        let options = LaunchOptions {
            trace: self.config.artifacts.trace.records(attempt),
        };

        // Both live outside the timed section so a timeout keeps what was seen
        let mut page: Option<Box<dyn Page>> = None;
        let mut log = CaseLog::new(case);

        let outcome = tokio::time::timeout(budget, self.drive_attempt(project, case, options, &mut page, &mut log))
            .instrument(span.clone())
            .await
            .unwrap_or_else(|_| {
                Err(E2eError::CaseTimeout {
                    case_id: case.id.clone(),
                    timeout_ms: self.config.timing.case_timeout_ms,
                })
            });

        let mut record = AttemptRecord::from_verification(attempt, Verification { log, outcome });
        if let Some(failure) = record.failure.as_mut() {
            if failure.last_observed.is_none() {
                failure.last_observed = record.log.actual.clone();
            }
        }

        if let Some(page) = page {
            let dir = self.attempt_dir(project, &case.id, attempt);
            self.finish_attempt(page, &dir, options, &mut record)
                .instrument(span)
                .await;
        }

        record.duration_ms = start.elapsed().as_millis() as u64;
        record
    }

    /// Launch, navigate and verify, leaving the page and log with the caller
    async fn drive_attempt(
        &self,
        project: Browser,
        case: &VerificationCase,
        options: LaunchOptions,
        slot: &mut Option<Box<dyn Page>>,
        log: &mut CaseLog,
    ) -> E2eResult<()> {
        let page = slot.insert(self.launcher.launch(project, options).await?);
        page.goto(&self.config.target.base_url).await?;
        Verifier::new(&self.config.target, &self.config.timing)
            .verify(page.as_mut(), case, log)
            .await
    }

    /// Screenshot and close, bounded so a wedged browser cannot stall the run
    async fn finish_attempt(&self, mut page: Box<dyn Page>, dir: &Path, options: LaunchOptions, record: &mut AttemptRecord) {
        let artifacts = &self.config.artifacts;
        let failed = !record.passed;
        let attempt = record.attempt;
        let case_id = record.log.case_id.clone();

        let cleanup = async {
            if artifacts.screenshot.captures(failed) {
                record.screenshot = capture_screenshot(page.as_mut(), &dir.join("screenshot.png")).await;
            }

            let trace_path = (options.trace && artifacts.trace.keeps(attempt, failed)).then(|| dir.join("trace.zip"));
            match page.close(trace_path.as_deref()).await {
                Ok(()) => record.trace = trace_path,
                Err(err) => warn!("Closing browser for {} failed: {}", case_id, err),
            }
        };

        if tokio::time::timeout(CLEANUP_GRACE, cleanup).await.is_err() {
            warn!("Gave up on artifacts for {} after {:?}", case_id, CLEANUP_GRACE);
        }
    }

    fn attempt_dir(&self, project: Browser, case_id: &str, attempt: u32) -> PathBuf {
        let name = if attempt == 0 {
            case_id.to_string()
        } else {
            format!("{}-retry{}", case_id, attempt)
        };
        self.artifact_root.join(project.as_str()).join(name)
    }

    /// Write test results to JSON file
    pub fn write_results(&self, results: &TestSuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let path = self.config.output_dir.join("results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

async fn capture_screenshot(page: &mut dyn Page, path: &Path) -> Option<ArtifactRef> {
    match page.screenshot(path).await {
        Ok(()) => Some(ArtifactRef {
            path: path.to_path_buf(),
            sha256: hash_file(path).ok(),
        }),
        Err(err) => {
            warn!("Screenshot failed: {}", err);
            None
        }
    }
}

fn hash_file(path: &Path) -> E2eResult<String> {
    let data = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}
