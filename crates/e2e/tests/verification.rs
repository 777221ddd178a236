//! Runner and verifier behaviour against a scripted translator page

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::{case, config, schedule, FakeLauncher, FakeSite, Op};
use swiftcheck_e2e::config::{ScreenshotMode, SettleStrategy, DEFAULT_BASE_URL};
use swiftcheck_e2e::runner::NullReporter;
use swiftcheck_e2e::{report, CaseResult, CaseStatus, FailureKind, Interaction, Reporter, TestRunner, TestSuiteResult};

const PAIRS: &[(&str, &str)] = &[
    ("mata bath tikak oonee.", "මට බත් ටිකක් ඕනේ."),
    ("api yanavaa", "අපි යනවා"),
    ("oyaa hodhin innavadha?", "ඔයා හොදින් ඉන්නවද?"),
];

#[derive(Default)]
struct Collecting {
    order: Vec<String>,
    finished: bool,
}

impl Reporter for Collecting {
    fn case_finished(&mut self, result: &CaseResult) {
        self.order.push(result.case_id.clone());
    }

    fn suite_finished(&mut self, _result: &TestSuiteResult) {
        self.finished = true;
    }
}

#[tokio::test(start_paused = true)]
async fn fill_case_passes_and_logs_observed_output() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = FakeLauncher::new(FakeSite::new(PAIRS));
    let runner = TestRunner::new(config(dir.path()), Arc::new(launcher.clone()));

    let cases = schedule(vec![case("Pos_Fun_0001", "mata bath tikak oonee.", "බත් ටිකක්")]);
    let suite = runner.run(&cases, &mut NullReporter).await.unwrap();

    assert!(suite.success());
    assert_eq!(suite.passed, 1);
    let result = &suite.projects[0].cases[0];
    assert_eq!(result.status, CaseStatus::Passed);
    assert_eq!(result.attempts.len(), 1);

    let attempt = result.final_attempt().unwrap();
    assert_eq!(attempt.log.actual.as_deref(), Some("මට බත් ටිකක් ඕනේ."));
    assert!(attempt.screenshot.is_none());

    assert_eq!(
        launcher.site.ops(),
        vec![
            Op::Goto(DEFAULT_BASE_URL.to_string()),
            Op::Fill("mata bath tikak oonee.".to_string()),
            Op::Close(None),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn mismatch_fails_with_last_observed_and_screenshot() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = FakeLauncher::new(FakeSite::new(PAIRS));
    let runner = TestRunner::new(config(dir.path()), Arc::new(launcher));

    let cases = schedule(vec![case("Neg_Fun_0001", "api yanavaa", "අපි ගියා")]);
    let suite = runner.run(&cases, &mut NullReporter).await.unwrap();

    assert!(!suite.success());
    let attempt = suite.projects[0].cases[0].final_attempt().unwrap();
    let failure = attempt.failure.as_ref().unwrap();
    assert_eq!(failure.kind, FailureKind::AssertionTimeout);
    assert_eq!(failure.last_observed.as_deref(), Some("අපි යනවා"));
    assert_eq!(attempt.log.actual.as_deref(), Some("අපි යනවා"));

    let shot = attempt.screenshot.as_ref().unwrap();
    assert_eq!(
        shot.path,
        dir.path().join("artifacts/chromium/Neg_Fun_0001/screenshot.png")
    );
    assert!(shot.path.exists());
    assert_eq!(shot.sha256.as_ref().map(String::len), Some(64));
}

#[tokio::test(start_paused = true)]
async fn whitespace_differences_do_not_fail_containment() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = FakeLauncher::new(FakeSite::new(&[("mama gedhara yanavaa", "මම  ගෙදර\nයනවා")]));
    let runner = TestRunner::new(config(dir.path()), Arc::new(launcher));

    let cases = schedule(vec![case("Pos_Fun_0002", "mama gedhara yanavaa", "ගෙදර යනවා")]);
    let suite = runner.run(&cases, &mut NullReporter).await.unwrap();
    assert_eq!(suite.passed, 1);
}

#[tokio::test(start_paused = true)]
async fn typed_input_goes_key_by_key() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = FakeLauncher::new(FakeSite::new(PAIRS));
    let runner = TestRunner::new(config(dir.path()), Arc::new(launcher.clone()));

    let mut typed = case("Pos_UI_0001", "api yanavaa", "අපි යනවා");
    typed.interaction = Interaction::Type { delay_ms: Some(50) };
    let suite = runner.run(&schedule(vec![typed]), &mut NullReporter).await.unwrap();

    assert_eq!(suite.passed, 1);
    let ops = launcher.site.ops();
    assert!(ops.contains(&Op::Press("api yanavaa".to_string(), 50)));
    assert!(!ops.iter().any(|op| matches!(op, Op::Fill(_))));
}

#[tokio::test(start_paused = true)]
async fn typed_input_uses_configured_delay_when_unset() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = FakeLauncher::new(FakeSite::new(PAIRS));
    let mut cfg = config(dir.path());
    cfg.timing.type_delay_ms = 20;
    let runner = TestRunner::new(cfg, Arc::new(launcher.clone()));

    let mut typed = case("Pos_UI_0001", "api yanavaa", "අපි යනවා");
    typed.interaction = Interaction::Type { delay_ms: None };
    runner.run(&schedule(vec![typed]), &mut NullReporter).await.unwrap();

    assert!(launcher.site.ops().contains(&Op::Press("api yanavaa".to_string(), 20)));
}

#[tokio::test(start_paused = true)]
async fn cleared_input_leaves_empty_output() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = FakeLauncher::new(FakeSite::new(PAIRS));
    let runner = TestRunner::new(config(dir.path()), Arc::new(launcher.clone()));

    let mut cleared = case("Neg_UI_0001", "Testing Clear", "");
    cleared.interaction = Interaction::Clear;
    let suite = runner.run(&schedule(vec![cleared]), &mut NullReporter).await.unwrap();

    assert_eq!(suite.passed, 1);
    let attempt = suite.projects[0].cases[0].final_attempt().unwrap();
    assert_eq!(attempt.log.actual.as_deref(), Some(""));

    let ops = launcher.site.ops();
    let fill = ops.iter().position(|op| *op == Op::Fill("Testing Clear".to_string())).unwrap();
    let clear = ops.iter().position(|op| *op == Op::Clear).unwrap();
    assert!(fill < clear);
}

#[tokio::test(start_paused = true)]
async fn missing_output_reports_element_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let mut site = FakeSite::new(PAIRS);
    site.missing_output = true;
    let runner = TestRunner::new(config(dir.path()), Arc::new(FakeLauncher::new(site)));

    let suite = runner
        .run(&schedule(vec![case("Pos_Fun_0003", "api yanavaa", "අපි")]), &mut NullReporter)
        .await
        .unwrap();

    let attempt = suite.projects[0].cases[0].final_attempt().unwrap();
    assert_eq!(attempt.failure.as_ref().unwrap().kind, FailureKind::ElementNotFound);
    assert!(attempt.log.actual.is_none());
}

#[tokio::test(start_paused = true)]
async fn navigation_failure_retried_to_flaky_with_trace() {
    let dir = tempfile::tempdir().unwrap();
    let site = FakeSite::new(PAIRS);
    site.navigation_failures.store(1, Ordering::SeqCst);
    let launcher = FakeLauncher::new(site);

    let mut cfg = config(dir.path());
    cfg.execution.retries = 1;
    let runner = TestRunner::new(cfg, Arc::new(launcher.clone()));

    let suite = runner
        .run(&schedule(vec![case("Pos_Fun_0004", "api yanavaa", "අපි යනවා")]), &mut NullReporter)
        .await
        .unwrap();

    assert!(suite.success());
    assert_eq!(suite.flaky, 1);
    let result = &suite.projects[0].cases[0];
    assert_eq!(result.status, CaseStatus::Flaky);
    assert_eq!(result.attempts.len(), 2);

    let first = &result.attempts[0];
    assert_eq!(first.attempt, 0);
    assert_eq!(first.failure.as_ref().unwrap().kind, FailureKind::Navigation);
    assert!(first.trace.is_none());

    let retry = &result.attempts[1];
    assert!(retry.passed);
    assert_eq!(
        retry.trace.as_deref(),
        Some(dir.path().join("artifacts/chromium/Pos_Fun_0004-retry1/trace.zip").as_path())
    );
    assert_eq!(launcher.site.traced_launches.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn one_record_per_attempt_when_retries_exhausted() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = FakeLauncher::new(FakeSite::new(PAIRS));
    let mut cfg = config(dir.path());
    cfg.execution.retries = 2;
    cfg.artifacts.screenshot = ScreenshotMode::Off;
    let runner = TestRunner::new(cfg, Arc::new(launcher.clone()));

    let suite = runner
        .run(&schedule(vec![case("Neg_Fun_0002", "api yanavaa", "ගියා")]), &mut NullReporter)
        .await
        .unwrap();

    let result = &suite.projects[0].cases[0];
    assert_eq!(result.status, CaseStatus::Failed);
    let numbers: Vec<u32> = result.attempts.iter().map(|a| a.attempt).collect();
    assert_eq!(numbers, vec![0, 1, 2]);
    assert!(result.attempts.iter().all(|a| a.screenshot.is_none()));

    // Every attempt gets its own context and tears it down
    assert_eq!(launcher.site.launches(), 3);
    let closes = launcher.site.ops().iter().filter(|op| matches!(op, Op::Close(_))).count();
    assert_eq!(closes, 3);
}

#[tokio::test(start_paused = true)]
async fn hung_page_hits_case_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let mut site = FakeSite::new(PAIRS);
    site.hang_on_goto = true;
    let mut cfg = config(dir.path());
    cfg.timing.case_timeout_ms = 2000;
    let launcher = FakeLauncher::new(site);
    let runner = TestRunner::new(cfg, Arc::new(launcher.clone()));

    let suite = runner
        .run(&schedule(vec![case("Pos_Fun_0005", "api yanavaa", "අපි")]), &mut NullReporter)
        .await
        .unwrap();

    let attempt = suite.projects[0].cases[0].final_attempt().unwrap();
    let failure = attempt.failure.as_ref().unwrap();
    assert_eq!(failure.kind, FailureKind::CaseTimeout);
    assert!(failure.message.contains("Pos_Fun_0005"));
    assert!(attempt.log.actual.is_none());
    assert!(attempt.screenshot.is_some());
    assert!(matches!(launcher.site.ops().last(), Some(Op::Close(_))));
}

#[tokio::test(start_paused = true)]
async fn case_timeout_keeps_sampled_output_and_screenshot() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = FakeLauncher::new(FakeSite::new(PAIRS));
    let mut cfg = config(dir.path());
    // Expires inside the assertion window: settle 1500 ms, then polling for 5000 ms
    cfg.timing.case_timeout_ms = 3000;
    let runner = TestRunner::new(cfg, Arc::new(launcher.clone()));

    let suite = runner
        .run(&schedule(vec![case("Neg_Fun_0002", "api yanavaa", "අපි ගියා")]), &mut NullReporter)
        .await
        .unwrap();

    let attempt = suite.projects[0].cases[0].final_attempt().unwrap();
    let failure = attempt.failure.as_ref().unwrap();
    assert_eq!(failure.kind, FailureKind::CaseTimeout);
    assert_eq!(attempt.log.actual.as_deref(), Some("අපි යනවා"));
    assert_eq!(failure.last_observed.as_deref(), Some("අපි යනවා"));
    assert!(attempt.log.to_string().contains("Actual Output: අපි යනවා"));

    let shot = attempt.screenshot.as_ref().unwrap();
    assert!(shot.path.exists());
    assert_eq!(
        launcher.site.ops(),
        vec![
            Op::Goto(DEFAULT_BASE_URL.to_string()),
            Op::Fill("api yanavaa".to_string()),
            Op::Screenshot(shot.path.clone()),
            Op::Close(None),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn parallel_workers_report_in_declaration_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut site = FakeSite::new(PAIRS);
    site.render_delay = std::time::Duration::ZERO;
    let launcher = FakeLauncher::new(site);

    let mut cfg = config(dir.path());
    cfg.execution.workers = 3;
    let runner = TestRunner::new(cfg, Arc::new(launcher.clone()));

    let mut slow = case("Pos_Fun_0001", "mata bath tikak oonee.", "මට");
    slow.settle_ms = Some(3000);
    let mut fast = case("Pos_Fun_0002", "api yanavaa", "අපි");
    fast.settle_ms = Some(10);
    let mut middle = case("Pos_Fun_0003", "oyaa hodhin innavadha?", "ඔයා");
    middle.settle_ms = Some(500);

    let mut reporter = Collecting::default();
    let suite = runner.run(&schedule(vec![slow, fast, middle]), &mut reporter).await.unwrap();

    assert_eq!(suite.passed, 3);
    assert_eq!(reporter.order, vec!["Pos_Fun_0001", "Pos_Fun_0002", "Pos_Fun_0003"]);
    assert!(reporter.finished);
    let indices: Vec<usize> = suite.projects[0].cases.iter().map(|c| c.index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
}

/// Records when each result reached the reporter
struct Timed {
    start: tokio::time::Instant,
    seen: Vec<(usize, std::time::Duration)>,
}

impl Reporter for Timed {
    fn case_finished(&mut self, result: &CaseResult) {
        self.seen.push((result.index, self.start.elapsed()));
    }
}

#[tokio::test(start_paused = true)]
async fn filtered_subset_streams_results_as_they_finish() {
    let dir = tempfile::tempdir().unwrap();
    let mut site = FakeSite::new(PAIRS);
    site.render_delay = std::time::Duration::ZERO;
    let mut cfg = config(dir.path());
    cfg.execution.workers = 2;
    let runner = TestRunner::new(cfg, Arc::new(FakeLauncher::new(site)));

    let mut fast = case("Pos_Fun_0006", "api yanavaa", "අපි");
    fast.settle_ms = Some(10);
    let mut slow = case("Pos_Fun_0010", "mata bath tikak oonee.", "මට");
    slow.settle_ms = Some(4000);

    // Declaration indices survive filtering, so they are not contiguous
    let mut cases = schedule(vec![fast, slow]);
    cases[0].index = 5;
    cases[1].index = 9;

    let mut reporter = Timed {
        start: tokio::time::Instant::now(),
        seen: Vec::new(),
    };
    let suite = runner.run(&cases, &mut reporter).await.unwrap();

    assert_eq!(suite.passed, 2);
    let indices: Vec<usize> = reporter.seen.iter().map(|(index, _)| *index).collect();
    assert_eq!(indices, vec![5, 9]);
    assert!(reporter.seen[0].1 < std::time::Duration::from_millis(4000));
    assert!(reporter.seen[1].1 >= std::time::Duration::from_millis(4000));
}

#[tokio::test(start_paused = true)]
async fn stable_settle_waits_for_output_to_stop_changing() {
    let dir = tempfile::tempdir().unwrap();
    let mut site = FakeSite::new(PAIRS);
    site.render_delay = std::time::Duration::from_millis(200);

    let mut cfg = config(dir.path());
    cfg.timing.assertion_timeout_ms = 0;
    cfg.timing.settle = SettleStrategy::Stable {
        debounce_ms: 500,
        max_ms: 3000,
    };
    let runner = TestRunner::new(cfg, Arc::new(FakeLauncher::new(site)));

    let stable = case("Pos_Fun_0006", "api yanavaa", "අපි යනවා");
    let mut rushed = case("Pos_Fun_0007", "api yanavaa", "අපි යනවා");
    rushed.settle_ms = Some(100);

    let suite = runner.run(&schedule(vec![stable, rushed]), &mut NullReporter).await.unwrap();

    let cases = &suite.projects[0].cases;
    assert_eq!(cases[0].status, CaseStatus::Passed);
    // A fixed wait shorter than the render sees nothing and has no polling window
    assert_eq!(cases[1].status, CaseStatus::Failed);
    assert_eq!(cases[1].final_attempt().unwrap().log.actual.as_deref(), Some(""));
}

#[tokio::test(start_paused = true)]
async fn skipped_case_never_launches() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = FakeLauncher::new(FakeSite::new(PAIRS));
    let runner = TestRunner::new(config(dir.path()), Arc::new(launcher.clone()));

    let mut skipped = case("Pos_Fun_0008", "api yanavaa", "අපි");
    skipped.skip = true;
    let suite = runner.run(&schedule(vec![skipped]), &mut NullReporter).await.unwrap();

    assert_eq!(suite.skipped, 1);
    assert!(suite.success());
    assert!(suite.projects[0].cases[0].attempts.is_empty());
    assert_eq!(launcher.site.launches(), 0);
}

#[tokio::test(start_paused = true)]
async fn every_project_runs_every_case() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = FakeLauncher::new(FakeSite::new(PAIRS));
    let mut cfg = config(dir.path());
    cfg.browser.projects = vec![swiftcheck_e2e::Browser::Chromium, swiftcheck_e2e::Browser::Firefox];
    let runner = TestRunner::new(cfg, Arc::new(launcher.clone()));

    let cases = schedule(vec![
        case("Pos_Fun_0001", "mata bath tikak oonee.", "මට"),
        case("Pos_Fun_0002", "api yanavaa", "අපි"),
    ]);
    let suite = runner.run(&cases, &mut NullReporter).await.unwrap();

    assert_eq!(suite.total, 4);
    assert_eq!(suite.projects.len(), 2);
    assert_eq!(suite.projects[1].project, swiftcheck_e2e::Browser::Firefox);
    assert_eq!(launcher.site.launches(), 4);
}

#[tokio::test(start_paused = true)]
async fn reports_written_for_a_mixed_run() {
    let dir = tempfile::tempdir().unwrap();
    let runner = TestRunner::new(config(dir.path()), Arc::new(FakeLauncher::new(FakeSite::new(PAIRS))));

    let cases = schedule(vec![
        case("Pos_Fun_0001", "mata bath tikak oonee.", "මට බත්"),
        case("Neg_Fun_0001", "api yanavaa", "අපි ගියා"),
    ]);
    let suite = runner.run(&cases, &mut NullReporter).await.unwrap();

    let results = runner.write_results(&suite).unwrap();
    let parsed: TestSuiteResult = serde_json::from_str(&std::fs::read_to_string(results).unwrap()).unwrap();
    assert_eq!(parsed.passed, 1);
    assert_eq!(parsed.failed, 1);

    let html = report::write_html(dir.path(), &suite).unwrap();
    let html = std::fs::read_to_string(html).unwrap();
    assert!(html.contains("Neg_Fun_0001"));
    assert!(html.contains("screenshot"));

    let transcript = report::write_transcript(dir.path(), &suite).unwrap();
    let mut reader = csv::Reader::from_path(transcript).unwrap();
    assert_eq!(reader.records().count(), 2);
}
