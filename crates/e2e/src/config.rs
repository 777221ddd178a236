//! Harness configuration
//!
//! Values come from three layers, later ones winning: `swiftcheck.toml`,
//! the process environment (`CI`, `SWIFTCHECK_*`), then command-line flags
//! applied by the binary.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{E2eError, E2eResult};
use crate::playwright::Browser;

/// Address of the translator under test
pub const DEFAULT_BASE_URL: &str = "https://www.swifttranslator.com/";

/// Singlish input text area, matched by its placeholder
pub const DEFAULT_INPUT_SELECTOR: &str = r#"textarea[placeholder="Input Your Singlish Text Here."]"#;

/// Container the Sinhala rendering is written into
pub const DEFAULT_OUTPUT_SELECTOR: &str = "div.w-full.h-80.whitespace-pre-wrap";

/// Retry count forced when `CI` is set
pub const CI_RETRIES: u32 = 2;

/// Top-level harness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Directory holding the YAML case files
    pub cases_dir: PathBuf,

    /// Directory for reports and failure artifacts
    pub output_dir: PathBuf,

    /// Where the translator lives and how to find its controls
    pub target: TargetConfig,

    /// Browser launch settings
    pub browser: BrowserConfig,

    /// Waits and timeouts
    pub timing: TimingConfig,

    /// Retry and parallelism policy
    pub execution: ExecutionConfig,

    /// Failure artifacts and report outputs
    pub artifacts: ArtifactConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            cases_dir: PathBuf::from("tests/e2e/cases"),
            output_dir: PathBuf::from("test-results"),
            target: TargetConfig::default(),
            browser: BrowserConfig::default(),
            timing: TimingConfig::default(),
            execution: ExecutionConfig::default(),
            artifacts: ArtifactConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub base_url: String,
    pub input_selector: String,
    pub output_selector: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            input_selector: DEFAULT_INPUT_SELECTOR.to_string(),
            output_selector: DEFAULT_OUTPUT_SELECTOR.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Engine profiles; each one runs the whole case set
    pub projects: Vec<Browser>,

    /// Headed by default so the run can be watched
    pub headless: bool,

    pub viewport: Viewport,

    /// Node binary used to host the Playwright driver
    pub node_binary: PathBuf,

    /// Directory whose `node_modules` provides `playwright`
    pub node_project_dir: PathBuf,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            projects: vec![Browser::Chromium],
            headless: false,
            viewport: Viewport::default(),
            node_binary: PathBuf::from("node"),
            node_project_dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { width: 1280, height: 720 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Settle wait after a one-shot fill
    pub fill_settle_ms: u64,

    /// Settle wait after keystroke entry or a clear
    pub keystroke_settle_ms: u64,

    /// Delay between keystrokes for incremental input
    pub type_delay_ms: u64,

    /// Window of the auto-retrying text assertion
    pub assertion_timeout_ms: u64,

    /// Polling interval for the assertion and the stable settle strategy
    pub poll_interval_ms: u64,

    /// Playwright action timeout (locating, filling, reading)
    pub action_timeout_ms: u64,

    pub navigation_timeout_ms: u64,

    /// Overall budget for one attempt, navigation included
    pub case_timeout_ms: u64,

    pub settle: SettleStrategy,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            fill_settle_ms: 1500,
            keystroke_settle_ms: 1000,
            type_delay_ms: 50,
            assertion_timeout_ms: 5000,
            poll_interval_ms: 100,
            action_timeout_ms: 10_000,
            navigation_timeout_ms: 30_000,
            case_timeout_ms: 30_000,
            settle: SettleStrategy::Fixed,
        }
    }
}

/// How long to let the page re-render before sampling the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum SettleStrategy {
    /// Sleep for the interaction's fixed settle duration
    #[default]
    Fixed,

    /// Poll the output until it stops changing for `debounce_ms`, giving up after `max_ms`
    Stable { debounce_ms: u64, max_ms: u64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Concurrent attempts; 1 keeps console output in declaration order as it happens
    pub workers: usize,

    /// Re-executions of a failed case
    pub retries: u32,

    /// Treat `only: true` cases as an error
    pub forbid_only: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            retries: 0,
            forbid_only: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    pub screenshot: ScreenshotMode,
    pub trace: TraceMode,
    pub html_report: bool,
    pub transcript_csv: bool,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            screenshot: ScreenshotMode::OnlyOnFailure,
            trace: TraceMode::OnFirstRetry,
            html_report: true,
            transcript_csv: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScreenshotMode {
    Off,
    On,
    #[default]
    OnlyOnFailure,
}

impl ScreenshotMode {
    pub fn captures(&self, failed: bool) -> bool {
        match self {
            ScreenshotMode::Off => false,
            ScreenshotMode::On => true,
            ScreenshotMode::OnlyOnFailure => failed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TraceMode {
    Off,
    On,
    #[default]
    OnFirstRetry,
    RetainOnFailure,
}

impl TraceMode {
    /// Whether tracing runs during this attempt (0 is the first run)
    pub fn records(&self, attempt: u32) -> bool {
        match self {
            TraceMode::Off => false,
            TraceMode::On | TraceMode::RetainOnFailure => true,
            TraceMode::OnFirstRetry => attempt == 1,
        }
    }

    /// Whether a recorded trace is written out
    pub fn keeps(&self, attempt: u32, failed: bool) -> bool {
        match self {
            TraceMode::RetainOnFailure => failed,
            _ => self.records(attempt),
        }
    }
}

impl HarnessConfig {
    /// Load configuration from file; a missing file yields defaults
    pub fn load(path: &Path) -> E2eResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            debug!("Loaded configuration from {}", path.display());
            Ok(config)
        } else {
            debug!("No configuration at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Overlay the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Overlay environment values supplied by `lookup`
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if lookup("CI").is_some_and(|v| !v.is_empty() && v != "0" && v != "false") {
            self.execution.retries = CI_RETRIES;
            self.execution.forbid_only = true;
        }

        if let Some(url) = lookup("SWIFTCHECK_BASE_URL").filter(|v| !v.is_empty()) {
            self.target.base_url = url;
        }

        if let Some(headless) = lookup("SWIFTCHECK_HEADLESS") {
            self.browser.headless = matches!(headless.as_str(), "1" | "true" | "yes");
        }
    }

    /// Reject settings that cannot produce a meaningful run
    pub fn validate(&self) -> E2eResult<()> {
        let url = reqwest::Url::parse(&self.target.base_url)
            .map_err(|e| E2eError::InvalidConfig(format!("base_url {}: {}", self.target.base_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(E2eError::InvalidConfig(format!(
                "base_url must be http or https, got {}",
                url.scheme()
            )));
        }

        if self.target.input_selector.trim().is_empty() || self.target.output_selector.trim().is_empty() {
            return Err(E2eError::InvalidConfig("selectors must not be empty".to_string()));
        }

        if self.execution.workers == 0 {
            return Err(E2eError::InvalidConfig("workers must be at least 1".to_string()));
        }

        if self.browser.projects.is_empty() {
            return Err(E2eError::InvalidConfig("at least one browser project is required".to_string()));
        }

        if self.timing.case_timeout_ms == 0 {
            return Err(E2eError::InvalidConfig("case_timeout_ms must be positive".to_string()));
        }

        if self.timing.poll_interval_ms == 0 {
            return Err(E2eError::InvalidConfig("poll_interval_ms must be positive".to_string()));
        }

        if let SettleStrategy::Stable { debounce_ms, max_ms } = self.timing.settle {
            if debounce_ms == 0 || max_ms < debounce_ms {
                return Err(E2eError::InvalidConfig(
                    "stable settle needs 0 < debounce_ms <= max_ms".to_string(),
                ));
            }
        }

        Ok(())
    }
}
