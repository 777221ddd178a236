//! Error types for the verification harness

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Playwright not found. Install with: npm install playwright && npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Case file parse error: {0}")]
    CaseParse(String),

    #[error("Duplicate case id '{id}' (declared in {first} and {second})")]
    DuplicateCaseId {
        id: String,
        first: String,
        second: String,
    },

    #[error("Focused case '{0}' found while forbid_only is set")]
    ForbiddenOnly(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Element not found: {selector} ({reason})")]
    ElementNotFound { selector: String, reason: String },

    #[error("Timed out after {timeout_ms} ms waiting for {selector} {expected}; last observed {actual:?}")]
    AssertionTimeout {
        selector: String,
        expected: String,
        actual: String,
        timeout_ms: u64,
    },

    #[error("Case {case_id} exceeded its {timeout_ms} ms timeout")]
    CaseTimeout { case_id: String, timeout_ms: u64 },

    #[error("Target unreachable after {0} attempts")]
    TargetUnreachable(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl E2eError {
    /// Classify this error for reports
    pub fn kind(&self) -> FailureKind {
        match self {
            E2eError::Navigation { .. } => FailureKind::Navigation,
            E2eError::ElementNotFound { .. } => FailureKind::ElementNotFound,
            E2eError::AssertionTimeout { .. } => FailureKind::AssertionTimeout,
            E2eError::CaseTimeout { .. } => FailureKind::CaseTimeout,
            _ => FailureKind::Harness,
        }
    }
}

/// Why an attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Navigation,
    ElementNotFound,
    AssertionTimeout,
    CaseTimeout,
    /// Browser launch, driver crash, artifact IO
    Harness,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Navigation => "navigation",
            FailureKind::ElementNotFound => "element_not_found",
            FailureKind::AssertionTimeout => "assertion_timeout",
            FailureKind::CaseTimeout => "case_timeout",
            FailureKind::Harness => "harness",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
