//! swiftcheck verification harness
//!
//! This crate drives the Singlish-to-Sinhala translator at
//! swifttranslator.com through Playwright and checks its rendered output:
//! - Loads declarative YAML verification cases
//! - Launches one isolated browser context per attempt via a node driver
//! - Fills or types the input, waits for the page to settle, samples the output
//! - Asserts substring containment with a polling window
//! - Retries whole cases, runs browser projects, writes JSON/HTML/CSV reports
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Verification Runner (Rust)                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner                                                 │
//! │    ├── run(cases) -> TestSuiteResult     (per project)      │
//! │    ├── run_case(case) -> CaseResult      (retries)          │
//! │    └── attempt: launch -> goto -> Verifier -> artifacts     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Verifier                                                   │
//! │    ├── interact { fill | type | clear }                     │
//! │    ├── settle { fixed | stable }                            │
//! │    ├── sample output -> CaseLog                             │
//! │    └── expect_text(contains | empty)                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Page / BrowserLauncher traits                              │
//! │    └── PlaywrightLauncher: node driver, JSON lines on stdio │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod case;
pub mod config;
pub mod error;
pub mod logging;
pub mod page;
pub mod playwright;
pub mod probe;
pub mod report;
pub mod runner;
pub mod verify;

pub use case::{CaseFilter, CaseSuite, Expectation, Interaction, VerificationCase};
pub use config::HarnessConfig;
pub use error::{E2eError, E2eResult, FailureKind};
pub use page::{BrowserLauncher, LaunchOptions, Page};
pub use playwright::{Browser, PlaywrightConfig, PlaywrightLauncher};
pub use runner::{CaseResult, CaseStatus, Reporter, TestRunner, TestSuiteResult};
pub use verify::{CaseLog, Verifier};
