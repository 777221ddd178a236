//! The verify-and-log procedure
//!
//! Drive the input control, let the page settle, sample the output
//! container, record what was seen, then assert with a polling window.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::case::{Expectation, Interaction, VerificationCase};
use crate::config::{SettleStrategy, TargetConfig, TimingConfig};
use crate::error::{E2eError, E2eResult};
use crate::page::Page;

/// Separator closing every transcription block
pub const LOG_SEPARATOR: &str = "------------------------------------------------";

/// What one attempt saw, in the shape people copy into a spreadsheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseLog {
    pub case_id: String,
    pub interaction: Interaction,
    pub input: String,
    pub expectation: Expectation,
    /// Output sampled after the settle wait; `None` when the attempt never got that far
    pub actual: Option<String>,
}

impl CaseLog {
    pub fn new(case: &VerificationCase) -> Self {
        Self {
            case_id: case.id.clone(),
            interaction: case.interaction,
            input: case.input.clone(),
            expectation: case.expectation(),
            actual: None,
        }
    }
}

impl std::fmt::Display for CaseLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f)?;
        writeln!(f, "[{}]", self.case_id)?;

        match self.interaction {
            Interaction::Fill => writeln!(f, "Input: {}", self.input)?,
            Interaction::Type { .. } => writeln!(f, "Input: {} (typed sequentially)", self.input)?,
            Interaction::Clear => writeln!(f, "Input: [CLEARED]")?,
        }

        match &self.expectation {
            Expectation::Contains(snippet) => writeln!(f, "Expected (Contains): {}", snippet)?,
            Expectation::Empty => writeln!(f, "Expected: (empty)")?,
        }

        match (&self.actual, &self.expectation) {
            (None, _) => writeln!(f, "Actual Output: <not captured>")?,
            (Some(actual), Expectation::Empty) => {
                writeln!(f, "Actual Output: '{}' (Should be empty)", actual)?
            }
            (Some(actual), Expectation::Contains(_)) => writeln!(f, "Actual Output: {}", actual)?,
        }

        write!(f, "{}", LOG_SEPARATOR)
    }
}

/// Outcome of running the procedure once
#[derive(Debug)]
pub struct Verification {
    pub log: CaseLog,
    pub outcome: E2eResult<()>,
}

/// Resolved settle behaviour for one case
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlePlan {
    Fixed(Duration),
    Stable { debounce: Duration, max: Duration },
}

/// Runs verification cases against an already-navigated page
pub struct Verifier<'a> {
    target: &'a TargetConfig,
    timing: &'a TimingConfig,
}

impl<'a> Verifier<'a> {
    pub fn new(target: &'a TargetConfig, timing: &'a TimingConfig) -> Self {
        Self { target, timing }
    }

    /// Run one case, recording into `log` as it goes.
    ///
    /// The log is owned by the caller so whatever was sampled survives when
    /// the future is cancelled by a case timeout.
    pub async fn verify(&self, page: &mut dyn Page, case: &VerificationCase, log: &mut CaseLog) -> E2eResult<()> {
        self.interact(page, case).await?;
        self.settle(page, self.settle_plan(case)).await?;

        let actual = page.inner_text(&self.target.output_selector).await?;
        info!(
            case_id = %case.id,
            input = %case.input,
            expected = %log.expectation,
            actual = %actual,
            "Observed output"
        );
        log.actual = Some(actual);

        expect_text(
            page,
            &self.target.output_selector,
            &log.expectation,
            Duration::from_millis(self.timing.assertion_timeout_ms),
            Duration::from_millis(self.timing.poll_interval_ms),
        )
        .await
        .map(|_| ())
    }

    async fn interact(&self, page: &mut dyn Page, case: &VerificationCase) -> E2eResult<()> {
        let selector = &self.target.input_selector;
        match case.interaction {
            Interaction::Fill => page.fill(selector, &case.input).await,
            Interaction::Type { delay_ms } => {
                let delay = delay_ms.unwrap_or(self.timing.type_delay_ms);
                page.press_sequentially(selector, &case.input, delay).await
            }
            Interaction::Clear => {
                page.fill(selector, &case.input).await?;
                page.clear(selector).await
            }
        }
    }

    /// A per-case `settle_ms` always wins and is a fixed wait
    pub fn settle_plan(&self, case: &VerificationCase) -> SettlePlan {
        if let Some(ms) = case.settle_ms {
            return SettlePlan::Fixed(Duration::from_millis(ms));
        }

        match self.timing.settle {
            SettleStrategy::Fixed => {
                let ms = match case.interaction {
                    Interaction::Fill => self.timing.fill_settle_ms,
                    Interaction::Type { .. } | Interaction::Clear => self.timing.keystroke_settle_ms,
                };
                SettlePlan::Fixed(Duration::from_millis(ms))
            }
            SettleStrategy::Stable { debounce_ms, max_ms } => SettlePlan::Stable {
                debounce: Duration::from_millis(debounce_ms),
                max: Duration::from_millis(max_ms),
            },
        }
    }

    async fn settle(&self, page: &mut dyn Page, plan: SettlePlan) -> E2eResult<()> {
        match plan {
            SettlePlan::Fixed(duration) => {
                sleep(duration).await;
                Ok(())
            }
            SettlePlan::Stable { debounce, max } => {
                let poll = Duration::from_millis(self.timing.poll_interval_ms);
                let selector = &self.target.output_selector;
                let deadline = Instant::now() + max;

                let mut last = page.inner_text(selector).await?;
                let mut unchanged_since = Instant::now();

                loop {
                    let now = Instant::now();
                    if now.duration_since(unchanged_since) >= debounce {
                        debug!("Output stable for {:?}", debounce);
                        return Ok(());
                    }
                    if now >= deadline {
                        warn!("Output still changing after {:?}, sampling anyway", max);
                        return Ok(());
                    }

                    sleep(poll).await;

                    let current = page.inner_text(selector).await?;
                    if current != last {
                        last = current;
                        unchanged_since = Instant::now();
                    }
                }
            }
        }
    }
}

/// Poll `selector` until its text satisfies `expectation`.
///
/// Checks immediately, then every `poll` until `timeout` has elapsed.
/// Returns the matching text, or an assertion timeout carrying the last
/// observed value.
pub async fn expect_text(
    page: &mut dyn Page,
    selector: &str,
    expectation: &Expectation,
    timeout: Duration,
    poll: Duration,
) -> E2eResult<String> {
    let deadline = Instant::now() + timeout;

    loop {
        let actual = page.inner_text(selector).await?;
        if expectation.is_met(&actual) {
            return Ok(actual);
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(E2eError::AssertionTimeout {
                selector: selector.to_string(),
                expected: expectation.to_string(),
                actual,
                timeout_ms: timeout.as_millis() as u64,
            });
        }

        sleep(poll.min(deadline - now)).await;
    }
}
