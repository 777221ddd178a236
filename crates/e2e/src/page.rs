//! Browser seams used by the verification procedure
//!
//! The runner only talks to these traits. [`crate::playwright`] provides the
//! real implementation; tests substitute scripted pages.

use std::path::Path;

use async_trait::async_trait;

use crate::error::E2eResult;
use crate::playwright::Browser;

/// One isolated browser context with a single page
#[async_trait]
pub trait Page: Send {
    /// Navigate and require a 2xx response
    async fn goto(&mut self, url: &str) -> E2eResult<()>;

    /// Replace the control's contents in a single operation
    async fn fill(&mut self, selector: &str, value: &str) -> E2eResult<()>;

    /// Type `text` one key at a time with `delay_ms` between keys
    async fn press_sequentially(&mut self, selector: &str, text: &str, delay_ms: u64) -> E2eResult<()>;

    async fn clear(&mut self, selector: &str) -> E2eResult<()>;

    /// Rendered text of the first element matching `selector`
    async fn inner_text(&mut self, selector: &str) -> E2eResult<String>;

    async fn screenshot(&mut self, path: &Path) -> E2eResult<()>;

    /// Tear the context down, writing the trace to `trace_path` when tracing
    async fn close(&mut self, trace_path: Option<&Path>) -> E2eResult<()>;
}

/// Per-attempt launch settings
#[derive(Debug, Clone, Copy, Default)]
pub struct LaunchOptions {
    /// Record a Playwright trace for this attempt
    pub trace: bool,
}

/// Produces a fresh page for every attempt
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, project: Browser, options: LaunchOptions) -> E2eResult<Box<dyn Page>>;
}
