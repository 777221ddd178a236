//! Scripted stand-in for the translator page

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use swiftcheck_e2e::case::ScheduledCase;
use swiftcheck_e2e::config::{DEFAULT_INPUT_SELECTOR, DEFAULT_OUTPUT_SELECTOR};
use swiftcheck_e2e::{Browser, BrowserLauncher, E2eError, E2eResult, HarnessConfig, LaunchOptions, Page, VerificationCase};

/// Operations a page received, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Goto(String),
    Fill(String),
    Press(String, u64),
    Clear,
    Screenshot(PathBuf),
    Close(Option<PathBuf>),
}

/// Behaviour shared by every page the launcher hands out
pub struct FakeSite {
    translations: HashMap<String, String>,
    /// Time between the last input change and the output catching up
    pub render_delay: Duration,
    /// Fail this many navigations before succeeding
    pub navigation_failures: AtomicUsize,
    pub missing_output: bool,
    pub hang_on_goto: bool,
    pub launches: AtomicUsize,
    pub traced_launches: AtomicUsize,
    ops: Mutex<Vec<(String, Op)>>,
}

impl FakeSite {
    pub fn new(pairs: &[(&str, &str)]) -> Self {
        Self {
            translations: pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            render_delay: Duration::from_millis(300),
            navigation_failures: AtomicUsize::new(0),
            missing_output: false,
            hang_on_goto: false,
            launches: AtomicUsize::new(0),
            traced_launches: AtomicUsize::new(0),
            ops: Mutex::new(Vec::new()),
        }
    }

    /// Unknown input is echoed back untranslated
    fn translate(&self, input: &str) -> String {
        if input.is_empty() {
            return String::new();
        }
        self.translations
            .get(input)
            .cloned()
            .unwrap_or_else(|| input.to_string())
    }

    fn record(&self, page: &str, op: Op) {
        self.ops.lock().unwrap().push((page.to_string(), op));
    }

    /// All recorded operations across pages
    pub fn ops(&self) -> Vec<Op> {
        self.ops.lock().unwrap().iter().map(|(_, op)| op.clone()).collect()
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
pub struct FakeLauncher {
    pub site: Arc<FakeSite>,
}

impl FakeLauncher {
    pub fn new(site: FakeSite) -> Self {
        Self { site: Arc::new(site) }
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self, project: Browser, options: LaunchOptions) -> E2eResult<Box<dyn Page>> {
        let n = self.site.launches.fetch_add(1, Ordering::SeqCst);
        if options.trace {
            self.site.traced_launches.fetch_add(1, Ordering::SeqCst);
        }
        Ok(Box::new(FakePage {
            name: format!("{}-{}", project, n),
            site: self.site.clone(),
            input: String::new(),
            rendered: String::new(),
            changed_at: Instant::now(),
        }))
    }
}

pub struct FakePage {
    name: String,
    site: Arc<FakeSite>,
    input: String,
    rendered: String,
    changed_at: Instant,
}

impl FakePage {
    fn require_input(&self, selector: &str) -> E2eResult<()> {
        if selector != DEFAULT_INPUT_SELECTOR {
            return Err(E2eError::ElementNotFound {
                selector: selector.to_string(),
                reason: "no such control".to_string(),
            });
        }
        Ok(())
    }

    fn set_input(&mut self, value: String) {
        self.input = value;
        self.changed_at = Instant::now();
    }
}

#[async_trait]
impl Page for FakePage {
    async fn goto(&mut self, url: &str) -> E2eResult<()> {
        self.site.record(&self.name, Op::Goto(url.to_string()));
        if self.site.hang_on_goto {
            std::future::pending::<()>().await;
        }

        let remaining = self.site.navigation_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.site.navigation_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(E2eError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_CONNECTION_RESET".to_string(),
            });
        }
        Ok(())
    }

    async fn fill(&mut self, selector: &str, value: &str) -> E2eResult<()> {
        self.require_input(selector)?;
        self.site.record(&self.name, Op::Fill(value.to_string()));
        self.set_input(value.to_string());
        Ok(())
    }

    async fn press_sequentially(&mut self, selector: &str, text: &str, delay_ms: u64) -> E2eResult<()> {
        self.require_input(selector)?;
        self.site.record(&self.name, Op::Press(text.to_string(), delay_ms));
        for ch in text.chars() {
            let mut next = self.input.clone();
            next.push(ch);
            self.set_input(next);
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
        Ok(())
    }

    async fn clear(&mut self, selector: &str) -> E2eResult<()> {
        self.require_input(selector)?;
        self.site.record(&self.name, Op::Clear);
        self.set_input(String::new());
        Ok(())
    }

    async fn inner_text(&mut self, selector: &str) -> E2eResult<String> {
        if self.site.missing_output || selector != DEFAULT_OUTPUT_SELECTOR {
            return Err(E2eError::ElementNotFound {
                selector: selector.to_string(),
                reason: "Timeout 10000ms exceeded".to_string(),
            });
        }
        if self.changed_at.elapsed() >= self.site.render_delay {
            self.rendered = self.site.translate(&self.input);
        }
        Ok(self.rendered.clone())
    }

    async fn screenshot(&mut self, path: &Path) -> E2eResult<()> {
        self.site.record(&self.name, Op::Screenshot(path.to_path_buf()));
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.rendered.as_bytes())?;
        Ok(())
    }

    async fn close(&mut self, trace_path: Option<&Path>) -> E2eResult<()> {
        self.site.record(&self.name, Op::Close(trace_path.map(Path::to_path_buf)));
        if let Some(path) = trace_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, b"trace")?;
        }
        Ok(())
    }
}

pub fn case(id: &str, input: &str, expected: &str) -> VerificationCase {
    VerificationCase {
        id: id.to_string(),
        title: String::new(),
        input: input.to_string(),
        expected: expected.to_string(),
        interaction: Default::default(),
        settle_ms: None,
        only: false,
        skip: false,
    }
}

pub fn schedule(cases: Vec<VerificationCase>) -> Vec<ScheduledCase> {
    cases
        .into_iter()
        .enumerate()
        .map(|(index, case)| ScheduledCase {
            index,
            group: "fake".to_string(),
            case,
        })
        .collect()
}

/// Defaults with output under `dir`
pub fn config(dir: &Path) -> HarnessConfig {
    HarnessConfig {
        output_dir: dir.to_path_buf(),
        ..Default::default()
    }
}
