//! Playwright browser automation
//!
//! Each attempt spawns `node` on a generated driver script. The script
//! launches the browser, then executes one JSON command per stdin line and
//! answers with one JSON reply per stdout line:
//!
//! ```text
//! -> {"id":3,"op":"fill","selector":"textarea...","value":"mata"}
//! <- {"id":3,"ok":true,"value":null}
//! <- {"id":4,"ok":false,"kind":"element_not_found","message":"..."}
//! ```
//!
//! Reply `0` is the launch handshake.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tracing::{debug, warn};

use crate::config::{HarnessConfig, Viewport};
use crate::error::{E2eError, E2eResult};
use crate::page::{BrowserLauncher, LaunchOptions, Page};

/// Grace period for the driver to exit after `close`
const CLOSE_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl std::fmt::Display for Browser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Browser {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" | "safari" => Ok(Browser::Webkit),
            other => Err(E2eError::InvalidConfig(format!("unknown browser: {}", other))),
        }
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub node_binary: PathBuf,
    pub node_project_dir: PathBuf,
    pub viewport: Viewport,
    pub headless: bool,
    pub action_timeout_ms: u64,
    pub navigation_timeout_ms: u64,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self::from_harness(&HarnessConfig::default())
    }
}

impl PlaywrightConfig {
    pub fn from_harness(config: &HarnessConfig) -> Self {
        Self {
            node_binary: config.browser.node_binary.clone(),
            node_project_dir: config.browser.node_project_dir.clone(),
            viewport: config.browser.viewport,
            headless: config.browser.headless,
            action_timeout_ms: config.timing.action_timeout_ms,
            navigation_timeout_ms: config.timing.navigation_timeout_ms,
        }
    }
}

/// Launch options embedded at the top of the driver script
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DriverOptions {
    browser: Browser,
    headless: bool,
    viewport: Viewport,
    trace: bool,
    action_timeout_ms: u64,
    navigation_timeout_ms: u64,
}

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum DriverOp<'a> {
    Goto { url: &'a str },
    Fill { selector: &'a str, value: &'a str },
    PressSequentially { selector: &'a str, text: &'a str, delay_ms: u64 },
    Clear { selector: &'a str },
    InnerText { selector: &'a str },
    Screenshot { path: &'a Path },
    Close { trace_path: Option<&'a Path> },
}

impl DriverOp<'_> {
    fn selector(&self) -> Option<&str> {
        match self {
            DriverOp::Fill { selector, .. }
            | DriverOp::PressSequentially { selector, .. }
            | DriverOp::Clear { selector }
            | DriverOp::InnerText { selector } => Some(*selector),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
struct DriverRequest<'a> {
    id: u64,
    #[serde(flatten)]
    op: &'a DriverOp<'a>,
}

#[derive(Debug, Deserialize)]
struct DriverResponse {
    id: u64,
    ok: bool,
    #[serde(default)]
    value: serde_json::Value,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl DriverResponse {
    fn into_result(self, op: &DriverOp<'_>) -> E2eResult<serde_json::Value> {
        if self.ok {
            return Ok(self.value);
        }

        let message = self.message.unwrap_or_else(|| "driver reported a failure".to_string());
        // Playwright messages carry a multi-line call log after the first line
        let reason = message.lines().next().unwrap_or_default().to_string();

        Err(match (self.kind.as_deref(), op) {
            (Some("navigation"), DriverOp::Goto { url }) => E2eError::Navigation {
                url: url.to_string(),
                reason,
            },
            (Some("element_not_found"), op) if op.selector().is_some() => E2eError::ElementNotFound {
                selector: op.selector().unwrap_or_default().to_string(),
                reason,
            },
            _ => E2eError::Playwright(message),
        })
    }
}

/// Launches Playwright-backed pages through node
pub struct PlaywrightLauncher {
    config: PlaywrightConfig,
}

impl PlaywrightLauncher {
    /// Create a new launcher, failing fast when Playwright is missing
    pub fn new(config: PlaywrightConfig) -> E2eResult<Self> {
        Self::check_playwright_installed(&config.node_project_dir)?;
        Ok(Self { config })
    }

    /// Check if Playwright is installed
    fn check_playwright_installed(project_dir: &Path) -> E2eResult<()> {
        let output = Command::new("npx")
            .args(["--no-install", "playwright", "--version"])
            .current_dir(project_dir)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match output {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }

    /// Build the driver script for one attempt
    pub fn build_script(&self, project: Browser, trace: bool) -> E2eResult<String> {
        let options = DriverOptions {
            browser: project,
            headless: self.config.headless,
            viewport: self.config.viewport,
            trace,
            action_timeout_ms: self.config.action_timeout_ms,
            navigation_timeout_ms: self.config.navigation_timeout_ms,
        };

        let mut script = format!(
            "'use strict';\nconst options = {};\n",
            serde_json::to_string(&options)?
        );
        script.push_str(DRIVER_BODY);
        Ok(script)
    }
}

#[async_trait]
impl BrowserLauncher for PlaywrightLauncher {
    async fn launch(&self, project: Browser, options: LaunchOptions) -> E2eResult<Box<dyn Page>> {
        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("driver.js");
        std::fs::write(&script_path, self.build_script(project, options.trace)?)?;

        debug!("Launching {} driver: {}", project, script_path.display());

        let mut child = TokioCommand::new(&self.config.node_binary)
            .arg(&script_path)
            .current_dir(&self.config.node_project_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                E2eError::Playwright(format!(
                    "Failed to spawn {}: {}",
                    self.config.node_binary.display(),
                    e
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Playwright("driver stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Playwright("driver stdout unavailable".to_string()))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "swiftcheck::driver", "{}", line);
                }
            });
        }

        let mut page = PlaywrightPage {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            next_id: 0,
            closed: false,
            _script_dir: script_dir,
        };

        let handshake = page.read_reply(0).await?;
        if !handshake.ok {
            page.terminate().await;
            return Err(E2eError::Playwright(format!(
                "{} failed to launch: {}",
                project,
                handshake.message.unwrap_or_default()
            )));
        }

        Ok(Box::new(page))
    }
}

/// A page hosted by one node driver process
pub struct PlaywrightPage {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
    closed: bool,
    _script_dir: tempfile::TempDir,
}

impl PlaywrightPage {
    async fn call(&mut self, op: DriverOp<'_>) -> E2eResult<serde_json::Value> {
        self.next_id += 1;
        let id = self.next_id;

        let mut line = serde_json::to_string(&DriverRequest { id, op: &op })?;
        line.push('\n');
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;

        self.read_reply(id).await?.into_result(&op)
    }

    async fn read_reply(&mut self, id: u64) -> E2eResult<DriverResponse> {
        loop {
            let line = self
                .stdout
                .next_line()
                .await?
                .ok_or_else(|| E2eError::Playwright("driver exited before replying".to_string()))?;

            match serde_json::from_str::<DriverResponse>(&line) {
                Ok(reply) if reply.id == id => return Ok(reply),
                Ok(reply) => warn!("Discarding stale driver reply {}", reply.id),
                Err(_) => debug!(target: "swiftcheck::driver", "{}", line),
            }
        }
    }

    /// SIGTERM, then kill if the driver does not go away
    async fn terminate(&mut self) {
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = self.child.id() {
                if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok()
                    && tokio::time::timeout(Duration::from_millis(500), self.child.wait())
                        .await
                        .is_ok()
                {
                    return;
                }
            }
        }

        let _ = self.child.kill().await;
    }
}

#[async_trait]
impl Page for PlaywrightPage {
    async fn goto(&mut self, url: &str) -> E2eResult<()> {
        self.call(DriverOp::Goto { url }).await.map(|_| ())
    }

    async fn fill(&mut self, selector: &str, value: &str) -> E2eResult<()> {
        self.call(DriverOp::Fill { selector, value }).await.map(|_| ())
    }

    async fn press_sequentially(&mut self, selector: &str, text: &str, delay_ms: u64) -> E2eResult<()> {
        self.call(DriverOp::PressSequentially { selector, text, delay_ms })
            .await
            .map(|_| ())
    }

    async fn clear(&mut self, selector: &str) -> E2eResult<()> {
        self.call(DriverOp::Clear { selector }).await.map(|_| ())
    }

    async fn inner_text(&mut self, selector: &str) -> E2eResult<String> {
        match self.call(DriverOp::InnerText { selector }).await? {
            serde_json::Value::String(text) => Ok(text),
            serde_json::Value::Null => Ok(String::new()),
            other => Err(E2eError::Playwright(format!("unexpected innerText reply: {}", other))),
        }
    }

    async fn screenshot(&mut self, path: &Path) -> E2eResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.call(DriverOp::Screenshot { path }).await.map(|_| ())
    }

    async fn close(&mut self, trace_path: Option<&Path>) -> E2eResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if let Some(parent) = trace_path.and_then(Path::parent) {
            std::fs::create_dir_all(parent)?;
        }

        let result = self.call(DriverOp::Close { trace_path }).await;

        match tokio::time::timeout(CLOSE_GRACE, self.child.wait()).await {
            Ok(status) => {
                status?;
            }
            Err(_) => {
                warn!("Driver did not exit within {:?}, terminating", CLOSE_GRACE);
                self.terminate().await;
            }
        }

        result.map(|_| ())
    }
}

/// Command loop run by node; `options` is defined by the generated header
const DRIVER_BODY: &str = r#"
const readline = require('readline');
const pw = require(require.resolve('playwright', { paths: [process.cwd()] }));

function reply(msg) {
  process.stdout.write(JSON.stringify(msg) + '\n');
}

// Only locator timeouts mean the element never showed up
const LOCATOR_OPS = new Set(['fill', 'press_sequentially', 'clear', 'inner_text']);

function failure(id, err, op) {
  const kind = err && err.kind ? err.kind
    : (err && err.name === 'TimeoutError' && LOCATOR_OPS.has(op) ? 'element_not_found' : 'driver');
  return { id, ok: false, kind, message: String((err && err.message) || err) };
}

(async () => {
  let browser, context, page;
  try {
    browser = await pw[options.browser].launch({ headless: options.headless });
    context = await browser.newContext({ viewport: options.viewport });
    if (options.trace) {
      await context.tracing.start({ screenshots: true, snapshots: true, sources: false });
    }
    page = await context.newPage();
    page.setDefaultTimeout(options.actionTimeoutMs);
    page.setDefaultNavigationTimeout(options.navigationTimeoutMs);
  } catch (err) {
    reply(Object.assign(failure(0, err), { kind: 'launch' }));
    process.exit(1);
  }
  reply({ id: 0, ok: true });

  async function execute(cmd) {
    switch (cmd.op) {
      case 'goto': {
        let response;
        try {
          response = await page.goto(cmd.url);
        } catch (err) {
          err.kind = 'navigation';
          throw err;
        }
        if (!response || !response.ok()) {
          const err = new Error(response ? `HTTP ${response.status()}` : 'no response');
          err.kind = 'navigation';
          throw err;
        }
        return response.status();
      }
      case 'fill':
        await page.locator(cmd.selector).fill(cmd.value);
        return null;
      case 'press_sequentially':
        await page.locator(cmd.selector).pressSequentially(cmd.text, { delay: cmd.delay_ms });
        return null;
      case 'clear':
        await page.locator(cmd.selector).clear();
        return null;
      case 'inner_text':
        return await page.locator(cmd.selector).innerText();
      case 'screenshot':
        await page.screenshot({ path: cmd.path, fullPage: true });
        return cmd.path;
      case 'close':
        if (options.trace && cmd.trace_path) {
          await context.tracing.stop({ path: cmd.trace_path });
        }
        return null;
      default:
        throw new Error(`unknown op ${cmd.op}`);
    }
  }

  const rl = readline.createInterface({ input: process.stdin });
  for await (const line of rl) {
    if (!line.trim()) continue;
    const cmd = JSON.parse(line);
    try {
      reply({ id: cmd.id, ok: true, value: await execute(cmd) });
    } catch (err) {
      reply(failure(cmd.id, err, cmd.op));
    }
    if (cmd.op === 'close') break;
  }

  await browser.close().catch(() => {});
  process.exit(0);
})();
"#;
