//! Rendered page client
//!
//! Category listings are built by client-side scripts, so their item links
//! only exist after a browser has run the page. A `RenderBackend` opens one
//! browser session per crawl run; the session renders pages until it is
//! dropped, which removes its profile directory.

use crate::config::{ClientConfig, SpeedSettings};
use crate::RenderError;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info};
use url::Url;

/// Port for fetching fully rendered HTML
#[async_trait]
pub trait RenderedPageClient: Send + Sync {
    /// Loads a page, lets its scripts run, and returns the resulting DOM
    ///
    /// # Arguments
    ///
    /// * `url` - Page to render
    /// * `speed` - Pacing of the active speed profile
    async fn render(&self, url: &Url, speed: &SpeedSettings) -> Result<String, RenderError>;
}

/// Factory for browser sessions
#[async_trait]
pub trait RenderBackend: Send + Sync {
    /// Starts a browser session
    ///
    /// Failing here is fatal for the run that asked for the session.
    async fn launch(&self) -> Result<Box<dyn RenderedPageClient>, RenderError>;
}

/// Flags that keep a headless browser from announcing itself
const STEALTH_ARGS: &[&str] = &[
    "--headless=new",
    "--disable-gpu",
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--disable-blink-features=AutomationControlled",
    "--disable-extensions",
    "--no-first-run",
    "--no-default-browser-check",
    "--window-size=1920,1080",
    "--hide-scrollbars",
    "--mute-audio",
];

/// Chromium-family browser driven in headless mode
#[derive(Debug, Clone)]
pub struct HeadlessChrome {
    browser_path: String,
    user_agent: String,
    language: String,
    render_timeout: Duration,
    render_budget_ms: u64,
}

impl HeadlessChrome {
    pub fn new(config: &ClientConfig) -> Self {
        let language = config
            .accept_language
            .split(',')
            .next()
            .unwrap_or("fi-FI")
            .trim()
            .to_string();

        Self {
            browser_path: config.browser_path.clone(),
            user_agent: config.user_agent.clone(),
            language,
            render_timeout: Duration::from_secs(config.render_timeout_secs),
            render_budget_ms: config.render_budget_ms,
        }
    }
}

#[async_trait]
impl RenderBackend for HeadlessChrome {
    async fn launch(&self) -> Result<Box<dyn RenderedPageClient>, RenderError> {
        let mut probe = Command::new(&self.browser_path);
        probe.arg("--version").stdin(Stdio::null()).kill_on_drop(true);

        let output = tokio::time::timeout(self.render_timeout, probe.output())
            .await
            .map_err(|_| RenderError::Launch(format!("{} did not respond", self.browser_path)))?
            .map_err(|e| RenderError::Launch(format!("{}: {}", self.browser_path, e)))?;

        if !output.status.success() {
            return Err(RenderError::Launch(format!(
                "{} exited with {}",
                self.browser_path, output.status
            )));
        }

        let profile_dir = tempfile::Builder::new()
            .prefix("shelfwatch-profile-")
            .tempdir()
            .map_err(|e| RenderError::Launch(format!("profile directory: {}", e)))?;

        info!(
            browser = %self.browser_path,
            version = %String::from_utf8_lossy(&output.stdout).trim(),
            "Browser session started"
        );

        Ok(Box::new(ChromeSession {
            browser: self.clone(),
            profile_dir,
        }))
    }
}

/// One browser session with its own throwaway profile
struct ChromeSession {
    browser: HeadlessChrome,
    profile_dir: TempDir,
}

impl ChromeSession {
    fn command(&self, url: &Url, speed: &SpeedSettings) -> Command {
        // Slower profiles let the page settle longer before the DOM is taken.
        let budget = self.browser.render_budget_ms + speed.min_delay.as_millis() as u64;

        let mut cmd = Command::new(&self.browser.browser_path);
        cmd.args(STEALTH_ARGS)
            .arg(format!("--user-agent={}", self.browser.user_agent))
            .arg(format!("--lang={}", self.browser.language))
            .arg(format!("--user-data-dir={}", self.profile_dir.path().display()))
            .arg(format!("--virtual-time-budget={}", budget))
            .arg("--dump-dom")
            .arg(url.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl RenderedPageClient for ChromeSession {
    async fn render(&self, url: &Url, speed: &SpeedSettings) -> Result<String, RenderError> {
        debug!(url = %url, "Rendering page");

        let mut cmd = self.command(url, speed);
        let output = tokio::time::timeout(self.browser.render_timeout, cmd.output())
            .await
            .map_err(|_| RenderError::Timeout {
                url: url.to_string(),
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = stderr
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .unwrap_or("browser exited with an error")
                .to_string();
            return Err(RenderError::PageLoad {
                url: url.to_string(),
                message,
            });
        }

        let html = String::from_utf8_lossy(&output.stdout).into_owned();
        if html.trim().is_empty() {
            return Err(RenderError::PageLoad {
                url: url.to_string(),
                message: "empty document".to_string(),
            });
        }

        Ok(html)
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        debug!(profile = %self.profile_dir.path().display(), "Browser session closed");
    }
}
