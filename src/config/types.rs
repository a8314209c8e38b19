use crate::config::profile::{ProfileOverride, SpeedProfile, SpeedSettings};
use crate::monitor::MonitorScope;
use crate::ConfigError;
use serde::Deserialize;
use url::Url;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Main configuration structure for Shelfwatch
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub profiles: ProfilesConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub categories: Vec<CategoryEntry>,
}

impl Config {
    /// Resolves a speed profile against the `[profiles.*]` overrides
    pub fn speed_settings(&self, profile: SpeedProfile) -> SpeedSettings {
        let base = profile.default_settings();
        let over = match profile {
            SpeedProfile::Fast => self.profiles.fast.as_ref(),
            SpeedProfile::Moderate => self.profiles.moderate.as_ref(),
            SpeedProfile::Slow => self.profiles.slow.as_ref(),
        };
        over.map(|o| o.apply(base)).unwrap_or(base)
    }
}

/// Vendor site layout
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SiteConfig {
    /// Site root that relative category and item URLs are resolved against
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path fragment that identifies item links on listing pages
    #[serde(default = "default_item_path")]
    pub item_path: String,

    /// Query parameter selecting a listing page
    #[serde(default = "default_page_param")]
    pub page_param: String,
}

impl SiteConfig {
    /// Resolves an absolute or site-relative URL against `base-url`
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidUrl` when the base or the reference does not parse,
    /// `ConfigError::Validation` when the result is not http or https.
    pub fn resolve(&self, reference: &str) -> Result<Url, ConfigError> {
        let base = Url::parse(&self.base_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("base-url '{}': {}", self.base_url, e)))?;
        let url = base
            .join(reference.trim())
            .map_err(|e| ConfigError::InvalidUrl(format!("'{}': {}", reference, e)))?;

        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(ConfigError::Validation(format!(
                "'{}' must use http or https",
                reference
            )));
        }
        Ok(url)
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            item_path: default_item_path(),
            page_param: default_page_param(),
        }
    }
}

/// Fetch client configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClientConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_accept_language")]
    pub accept_language: String,

    /// Timeout of a single static page request (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Timeout of a single rendered page load (seconds)
    #[serde(default = "default_render_timeout")]
    pub render_timeout_secs: u64,

    /// Headless browser executable
    #[serde(default = "default_browser_path")]
    pub browser_path: String,

    /// Virtual time the browser grants page scripts before dumping the DOM (milliseconds)
    #[serde(default = "default_render_budget")]
    pub render_budget_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            accept_language: default_accept_language(),
            request_timeout_secs: default_request_timeout(),
            render_timeout_secs: default_render_timeout(),
            browser_path: default_browser_path(),
            render_budget_ms: default_render_budget(),
        }
    }
}

/// Listing crawl configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Listing pages walked per category
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    #[serde(default)]
    pub speed_profile: SpeedProfile,

    /// Retries of a failed listing page before the category is abandoned
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First backoff delay; doubled on every further retry (milliseconds)
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,

    /// Consecutive listing pages without item links that end a category
    #[serde(default = "default_max_empty_pages")]
    pub max_empty_pages: u32,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            speed_profile: SpeedProfile::default(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base(),
            max_empty_pages: default_max_empty_pages(),
        }
    }
}

/// Optional overrides of the built-in speed profiles
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfilesConfig {
    pub fast: Option<ProfileOverride>,
    pub moderate: Option<ProfileOverride>,
    pub slow: Option<ProfileOverride>,
}

/// Price monitor configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MonitorConfig {
    #[serde(default)]
    pub scope: MonitorScope,

    /// Whether excluded items are still re-checked
    #[serde(default)]
    pub include_excluded: bool,

    #[serde(default = "default_monitor_profile")]
    pub speed_profile: SpeedProfile,

    /// Pause between cycles of a repeating monitor (minutes)
    #[serde(default = "default_interval")]
    pub interval_minutes: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            scope: MonitorScope::default(),
            include_excluded: false,
            speed_profile: default_monitor_profile(),
            interval_minutes: default_interval(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StorageConfig {
    /// Path to the SQLite database file
    pub database_path: String,
}

/// Category listing root
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryEntry {
    pub name: String,
    pub url: String,
}

fn default_base_url() -> String {
    "https://cdon.fi".to_string()
}

fn default_item_path() -> String {
    "/tuote/".to_string()
}

fn default_page_param() -> String {
    "page".to_string()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_accept_language() -> String {
    "fi-FI,fi;q=0.8,en;q=0.6".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_render_timeout() -> u64 {
    45
}

fn default_browser_path() -> String {
    "chromium".to_string()
}

fn default_render_budget() -> u64 {
    8_000
}

fn default_max_pages() -> u32 {
    5
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base() -> u64 {
    2_000
}

fn default_max_empty_pages() -> u32 {
    3
}

fn default_monitor_profile() -> SpeedProfile {
    SpeedProfile::Slow
}

fn default_interval() -> u64 {
    360
}
