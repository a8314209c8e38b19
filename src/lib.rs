//! Shelfwatch: catalog price watcher
//!
//! This crate discovers catalog items on a vendor site by rendering its paginated
//! category listings, extracts price and availability from each item page, keeps an
//! append-only price history, and raises change events when a transition matches a
//! watch condition.

pub mod alert;
pub mod cancel;
pub mod client;
pub mod config;
pub mod crawler;
pub mod model;
pub mod monitor;
pub mod output;
pub mod parser;
pub mod storage;
pub mod url;
pub mod watcher;

use std::fmt;
use thiserror::Error;

/// Main error type for Shelfwatch operations
///
/// Only fatal setup problems surface through this type from a run. Per-item and
/// per-page failures are collected into the run summary instead.
#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Repository error: {0}")]
    Repository(#[from] storage::RepositoryError),

    #[error("Alert error: {0}")]
    Alert(#[from] alert::AlertError),

    #[error("Invalid item URL: {0}")]
    Url(#[from] UrlError),

    #[error("Unknown item: {0}")]
    UnknownItem(String),
}

/// Problems with the configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid setting: {0}")]
    Validation(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Network-level failures of the static page client
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

/// Failures of the headless browser session
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Render timeout for {url}")]
    Timeout { url: String },

    #[error("Page load failed for {url}: {message}")]
    PageLoad { url: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RenderError {
    /// Returns true if retrying the same page may succeed
    ///
    /// A browser that cannot be launched at all will not recover between attempts.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Launch(_))
    }
}

/// Stage of item parsing at which a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseStage {
    /// The page could not be downloaded
    Fetch,
    /// The page was downloaded but its structure was not recognized
    Extract,
}

impl fmt::Display for ParseStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch => write!(f, "fetch"),
            Self::Extract => write!(f, "extract"),
        }
    }
}

/// An item page that could not be turned into a record
#[derive(Debug, Clone, Error)]
#[error("{stage} failed for {url}: {message}")]
pub struct ParseError {
    pub url: String,
    pub stage: ParseStage,
    pub message: String,
}

impl ParseError {
    pub fn fetch(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            stage: ParseStage::Fetch,
            message: message.into(),
        }
    }

    pub fn extract(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            stage: ParseStage::Extract,
            message: message.into(),
        }
    }
}

/// Reasons a string cannot be turned into a canonical item URL
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("not a URL: {0}")]
    Parse(String),

    #[error("unsupported scheme '{0}'")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Shelfwatch operations
pub type Result<T> = std::result::Result<T, WatcherError>;

// Re-export commonly used types
pub use config::{Config, SpeedProfile};
pub use crawler::{CrawlOrchestrator, CrawlSummary, ListingCrawler, RunError, RunErrorKind};
pub use model::{ChangeEvent, ChangeKind, FormatTag, Item, ItemRecord, Price, PriceObservation};
pub use monitor::{MonitorScope, MonitorStrategy, MonitorSummary, PriceMonitor};
pub use parser::{parse_item_html, ItemParser};
pub use watcher::Watcher;
