//! Run summaries
//!
//! Per-page and per-item failures never abort a run. They are collected here
//! as `RunError` values and reported alongside the counters.

use crate::storage::RepositoryError;
use crate::{ParseError, ParseStage, RenderError};
use std::fmt;

/// Where in a run a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunErrorKind {
    /// A listing page could not be rendered after all retries
    Listing,
    /// An item page could not be downloaded
    Fetch,
    /// An item page was downloaded but not recognized
    Extract,
    /// A repository write or read failed for one item
    Repository,
    /// The alert sink rejected an event
    Alert,
}

impl RunErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Listing => "listing",
            Self::Fetch => "fetch",
            Self::Extract => "extract",
            Self::Repository => "repository",
            Self::Alert => "alert",
        }
    }
}

impl fmt::Display for RunErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One skipped page or item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunError {
    pub url: String,
    pub kind: RunErrorKind,
    pub message: String,
}

impl RunError {
    pub fn new(url: impl Into<String>, kind: RunErrorKind, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind,
            message: message.into(),
        }
    }

    pub fn listing(url: impl Into<String>, error: &RenderError) -> Self {
        Self::new(url, RunErrorKind::Listing, error.to_string())
    }

    pub fn repository(url: impl Into<String>, error: &RepositoryError) -> Self {
        Self::new(url, RunErrorKind::Repository, error.to_string())
    }
}

impl From<ParseError> for RunError {
    fn from(error: ParseError) -> Self {
        let kind = match error.stage {
            ParseStage::Fetch => RunErrorKind::Fetch,
            ParseStage::Extract => RunErrorKind::Extract,
        };
        Self {
            url: error.url,
            kind,
            message: error.message,
        }
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.url, self.message)
    }
}

/// Outcome of one discovery run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    /// References yielded by the listing crawlers
    pub discovered: usize,
    /// References skipped because their item was already visited in this run
    pub duplicates: usize,
    /// Item pages parsed successfully
    pub parsed: usize,
    /// Items upserted together with a fresh observation
    pub persisted: usize,
    /// Items skipped after a parse or repository failure
    pub failed: usize,
    /// Listing pages rendered across all categories
    pub pages: usize,
    pub errors: Vec<RunError>,
    /// True when the run stopped on its cancellation token
    pub cancelled: bool,
}
