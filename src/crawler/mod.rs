//! Crawler module for catalog discovery
//!
//! This module contains the discovery side of the pipeline, including:
//! - Request pacing by speed profile
//! - Paginated listing walks through the browser session
//! - Run summaries with per-page and per-item errors
//! - Overall discovery run coordination

mod coordinator;
mod listing;
mod summary;
mod throttle;

pub use coordinator::CrawlOrchestrator;
pub use listing::{ListingCrawler, ListingOptions};
pub use summary::{CrawlSummary, RunError, RunErrorKind};
pub use throttle::{Throttle, ThrottlePermit};
