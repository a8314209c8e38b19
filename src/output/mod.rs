//! Output module for run summaries and catalog reports
//!
//! This module handles:
//! - Formatting crawl and monitor summaries
//! - Formatting the derived catalog views
//! - Loading and displaying catalog statistics

mod report;
pub mod stats;
mod views;

pub use report::{format_crawl_summary, format_monitor_summary};
pub use stats::{format_statistics, load_statistics, print_statistics};
pub use views::{
    format_catalog, format_deals, format_events, format_history, format_item_record,
};
