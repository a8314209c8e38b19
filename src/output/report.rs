//! Run summary formatting
//!
//! Turns crawl and monitor summaries into the plain-text reports the CLI
//! prints after each run.

use crate::crawler::{CrawlSummary, RunError};
use crate::monitor::MonitorSummary;

/// Number of run errors listed before the rest are summarized
const MAX_LISTED_ERRORS: usize = 20;

/// Formats a crawl summary
///
/// # Arguments
///
/// * `summary` - The crawl summary
/// * `config_hash` - Fingerprint of the configuration the run used
///
/// # Returns
///
/// A formatted multi-line report
pub fn format_crawl_summary(summary: &CrawlSummary, config_hash: &str) -> String {
    let mut out = String::new();

    out.push_str("=== Crawl Summary ===\n\n");
    if summary.cancelled {
        out.push_str("Run was cancelled before completion.\n\n");
    }
    out.push_str(&format!("  Listing pages:  {}\n", summary.pages));
    out.push_str(&format!("  Discovered:     {}\n", summary.discovered));
    out.push_str(&format!("  Duplicates:     {}\n", summary.duplicates));
    out.push_str(&format!("  Parsed:         {}\n", summary.parsed));
    out.push_str(&format!("  Persisted:      {}\n", summary.persisted));
    out.push_str(&format!("  Failed:         {}\n", summary.failed));
    out.push_str(&format!("  Config hash:    {}\n", short_hash(config_hash)));

    push_errors(&mut out, &summary.errors);
    out
}

/// Formats a monitor cycle summary
pub fn format_monitor_summary(summary: &MonitorSummary) -> String {
    let mut out = String::new();

    out.push_str("=== Monitor Cycle ===\n\n");
    if summary.cancelled {
        out.push_str("Cycle was cancelled before completion.\n\n");
    }
    out.push_str(&format!("  Checked:        {}\n", summary.checked));
    out.push_str(&format!("  Changed:        {}\n", summary.changed));
    let outcomes = &summary.outcomes;
    if summary.changed > 0 {
        out.push_str(&format!(
            "    dropped {}, raised {}, back in stock {}, sold out {}\n",
            outcomes.dropped, outcomes.raised, outcomes.became_available, outcomes.became_unavailable
        ));
    }
    out.push_str(&format!("  Failed:         {}\n", summary.failed));
    out.push_str(&format!("  New events:     {}\n", summary.events));
    if summary.redelivered > 0 {
        out.push_str(&format!("  Redelivered:    {}\n", summary.redelivered));
    }

    push_errors(&mut out, &summary.errors);
    out
}

fn push_errors(out: &mut String, errors: &[RunError]) {
    if errors.is_empty() {
        return;
    }

    out.push_str(&format!("\nErrors ({}):\n", errors.len()));
    for error in errors.iter().take(MAX_LISTED_ERRORS) {
        out.push_str(&format!("  - {}\n", error));
    }
    if errors.len() > MAX_LISTED_ERRORS {
        out.push_str(&format!(
            "  ... and {} more\n",
            errors.len() - MAX_LISTED_ERRORS
        ));
    }
}

fn short_hash(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}
