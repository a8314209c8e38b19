//! Catalog statistics
//!
//! This module provides functionality for extracting and displaying
//! aggregate catalog statistics from the repository.

use crate::model::CatalogStats;
use crate::storage::Repository;
use crate::WatcherError;

/// Loads statistics from the repository
///
/// # Arguments
///
/// * `repository` - The repository to query
///
/// # Returns
///
/// * `Ok(CatalogStats)` - Successfully loaded statistics
/// * `Err(WatcherError)` - Failed to query statistics
pub fn load_statistics(repository: &dyn Repository) -> Result<CatalogStats, WatcherError> {
    Ok(repository.stats()?)
}

/// Formats statistics for display
pub fn format_statistics(stats: &CatalogStats) -> String {
    let mut out = String::new();
    out.push_str("=== Catalog Statistics ===\n\n");

    out.push_str("Overview:\n");
    out.push_str(&format!("  Items tracked: {}\n", stats.items));
    out.push_str(&format!("  Price observations: {}\n", stats.observations));
    out.push_str(&format!("  Watch list entries: {}\n", stats.watch_entries));
    out.push_str(&format!("  Excluded items: {}\n", stats.exclusions));
    out.push('\n');

    out.push_str("Alerts:\n");
    out.push_str(&format!("  Events today: {}\n", stats.events_today));
    out.push_str(&format!("  Pending delivery: {}\n", stats.pending_events));
    out.push('\n');

    match stats.last_update {
        Some(at) => out.push_str(&format!("Last update: {}\n", at.format("%Y-%m-%d %H:%M:%S UTC"))),
        None => out.push_str("Last update: never\n"),
    }

    let per_item = if stats.items > 0 {
        stats.observations as f64 / stats.items as f64
    } else {
        0.0
    };
    out.push_str(&format!("Observations per item: {:.1}\n", per_item));
    out
}

/// Prints statistics to stdout
pub fn print_statistics(stats: &CatalogStats) {
    print!("{}", format_statistics(stats));
}
