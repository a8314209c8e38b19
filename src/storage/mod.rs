//! Storage module for persisting catalog data
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Item upserts and the append-only price series
//! - Watch list and exclusion bookkeeping
//! - Change event recording and delivery tracking
//! - Derived catalogue views (cheapest, deals, watch list, statistics)

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteRepository;
pub use traits::{Repository, RepositoryError, RepositoryResult};

use crate::WatcherError;
use std::path::Path;

/// Initializes or opens a repository database
///
/// Missing parent directories are created.
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteRepository)` - Successfully initialized repository
/// * `Err(WatcherError)` - Failed to initialize repository
pub fn open_repository(path: &Path) -> Result<SqliteRepository, WatcherError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(RepositoryError::from)?;
        }
    }
    Ok(SqliteRepository::open(path)?)
}
