//! Repository trait and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::model::{
    CatalogEntry, CatalogStats, ChangeEvent, Deal, FormatTag, Item, ItemRecord, MonitoredItem,
    NewChangeEvent, Price, PriceObservation, WatchEntry,
};
use crate::monitor::MonitorStrategy;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during repository operations
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Change event not found: {0}")]
    EventNotFound(i64),

    #[error("Invalid timestamp in database: {0}")]
    Timestamp(String),

    #[error("Database connection lock poisoned")]
    Poisoned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Trait for storage backend implementations
///
/// All methods take `&self` so one repository can be shared between a crawl
/// run, a monitor cycle and the CLI views. Implementations serialize access to
/// the underlying store themselves.
pub trait Repository: Send + Sync {
    // ===== Items =====

    /// Looks up an item by the vendor's id
    fn find_item_by_external_id(&self, external_id: &str) -> RepositoryResult<Option<Item>>;

    /// Gets an item by its row id
    fn get_item(&self, item_id: i64) -> RepositoryResult<Item>;

    /// Inserts a new item or refreshes an existing one
    ///
    /// Title, format, URL and image are overwritten from the record; the
    /// first-seen timestamp of an existing item is preserved.
    ///
    /// # Arguments
    ///
    /// * `record` - A freshly parsed item record
    ///
    /// # Returns
    ///
    /// The stored item after the write
    fn upsert_item(&self, record: &ItemRecord) -> RepositoryResult<Item>;

    // ===== Price Observations =====

    /// Appends one observation to an item's price series
    ///
    /// Observations are strictly ordered per item. An `observed_at` that is
    /// not later than the item's latest observation is moved to one
    /// microsecond after it.
    ///
    /// # Arguments
    ///
    /// * `item_id` - The item the observation belongs to
    /// * `price` - Observed price, `None` when no price was shown
    /// * `available` - Whether the item could be ordered
    /// * `observed_at` - When the page was read
    fn append_price_observation(
        &self,
        item_id: i64,
        price: Option<Price>,
        available: bool,
        observed_at: DateTime<Utc>,
    ) -> RepositoryResult<PriceObservation>;

    /// Gets the most recent observation of an item
    fn latest_observation(&self, item_id: i64) -> RepositoryResult<Option<PriceObservation>>;

    /// Gets the full price series of an item, oldest first
    fn price_history(&self, item_id: i64) -> RepositoryResult<Vec<PriceObservation>>;

    // ===== Monitoring =====

    /// Lists the items a monitor cycle should check
    fn list_monitored_items(&self, strategy: &MonitorStrategy)
        -> RepositoryResult<Vec<MonitoredItem>>;

    /// Gets the watch entry of an item, if it is watched
    fn watch_entry(&self, item_id: i64) -> RepositoryResult<Option<WatchEntry>>;

    /// Creates or updates the watch entry of an item
    fn set_watch(&self, item_id: i64, target_price: Option<Price>) -> RepositoryResult<WatchEntry>;

    /// Removes the watch entry of an item
    ///
    /// Returns true if an entry was removed
    fn remove_watch(&self, item_id: i64) -> RepositoryResult<bool>;

    // ===== Exclusions =====

    /// Checks whether an item is hidden from the cheapest views
    fn is_excluded(&self, item_id: i64) -> RepositoryResult<bool>;

    /// Hides an item from the cheapest views
    ///
    /// Returns true if the item was not excluded before
    fn exclude(&self, item_id: i64) -> RepositoryResult<bool>;

    /// Lifts an exclusion
    ///
    /// Returns true if an exclusion was removed
    fn include(&self, item_id: i64) -> RepositoryResult<bool>;

    // ===== Change Events =====

    /// Records a change event
    ///
    /// Returns `None` when an event with the same observation and kind is
    /// already stored.
    fn record_change_event(&self, event: &NewChangeEvent)
        -> RepositoryResult<Option<ChangeEvent>>;

    /// Flips the delivered flag of an event
    fn mark_event_delivered(&self, event_id: i64) -> RepositoryResult<()>;

    /// Gets events that have not been delivered yet, oldest first
    fn pending_events(&self) -> RepositoryResult<Vec<ChangeEvent>>;

    // ===== Derived Views =====

    /// Gets the cheapest priced items
    ///
    /// Excluded and watched items are left out.
    fn cheapest(&self, format: Option<FormatTag>, limit: usize)
        -> RepositoryResult<Vec<CatalogEntry>>;

    /// Gets items whose latest price is below the previous one, largest saving first
    fn deals(&self, limit: usize) -> RepositoryResult<Vec<Deal>>;

    /// Gets watched items with their current and historical prices
    fn watchlist(&self) -> RepositoryResult<Vec<CatalogEntry>>;

    /// Gets aggregate counts over the catalog
    fn stats(&self) -> RepositoryResult<CatalogStats>;
}
