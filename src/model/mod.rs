//! Domain entities
//!
//! These are the values that flow between the crawler, the item parser, the
//! monitor and the repository:
//! - `ItemRecord`: what one successful parse of an item page produces
//! - `Item`: the persisted catalog entry, keyed by the vendor's external id
//! - `PriceObservation`: one point of an item's append-only price series
//! - `WatchEntry`: a user-declared interest in an item, with a target price
//! - `ChangeEvent`: a detected transition between two consecutive observations

mod format;
mod price;

pub use format::FormatTag;
pub use price::Price;

use chrono::{DateTime, Utc};
use std::fmt;

/// Normalized result of parsing one item page
#[derive(Debug, Clone, PartialEq)]
pub struct ItemRecord {
    pub external_id: String,
    pub title: String,
    pub format: FormatTag,
    /// Canonical item URL
    pub url: String,
    pub image_url: Option<String>,
    /// `None` means the page shows no price, which is treated as unavailable
    pub price: Option<Price>,
    /// Strikethrough price, when the page shows one
    pub original_price: Option<Price>,
    pub available: bool,
}

/// A catalog item as stored
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: i64,
    pub external_id: String,
    pub title: String,
    pub format: FormatTag,
    pub url: String,
    pub image_url: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// One stored price/availability observation
#[derive(Debug, Clone, PartialEq)]
pub struct PriceObservation {
    pub id: i64,
    pub item_id: i64,
    pub price: Option<Price>,
    pub available: bool,
    pub observed_at: DateTime<Utc>,
}

/// A watch-list entry for one item
#[derive(Debug, Clone, PartialEq)]
pub struct WatchEntry {
    pub item_id: i64,
    pub target_price: Option<Price>,
    /// When the current target was set; later than every observation recorded before it
    pub created_at: DateTime<Utc>,
}

/// Predicate that produced a change event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    PriceDrop,
    TargetReached,
    BackInStock,
}

impl ChangeKind {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::PriceDrop => "price_drop",
            Self::TargetReached => "target_reached",
            Self::BackInStock => "back_in_stock",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "price_drop" => Some(Self::PriceDrop),
            "target_reached" => Some(Self::TargetReached),
            "back_in_stock" => Some(Self::BackInStock),
            _ => None,
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// A change event about to be recorded
///
/// The pair `(observation_id, kind)` identifies the event; recording the same
/// pair twice yields a single stored event.
#[derive(Debug, Clone, PartialEq)]
pub struct NewChangeEvent {
    pub item_id: i64,
    pub kind: ChangeKind,
    pub old_price: Option<Price>,
    pub new_price: Option<Price>,
    pub previous_observation_id: Option<i64>,
    pub observation_id: i64,
}

/// A stored change event
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub id: i64,
    pub item_id: i64,
    pub kind: ChangeKind,
    pub old_price: Option<Price>,
    pub new_price: Option<Price>,
    pub previous_observation_id: Option<i64>,
    pub observation_id: i64,
    pub created_at: DateTime<Utc>,
    pub delivered: bool,
}

/// A candidate item reference found on a listing page
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemRef {
    pub url: String,
    /// Vendor id recovered from the link, when the link carries one
    pub external_id: Option<String>,
}

/// An item selected for monitoring, with its watch entry if any
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoredItem {
    pub item: Item,
    pub watch: Option<WatchEntry>,
}

/// Catalog row with its current price and price range
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub item: Item,
    pub current_price: Option<Price>,
    pub lowest_price: Option<Price>,
    pub highest_price: Option<Price>,
    pub target_price: Option<Price>,
}

/// An item whose latest price is below the previous one
#[derive(Debug, Clone, PartialEq)]
pub struct Deal {
    pub item: Item,
    pub previous_price: Price,
    pub current_price: Price,
}

impl Deal {
    pub fn saving(&self) -> Price {
        Price::from_cents(
            self.previous_price
                .cents()
                .saturating_sub(self.current_price.cents()),
        )
    }
}

/// Aggregate counts over the stored catalog
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogStats {
    pub items: u64,
    pub observations: u64,
    pub watch_entries: u64,
    pub exclusions: u64,
    pub events_today: u64,
    pub pending_events: u64,
    pub last_update: Option<DateTime<Utc>>,
}
