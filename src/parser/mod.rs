//! Item page parsing
//!
//! This module handles turning vendor pages into normalized data:
//! - `parse_item_html`: pure extraction of an `ItemRecord` from item page HTML
//! - `extract_item_refs`: pure extraction of item links from a listing page
//! - `ItemParser`: fetches an item page through the static client and parses it

mod extract;
mod item;

pub use extract::{extract_item_refs, is_valid_title, parse_item_html};
pub use item::ItemParser;
