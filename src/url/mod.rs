//! URL handling module for Shelfwatch
//!
//! This module provides item URL canonicalization, vendor id extraction,
//! link resolution and listing pagination.

mod identity;
mod normalize;

// Re-export main functions
pub use identity::{extract_external_id, fallback_external_id, item_external_id};
pub use normalize::{canonical_item_url, listing_page_url, resolve_link};

use crate::model::ItemRef;
use url::Url;

/// Turns a link found on a listing page into an item reference
///
/// Only links whose path contains `item_path` qualify. The URL of the
/// reference is canonical so that the same item linked twice compares equal.
///
/// # Arguments
///
/// * `page_url` - URL of the listing page the link was found on
/// * `href` - Raw `href` attribute value
/// * `item_path` - Path fragment marking item links (e.g. `/tuote/`)
///
/// # Returns
///
/// The item reference, or `None` if the link is not an item link
pub fn item_ref_from_link(page_url: &Url, href: &str, item_path: &str) -> Option<ItemRef> {
    let resolved = resolve_link(page_url, href)?;
    if !resolved.path().contains(item_path) {
        return None;
    }

    let canonical = canonical_item_url(resolved.as_str()).ok()?;
    let external_id = extract_external_id(&canonical, item_path);

    Some(ItemRef {
        url: canonical.to_string(),
        external_id,
    })
}
