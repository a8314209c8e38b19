//! Vendor item identifiers
//!
//! Item URLs end in a slug whose last dash-separated token is the vendor's
//! hexadecimal id, e.g. `/tuote/heat-blu-ray-1a2b3c4d5e/`.

use sha2::{Digest, Sha256};
use url::Url;

const MIN_BARE_HEX_LEN: usize = 8;
const FALLBACK_HASH_LEN: usize = 16;

fn is_hex(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_hexdigit())
}

/// Extracts the vendor id from an item URL
///
/// Under `item_path` the id is the token after the slug's last dash. Any
/// other URL yields an id only when its last path segment ends in a run of at
/// least eight hex digits.
///
/// # Returns
///
/// The lowercase id, or `None` if the URL carries none
pub fn extract_external_id(url: &Url, item_path: &str) -> Option<String> {
    let path = url.path().to_lowercase();
    let last = path.split('/').filter(|s| !s.is_empty()).last()?;

    if path.contains(&item_path.to_lowercase()) {
        if let Some((_, token)) = last.rsplit_once('-') {
            if is_hex(token) {
                return Some(token.to_string());
            }
        }
    }

    let run: String = last
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_hexdigit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();

    if run.len() >= MIN_BARE_HEX_LEN {
        Some(run)
    } else {
        None
    }
}

/// Stable id for a URL that carries no vendor id
///
/// Derived from the canonical URL, so the same page always maps to the same id.
pub fn fallback_external_id(canonical: &Url) -> String {
    let digest = Sha256::digest(canonical.as_str().as_bytes());
    let hex = hex::encode(digest);
    format!("url-{}", &hex[..FALLBACK_HASH_LEN])
}

/// Vendor id of an item URL, falling back to the URL-derived id
pub fn item_external_id(canonical: &Url, item_path: &str) -> String {
    extract_external_id(canonical, item_path).unwrap_or_else(|| fallback_external_id(canonical))
}
