//! Catalog view formatting
//!
//! Tables for the derived repository views: cheapest items, deals, the watch
//! list, one item's price history, pending alerts and freshly parsed records.

use crate::alert::describe;
use crate::model::{CatalogEntry, ChangeEvent, Deal, Item, ItemRecord, Price, PriceObservation};

fn price_cell(price: Option<Price>) -> String {
    price.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string())
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

/// Formats catalog entries as a price table
pub fn format_catalog(title: &str, entries: &[CatalogEntry]) -> String {
    let mut out = format!("=== {} ({}) ===\n\n", title, entries.len());
    if entries.is_empty() {
        out.push_str("  (no items)\n");
        return out;
    }

    for entry in entries {
        out.push_str(&format!(
            "  {:>10}  {:<11} {:<50} [{}]\n",
            price_cell(entry.current_price),
            entry.item.format.as_str(),
            truncate(&entry.item.title, 50),
            entry.item.external_id
        ));
        if entry.target_price.is_some() || entry.lowest_price != entry.highest_price {
            out.push_str(&format!(
                "  {:>10}  low {} / high {} / target {}\n",
                "",
                price_cell(entry.lowest_price),
                price_cell(entry.highest_price),
                price_cell(entry.target_price)
            ));
        }
    }
    out
}

/// Formats deals, largest saving first as given
pub fn format_deals(deals: &[Deal]) -> String {
    let mut out = format!("=== Deals ({}) ===\n\n", deals.len());
    if deals.is_empty() {
        out.push_str("  (no price drops)\n");
        return out;
    }

    for deal in deals {
        out.push_str(&format!(
            "  -{:>9}  {:>10} -> {:>10}  {} [{}]\n",
            deal.saving().to_string(),
            deal.previous_price.to_string(),
            deal.current_price.to_string(),
            truncate(&deal.item.title, 50),
            deal.item.external_id
        ));
    }
    out
}

/// Formats the price series of one item
pub fn format_history(item: &Item, history: &[PriceObservation]) -> String {
    let mut out = format!("=== {} [{}] ===\n", item.title, item.external_id);
    out.push_str(&format!("  {}\n", item.url));
    out.push_str(&format!(
        "  Format: {}  First seen: {}\n\n",
        item.format,
        item.first_seen.format("%Y-%m-%d %H:%M")
    ));

    if history.is_empty() {
        out.push_str("  (no observations)\n");
        return out;
    }
    for observation in history {
        out.push_str(&format!(
            "  {}  {:>10}  {}\n",
            observation.observed_at.format("%Y-%m-%d %H:%M:%S"),
            price_cell(observation.price),
            if observation.available {
                "available"
            } else {
                "unavailable"
            }
        ));
    }
    out
}

/// Formats change events together with their items
pub fn format_events(events: &[(ChangeEvent, Item)]) -> String {
    let mut out = format!("=== Pending Alerts ({}) ===\n\n", events.len());
    if events.is_empty() {
        out.push_str("  (none)\n");
        return out;
    }
    for (event, item) in events {
        out.push_str(&format!(
            "  #{:<5} {}  {}\n",
            event.id,
            event.created_at.format("%Y-%m-%d %H:%M"),
            describe(event, item)
        ));
    }
    out
}

/// Formats one freshly parsed item record
pub fn format_item_record(record: &ItemRecord) -> String {
    let mut out = String::new();
    out.push_str(&format!("Title:          {}\n", record.title));
    out.push_str(&format!("External id:    {}\n", record.external_id));
    out.push_str(&format!("Format:         {}\n", record.format));
    out.push_str(&format!("URL:            {}\n", record.url));
    out.push_str(&format!("Price:          {}\n", price_cell(record.price)));
    if let Some(original) = record.original_price {
        out.push_str(&format!("Original price: {}\n", original));
    }
    out.push_str(&format!(
        "Available:      {}\n",
        if record.available { "yes" } else { "no" }
    ));
    if let Some(image) = &record.image_url {
        out.push_str(&format!("Image:          {}\n", image));
    }
    out
}
