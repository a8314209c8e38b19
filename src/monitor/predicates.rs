//! Change predicates
//!
//! Each predicate looks at one pair of consecutive observations of an item.
//! They are independent: a single pair can satisfy several of them.

use crate::model::{ChangeKind, PriceObservation, WatchEntry};

/// Evaluates all predicates over one observation pair
///
/// # Arguments
///
/// * `previous` - The most recent stored observation before `current`, if any
/// * `current` - The fresh observation
/// * `watch` - The item's watch entry, if it is watched
///
/// # Returns
///
/// The kinds of change the pair represents, in a fixed order
pub fn evaluate(
    previous: Option<&PriceObservation>,
    current: &PriceObservation,
    watch: Option<&WatchEntry>,
) -> Vec<ChangeKind> {
    let mut kinds = Vec::new();
    if is_price_drop(previous, current) {
        kinds.push(ChangeKind::PriceDrop);
    }
    if is_target_reached(previous, current, watch) {
        kinds.push(ChangeKind::TargetReached);
    }
    if is_back_in_stock(previous, current) {
        kinds.push(ChangeKind::BackInStock);
    }
    kinds
}

/// Both prices present and the new one lower
pub fn is_price_drop(previous: Option<&PriceObservation>, current: &PriceObservation) -> bool {
    match (previous.and_then(|p| p.price), current.price) {
        (Some(old), Some(new)) => new < old,
        _ => false,
    }
}

/// The new price is at or below the watch target and the previous one was not
///
/// A previous observation counts as not at target when it has no price or
/// was recorded before the target was set. An item that reappears at a good
/// price is reported, and so is one already below a freshly set target.
pub fn is_target_reached(
    previous: Option<&PriceObservation>,
    current: &PriceObservation,
    watch: Option<&WatchEntry>,
) -> bool {
    let Some((target, armed_at)) = watch.and_then(|w| w.target_price.map(|t| (t, w.created_at)))
    else {
        return false;
    };
    let at_target = |obs: &PriceObservation| obs.price.is_some_and(|p| p <= target);
    let judged = |obs: &PriceObservation| obs.observed_at >= armed_at && at_target(obs);

    at_target(current) && !previous.is_some_and(judged)
}

/// Previously unavailable, now available
pub fn is_back_in_stock(previous: Option<&PriceObservation>, current: &PriceObservation) -> bool {
    matches!(previous, Some(prev) if !prev.available) && current.available
}
