//! Per-item check states of a monitor cycle
//!
//! An item starts `Idle`, moves to `Fetching` while its page is downloaded,
//! lands on one outcome state and returns to `Idle`. A failed fetch goes
//! straight back to `Idle`.

use crate::model::PriceObservation;
use std::fmt;

/// Represents where one item is within a monitor cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckState {
    // ===== Active States =====
    /// Not being checked
    Idle,

    /// The item page is being downloaded
    Fetching,

    // ===== Outcome States =====
    /// Price and availability are as before
    Unchanged,

    /// Price went down
    Dropped,

    /// Price went up
    Raised,

    /// Unavailable before, available now
    BecameAvailable,

    /// Available before, unavailable now
    BecameUnavailable,
}

impl CheckState {
    /// Returns true for the states a successful check ends in
    pub fn is_outcome(&self) -> bool {
        !matches!(self, Self::Idle | Self::Fetching)
    }

    /// Returns true for outcomes that differ from the previous observation
    pub fn is_change(&self) -> bool {
        self.is_outcome() && !matches!(self, Self::Unchanged)
    }

    /// Checks whether moving to `next` is allowed
    pub fn can_transition_to(&self, next: CheckState) -> bool {
        match (self, next) {
            (Self::Idle, Self::Fetching) => true,
            (Self::Fetching, Self::Idle) => true,
            (Self::Fetching, next) => next.is_outcome(),
            (state, Self::Idle) => state.is_outcome(),
            _ => false,
        }
    }

    /// Moves to `next`, staying put if the move is not allowed
    pub fn advance(self, next: CheckState) -> CheckState {
        debug_assert!(
            self.can_transition_to(next),
            "invalid check transition {} -> {}",
            self,
            next
        );
        if self.can_transition_to(next) {
            next
        } else {
            self
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Unchanged => "unchanged",
            Self::Dropped => "dropped",
            Self::Raised => "raised",
            Self::BecameAvailable => "became_available",
            Self::BecameUnavailable => "became_unavailable",
        }
    }
}

impl fmt::Display for CheckState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a successful check
///
/// Availability changes take precedence over price movement. Without a
/// previous observation there is nothing to compare, so the outcome is
/// `Unchanged`.
pub fn classify(previous: Option<&PriceObservation>, current: &PriceObservation) -> CheckState {
    let Some(previous) = previous else {
        return CheckState::Unchanged;
    };

    match (previous.available, current.available) {
        (false, true) => return CheckState::BecameAvailable,
        (true, false) => return CheckState::BecameUnavailable,
        _ => {}
    }

    match (previous.price, current.price) {
        (Some(old), Some(new)) if new < old => CheckState::Dropped,
        (Some(old), Some(new)) if new > old => CheckState::Raised,
        _ => CheckState::Unchanged,
    }
}
