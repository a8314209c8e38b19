//! Price monitoring
//!
//! This module turns repeated observations of tracked items into change events:
//! - `MonitorStrategy`: which stored items a cycle re-checks
//! - `predicates`: price drop, target reached and back in stock over one observation pair
//! - `CheckState`: the per-item state machine of a cycle
//! - `PriceMonitor`: runs cycles and hands events to the alert sink

mod engine;
mod predicates;
mod state;
mod strategy;

pub use engine::{MonitorSummary, OutcomeCounts, PriceMonitor};
pub use predicates::{evaluate, is_back_in_stock, is_price_drop, is_target_reached};
pub use state::{classify, CheckState};
pub use strategy::{MonitorScope, MonitorStrategy};
