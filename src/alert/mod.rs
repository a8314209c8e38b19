//! Alert port
//!
//! Change events leave the watcher through an `AlertSink`. Message transport
//! lives outside this crate; the bundled `LogAlertSink` writes each event to
//! the log.

use crate::model::{ChangeEvent, ChangeKind, Item, Price};
use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

/// Errors raised by alert sinks
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("Alert delivery failed: {0}")]
    Delivery(String),

    #[error("Alert sink unavailable: {0}")]
    Unavailable(String),
}

/// Destination of change events
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Delivers one change event
    ///
    /// # Arguments
    ///
    /// * `event` - The stored event
    /// * `item` - The item the event is about
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The event was handed over; it will be marked delivered
    /// * `Err(AlertError)` - The event stays pending and is retried next cycle
    async fn emit(&self, event: &ChangeEvent, item: &Item) -> Result<(), AlertError>;
}

/// Alert sink that reports events through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn emit(&self, event: &ChangeEvent, item: &Item) -> Result<(), AlertError> {
        info!(
            event_id = event.id,
            kind = %event.kind,
            external_id = %item.external_id,
            url = %item.url,
            "{}",
            describe(event, item)
        );
        Ok(())
    }
}

/// One-line human readable description of an event
pub fn describe(event: &ChangeEvent, item: &Item) -> String {
    let price = |p: Option<Price>| match p {
        Some(p) => p.to_string(),
        None => "-".to_string(),
    };

    match event.kind {
        ChangeKind::PriceDrop => format!(
            "Price drop: {} {} -> {}",
            item.title,
            price(event.old_price),
            price(event.new_price)
        ),
        ChangeKind::TargetReached => {
            format!("Target reached: {} now {}", item.title, price(event.new_price))
        }
        ChangeKind::BackInStock => {
            format!("Back in stock: {} at {}", item.title, price(event.new_price))
        }
    }
}
