//! Request pacing
//!
//! This module handles:
//! - Concurrency limiting via a semaphore sized by the speed profile
//! - A jittered minimum gap between the starts of consecutive requests
//! - Counting requests made through the throttle

use crate::config::SpeedSettings;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

/// Held while a throttled request is in flight
pub struct ThrottlePermit {
    _permit: Option<OwnedSemaphorePermit>,
}

/// Paces requests according to a speed profile
///
/// The throttle coordinates:
/// - How many requests may be in flight (profile concurrency)
/// - How far apart request starts are (random delay inside the profile range)
pub struct Throttle {
    semaphore: Arc<Semaphore>,
    settings: SpeedSettings,
    /// Start time reserved by the most recent request
    last_start: Mutex<Option<Instant>>,
    request_count: AtomicU64,
}

impl Throttle {
    pub fn new(settings: SpeedSettings) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(settings.concurrency.max(1))),
            settings,
            last_start: Mutex::new(None),
            request_count: AtomicU64::new(0),
        }
    }

    pub fn settings(&self) -> &SpeedSettings {
        &self.settings
    }

    /// Waits until a request may start
    ///
    /// The first request starts immediately. Every later one starts a fresh
    /// jittered delay after the previous start. The returned permit counts
    /// against the concurrency limit until dropped.
    pub async fn acquire(&self) -> ThrottlePermit {
        let permit = self.semaphore.clone().acquire_owned().await.ok();

        let wait = {
            let mut last_start = self.last_start.lock().await;
            let now = Instant::now();
            let wait = time_until_next_request(*last_start, self.settings.jittered_delay(), now);
            *last_start = Some(now + wait);
            wait
        };

        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }

        self.request_count.fetch_add(1, Ordering::Relaxed);
        ThrottlePermit { _permit: permit }
    }

    /// Number of requests started through this throttle
    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }
}

/// Remaining wait before a request may start
///
/// # Arguments
///
/// * `last_start` - Start of the previous request, if any
/// * `gap` - Required gap between starts
/// * `now` - Current time
fn time_until_next_request(last_start: Option<Instant>, gap: Duration, now: Instant) -> Duration {
    match last_start {
        Some(last) => (last + gap).saturating_duration_since(now),
        None => Duration::ZERO,
    }
}
