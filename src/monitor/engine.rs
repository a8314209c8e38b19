//! Monitor cycles
//!
//! A cycle re-checks every selected item once:
//! - Pending events from earlier cycles are re-emitted first
//! - Item pages are fetched concurrently within the profile's limit
//! - Each fresh observation is appended and compared with the single most
//!   recent stored observation of that item
//! - Every resulting change event is recorded once and handed to the alert sink

use crate::alert::AlertSink;
use crate::cancel::{cancellable, sleep_or_cancel, CancellationToken};
use crate::config::SpeedSettings;
use crate::crawler::{RunError, RunErrorKind, Throttle};
use crate::model::{ChangeEvent, ItemRecord, MonitoredItem, NewChangeEvent};
use crate::monitor::predicates::evaluate;
use crate::monitor::state::{classify, CheckState};
use crate::monitor::strategy::MonitorStrategy;
use crate::parser::ItemParser;
use crate::storage::{Repository, RepositoryError};
use crate::{ParseError, WatcherError};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use url::Url;

/// Outcome of one monitor cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorSummary {
    /// Items fetched and recorded
    pub checked: usize,
    /// Checked items whose price or availability moved
    pub changed: usize,
    /// Outcome breakdown of the checked items
    pub outcomes: OutcomeCounts,
    /// Items whose fetch, parse or write failed
    pub failed: usize,
    /// Change events recorded in this cycle
    pub events: usize,
    /// Pending events from earlier cycles delivered in this cycle
    pub redelivered: usize,
    pub errors: Vec<RunError>,
    /// True when the cycle stopped on its cancellation token
    pub cancelled: bool,
}

/// Number of checked items per outcome state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub unchanged: usize,
    pub dropped: usize,
    pub raised: usize,
    pub became_available: usize,
    pub became_unavailable: usize,
}

impl OutcomeCounts {
    /// Counts one item that landed on `state`; non-outcome states are ignored
    pub fn record(&mut self, state: CheckState) {
        let slot = match state {
            CheckState::Unchanged => &mut self.unchanged,
            CheckState::Dropped => &mut self.dropped,
            CheckState::Raised => &mut self.raised,
            CheckState::BecameAvailable => &mut self.became_available,
            CheckState::BecameUnavailable => &mut self.became_unavailable,
            CheckState::Idle | CheckState::Fetching => return,
        };
        *slot += 1;
    }
}

/// Re-checks tracked items and raises change events
pub struct PriceMonitor {
    parser: ItemParser,
    repository: Arc<dyn Repository>,
    alerts: Arc<dyn AlertSink>,
    settings: SpeedSettings,
}

/// Outcome of an item check that got past the fetch
struct Checked {
    state: CheckState,
    events: usize,
}

impl PriceMonitor {
    /// Creates a new monitor
    ///
    /// # Arguments
    ///
    /// * `parser` - Item page parser (unthrottled; each cycle attaches its own pacing)
    /// * `repository` - Source of monitored items and destination of observations
    /// * `alerts` - Sink receiving change events
    /// * `settings` - Pacing of item fetches
    pub fn new(
        parser: ItemParser,
        repository: Arc<dyn Repository>,
        alerts: Arc<dyn AlertSink>,
        settings: SpeedSettings,
    ) -> Self {
        Self {
            parser,
            repository,
            alerts,
            settings,
        }
    }

    /// Runs one monitor cycle
    ///
    /// # Arguments
    ///
    /// * `strategy` - Selects the items to check
    /// * `cancel` - Token of this cycle
    ///
    /// # Returns
    ///
    /// * `Ok(MonitorSummary)` - Counts and collected per-item errors
    /// * `Err(WatcherError)` - The monitored items could not be listed
    pub async fn run_cycle(
        &self,
        strategy: &MonitorStrategy,
        cancel: &CancellationToken,
    ) -> Result<MonitorSummary, WatcherError> {
        let start_time = Instant::now();
        let mut summary = MonitorSummary::default();

        self.redeliver_pending(&mut summary).await?;

        let items = self.repository.list_monitored_items(strategy)?;
        info!(strategy = %strategy, items = items.len(), "Starting monitor cycle");

        let parser = self
            .parser
            .clone()
            .with_throttle(Arc::new(Throttle::new(self.settings)));
        let limit = self.settings.concurrency.max(1);

        let mut states = vec![CheckState::Idle; items.len()];
        let mut in_flight: JoinSet<(usize, Result<ItemRecord, ParseError>)> = JoinSet::new();
        let mut next_index = 0;

        loop {
            while next_index < items.len() && in_flight.len() < limit && !cancel.is_cancelled() {
                let index = next_index;
                next_index += 1;

                let url = items[index].item.url.clone();
                let parser = parser.clone();
                states[index] = states[index].advance(CheckState::Fetching);
                in_flight.spawn(async move {
                    let result = match Url::parse(&url) {
                        Ok(parsed) => parser.parse(&parsed).await,
                        Err(e) => Err(ParseError::fetch(&url, e.to_string())),
                    };
                    (index, result)
                });
            }

            let joined = match cancellable(cancel, in_flight.join_next()).await {
                Some(Some(joined)) => joined,
                Some(None) | None => break,
            };

            let (index, result) = match joined {
                Ok(joined) => joined,
                Err(e) => {
                    summary.failed += 1;
                    summary
                        .errors
                        .push(RunError::new("", RunErrorKind::Fetch, e.to_string()));
                    continue;
                }
            };
            let monitored = &items[index];

            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    warn!(
                        external_id = %monitored.item.external_id,
                        stage = %e.stage,
                        error = %e.message,
                        "Check failed"
                    );
                    states[index] = states[index].advance(CheckState::Idle);
                    summary.failed += 1;
                    summary.errors.push(e.into());
                    continue;
                }
            };

            match self.record_check(monitored, &record, &mut summary).await {
                Ok(checked) => {
                    states[index] = states[index].advance(checked.state);
                    let outcome = states[index];
                    debug!(
                        external_id = %monitored.item.external_id,
                        state = %outcome,
                        events = checked.events,
                        "Item checked"
                    );
                    summary.checked += 1;
                    summary.events += checked.events;
                    summary.outcomes.record(outcome);
                    if outcome.is_change() {
                        summary.changed += 1;
                    }
                }
                Err(e) => {
                    warn!(external_id = %monitored.item.external_id, error = %e, "Failed to record check");
                    summary.failed += 1;
                    summary.errors.push(RunError::repository(&monitored.item.url, &e));
                }
            }
            states[index] = states[index].advance(CheckState::Idle);
        }

        summary.cancelled = cancel.is_cancelled();

        info!(
            checked = summary.checked,
            changed = summary.changed,
            failed = summary.failed,
            events = summary.events,
            redelivered = summary.redelivered,
            cancelled = summary.cancelled,
            "Monitor cycle completed in {:?}",
            start_time.elapsed()
        );

        Ok(summary)
    }

    /// Runs cycles every `interval` until cancelled
    ///
    /// `on_cycle` sees each summary as soon as its cycle finishes.
    pub async fn run_repeating<F>(
        &self,
        strategy: &MonitorStrategy,
        interval: Duration,
        cancel: &CancellationToken,
        mut on_cycle: F,
    ) -> Result<usize, WatcherError>
    where
        F: FnMut(&MonitorSummary),
    {
        let mut cycles = 0;
        loop {
            let summary = self.run_cycle(strategy, cancel).await?;
            cycles += 1;
            on_cycle(&summary);

            if summary.cancelled {
                break;
            }
            info!("Next monitor cycle in {:?}", interval);
            if !sleep_or_cancel(cancel, interval).await {
                break;
            }
        }
        Ok(cycles)
    }

    /// Appends the observation, records events and emits them
    async fn record_check(
        &self,
        monitored: &MonitoredItem,
        record: &ItemRecord,
        summary: &mut MonitorSummary,
    ) -> Result<Checked, RepositoryError> {
        let item = &monitored.item;
        let previous = self.repository.latest_observation(item.id)?;

        if record.external_id == item.external_id {
            self.repository.upsert_item(record)?;
        } else {
            warn!(
                expected = %item.external_id,
                found = %record.external_id,
                "Item page reports a different id, keeping stored details"
            );
        }

        let current = self.repository.append_price_observation(
            item.id,
            record.price,
            record.available,
            Utc::now(),
        )?;

        let mut events = 0;
        for kind in evaluate(previous.as_ref(), &current, monitored.watch.as_ref()) {
            let new_event = NewChangeEvent {
                item_id: item.id,
                kind,
                old_price: previous.as_ref().and_then(|p| p.price),
                new_price: current.price,
                previous_observation_id: previous.as_ref().map(|p| p.id),
                observation_id: current.id,
            };
            let Some(event) = self.repository.record_change_event(&new_event)? else {
                continue;
            };
            events += 1;
            self.deliver(&event, summary).await?;
        }

        Ok(Checked {
            state: classify(previous.as_ref(), &current),
            events,
        })
    }

    /// Emits an event and flips its delivered flag on success
    ///
    /// Sink failures leave the event pending and land in the summary.
    async fn deliver(
        &self,
        event: &ChangeEvent,
        summary: &mut MonitorSummary,
    ) -> Result<bool, RepositoryError> {
        let item = self.repository.get_item(event.item_id)?;
        match self.alerts.emit(event, &item).await {
            Ok(()) => {
                self.repository.mark_event_delivered(event.id)?;
                Ok(true)
            }
            Err(e) => {
                warn!(event_id = event.id, kind = %event.kind, error = %e, "Alert not delivered");
                summary
                    .errors
                    .push(RunError::new(&item.url, RunErrorKind::Alert, e.to_string()));
                Ok(false)
            }
        }
    }

    async fn redeliver_pending(&self, summary: &mut MonitorSummary) -> Result<(), WatcherError> {
        let pending = self.repository.pending_events()?;
        if pending.is_empty() {
            return Ok(());
        }
        info!(count = pending.len(), "Re-emitting pending alerts");

        for event in &pending {
            match self.deliver(event, summary).await {
                Ok(true) => summary.redelivered += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(event_id = event.id, error = %e, "Failed to re-emit alert");
                    summary.errors.push(RunError::new(
                        format!("event:{}", event.id),
                        RunErrorKind::Repository,
                        e.to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertError;
    use crate::client::StaticPageClient;
    use crate::model::{ChangeKind, FormatTag, Item, Price};
    use crate::storage::SqliteRepository;
    use crate::FetchError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const HEAT: &str = "https://cdon.fi/tuote/heat-1a2b3c4d/";

    /// Serves pages that can be swapped between cycles
    #[derive(Default)]
    struct FakePages(Mutex<HashMap<String, String>>);

    impl FakePages {
        fn set(&self, url: &str, html: &str) {
            self.0.lock().unwrap().insert(url.to_string(), html.to_string());
        }
    }

    #[async_trait]
    impl StaticPageClient for FakePages {
        async fn get(&self, url: &Url) -> Result<String, FetchError> {
            self.0
                .lock()
                .unwrap()
                .get(url.as_str())
                .cloned()
                .ok_or(FetchError::Status {
                    url: url.to_string(),
                    status: 404,
                })
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<ChangeKind>>,
        broken: Mutex<bool>,
    }

    #[async_trait]
    impl AlertSink for RecordingSink {
        async fn emit(&self, event: &ChangeEvent, _item: &Item) -> Result<(), AlertError> {
            if *self.broken.lock().unwrap() {
                return Err(AlertError::Unavailable("offline".to_string()));
            }
            self.events.lock().unwrap().push(event.kind);
            Ok(())
        }
    }

    fn page(cents: &str) -> String {
        format!(r#"<h1>Heat (Blu-ray)</h1><span class="price">{} €</span>"#, cents)
    }

    struct Fixture {
        pages: Arc<FakePages>,
        sink: Arc<RecordingSink>,
        repository: Arc<SqliteRepository>,
        monitor: PriceMonitor,
        item_id: i64,
    }

    fn fixture(initial_cents: u32, target: Option<u32>) -> Fixture {
        let pages = Arc::new(FakePages::default());
        let sink = Arc::new(RecordingSink::default());
        let repository = Arc::new(SqliteRepository::open_in_memory().unwrap());

        let item = repository
            .upsert_item(&ItemRecord {
                external_id: "1a2b3c4d".to_string(),
                title: "Heat (Blu-ray)".to_string(),
                format: FormatTag::Bluray,
                url: HEAT.to_string(),
                image_url: None,
                price: Some(Price::from_cents(initial_cents)),
                original_price: None,
                available: true,
            })
            .unwrap();
        repository
            .append_price_observation(item.id, Some(Price::from_cents(initial_cents)), true, Utc::now())
            .unwrap();
        repository
            .set_watch(item.id, target.map(Price::from_cents))
            .unwrap();

        let monitor = PriceMonitor::new(
            ItemParser::new(pages.clone(), "/tuote/"),
            repository.clone(),
            sink.clone(),
            SpeedSettings::immediate(),
        );
        Fixture {
            pages,
            sink,
            repository,
            monitor,
            item_id: item.id,
        }
    }

    #[tokio::test]
    async fn test_drop_raises_one_event() {
        let fx = fixture(2000, None);
        fx.pages.set(HEAT, &page("15,00"));

        let summary = fx
            .monitor
            .run_cycle(&MonitorStrategy::watchlist(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.checked, 1);
        assert_eq!(summary.changed, 1);
        assert_eq!(summary.outcomes.dropped, 1);
        assert_eq!(summary.events, 1);
        assert_eq!(*fx.sink.events.lock().unwrap(), vec![ChangeKind::PriceDrop]);
        assert!(fx.repository.pending_events().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unchanged_cycles_raise_nothing() {
        let fx = fixture(1500, None);
        fx.pages.set(HEAT, &page("15,00"));
        let strategy = MonitorStrategy::watchlist();
        let cancel = CancellationToken::new();

        let first = fx.monitor.run_cycle(&strategy, &cancel).await.unwrap();
        let second = fx.monitor.run_cycle(&strategy, &cancel).await.unwrap();

        assert_eq!(first.events + second.events, 0);
        assert_eq!(second.changed, 0);
        assert_eq!(second.outcomes.unchanged, 1);
        assert_eq!(fx.repository.price_history(fx.item_id).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_watch_added_at_target_fires_once() {
        let fx = fixture(1500, Some(1800));
        fx.pages.set(HEAT, &page("15,00"));
        let strategy = MonitorStrategy::watchlist();
        let cancel = CancellationToken::new();

        for _ in 0..3 {
            fx.monitor.run_cycle(&strategy, &cancel).await.unwrap();
        }

        assert_eq!(*fx.sink.events.lock().unwrap(), vec![ChangeKind::TargetReached]);
    }

    #[tokio::test]
    async fn test_new_target_rearms_alert() {
        let fx = fixture(1500, Some(1800));
        fx.pages.set(HEAT, &page("15,00"));
        let strategy = MonitorStrategy::watchlist();
        let cancel = CancellationToken::new();

        fx.monitor.run_cycle(&strategy, &cancel).await.unwrap();
        fx.repository
            .set_watch(fx.item_id, Some(Price::from_cents(1600)))
            .unwrap();
        fx.monitor.run_cycle(&strategy, &cancel).await.unwrap();
        fx.monitor.run_cycle(&strategy, &cancel).await.unwrap();

        assert_eq!(
            *fx.sink.events.lock().unwrap(),
            vec![ChangeKind::TargetReached, ChangeKind::TargetReached]
        );
    }

    #[tokio::test]
    async fn test_failed_fetch_is_counted() {
        let fx = fixture(2000, None);

        let summary = fx
            .monitor
            .run_cycle(&MonitorStrategy::watchlist(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.checked, 0);
        assert_eq!(summary.errors[0].kind, RunErrorKind::Fetch);
        assert_eq!(fx.repository.price_history(fx.item_id).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_undelivered_event_is_retried_next_cycle() {
        let fx = fixture(2000, None);
        fx.pages.set(HEAT, &page("15,00"));
        *fx.sink.broken.lock().unwrap() = true;
        let strategy = MonitorStrategy::watchlist();
        let cancel = CancellationToken::new();

        let first = fx.monitor.run_cycle(&strategy, &cancel).await.unwrap();
        assert_eq!(first.events, 1);
        assert_eq!(first.errors[0].kind, RunErrorKind::Alert);
        assert_eq!(fx.repository.pending_events().unwrap().len(), 1);

        *fx.sink.broken.lock().unwrap() = false;
        let second = fx.monitor.run_cycle(&strategy, &cancel).await.unwrap();
        assert_eq!(second.redelivered, 1);
        assert_eq!(second.events, 0);
        assert!(fx.repository.pending_events().unwrap().is_empty());
        assert_eq!(*fx.sink.events.lock().unwrap(), vec![ChangeKind::PriceDrop]);
    }

    #[tokio::test]
    async fn test_unwatched_item_skipped_by_watchlist_scope() {
        let fx = fixture(2000, None);
        fx.repository.remove_watch(fx.item_id).unwrap();
        fx.pages.set(HEAT, &page("15,00"));

        let summary = fx
            .monitor
            .run_cycle(&MonitorStrategy::watchlist(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(summary.checked, 0);

        let summary = fx
            .monitor
            .run_cycle(&MonitorStrategy::catalog(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(summary.checked, 1);
    }

    #[tokio::test]
    async fn test_repeating_stops_when_cancelled() {
        let fx = fixture(2000, None);
        fx.pages.set(HEAT, &page("20,00"));
        let cancel = CancellationToken::new();
        let stopper = cancel.clone();

        let cycles = fx
            .monitor
            .run_repeating(
                &MonitorStrategy::watchlist(),
                Duration::from_secs(3600),
                &cancel,
                move |_| stopper.cancel(),
            )
            .await
            .unwrap();

        assert_eq!(cycles, 1);
    }
}
