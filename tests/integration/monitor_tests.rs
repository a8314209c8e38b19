//! Integration tests for monitor cycles
//!
//! Each test stores an item with one observation, serves a fresh version of
//! its page from wiremock and checks the events a cycle produces.

mod common;

use chrono::Utc;
use common::{item_page, mount_page, test_config, FakeBrowser, RecordingSink};
use shelfwatch::cancel::CancellationToken;
use shelfwatch::client::HttpPageClient;
use shelfwatch::model::{ChangeKind, FormatTag, Item, ItemRecord, NewChangeEvent, Price};
use shelfwatch::monitor::MonitorStrategy;
use shelfwatch::storage::{Repository, SqliteRepository};
use shelfwatch::Watcher;
use std::sync::Arc;
use wiremock::MockServer;

const HEAT_PATH: &str = "/tuote/heat-1a2b3c4d/";

struct Harness {
    server: MockServer,
    sink: Arc<RecordingSink>,
    repository: Arc<SqliteRepository>,
    watcher: Watcher,
    item: Item,
}

/// Stores Heat with one observation and returns a watcher around it
///
/// # Arguments
///
/// * `previous` - Price of the stored observation, `None` for out of stock
/// * `target` - Watch target; `None` leaves the item unwatched
async fn harness(previous: Option<u32>, target: Option<Option<u32>>) -> Harness {
    let server = MockServer::start().await;
    let config = test_config(&server.uri());
    let repository = Arc::new(SqliteRepository::open_in_memory().unwrap());
    let sink = Arc::new(RecordingSink::default());

    let item = repository
        .upsert_item(&ItemRecord {
            external_id: "1a2b3c4d".to_string(),
            title: "Heat (Blu-ray)".to_string(),
            format: FormatTag::Bluray,
            url: format!("{}{}", server.uri(), HEAT_PATH),
            image_url: None,
            price: previous.map(Price::from_cents),
            original_price: None,
            available: previous.is_some(),
        })
        .unwrap();
    repository
        .append_price_observation(
            item.id,
            previous.map(Price::from_cents),
            previous.is_some(),
            Utc::now(),
        )
        .unwrap();
    if let Some(target) = target {
        repository
            .set_watch(item.id, target.map(Price::from_cents))
            .unwrap();
    }

    let static_client = Arc::new(HttpPageClient::new(&config.client).unwrap());
    let watcher = Watcher::with_parts(
        config,
        repository.clone(),
        static_client,
        Arc::new(FakeBrowser::default()),
        sink.clone(),
    );

    Harness {
        server,
        sink,
        repository,
        watcher,
        item,
    }
}

async fn run_cycle(h: &Harness, strategy: MonitorStrategy) -> shelfwatch::MonitorSummary {
    h.watcher
        .run_monitor_cycle(&strategy, &CancellationToken::new())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_price_drop_without_target() {
    let h = harness(Some(2000), Some(None)).await;
    mount_page(&h.server, HEAT_PATH, &item_page("Heat (Blu-ray)", Some("15,00"))).await;

    let summary = run_cycle(&h, MonitorStrategy::watchlist()).await;

    assert_eq!(summary.checked, 1);
    assert_eq!(summary.changed, 1);
    assert_eq!(summary.events, 1);

    let events = h.sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, ChangeKind::PriceDrop);
    assert_eq!(events[0].old_price, Some(Price::from_cents(2000)));
    assert_eq!(events[0].new_price, Some(Price::from_cents(1500)));
    assert!(h.repository.pending_events().unwrap().is_empty());
}

#[tokio::test]
async fn test_price_drop_below_target() {
    let h = harness(Some(2000), Some(Some(1800))).await;
    mount_page(&h.server, HEAT_PATH, &item_page("Heat (Blu-ray)", Some("15,00"))).await;

    let summary = run_cycle(&h, MonitorStrategy::watchlist()).await;

    assert_eq!(summary.events, 2);
    assert_eq!(
        h.sink.kinds(),
        vec![ChangeKind::PriceDrop, ChangeKind::TargetReached]
    );
}

#[tokio::test]
async fn test_identical_observation_raises_nothing() {
    let h = harness(Some(1500), Some(None)).await;
    mount_page(&h.server, HEAT_PATH, &item_page("Heat (Blu-ray)", Some("15,00"))).await;

    let summary = run_cycle(&h, MonitorStrategy::watchlist()).await;

    assert_eq!(summary.checked, 1);
    assert_eq!(summary.changed, 0);
    assert_eq!(summary.events, 0);
    assert!(h.sink.events().is_empty());
    assert_eq!(h.repository.price_history(h.item.id).unwrap().len(), 2);
}

#[tokio::test]
async fn test_watch_added_below_target_alerts_once() {
    let h = harness(Some(1500), Some(Some(1800))).await;
    mount_page(&h.server, HEAT_PATH, &item_page("Heat (Blu-ray)", Some("15,00"))).await;

    let mut events = 0;
    for _ in 0..3 {
        events += run_cycle(&h, MonitorStrategy::watchlist()).await.events;
    }

    assert_eq!(events, 1);
    assert_eq!(h.sink.kinds(), vec![ChangeKind::TargetReached]);
    assert_eq!(h.sink.events()[0].new_price, Some(Price::from_cents(1500)));
}

#[tokio::test]
async fn test_back_in_stock() {
    let h = harness(None, Some(None)).await;
    mount_page(&h.server, HEAT_PATH, &item_page("Heat (Blu-ray)", Some("15,00"))).await;

    let summary = run_cycle(&h, MonitorStrategy::watchlist()).await;

    assert_eq!(summary.changed, 1);
    assert_eq!(h.sink.kinds(), vec![ChangeKind::BackInStock]);
}

#[tokio::test]
async fn test_each_pair_evaluated_once() {
    let h = harness(Some(2000), Some(None)).await;
    mount_page(&h.server, HEAT_PATH, &item_page("Heat (Blu-ray)", Some("15,00"))).await;

    run_cycle(&h, MonitorStrategy::watchlist()).await;
    run_cycle(&h, MonitorStrategy::watchlist()).await;

    // Second cycle compares 15.00 with 15.00
    assert_eq!(h.sink.kinds(), vec![ChangeKind::PriceDrop]);

    // Replaying the recorded pair yields no second event
    let history = h.repository.price_history(h.item.id).unwrap();
    let replay = NewChangeEvent {
        item_id: h.item.id,
        kind: ChangeKind::PriceDrop,
        old_price: history[0].price,
        new_price: history[1].price,
        previous_observation_id: Some(history[0].id),
        observation_id: history[1].id,
    };
    assert!(h.repository.record_change_event(&replay).unwrap().is_none());
}

#[tokio::test]
async fn test_unreachable_item_counted_failed() {
    let h = harness(Some(2000), Some(None)).await;

    let summary = run_cycle(&h, MonitorStrategy::watchlist()).await;

    assert_eq!(summary.checked, 0);
    assert_eq!(summary.failed, 1);
    assert_eq!(h.repository.price_history(h.item.id).unwrap().len(), 1);
}

#[tokio::test]
async fn test_strategy_selects_items() {
    let h = harness(Some(2000), None).await;
    mount_page(&h.server, HEAT_PATH, &item_page("Heat (Blu-ray)", Some("15,00"))).await;

    let watchlist = run_cycle(&h, MonitorStrategy::watchlist()).await;
    assert_eq!(watchlist.checked, 0);

    h.repository.exclude(h.item.id).unwrap();
    let catalog = run_cycle(&h, MonitorStrategy::catalog()).await;
    assert_eq!(catalog.checked, 0);

    let everything = run_cycle(&h, MonitorStrategy::catalog().with_excluded(true)).await;
    assert_eq!(everything.checked, 1);
    assert_eq!(h.sink.kinds(), vec![ChangeKind::PriceDrop]);
}

#[tokio::test]
async fn test_monitor_refreshes_item_details() {
    let h = harness(Some(2000), Some(None)).await;
    mount_page(
        &h.server,
        HEAT_PATH,
        &item_page("Heat (4K Ultra HD)", Some("20,00")),
    )
    .await;

    run_cycle(&h, MonitorStrategy::watchlist()).await;

    let item = h.repository.get_item(h.item.id).unwrap();
    assert_eq!(item.title, "Heat (4K Ultra HD)");
    assert_eq!(item.format, FormatTag::UhdBluray);
    assert_eq!(item.first_seen, h.item.first_seen);
}
