//! Integration tests for discovery runs
//!
//! These tests serve item pages from a wiremock server, render listings
//! through an in-memory browser backend and check what ends up in the
//! repository.

mod common;

use common::{item_page, listing_page, mount_page, test_config, FakeBrowser, RecordingSink};
use shelfwatch::cancel::CancellationToken;
use shelfwatch::client::HttpPageClient;
use shelfwatch::crawler::RunErrorKind;
use shelfwatch::model::{FormatTag, Price};
use shelfwatch::storage::{Repository, SqliteRepository};
use shelfwatch::{ParseStage, SpeedProfile, Watcher};
use std::sync::Arc;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    server: MockServer,
    base: String,
    browser: Arc<FakeBrowser>,
    repository: Arc<SqliteRepository>,
    watcher: Watcher,
}

async fn harness(build: impl FnOnce(&str, FakeBrowser) -> FakeBrowser) -> Harness {
    let server = MockServer::start().await;
    let base = server.uri();
    let config = test_config(&base);

    let browser = Arc::new(build(&base, FakeBrowser::default()));
    let repository = Arc::new(SqliteRepository::open_in_memory().unwrap());
    let static_client = Arc::new(HttpPageClient::new(&config.client).unwrap());

    let watcher = Watcher::with_parts(
        config,
        repository.clone(),
        static_client,
        browser.clone(),
        Arc::new(RecordingSink::default()),
    );

    Harness {
        server,
        base,
        browser,
        repository,
        watcher,
    }
}

fn root(base: &str) -> Url {
    Url::parse(&format!("{}/elokuvat/", base)).unwrap()
}

#[tokio::test]
async fn test_crawl_persists_each_item_once() {
    let h = harness(|base, browser| {
        browser.with_page(
            &format!("{}/elokuvat/", base),
            &listing_page(
                base,
                &[
                    "/tuote/heat-1a2b3c4d/",
                    "/tuote/heat-collectors-1a2b3c4d/",
                    "/tuote/alien-5e6f7a8b/",
                ],
            ),
        )
    })
    .await;
    mount_page(&h.server, "/tuote/heat-1a2b3c4d/", &item_page("Heat (Blu-ray)", Some("12,95"))).await;
    mount_page(
        &h.server,
        "/tuote/heat-collectors-1a2b3c4d/",
        &item_page("Heat (Blu-ray)", Some("12,95")),
    )
    .await;
    mount_page(
        &h.server,
        "/tuote/alien-5e6f7a8b/",
        &item_page("Alien (4K Ultra HD + Blu-ray)", Some("29,90")),
    )
    .await;

    let summary = h
        .watcher
        .run_crawl(&[root(&h.base)], 1, SpeedProfile::Fast, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.discovered, 3);
    assert_eq!(summary.duplicates, 1);
    assert_eq!(summary.persisted, 2);
    assert!(summary.errors.is_empty());
    assert_eq!(h.browser.launches(), 1);

    let stats = h.repository.stats().unwrap();
    assert_eq!(stats.items, 2);
    assert_eq!(stats.observations, 2);
    assert!(stats.items as usize <= summary.discovered);

    let alien = h.repository.find_item_by_external_id("5e6f7a8b").unwrap().unwrap();
    assert_eq!(alien.format, FormatTag::UhdBluray);
    let history = h.repository.price_history(alien.id).unwrap();
    assert_eq!(history[0].price, Some(Price::from_cents(2990)));
}

#[tokio::test]
async fn test_max_pages_limits_discovery_to_first_page() {
    let h = harness(|base, browser| {
        browser
            .with_page(
                &format!("{}/elokuvat/", base),
                &listing_page(base, &["/tuote/heat-00000001/"]),
            )
            .with_page(
                &format!("{}/elokuvat/?page=2", base),
                &listing_page(base, &["/tuote/alien-00000002/"]),
            )
            .with_page(
                &format!("{}/elokuvat/?page=3", base),
                &listing_page(base, &["/tuote/ronin-00000003/"]),
            )
    })
    .await;
    mount_page(&h.server, "/tuote/heat-00000001/", &item_page("Heat (Blu-ray)", Some("12,95"))).await;
    mount_page(&h.server, "/tuote/alien-00000002/", &item_page("Alien (Blu-ray)", Some("12,95"))).await;
    mount_page(&h.server, "/tuote/ronin-00000003/", &item_page("Ronin (Blu-ray)", Some("12,95"))).await;

    let summary = h
        .watcher
        .run_crawl(&[root(&h.base)], 1, SpeedProfile::Fast, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.discovered, 1);
    assert_eq!(summary.pages, 1);
    assert_eq!(h.browser.rendered(), vec![format!("{}/elokuvat/", h.base)]);
    assert!(h.repository.find_item_by_external_id("00000001").unwrap().is_some());
    assert!(h.repository.find_item_by_external_id("00000002").unwrap().is_none());
    assert!(h.repository.find_item_by_external_id("00000003").unwrap().is_none());
}

#[tokio::test]
async fn test_all_pages_walked_when_allowed() {
    let h = harness(|base, browser| {
        browser
            .with_page(
                &format!("{}/elokuvat/", base),
                &listing_page(base, &["/tuote/heat-00000001/"]),
            )
            .with_page(
                &format!("{}/elokuvat/?page=2", base),
                &listing_page(base, &["/tuote/alien-00000002/"]),
            )
    })
    .await;
    mount_page(&h.server, "/tuote/heat-00000001/", &item_page("Heat (Blu-ray)", Some("12,95"))).await;
    mount_page(&h.server, "/tuote/alien-00000002/", &item_page("Alien (Blu-ray)", Some("12,95"))).await;

    let summary = h
        .watcher
        .run_crawl(&[root(&h.base)], 3, SpeedProfile::Fast, &CancellationToken::new())
        .await
        .unwrap();

    // page 3 is empty and ends the category
    assert_eq!(summary.pages, 3);
    assert_eq!(summary.persisted, 2);
}

#[tokio::test]
async fn test_promotional_banner_is_stripped_from_title() {
    let h = harness(|base, browser| {
        browser.with_page(
            &format!("{}/elokuvat/", base),
            &listing_page(base, &["/tuote/the-thing-9a8b7c6d/"]),
        )
    })
    .await;
    mount_page(
        &h.server,
        "/tuote/the-thing-9a8b7c6d/",
        r#"<html><body>
           <h1><span class="campaign">Vihdoin arki! -20%</span> The Thing (4K Ultra HD)</h1>
           <span class="price">29,95 €</span>
           </body></html>"#,
    )
    .await;

    h.watcher
        .run_crawl(&[root(&h.base)], 1, SpeedProfile::Fast, &CancellationToken::new())
        .await
        .unwrap();

    let item = h.repository.find_item_by_external_id("9a8b7c6d").unwrap().unwrap();
    assert_eq!(item.title, "The Thing (4K Ultra HD)");
}

#[tokio::test]
async fn test_broken_item_page_does_not_stop_run() {
    let h = harness(|base, browser| {
        browser.with_page(
            &format!("{}/elokuvat/", base),
            &listing_page(base, &["/tuote/gone-00000001/", "/tuote/heat-00000002/"]),
        )
    })
    .await;
    Mock::given(method("GET"))
        .and(path("/tuote/gone-00000001/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&h.server)
        .await;
    mount_page(&h.server, "/tuote/heat-00000002/", &item_page("Heat (Blu-ray)", Some("12,95"))).await;

    let summary = h
        .watcher
        .run_crawl(&[root(&h.base)], 1, SpeedProfile::Fast, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.persisted, 1);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].kind, RunErrorKind::Fetch);
    assert!(summary.errors[0].message.contains("500"));
}

#[tokio::test]
async fn test_out_of_stock_item_stored_without_price() {
    let h = harness(|base, browser| {
        browser.with_page(
            &format!("{}/elokuvat/", base),
            &listing_page(base, &["/tuote/heat-00000001/"]),
        )
    })
    .await;
    mount_page(&h.server, "/tuote/heat-00000001/", &item_page("Heat (Blu-ray)", None)).await;

    h.watcher
        .run_crawl(&[root(&h.base)], 1, SpeedProfile::Fast, &CancellationToken::new())
        .await
        .unwrap();

    let item = h.repository.find_item_by_external_id("00000001").unwrap().unwrap();
    let latest = h.repository.latest_observation(item.id).unwrap().unwrap();
    assert_eq!(latest.price, None);
    assert!(!latest.available);
}

#[tokio::test]
async fn test_excluded_item_hidden_from_cheapest_but_queryable() {
    let h = harness(|base, browser| {
        browser.with_page(
            &format!("{}/elokuvat/", base),
            &listing_page(base, &["/tuote/heat-00000001/", "/tuote/alien-00000002/"]),
        )
    })
    .await;
    mount_page(&h.server, "/tuote/heat-00000001/", &item_page("Heat (Blu-ray)", Some("7,95"))).await;
    mount_page(&h.server, "/tuote/alien-00000002/", &item_page("Alien (Blu-ray)", Some("12,95"))).await;

    h.watcher
        .run_crawl(&[root(&h.base)], 1, SpeedProfile::Fast, &CancellationToken::new())
        .await
        .unwrap();

    let cheapest = h.repository.cheapest(None, 10).unwrap();
    assert_eq!(cheapest[0].item.external_id, "00000001");

    assert!(h.watcher.exclude("00000001").unwrap());
    let cheapest = h.repository.cheapest(None, 10).unwrap();
    assert_eq!(cheapest.len(), 1);
    assert_eq!(cheapest[0].item.external_id, "00000002");

    let heat = h.watcher.find_item("00000001").unwrap();
    assert_eq!(heat.title, "Heat (Blu-ray)");
    assert!(h.repository.is_excluded(heat.id).unwrap());
}

#[tokio::test]
async fn test_repeated_crawl_refreshes_item_and_appends() {
    let h = harness(|base, browser| {
        browser.with_page(
            &format!("{}/elokuvat/", base),
            &listing_page(base, &["/tuote/heat-00000001/"]),
        )
    })
    .await;
    mount_page(&h.server, "/tuote/heat-00000001/", &item_page("Heat (Blu-ray)", Some("12,95"))).await;

    let cancel = CancellationToken::new();
    h.watcher
        .run_crawl(&[root(&h.base)], 1, SpeedProfile::Fast, &cancel)
        .await
        .unwrap();
    h.watcher
        .run_crawl(&[root(&h.base)], 1, SpeedProfile::Fast, &cancel)
        .await
        .unwrap();

    let item = h.repository.find_item_by_external_id("00000001").unwrap().unwrap();
    let history = h.repository.price_history(item.id).unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[0].observed_at < history[1].observed_at);
    assert!(h.repository.pending_events().unwrap().is_empty());
}

#[tokio::test]
async fn test_parse_item_reads_live_page() {
    let h = harness(|_, browser| browser).await;
    mount_page(&h.server, "/tuote/heat-1a2b3c4d/", &item_page("Heat (Blu-ray)", Some("14,95"))).await;

    let record = h
        .watcher
        .parse_item(&format!("{}/tuote/heat-1a2b3c4d?ref=mail", h.base))
        .await
        .unwrap();
    assert_eq!(record.external_id, "1a2b3c4d");
    assert_eq!(record.price, Some(Price::from_cents(1495)));
    assert!(record.available);

    let missing = h
        .watcher
        .parse_item(&format!("{}/tuote/none-00000000/", h.base))
        .await
        .unwrap_err();
    assert_eq!(missing.stage, ParseStage::Fetch);
    assert_eq!(h.repository.stats().unwrap().items, 0);
}
