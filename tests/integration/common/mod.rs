//! Shared fixtures for the integration tests
//!
//! Item pages are served over HTTP by wiremock and fetched by the real
//! `HttpPageClient`. Listing pages come from an in-memory browser backend, since
//! running a headless browser is out of reach in tests.

#![allow(dead_code)]

use async_trait::async_trait;
use shelfwatch::alert::{AlertError, AlertSink};
use shelfwatch::client::{RenderBackend, RenderedPageClient};
use shelfwatch::config::{parse_config, Config, SpeedSettings};
use shelfwatch::model::{ChangeEvent, ChangeKind, Item};
use shelfwatch::RenderError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Listing pages keyed by full URL, shared between a backend and its sessions
#[derive(Default)]
pub struct FakeBrowser {
    pages: Arc<Mutex<HashMap<String, String>>>,
    rendered: Arc<Mutex<Vec<String>>>,
    launches: AtomicUsize,
}

impl FakeBrowser {
    pub fn with_page(self, url: &str, html: &str) -> Self {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), html.to_string());
        self
    }

    /// URLs rendered so far, in order
    pub fn rendered(&self) -> Vec<String> {
        self.rendered.lock().unwrap().clone()
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

struct FakeSession {
    pages: Arc<Mutex<HashMap<String, String>>>,
    rendered: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl RenderedPageClient for FakeSession {
    async fn render(&self, url: &Url, _speed: &SpeedSettings) -> Result<String, RenderError> {
        self.rendered.lock().unwrap().push(url.to_string());
        Ok(self
            .pages
            .lock()
            .unwrap()
            .get(url.as_str())
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl RenderBackend for FakeBrowser {
    async fn launch(&self) -> Result<Box<dyn RenderedPageClient>, RenderError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            pages: self.pages.clone(),
            rendered: self.rendered.clone(),
        }))
    }
}

/// Alert sink that keeps every event it receives
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ChangeEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<ChangeEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<ChangeKind> {
        self.events().iter().map(|e| e.kind).collect()
    }
}

#[async_trait]
impl AlertSink for RecordingSink {
    async fn emit(&self, event: &ChangeEvent, _item: &Item) -> Result<(), AlertError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Configuration with no pacing delays, pointing at the mock server
pub fn test_config(base_url: &str) -> Config {
    parse_config(&format!(
        r#"
[site]
base-url = "{base_url}"

[client]
request-timeout-secs = 5

[crawler]
max-pages = 3
speed-profile = "fast"
max-retries = 1
backoff-base-ms = 1
max-empty-pages = 1

[profiles.fast]
min-delay-ms = 0
max-delay-ms = 0
concurrency = 2

[profiles.slow]
min-delay-ms = 0
max-delay-ms = 0
concurrency = 1

[storage]
database-path = "unused.db"
"#
    ))
    .unwrap()
}

/// Item page markup with a title and an optional price
pub fn item_page(title: &str, price: Option<&str>) -> String {
    match price {
        Some(price) => format!(
            r#"<html><head><title>{title} | CDON</title></head><body><main>
               <h1>{title}</h1>
               <div class="product-price"><span class="price">{price} €</span></div>
               <div class="stock-status">Varastossa</div>
               </main></body></html>"#
        ),
        None => format!(
            r#"<html><body><main>
               <h1>{title}</h1>
               <div class="availability">Loppu varastosta</div>
               </main></body></html>"#
        ),
    }
}

/// Serves `html` at `item_path` on the mock server
pub async fn mount_page(server: &MockServer, item_path: &str, html: &str) {
    Mock::given(method("GET"))
        .and(path(item_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(html.to_string())
                .insert_header("content-type", "text/html; charset=utf-8"),
        )
        .mount(server)
        .await;
}

/// Listing markup linking to the given item paths
pub fn listing_page(base_url: &str, item_paths: &[&str]) -> String {
    let links: String = item_paths
        .iter()
        .map(|p| format!(r#"<div class="product"><a href="{}{}">item</a></div>"#, base_url, p))
        .collect();
    format!("<html><body><main>{}</main></body></html>", links)
}
