//! Watcher facade
//!
//! `Watcher` wires the clients, the repository and the alert sink together
//! from one configuration value and exposes the operations the CLI needs:
//! discovery runs, monitor cycles, single-page parsing and watch list upkeep.

use crate::alert::{AlertSink, LogAlertSink};
use crate::cancel::CancellationToken;
use crate::client::{HeadlessChrome, HttpPageClient, RenderBackend, StaticPageClient};
use crate::config::{Config, SpeedProfile};
use crate::crawler::{CrawlOrchestrator, CrawlSummary};
use crate::model::{ChangeEvent, Item, ItemRecord, Price, WatchEntry};
use crate::monitor::{MonitorStrategy, MonitorSummary, PriceMonitor};
use crate::parser::ItemParser;
use crate::storage::{open_repository, Repository};
use crate::url::canonical_item_url;
use crate::{ParseError, WatcherError};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use url::Url;

/// Entry point to the watcher's operations
pub struct Watcher {
    config: Arc<Config>,
    repository: Arc<dyn Repository>,
    parser: ItemParser,
    crawler: CrawlOrchestrator,
    monitor: PriceMonitor,
}

impl Watcher {
    /// Builds a watcher with the real HTTP client, headless browser, SQLite
    /// repository and logging alert sink
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built or the database cannot be opened.
    pub fn from_config(config: Config) -> Result<Self, WatcherError> {
        let static_client = Arc::new(HttpPageClient::new(&config.client)?);
        let backend = Arc::new(HeadlessChrome::new(&config.client));
        let repository = Arc::new(open_repository(Path::new(&config.storage.database_path))?);
        info!(database = %config.storage.database_path, "Opened repository");

        Ok(Self::with_parts(
            config,
            repository,
            static_client,
            backend,
            Arc::new(LogAlertSink),
        ))
    }

    /// Builds a watcher from explicit collaborators
    pub fn with_parts(
        config: Config,
        repository: Arc<dyn Repository>,
        static_client: Arc<dyn StaticPageClient>,
        backend: Arc<dyn RenderBackend>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        let config = Arc::new(config);
        let parser = ItemParser::new(static_client, config.site.item_path.clone());
        let crawler = CrawlOrchestrator::new(
            config.clone(),
            backend,
            parser.clone(),
            repository.clone(),
        );
        let monitor = PriceMonitor::new(
            parser.clone(),
            repository.clone(),
            alerts,
            config.speed_settings(config.monitor.speed_profile),
        );

        Self {
            config,
            repository,
            parser,
            crawler,
            monitor,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn repository(&self) -> &dyn Repository {
        self.repository.as_ref()
    }

    // ===== Core Operations =====

    /// Runs one discovery pass
    ///
    /// See [`CrawlOrchestrator::run`].
    pub async fn run_crawl(
        &self,
        categories: &[Url],
        max_pages: u32,
        profile: SpeedProfile,
        cancel: &CancellationToken,
    ) -> Result<CrawlSummary, WatcherError> {
        self.crawler.run(categories, max_pages, profile, cancel).await
    }

    /// Runs one monitor cycle
    pub async fn run_monitor_cycle(
        &self,
        strategy: &MonitorStrategy,
        cancel: &CancellationToken,
    ) -> Result<MonitorSummary, WatcherError> {
        self.monitor.run_cycle(strategy, cancel).await
    }

    /// Runs monitor cycles every `interval-minutes` until cancelled
    pub async fn run_monitor_loop<F>(
        &self,
        strategy: &MonitorStrategy,
        cancel: &CancellationToken,
        on_cycle: F,
    ) -> Result<usize, WatcherError>
    where
        F: FnMut(&MonitorSummary),
    {
        let interval = Duration::from_secs(self.config.monitor.interval_minutes.saturating_mul(60));
        self.monitor
            .run_repeating(strategy, interval, cancel, on_cycle)
            .await
    }

    /// Parses one item page without storing anything
    ///
    /// `url` may be absolute or relative to `base-url`. Input that does not
    /// resolve to an http(s) item URL is reported at the extract stage with a
    /// "not an item URL" message; nothing is fetched in that case.
    pub async fn parse_item(&self, url: &str) -> Result<ItemRecord, ParseError> {
        let canonical = self
            .config
            .site
            .resolve(url)
            .map_err(|e| e.to_string())
            .and_then(|resolved| canonical_item_url(resolved.as_str()).map_err(|e| e.to_string()))
            .map_err(|e| ParseError::extract(url, format!("not an item URL: {}", e)))?;
        self.parser.parse(&canonical).await
    }

    // ===== Configuration Helpers =====

    /// Strategy from the `[monitor]` section
    pub fn default_strategy(&self) -> MonitorStrategy {
        MonitorStrategy {
            scope: self.config.monitor.scope,
            include_excluded: self.config.monitor.include_excluded,
        }
    }

    /// Category roots from the `[[categories]]` tables
    pub fn configured_categories(&self) -> Result<Vec<Url>, WatcherError> {
        let urls: Vec<&str> = self
            .config
            .categories
            .iter()
            .map(|category| category.url.as_str())
            .collect();
        self.category_roots(&urls)
    }

    /// Resolves category roots given as absolute or site-relative URLs
    pub fn category_roots<S: AsRef<str>>(&self, urls: &[S]) -> Result<Vec<Url>, WatcherError> {
        urls.iter()
            .map(|url| self.config.site.resolve(url.as_ref()).map_err(WatcherError::from))
            .collect()
    }

    // ===== Watch List and Exclusions =====

    /// Looks up a stored item by external id
    pub fn find_item(&self, external_id: &str) -> Result<Item, WatcherError> {
        self.repository
            .find_item_by_external_id(external_id)?
            .ok_or_else(|| WatcherError::UnknownItem(external_id.to_string()))
    }

    pub fn watch(&self, external_id: &str, target: Option<Price>) -> Result<WatchEntry, WatcherError> {
        let item = self.find_item(external_id)?;
        Ok(self.repository.set_watch(item.id, target)?)
    }

    pub fn unwatch(&self, external_id: &str) -> Result<bool, WatcherError> {
        let item = self.find_item(external_id)?;
        Ok(self.repository.remove_watch(item.id)?)
    }

    pub fn exclude(&self, external_id: &str) -> Result<bool, WatcherError> {
        let item = self.find_item(external_id)?;
        Ok(self.repository.exclude(item.id)?)
    }

    pub fn include(&self, external_id: &str) -> Result<bool, WatcherError> {
        let item = self.find_item(external_id)?;
        Ok(self.repository.include(item.id)?)
    }

    /// Undelivered change events with their items
    pub fn pending_alerts(&self) -> Result<Vec<(ChangeEvent, Item)>, WatcherError> {
        let mut alerts = Vec::new();
        for event in self.repository.pending_events()? {
            let item = self.repository.get_item(event.item_id)?;
            alerts.push((event, item));
        }
        Ok(alerts)
    }
}
