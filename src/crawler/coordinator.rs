//! Crawl coordinator - discovery run orchestration
//!
//! This module contains the discovery loop that ties the pipeline together:
//! - Acquiring one browser session for the whole run
//! - Walking every category root through a `ListingCrawler`
//! - Deduplicating references by external id within the run
//! - Parsing item pages concurrently within the profile's limit
//! - Upserting items and appending one observation per parsed item

use crate::cancel::{cancellable, CancellationToken};
use crate::client::RenderBackend;
use crate::config::{Config, SpeedProfile};
use crate::crawler::listing::{ListingCrawler, ListingOptions};
use crate::crawler::summary::{CrawlSummary, RunError, RunErrorKind};
use crate::crawler::throttle::Throttle;
use crate::model::{ItemRecord, ItemRef};
use crate::parser::ItemParser;
use crate::storage::Repository;
use crate::url::{canonical_item_url, item_external_id};
use crate::{ParseError, WatcherError};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use url::Url;

type ParseOutcome = (String, Result<ItemRecord, ParseError>);

/// Drives discovery runs
pub struct CrawlOrchestrator {
    config: Arc<Config>,
    backend: Arc<dyn RenderBackend>,
    parser: ItemParser,
    repository: Arc<dyn Repository>,
    listing: ListingOptions,
}

impl CrawlOrchestrator {
    /// Creates a new orchestrator
    ///
    /// # Arguments
    ///
    /// * `config` - The watcher configuration
    /// * `backend` - Launches the browser session of each run
    /// * `parser` - Item page parser (unthrottled; each run attaches its own pacing)
    /// * `repository` - Destination of items and observations
    pub fn new(
        config: Arc<Config>,
        backend: Arc<dyn RenderBackend>,
        parser: ItemParser,
        repository: Arc<dyn Repository>,
    ) -> Self {
        let listing = ListingOptions::from_config(&config.site, &config.crawler);
        Self {
            config,
            backend,
            parser,
            repository,
            listing,
        }
    }

    /// Runs one discovery pass over the given categories
    ///
    /// Per-page and per-item failures are recorded in the summary and the run
    /// continues. Only a browser that cannot be launched fails the run.
    ///
    /// # Arguments
    ///
    /// * `categories` - Category root URLs, walked in order
    /// * `max_pages` - Listing pages per category
    /// * `profile` - Speed profile pacing both listing and item fetches
    /// * `cancel` - Token of this run
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlSummary)` - Counts and collected errors
    /// * `Err(WatcherError)` - The browser session could not be started
    pub async fn run(
        &self,
        categories: &[Url],
        max_pages: u32,
        profile: SpeedProfile,
        cancel: &CancellationToken,
    ) -> Result<CrawlSummary, WatcherError> {
        let settings = self.config.speed_settings(profile);
        let start_time = Instant::now();
        let mut summary = CrawlSummary::default();

        info!(
            categories = categories.len(),
            max_pages,
            profile = %profile,
            "Starting crawl run"
        );

        let session = match cancellable(cancel, self.backend.launch()).await {
            Some(session) => session?,
            None => {
                summary.cancelled = true;
                return Ok(summary);
            }
        };

        let listing_throttle = Arc::new(Throttle::new(settings));
        let parser = self
            .parser
            .clone()
            .with_throttle(Arc::new(Throttle::new(settings)));
        let limit = settings.concurrency.max(1);
        let mut visited: HashSet<String> = HashSet::new();

        for root in categories {
            if cancel.is_cancelled() {
                break;
            }
            info!(root = %root, "Crawling category");

            let mut listing = ListingCrawler::new(
                session.as_ref(),
                listing_throttle.clone(),
                &self.listing,
                root.clone(),
                max_pages,
                cancel.clone(),
            );
            let mut in_flight: JoinSet<ParseOutcome> = JoinSet::new();
            let mut listing_done = false;

            loop {
                while !listing_done && in_flight.len() < limit {
                    match listing.next().await {
                        Some(item_ref) => {
                            summary.discovered += 1;
                            if !visited.insert(self.visit_key(&item_ref)) {
                                summary.duplicates += 1;
                                continue;
                            }
                            let parser = parser.clone();
                            in_flight.spawn(async move {
                                let result = match Url::parse(&item_ref.url) {
                                    Ok(url) => parser.parse(&url).await,
                                    Err(e) => Err(ParseError::fetch(&item_ref.url, e.to_string())),
                                };
                                (item_ref.url, result)
                            });
                        }
                        None => listing_done = true,
                    }
                }

                let joined = match cancellable(cancel, in_flight.join_next()).await {
                    Some(Some(joined)) => joined,
                    Some(None) => break,
                    None => break,
                };

                match joined {
                    Ok((url, result)) => self.persist(&url, result, &mut visited, &mut summary),
                    Err(e) => {
                        summary.failed += 1;
                        summary
                            .errors
                            .push(RunError::new(root.as_str(), RunErrorKind::Fetch, e.to_string()));
                    }
                }
            }

            summary.pages += listing.pages_loaded() as usize;
            if let Some(error) = listing.take_error() {
                summary.errors.push(error);
            }
        }

        // Dropping the session releases the browser
        drop(session);
        summary.cancelled = cancel.is_cancelled();

        info!(
            discovered = summary.discovered,
            duplicates = summary.duplicates,
            parsed = summary.parsed,
            persisted = summary.persisted,
            failed = summary.failed,
            errors = summary.errors.len(),
            cancelled = summary.cancelled,
            "Crawl completed in {:?}",
            start_time.elapsed()
        );

        Ok(summary)
    }

    /// Key a reference is deduplicated by within one run
    fn visit_key(&self, item_ref: &ItemRef) -> String {
        if let Some(id) = &item_ref.external_id {
            return id.clone();
        }
        match canonical_item_url(&item_ref.url) {
            Ok(url) => item_external_id(&url, &self.config.site.item_path),
            Err(_) => item_ref.url.clone(),
        }
    }

    /// Stores one parsed item together with a fresh observation
    fn persist(
        &self,
        url: &str,
        result: Result<ItemRecord, ParseError>,
        visited: &mut HashSet<String>,
        summary: &mut CrawlSummary,
    ) {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!(url, stage = %e.stage, error = %e.message, "Skipping item");
                summary.failed += 1;
                summary.errors.push(e.into());
                return;
            }
        };
        summary.parsed += 1;

        // A page can carry a different id than the link that led to it
        let link_key = self.visit_key_of_url(url);
        if record.external_id != link_key && !visited.insert(record.external_id.clone()) {
            debug!(url, external_id = %record.external_id, "Item already visited in this run");
            summary.duplicates += 1;
            return;
        }

        let stored = self.repository.upsert_item(&record).and_then(|item| {
            self.repository
                .append_price_observation(item.id, record.price, record.available, Utc::now())
                .map(|observation| (item, observation))
        });

        match stored {
            Ok((item, observation)) => {
                debug!(
                    item_id = item.id,
                    external_id = %item.external_id,
                    observation_id = observation.id,
                    "Persisted item"
                );
                summary.persisted += 1;
            }
            Err(e) => {
                warn!(url, error = %e, "Failed to persist item");
                summary.failed += 1;
                summary.errors.push(RunError::repository(url, &e));
            }
        }
    }

    fn visit_key_of_url(&self, url: &str) -> String {
        self.visit_key(&ItemRef {
            url: url.to_string(),
            external_id: None,
        })
    }
}
