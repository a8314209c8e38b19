//! Paginated category listings
//!
//! A `ListingCrawler` walks one category root page by page through the
//! browser session and hands out item references lazily. It never writes to
//! the repository.

use crate::cancel::{cancellable, sleep_or_cancel, CancellationToken};
use crate::client::RenderedPageClient;
use crate::config::{CrawlerConfig, SiteConfig};
use crate::crawler::summary::RunError;
use crate::crawler::throttle::Throttle;
use crate::model::ItemRef;
use crate::parser::extract_item_refs;
use crate::url::listing_page_url;
use crate::RenderError;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Pagination and retry settings shared by every category of a run
#[derive(Debug, Clone)]
pub struct ListingOptions {
    pub page_param: String,
    pub item_path: String,
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub max_empty_pages: u32,
}

impl ListingOptions {
    pub fn from_config(site: &SiteConfig, crawler: &CrawlerConfig) -> Self {
        Self {
            page_param: site.page_param.clone(),
            item_path: site.item_path.clone(),
            max_retries: crawler.max_retries,
            backoff_base: Duration::from_millis(crawler.backoff_base_ms),
            max_empty_pages: crawler.max_empty_pages.max(1),
        }
    }
}

/// Lazy, finite sequence of item references from one category
///
/// Pages are rendered only when the buffered references run out. Once the
/// crawler has returned `None` it stays exhausted.
pub struct ListingCrawler<'a> {
    session: &'a dyn RenderedPageClient,
    throttle: Arc<Throttle>,
    options: &'a ListingOptions,
    cancel: CancellationToken,
    root: Url,
    max_pages: u32,
    next_page: u32,
    pages_loaded: u32,
    empty_streak: u32,
    buffer: VecDeque<ItemRef>,
    seen: HashSet<ItemRef>,
    error: Option<RunError>,
    finished: bool,
}

impl<'a> ListingCrawler<'a> {
    /// Creates a crawler for one category root
    ///
    /// # Arguments
    ///
    /// * `session` - Browser session of the current run
    /// * `throttle` - Pacing shared by every listing page of the run
    /// * `options` - Pagination and retry settings
    /// * `root` - Category root, which is also page 1
    /// * `max_pages` - Upper bound on rendered pages (at least 1)
    /// * `cancel` - Token of the current run
    pub fn new(
        session: &'a dyn RenderedPageClient,
        throttle: Arc<Throttle>,
        options: &'a ListingOptions,
        root: Url,
        max_pages: u32,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            session,
            throttle,
            options,
            cancel,
            root,
            max_pages: max_pages.max(1),
            next_page: 1,
            pages_loaded: 0,
            empty_streak: 0,
            buffer: VecDeque::new(),
            seen: HashSet::new(),
            error: None,
            finished: false,
        }
    }

    /// Returns the next item reference, rendering further pages as needed
    pub async fn next(&mut self) -> Option<ItemRef> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Some(item);
            }
            if self.finished {
                return None;
            }
            if self.next_page > self.max_pages || self.cancel.is_cancelled() {
                self.finished = true;
                continue;
            }

            let page = self.next_page;
            self.next_page += 1;
            let url = listing_page_url(&self.root, &self.options.page_param, page);

            match self.load_page(&url).await {
                Ok(Some(html)) => self.accept_page(page, &url, &html),
                Ok(None) => {
                    debug!(url = %url, "Listing crawl cancelled");
                    self.finished = true;
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "Listing page failed, ending category");
                    self.error = Some(RunError::listing(url.as_str(), &e));
                    self.finished = true;
                }
            }
        }
    }

    /// Takes the error that ended this category early, if any
    pub fn take_error(&mut self) -> Option<RunError> {
        self.error.take()
    }

    /// Number of listing pages rendered so far
    pub fn pages_loaded(&self) -> u32 {
        self.pages_loaded
    }

    fn accept_page(&mut self, page: u32, url: &Url, html: &str) {
        self.pages_loaded += 1;

        let mut fresh = 0;
        for item in extract_item_refs(html, url, &self.options.item_path) {
            if self.seen.insert(item.clone()) {
                self.buffer.push_back(item);
                fresh += 1;
            }
        }
        debug!(url = %url, page, fresh, "Listing page rendered");

        if fresh == 0 {
            self.empty_streak += 1;
            if self.empty_streak >= self.options.max_empty_pages {
                info!(
                    root = %self.root,
                    page,
                    "No new items on {} consecutive pages, ending category",
                    self.empty_streak
                );
                self.finished = true;
            }
        } else {
            self.empty_streak = 0;
        }
    }

    /// Renders one listing page with bounded retries
    ///
    /// # Returns
    ///
    /// * `Ok(Some(html))` - Rendered page
    /// * `Ok(None)` - The run was cancelled
    /// * `Err(RenderError)` - The page failed on every attempt
    async fn load_page(&self, url: &Url) -> Result<Option<String>, RenderError> {
        let mut attempt = 0;
        loop {
            let permit = match cancellable(&self.cancel, self.throttle.acquire()).await {
                Some(permit) => permit,
                None => return Ok(None),
            };
            let result = cancellable(
                &self.cancel,
                self.session.render(url, self.throttle.settings()),
            )
            .await;
            drop(permit);

            let error = match result {
                None => return Ok(None),
                Some(Ok(html)) => return Ok(Some(html)),
                Some(Err(e)) => e,
            };

            if !error.is_transient() || attempt >= self.options.max_retries {
                return Err(error);
            }
            attempt += 1;
            let delay = backoff_delay(self.options.backoff_base, attempt);
            warn!(
                url = %url,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Listing page failed, retrying"
            );
            if !sleep_or_cancel(&self.cancel, delay).await {
                return Ok(None);
            }
        }
    }
}

/// Backoff before retry number `attempt` (1-based): `base * 2^(attempt - 1)`
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    base.saturating_mul(2_u32.pow(exponent))
}
