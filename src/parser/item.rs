use crate::client::StaticPageClient;
use crate::crawler::Throttle;
use crate::model::ItemRecord;
use crate::parser::extract::parse_item_html;
use crate::ParseError;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Fetches item pages and turns them into records
///
/// The parser has no persistence side effects. When a throttle is attached,
/// every download waits for it first.
#[derive(Clone)]
pub struct ItemParser {
    client: Arc<dyn StaticPageClient>,
    item_path: String,
    throttle: Option<Arc<Throttle>>,
}

impl ItemParser {
    pub fn new(client: Arc<dyn StaticPageClient>, item_path: impl Into<String>) -> Self {
        Self {
            client,
            item_path: item_path.into(),
            throttle: None,
        }
    }

    /// Returns a parser whose downloads are paced by `throttle`
    pub fn with_throttle(mut self, throttle: Arc<Throttle>) -> Self {
        self.throttle = Some(throttle);
        self
    }

    /// Downloads and parses one item page
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute item URL
    ///
    /// # Returns
    ///
    /// * `Ok(ItemRecord)` - Parsed record
    /// * `Err(ParseError)` - Stage `Fetch` for download failures, `Extract` for unrecognized pages
    pub async fn parse(&self, url: &Url) -> Result<ItemRecord, ParseError> {
        let html = {
            let _permit = match &self.throttle {
                Some(throttle) => Some(throttle.acquire().await),
                None => None,
            };
            self.client
                .get(url)
                .await
                .map_err(|e| ParseError::fetch(url.as_str(), e.to_string()))?
        };

        let record = parse_item_html(&html, url, &self.item_path)?;
        debug!(
            url = %url,
            external_id = %record.external_id,
            price = ?record.price.map(|p| p.cents()),
            available = record.available,
            "Parsed item page"
        );
        Ok(record)
    }
}
