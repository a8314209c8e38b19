//! Static page client
//!
//! Item pages carry their price and title in the server-rendered HTML, so a
//! plain GET is enough. The client still looks like a desktop browser:
//! - Browser user agent and `Accept`/`Accept-Language` headers
//! - `DNT` and `Upgrade-Insecure-Requests` like a real navigation
//! - Compressed transfer (gzip, brotli)
//! - A bounded per-request timeout, reported as a network failure

use crate::config::ClientConfig;
use crate::FetchError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, DNT, UPGRADE_INSECURE_REQUESTS};
use reqwest::Client;
use std::time::Duration;
use url::Url;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Port for plain HTTP page downloads
#[async_trait]
pub trait StaticPageClient: Send + Sync {
    /// Downloads the raw HTML of a page
    async fn get(&self, url: &Url) -> Result<String, FetchError>;
}

/// Builds an HTTP client with browser-like defaults
///
/// # Arguments
///
/// * `config` - The fetch client configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &ClientConfig) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
    if let Ok(language) = HeaderValue::from_str(&config.accept_language) {
        headers.insert(ACCEPT_LANGUAGE, language);
    }
    headers.insert(DNT, HeaderValue::from_static("1"));
    headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));

    Client::builder()
        .user_agent(config.user_agent.clone())
        .default_headers(headers)
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(config.request_timeout_secs.min(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// `StaticPageClient` backed by reqwest
#[derive(Debug, Clone)]
pub struct HttpPageClient {
    client: Client,
}

impl HttpPageClient {
    pub fn new(config: &ClientConfig) -> Result<Self, FetchError> {
        Ok(Self {
            client: build_http_client(config)?,
        })
    }
}

#[async_trait]
impl StaticPageClient for HttpPageClient {
    async fn get(&self, url: &Url) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| classify(url, e))
    }
}

fn classify(url: &Url, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Http {
            url: url.to_string(),
            source: error,
        }
    }
}
