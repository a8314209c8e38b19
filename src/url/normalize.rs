use crate::UrlError;
use url::Url;

/// Canonicalizes an item URL
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Only http and https are accepted
/// 3. Lowercase the host
/// 4. Remove the query and the fragment
/// 5. Collapse repeated slashes and end the path with a slash
///
/// # Arguments
///
/// * `url_str` - The URL string to canonicalize
///
/// # Returns
///
/// * `Ok(Url)` - Canonical URL
/// * `Err(UrlError)` - Failed to parse the URL
///
/// # Examples
///
/// ```
/// use shelfwatch::url::canonical_item_url;
///
/// let url = canonical_item_url("https://CDON.fi/tuote/heat-1a2b3c4d?ref=x#top").unwrap();
/// assert_eq!(url.as_str(), "https://cdon.fi/tuote/heat-1a2b3c4d/");
/// ```
pub fn canonical_item_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    let host = url.host_str().ok_or(UrlError::MissingHost)?.to_lowercase();
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Parse(format!("{}: {}", url_str, e)))?;

    let path = normalize_path(url.path());
    url.set_path(&path);
    url.set_query(None);
    url.set_fragment(None);

    Ok(url)
}

/// Collapses empty segments and appends a trailing slash
fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return "/".to_string();
    }
    format!("/{}/", segments.join("/"))
}

/// Resolves a link found on a page against the page URL
///
/// Returns `None` for links that cannot point at a page (`javascript:`,
/// `mailto:`, fragments) or that fail to parse.
pub fn resolve_link(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
    {
        return None;
    }

    let resolved = base.join(href).ok()?;
    match resolved.scheme() {
        "http" | "https" => Some(resolved),
        _ => None,
    }
}

/// Builds the URL of one listing page
///
/// Page 1 is the root URL itself; later pages set `param=n` in the query,
/// replacing any value already present.
pub fn listing_page_url(root: &Url, param: &str, page: u32) -> Url {
    if page <= 1 {
        return root.clone();
    }

    let kept: Vec<(String, String)> = root
        .query_pairs()
        .filter(|(key, _)| key != param)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut url = root.clone();
    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (key, value) in &kept {
            pairs.append_pair(key, value);
        }
        pairs.append_pair(param, &page.to_string());
    }
    url
}
