use crate::config::profile::SpeedProfile;
use crate::config::types::{
    CategoryEntry, ClientConfig, Config, CrawlerConfig, MonitorConfig, SiteConfig, StorageConfig,
};
use crate::ConfigError;
use url::Url;

const MAX_CONCURRENCY: usize = 16;
const MAX_RETRIES: u32 = 10;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site_config(&config.site)?;
    validate_client_config(&config.client)?;
    validate_crawler_config(&config.crawler)?;
    validate_profiles(config)?;
    validate_monitor_config(&config.monitor)?;
    validate_storage_config(&config.storage)?;
    validate_categories(&config.site, &config.categories)?;
    Ok(())
}

/// Validates site layout configuration
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    validate_http_url("base-url", &config.base_url)?;

    if config.item_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "item-path cannot be empty".to_string(),
        ));
    }

    if config.page_param.trim().is_empty() {
        return Err(ConfigError::Validation(
            "page-param cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates fetch client configuration
fn validate_client_config(config: &ClientConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "request-timeout-secs must be >= 1, got {}",
            config.request_timeout_secs
        )));
    }

    if config.render_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "render-timeout-secs must be >= 1, got {}",
            config.render_timeout_secs
        )));
    }

    if config.browser_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "browser-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates listing crawl configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max-pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    if config.max_retries > MAX_RETRIES {
        return Err(ConfigError::Validation(format!(
            "max-retries must be at most {}, got {}",
            MAX_RETRIES, config.max_retries
        )));
    }

    if config.max_empty_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max-empty-pages must be >= 1, got {}",
            config.max_empty_pages
        )));
    }

    Ok(())
}

/// Validates every speed profile after overrides are applied
fn validate_profiles(config: &Config) -> Result<(), ConfigError> {
    for profile in [SpeedProfile::Fast, SpeedProfile::Moderate, SpeedProfile::Slow] {
        let settings = config.speed_settings(profile);

        if settings.concurrency < 1 || settings.concurrency > MAX_CONCURRENCY {
            return Err(ConfigError::Validation(format!(
                "concurrency of profile '{}' must be between 1 and {}, got {}",
                profile, MAX_CONCURRENCY, settings.concurrency
            )));
        }

        if settings.min_delay > settings.max_delay {
            return Err(ConfigError::Validation(format!(
                "min-delay-ms of profile '{}' exceeds max-delay-ms ({:?} > {:?})",
                profile, settings.min_delay, settings.max_delay
            )));
        }
    }

    Ok(())
}

/// Validates price monitor configuration
fn validate_monitor_config(config: &MonitorConfig) -> Result<(), ConfigError> {
    if config.interval_minutes < 1 {
        return Err(ConfigError::Validation(format!(
            "interval-minutes must be >= 1, got {}",
            config.interval_minutes
        )));
    }
    Ok(())
}

/// Validates storage configuration
fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates category roots
fn validate_categories(site: &SiteConfig, categories: &[CategoryEntry]) -> Result<(), ConfigError> {
    for entry in categories {
        if entry.name.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "Category with url '{}' must have a name",
                entry.url
            )));
        }
        if entry.url.trim().is_empty() {
            return Err(ConfigError::InvalidUrl(format!(
                "Category '{}' has an empty url",
                entry.name
            )));
        }
        site.resolve(&entry.url)?;
    }
    Ok(())
}

/// Checks that a value is an absolute http(s) URL
fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::Validation(format!(
            "{} '{}' must use http or https",
            field, value
        )));
    }

    Ok(())
}
