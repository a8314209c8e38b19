//! Configuration module for Shelfwatch
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! The configuration is loaded once and passed by reference to everything that
//! needs it.
//!
//! # Example
//!
//! ```no_run
//! use shelfwatch::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("shelfwatch.toml")).unwrap();
//! println!("Crawling {} pages per category", config.crawler.max_pages);
//! ```

mod parser;
mod profile;
mod types;
mod validation;

// Re-export types
pub use profile::{ProfileOverride, SpeedProfile, SpeedSettings};
pub use types::{
    CategoryEntry, ClientConfig, Config, CrawlerConfig, MonitorConfig, ProfilesConfig, SiteConfig,
    StorageConfig,
};

// Re-export parser functions
pub use parser::{config_fingerprint, load_config, load_config_with_hash, parse_config};
