//! Shelfwatch main entry point
//!
//! This is the command-line interface for the Shelfwatch catalog price watcher.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use shelfwatch::cancel::{cancel_on_ctrl_c, CancellationToken};
use shelfwatch::config::load_config_with_hash;
use shelfwatch::model::{FormatTag, Price};
use shelfwatch::monitor::{MonitorScope, MonitorStrategy};
use shelfwatch::output::{
    format_catalog, format_crawl_summary, format_deals, format_events, format_history,
    format_item_record, format_monitor_summary, load_statistics, print_statistics,
};
use shelfwatch::{SpeedProfile, Watcher};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Shelfwatch: a catalog price watcher
///
/// Shelfwatch discovers items on a vendor's category listings, keeps a price
/// history for each of them and raises alerts when a watched price drops,
/// reaches its target or comes back in stock.
#[derive(Parser, Debug)]
#[command(name = "shelfwatch")]
#[command(version)]
#[command(about = "A catalog price watcher", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Walk category listings and record every item found
    Crawl {
        /// Category root URL, absolute or relative to base-url (repeatable);
        /// defaults to the configured categories
        #[arg(long = "category", value_name = "URL")]
        categories: Vec<String>,

        /// Listing pages per category
        #[arg(long)]
        max_pages: Option<u32>,

        /// Speed profile: fast, moderate or slow
        #[arg(long)]
        profile: Option<SpeedProfile>,
    },

    /// Re-check monitored items and raise alerts
    Monitor {
        /// Items to check: watchlist or catalog
        #[arg(long)]
        scope: Option<MonitorScope>,

        /// Also check excluded items
        #[arg(long)]
        include_excluded: bool,

        /// Keep running a cycle every interval-minutes until interrupted
        #[arg(long)]
        repeat: bool,
    },

    /// Parse one item page and print the result without storing it
    Parse {
        #[arg(value_name = "URL")]
        url: String,
    },

    /// Add an item to the watch list
    Watch {
        #[arg(value_name = "EXTERNAL_ID")]
        external_id: String,

        /// Target price, e.g. 14.90
        #[arg(value_name = "TARGET")]
        target: Option<Price>,
    },

    /// Remove an item from the watch list
    Unwatch {
        #[arg(value_name = "EXTERNAL_ID")]
        external_id: String,
    },

    /// Hide an item from the cheapest view
    Exclude {
        #[arg(value_name = "EXTERNAL_ID")]
        external_id: String,
    },

    /// Show a previously excluded item again
    Include {
        #[arg(value_name = "EXTERNAL_ID")]
        external_id: String,
    },

    /// List the cheapest items
    Cheapest {
        /// Only this format: dvd, blu-ray or 4k
        #[arg(long, value_parser = parse_format)]
        format: Option<FormatTag>,

        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// List items whose latest price dropped
    Deals {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Show the watch list with current and historical prices
    Watchlist,

    /// Show the price history of an item
    History {
        #[arg(value_name = "EXTERNAL_ID")]
        external_id: String,
    },

    /// List alerts that have not been delivered yet
    Alerts,

    /// Show catalog statistics
    Stats,
}

fn parse_format(value: &str) -> Result<FormatTag, String> {
    FormatTag::from_db_string(value).ok_or_else(|| format!("unknown format '{}'", value))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let watcher = Watcher::from_config(config).context("failed to set up watcher")?;

    match cli.command {
        Command::Crawl {
            categories,
            max_pages,
            profile,
        } => handle_crawl(&watcher, categories, max_pages, profile, &config_hash).await,
        Command::Monitor {
            scope,
            include_excluded,
            repeat,
        } => handle_monitor(&watcher, scope, include_excluded, repeat).await,
        Command::Parse { url } => {
            let record = watcher.parse_item(&url).await?;
            print!("{}", format_item_record(&record));
            Ok(())
        }
        Command::Watch {
            external_id,
            target,
        } => {
            let entry = watcher.watch(&external_id, target)?;
            match entry.target_price {
                Some(target) => println!("Watching {} (target {})", external_id, target),
                None => println!("Watching {}", external_id),
            }
            Ok(())
        }
        Command::Unwatch { external_id } => {
            if watcher.unwatch(&external_id)? {
                println!("Removed {} from the watch list", external_id);
            } else {
                println!("{} was not on the watch list", external_id);
            }
            Ok(())
        }
        Command::Exclude { external_id } => {
            if watcher.exclude(&external_id)? {
                println!("Excluded {}", external_id);
            } else {
                println!("{} was already excluded", external_id);
            }
            Ok(())
        }
        Command::Include { external_id } => {
            if watcher.include(&external_id)? {
                println!("Included {}", external_id);
            } else {
                println!("{} was not excluded", external_id);
            }
            Ok(())
        }
        Command::Cheapest { format, limit } => {
            let entries = watcher.repository().cheapest(format, limit)?;
            let title = match format {
                Some(format) => format!("Cheapest {}", format),
                None => "Cheapest".to_string(),
            };
            print!("{}", format_catalog(&title, &entries));
            Ok(())
        }
        Command::Deals { limit } => {
            let deals = watcher.repository().deals(limit)?;
            print!("{}", format_deals(&deals));
            Ok(())
        }
        Command::Watchlist => {
            let entries = watcher.repository().watchlist()?;
            print!("{}", format_catalog("Watch list", &entries));
            Ok(())
        }
        Command::History { external_id } => {
            let item = watcher.find_item(&external_id)?;
            let history = watcher.repository().price_history(item.id)?;
            print!("{}", format_history(&item, &history));
            Ok(())
        }
        Command::Alerts => {
            let alerts = watcher.pending_alerts()?;
            print!("{}", format_events(&alerts));
            Ok(())
        }
        Command::Stats => {
            println!("Database: {}\n", watcher.config().storage.database_path);
            let stats = load_statistics(watcher.repository())?;
            print_statistics(&stats);
            Ok(())
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("shelfwatch=info,warn"),
            1 => EnvFilter::new("shelfwatch=debug,info"),
            2 => EnvFilter::new("shelfwatch=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the crawl command
async fn handle_crawl(
    watcher: &Watcher,
    categories: Vec<String>,
    max_pages: Option<u32>,
    profile: Option<SpeedProfile>,
    config_hash: &str,
) -> anyhow::Result<()> {
    let categories = if categories.is_empty() {
        watcher.configured_categories()?
    } else {
        watcher.category_roots(&categories)?
    };
    if categories.is_empty() {
        bail!("no categories to crawl: pass --category or add [[categories]] to the config");
    }

    let crawler_config = &watcher.config().crawler;
    let max_pages = max_pages.unwrap_or(crawler_config.max_pages).max(1);
    let profile = profile.unwrap_or(crawler_config.speed_profile);

    let cancel = CancellationToken::new();
    let interrupt = cancel_on_ctrl_c(cancel.clone());

    let result = watcher
        .run_crawl(&categories, max_pages, profile, &cancel)
        .await;
    cancel.cancel();
    let _ = interrupt.await;

    match result {
        Ok(summary) => {
            print!("{}", format_crawl_summary(&summary, config_hash));
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}

/// Handles the monitor command
async fn handle_monitor(
    watcher: &Watcher,
    scope: Option<MonitorScope>,
    include_excluded: bool,
    repeat: bool,
) -> anyhow::Result<()> {
    let mut strategy: MonitorStrategy = watcher.default_strategy();
    if let Some(scope) = scope {
        strategy.scope = scope;
    }
    if include_excluded {
        strategy.include_excluded = true;
    }

    let cancel = CancellationToken::new();
    let interrupt = cancel_on_ctrl_c(cancel.clone());

    let result = if repeat {
        watcher
            .run_monitor_loop(&strategy, &cancel, |summary| {
                print!("{}", format_monitor_summary(summary));
            })
            .await
            .map(|cycles| tracing::info!("Monitor stopped after {} cycles", cycles))
    } else {
        watcher
            .run_monitor_cycle(&strategy, &cancel)
            .await
            .map(|summary| print!("{}", format_monitor_summary(&summary)))
    };
    cancel.cancel();
    let _ = interrupt.await;

    result.map_err(|e| {
        tracing::error!("Monitor failed: {}", e);
        e.into()
    })
}
