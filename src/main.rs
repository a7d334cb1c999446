// src/main.rs

//! IPO Board CLI
//!
//! Builds the metadata cache from the scraper's data tree and runs one
//! query against it, printing the JSON payload a service endpoint would
//! return. The `watch` command keeps the process alive and refreshes the
//! cache on the configured interval.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;

use ipo_board::cache::CacheManager;
use ipo_board::config::Config;
use ipo_board::error::Result;
use ipo_board::query::{QueryService, parse_fields};
use ipo_board::storage::LocalStore;

#[derive(Parser, Debug)]
#[command(
    name = "ipo-board",
    version = "1.0.0",
    about = "IPO metadata cache and query engine"
)]

/// CLI Arguments
struct Cli {
    #[arg(short, long, default_value = "data/config.toml")]
    config: String,

    /// Override the configured data directory
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// CLI Commands
#[derive(Subcommand, Debug)]
enum Command {
    /// Years with scraped data, newest first
    Years,
    /// List records, all years or one year
    List {
        #[arg(long)]
        year: Option<i32>,
    },
    /// Full detail document for one IPO
    Detail {
        slug: String,
        /// Comma-separated dot paths to project, e.g. "about_company.description"
        #[arg(long)]
        fields: Option<String>,
    },
    /// Records in one lifecycle status (upcoming, open, closed)
    Status { status: String },
    /// Records opening, closing, or listing today
    Today,
    /// Search names and current-year descriptions
    Search { query: String },
    /// Per-status counts and samples for the current year
    Overview {
        /// Cap each status list; 0 means unbounded
        #[arg(long, default_value_t = 0)]
        limit: usize,
    },
    /// Records listing on a given exchange, e.g. "NSE SME"
    ListingType { listing_type: String },
    /// Rebuild the index and drop all cached details
    Refresh,
    /// Stay up and refresh the cache on the configured interval
    Watch,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Main entry point
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The logger must be up before config loading so a broken config file
    // warns visibly instead of silently falling back to defaults
    let (mut config, config_err) = match Config::load(&cli.config) {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };
    env_logger::Builder::new()
        .parse_filters(&config.logging.level)
        .init();
    if let Some(e) = config_err {
        log::warn!("Config load failed from {:?}: {e}. Using defaults.", cli.config);
    }

    if let Some(dir) = cli.data_dir {
        config.data.dir = dir;
    }
    config.validate()?;

    let store = Arc::new(LocalStore::new(&config.data.dir));
    let manager = Arc::new(CacheManager::new(store, config.cache.clone()));
    manager.rebuild().await?;
    let service = QueryService::new(Arc::clone(&manager), config.cache.search_concurrency);

    match cli.command {
        Command::Years => print_json(&service.list_years().await)?,
        Command::List { year: Some(year) } => print_json(&service.list_by_year(year).await?)?,
        Command::List { year: None } => print_json(&service.list_all().await)?,
        Command::Detail { slug, fields } => {
            let fields = fields.as_deref().map(parse_fields).unwrap_or_default();
            print_json(&service.get_detail(&slug, &fields).await?)?;
        }
        Command::Status { status } => print_json(&service.list_by_status(&status).await?)?,
        Command::Today => print_json(&service.today().await)?,
        Command::Search { query } => print_json(&service.search(&query).await?)?,
        Command::Overview { limit } => {
            let limit = (limit > 0).then_some(limit);
            print_json(&service.overview(limit).await)?;
        }
        Command::ListingType { listing_type } => {
            print_json(&service.list_by_listing_type(&listing_type).await)?;
        }
        Command::Refresh => print_json(&service.clear_cache().await?)?,
        Command::Watch => {
            let timer = manager.start_refresh_timer();
            log::info!(
                "Watching {:?}, refreshing every {}s",
                config.data.dir,
                config.cache.refresh_interval_secs
            );
            timer.await.ok();
        }
    }

    Ok(())
}
