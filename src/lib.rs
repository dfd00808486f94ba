pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::core::cache::Store;
use crate::core::catalog::CatalogCache;
use crate::core::config::AppConfig;
use crate::core::result::ItemAction;
use crate::core::search::QueryOrchestrator;
use crate::core::watchlist::Watchlist;
use crate::providers::eastmoney::{EastmoneyCatalogSource, EastmoneyQuoteProvider};
use crate::providers::util::RetryPolicy;
use crate::store::KeyValueStore;
use crate::store::document::JsonDocument;
use crate::store::record::RecordStore;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const CATALOG_DOCUMENT: &str = "catalog.json";
const RECORDS_COLLECTION: &str = "records";

pub enum AppCommand {
    Search(String),
    Watch,
    Add(String),
    Remove(String),
    List,
    Item {
        code: String,
        action: Option<ItemAction>,
    },
    Refresh,
}

/// Builds the orchestrator with all of its collaborators from `config`.
pub fn build_orchestrator(config: &AppConfig) -> Result<QueryOrchestrator> {
    let data_path = config.default_data_path()?;
    debug!("Using data path {}", data_path.display());

    let client = reqwest::Client::builder()
        .user_agent("fundwatch/0.1")
        .timeout(Duration::from_secs(config.http.timeout_secs))
        .build()?;
    let retry = RetryPolicy::new(config.http.retries, config.http.retry_delay_ms);
    let eastmoney = &config.providers.eastmoney;

    let source = EastmoneyCatalogSource::new(&eastmoney.catalog_url, client.clone())
        .with_retry(retry);
    let quotes = EastmoneyQuoteProvider::new(
        &eastmoney.quote_base_url,
        &eastmoney.detail_base_url,
        client,
    )
    .with_retry(retry);

    let catalog = CatalogCache::new(
        Arc::new(source),
        JsonDocument::new(data_path.join(CATALOG_DOCUMENT)),
    )
    .with_ttl(config.search.cache_ttl())
    .with_serve_stale_on_error(config.search.serve_stale_on_error);

    let store = KeyValueStore::open(&data_path.join("store"))
        .with_context(|| format!("Failed to open store at {}", data_path.display()))?;
    let watchlist = Watchlist::new(RecordStore::new(
        store.get_collection(RECORDS_COLLECTION)?,
    ));

    Ok(QueryOrchestrator::new(Arc::new(catalog), Arc::new(quotes), Arc::new(watchlist))
        .with_max_concurrency(config.search.max_concurrency)
        .with_match_aliases(config.search.match_aliases))
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("Fundwatch starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let orchestrator = build_orchestrator(&config)?;

    match command {
        AppCommand::Search(query) => cli::search::run(&orchestrator, &query).await,
        AppCommand::Watch => cli::search::run_watchlist(&orchestrator).await,
        AppCommand::Add(code) => cli::watchlist::add(&orchestrator, &code).await,
        AppCommand::Remove(code) => cli::watchlist::remove(&orchestrator, &code).await,
        AppCommand::List => cli::watchlist::list(&orchestrator).await,
        AppCommand::Item { code, action } => {
            cli::watchlist::item(&orchestrator, &code, action).await
        }
        AppCommand::Refresh => cli::search::refresh(&orchestrator).await,
    }
}
