//! Top-level query handling: empty input, catalog search and watchlist view.

use crate::core::catalog::CatalogCache;
use crate::core::error::FundError;
use crate::core::fanout::{DEFAULT_MAX_CONCURRENCY, resolve_all};
use crate::core::quote::QuoteProvider;
use crate::core::result::{ItemAction, MenuItem, SearchResult, item_actions};
use crate::core::watchlist::Watchlist;
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Receives each list of results the orchestrator produces.
pub trait ResultSink: Send + Sync {
    fn emit(&self, results: Vec<SearchResult>);
}

impl<F> ResultSink for F
where
    F: Fn(Vec<SearchResult>) + Send + Sync,
{
    fn emit(&self, results: Vec<SearchResult>) {
        self(results)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Search(String),
    Watchlist,
}

impl Query {
    /// Plain text input; blank input still goes through the search path and
    /// produces the prompt.
    pub fn text(input: &str) -> Self {
        Query::Search(input.trim().to_string())
    }
}

/// Outcome of running an item action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Saved(String),
    Removed(String),
    Open(String),
}

struct Inflight {
    generation: u64,
    cancel: CancellationToken,
}

pub struct QueryOrchestrator {
    catalog: Arc<CatalogCache>,
    quotes: Arc<dyn QuoteProvider>,
    watchlist: Arc<Watchlist>,
    max_concurrency: usize,
    match_aliases: bool,
    inflight: Mutex<Inflight>,
}

impl QueryOrchestrator {
    pub fn new(
        catalog: Arc<CatalogCache>,
        quotes: Arc<dyn QuoteProvider>,
        watchlist: Arc<Watchlist>,
    ) -> Self {
        Self {
            catalog,
            quotes,
            watchlist,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            match_aliases: false,
            inflight: Mutex::new(Inflight {
                generation: 0,
                cancel: CancellationToken::new(),
            }),
        }
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn with_match_aliases(mut self, enabled: bool) -> Self {
        self.match_aliases = enabled;
        self
    }

    pub fn watchlist(&self) -> &Watchlist {
        &self.watchlist
    }

    pub fn catalog(&self) -> &CatalogCache {
        &self.catalog
    }

    /// Runs `query`, emitting results to `sink`. Starting a query cancels the
    /// previous one; results of a superseded query are never emitted.
    ///
    /// Only a watchlist read failure is returned as an error, after emitting the
    /// `StorageUnavailable` sentinel. Catalog failures become `NoResults`.
    pub async fn handle(&self, query: Query, sink: &dyn ResultSink) -> Result<(), FundError> {
        let (generation, cancel) = self.begin();

        match query {
            Query::Search(input) if input.is_empty() => {
                self.emit(generation, sink, vec![SearchResult::prompt()]);
                Ok(())
            }
            Query::Search(input) => {
                self.emit(generation, sink, vec![SearchResult::searching()]);
                let results = self.search(&input, &cancel).await;
                self.finish(generation, sink, results);
                Ok(())
            }
            Query::Watchlist => {
                let codes = match self.watchlist.list().await {
                    Ok(codes) => codes,
                    Err(e) => {
                        warn!(error = %e, "Failed to read watchlist");
                        self.emit(
                            generation,
                            sink,
                            vec![SearchResult::storage_unavailable(&e)],
                        );
                        return Err(e.into());
                    }
                };
                if codes.is_empty() {
                    self.emit(generation, sink, vec![SearchResult::empty_watchlist()]);
                    return Ok(());
                }
                let results: Result<Vec<SearchResult>, FundError> =
                    resolve_all(self.quotes.as_ref(), &codes, self.max_concurrency, &cancel)
                        .await
                        .map(|quotes| quotes.into_iter().map(SearchResult::from).collect());
                self.finish(generation, sink, results);
                Ok(())
            }
        }
    }

    async fn search(
        &self,
        input: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>, FundError> {
        let snapshot = self.catalog.ensure_fresh().await?;
        let candidates: Vec<String> = snapshot
            .filter(input, self.match_aliases)
            .into_iter()
            .map(|entry| entry.code.clone())
            .collect();
        debug!("{} catalog matches for '{}'", candidates.len(), input);

        let quotes =
            resolve_all(self.quotes.as_ref(), &candidates, self.max_concurrency, cancel).await?;
        Ok(quotes.into_iter().map(SearchResult::from).collect())
    }

    fn finish(
        &self,
        generation: u64,
        sink: &dyn ResultSink,
        results: Result<Vec<SearchResult>, FundError>,
    ) {
        match results {
            Ok(results) if results.is_empty() => {
                self.emit(generation, sink, vec![SearchResult::no_results()])
            }
            Ok(results) => self.emit(generation, sink, results),
            Err(FundError::Cancelled) => debug!(generation, "Query superseded"),
            Err(FundError::Persistence(e)) => {
                warn!(error = %e, "Catalog storage failed");
                self.emit(generation, sink, vec![SearchResult::storage_unavailable(&e)]);
            }
            Err(e) => {
                warn!(error = %e, "Search failed");
                self.emit(generation, sink, vec![SearchResult::no_results()]);
            }
        }
    }

    /// Menu for a selected fund, based on its current watch state.
    pub async fn menu(&self, code: &str) -> Result<Vec<MenuItem>, FundError> {
        let watched = self.watchlist.contains(code).await?;
        Ok(item_actions(code, watched))
    }

    pub async fn select(&self, code: &str, action: ItemAction) -> Result<Selection, FundError> {
        match action {
            ItemAction::Save => {
                self.watchlist.add(code).await?;
                Ok(Selection::Saved(code.to_string()))
            }
            ItemAction::Remove => {
                self.watchlist.remove(code).await?;
                Ok(Selection::Removed(code.to_string()))
            }
            ItemAction::Open => Ok(Selection::Open(self.quotes.detail_url(code))),
        }
    }

    fn begin(&self) -> (u64, CancellationToken) {
        let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
        inflight.cancel.cancel();
        inflight.generation += 1;
        inflight.cancel = CancellationToken::new();
        (inflight.generation, inflight.cancel.clone())
    }

    fn emit(&self, generation: u64, sink: &dyn ResultSink, results: Vec<SearchResult>) {
        let inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
        if inflight.generation != generation {
            debug!(generation, current = inflight.generation, "Dropping stale results");
            return;
        }
        sink.emit(results);
    }
}
