//! Core business logic abstractions

pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod extract;
pub mod fanout;
pub mod log;
pub mod quote;
pub mod result;
pub mod search;
pub mod watchlist;

// Re-export main types for cleaner imports
pub use catalog::{CatalogCache, CatalogEntry, CatalogSnapshot, CatalogSource};
pub use error::{FundError, StoreError};
pub use quote::{Quote, QuoteFetchOutcome, QuoteProvider};
pub use result::{ItemAction, SearchResult};
pub use search::{Query, QueryOrchestrator, ResultSink, Selection};
pub use watchlist::Watchlist;
