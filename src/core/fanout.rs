//! Concurrent resolution of many fund codes into quotes.

use crate::core::error::FundError;
use crate::core::quote::{Quote, QuoteFetchOutcome, QuoteProvider};
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub const DEFAULT_MAX_CONCURRENCY: usize = 16;

/// Fetches a quote for every code with at most `max_concurrency` requests in
/// flight, waits for all of them to settle and keeps only the found quotes.
///
/// Output order follows completion order, not input order. Cancelling `cancel`
/// abandons the outstanding fetches and returns [`FundError::Cancelled`].
pub async fn resolve_all(
    provider: &dyn QuoteProvider,
    codes: &[String],
    max_concurrency: usize,
    cancel: &CancellationToken,
) -> Result<Vec<Quote>, FundError> {
    if codes.is_empty() {
        return Ok(Vec::new());
    }

    let settled = stream::iter(codes)
        .map(|code| async move { (code, provider.fetch_quote(code).await) })
        .buffer_unordered(max_concurrency.max(1))
        .filter_map(|(code, outcome)| async move {
            match outcome {
                QuoteFetchOutcome::Found(quote) => Some(quote),
                QuoteFetchOutcome::NotFound => {
                    debug!(code = %code, "No quote, dropping");
                    None
                }
                QuoteFetchOutcome::TransientError(e) => {
                    debug!(code = %code, error = %e, "Quote fetch failed, dropping");
                    None
                }
            }
        })
        .collect::<Vec<_>>();

    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!("Fan-out cancelled with {} codes outstanding", codes.len());
            Err(FundError::Cancelled)
        }
        quotes = settled => {
            debug!("Resolved {}/{} quotes", quotes.len(), codes.len());
            Ok(quotes)
        }
    }
}
