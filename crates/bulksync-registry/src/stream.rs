//! Lazy page-by-page view of one complete registry listing.

use std::time::Duration;

use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};

use crate::batch::{BulkToken, FetchBatch};
use crate::error::FetchError;
use crate::fetcher::RegistryFetcher;

/// Pages of a single listing, in registry order.
///
/// Yields at most one error, after which the stream ends. A stream that ends
/// without an error has delivered the final page.
pub type BatchStream<'a> = BoxStream<'a, Result<FetchBatch, FetchError>>;

/// Starts a listing from the first page.
///
/// Nothing is fetched until the stream is polled, and each page is fetched
/// only after the previous one has been consumed. Every call is bounded by
/// `fetch_timeout`; dropping the stream abandons the in-flight call.
pub fn listing<'a, F>(fetcher: &'a F, fetch_timeout: Duration) -> BatchStream<'a>
where
    F: RegistryFetcher + ?Sized,
{
    stream::unfold(Some(BulkToken::initial()), move |cursor| async move {
        let token = cursor?;
        let result = match tokio::time::timeout(fetch_timeout, fetcher.fetch_batch(&token)).await
        {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(fetch_timeout)),
        };

        match result {
            Ok(batch) => {
                let next = batch.next.clone();
                Some((Ok(batch), next))
            }
            Err(e) => Some((Err(e), None)),
        }
    })
    .boxed()
}
