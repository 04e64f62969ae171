//! Chunked, paced enrichment of pull requests.
//!
//! GitHub throttles clients that fire hundreds of requests at once, while fetching one pull
//! request at a time is too slow for a month of history. Requests are therefore issued in
//! fixed-size concurrent chunks with a fixed pause between chunks.

use crate::models::PullRequest;
use anyhow::Result;
use futures::future;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration as StdDuration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchPolicy {
    /// Requests in flight per chunk. Never zero.
    pub chunk_size: usize,
    /// Pause between the end of one chunk and the start of the next.
    pub delay: StdDuration,
}

impl BatchPolicy {
    pub fn new(chunk_size: usize, delay: StdDuration) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            delay,
        }
    }
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self::new(10, StdDuration::from_millis(1000))
    }
}

/// Runs `fetch_one` for every pull request and keys the results by pull request URL.
///
/// Chunks run strictly one after another; within a chunk all calls are awaited together and
/// the first failure aborts the whole enrichment. The returned map has one entry per input.
pub async fn enrich<'a, T, F, Fut>(
    prs: &'a [PullRequest],
    policy: BatchPolicy,
    fetch_one: F,
) -> Result<HashMap<String, T>>
where
    F: Fn(&'a PullRequest) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let chunk_size = policy.chunk_size.max(1);
    let chunk_count = prs.len().div_ceil(chunk_size);
    let mut results = HashMap::with_capacity(prs.len());

    for (index, chunk) in prs.chunks(chunk_size).enumerate() {
        if index > 0 {
            tokio::time::sleep(policy.delay).await;
        }
        tracing::debug!(
            chunk = index + 1,
            of = chunk_count,
            "Fetching {} items",
            chunk.len()
        );

        let fetched = future::try_join_all(chunk.iter().map(&fetch_one)).await?;
        for (pr, value) in chunk.iter().zip(fetched) {
            results.insert(pr.url.clone(), value);
        }
    }

    Ok(results)
}
