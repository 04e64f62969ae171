//! Time-windowed retrieval over the reverse-chronological pull request listing.
//!
//! Pages are requested one after another because whether to request page `n + 1` depends on
//! the oldest `created_at` seen on page `n`.

use crate::dates::WindowQuery;
use crate::github::PullRequestSource;
use crate::models::PullRequest;
use anyhow::Result;

/// Walks pages 1, 2, 3, ... until the oldest pull request seen is at or before `query.after`,
/// or the listing runs out. Returns the pull requests created strictly inside the window, in
/// listing order. Transport errors are returned as-is; a partial window is never returned.
pub async fn fetch_window<S>(source: &S, query: &WindowQuery) -> Result<Vec<PullRequest>>
where
    S: PullRequestSource + ?Sized,
{
    let mut prs = Vec::new();
    let mut page_number = 1;

    loop {
        let page = source.list_page(&query.repository, page_number).await?;
        tracing::debug!(repo = %query.repository, page = page_number, "{} retrieved", page.len());

        let Some(oldest) = page.last() else {
            break;
        };
        let earliest = oldest.created_at;
        tracing::debug!(repo = %query.repository, %earliest, "Earliest PR retrieved");

        prs.extend(page.into_iter().filter(|pr| query.contains(pr.created_at)));

        if earliest <= query.after {
            break;
        }
        page_number += 1;
    }

    tracing::info!(
        repo = %query.repository,
        pages = page_number,
        "Total of {} PRs in time window",
        prs.len()
    );

    Ok(prs)
}
