use crate::config::{AppConfig, RepoId};
use crate::models::{PrCommit, PrFile, PullRequest};
use anyhow::Result;
use async_trait::async_trait;
use octocrab::{Octocrab, Page};
use serde::de::DeserializeOwned;

/// Upstream collaborator the window walk and enrichment stages read from.
#[async_trait]
pub trait PullRequestSource: Send + Sync {
    /// One page of closed pull requests against the base branch, newest first.
    /// An empty page marks the end of the history and is never returned otherwise.
    async fn list_page(&self, repo: &RepoId, page: u32) -> Result<Vec<PullRequest>>;

    async fn commits(&self, pr: &PullRequest) -> Result<Vec<PrCommit>>;

    async fn files(&self, pr: &PullRequest) -> Result<Vec<PrFile>>;
}

pub struct GitHubClient {
    octocrab: Octocrab,
    base_branch: String,
    page_size: u8,
}

impl GitHubClient {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let mut builder = Octocrab::builder();
        if let Some(token) = &config.github_token {
            builder = builder.personal_token(token.clone());
        }

        Ok(Self {
            octocrab: builder.build()?,
            base_branch: config.base_branch.clone(),
            page_size: config.page_size,
        })
    }

    /// Logs the remaining core API quota. Failures are logged, never returned.
    pub async fn log_rate_limit(&self) {
        match self.octocrab.ratelimit().get().await {
            Ok(rate_limit) => {
                let core = rate_limit.resources.core;
                tracing::info!(
                    limit = core.limit,
                    remaining = core.remaining,
                    reset = %chrono::DateTime::from_timestamp(core.reset as i64, 0)
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_default(),
                    "GitHub rate limit"
                );
            }
            Err(e) => tracing::warn!("Failed to read GitHub rate limit: {}", e),
        }
    }

    /// Follows `next` links until the listing is exhausted.
    async fn collect_pages<T: DeserializeOwned>(&self, first: Page<T>) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut current_page = first;

        loop {
            let next = current_page.next.clone();
            items.extend(current_page.items);

            match self.octocrab.get_page::<T>(&next).await? {
                Some(next_page) => current_page = next_page,
                None => break,
            }
        }

        Ok(items)
    }
}

#[async_trait]
impl PullRequestSource for GitHubClient {
    async fn list_page(&self, repo: &RepoId, page_number: u32) -> Result<Vec<PullRequest>> {
        let page = self
            .octocrab
            .pulls(&repo.owner, &repo.repo)
            .list()
            .state(octocrab::params::State::Closed)
            .base(self.base_branch.clone())
            .sort(octocrab::params::pulls::Sort::Created)
            .direction(octocrab::params::Direction::Descending)
            .per_page(self.page_size)
            .page(page_number)
            .send()
            .await?;

        map_page(repo, page.items)
    }

    async fn commits(&self, pr: &PullRequest) -> Result<Vec<PrCommit>> {
        let first = self
            .octocrab
            .pulls(&pr.repo.owner, &pr.repo.repo)
            .pr_commits(pr.number)
            .per_page(100)
            .send()
            .await?;

        let commits = self.collect_pages(first).await?;

        Ok(commits
            .into_iter()
            .map(|commit| PrCommit {
                sha: commit.sha,
                message: commit.commit.message,
                authored_at: commit.commit.author.as_ref().and_then(|a| a.date),
                committed_at: commit.commit.committer.as_ref().and_then(|c| c.date),
            })
            .collect())
    }

    async fn files(&self, pr: &PullRequest) -> Result<Vec<PrFile>> {
        let first = self
            .octocrab
            .pulls(&pr.repo.owner, &pr.repo.repo)
            .list_files(pr.number)
            .await?;

        let files = self.collect_pages(first).await?;

        Ok(files
            .into_iter()
            .map(|file| PrFile {
                filename: file.filename,
                additions: file.additions as u64,
                deletions: file.deletions as u64,
                changes: file.changes as u64,
            })
            .collect())
    }
}

/// Maps one listing page, dropping entries without a creation date.
///
/// A non-empty page that maps to nothing is an error: handing back an empty page would end
/// the window walk early and silently truncate the report.
fn map_page(
    repo: &RepoId,
    items: Vec<octocrab::models::pulls::PullRequest>,
) -> Result<Vec<PullRequest>> {
    let listed = items.len();
    let prs: Vec<PullRequest> = items
        .into_iter()
        .filter_map(|pr| map_pull_request(repo, pr))
        .collect();

    let dropped = listed - prs.len();
    if dropped > 0 {
        tracing::warn!(repo = %repo, dropped, listed, "Dropped pull requests from listing page");
    }
    if prs.is_empty() && listed > 0 {
        anyhow::bail!(
            "All {} pull requests on a listing page of {} lack created_at",
            listed,
            repo
        );
    }

    Ok(prs)
}

/// Converts an octocrab listing entry into our snapshot type.
fn map_pull_request(
    repo: &RepoId,
    pr: octocrab::models::pulls::PullRequest,
) -> Option<PullRequest> {
    let Some(created_at) = pr.created_at else {
        tracing::warn!(url = %pr.url, "Skipping pull request without created_at");
        return None;
    };

    Some(PullRequest {
        repo: repo.clone(),
        number: pr.number,
        html_url: pr
            .html_url
            .map(|u| u.to_string())
            .unwrap_or_else(|| pr.url.clone()),
        url: pr.url,
        title: pr.title.unwrap_or_default(),
        body: pr.body,
        created_at,
        merged_at: pr.merged_at,
        head_ref: pr.head.ref_field,
    })
}
