//! Read-only snapshots of the GitHub records the reports are built from.

use crate::config::RepoId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PullRequest {
    /// Repository the pull request was listed from.
    pub repo: RepoId,
    pub number: u64,
    /// Stable API identifier, used as the key for enrichment results.
    pub url: String,
    pub html_url: String,
    pub title: String,
    pub body: Option<String>,
    pub created_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
    /// Name of the originating branch (`head.ref`).
    pub head_ref: String,
}

impl PullRequest {
    pub fn is_merged(&self) -> bool {
        self.merged_at.is_some()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PrCommit {
    pub sha: String,
    pub message: String,
    pub authored_at: Option<DateTime<Utc>>,
    pub committed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PrFile {
    pub filename: String,
    pub additions: u64,
    pub deletions: u64,
    pub changes: u64,
}
