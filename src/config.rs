//! Report settings read from environment variables.
//!
//! The binary seeds the environment from `.env` before `AppConfig::from_env` runs. `AppConfig`
//! decides which repositories each report scans, how enrichment requests are paced against the
//! GitHub rate limit, and how commit histories are turned into cycle/lead time.

use crate::batch::BatchPolicy;
use crate::metrics::{CommitPolicy, TimestampField};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration as StdDuration;

/// Commit message prefixes that never count as human work.
pub const DEFAULT_COMMIT_EXCLUSIONS: [&str; 2] =
    ["Merge branch 'master' ", "chore(release): publish"];

/// A unique identifier for a GitHub repository.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoId {
    /// The owner of the repository (e.g., "facebook").
    pub owner: String,
    /// The name of the repository (e.g., "react").
    pub repo: String,
}

impl RepoId {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Application configuration loaded from environment variables.
#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    /// Optional GitHub Personal Access Token. Requests fail downstream when it is missing
    /// for private repositories.
    pub github_token: Option<String>,

    /// Repositories scanned by the KPI report.
    /// Expected format: comma-separated string of "owner/repo" pairs.
    #[serde(deserialize_with = "deserialize_repos")]
    pub kpi_repos: Vec<RepoId>,

    /// Repositories scanned by the revert report. Falls back to `kpi_repos` when empty.
    #[serde(default, deserialize_with = "deserialize_repos")]
    pub revert_repos: Vec<RepoId>,

    /// The engine repository. Its pull requests are never classified by file path.
    #[serde(default, deserialize_with = "deserialize_engine_repo")]
    pub engine_repo: Option<RepoId>,

    /// Base branch the listing endpoint is filtered to.
    #[serde(default = "default_base_branch")]
    pub base_branch: String,

    /// Items per listing page.
    #[serde(default = "default_page_size")]
    pub page_size: u8,

    /// Number of pull requests enriched concurrently per chunk.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between enrichment chunks, in milliseconds.
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,

    /// Which commit timestamp drives cycle and lead time.
    #[serde(default)]
    pub commit_timestamp: TimestampField,

    /// Commit message prefixes filtered out before metrics are computed.
    #[serde(
        default = "default_commit_exclusions",
        deserialize_with = "deserialize_prefixes"
    )]
    pub commit_exclusions: Vec<String>,
}

fn default_base_branch() -> String {
    "master".to_string()
}

fn default_page_size() -> u8 {
    100
}

fn default_batch_size() -> usize {
    10
}

fn default_batch_delay_ms() -> u64 {
    1000
}

fn default_commit_exclusions() -> Vec<String> {
    DEFAULT_COMMIT_EXCLUSIONS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    pub fn batch_delay(&self) -> StdDuration {
        StdDuration::from_millis(self.batch_delay_ms)
    }

    pub fn batch_policy(&self) -> BatchPolicy {
        BatchPolicy::new(self.batch_size, self.batch_delay())
    }

    pub fn commit_policy(&self) -> CommitPolicy {
        CommitPolicy {
            timestamp: self.commit_timestamp,
            excluded_prefixes: self.commit_exclusions.clone(),
        }
    }

    /// Repositories the revert report walks.
    pub fn revert_repos(&self) -> &[RepoId] {
        if self.revert_repos.is_empty() {
            &self.kpi_repos
        } else {
            &self.revert_repos
        }
    }
}

fn deserialize_repos<'de, D>(deserializer: D) -> Result<Vec<RepoId>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Ok(parse_repos(&s))
}

fn deserialize_engine_repo<'de, D>(deserializer: D) -> Result<Option<RepoId>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Ok(parse_repos(&s).into_iter().next())
}

fn deserialize_prefixes<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Ok(parse_prefixes(&s))
}

fn parse_repos(s: &str) -> Vec<RepoId> {
    s.split(',')
        .filter_map(|part| {
            let parts: Vec<&str> = part.trim().split('/').collect();
            match parts.as_slice() {
                [owner, repo] if !owner.trim().is_empty() && !repo.trim().is_empty() => {
                    Some(RepoId::new(owner.trim(), repo.trim()))
                }
                _ => None,
            }
        })
        .collect()
}

// Trailing whitespace is significant in prefixes, only leading whitespace is dropped.
fn parse_prefixes(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim_start)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const VARS: [&str; 10] = [
        "GITHUB_TOKEN",
        "KPI_REPOS",
        "REVERT_REPOS",
        "ENGINE_REPO",
        "BASE_BRANCH",
        "PAGE_SIZE",
        "BATCH_SIZE",
        "BATCH_DELAY_MS",
        "COMMIT_TIMESTAMP",
        "COMMIT_EXCLUSIONS",
    ];

    fn clear_vars() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        clear_vars();
        env::set_var("KPI_REPOS", "acme/services,acme/Engine");
        env::set_var("REVERT_REPOS", "acme/services, acme/dashboard");
        env::set_var("ENGINE_REPO", "acme/Engine");
        env::set_var("BASE_BRANCH", "main");
        env::set_var("BATCH_SIZE", "5");
        env::set_var("BATCH_DELAY_MS", "250");
        env::set_var("COMMIT_TIMESTAMP", "committer");
        env::set_var("COMMIT_EXCLUSIONS", "Merge branch 'main' ,Release v");

        let config = AppConfig::from_env().expect("Failed to load config");

        assert_eq!(config.kpi_repos.len(), 2);
        assert_eq!(config.kpi_repos[1], RepoId::new("acme", "Engine"));
        assert_eq!(config.revert_repos()[1].repo, "dashboard");
        assert_eq!(config.engine_repo, Some(RepoId::new("acme", "Engine")));
        assert_eq!(config.base_branch, "main");
        assert_eq!(config.page_size, 100);
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.batch_delay(), StdDuration::from_millis(250));
        assert_eq!(config.commit_timestamp, TimestampField::Committer);
        assert_eq!(
            config.commit_exclusions,
            vec!["Merge branch 'main' ".to_string(), "Release v".to_string()]
        );

        clear_vars();
    }

    #[test]
    #[serial]
    fn test_config_defaults() {
        clear_vars();
        env::set_var("KPI_REPOS", "acme/services");

        let config = AppConfig::from_env().expect("Failed to load config");

        assert_eq!(config.github_token, None);
        assert_eq!(config.revert_repos(), config.kpi_repos.as_slice());
        assert_eq!(config.engine_repo, None);
        assert_eq!(config.base_branch, "master");
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.batch_delay(), StdDuration::from_millis(1000));
        assert_eq!(config.commit_timestamp, TimestampField::Author);
        assert_eq!(config.commit_exclusions, default_commit_exclusions());

        clear_vars();
    }

    #[test]
    #[serial]
    fn test_config_missing_vars() {
        clear_vars();
        let result = AppConfig::from_env();
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_repos_skips_malformed_entries() {
        let repos = parse_repos("acme/one, bad-entry ,/missing-owner,acme/two/extra,acme/two");
        assert_eq!(repos, vec![RepoId::new("acme", "one"), RepoId::new("acme", "two")]);
    }
}
