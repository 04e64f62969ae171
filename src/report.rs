//! Report assembly: window walk per repository, enrichment, then one typed row per pull request.
//!
//! A row that cannot be built is logged and left out; every other row still makes it into the
//! report. Failures while listing or enriching abort the whole report: a failed fetch is a
//! transport error, and a report missing an unknown subset of pull requests would look complete.

use crate::batch::{self, BatchPolicy};
use crate::classify::{self, ModuleFlags};
use crate::config::{AppConfig, RepoId};
use crate::dates::DateRange;
use crate::github::PullRequestSource;
use crate::metrics::{self, CommitHistory, CommitPolicy};
use crate::models::{PrCommit, PrFile, PullRequest};
use crate::window;
use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Serialize, Serializer};
use std::collections::{HashMap, HashSet};
use std::io::Write;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportKind {
    /// Cycle/lead time and module classification for every merged pull request.
    Kpi,
    /// Merged pull requests that revert an earlier change.
    Revert,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RowError {
    #[error("{0} was never merged")]
    NotMerged(String),
    #[error("no commits were fetched for {0}")]
    MissingCommits(String),
    #[error("no files were fetched for {0}")]
    MissingFiles(String),
    #[error("{0} has no human commits left after filtering")]
    EmptyHistory(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiRow {
    pub html_url: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub merged_at: DateTime<Utc>,
    pub first_commit_at: DateTime<Utc>,
    pub last_commit_at: DateTime<Utc>,
    #[serde(serialize_with = "two_decimals")]
    pub cycle_time_hours: f64,
    #[serde(serialize_with = "two_decimals")]
    pub lead_time_hours: f64,
    pub engine: bool,
    pub services: bool,
    pub library: bool,
    pub package: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevertRow {
    pub html_url: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub merged_at: DateTime<Utc>,
}

fn two_decimals<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{:.2}", value))
}

#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    Kpi(Vec<KpiRow>),
    Revert(Vec<RevertRow>),
}

impl Report {
    pub fn len(&self) -> usize {
        match self {
            Report::Kpi(rows) => rows.len(),
            Report::Revert(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes a header row followed by one record per pull request.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        match self {
            Report::Kpi(rows) => write_rows(&mut csv, rows, KPI_HEADER)?,
            Report::Revert(rows) => write_rows(&mut csv, rows, REVERT_HEADER)?,
        }
        csv.flush()?;
        Ok(())
    }
}

const KPI_HEADER: &[&str] = &[
    "URL",
    "Title",
    "Created At",
    "Merged At",
    "Time of First Commit",
    "Time of Last Commit",
    "Cycle Time",
    "Lead Time",
    "Engine?",
    "Service?",
    "Library?",
    "Package?",
];

const REVERT_HEADER: &[&str] = &["html_url", "title", "created_at", "merged_at"];

// Headers are written by hand so an empty report still carries one.
fn write_rows<W: Write, T: Serialize>(
    csv: &mut csv::Writer<W>,
    rows: &[T],
    header: &[&str],
) -> Result<()> {
    csv.write_record(header)?;
    for row in rows {
        csv.serialize(row)?;
    }
    Ok(())
}

/// Everything the assembler needs besides the data source.
#[derive(Clone, Debug)]
pub struct ReportConfig {
    pub repos: Vec<RepoId>,
    pub engine_repo: Option<RepoId>,
    pub batch: BatchPolicy,
    pub commits: CommitPolicy,
}

impl ReportConfig {
    pub fn for_kind(config: &AppConfig, kind: ReportKind) -> Self {
        let repos = match kind {
            ReportKind::Kpi => config.kpi_repos.clone(),
            ReportKind::Revert => config.revert_repos().to_vec(),
        };

        Self {
            repos,
            engine_repo: config.engine_repo.clone(),
            batch: config.batch_policy(),
            commits: config.commit_policy(),
        }
    }
}

pub struct ReportAssembler<'a, S: ?Sized> {
    source: &'a S,
    config: ReportConfig,
}

impl<'a, S> ReportAssembler<'a, S>
where
    S: PullRequestSource + ?Sized,
{
    pub fn new(source: &'a S, config: ReportConfig) -> Self {
        Self { source, config }
    }

    pub async fn run(&self, kind: ReportKind, range: &DateRange) -> Result<Report> {
        match kind {
            ReportKind::Kpi => self.kpi_report(range).await.map(Report::Kpi),
            ReportKind::Revert => self.revert_report(range).await.map(Report::Revert),
        }
    }

    /// Merged pull requests across all configured repositories, in repository order and
    /// listing order within each repository. A URL seen twice keeps its first position.
    pub async fn merged_prs(&self, range: &DateRange) -> Result<Vec<PullRequest>> {
        let mut prs = Vec::new();
        for repo in &self.config.repos {
            tracing::info!("Finding PRs in the {} repository...", repo);
            let window = window::fetch_window(self.source, &range.query(repo.clone())).await?;
            prs.extend(window);
            tracing::info!("Done searching {}", repo);
        }

        let mut seen = HashSet::new();
        prs.retain(|pr| pr.is_merged() && seen.insert(pr.url.clone()));
        Ok(prs)
    }

    pub async fn kpi_report(&self, range: &DateRange) -> Result<Vec<KpiRow>> {
        let prs = self.merged_prs(range).await?;

        tracing::info!("Loading commit data for {} PRs...", prs.len());
        let commits = batch::enrich(&prs, self.config.batch, |pr| self.source.commits(pr)).await?;
        tracing::info!("Loading file data for {} PRs...", prs.len());
        let files = batch::enrich(&prs, self.config.batch, |pr| self.source.files(pr)).await?;

        Ok(collect_rows(&prs, |pr| {
            kpi_row(
                pr,
                &commits,
                &files,
                self.config.engine_repo.as_ref(),
                &self.config.commits,
            )
        }))
    }

    pub async fn revert_report(&self, range: &DateRange) -> Result<Vec<RevertRow>> {
        let prs = self.merged_prs(range).await?;
        let reverts: Vec<PullRequest> = prs.into_iter().filter(classify::is_revert).collect();
        tracing::info!("{} reverts found", reverts.len());

        Ok(collect_rows(&reverts, revert_row))
    }
}

/// Builds one row per pull request, logging and skipping the ones that fail.
fn collect_rows<T, F>(prs: &[PullRequest], build: F) -> Vec<T>
where
    F: Fn(&PullRequest) -> Result<T, RowError>,
{
    prs.iter()
        .filter_map(|pr| match build(pr) {
            Ok(row) => Some(row),
            Err(e) => {
                tracing::error!(pr = %pr.html_url, "Skipping row: {}", e);
                None
            }
        })
        .collect()
}

pub fn kpi_row(
    pr: &PullRequest,
    commits: &HashMap<String, Vec<PrCommit>>,
    files: &HashMap<String, Vec<PrFile>>,
    engine_repo: Option<&RepoId>,
    policy: &CommitPolicy,
) -> Result<KpiRow, RowError> {
    let merged_at = pr
        .merged_at
        .ok_or_else(|| RowError::NotMerged(pr.html_url.clone()))?;
    let commits = commits
        .get(&pr.url)
        .ok_or_else(|| RowError::MissingCommits(pr.html_url.clone()))?;
    let files = files
        .get(&pr.url)
        .ok_or_else(|| RowError::MissingFiles(pr.html_url.clone()))?;

    let CommitHistory::Measured(metrics) = metrics::measure(commits, merged_at, policy) else {
        return Err(RowError::EmptyHistory(pr.html_url.clone()));
    };
    let flags = ModuleFlags::classify(pr, files, engine_repo);

    Ok(KpiRow {
        html_url: pr.html_url.clone(),
        title: pr.title.clone(),
        created_at: pr.created_at,
        merged_at,
        first_commit_at: metrics.first_commit_at,
        last_commit_at: metrics.last_commit_at,
        cycle_time_hours: metrics.cycle_time_hours(),
        lead_time_hours: metrics.lead_time_hours(),
        engine: flags.engine,
        services: flags.services,
        library: flags.library,
        package: flags.package,
    })
}

pub fn revert_row(pr: &PullRequest) -> Result<RevertRow, RowError> {
    let merged_at = pr
        .merged_at
        .ok_or_else(|| RowError::NotMerged(pr.html_url.clone()))?;

    Ok(RevertRow {
        html_url: pr.html_url.clone(),
        title: pr.title.clone(),
        created_at: pr.created_at,
        merged_at,
    })
}
