use crate::models::PrCommit;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Which commit timestamp orders a pull request's history.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampField {
    #[default]
    Author,
    Committer,
}

impl TimestampField {
    fn of(self, commit: &PrCommit) -> Option<DateTime<Utc>> {
        match self {
            TimestampField::Author => commit.authored_at,
            TimestampField::Committer => commit.committed_at,
        }
    }
}

/// How a commit list is reduced to the human-authored history.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommitPolicy {
    pub timestamp: TimestampField,
    /// Commits whose message starts with any of these are merge/release noise.
    pub excluded_prefixes: Vec<String>,
}

impl CommitPolicy {
    fn is_excluded(&self, commit: &PrCommit) -> bool {
        self.excluded_prefixes
            .iter()
            .any(|prefix| commit.message.starts_with(prefix.as_str()))
    }
}

/// Cycle and lead time for one pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleMetrics {
    pub first_commit_at: DateTime<Utc>,
    pub last_commit_at: DateTime<Utc>,
    /// Last human commit minus first commit.
    pub cycle_time: Duration,
    /// Merge minus last human commit.
    pub lead_time: Duration,
}

impl CycleMetrics {
    pub fn cycle_time_hours(&self) -> f64 {
        hours(self.cycle_time)
    }

    pub fn lead_time_hours(&self) -> f64 {
        hours(self.lead_time)
    }
}

fn hours(duration: Duration) -> f64 {
    duration.num_milliseconds() as f64 / 1000.0 / SECONDS_PER_HOUR
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitHistory {
    Measured(CycleMetrics),
    /// Nothing left once noise commits (and commits missing the chosen timestamp) are dropped.
    Empty,
}

/// Computes cycle and lead time for a merged pull request.
///
/// The input is not reordered; the remaining commits are sorted by the policy's timestamp
/// with a stable sort, so repeated calls over the same list give the same answer.
pub fn measure(
    commits: &[PrCommit],
    merged_at: DateTime<Utc>,
    policy: &CommitPolicy,
) -> CommitHistory {
    let mut timestamps: Vec<DateTime<Utc>> = commits
        .iter()
        .filter(|commit| !policy.is_excluded(commit))
        .filter_map(|commit| policy.timestamp.of(commit))
        .collect();
    timestamps.sort();

    let (Some(&first_commit_at), Some(&last_commit_at)) = (timestamps.first(), timestamps.last())
    else {
        return CommitHistory::Empty;
    };

    CommitHistory::Measured(CycleMetrics {
        first_commit_at,
        last_commit_at,
        cycle_time: last_commit_at - first_commit_at,
        lead_time: merged_at - last_commit_at,
    })
}
