//! Date range resolution for report windows.
//!
//! "Today" is always passed in so callers (and tests) decide what the current instant is.

use crate::config::RepoId;
use chrono::{DateTime, Months, NaiveDate, NaiveTime, Utc};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateRangeError {
    #[error("{0} is in the future")]
    FutureDate(NaiveDate),
    #[error("start date {start} is after end date {end}")]
    Inverted { start: NaiveDate, end: NaiveDate },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Builds a range, defaulting to one month before `today` through `today`.
    pub fn resolve(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<Self, DateRangeError> {
        let end = end.unwrap_or(today);
        let start = start.unwrap_or_else(|| {
            today
                .checked_sub_months(Months::new(1))
                .unwrap_or(NaiveDate::MIN)
        });

        for date in [start, end] {
            if date > today {
                return Err(DateRangeError::FutureDate(date));
            }
        }
        if start > end {
            return Err(DateRangeError::Inverted { start, end });
        }

        Ok(Self { start, end })
    }

    /// Midnight UTC at the start date. Pull requests must be created strictly after it.
    pub fn after(&self) -> DateTime<Utc> {
        midnight(self.start)
    }

    /// Midnight UTC at the end date. Pull requests must be created strictly before it.
    pub fn before(&self) -> DateTime<Utc> {
        midnight(self.end)
    }

    pub fn query(&self, repository: RepoId) -> WindowQuery {
        WindowQuery {
            repository,
            after: self.after(),
            before: self.before(),
        }
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// One repository's slice of a report window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowQuery {
    pub repository: RepoId,
    pub after: DateTime<Utc>,
    pub before: DateTime<Utc>,
}

impl WindowQuery {
    pub fn contains(&self, created_at: DateTime<Utc>) -> bool {
        self.after < created_at && created_at < self.before
    }
}
