//! Data models for resolved transcripts and per-run bookkeeping.
//!
//! This module defines the core data structures used throughout the application:
//! - [`ArticlePage`]: What the article fetcher extracted from one page
//! - [`NewsItem`]: A transcript bound to its filing date, ready for persistence
//! - [`DateOutcome`]: The result of resolving one target directory date
//! - [`RunTally`]: Counts accumulated across every date of a run
//!
//! None of these types are mutated after the reconciler hands them out; the
//! batch runner only reads them and forwards them to the persistence gateway.

use crate::error::{FailureKind, FetchError};
use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// Fields extracted from a single article page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticlePage {
    /// Primary heading text, empty when the page had none.
    pub title: String,
    /// Formatted transcript body.
    pub content: String,
    /// Date declared by the page itself, if any pattern matched.
    pub asserted_date: Option<NaiveDate>,
}

/// How the filing date of a [`NewsItem`] was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateOrigin {
    /// The article page declared its own date.
    Asserted,
    /// No date could be read from the page; the directory date, or for a
    /// single URL the given or path date, was used.
    DirectoryFallback,
}

/// A transcript resolved to the date it should be filed under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsItem {
    /// Article heading; may be empty.
    pub title: String,
    /// Formatted transcript body, never empty.
    pub content: String,
    /// Filing date.
    pub date: NaiveDate,
    /// Whether `date` came from the page or from the directory fallback.
    pub date_origin: DateOrigin,
    /// Observed article URL, taken from a directory link.
    pub url: String,
    /// Directory listing page that led to the article.
    pub source_url: String,
    /// Extraction timestamp, audit only.
    pub crawled_at: DateTime<Local>,
}

impl NewsItem {
    /// Eight-digit `YYYYMMDD` key the record is stored under.
    pub fn record_key(&self) -> String {
        self.date.format("%Y%m%d").to_string()
    }

    pub fn is_fallback(&self) -> bool {
        self.date_origin == DateOrigin::DirectoryFallback
    }

    /// Equality on everything except `crawled_at`.
    pub fn same_record(&self, other: &NewsItem) -> bool {
        self.title == other.title
            && self.content == other.content
            && self.date == other.date
            && self.date_origin == other.date_origin
            && self.url == other.url
            && self.source_url == other.source_url
    }
}

/// One article that could not be fetched or extracted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleFailure {
    pub url: String,
    pub kind: FailureKind,
    pub message: String,
}

impl From<&FetchError> for ArticleFailure {
    fn from(err: &FetchError) -> Self {
        ArticleFailure {
            url: err.url().to_string(),
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Two articles of one directory batch resolved to the same filing date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collision {
    pub date: NaiveDate,
    /// URL of the item that was kept (the later one in traversal order).
    pub kept_url: String,
    /// URL of the item that was overwritten.
    pub discarded_url: String,
}

/// Final classification of one target date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateStatus {
    /// Directory resolved and every article fetch succeeded.
    Filed,
    /// No directory page or no qualifying links.
    Missing,
    /// Directory resolved but at least one article fetch or record write failed.
    PartialFailure,
    /// Not attempted (future date, not yet aired, or already on disk).
    Skipped,
}

/// Everything the run learned about one target date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateOutcome {
    pub target: NaiveDate,
    pub status: DateStatus,
    /// Directory variant that produced the links, when one did.
    pub directory_url: Option<String>,
    /// Filed items ordered by filing date.
    pub items: Vec<NewsItem>,
    pub failures: Vec<ArticleFailure>,
    pub collisions: Vec<Collision>,
    /// Article fetches attempted for this date.
    pub attempted: usize,
    /// Items dropped because an earlier target date in this run filed the same date.
    pub already_filed: usize,
    pub skip_reason: Option<String>,
}

impl DateOutcome {
    pub fn missing(target: NaiveDate) -> Self {
        DateOutcome {
            target,
            status: DateStatus::Missing,
            directory_url: None,
            items: Vec::new(),
            failures: Vec::new(),
            collisions: Vec::new(),
            attempted: 0,
            already_filed: 0,
            skip_reason: None,
        }
    }

    pub fn skipped(target: NaiveDate, reason: impl Into<String>) -> Self {
        DateOutcome {
            status: DateStatus::Skipped,
            skip_reason: Some(reason.into()),
            ..DateOutcome::missing(target)
        }
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    pub fn parse_failures(&self) -> usize {
        self.failures
            .iter()
            .filter(|f| f.kind == FailureKind::Parse)
            .count()
    }

    pub fn fallback_count(&self) -> usize {
        self.items.iter().filter(|i| i.is_fallback()).count()
    }
}

/// Run-wide counters, merged from each [`DateOutcome`] by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTally {
    pub filed: usize,
    pub missing: usize,
    pub failed: usize,
    pub skipped: usize,
    pub parse_errors: usize,
    pub attempted: usize,
    pub collisions: usize,
    pub fallbacks: usize,
    pub write_failures: usize,
}

impl RunTally {
    pub fn absorb(&mut self, outcome: &DateOutcome) {
        self.filed += outcome.items.len();
        self.failed += outcome.failure_count();
        self.parse_errors += outcome.parse_failures();
        self.attempted += outcome.attempted;
        self.collisions += outcome.collisions.len();
        self.fallbacks += outcome.fallback_count();
        self.skipped += outcome.already_filed;
        match outcome.status {
            DateStatus::Missing => self.missing += 1,
            DateStatus::Skipped => self.skipped += 1,
            DateStatus::Filed | DateStatus::PartialFailure => {}
        }
    }

    /// Parse errors make up the majority of attempted article fetches.
    pub fn has_structure_drift(&self) -> bool {
        self.attempted > 0 && self.parse_errors * 2 > self.attempted
    }
}
