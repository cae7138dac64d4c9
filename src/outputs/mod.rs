//! Persistence gateway: everything the crawler writes to disk.
//!
//! The crawl core never touches the filesystem itself; it hands finished
//! [`NewsItem`]s and missing-date notifications to a [`RecordSink`], one at a
//! time.
//!
//! # Submodules
//!
//! - [`records`]: one `YYYYMMDD.md` record per filing date
//! - [`ledger`]: the `not_exist.md` missing-dates ledger
//! - [`report`]: per-run Markdown and JSON reports
//! - [`monthly`]: `YYYY年MM月新闻汇总.md` digests built from the records
//!
//! # Output Structure
//!
//! ```text
//! news_dir/
//! ├── 20251122.md
//! ├── 20251202.md
//! └── not_exist.md
//!
//! reports_dir/
//! ├── 2025-12-03.md
//! ├── 2025-12-03.json
//! └── 2025年11月新闻汇总.md
//! ```

pub mod ledger;
pub mod monthly;
pub mod records;
pub mod report;

use crate::models::NewsItem;
use chrono::NaiveDate;
use std::error::Error;
use std::path::PathBuf;
use tracing::info;

/// Where resolved items and missing dates go.
pub trait RecordSink {
    /// A record for `date` already exists.
    async fn has_record(&self, date: NaiveDate) -> bool;

    /// Persist `item` under its filing date, replacing any previous record.
    async fn file(&self, item: &NewsItem) -> Result<PathBuf, Box<dyn Error>>;

    /// Note that `date` could not be resolved.
    async fn record_missing(&self, date: NaiveDate) -> Result<(), Box<dyn Error>>;

    /// `date` was filed; it is no longer missing.
    async fn clear_missing(&self, date: NaiveDate) -> Result<(), Box<dyn Error>>;
}

/// Records and ledger on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileStore {
    news_dir: PathBuf,
}

impl FileStore {
    pub fn new(news_dir: impl Into<PathBuf>) -> Self {
        Self {
            news_dir: news_dir.into(),
        }
    }
}

impl RecordSink for FileStore {
    async fn has_record(&self, date: NaiveDate) -> bool {
        records::record_exists(&self.news_dir, date).await
    }

    async fn file(&self, item: &NewsItem) -> Result<PathBuf, Box<dyn Error>> {
        records::write_record(&self.news_dir, item).await
    }

    async fn record_missing(&self, date: NaiveDate) -> Result<(), Box<dyn Error>> {
        ledger::add_missing(&self.news_dir, date).await.map(|_| ())
    }

    async fn clear_missing(&self, date: NaiveDate) -> Result<(), Box<dyn Error>> {
        ledger::remove_missing(&self.news_dir, date).await.map(|_| ())
    }
}

/// Reads like a [`FileStore`], writes nothing.
#[derive(Debug, Clone)]
pub struct DryRun {
    news_dir: PathBuf,
}

impl DryRun {
    pub fn new(news_dir: impl Into<PathBuf>) -> Self {
        Self {
            news_dir: news_dir.into(),
        }
    }
}

impl RecordSink for DryRun {
    async fn has_record(&self, date: NaiveDate) -> bool {
        records::record_exists(&self.news_dir, date).await
    }

    async fn file(&self, item: &NewsItem) -> Result<PathBuf, Box<dyn Error>> {
        let path = records::record_path(&self.news_dir, item.date);
        info!(
            dry_run = true,
            path = %path.display(),
            title = %item.title,
            chars = item.content.chars().count(),
            fallback = item.is_fallback(),
            "Would write record"
        );
        Ok(path)
    }

    async fn record_missing(&self, date: NaiveDate) -> Result<(), Box<dyn Error>> {
        info!(dry_run = true, %date, "Would record missing date");
        Ok(())
    }

    async fn clear_missing(&self, date: NaiveDate) -> Result<(), Box<dyn Error>> {
        info!(dry_run = true, %date, "Would clear missing date");
        Ok(())
    }
}
