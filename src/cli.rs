//! Command-line interface definitions for the transcript crawler.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Output locations and the site address can also come from environment
//! variables.

use crate::utils::{date_span, parse_date_arg, recent_days};
use chrono::NaiveDate;
use clap::Parser;

/// Command-line arguments for the crawler.
///
/// Exactly one way of choosing dates applies per run: `--url`, `--range`,
/// `--start`/`--end`, or `--date` (default `today`). `--merge-monthly` does
/// no crawling at all.
///
/// # Examples
///
/// ```sh
/// # Today's broadcast (after 19:00)
/// xwlb_transcripts
///
/// # The last week, without touching disk
/// xwlb_transcripts --range 7 --dry-run
///
/// # An explicit range, skipping dates already on disk
/// xwlb_transcripts --start 2025-11-01 --end 2025-11-30 --skip-existing
///
/// # One known article page
/// xwlb_transcripts --url http://mrxwlb.com/2025/11/22/xwlb/
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Single date: YYYY-MM-DD, YYYYMMDD, today, yesterday or tomorrow
    #[arg(short, long)]
    pub date: Option<String>,

    /// Crawl the most recent N days, including today
    #[arg(short, long, conflicts_with_all = ["date", "start", "end"])]
    pub range: Option<u32>,

    /// First date of an inclusive range
    #[arg(short, long, requires = "end", conflicts_with = "date")]
    pub start: Option<String>,

    /// Last date of an inclusive range
    #[arg(short, long, requires = "start", conflicts_with = "date")]
    pub end: Option<String>,

    /// Fetch a single article page instead of walking directories
    #[arg(short, long, conflicts_with_all = ["range", "start", "end"])]
    pub url: Option<String>,

    /// Resolve everything but write nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Skip dates whose record already exists
    #[arg(long)]
    pub skip_existing: bool,

    /// Build monthly digests from existing records and exit
    #[arg(long, conflicts_with_all = ["date", "range", "start", "end", "url"])]
    pub merge_monthly: bool,

    /// Minimum delay between requests, in milliseconds
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Article fetches in flight per directory
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Optional path to config.yaml file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Directory for per-date records and the missing-dates ledger
    #[arg(long, env = "XWLB_NEWS_DIR")]
    pub news_dir: Option<String>,

    /// Directory for run reports and monthly digests
    #[arg(long, env = "XWLB_REPORTS_DIR")]
    pub reports_dir: Option<String>,

    /// Site to crawl
    #[arg(long, env = "XWLB_BASE_URL")]
    pub base_url: Option<String>,
}

/// What a run does, decided from the flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// Walk these directory dates in order.
    Dates {
        dates: Vec<NaiveDate>,
        /// Set for `--start/--end` and `--range` runs; shown in the report.
        range: Option<(NaiveDate, NaiveDate)>,
    },
    /// File one known article page.
    Url { url: String, date: Option<NaiveDate> },
    MergeMonthly,
}

impl Cli {
    /// Resolve the flags against `today`.
    pub fn mode(&self, today: NaiveDate) -> Result<RunMode, String> {
        if self.merge_monthly {
            return Ok(RunMode::MergeMonthly);
        }

        if let Some(url) = &self.url {
            let date = self
                .date
                .as_deref()
                .map(|d| parse_date_arg(d, today))
                .transpose()?;
            return Ok(RunMode::Url {
                url: url.clone(),
                date,
            });
        }

        if let Some(days) = self.range {
            if days == 0 {
                return Err("--range must be at least 1".to_string());
            }
            let dates = recent_days(today, days).map_err(|e| format!("--range {days}: {e}"))?;
            let range = dates.first().copied().zip(dates.last().copied());
            return Ok(RunMode::Dates { dates, range });
        }

        if let (Some(start), Some(end)) = (&self.start, &self.end) {
            let start = parse_date_arg(start, today)?;
            let end = parse_date_arg(end, today)?;
            if start > end {
                return Err(format!("--start {start} is after --end {end}"));
            }
            return Ok(RunMode::Dates {
                dates: date_span(start, end),
                range: Some((start, end)),
            });
        }

        let date = parse_date_arg(self.date.as_deref().unwrap_or("today"), today)?;
        Ok(RunMode::Dates {
            dates: vec![date],
            range: None,
        })
    }
}
