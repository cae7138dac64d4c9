//! Utility functions for date arguments, string truncation, and file system checks.
//!
//! This module provides helper functions used throughout the application:
//! - Parsing user-supplied dates (`YYYY-MM-DD`, `YYYYMMDD`, relative words)
//! - Building ascending date sequences for range and "last N days" runs
//! - Chinese-locale date rendering for records and the ledger
//! - Character-safe truncation for logs and report tables
//! - File system validation for output directories

use chrono::{Datelike, Duration, NaiveDate};
use std::error::Error;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Parse a date argument relative to `today`.
///
/// Accepts `today`, `yesterday`, `tomorrow`, `YYYYMMDD` and `YYYY-MM-DD`
/// (case-insensitive, surrounding whitespace ignored).
///
/// # Examples
///
/// ```ignore
/// let today = NaiveDate::from_ymd_opt(2025, 11, 22).unwrap();
/// assert_eq!(parse_date_arg("yesterday", today).unwrap(), today.pred_opt().unwrap());
/// assert_eq!(parse_date_arg("20251120", today).unwrap().day(), 20);
/// ```
pub fn parse_date_arg(raw: &str, today: NaiveDate) -> Result<NaiveDate, String> {
    let s = raw.trim().to_lowercase();
    match s.as_str() {
        "today" => Ok(today),
        "yesterday" => Ok(today - Duration::days(1)),
        "tomorrow" => Ok(today + Duration::days(1)),
        _ if s.len() == 8 && s.chars().all(|c| c.is_ascii_digit()) => {
            NaiveDate::parse_from_str(&s, "%Y%m%d").map_err(|e| format!("invalid date {raw:?}: {e}"))
        }
        _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|_| {
            format!("invalid date {raw:?}: expected YYYY-MM-DD, YYYYMMDD, today, yesterday or tomorrow")
        }),
    }
}

/// Every date from `start` to `end` inclusive, ascending. Empty when `start > end`.
pub fn date_span(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|d| *d <= end).collect()
}

/// The `days` most recent dates ending at `today`, oldest first.
///
/// Errors when the first of those dates is outside the calendar range.
pub fn recent_days(today: NaiveDate, days: u32) -> Result<Vec<NaiveDate>, String> {
    if days == 0 {
        return Ok(Vec::new());
    }
    let start = today
        .checked_sub_signed(Duration::days(i64::from(days) - 1))
        .ok_or_else(|| format!("{days} days before {today} is out of range"))?;
    Ok(date_span(start, today))
}

/// `2025年11月02日` style rendering.
pub fn cn_date(date: NaiveDate) -> String {
    format!("{}年{:02}月{:02}日", date.year(), date.month(), date.day())
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` characters (not bytes, the transcripts are
/// mostly CJK) with an ellipsis and a count of the dropped characters.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log("新闻联播文字版", 4), "新闻联播…(+3 chars)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    let total = s.chars().count();
    if total <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max).collect();
        format!("{}…(+{} chars)", head, total - max)
    }
}

/// Shorten to `max` characters with a trailing `...`, for report tables.
pub fn shorten(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max).collect();
        format!("{head}...")
    }
}

/// Ensure a directory exists and is writable.
///
/// This function creates the directory if it doesn't exist, then performs
/// a write test by creating and immediately deleting a probe file.
///
/// # Errors
///
/// Returns an error if:
/// - The directory cannot be created
/// - The directory is not writable (permission denied, read-only filesystem, etc.)
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    let probe_path = path.join("..__probe_write__");
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Output directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}
