//! Per-date transcript records.
//!
//! One Markdown file per filing date, named after its eight-digit key:
//!
//! ```text
//! news_dir/
//! ├── 20251121.md
//! ├── 20251122.md
//! └── not_exist.md      # missing-dates ledger, see [`super::ledger`]
//! ```
//!
//! Re-filing a date overwrites its record. The file is written to a sibling
//! temporary path and renamed into place, so an interrupted run leaves either
//! the old record or the new one.

use crate::models::NewsItem;
use crate::utils::cn_date;
use chrono::NaiveDate;
use std::error::Error;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, error, info, instrument, warn};

/// `<news_dir>/YYYYMMDD.md`
pub fn record_path(news_dir: &Path, date: NaiveDate) -> PathBuf {
    news_dir.join(format!("{}.md", date.format("%Y%m%d")))
}

/// Title used when the article page had no heading.
pub fn default_title(date: NaiveDate) -> String {
    format!("{}新闻联播文字版", cn_date(date))
}

/// Render a [`NewsItem`] as its Markdown record.
pub fn render_record(item: &NewsItem) -> String {
    let title = if item.title.trim().is_empty() {
        default_title(item.date)
    } else {
        item.title.trim().to_string()
    };
    let origin = if item.is_fallback() {
        "目录日期（页面未标注日期）"
    } else {
        "页面标注"
    };

    let mut md = String::new();
    writeln!(md, "# {title}\n").unwrap();
    writeln!(md, "**日期**: {} ({})", cn_date(item.date), item.date.format("%Y-%m-%d")).unwrap();
    writeln!(md, "**来源**: [{}]({})", item.url, item.url).unwrap();
    writeln!(md, "**目录页**: [{}]({})", item.source_url, item.source_url).unwrap();
    writeln!(md, "**爬取时间**: {}", item.crawled_at.format("%Y-%m-%d %H:%M:%S")).unwrap();
    writeln!(md, "**日期来源**: {origin}").unwrap();
    writeln!(md, "\n---\n").unwrap();
    writeln!(md, "{}", item.content.trim_end()).unwrap();
    writeln!(md, "\n---\n").unwrap();
    writeln!(md, "*来源链接: {}*", item.url).unwrap();
    md
}

/// Write the record for `item`, replacing any previous one for the same date.
#[instrument(level = "info", skip_all, fields(news_dir = %news_dir.display(), key = %item.record_key()))]
pub async fn write_record(news_dir: &Path, item: &NewsItem) -> Result<PathBuf, Box<dyn Error>> {
    if let Err(e) = fs::create_dir_all(news_dir).await {
        error!(error = %e, "Failed to create news dir");
        return Err(e.into());
    }

    let path = record_path(news_dir, item.date);
    let staging = path.with_extension("md.tmp");
    let replaced = fs::try_exists(&path).await.unwrap_or(false);

    fs::write(&staging, render_record(item)).await?;
    fs::rename(&staging, &path).await?;

    if replaced {
        info!(path = %path.display(), "Overwrote existing record");
    } else {
        info!(path = %path.display(), "Wrote record");
    }
    Ok(path)
}

pub async fn record_exists(news_dir: &Path, date: NaiveDate) -> bool {
    fs::try_exists(record_path(news_dir, date)).await.unwrap_or(false)
}

/// All `YYYYMMDD.md` records in `news_dir`, ascending by date.
///
/// Files whose stem is not a valid eight-digit date are ignored. A missing
/// directory yields an empty list.
#[instrument(level = "debug", skip_all, fields(news_dir = %news_dir.display()))]
pub async fn list_records(news_dir: &Path) -> Result<Vec<(NaiveDate, PathBuf)>, Box<dyn Error>> {
    let mut entries = match fs::read_dir(news_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("News directory does not exist yet");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let mut records = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if stem.len() != 8 || !stem.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        match NaiveDate::parse_from_str(stem, "%Y%m%d") {
            Ok(date) => records.push((date, path)),
            Err(_) => debug!(file = %path.display(), "Skipping file with invalid date stem"),
        }
    }
    records.sort_by_key(|(date, _)| *date);
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DateOrigin;
    use chrono::{Local, TimeZone};

    fn item(date: NaiveDate, title: &str, origin: DateOrigin) -> NewsItem {
        NewsItem {
            title: title.to_string(),
            content: "今日新闻联播主要内容：\n\n* 【国内联播快讯】".to_string(),
            date,
            date_origin: origin,
            url: "http://mrxwlb.com/2025/11/22/a/".to_string(),
            source_url: "http://mrxwlb.com/2025/11/22/".to_string(),
            crawled_at: Local.with_ymd_and_hms(2025, 11, 22, 20, 30, 0).unwrap(),
        }
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_render_record_fields() {
        let md = render_record(&item(ymd(2025, 11, 22), "2025年11月22日新闻联播文字版", DateOrigin::Asserted));
        assert!(md.starts_with("# 2025年11月22日新闻联播文字版\n\n"));
        assert!(md.contains("**日期**: 2025年11月22日 (2025-11-22)"));
        assert!(md.contains("**来源**: [http://mrxwlb.com/2025/11/22/a/]"));
        assert!(md.contains("**目录页**: [http://mrxwlb.com/2025/11/22/]"));
        assert!(md.contains("**爬取时间**: 2025-11-22 20:30:00"));
        assert!(md.contains("**日期来源**: 页面标注"));
        assert!(md.contains("* 【国内联播快讯】"));
        assert!(md.trim_end().ends_with("*来源链接: http://mrxwlb.com/2025/11/22/a/*"));
    }

    #[test]
    fn test_render_record_default_title_and_fallback_flag() {
        let md = render_record(&item(ymd(2025, 1, 7), "  ", DateOrigin::DirectoryFallback));
        assert!(md.starts_with("# 2025年01月07日新闻联播文字版"));
        assert!(md.contains("目录日期"));
    }

    #[tokio::test]
    async fn test_write_record_overwrites_same_date() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("news");

        let first = item(ymd(2025, 11, 22), "第一版", DateOrigin::Asserted);
        let path = write_record(&dir, &first).await.unwrap();
        assert_eq!(path, dir.join("20251122.md"));
        assert!(record_exists(&dir, ymd(2025, 11, 22)).await);

        let second = item(ymd(2025, 11, 22), "第二版", DateOrigin::Asserted);
        write_record(&dir, &second).await.unwrap();
        let body = std::fs::read_to_string(&path).unwrap();
        assert!(body.starts_with("# 第二版"));
        assert!(!dir.join("20251122.md.tmp").exists());
    }

    #[tokio::test]
    async fn test_list_records_filters_and_sorts() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["20251122.md", "20251101.md", "not_exist.md", "20251340.md", "2025112.md", "20251121.txt"] {
            std::fs::write(tmp.path().join(name), "x").unwrap();
        }
        let records = list_records(tmp.path()).await.unwrap();
        let dates: Vec<NaiveDate> = records.into_iter().map(|(d, _)| d).collect();
        assert_eq!(dates, vec![ymd(2025, 11, 1), ymd(2025, 11, 22)]);
    }

    #[tokio::test]
    async fn test_list_records_missing_dir_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(list_records(&tmp.path().join("nope")).await.unwrap().is_empty());
    }
}
