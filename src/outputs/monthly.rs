//! Monthly digests: every record of a month concatenated into one file,
//! `<reports_dir>/YYYY年MM月新闻汇总.md`.

use crate::outputs::records::list_records;
use chrono::{Datelike, Local, NaiveDate};
use itertools::Itertools;
use std::error::Error;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument, warn};

pub fn digest_path(reports_dir: &Path, year: i32, month: u32) -> PathBuf {
    reports_dir.join(format!("{year}年{month:02}月新闻汇总.md"))
}

/// Render one month from `(date, record text)` pairs in ascending order.
pub fn render_digest(year: i32, month: u32, days: &[(NaiveDate, String)], generated: &str) -> String {
    let mut md = String::new();
    writeln!(md, "# {year}年{month:02}月新闻汇总\n").unwrap();
    writeln!(md, "整理时间：{generated}").unwrap();
    writeln!(md, "总计新闻日期：{} 天\n", days.len()).unwrap();
    writeln!(md, "---").unwrap();
    for (date, body) in days {
        writeln!(md, "\n## {date}\n").unwrap();
        writeln!(md, "{}", body.trim_end()).unwrap();
        writeln!(md, "\n---").unwrap();
    }
    md
}

/// Build a digest for every month that has records. Returns the written paths.
#[instrument(level = "info", skip_all, fields(news_dir = %news_dir.display(), reports_dir = %reports_dir.display()))]
pub async fn merge_monthly(news_dir: &Path, reports_dir: &Path) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    let records = list_records(news_dir).await?;
    if records.is_empty() {
        warn!("No records to merge");
        return Ok(Vec::new());
    }
    fs::create_dir_all(reports_dir).await?;

    let generated = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let mut written = Vec::new();

    let months: Vec<((i32, u32), Vec<(NaiveDate, PathBuf)>)> = records
        .into_iter()
        .chunk_by(|(d, _)| (d.year(), d.month()))
        .into_iter()
        .map(|(month, group)| (month, group.collect()))
        .collect();

    for ((year, month), group) in months {
        let mut days = Vec::new();
        for (date, path) in group {
            match fs::read_to_string(&path).await {
                Ok(body) => days.push((date, body)),
                Err(e) => warn!(file = %path.display(), error = %e, "Skipping unreadable record"),
            }
        }
        let path = digest_path(reports_dir, year, month);
        fs::write(&path, render_digest(year, month, &days, &generated)).await?;
        info!(path = %path.display(), days = days.len(), "Wrote monthly digest");
        written.push(path);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_render_digest_layout() {
        let days = vec![
            (ymd(2025, 11, 1), "# 一日\n".to_string()),
            (ymd(2025, 11, 2), "# 二日".to_string()),
        ];
        let md = render_digest(2025, 11, &days, "2025-12-01 08:00:00");
        assert!(md.starts_with("# 2025年11月新闻汇总\n\n整理时间：2025-12-01 08:00:00\n总计新闻日期：2 天\n"));
        assert!(md.contains("\n## 2025-11-01\n\n# 一日\n\n---\n"));
        assert!(md.find("2025-11-01").unwrap() < md.find("2025-11-02").unwrap());
    }

    #[tokio::test]
    async fn test_merge_monthly_groups_by_month() {
        let tmp = tempfile::tempdir().unwrap();
        let news = tmp.path().join("news");
        let reports = tmp.path().join("reports");
        std::fs::create_dir_all(&news).unwrap();
        for (name, body) in [
            ("20251130.md", "# 十一月三十日"),
            ("20251201.md", "# 十二月一日"),
            ("20251101.md", "# 十一月一日"),
            ("not_exist.md", "# 缺失"),
        ] {
            std::fs::write(news.join(name), body).unwrap();
        }

        let written = merge_monthly(&news, &reports).await.unwrap();
        assert_eq!(
            written,
            vec![digest_path(&reports, 2025, 11), digest_path(&reports, 2025, 12)]
        );

        let november = std::fs::read_to_string(digest_path(&reports, 2025, 11)).unwrap();
        assert!(november.contains("总计新闻日期：2 天"));
        assert!(november.find("十一月一日").unwrap() < november.find("十一月三十日").unwrap());
        assert!(!november.contains("缺失"));
    }

    #[tokio::test]
    async fn test_merge_monthly_without_records() {
        let tmp = tempfile::tempdir().unwrap();
        let written = merge_monthly(&tmp.path().join("news"), &tmp.path().join("reports"))
            .await
            .unwrap();
        assert!(written.is_empty());
    }
}
