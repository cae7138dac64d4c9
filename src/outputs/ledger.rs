//! Missing-dates ledger (`not_exist.md`).
//!
//! Lists every date whose directory could not be resolved, grouped by month,
//! with a running total. The file is rewritten from the parsed set of dates
//! on every change, so repeated runs never duplicate an entry.
//!
//! ```text
//! # 缺失的新闻日期
//!
//! **更新时间**: 2025-11-24 20:05:11
//!
//! ## 缺失日期列表
//!
//! ### 2025年11月
//!
//! - 20251123 (2025年11月23日)
//!
//! ---
//!
//! **总计**: 1 个日期缺失新闻
//! ```

use crate::utils::cn_date;
use chrono::{Datelike, Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument};

pub const LEDGER_FILE: &str = "not_exist.md";

/// `- 20251123` entries, and the older `- 2025-11-23` form.
static ENTRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^- (\d{4})-?(\d{2})-?(\d{2})\b").unwrap());

pub fn ledger_path(news_dir: &Path) -> PathBuf {
    news_dir.join(LEDGER_FILE)
}

/// Dates listed in ledger text. Unparseable entries are ignored.
pub fn parse_ledger(text: &str) -> BTreeSet<NaiveDate> {
    ENTRY
        .captures_iter(text)
        .filter_map(|caps| {
            NaiveDate::from_ymd_opt(caps[1].parse().ok()?, caps[2].parse().ok()?, caps[3].parse().ok()?)
        })
        .collect()
}

pub fn render_ledger(dates: &BTreeSet<NaiveDate>, updated: &str) -> String {
    let mut md = String::new();
    writeln!(md, "# 缺失的新闻日期\n").unwrap();
    writeln!(md, "本文档记录所有未找到新闻的日期。\n").unwrap();
    writeln!(md, "**更新时间**: {updated}\n").unwrap();
    writeln!(md, "## 缺失日期列表").unwrap();

    let mut current_month: Option<(i32, u32)> = None;
    for date in dates {
        let month = (date.year(), date.month());
        if current_month != Some(month) {
            writeln!(md, "\n### {}年{:02}月\n", month.0, month.1).unwrap();
            current_month = Some(month);
        }
        writeln!(md, "- {} ({})", date.format("%Y%m%d"), cn_date(*date)).unwrap();
    }

    writeln!(md, "\n---\n").unwrap();
    writeln!(md, "**总计**: {} 个日期缺失新闻", dates.len()).unwrap();
    md
}

async fn read_ledger(path: &Path) -> Result<BTreeSet<NaiveDate>, Box<dyn Error>> {
    match fs::read_to_string(path).await {
        Ok(text) => Ok(parse_ledger(&text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeSet::new()),
        Err(e) => Err(e.into()),
    }
}

async fn write_ledger(path: &Path, dates: &BTreeSet<NaiveDate>) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let updated = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    fs::write(path, render_ledger(dates, &updated)).await?;
    Ok(())
}

/// Add `date` to the ledger. Returns `false` when it was already listed.
#[instrument(level = "info", skip(news_dir), fields(news_dir = %news_dir.display()))]
pub async fn add_missing(news_dir: &Path, date: NaiveDate) -> Result<bool, Box<dyn Error>> {
    let path = ledger_path(news_dir);
    let mut dates = read_ledger(&path).await?;
    if !dates.insert(date) {
        debug!("Date already in ledger");
        return Ok(false);
    }
    write_ledger(&path, &dates).await?;
    info!(total = dates.len(), "Recorded missing date");
    Ok(true)
}

/// Remove `date` from the ledger. Returns `false` when it was not listed.
#[instrument(level = "info", skip(news_dir), fields(news_dir = %news_dir.display()))]
pub async fn remove_missing(news_dir: &Path, date: NaiveDate) -> Result<bool, Box<dyn Error>> {
    let path = ledger_path(news_dir);
    let mut dates = read_ledger(&path).await?;
    if !dates.remove(&date) {
        return Ok(false);
    }
    write_ledger(&path, &dates).await?;
    info!(total = dates.len(), "Date filed; removed from missing ledger");
    Ok(true)
}
