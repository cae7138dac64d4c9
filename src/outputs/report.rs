//! Run reports.
//!
//! Every non-dry run writes two files under the reports directory, named
//! after the day the run happened:
//!
//! - `YYYY-MM-DD.md`: human-readable statistics, a filed-items table, missing
//!   dates, article failures grouped by kind, collisions and fallbacks, and
//!   per-item details.
//! - `YYYY-MM-DD.json`: the same run as data, one entry per target date with
//!   its status, items and failure count, plus the tally.
//!
//! A second run on the same day replaces both files.

use crate::error::FailureKind;
use crate::models::{ArticleFailure, Collision, DateOutcome, DateStatus, NewsItem, RunTally};
use crate::utils::shorten;
use chrono::{DateTime, Local, NaiveDate};
use itertools::Itertools;
use serde::Serialize;
use std::error::Error;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

const TITLE_WIDTH: usize = 50;

/// One run, as handed to the report writer.
#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub generated_at: DateTime<Local>,
    /// Inclusive range requested on the command line, if any.
    pub range: Option<(NaiveDate, NaiveDate)>,
    pub tally: RunTally,
    pub dates: Vec<DateEntry<'a>>,
}

/// Per-target-date view exposed to report consumers.
#[derive(Debug, Serialize)]
pub struct DateEntry<'a> {
    pub date: NaiveDate,
    pub status: DateStatus,
    pub items: &'a [NewsItem],
    pub failure_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<&'a str>,
    /// Markdown only; the JSON carries the count.
    #[serde(skip)]
    pub failures: &'a [ArticleFailure],
    #[serde(skip)]
    pub collisions: &'a [Collision],
}

impl<'a> RunReport<'a> {
    pub fn new(outcomes: &'a [DateOutcome], tally: RunTally, range: Option<(NaiveDate, NaiveDate)>) -> Self {
        let dates = outcomes
            .iter()
            .map(|o| DateEntry {
                date: o.target,
                status: o.status,
                items: &o.items,
                failure_count: o.failure_count(),
                skip_reason: o.skip_reason.as_deref(),
                failures: &o.failures,
                collisions: &o.collisions,
            })
            .collect();
        Self {
            generated_at: Local::now(),
            range,
            tally,
            dates,
        }
    }
}

fn kind_label(kind: FailureKind) -> &'static str {
    match kind {
        FailureKind::Transport => "网络错误",
        FailureKind::NotFound => "页面不存在",
        FailureKind::HttpStatus => "HTTP 错误",
        FailureKind::Parse => "解析失败（页面结构变化）",
        FailureKind::Undated => "无法确定日期",
        FailureKind::Write => "写入失败",
    }
}

/// Render the Markdown report.
pub fn render_markdown(report: &RunReport<'_>) -> String {
    let day = report.generated_at.format("%Y-%m-%d");
    let mut md = String::new();

    match report.range {
        Some((start, end)) => writeln!(md, "# 每日新闻爬取报告 - {day}（{start} 至 {end}）\n").unwrap(),
        None => writeln!(md, "# 每日新闻爬取报告 - {day}\n").unwrap(),
    }
    writeln!(md, "**生成时间**: {}", report.generated_at.format("%Y-%m-%d %H:%M:%S")).unwrap();
    if let Some((start, end)) = report.range {
        writeln!(md, "**爬取日期范围**: {start} 至 {end}").unwrap();
    }

    let t = &report.tally;
    writeln!(md, "\n## 📊 统计信息\n").unwrap();
    writeln!(md, "- ✅ **成功**: {} 条", t.filed).unwrap();
    writeln!(md, "- 🈳 **缺失**: {} 天", t.missing).unwrap();
    writeln!(md, "- ❌ **失败**: {} 篇（其中解析失败 {} 篇）", t.failed, t.parse_errors).unwrap();
    writeln!(md, "- ⏭️ **跳过**: {} 条", t.skipped).unwrap();
    if t.collisions > 0 || t.fallbacks > 0 {
        writeln!(md, "- ⚠️ **同日冲突**: {} 次，**日期回退**: {} 条", t.collisions, t.fallbacks).unwrap();
    }
    if t.write_failures > 0 {
        writeln!(md, "- 💾 **写入失败**: {} 次", t.write_failures).unwrap();
    }

    let items: Vec<&NewsItem> = report
        .dates
        .iter()
        .flat_map(|o| o.items.iter())
        .sorted_by_key(|i| i.date)
        .collect();

    if !items.is_empty() {
        writeln!(md, "\n## ✅ 成功爬取的新闻\n").unwrap();
        writeln!(md, "| 日期 | 标题 | URL |").unwrap();
        writeln!(md, "|------|------|-----|").unwrap();
        for item in &items {
            writeln!(
                md,
                "| {} | {} | [{}]({}) |",
                item.date,
                shorten(&item.title, TITLE_WIDTH),
                item.url,
                item.url
            )
            .unwrap();
        }
    }

    let missing: Vec<NaiveDate> = report
        .dates
        .iter()
        .filter(|d| d.status == DateStatus::Missing)
        .map(|d| d.date)
        .sorted()
        .dedup()
        .collect();
    if !missing.is_empty() {
        writeln!(md, "\n## 🈳 缺失的日期\n").unwrap();
        for date in missing {
            writeln!(md, "- {date}").unwrap();
        }
    }

    let failures = report
        .dates
        .iter()
        .flat_map(|d| d.failures.iter().map(move |f| (d.date, f)))
        .into_group_map_by(|(_, f)| f.kind);
    if !failures.is_empty() {
        writeln!(md, "\n## ❌ 失败的文章\n").unwrap();
        for (kind, entries) in failures.into_iter().sorted_by_key(|(k, _)| kind_label(*k)) {
            writeln!(md, "### {}\n", kind_label(kind)).unwrap();
            for (target, failure) in entries {
                writeln!(md, "- {target}: {} ({})", failure.url, failure.message).unwrap();
            }
            writeln!(md).unwrap();
        }
    }

    let collisions: Vec<&Collision> = report.dates.iter().flat_map(|d| d.collisions.iter()).collect();
    let fallbacks: Vec<&&NewsItem> = items.iter().filter(|i| i.is_fallback()).collect();
    if !collisions.is_empty() || !fallbacks.is_empty() {
        writeln!(md, "\n## ⚠️ 日期异常\n").unwrap();
        for c in collisions {
            writeln!(md, "- 冲突 {}: 保留 {}，丢弃 {}", c.date, c.kept_url, c.discarded_url).unwrap();
        }
        for item in fallbacks {
            writeln!(md, "- 回退 {}: {} 未标注日期，按目录日期归档", item.date, item.url).unwrap();
        }
    }

    let skipped: Vec<_> = report
        .dates
        .iter()
        .filter_map(|d| d.skip_reason.map(|r| (d.date, r)))
        .collect();
    if !skipped.is_empty() {
        writeln!(md, "\n## ⏭️ 跳过的日期\n").unwrap();
        for (date, reason) in skipped {
            writeln!(md, "- {date}: {reason}").unwrap();
        }
    }

    if !items.is_empty() {
        writeln!(md, "\n## 📝 详细信息").unwrap();
        for item in &items {
            writeln!(md, "\n### {} - {}\n", item.date, item.title).unwrap();
            writeln!(md, "- **URL**: [{}]({})", item.url, item.url).unwrap();
            writeln!(md, "- **目录页**: {}", item.source_url).unwrap();
            writeln!(md, "- **爬取时间**: {}", item.crawled_at.format("%Y-%m-%d %H:%M:%S")).unwrap();
        }
    }

    md
}

/// Write `YYYY-MM-DD.md` and `YYYY-MM-DD.json`; returns the Markdown path.
#[instrument(level = "info", skip_all, fields(reports_dir = %reports_dir.display()))]
pub async fn save_report(reports_dir: &Path, report: &RunReport<'_>) -> Result<PathBuf, Box<dyn Error>> {
    fs::create_dir_all(reports_dir).await?;
    let stem = report.generated_at.format("%Y-%m-%d").to_string();

    let md_path = reports_dir.join(format!("{stem}.md"));
    fs::write(&md_path, render_markdown(report)).await?;

    let json_path = reports_dir.join(format!("{stem}.json"));
    fs::write(&json_path, serde_json::to_string_pretty(report)?).await?;

    info!(md = %md_path.display(), json = %json_path.display(), "Saved run report");
    Ok(md_path)
}
