//! Batch runner: walks target dates in order and hands results to the sink.
//!
//! Per date: check the air-time guard and, optionally, whether a record
//! already exists; otherwise resolve the date and persist what came back.
//! Dates are independent. A failure on one date, including a failed write,
//! is logged and counted, and the run moves on. An item whose record could
//! not be written is dropped from its outcome and reported as a failure.
//!
//! Within one run, a filing date written for an earlier target is not
//! written again by a later target.

use crate::error::{FailureKind, FetchError};
use crate::fetch::FetchPage;
use crate::models::{ArticleFailure, DateOutcome, DateStatus, RunTally};
use crate::outputs::RecordSink;
use crate::reconcile::Resolver;
use chrono::{NaiveDate, NaiveDateTime, Timelike};
use std::collections::BTreeSet;
use tracing::{error, info, instrument, warn};

/// Conditions under which a target date is not attempted.
#[derive(Debug, Clone, Copy)]
pub struct Guard {
    /// Local wall-clock time of the run.
    pub now: NaiveDateTime,
    /// Today's broadcast is not expected online before this hour.
    pub broadcast_hour: u32,
    /// Skip dates that already have a record.
    pub skip_existing: bool,
}

impl Guard {
    /// Why `target` cannot have a transcript yet, if it cannot.
    pub fn not_yet_aired(&self, target: NaiveDate) -> Option<&'static str> {
        let today = self.now.date();
        if target > today {
            Some("future date")
        } else if target == today && self.now.hour() < self.broadcast_hour {
            Some("not yet aired")
        } else {
            None
        }
    }
}

/// Everything a run produced, in target-date order.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub outcomes: Vec<DateOutcome>,
    pub tally: RunTally,
}

impl RunSummary {
    fn push(&mut self, outcome: DateOutcome) {
        self.tally.absorb(&outcome);
        self.outcomes.push(outcome);
    }
}

/// Resolve and persist `dates` in the given order.
#[instrument(level = "info", skip_all, fields(dates = dates.len()))]
pub async fn crawl_dates<F, S>(resolver: &Resolver<F>, sink: &S, dates: &[NaiveDate], guard: &Guard) -> RunSummary
where
    F: FetchPage,
    S: RecordSink,
{
    let mut summary = RunSummary::default();
    let mut filed_this_run: BTreeSet<NaiveDate> = BTreeSet::new();

    for &target in dates {
        if let Some(reason) = guard.not_yet_aired(target) {
            info!(date = %target, reason, event = "skipped", "Skipping date");
            summary.push(DateOutcome::skipped(target, reason));
            continue;
        }
        if guard.skip_existing && sink.has_record(target).await {
            info!(date = %target, reason = "record exists", event = "skipped", "Skipping date");
            summary.push(DateOutcome::skipped(target, "record exists"));
            continue;
        }

        let mut outcome = resolver.resolve(target).await;
        summary.tally.write_failures += persist(sink, &mut outcome, &mut filed_this_run).await;
        summary.push(outcome);
    }

    info!(
        filed = summary.tally.filed,
        missing = summary.tally.missing,
        failed = summary.tally.failed,
        skipped = summary.tally.skipped,
        "Batch finished"
    );
    summary
}

/// Fetch one known article URL and persist it.
///
/// `date_hint` files an undated page; it is also the report date when the
/// fetch fails (falling back to `today`).
#[instrument(level = "info", skip(resolver, sink))]
pub async fn crawl_url<F, S>(
    resolver: &Resolver<F>,
    sink: &S,
    url: &str,
    date_hint: Option<NaiveDate>,
    today: NaiveDate,
) -> RunSummary
where
    F: FetchPage,
    S: RecordSink,
{
    let mut summary = RunSummary::default();
    let mut outcome = match resolver.resolve_url(url, date_hint).await {
        Ok(item) => {
            let date = item.date;
            DateOutcome {
                status: DateStatus::Filed,
                attempted: 1,
                items: vec![item],
                ..DateOutcome::missing(date)
            }
        }
        Err(e) => {
            log_url_failure(&e);
            DateOutcome {
                status: DateStatus::PartialFailure,
                attempted: 1,
                failures: vec![ArticleFailure::from(&e)],
                ..DateOutcome::missing(date_hint.unwrap_or(today))
            }
        }
    };

    summary.tally.write_failures += persist(sink, &mut outcome, &mut BTreeSet::new()).await;
    summary.push(outcome);
    summary
}

fn log_url_failure(err: &FetchError) {
    match err {
        FetchError::NotFound { url } => info!(%url, "Article not found"),
        _ => warn!(error = %err, kind = ?err.kind(), "Article could not be filed"),
    }
}

/// Hand one date's outcome to the sink. Returns the number of failed writes.
///
/// On return `outcome.items` holds only what was actually written.
async fn persist<S: RecordSink>(
    sink: &S,
    outcome: &mut DateOutcome,
    filed_this_run: &mut BTreeSet<NaiveDate>,
) -> usize {
    let mut write_failures = 0;

    match outcome.status {
        DateStatus::Missing => {
            if let Err(e) = sink.record_missing(outcome.target).await {
                error!(date = %outcome.target, error = %e, "Failed to update missing ledger");
                write_failures += 1;
            }
        }
        DateStatus::Filed | DateStatus::PartialFailure => {
            let target = outcome.target;
            let before = outcome.items.len();
            outcome.items.retain(|item| {
                let fresh = !filed_this_run.contains(&item.date);
                if !fresh {
                    info!(
                        target_date = %target,
                        date = %item.date,
                        url = %item.url,
                        event = "already_filed",
                        "Date already filed earlier in this run; not overwriting"
                    );
                }
                fresh
            });
            outcome.already_filed = before - outcome.items.len();

            let mut written = Vec::with_capacity(outcome.items.len());
            for item in std::mem::take(&mut outcome.items) {
                match sink.file(&item).await {
                    Ok(_) => {
                        filed_this_run.insert(item.date);
                        if let Err(e) = sink.clear_missing(item.date).await {
                            error!(date = %item.date, error = %e, "Failed to update missing ledger");
                            write_failures += 1;
                        }
                        written.push(item);
                    }
                    Err(e) => {
                        error!(date = %item.date, url = %item.url, error = %e, "Failed to write record");
                        write_failures += 1;
                        outcome.failures.push(ArticleFailure {
                            url: item.url,
                            kind: FailureKind::Write,
                            message: format!("writing record {}: {e}", item.date.format("%Y%m%d")),
                        });
                        outcome.status = DateStatus::PartialFailure;
                    }
                }
            }
            outcome.items = written;
        }
        DateStatus::Skipped => {}
    }

    write_failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::stub::StubFetcher;
    use crate::models::NewsItem;
    use crate::outputs::{FileStore, ledger};
    use crate::reconcile::tests::{BASE, article_html, directory_html};
    use std::error::Error;
    use std::path::PathBuf;
    use std::sync::Mutex;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn guard_at(date: NaiveDate, hour: u32) -> Guard {
        Guard {
            now: date.and_hms_opt(hour, 0, 0).unwrap(),
            broadcast_hour: 19,
            skip_existing: false,
        }
    }

    /// In-memory sink recording every call.
    #[derive(Default)]
    struct Recorder {
        existing: BTreeSet<NaiveDate>,
        fail_writes: bool,
        filed: Mutex<Vec<NewsItem>>,
        missing: Mutex<Vec<NaiveDate>>,
        cleared: Mutex<Vec<NaiveDate>>,
    }

    impl RecordSink for Recorder {
        async fn has_record(&self, date: NaiveDate) -> bool {
            self.existing.contains(&date)
        }

        async fn file(&self, item: &NewsItem) -> Result<PathBuf, Box<dyn Error>> {
            if self.fail_writes {
                return Err("disk full".into());
            }
            self.filed.lock().unwrap().push(item.clone());
            Ok(PathBuf::from(format!("{}.md", item.record_key())))
        }

        async fn record_missing(&self, date: NaiveDate) -> Result<(), Box<dyn Error>> {
            self.missing.lock().unwrap().push(date);
            Ok(())
        }

        async fn clear_missing(&self, date: NaiveDate) -> Result<(), Box<dyn Error>> {
            self.cleared.lock().unwrap().push(date);
            Ok(())
        }
    }

    fn site_20251122() -> StubFetcher {
        StubFetcher::new()
            .page(
                "http://mrxwlb.com/2025/11/22/",
                &directory_html("2025/11/22", &["xwlb"]),
            )
            .page(
                "http://mrxwlb.com/2025/11/22/xwlb/",
                &article_html("2025年11月22日新闻联播文字版", "正文"),
            )
    }

    #[test]
    fn test_guard_air_time() {
        let guard = guard_at(ymd(2025, 11, 22), 18);
        assert_eq!(guard.not_yet_aired(ymd(2025, 11, 23)), Some("future date"));
        assert_eq!(guard.not_yet_aired(ymd(2025, 11, 22)), Some("not yet aired"));
        assert_eq!(guard.not_yet_aired(ymd(2025, 11, 21)), None);

        let guard = guard_at(ymd(2025, 11, 22), 19);
        assert_eq!(guard.not_yet_aired(ymd(2025, 11, 22)), None);
    }

    #[tokio::test]
    async fn test_crawl_files_and_clears_ledger() {
        let resolver = Resolver::new(site_20251122(), BASE, 1);
        let sink = Recorder::default();
        let summary = crawl_dates(&resolver, &sink, &[ymd(2025, 11, 22)], &guard_at(ymd(2025, 11, 23), 8)).await;

        assert_eq!(summary.tally.filed, 1);
        assert_eq!(summary.outcomes[0].status, DateStatus::Filed);
        assert_eq!(sink.filed.lock().unwrap()[0].record_key(), "20251122");
        assert_eq!(*sink.cleared.lock().unwrap(), vec![ymd(2025, 11, 22)]);
        assert!(sink.missing.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_crawl_skips_unaired_dates_without_fetching() {
        let resolver = Resolver::new(site_20251122(), BASE, 1);
        let sink = Recorder::default();
        let summary = crawl_dates(
            &resolver,
            &sink,
            &[ymd(2025, 11, 22), ymd(2025, 11, 23)],
            &guard_at(ymd(2025, 11, 22), 12),
        )
        .await;

        assert_eq!(summary.tally.skipped, 2);
        assert!(summary.outcomes.iter().all(|o| o.status == DateStatus::Skipped));
        assert!(resolver.fetcher().calls().is_empty());
        assert!(sink.missing.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_crawl_skip_existing() {
        let resolver = Resolver::new(site_20251122(), BASE, 1);
        let sink = Recorder {
            existing: [ymd(2025, 11, 22)].into(),
            ..Recorder::default()
        };
        let guard = Guard {
            skip_existing: true,
            ..guard_at(ymd(2025, 11, 30), 20)
        };
        let summary = crawl_dates(&resolver, &sink, &[ymd(2025, 11, 22)], &guard).await;

        assert_eq!(summary.outcomes[0].skip_reason.as_deref(), Some("record exists"));
        assert!(resolver.fetcher().calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_date_lands_in_ledger() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::new(tmp.path());
        let resolver = Resolver::new(StubFetcher::new(), BASE, 1);

        let summary = crawl_dates(&resolver, &store, &[ymd(2025, 11, 23)], &guard_at(ymd(2025, 11, 30), 20)).await;

        assert_eq!(summary.tally.missing, 1);
        assert_eq!(summary.tally.filed, 0);
        assert_eq!(summary.tally.failed, 0);
        let text = std::fs::read_to_string(ledger::ledger_path(tmp.path())).unwrap();
        assert!(text.contains("- 20251123 (2025年11月23日)"));
        assert!(text.contains("**总计**: 1 个日期缺失新闻"));
    }

    #[tokio::test]
    async fn test_later_target_does_not_overwrite_earlier_filing() {
        let fetcher = StubFetcher::new()
            .page(
                "http://mrxwlb.com/2025/12/01/",
                &directory_html("2025/12/01", &["a"]),
            )
            .page(
                "http://mrxwlb.com/2025/12/01/a/",
                &article_html("2025年12月02日新闻联播文字版", "经一日目录"),
            )
            .page(
                "http://mrxwlb.com/2025/12/02/",
                &directory_html("2025/12/02", &["b"]),
            )
            .page(
                "http://mrxwlb.com/2025/12/02/b/",
                &article_html("2025年12月02日新闻联播文字版", "经二日目录"),
            );
        let resolver = Resolver::new(fetcher, BASE, 1);
        let sink = Recorder::default();
        let summary = crawl_dates(
            &resolver,
            &sink,
            &[ymd(2025, 12, 1), ymd(2025, 12, 2)],
            &guard_at(ymd(2025, 12, 3), 20),
        )
        .await;

        let filed = sink.filed.lock().unwrap();
        assert_eq!(filed.len(), 1);
        assert!(filed[0].content.contains("经一日目录"));
        assert_eq!(summary.outcomes[1].already_filed, 1);
        assert!(summary.outcomes[1].items.is_empty());
        assert_eq!(summary.tally.filed, 1);
        assert_eq!(summary.tally.skipped, 1);
    }

    #[tokio::test]
    async fn test_write_failures_are_counted_and_run_continues() {
        let resolver = Resolver::new(site_20251122(), BASE, 1);
        let sink = Recorder {
            fail_writes: true,
            ..Recorder::default()
        };
        let summary = crawl_dates(
            &resolver,
            &sink,
            &[ymd(2025, 11, 22), ymd(2025, 11, 23)],
            &guard_at(ymd(2025, 11, 30), 20),
        )
        .await;

        assert_eq!(summary.tally.write_failures, 1);
        assert_eq!(summary.tally.filed, 0);
        assert_eq!(summary.tally.failed, 1);
        assert_eq!(summary.tally.parse_errors, 0);
        assert_eq!(summary.outcomes.len(), 2);
        assert_eq!(summary.outcomes[0].status, DateStatus::PartialFailure);
        assert!(summary.outcomes[0].items.is_empty());
        assert_eq!(summary.outcomes[0].failures[0].kind, FailureKind::Write);
        assert_eq!(summary.outcomes[0].failures[0].url, "http://mrxwlb.com/2025/11/22/xwlb/");
        assert_eq!(summary.outcomes[1].status, DateStatus::Missing);
        assert!(sink.cleared.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_write_is_not_marked_filed_this_run() {
        let resolver = Resolver::new(site_20251122(), BASE, 1);
        let sink = Recorder {
            fail_writes: true,
            ..Recorder::default()
        };
        let mut filed_this_run = BTreeSet::new();
        let mut outcome = resolver.resolve(ymd(2025, 11, 22)).await;

        let failures = persist(&sink, &mut outcome, &mut filed_this_run).await;
        assert_eq!(failures, 1);
        assert!(filed_this_run.is_empty());
    }

    #[tokio::test]
    async fn test_structure_drift_is_visible_in_tally() {
        let fetcher = StubFetcher::new()
            .page(
                "http://mrxwlb.com/2025/11/22/",
                &directory_html("2025/11/22", &["a", "b"]),
            )
            .page("http://mrxwlb.com/2025/11/22/a/", "<html><body><h1>2025年11月22日</h1></body></html>")
            .page("http://mrxwlb.com/2025/11/22/b/", "<html><body><h1>2025年11月22日</h1></body></html>");
        let resolver = Resolver::new(fetcher, BASE, 1);
        let summary = crawl_dates(&resolver, &Recorder::default(), &[ymd(2025, 11, 22)], &guard_at(ymd(2025, 11, 30), 20)).await;

        assert_eq!(summary.tally.parse_errors, 2);
        assert!(summary.tally.has_structure_drift());
        assert_eq!(summary.tally.missing, 0);
    }

    #[tokio::test]
    async fn test_crawl_url_files_under_asserted_date() {
        let fetcher = StubFetcher::new().page(
            "http://mrxwlb.com/archives/9",
            &article_html("2025年11月22日新闻联播文字版", "正文"),
        );
        let resolver = Resolver::new(fetcher, BASE, 1);
        let sink = Recorder::default();
        let summary = crawl_url(&resolver, &sink, "http://mrxwlb.com/archives/9", None, ymd(2025, 11, 30)).await;

        assert_eq!(summary.outcomes[0].target, ymd(2025, 11, 22));
        assert_eq!(summary.tally.filed, 1);
        assert_eq!(sink.filed.lock().unwrap()[0].source_url, "http://mrxwlb.com/archives/9");
    }

    #[tokio::test]
    async fn test_crawl_url_undated_page_is_not_structure_drift() {
        let fetcher = StubFetcher::new().page(
            "http://mrxwlb.com/archives/9",
            &article_html("新闻联播文字版", "正文"),
        );
        let resolver = Resolver::new(fetcher, BASE, 1);
        let sink = Recorder::default();
        let summary = crawl_url(&resolver, &sink, "http://mrxwlb.com/archives/9", None, ymd(2025, 11, 30)).await;

        assert_eq!(summary.outcomes[0].status, DateStatus::PartialFailure);
        assert_eq!(summary.outcomes[0].failures[0].kind, FailureKind::Undated);
        assert_eq!(summary.tally.failed, 1);
        assert_eq!(summary.tally.parse_errors, 0);
        assert!(!summary.tally.has_structure_drift());
        assert!(sink.filed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_crawl_url_undated_page_files_under_path_date() {
        let url = "http://mrxwlb.com/2025/11/20/xwlb/";
        let fetcher = StubFetcher::new().page(url, &article_html("新闻联播文字版", "正文"));
        let resolver = Resolver::new(fetcher, BASE, 1);
        let sink = Recorder::default();
        let summary = crawl_url(&resolver, &sink, url, None, ymd(2025, 11, 30)).await;

        assert_eq!(summary.outcomes[0].target, ymd(2025, 11, 20));
        assert_eq!(summary.tally.filed, 1);
        assert_eq!(summary.tally.fallbacks, 1);
        assert_eq!(sink.filed.lock().unwrap()[0].record_key(), "20251120");
    }

    #[tokio::test]
    async fn test_crawl_url_failure_is_reported_not_missing() {
        let resolver = Resolver::new(StubFetcher::new(), BASE, 1);
        let sink = Recorder::default();
        let summary = crawl_url(&resolver, &sink, "http://mrxwlb.com/gone/", None, ymd(2025, 11, 30)).await;

        assert_eq!(summary.outcomes[0].status, DateStatus::PartialFailure);
        assert_eq!(summary.outcomes[0].target, ymd(2025, 11, 30));
        assert_eq!(summary.tally.failed, 1);
        assert_eq!(summary.tally.missing, 0);
        assert!(sink.missing.lock().unwrap().is_empty());
    }
}
