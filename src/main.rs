//! # XWLB Transcripts
//!
//! A daily crawler for Xinwen Lianbo (新闻联播) broadcast transcripts
//! published on mrxwlb.com. Each broadcast date has a directory page that
//! links to one or more transcript articles; each article is filed under the
//! date it declares for itself, which is not always the directory's date.
//!
//! ## Features
//!
//! - Single date, explicit range, and "last N days" runs
//! - Zero-padded and unpadded directory URL variants
//! - Per-article date reconciliation with explicit fallback flagging and
//!   deterministic last-write-wins collisions
//! - Per-date Markdown records, a missing-dates ledger, per-run reports, and
//!   monthly digests
//! - Polite, paced HTTP with bounded retries for transient failures
//!
//! ## Usage
//!
//! ```sh
//! xwlb_transcripts --range 7
//! xwlb_transcripts --start 2025-11-01 --end 2025-11-30 --skip-existing
//! xwlb_transcripts --merge-monthly
//! ```
//!
//! ## Architecture
//!
//! 1. **Directory resolution**: build the directory URLs for a date and
//!    extract transcript links from the first one that has any
//! 2. **Article fetching**: fetch and extract every linked page
//! 3. **Reconciliation**: choose each article's filing date, resolve
//!    collisions
//! 4. **Persistence**: write records, update the ledger, save the run report
//!
//! The process exits with status 2 when parse failures make up the majority
//! of attempted article fetches, which means the site's markup has changed.

use chrono::Local;
use clap::Parser;
use std::error::Error;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod crawl;
mod error;
mod fetch;
mod models;
mod outputs;
mod reconcile;
mod scrapers;
mod utils;

use cli::{Cli, RunMode};
use config::CrawlerConfig;
use crawl::{Guard, RunSummary, crawl_dates, crawl_url};
use fetch::{FetchPage, HttpFetcher, RetryFetch};
use outputs::report::{RunReport, save_report};
use outputs::{DryRun, FileStore, RecordSink, monthly};
use reconcile::Resolver;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = Instant::now();
    info!("xwlb_transcripts starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let mut config = CrawlerConfig::load(args.config.as_deref()).await?;
    config.apply_cli(&args);
    info!(
        base_url = %config.base_url,
        news_dir = %config.news_dir.display(),
        reports_dir = %config.reports_dir.display(),
        delay_ms = config.request_delay_ms,
        concurrency = config.article_concurrency,
        dry_run = args.dry_run,
        "Configuration ready"
    );

    let now = Local::now();
    let mode = args.mode(now.date_naive())?;

    if mode == RunMode::MergeMonthly {
        let written = monthly::merge_monthly(&config.news_dir, &config.reports_dir).await?;
        info!(digests = written.len(), "Monthly merge complete");
        return Ok(ExitCode::SUCCESS);
    }

    if !args.dry_run {
        for dir in [&config.news_dir, &config.reports_dir] {
            if let Err(e) = ensure_writable_dir(dir).await {
                error!(
                    path = %dir.display(),
                    error = %e,
                    "Output directory is not writable (fix perms or choose a different path)"
                );
                return Err(e);
            }
        }
    }

    let http = HttpFetcher::new(&config)?;
    let fetcher = RetryFetch::new(http, config.retry_policy());
    let resolver = Resolver::new(fetcher, config.base_url.clone(), config.article_concurrency);
    let guard = Guard {
        now: now.naive_local(),
        broadcast_hour: config.broadcast_hour,
        skip_existing: args.skip_existing,
    };

    let summary = if args.dry_run {
        execute(&resolver, &DryRun::new(&config.news_dir), &mode, &guard).await
    } else {
        execute(&resolver, &FileStore::new(&config.news_dir), &mode, &guard).await
    };

    let range = match &mode {
        RunMode::Dates { range, .. } => *range,
        _ => None,
    };
    if args.dry_run {
        info!(dry_run = true, "Skipping run report");
    } else {
        let report = RunReport::new(&summary.outcomes, summary.tally, range);
        if let Err(e) = save_report(&config.reports_dir, &report).await {
            error!(error = %e, "Failed to save run report");
        }
    }

    let tally = summary.tally;
    let elapsed = start_time.elapsed();
    info!(
        filed = tally.filed,
        missing = tally.missing,
        failed = tally.failed,
        skipped = tally.skipped,
        parse_errors = tally.parse_errors,
        collisions = tally.collisions,
        fallbacks = tally.fallbacks,
        write_failures = tally.write_failures,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    if tally.has_structure_drift() {
        warn!(
            parse_errors = tally.parse_errors,
            attempted = tally.attempted,
            "Most article pages failed to parse; the site structure has likely changed"
        );
        return Ok(ExitCode::from(2));
    }
    Ok(ExitCode::SUCCESS)
}

async fn execute<F, S>(resolver: &Resolver<F>, sink: &S, mode: &RunMode, guard: &Guard) -> RunSummary
where
    F: FetchPage,
    S: RecordSink,
{
    match mode {
        RunMode::Dates { dates, .. } => {
            info!(count = dates.len(), first = ?dates.first(), last = ?dates.last(), "Crawling dates");
            crawl_dates(resolver, sink, dates, guard).await
        }
        RunMode::Url { url, date } => crawl_url(resolver, sink, url, *date, guard.now.date()).await,
        RunMode::MergeMonthly => RunSummary::default(),
    }
}
