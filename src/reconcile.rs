//! Date reconciliation: from a target date to the items to file.
//!
//! A directory page is reached through a calendar date, but the articles it
//! links to carry their own dates, which win. [`reconcile`] is the pure part:
//! given the fetch results of one directory batch in link order, it picks a
//! filing date for every article and resolves collisions (last write wins).
//! [`Resolver`] drives the I/O around it:
//!
//! ```text
//! NotStarted → DirectoryResolving ─┬─ no listing / no links → Missing
//!                                  └─ links → ArticlesResolving → Filed | PartialFailure
//! ```
//!
//! Nothing here retries; transient failures are retried inside the fetcher.

use crate::error::FetchError;
use crate::fetch::FetchPage;
use crate::models::{ArticleFailure, ArticlePage, Collision, DateOrigin, DateOutcome, DateStatus, NewsItem};
use crate::scrapers::article::fetch_article;
use crate::scrapers::directory::{build_directory_urls, extract_article_links, path_date};
use crate::scrapers::markup::HtmlPage;
use crate::utils::truncate_for_log;
use chrono::{DateTime, Local, NaiveDate};
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};

/// Reconciled result of one directory batch.
#[derive(Debug, Default)]
pub struct Batch {
    /// Final item per filing date.
    pub filed: BTreeMap<NaiveDate, NewsItem>,
    pub failures: Vec<ArticleFailure>,
    pub collisions: Vec<Collision>,
    pub attempted: usize,
}

/// Assign filing dates to fetched articles and resolve same-date collisions.
///
/// `fetched` must be in link traversal order. An article without an asserted
/// date is filed under `target` and flagged [`DateOrigin::DirectoryFallback`].
/// When two articles land on the same date the later one replaces the
/// earlier one.
pub fn reconcile(
    target: NaiveDate,
    source_url: &str,
    fetched: Vec<(String, Result<ArticlePage, FetchError>)>,
    crawled_at: DateTime<Local>,
) -> Batch {
    let mut batch = Batch {
        attempted: fetched.len(),
        ..Batch::default()
    };

    for (url, result) in fetched {
        let page = match result {
            Ok(page) => page,
            Err(e) => {
                match &e {
                    FetchError::NotFound { .. } => info!(%url, "Article not found"),
                    FetchError::Parse { reason, .. } => {
                        warn!(%url, %reason, kind = "parse", "Article structure not recognised")
                    }
                    _ => warn!(%url, error = %e, "Article fetch failed"),
                }
                batch.failures.push(ArticleFailure::from(&e));
                continue;
            }
        };

        let (date, date_origin) = match page.asserted_date {
            Some(date) => (date, DateOrigin::Asserted),
            None => {
                warn!(
                    %url,
                    target_date = %target,
                    event = "date_fallback",
                    "Article asserts no date; filing under directory date"
                );
                (target, DateOrigin::DirectoryFallback)
            }
        };
        if date != target {
            info!(%url, target_date = %target, asserted = %date, "Article belongs to a different date");
        }

        let item = NewsItem {
            title: page.title,
            content: page.content,
            date,
            date_origin,
            url: url.clone(),
            source_url: source_url.to_string(),
            crawled_at,
        };

        if let Some(previous) = batch.filed.insert(date, item) {
            warn!(
                date = %date,
                kept = %url,
                discarded = %previous.url,
                event = "collision",
                "Two articles resolve to the same date; keeping the later one"
            );
            batch.collisions.push(Collision {
                date,
                kept_url: url,
                discarded_url: previous.url,
            });
        }
    }

    batch
}

/// Turn a reconciled batch into the outcome for its target date.
pub fn outcome_from_batch(target: NaiveDate, directory_url: String, batch: Batch) -> DateOutcome {
    let status = if batch.failures.is_empty() {
        DateStatus::Filed
    } else {
        DateStatus::PartialFailure
    };
    DateOutcome {
        target,
        status,
        directory_url: Some(directory_url),
        items: batch.filed.into_values().collect(),
        failures: batch.failures,
        collisions: batch.collisions,
        attempted: batch.attempted,
        already_filed: 0,
        skip_reason: None,
    }
}

/// Resolves target dates against the site through a [`FetchPage`].
pub struct Resolver<F> {
    fetcher: F,
    base_url: String,
    concurrency: usize,
}

impl<F> Resolver<F>
where
    F: FetchPage,
{
    /// `concurrency` bounds in-flight article fetches; results are always
    /// consumed in link order.
    pub fn new(fetcher: F, base_url: impl Into<String>, concurrency: usize) -> Self {
        Self {
            fetcher,
            base_url: base_url.into(),
            concurrency: concurrency.max(1),
        }
    }

    #[cfg(test)]
    pub(crate) fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// First directory variant that loads and yields links, with those links.
    #[instrument(level = "info", skip_all, fields(date = %target))]
    pub async fn discover(&self, target: NaiveDate) -> Option<(String, Vec<String>)> {
        for directory_url in build_directory_urls(&self.base_url, target) {
            match self.fetcher.fetch(&directory_url).await {
                Ok(html) => {
                    let links = extract_article_links(&HtmlPage::parse(&html), &directory_url);
                    if links.is_empty() {
                        info!(%directory_url, "Directory has no transcript links");
                        continue;
                    }
                    info!(%directory_url, count = links.len(), "Directory resolved");
                    debug!(?links, "Transcript links");
                    return Some((directory_url, links));
                }
                Err(FetchError::NotFound { .. }) => {
                    info!(%directory_url, "Directory variant not found");
                }
                Err(e) => {
                    warn!(%directory_url, error = %e, "Directory variant failed");
                }
            }
        }
        None
    }

    /// Resolve one target date end to end.
    #[instrument(level = "info", skip_all, fields(date = %target))]
    pub async fn resolve(&self, target: NaiveDate) -> DateOutcome {
        let Some((directory_url, links)) = self.discover(target).await else {
            warn!(event = "missing", "No directory or no links; date is missing");
            return DateOutcome::missing(target);
        };

        let fetcher = &self.fetcher;
        let fetched: Vec<(String, Result<ArticlePage, FetchError>)> = stream::iter(links)
            .map(|url| async move {
                let result = fetch_article(fetcher, &url).await;
                (url, result)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let batch = reconcile(target, &directory_url, fetched, Local::now());
        let outcome = outcome_from_batch(target, directory_url, batch);
        info!(
            filed = outcome.items.len(),
            failed = outcome.failure_count(),
            collisions = outcome.collisions.len(),
            status = ?outcome.status,
            "Date resolved"
        );
        outcome
    }

    /// Fetch one known article URL and bind it to a filing date.
    ///
    /// The page's own date wins. Without one, `date_hint` is used, then the
    /// `/YYYY/M/D/` date in the URL path; either way the item is flagged as a
    /// fallback. A page with none of the three is [`FetchError::Undated`].
    #[instrument(level = "info", skip(self))]
    pub async fn resolve_url(&self, url: &str, date_hint: Option<NaiveDate>) -> Result<NewsItem, FetchError> {
        let page = fetch_article(&self.fetcher, url).await?;
        let (date, date_origin) = match (page.asserted_date, date_hint) {
            (Some(date), _) => (date, DateOrigin::Asserted),
            (None, Some(hint)) => {
                warn!(%url, %hint, event = "date_fallback", "Article asserts no date; using the given date");
                (hint, DateOrigin::DirectoryFallback)
            }
            (None, None) => match path_date(url) {
                Some(date) => {
                    warn!(%url, %date, event = "date_fallback", "Article asserts no date; using the URL path date");
                    (date, DateOrigin::DirectoryFallback)
                }
                None => {
                    return Err(FetchError::Undated { url: url.to_string() });
                }
            },
        };
        info!(%date, title = %truncate_for_log(&page.title, 40), "Resolved article URL");
        Ok(NewsItem {
            title: page.title,
            content: page.content,
            date,
            date_origin,
            url: url.to_string(),
            source_url: url.to_string(),
            crawled_at: Local::now(),
        })
    }
}
