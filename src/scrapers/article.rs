//! Article page scraper.
//!
//! Retrieves one transcript page and extracts its heading, the date the page
//! asserts for itself, and the cleaned body text.
//!
//! # Date Extraction
//!
//! The asserted date is looked for in the primary heading, then the document
//! title, then the page's date markers (`<time>`, published-time meta tags,
//! `.entry-date` and friends). At each location the [`DATE_PATTERNS`] are
//! tried in order and the first valid calendar date wins. When nothing
//! matches the date is absent; the reconciler decides what to do about it.

use crate::error::FetchError;
use crate::fetch::FetchPage;
use crate::models::ArticlePage;
use crate::scrapers::format::format_transcript;
use crate::scrapers::markup::{HtmlPage, MarkupSource};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, instrument};

/// Ordered date-text matchers; each captures year, month, day.
pub static DATE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(\d{4})\s*年\s*(\d{1,2})\s*月\s*(\d{1,2})\s*日",
        r"(?:^|\D)(\d{4})-(\d{1,2})-(\d{1,2})(?:\D|$)",
        r"(?:^|\D)(\d{4})/(\d{1,2})/(\d{1,2})(?:\D|$)",
        r"(?:^|\D)(\d{4})\.(\d{1,2})\.(\d{1,2})(?:\D|$)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Blocks from the first one containing any of these onward are not transcript.
const TRAILING_MARKERS: &[&str] = &["相关文章", "相关阅读", "相关推荐", "猜你喜欢", "上一篇", "下一篇"];

/// Short blocks starting with these are site boilerplate.
const BOILERPLATE_PREFIXES: &[&str] = &["分享到", "扫码", "转载请注明", "本文链接", "版权声明", "广告"];
const BOILERPLATE_MAX_CHARS: usize = 40;

/// First valid date found in `text` by any pattern, patterns tried in order.
pub fn parse_date_text(text: &str) -> Option<NaiveDate> {
    DATE_PATTERNS.iter().find_map(|re| {
        re.captures_iter(text).find_map(|caps| {
            let year = caps[1].parse().ok()?;
            let month = caps[2].parse().ok()?;
            let day = caps[3].parse().ok()?;
            NaiveDate::from_ymd_opt(year, month, day)
        })
    })
}

/// The date a page asserts for itself, if any.
pub fn asserted_date(page: &impl MarkupSource) -> Option<NaiveDate> {
    page.primary_heading()
        .into_iter()
        .chain(page.document_title())
        .chain(page.date_markers())
        .find_map(|text| parse_date_text(&text))
}

/// Drop boilerplate and everything after the first trailing marker.
fn clean_blocks(blocks: Vec<String>) -> Vec<String> {
    blocks
        .into_iter()
        .take_while(|b| !TRAILING_MARKERS.iter().any(|m| b.contains(m)))
        .filter(|b| {
            !(b.chars().count() <= BOILERPLATE_MAX_CHARS
                && BOILERPLATE_PREFIXES.iter().any(|p| b.starts_with(p)))
        })
        .collect()
}

/// Extract an [`ArticlePage`] from already-fetched markup.
///
/// # Errors
///
/// [`FetchError::Parse`] when the page has no known body container or the
/// container holds no transcript text.
pub fn extract_article(page: &impl MarkupSource, url: &str) -> Result<ArticlePage, FetchError> {
    let title = page
        .primary_heading()
        .or_else(|| page.document_title())
        .unwrap_or_default();

    let blocks = page
        .body_blocks()
        .ok_or_else(|| FetchError::parse(url, "no body container found"))?;
    let blocks = clean_blocks(blocks);
    if blocks.is_empty() {
        return Err(FetchError::parse(url, "body container has no text"));
    }

    let content = format_transcript(&blocks.join("\n"));
    let asserted_date = asserted_date(page);
    debug!(%url, ?asserted_date, chars = content.chars().count(), "Extracted article");

    Ok(ArticlePage {
        title,
        content,
        asserted_date,
    })
}

/// Fetch one article page (a single call to `fetcher`) and extract it.
#[instrument(level = "info", skip(fetcher))]
pub async fn fetch_article<F: FetchPage>(fetcher: &F, url: &str) -> Result<ArticlePage, FetchError> {
    let html = fetcher.fetch(url).await?;
    let article = extract_article(&HtmlPage::parse(&html), url)?;
    info!(
        bytes = article.content.len(),
        asserted = ?article.asserted_date,
        "Parsed article"
    );
    Ok(article)
}
