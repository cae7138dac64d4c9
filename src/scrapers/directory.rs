//! Directory listing pages: URL construction and article link extraction.
//!
//! # URL Pattern
//!
//! The site files each broadcast under a per-day directory,
//! `http://mrxwlb.com/2025/11/22/`, but older days are sometimes only
//! reachable through the unpadded form `http://mrxwlb.com/2025/1/7/`. Both
//! are tried, padded first.
//!
//! Article URLs are never derived from the date; they are whatever the
//! directory page links to, filtered down to transcript-shaped links.

use crate::scrapers::markup::MarkupSource;
use chrono::{Datelike, NaiveDate};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use tracing::{debug, warn};
use url::Url;

/// `/YYYY/M/D/` anywhere in a path.
static PATH_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/(\d{4})/(\d{1,2})/(\d{1,2})/").unwrap());
static CN_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{4}年\d{1,2}月\d{1,2}日").unwrap());
static TOPIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"新闻联播|文字版").unwrap());

/// Path fragments of listing, taxonomy, and CMS endpoints.
const NON_ARTICLE_PATHS: &[&str] = &[
    "/category/",
    "/tag/",
    "/page/",
    "/author/",
    "/feed",
    "/comments/",
    "/search/",
    "/wp-content/",
    "/wp-admin/",
    "/wp-json/",
];

/// Candidate directory URLs for `date`: zero-padded first, then unpadded.
///
/// Returns a single URL when both forms coincide (month and day ≥ 10).
pub fn build_directory_urls(base_url: &str, date: NaiveDate) -> Vec<String> {
    let base = base_url.trim_end_matches('/');
    let (y, m, d) = (date.year(), date.month(), date.day());
    let padded = format!("{base}/{y}/{m:02}/{d:02}/");
    let plain = format!("{base}/{y}/{m}/{d}/");
    if padded == plain {
        vec![padded]
    } else {
        vec![padded, plain]
    }
}

/// Extract transcript links from a directory page.
///
/// A link qualifies when it is on http(s), is not a known listing/CMS path,
/// and either
/// - its path carries a `/YYYY/M/D/` segment and its decoded URL names a
///   dated broadcast (`2025年11月22日…新闻联播`) or it sits one level below
///   a date directory on the same host, or
/// - its anchor text names a dated broadcast and it is on the same host.
///
/// Relative links are resolved against `base_url`. The result keeps document
/// order and drops duplicates that differ only by trailing slash, query, or
/// fragment. An empty result is a normal outcome.
pub fn extract_article_links(page: &impl MarkupSource, base_url: &str) -> Vec<String> {
    let base = match Url::parse(base_url) {
        Ok(u) => u,
        Err(e) => {
            warn!(%base_url, error = %e, "Directory URL does not parse; no links extracted");
            return Vec::new();
        }
    };

    let links = page
        .links()
        .into_iter()
        .filter_map(|link| {
            let href = link.href.as_str();
            if href.is_empty()
                || href.starts_with('#')
                || href.starts_with("javascript:")
                || href.starts_with("mailto:")
            {
                return None;
            }
            let mut resolved = base.join(href).ok()?;
            if !matches!(resolved.scheme(), "http" | "https") {
                return None;
            }
            resolved.set_fragment(None);

            let path = resolved.path().to_string();
            if NON_ARTICLE_PATHS.iter().any(|p| path.contains(p)) {
                return None;
            }

            let same_host = resolved.host_str() == base.host_str();
            let decoded: Cow<'_, str> =
                urlencoding::decode(resolved.as_str()).unwrap_or(Cow::Borrowed(resolved.as_str()));
            let names_broadcast = |s: &str| CN_DATE.is_match(s) && TOPIC.is_match(s);

            let qualifies = if PATH_DATE.is_match(&path) {
                names_broadcast(&decoded) || (same_host && is_article_depth(&path))
            } else {
                same_host && names_broadcast(&link.text)
            };

            if qualifies {
                Some(resolved.to_string())
            } else {
                debug!(href, "Rejected directory link");
                None
            }
        })
        .unique_by(|u| normalize(u))
        .collect::<Vec<_>>();

    debug!(count = links.len(), %base_url, "Extracted article links");
    links
}

/// Calendar date named by the first `/YYYY/M/D/` segment of `url`'s path.
///
/// `None` when the URL does not parse, has no such segment, or names an
/// impossible date.
pub fn path_date(url: &str) -> Option<NaiveDate> {
    let parsed = Url::parse(url).ok()?;
    let caps = PATH_DATE.captures(parsed.path())?;
    NaiveDate::from_ymd_opt(caps[1].parse().ok()?, caps[2].parse().ok()?, caps[3].parse().ok()?)
}

/// `/YYYY/MM/DD/<slug>/`: a date directory followed by exactly one more segment.
fn is_article_depth(path: &str) -> bool {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    path.ends_with('/')
        && segments.len() == 4
        && segments[..3].iter().all(|s| s.chars().all(|c| c.is_ascii_digit()))
}

/// Dedup key: no query, no fragment, no trailing slash.
fn normalize(url: &str) -> String {
    let cut = url.find(['?', '#']).unwrap_or(url.len());
    url[..cut].trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::markup::HtmlPage;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_build_directory_urls_padded_first() {
        let urls = build_directory_urls("http://mrxwlb.com", ymd(2025, 1, 7));
        assert_eq!(
            urls,
            vec!["http://mrxwlb.com/2025/01/07/", "http://mrxwlb.com/2025/1/7/"]
        );
    }

    #[test]
    fn test_build_directory_urls_single_when_identical() {
        let urls = build_directory_urls("http://mrxwlb.com/", ymd(2025, 11, 22));
        assert_eq!(urls, vec!["http://mrxwlb.com/2025/11/22/"]);
    }

    #[test]
    fn test_build_directory_urls_is_deterministic() {
        for date in [ymd(2024, 2, 29), ymd(2025, 10, 1), ymd(2025, 12, 31)] {
            assert_eq!(
                build_directory_urls("http://mrxwlb.com", date),
                build_directory_urls("http://mrxwlb.com", date)
            );
        }
        let urls = build_directory_urls("http://mrxwlb.com", ymd(2025, 10, 1));
        assert_eq!(urls[0], "http://mrxwlb.com/2025/10/01/");
        assert_eq!(urls[1], "http://mrxwlb.com/2025/10/1/");
    }

    const DIRECTORY: &str = r##"
        <html><body>
          <nav>
            <a href="/">首页</a>
            <a href="/category/xwlb/">新闻联播</a>
            <a href="/tag/2025/">2025</a>
            <a href="/2025/11/22/page/2/">下一页</a>
            <a href="#top">顶部</a>
            <a href="javascript:void(0)">菜单</a>
          </nav>
          <h2><a href="/2025/11/22/2025%E5%B9%B411%E6%9C%8822%E6%97%A5%E6%96%B0%E9%97%BB%E8%81%94%E6%92%AD%E6%96%87%E5%AD%97%E7%89%88/">2025年11月22日新闻联播文字版</a></h2>
          <a href="http://mrxwlb.com/2025/11/22/2025%E5%B9%B411%E6%9C%8822%E6%97%A5%E6%96%B0%E9%97%BB%E8%81%94%E6%92%AD%E6%96%87%E5%AD%97%E7%89%88?replytocom=5#respond">回复</a>
          <a href="/2025/11/22/xwlb-full/">阅读全文</a>
          <a href="https://elsewhere.example/2025/11/22/other/">外链</a>
          <a href="/archives/123">2025年11月21日新闻联播文字版</a>
          <a href="/2025/11/22/">当日目录</a>
        </body></html>"##;

    #[test]
    fn test_extract_article_links_filters_and_resolves() {
        let page = HtmlPage::parse(DIRECTORY);
        let links = extract_article_links(&page, "http://mrxwlb.com/2025/11/22/");
        assert_eq!(
            links,
            vec![
                "http://mrxwlb.com/2025/11/22/2025%E5%B9%B411%E6%9C%8822%E6%97%A5%E6%96%B0%E9%97%BB%E8%81%94%E6%92%AD%E6%96%87%E5%AD%97%E7%89%88/",
                "http://mrxwlb.com/2025/11/22/xwlb-full/",
                "http://mrxwlb.com/archives/123",
            ]
        );
    }

    #[test]
    fn test_extract_article_links_empty_directory() {
        let page = HtmlPage::parse("<html><body><a href='/category/x/'>x</a><p>暂无内容</p></body></html>");
        assert!(extract_article_links(&page, "http://mrxwlb.com/2025/11/23/").is_empty());
    }

    #[test]
    fn test_extract_article_links_bad_base() {
        let page = HtmlPage::parse(DIRECTORY);
        assert!(extract_article_links(&page, "not a url").is_empty());
    }

    #[test]
    fn test_path_date() {
        assert_eq!(path_date("http://mrxwlb.com/2025/11/22/xwlb/"), Some(ymd(2025, 11, 22)));
        assert_eq!(path_date("http://mrxwlb.com/2025/1/7/a/?p=1"), Some(ymd(2025, 1, 7)));
        assert_eq!(path_date("http://mrxwlb.com/archives/123"), None);
        assert_eq!(path_date("http://mrxwlb.com/2025/2/30/a/"), None);
        assert_eq!(path_date("/2025/11/22/xwlb/"), None);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("http://a/b/?x=1#c"), "http://a/b");
        assert_eq!(normalize("http://a/b"), "http://a/b");
    }

    #[test]
    fn test_is_article_depth() {
        assert!(is_article_depth("/2025/11/22/slug/"));
        assert!(!is_article_depth("/2025/11/22/"));
        assert!(!is_article_depth("/2025/11/22/slug"));
        assert!(!is_article_depth("/2025/11/22/a/b/"));
    }
}
