//! Structural access to a parsed page.
//!
//! The link and article extractors never touch `scraper` directly; they ask a
//! [`MarkupSource`] for links, headings, date markers, and body text blocks.
//! [`HtmlPage`] is the `scraper`-backed implementation used in production.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

/// An anchor found on a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Raw `href` attribute, trimmed.
    pub href: String,
    /// Visible anchor text, whitespace-trimmed.
    pub text: String,
}

/// Capability the extractors depend on.
pub trait MarkupSource {
    /// Every anchor with an `href`, in document order.
    fn links(&self) -> Vec<Link>;
    /// Text of the primary heading (`h1`).
    fn primary_heading(&self) -> Option<String>;
    /// Text of the document `<title>`.
    fn document_title(&self) -> Option<String>;
    /// Texts of elements that conventionally carry a publication date.
    fn date_markers(&self) -> Vec<String>;
    /// Text blocks of the main body container in document order, or `None`
    /// when no known container exists on the page.
    fn body_blocks(&self) -> Option<Vec<String>>;
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid built-in selector {css:?}: {e:?}"))
}

static LINK: Lazy<Selector> = Lazy::new(|| selector("a[href]"));
static H1: Lazy<Selector> = Lazy::new(|| selector("h1"));
static TITLE: Lazy<Selector> = Lazy::new(|| selector("title"));
static TIME: Lazy<Selector> = Lazy::new(|| selector("time"));
static PUBLISHED_META: Lazy<Selector> = Lazy::new(|| {
    selector("meta[property='article:published_time'], meta[name='date'], meta[itemprop='datePublished']")
});
static DATE_CLASSES: Lazy<Selector> = Lazy::new(|| selector(".entry-date, .post-date, .published, .date"));

/// Body containers, most specific first.
static BODY_CONTAINERS: Lazy<Vec<Selector>> = Lazy::new(|| {
    [
        "div.entry-content",
        "div.post-content",
        "div.content",
        "article",
        "div#content",
        "main",
    ]
    .iter()
    .map(|css| selector(css))
    .collect()
});

/// Subtrees whose text never belongs to the transcript.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "nav", "header", "footer", "aside", "noscript"];

/// A page parsed with `scraper`.
pub struct HtmlPage {
    document: Html,
}

impl HtmlPage {
    pub fn parse(html: &str) -> Self {
        Self {
            document: Html::parse_document(html),
        }
    }

    fn first_text(&self, sel: &Selector) -> Option<String> {
        self.document
            .select(sel)
            .map(|el| collapse_text(&el))
            .find(|t| !t.is_empty())
    }
}

fn collapse_text(el: &ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

impl MarkupSource for HtmlPage {
    fn links(&self) -> Vec<Link> {
        self.document
            .select(&LINK)
            .filter_map(|el| {
                let href = el.value().attr("href")?.trim().to_string();
                Some(Link {
                    href,
                    text: collapse_text(&el),
                })
            })
            .collect()
    }

    fn primary_heading(&self) -> Option<String> {
        self.first_text(&H1)
    }

    fn document_title(&self) -> Option<String> {
        self.first_text(&TITLE)
    }

    fn date_markers(&self) -> Vec<String> {
        let mut markers = Vec::new();
        for el in self.document.select(&TIME) {
            if let Some(dt) = el.value().attr("datetime") {
                markers.push(dt.trim().to_string());
            }
            let text = collapse_text(&el);
            if !text.is_empty() {
                markers.push(text);
            }
        }
        markers.extend(
            self.document
                .select(&PUBLISHED_META)
                .filter_map(|el| el.value().attr("content"))
                .map(|c| c.trim().to_string()),
        );
        markers.extend(
            self.document
                .select(&DATE_CLASSES)
                .map(|el| collapse_text(&el))
                .filter(|t| !t.is_empty()),
        );
        markers
    }

    fn body_blocks(&self) -> Option<Vec<String>> {
        let container = BODY_CONTAINERS
            .iter()
            .find_map(|sel| self.document.select(sel).next())?;

        let mut blocks = Vec::new();
        for node in container.descendants() {
            let Some(text) = node.value().as_text() else {
                continue;
            };
            let skipped = node
                .ancestors()
                .take_while(|a| a.id() != container.id())
                .filter_map(|a| a.value().as_element())
                .any(|e| SKIPPED_ELEMENTS.contains(&e.name()));
            if skipped {
                continue;
            }
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                blocks.push(trimmed.to_string());
            }
        }
        Some(blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><head><title>站点标题</title></head>
        <body>
          <nav><a href="/category/news/">分类</a></nav>
          <h1> 2025年11月22日新闻联播文字版 </h1>
          <span class="entry-date">2025-11-22</span>
          <div class="entry-content">
            <p>今日新闻联播主要内容：</p>
            <script>var ad = 1;</script>
            <p>第一条 <a href="/x/">链接文字</a></p>
            <aside>侧栏</aside>
          </div>
        </body></html>"#;

    #[test]
    fn test_links_in_document_order() {
        let page = HtmlPage::parse(PAGE);
        let links = page.links();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].href, "/category/news/");
        assert_eq!(links[0].text, "分类");
        assert_eq!(links[1].text, "链接文字");
    }

    #[test]
    fn test_headings() {
        let page = HtmlPage::parse(PAGE);
        assert_eq!(page.primary_heading().as_deref(), Some("2025年11月22日新闻联播文字版"));
        assert_eq!(page.document_title().as_deref(), Some("站点标题"));
    }

    #[test]
    fn test_date_markers() {
        let page = HtmlPage::parse(
            r#"<html><head><meta property="article:published_time" content="2025-11-22T20:00:00+08:00"></head>
               <body><time datetime="2025-11-21">昨天</time></body></html>"#,
        );
        let markers = page.date_markers();
        assert_eq!(markers[0], "2025-11-21");
        assert_eq!(markers[1], "昨天");
        assert!(markers.contains(&"2025-11-22T20:00:00+08:00".to_string()));
    }

    #[test]
    fn test_body_blocks_skip_non_content() {
        let page = HtmlPage::parse(PAGE);
        let blocks = page.body_blocks().unwrap();
        assert_eq!(blocks, vec!["今日新闻联播主要内容：", "第一条", "链接文字"]);
    }

    #[test]
    fn test_body_blocks_absent_without_container() {
        let page = HtmlPage::parse("<html><body><div class='sidebar'>x</div></body></html>");
        assert!(page.body_blocks().is_none());
    }
}
