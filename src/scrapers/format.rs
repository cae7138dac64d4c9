//! Plain-text transcript to Markdown.
//!
//! A transcript page has two parts: a summary list introduced by
//! "今日新闻联播主要内容", and the full text introduced by
//! "以下为详细的文字版全文". Summary lines become bullets; in the full text,
//! `【…】` lines become `##` headings and numbered or headline-shaped lines
//! become `###` headings. Everything else is a paragraph.

use once_cell::sync::Lazy;
use regex::Regex;

static BRACKET_TITLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^【.*】").unwrap());
static NUMBERED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+[、.]|^[（(].*[）)]$").unwrap());
static CN_NUMBERED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[一二三四五六七八九十]+[、.]").unwrap());
static SENTENCE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[。！？；]$").unwrap());
static MONTH_DAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+月\d+日").unwrap());
static TIME_WORDS: Lazy<Regex> = Lazy::new(|| Regex::new(r"当地时间|今天\(|昨日\(").unwrap());
static LEAD_IN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d+月\d+日|当地时间|今天\(|国家|国务院|中共中央|全国|教育部|工业和信息化部|市场监管总局").unwrap()
});

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Summary,
    Detail,
}

/// Format raw transcript text as Markdown.
pub fn format_transcript(raw: &str) -> String {
    let lines: Vec<&str> = raw.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

    let mut out: Vec<String> = Vec::new();
    let mut section = Section::Preamble;
    let mut expect_headline = false;
    let mut previous: Option<&str> = None;

    for (i, &line) in lines.iter().enumerate() {
        if line.contains("新闻联播主要内容") {
            paragraph(&mut out, line.to_string());
            section = Section::Summary;
            previous = Some(line);
            continue;
        }
        if line.contains("以下为详细") {
            paragraph(&mut out, line.to_string());
            section = Section::Detail;
            expect_headline = true;
            previous = Some(line);
            continue;
        }

        match section {
            Section::Preamble => paragraph(&mut out, line.to_string()),
            Section::Summary => out.push(format!("* {line}")),
            Section::Detail => {
                if previous == Some(line) {
                    continue;
                }
                let next = lines.get(i + 1).copied();
                if BRACKET_TITLE.is_match(line) {
                    paragraph(&mut out, format!("## {line}"));
                } else if NUMBERED.is_match(line)
                    || (headline_shaped(line) && (expect_headline || leads_into_body(next)))
                {
                    paragraph(&mut out, format!("### {line}"));
                } else {
                    paragraph(&mut out, line.to_string());
                }
                expect_headline = false;
            }
        }
        previous = Some(line);
    }

    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    out.join("\n")
}

/// Push `text` as its own block, separated from the previous one by a blank line.
fn paragraph(out: &mut Vec<String>, text: String) {
    if out.last().is_some_and(|l| !l.is_empty()) {
        out.push(String::new());
    }
    out.push(text);
    out.push(String::new());
}

fn headline_shaped(line: &str) -> bool {
    let len = line.chars().count();
    (8..=60).contains(&len)
        && !SENTENCE_END.is_match(line)
        && !CN_NUMBERED.is_match(line)
        && !MONTH_DAY.is_match(line)
        && !TIME_WORDS.is_match(line)
}

/// The following line reads like the opening of a news item.
fn leads_into_body(next: Option<&str>) -> bool {
    next.is_some_and(|n| LEAD_IN.is_match(n) || n.chars().count() > 50)
}
