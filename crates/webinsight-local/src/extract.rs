use crate::{page_client, FETCH_TIMEOUT};
use scraper::{ElementRef, Html, Node, Selector};
use std::io::Cursor;
use std::time::Duration;
use webinsight_core::{Extraction, Extractor, Result};

/// Candidates with less visible text than this are never considered article
/// bodies.
const MIN_CANDIDATE_CHARS: usize = 25;
/// Upper bound on scored candidate elements per document.
const MAX_CANDIDATES: usize = 10_000;
/// Render width for the plain-text conversion of the winning node.
const RENDER_WIDTH: usize = 80;

/// Fetches a page and reduces it to the main readable text.
///
/// Owns its own HTTP client so the per-call timeout configuration cannot leak
/// across invocations. One attempt per URL; no retries, no caching.
pub struct PageExtractor {
    client: reqwest::Client,
    timeout: Duration,
}

impl PageExtractor {
    pub fn new() -> Result<Self> {
        Self::with_timeout(FETCH_TIMEOUT)
    }

    /// Override the fetch deadline (tests use short ones). The deadline is
    /// request-level: hitting it aborts the in-flight call.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: page_client(timeout)?,
            timeout,
        })
    }
}

#[async_trait::async_trait]
impl Extractor for PageExtractor {
    async fn extract(&self, url: &str) -> Extraction {
        if let Err(e) = url::Url::parse(url) {
            return Extraction::failed(url, format!("invalid url: {e}"));
        }

        let resp = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                return Extraction::failed(
                    url,
                    format!("fetch timed out after {:?}", self.timeout),
                );
            }
            Err(e) => return Extraction::failed(url, format!("fetch failed: {e}")),
        };

        let status = resp.status();
        if !status.is_success() {
            return Extraction::failed(url, format!("fetch failed: HTTP {status}"));
        }

        let body = match resp.text().await {
            Ok(b) => b,
            Err(e) => return Extraction::failed(url, format!("read body failed: {e}")),
        };

        // A page with no discernible article body is a legitimate outcome,
        // not a failure.
        match readable_text(&body) {
            Some(text) => Extraction::ok(url, text),
            None => Extraction::ok(url, ""),
        }
    }
}

fn class_or_id_lc(el: &ElementRef) -> String {
    let mut out = String::new();
    if let Some(c) = el.value().attr("class") {
        out.push_str(c);
        out.push(' ');
    }
    if let Some(i) = el.value().attr("id") {
        out.push_str(i);
    }
    out.to_ascii_lowercase()
}

fn is_boilerplate_container(el: &ElementRef) -> bool {
    // Structural UI words only; no site-specific heuristics.
    let s = class_or_id_lc(el);
    if s.is_empty() {
        return false;
    }
    [
        "nav",
        "navbar",
        "menu",
        "sidebar",
        "footer",
        "header",
        "banner",
        "breadcrumb",
        "cookie",
        "consent",
        "ads",
        "advert",
        "promo",
        "subscribe",
        "newsletter",
        "comment",
    ]
    .iter()
    .any(|bad| s.contains(bad))
}

fn is_invisible_tag(name: &str) -> bool {
    matches!(name, "script" | "style" | "noscript" | "template")
}

/// Count the characters a reader would actually see: text nodes only, with
/// script/style subtrees excluded.
fn visible_text_chars(el: &ElementRef) -> usize {
    let mut n = 0usize;
    for child in el.children() {
        match child.value() {
            Node::Text(t) => n += t.chars().filter(|c| !c.is_whitespace()).count(),
            Node::Element(e) if !is_invisible_tag(e.name()) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    n += visible_text_chars(&child_el);
                }
            }
            _ => {}
        }
    }
    n
}

fn link_text_chars(el: &ElementRef) -> usize {
    let Ok(sel) = Selector::parse("a") else {
        return 0;
    };
    el.select(&sel)
        .map(|a| {
            a.text()
                .map(|t| t.chars().filter(|c| !c.is_whitespace()).count())
                .sum::<usize>()
        })
        .sum()
}

fn has_any_text(s: &str) -> bool {
    s.chars().any(|c| !c.is_whitespace())
}

/// Collapse the html2text output: trim trailing space per line, squeeze runs
/// of blank lines down to one.
fn tidy(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0usize;
    for line in text.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim().to_string()
}

/// Readability-style content isolation.
///
/// Scores `article`/`main`/`section`/`div` candidates by visible text volume,
/// penalizes link-dense blocks (navigation, tag clouds) and known boilerplate
/// class/id names, then renders the winning subtree to plain text.
///
/// Returns `None` when nothing on the page looks like an article body.
pub fn readable_text(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let sel = Selector::parse("article, main, section, div").ok()?;

    let mut seen = 0usize;
    let mut best_score: i64 = 0;
    let mut best: Option<ElementRef> = None;

    for el in doc.select(&sel) {
        seen += 1;
        if seen > MAX_CANDIDATES {
            break;
        }
        if is_boilerplate_container(&el) {
            continue;
        }
        let txt = visible_text_chars(&el);
        if txt < MIN_CANDIDATE_CHARS {
            continue;
        }
        let link_txt = link_text_chars(&el);
        // Dense non-link text wins; link text is usually navigation or TOCs.
        let mut score = txt as i64 - 2 * (link_txt as i64);
        match el.value().name() {
            "article" => score += 500,
            "main" => score += 300,
            _ => {}
        }
        if link_txt > txt / 2 {
            score -= 500;
        }
        if score > best_score {
            best_score = score;
            best = Some(el);
        }
    }

    let el = best?;
    let fragment = el.html();
    let rendered = html2text::from_read(Cursor::new(fragment.as_bytes()), RENDER_WIDTH)
        .unwrap_or_else(|_| el.text().collect::<Vec<_>>().join(" "));
    let out = tidy(&rendered);
    has_any_text(&out).then_some(out)
}
