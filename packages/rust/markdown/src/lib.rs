//! HTML-to-text extraction for scraped airline pages.
//!
//! Pages are reduced to their main content, converted to Markdown with the
//! `htmd` crate, then flattened by a series of cleanup passes into plain,
//! prompt-friendly text (no images, no link targets, no stray tags).

mod cleanup;

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use milesdesk_shared::{MilesdeskError, Result};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Text extracted from one HTML page.
#[derive(Debug, Clone)]
pub struct PageText {
    /// Cleaned text, Markdown-flavoured (headings, lists and tables survive).
    pub text: String,
    /// Page title from the first H1, then `<title>`.
    pub title: Option<String>,
    /// Approximate word count of `text`.
    pub word_count: usize,
}

/// Options for the extraction.
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Page URL, used to resolve relative links before they are flattened.
    pub source_url: Option<String>,
}

/// Tags `htmd` never emits content for.
const SKIPPED_TAGS: [&str; 8] = [
    "script", "style", "nav", "iframe", "noscript", "svg", "form", "button",
];

/// Content containers tried in priority order.
const CONTENT_SELECTORS: [&str; 6] = [
    "main article",
    "[role=\"main\"]",
    "main",
    "article",
    "#content",
    ".content",
];

/// Page chrome removed from the content container before conversion.
const CHROME_SELECTOR: &str =
    "nav, header, footer, aside, script, style, form, noscript, .cookie, .cookies, #cookie-banner, .breadcrumb";

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Extract clean text from a full HTML document.
///
/// 1. Pick the main content container (falls back to `<body>`)
/// 2. Strip navigation and other chrome
/// 3. Rewrite tables to Markdown (qualification thresholds often live in tables)
/// 4. Convert HTML to Markdown via `htmd`
/// 5. Flatten with the cleanup pipeline
#[instrument(skip(html), fields(url = opts.source_url.as_deref().unwrap_or("")))]
pub fn extract_text(html: &str, opts: &ExtractOptions) -> Result<PageText> {
    let doc = Html::parse_document(html);
    let title = extract_title(&doc);

    let content_html = strip_chrome(&main_content_html(&doc));
    let content_html = preprocess_tables(&content_html);

    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(SKIPPED_TAGS.to_vec())
        .build();

    let raw_markdown = converter
        .convert(&content_html)
        .map_err(|e| MilesdeskError::Conversion(format!("htmd conversion failed: {e}")))?;

    debug!(raw_len = raw_markdown.len(), "htmd conversion complete");

    let base_url = opts.source_url.as_deref().and_then(|u| Url::parse(u).ok());
    let text = cleanup::run_pipeline(&raw_markdown, base_url.as_ref());
    let word_count = count_words(&text);

    Ok(PageText {
        text,
        title,
        word_count,
    })
}

/// Inner HTML of the best content container, or the whole body.
fn main_content_html(doc: &Html) -> String {
    for sel_str in CONTENT_SELECTORS {
        if let Ok(selector) = Selector::parse(sel_str) {
            if let Some(el) = doc.select(&selector).next() {
                return el.inner_html();
            }
        }
    }

    if let Ok(body_sel) = Selector::parse("body") {
        if let Some(body) = doc.select(&body_sel).next() {
            return body.inner_html();
        }
    }

    String::new()
}

/// Remove chrome elements from an HTML fragment.
fn strip_chrome(html: &str) -> String {
    let Ok(chrome_sel) = Selector::parse(CHROME_SELECTOR) else {
        return html.to_string();
    };
    let fragment = Html::parse_fragment(html);

    let mut result = html.to_string();
    for el in fragment.select(&chrome_sel) {
        result = result.replacen(&el.html(), "", 1);
    }
    result
}

/// Title from the first non-empty `<h1>`, then `<title>`.
fn extract_title(doc: &Html) -> Option<String> {
    ["h1", "title"].iter().find_map(|tag| {
        let sel = Selector::parse(tag).ok()?;
        doc.select(&sel)
            .map(|el| collapse_spaces(&el.text().collect::<String>()))
            .find(|t| !t.is_empty())
    })
}

fn collapse_spaces(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// Table pre-processing
// ---------------------------------------------------------------------------

/// Replace `<table>` elements with Markdown tables before `htmd` runs.
///
/// `htmd` 0.1 drops table structure, which loses the row/column pairing of
/// tier thresholds.
fn preprocess_tables(html: &str) -> String {
    let Ok(table_sel) = Selector::parse("table") else {
        return html.to_string();
    };
    let doc = Html::parse_fragment(html);

    let mut result = html.to_string();
    for table_el in doc.select(&table_sel) {
        let md_table = table_to_markdown(&table_el);
        result = result.replacen(&table_el.html(), &md_table, 1);
    }
    result
}

/// Render one table element as a Markdown table.
fn table_to_markdown(table: &ElementRef) -> String {
    let (Ok(tr_sel), Ok(cell_sel)) = (Selector::parse("tr"), Selector::parse("th, td")) else {
        return String::new();
    };

    let rows: Vec<Vec<String>> = table
        .select(&tr_sel)
        .map(|tr| {
            tr.select(&cell_sel)
                .map(|cell| collapse_spaces(&cell.text().collect::<String>()).replace('|', "/"))
                .collect::<Vec<_>>()
        })
        .filter(|cells| !cells.is_empty())
        .collect();

    let col_count = rows.iter().map(Vec::len).max().unwrap_or(0);
    if col_count == 0 {
        return String::new();
    }

    let render = |cells: &[String]| {
        let mut padded: Vec<&str> = cells.iter().map(String::as_str).collect();
        padded.resize(col_count, "");
        format!("| {} |\n", padded.join(" | "))
    };

    let mut md = String::from("\n\n");
    md.push_str(&render(&rows[0]));
    md.push_str(&format!("|{}\n", " --- |".repeat(col_count)));
    for row in &rows[1..] {
        md.push_str(&render(row));
    }
    md.push('\n');
    md
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Count words, ignoring Markdown table rules and heading markers.
fn count_words(text: &str) -> usize {
    static NOISE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^(#{1,6}|\|?-{3,}\|?|\|)$").expect("valid regex"));

    text.split_whitespace()
        .filter(|w| !NOISE_RE.is_match(w))
        .count()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
