//! HTML content extractor
//!
//! This module turns a fetched HTML body into:
//! - The page title
//! - The visible text of the body, capped to a character budget
//! - The raw `href` values of anchors, in document order
//!
//! Extraction is pure and never fails. HTML parsing is best-effort: garbage in
//! yields empty content with the `degraded` flag set, never an error.

use scraper::{ElementRef, Html, Selector};

/// Title used when the document has no (or an empty) `<title>`
pub const NO_TITLE: &str = "No title found";

/// Default character ceiling for `title + "\n\n" + text`
pub const DEFAULT_CHAR_CAP: usize = 2_000;

const SEPARATOR: &str = "\n\n";

/// Elements whose subtrees never contribute visible text
const EXCLUDED_ELEMENTS: &[&str] = &["script", "style", "img", "input"];

/// Extracted information from an HTML page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContent {
    /// The page title, or [`NO_TITLE`]
    pub title: String,

    /// Visible body text, one trimmed segment per line
    pub text: String,

    /// Every non-blank anchor `href`, unresolved
    pub links: Vec<String>,

    /// True when extraction fell back to empty content
    pub degraded: bool,
}

impl PageContent {
    /// Renders `title + "\n\n" + text`, the capped summary of the page
    ///
    /// Empty when both parts are empty, which only happens for caps of 2 or
    /// less, so the summary never exceeds the cap.
    pub fn summary(&self) -> String {
        if self.is_blank() {
            return String::new();
        }
        format!("{}{}{}", self.title, SEPARATOR, self.text)
    }

    /// Character count of [`PageContent::summary`]
    pub fn char_len(&self) -> usize {
        if self.is_blank() {
            return 0;
        }
        self.title.chars().count() + SEPARATOR.len() + self.text.chars().count()
    }

    fn is_blank(&self) -> bool {
        self.title.is_empty() && self.text.is_empty()
    }
}

/// Extractor bound to a fixed character cap
#[derive(Debug, Clone, Copy)]
pub struct Extractor {
    cap: usize,
}

impl Extractor {
    pub fn new(cap: usize) -> Self {
        Self { cap }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn extract(&self, body: &[u8]) -> PageContent {
        extract(body, self.cap)
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(DEFAULT_CHAR_CAP)
    }
}

/// Parses an HTML body and extracts title, visible text and links
///
/// # Truncation
///
/// `title + "\n\n" + text` is cut to exactly `cap` characters when longer; the
/// cut may split a word. If the title alone leaves no room, it is cut to
/// `cap - 2` characters and the text is empty. Below a cap of 2 both parts
/// are empty and so is the summary.
///
/// # Example
///
/// ```
/// use sumi_sieve::crawler::extract;
///
/// let html = br#"<html><head><title>Test</title></head><body><p>Hi</p><a href="/page">Link</a></body></html>"#;
/// let page = extract(html, 2_000);
/// assert_eq!(page.title, "Test");
/// assert_eq!(page.text, "Hi\nLink");
/// assert_eq!(page.links, vec!["/page".to_string()]);
/// ```
pub fn extract(body: &[u8], cap: usize) -> PageContent {
    let (html, lossy) = match std::str::from_utf8(body) {
        Ok(s) => (std::borrow::Cow::Borrowed(s), false),
        Err(_) => (String::from_utf8_lossy(body), true),
    };

    let document = Html::parse_document(&html);

    let title = extract_title(&document).unwrap_or_else(|| NO_TITLE.to_string());
    let text = extract_text(&document);
    let links = extract_links(&document);

    let degraded = lossy || (!body.is_empty() && text.is_empty() && links.is_empty());
    let (title, text) = truncate(title, text, cap);

    PageContent {
        title,
        text,
        links,
        degraded,
    }
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Collects visible text under `<body>`, skipping excluded subtrees
fn extract_text(document: &Html) -> String {
    let body_selector = match Selector::parse("body") {
        Ok(s) => s,
        Err(_) => return String::new(),
    };

    let body = match document.select(&body_selector).next() {
        Some(b) => b,
        None => return String::new(),
    };

    let mut segments = Vec::new();
    for node in body.descendants() {
        let text = match node.value().as_text() {
            Some(t) => t,
            None => continue,
        };

        let excluded = node.ancestors().any(|ancestor| {
            ElementRef::wrap(ancestor)
                .map(|el| EXCLUDED_ELEMENTS.contains(&el.value().name()))
                .unwrap_or(false)
        });
        if excluded {
            continue;
        }

        let segment = text.trim();
        if !segment.is_empty() {
            segments.push(segment);
        }
    }

    segments.join("\n")
}

/// Collects every non-blank anchor `href` in document order
fn extract_links(document: &Html) -> Vec<String> {
    let a_selector = match Selector::parse("a[href]") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    document
        .select(&a_selector)
        .filter_map(|element| element.value().attr("href"))
        .filter(|href| !href.trim().is_empty())
        .map(str::to_string)
        .collect()
}

/// Applies the character cap to `title + "\n\n" + text`
fn truncate(title: String, text: String, cap: usize) -> (String, String) {
    let budget = cap.saturating_sub(SEPARATOR.len());
    let title_len = title.chars().count();

    if title_len >= budget {
        return (take_chars(&title, budget), String::new());
    }

    let text = take_chars(&text, budget - title_len);
    (title, text)
}

fn take_chars(s: &str, n: usize) -> String {
    match s.char_indices().nth(n) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
