use crate::url::normalize::normalize_parsed;
use url::Url;

/// Resolves an extracted href against the URL of the page it appeared on
///
/// Returns None if the link should not be followed:
/// - empty or whitespace-only hrefs
/// - javascript:, mailto:, tel:, data: schemes
/// - fragment-only links (same page anchors)
/// - hrefs that fail to resolve or resolve to a non-HTTP(S) URL
///
/// The result is normalized, ready for the frontier.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sumi_sieve::url::resolve_link;
///
/// let base = Url::parse("http://example.test/dir/a.html").unwrap();
/// let link = resolve_link("b.html#top", &base).unwrap();
/// assert_eq!(link.as_str(), "http://example.test/dir/b.html");
/// ```
pub fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if lowered.starts_with("javascript:")
        || lowered.starts_with("mailto:")
        || lowered.starts_with("tel:")
        || lowered.starts_with("data:")
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    normalize_parsed(absolute_url).ok()
}
