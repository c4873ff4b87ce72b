use url::Url;

/// Extracts the politeness key for a URL
///
/// The key is the lowercase host, followed by `:port` when the URL carries a
/// non-default port, so two servers on one machine are throttled separately.
///
/// # Returns
///
/// * `Some(String)` - The host key
/// * `None` - If the URL has no host
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sumi_sieve::url::host_key;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(host_key(&url), Some("example.com".to_string()));
///
/// let url = Url::parse("http://127.0.0.1:8080/").unwrap();
/// assert_eq!(host_key(&url), Some("127.0.0.1:8080".to_string()));
/// ```
pub fn host_key(url: &Url) -> Option<String> {
    let host = url.host_str().filter(|h| !h.is_empty())?.to_lowercase();
    match url.port() {
        Some(port) => Some(format!("{}:{}", host, port)),
        None => Some(host),
    }
}
