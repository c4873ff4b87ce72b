use crate::UrlError;
use url::Url;

/// Normalizes a URL so that equal addresses compare equal
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed or relative
/// 2. Accept only `http` and `https` schemes
/// 3. Require a non-empty host and lowercase it
/// 4. Remove the fragment (everything after #)
///
/// Scheme and host are compared case-insensitively; path and query are kept
/// byte-for-byte, so `/Page?b=2&a=1` and `/page?a=1&b=2` stay distinct.
/// Default ports are elided and an empty path becomes `/` by the parser.
///
/// # Examples
///
/// ```
/// use sumi_sieve::url::normalize_url;
///
/// let url = normalize_url("HTTP://Example.COM/Path?q=1#top").unwrap();
/// assert_eq!(url.as_str(), "http://example.com/Path?q=1");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
    normalize_parsed(url)
}

/// Applies the normalization rules to an already parsed URL
pub(crate) fn normalize_parsed(mut url: Url) -> Result<Url, UrlError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => {
            let lowered = host.to_lowercase();
            if lowered != host {
                url.set_host(Some(&lowered))
                    .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;
            }
        }
        _ => return Err(UrlError::MissingDomain),
    }

    url.set_fragment(None);

    Ok(url)
}
