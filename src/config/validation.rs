use crate::config::types::{Config, CrawlerConfig, UserAgentConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
///
/// Seed URLs are not validated here: an invalid seed is skipped with a warning
/// when the crawl starts, and only a run with no valid seed at all is fatal.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_workers < 1 || config.max_concurrent_workers > 256 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_workers must be between 1 and 256, got {}",
            config.max_concurrent_workers
        )));
    }

    if config.max_concurrent_per_host < 1 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_per_host must be >= 1, got {}",
            config.max_concurrent_per_host
        )));
    }

    if config.request_timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "request_timeout_ms must be >= 100ms, got {}ms",
            config.request_timeout_ms
        )));
    }

    if config.max_redirects > 20 {
        return Err(ConfigError::Validation(format!(
            "max_redirects must be <= 20, got {}",
            config.max_redirects
        )));
    }

    // Room for at least the "\n\n" separator
    if config.content_char_cap < 2 {
        return Err(ConfigError::Validation(format!(
            "content_char_cap must be >= 2, got {}",
            config.content_char_cap
        )));
    }

    if config.max_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "max_retries must be <= 10, got {}",
            config.max_retries
        )));
    }

    if config.max_pages == Some(0) {
        return Err(ConfigError::Validation(
            "max_pages must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    if config.crawler_version.is_empty() || config.crawler_version.contains(char::is_whitespace)
    {
        return Err(ConfigError::Validation(format!(
            "crawler_version must be a non-empty token, got '{}'",
            config.crawler_version
        )));
    }

    if let Some(contact) = &config.contact_url {
        Url::parse(contact)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;
    }

    Ok(())
}
