//! Sumi-Sieve: a polite, concurrent page sieve
//!
//! This crate fetches web pages starting from seed URLs, extracts their title,
//! visible text and outbound links, and follows those links breadth-first while
//! respecting per-host concurrency and delay limits.

pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for Sumi-Sieve operations
#[derive(Debug, Error)]
pub enum SieveError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::TaskState,
        to: state::TaskState,
    },

    #[error("Crawl task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("No valid seed URLs to crawl")]
    NoValidSeeds,
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Classification of a single page failure
///
/// Terminal kinds are recorded once; transient kinds are retried by the
/// coordinator before they become terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// URL lacks a scheme or host, or uses a non-HTTP scheme
    InvalidUrl,
    /// Host name could not be resolved
    DnsError,
    /// Connection refused, reset during connect, or timed out
    ConnectionError,
    /// Server answered with a non-2xx status
    HttpError { status: u16 },
    /// Redirect chain looped or exceeded the hop limit
    RedirectLoopError,
    /// Any other transport fault
    TransportError,
    /// Extraction fell back to empty content (not fatal)
    ParseDegraded,
}

impl ErrorKind {
    /// Returns true if a failure of this kind is worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectionError | Self::TransportError)
    }

    /// Returns true if a failure of this kind ends processing of the URL
    pub fn is_terminal(&self) -> bool {
        !self.is_transient() && !matches!(self, Self::ParseDegraded)
    }

    /// Short stable label, used for statistics and log fields
    pub fn label(&self) -> &'static str {
        match self {
            Self::InvalidUrl => "invalid-url",
            Self::DnsError => "dns-error",
            Self::ConnectionError => "connection-error",
            Self::HttpError { .. } => "http-error",
            Self::RedirectLoopError => "redirect-loop",
            Self::TransportError => "transport-error",
            Self::ParseDegraded => "parse-degraded",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HttpError { status } => write!(f, "HttpError({})", status),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Structured error reported for a single URL
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct CrawlError {
    pub kind: ErrorKind,
    pub message: String,
}

impl CrawlError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Result type alias for Sumi-Sieve operations
pub type Result<T> = std::result::Result<T, SieveError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlSession, Crawler};
pub use output::{CrawlOutcome, CrawlRecord, CrawlStats};
pub use state::{HostState, TaskState};
pub use crate::url::{host_key, normalize_url, resolve_link};
