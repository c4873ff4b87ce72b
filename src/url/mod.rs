//! URL handling module for Sumi-Sieve
//!
//! This module provides URL normalization, host-key extraction for politeness
//! bookkeeping, and resolution of extracted hrefs against the page they came from.

mod domain;
mod normalize;
mod resolve;

// Re-export main functions
pub use domain::host_key;
pub use normalize::normalize_url;
pub use resolve::resolve_link;
