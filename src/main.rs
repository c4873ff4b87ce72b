//! Sumi-Sieve main entry point
//!
//! This is the command-line interface for the Sumi-Sieve crawler.

use anyhow::Context;
use clap::Parser;
use futures::StreamExt;
use std::path::PathBuf;
use sumi_sieve::config::{load_config_with_hash, validate, Config};
use sumi_sieve::output::{format_record, print_statistics};
use sumi_sieve::Crawler;
use tracing_subscriber::EnvFilter;

/// Sumi-Sieve: A polite, concurrent page sieve
///
/// Sumi-Sieve fetches pages starting from the given seeds, prints each page's
/// title and visible text, and follows links breadth-first up to a maximum
/// depth while limiting how hard any one host is hit.
#[derive(Parser, Debug)]
#[command(name = "sumi-sieve")]
#[command(version)]
#[command(about = "A polite, concurrent page sieve", long_about = None)]
struct Cli {
    /// Seed URLs; replaces the `seeds` list of the config file when given
    #[arg(value_name = "SEEDS")]
    seeds: Vec<String>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Maximum link depth from the seeds
    #[arg(long, value_name = "N")]
    max_depth: Option<u32>,

    /// Maximum number of pages processed at once
    #[arg(long, value_name = "N")]
    workers: Option<usize>,

    /// Maximum simultaneous requests to a single host
    #[arg(long, value_name = "N")]
    per_host: Option<usize>,

    /// Minimum delay between requests to a single host, in milliseconds
    #[arg(long, value_name = "N")]
    delay_ms: Option<u64>,

    /// Per-request timeout, in milliseconds
    #[arg(long, value_name = "N")]
    timeout_ms: Option<u64>,

    /// Stop after this many pages have been started
    #[arg(long, value_name = "N")]
    max_pages: Option<usize>,

    /// Stop starting new pages after this many seconds
    #[arg(long, value_name = "N")]
    max_seconds: Option<u64>,

    /// Character cap for title plus text
    #[arg(long, value_name = "N")]
    cap: Option<usize>,

    /// Also print the raw links found on each page
    #[arg(long)]
    links: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => Config::default(),
    };

    apply_overrides(&mut config, &cli);
    validate(&config).context("invalid configuration")?;

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    handle_crawl(config, cli.links).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_sieve=info,warn"),
            1 => EnvFilter::new("sumi_sieve=debug,info"),
            2 => EnvFilter::new("sumi_sieve=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Layers command-line flags over the file configuration
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if !cli.seeds.is_empty() {
        config.seeds = cli.seeds.clone();
    }

    let crawler = &mut config.crawler;
    if let Some(depth) = cli.max_depth {
        crawler.max_depth = depth;
    }
    if let Some(workers) = cli.workers {
        crawler.max_concurrent_workers = workers;
    }
    if let Some(per_host) = cli.per_host {
        crawler.max_concurrent_per_host = per_host;
    }
    if let Some(delay) = cli.delay_ms {
        crawler.min_host_delay_ms = delay;
    }
    if let Some(timeout) = cli.timeout_ms {
        crawler.request_timeout_ms = timeout;
    }
    if let Some(pages) = cli.max_pages {
        crawler.max_pages = Some(pages);
    }
    if let Some(secs) = cli.max_seconds {
        crawler.max_duration_secs = Some(secs);
    }
    if let Some(cap) = cli.cap {
        crawler.content_char_cap = cap;
    }
}

/// Handles the --dry-run mode: shows what would be crawled
fn handle_dry_run(config: &Config) {
    let crawler = &config.crawler;

    println!("=== Sumi-Sieve Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max depth: {}", crawler.max_depth);
    println!("  Workers: {}", crawler.max_concurrent_workers);
    println!("  Per-host limit: {}", crawler.max_concurrent_per_host);
    println!("  Host delay: {}ms", crawler.min_host_delay_ms);
    println!("  Request timeout: {}ms", crawler.request_timeout_ms);
    println!("  Max redirects: {}", crawler.max_redirects);
    println!("  Content cap: {} chars", crawler.content_char_cap);
    println!(
        "  Retries: {} (base delay {}ms)",
        crawler.max_retries, crawler.retry_base_delay_ms
    );
    if let Some(pages) = crawler.max_pages {
        println!("  Page budget: {}", pages);
    }
    if let Some(secs) = crawler.max_duration_secs {
        println!("  Time budget: {}s", secs);
    }

    println!("\nUser Agent: {}", config.user_agent.header_value());

    println!("\nSeeds ({}):", config.seeds.len());
    for seed in &config.seeds {
        println!("  - {}", seed);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, show_links: bool) -> anyhow::Result<()> {
    let crawler = Crawler::new(config.crawler, config.user_agent)?;

    let token = crawler.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, stopping crawl");
            token.cancel();
        }
    });

    let mut session = crawler.crawl(&config.seeds)?;
    while let Some(record) = session.next().await {
        println!("{}", format_record(&record, show_links));
    }

    let stats = session.finish().await?;
    print_statistics(&stats);

    Ok(())
}
