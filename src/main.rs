//! albopop-feeds: scrape every configured notice board and write its feed.
//!
//! ## Architecture overview
//!
//! ```text
//! ┌───────────┐ JobRow  ┌──────────┐ create  ┌────────────┐
//! │ config.rs │ ──────► │ pool.rs  │ ──────► │ registry   │
//! │  (CSV)    │ (queue) │ (threads)│         └────────────┘
//! └───────────┘         └──────────┘               │ Box<dyn Provider>
//!                         ▲     │                  ▼
//!                  JobMsg │     │ items    ┌────────────┐
//!                         │     ▼          │ source/*   │
//!                       ┌──────────┐       │ (adapters) │
//!                       │ feed.rs  │       └────────────┘
//!                       │ (RSS)    │
//!                       └──────────┘
//! ```
//!
//! `main` wires everything together: parse args, read the jobs file, then
//! either print a dry run or start the pool and report each job's outcome.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use albopop_feeds::config::{self, JobRow};
use albopop_feeds::pool::{self, JobContext, JobMsg};
use albopop_feeds::registry::ProviderRegistry;
use albopop_feeds::scrape;
use albopop_feeds::source::{Fetch, HttpFetcher, DEFAULTS};

#[derive(Parser)]
#[command(name = "albopop-feeds", about = "Unofficial RSS feeds for Italian public notice boards")]
struct Cli {
    /// Jobs file (CSV with provider, options, feed_name, ... columns)
    csv: PathBuf,

    /// Directory the feeds are written to
    download_dir: PathBuf,

    /// Number of jobs scraped at the same time
    #[arg(long, default_value_t = 4)]
    workers: usize,

    /// HTTP request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    #[arg(long, default_value = HttpFetcher::DEFAULT_USER_AGENT)]
    user_agent: String,

    /// Print discovered URLs and items instead of writing feeds
    #[arg(long)]
    dry_run: bool,
}

/// Log filter used when `RUST_LOG` is unset or unparseable.
const DEFAULT_LOG_FILTER: &str = "albopop_feeds=info";

/// `RUST_LOG` when it is set and valid, replacing the default entirely.
fn log_filter(rust_log: Option<String>) -> EnvFilter {
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok()))
        .init();

    // -- parse arguments -----------------------------------------------------
    let cli = Cli::parse();

    let jobs = config::read_jobs(&cli.csv)
        .with_context(|| format!("reading jobs from {}", cli.csv.display()))?;
    let fetcher: Arc<dyn Fetch> = Arc::new(
        HttpFetcher::new(Duration::from_secs(cli.timeout), &cli.user_agent)
            .context("building HTTP client")?,
    );
    let registry = ProviderRegistry::default();

    if cli.dry_run {
        dry_run(&registry, fetcher, &jobs);
        return Ok(());
    }

    std::fs::create_dir_all(&cli.download_dir)
        .with_context(|| format!("creating {}", cli.download_dir.display()))?;

    // -- run the pool --------------------------------------------------------
    let ctx = Arc::new(JobContext {
        registry,
        fetcher,
        out_dir: cli.download_dir,
        now: Utc::now().with_timezone(&DEFAULTS.timezone).fixed_offset(),
    });
    let (rx, handles) = pool::spawn(jobs, ctx, cli.workers);

    let (mut finished, mut skipped, mut failed) = (0, 0, 0);
    for msg in rx {
        match msg {
            JobMsg::Finished {
                feed_name,
                items,
                path,
            } => {
                finished += 1;
                info!(feed = %feed_name, items, path = %path.display(), "job finished");
            }
            JobMsg::Skipped { feed_name, reason } => {
                skipped += 1;
                warn!(feed = %feed_name, %reason, "job skipped");
            }
            JobMsg::Failed { feed_name, error } => {
                failed += 1;
                warn!(feed = %feed_name, %error, "job failed");
            }
        }
    }
    for handle in handles {
        if handle.join().is_err() {
            warn!("worker panicked");
        }
    }

    info!(finished, skipped, failed, "all jobs done");
    Ok(())
}

/// Print what each job would publish, one job after the other.
fn dry_run(registry: &ProviderRegistry, fetcher: Arc<dyn Fetch>, jobs: &[JobRow]) {
    for job in jobs {
        println!("== {} ({} {})", job.feed_name, job.provider, job.options);
        let preview = match scrape::preview(registry, fetcher.clone(), &job.provider, &job.options) {
            Ok(preview) => preview,
            Err(e) => {
                println!("   skipped: {e}");
                continue;
            }
        };

        for url in &preview.urls {
            println!("   url  {url}");
        }
        for item in &preview.outcome.items {
            println!(
                "   item {} | {} | {}",
                preview.outcome.defaults.format_timestamp(&item.pub_date),
                item.title,
                item.link
            );
            for category in &item.categories {
                println!("        {} = {}", category.domain, category.value);
            }
            for enclosure in &item.enclosures {
                println!(
                    "        {} ({} bytes, {})",
                    enclosure.url, enclosure.length, enclosure.mime_type
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rust_log_overrides_the_default_filter() {
        assert_eq!(log_filter(None).to_string(), DEFAULT_LOG_FILTER);
        assert_eq!(log_filter(Some("  ".into())).to_string(), DEFAULT_LOG_FILTER);

        let filter = log_filter(Some("albopop_feeds=debug".into())).to_string();
        assert_eq!(filter, "albopop_feeds=debug");
    }

    #[test]
    fn invalid_rust_log_falls_back() {
        assert_eq!(
            log_filter(Some("albopop_feeds=loud".into())).to_string(),
            DEFAULT_LOG_FILTER
        );
    }

    #[test]
    fn cli_defaults() {
        let cli = Cli::parse_from(["albopop-feeds", "jobs.csv", "feeds"]);
        assert_eq!(cli.workers, 4);
        assert_eq!(cli.timeout, 30);
        assert_eq!(cli.user_agent, HttpFetcher::DEFAULT_USER_AGENT);
        assert!(!cli.dry_run);
    }
}
