//! # County News Wire
//!
//! Collects local news items from a small set of upstream sources, cleans
//! and classifies them, drops anything already distributed, and posts the
//! rest to per-town WordPress sites and a county hub.
//!
//! ## Usage
//!
//! ```sh
//! WP_USERNAME=editor WP_APP_PASSWORD=... county_news_wire -o ./public
//! ```
//!
//! ## Architecture
//!
//! One run is a single pass through the pipeline:
//! 1. **Aggregation**: every source adapter is fetched concurrently
//! 2. **Normalization**: markup, station branding and spacing defects removed
//! 3. **Classification**: blacklist, category and locality tags
//! 4. **Deduplication**: identity keys checked against this run and history
//! 5. **Distribution**: primary destination, then the hub mirror
//! 6. **Export**: JSON, calendar and RSS files for the news center page

use clap::Parser;
use reqwest::Client;
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod classify;
mod cli;
mod config;
mod dedup;
mod error;
mod history;
mod models;
mod normalize;
mod outputs;
mod pipeline;
mod router;
mod sources;
#[cfg(test)]
mod test_http;
mod utils;

use classify::Classifier;
use cli::Cli;
use config::AppConfig;
use history::HistoryStore;
use normalize::Normalizer;
use outputs::write_exports;
use pipeline::Aggregator;
use router::{Credentials, Router};
use sources::build_adapters;
use utils::{ensure_writable_dir, truncate_for_log};

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("county_news_wire starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args.config, ?args.output_dir, ?args.formats, dry_run = args.dry_run, "Parsed CLI arguments");

    let config = match AppConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Configuration rejected");
            return Err(e.into());
        }
    };

    // Early check: ensure output dir is writable
    let output_dir = args.output_dir.to_string_lossy().to_string();
    if let Err(e) = ensure_writable_dir(&output_dir).await {
        error!(
            path = %output_dir,
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let normalizer = Normalizer::new(&config.noise_patterns)?;
    let classifier = Classifier::from_config(&config)?;
    let source_timeout = Duration::from_secs(config.source_timeout_secs);
    let client = Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()?;

    let history_path = args
        .history
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.history.path));
    let mut history = HistoryStore::load(&history_path, config.history.max_entries).await;

    // ---- Aggregate ----
    let adapters = build_adapters(&config.sources, &client);
    let aggregator = Aggregator::new(&normalizer, &classifier, &config.identity, source_timeout);
    let report = aggregator.run(&adapters, history.view()).await;

    for stats in &report.stats {
        info!(
            source = %stats.source,
            unavailable = stats.unavailable,
            fetched = stats.fetched,
            malformed = stats.malformed,
            rejected = stats.rejected,
            duplicates = stats.duplicates,
            admitted = stats.admitted,
            "Source summary"
        );
    }

    // ---- Distribute ----
    let exported = if args.dry_run {
        for item in &report.admitted {
            info!(
                key = %item.key,
                category = %item.category(),
                title = %truncate_for_log(item.title(), 80),
                "Dry run: would publish"
            );
        }
        report.admitted
    } else {
        let credentials = match (args.wp_username, args.wp_app_password) {
            (Some(username), Some(app_password)) => Some(Credentials {
                username,
                app_password,
            }),
            _ => {
                warn!("No WordPress credentials; publishes will fail and nothing will be recorded");
                None
            }
        };
        let router = Router::from_config(&config.distribution, credentials, &client)?;
        router.distribute(report.admitted, &mut history).await
    };

    // ---- Export ----
    if let Err(e) = write_exports(&exported, &args.formats, &args.output_dir, &config).await {
        error!(error = %e, "Failed to write exports");
    }

    if !args.dry_run {
        if let Err(e) = history.save().await {
            error!(path = %history.path().display(), error = %e, "Failed to save history");
            return Err(e.into());
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        items = exported.len(),
        "Execution complete"
    );

    Ok(())
}
