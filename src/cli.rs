//! Command-line interface definitions for County News Wire.
//!
//! Publishing credentials can come from flags or from the environment.

use crate::outputs::ExportFormat;
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for one aggregation run.
///
/// # Examples
///
/// ```sh
/// # Built-in Clay County setup, exports into ./public
/// county_news_wire -o ./public
///
/// # Custom configuration, no publishing
/// county_news_wire -c county.yaml --dry-run
///
/// # Only the RSS feed
/// county_news_wire --formats rss
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Directory the export files are written to
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// History file path (overrides the configured one)
    #[arg(long)]
    pub history: Option<PathBuf>,

    /// Exports to write, comma separated
    #[arg(long, value_enum, value_delimiter = ',', default_values_t = ExportFormat::all())]
    pub formats: Vec<ExportFormat>,

    /// Classify and export without publishing or touching history
    #[arg(long)]
    pub dry_run: bool,

    /// WordPress user for the REST API
    #[arg(long, env = "WP_USERNAME")]
    pub wp_username: Option<String>,

    /// WordPress application password
    #[arg(long, env = "WP_APP_PASSWORD", hide_env_values = true)]
    pub wp_app_password: Option<String>,
}
