//! Export serializers for the items a run delivered.
//!
//! Every export is a pure projection of the same item list, written into the
//! output directory:
//!
//! ```text
//! output_dir/
//! ├── news_data.json        # full stories for the news center page
//! ├── calendar_events.json  # one colored calendar entry per story
//! └── feed.xml              # RSS 2.0 channel
//! ```
//!
//! # Submodules
//!
//! - [`json`]: the news center data file
//! - [`calendar`]: calendar events themed by town
//! - [`rss`]: the syndication feed

use crate::config::AppConfig;
use crate::models::AdmittedItem;
use clap::ValueEnum;
use itertools::Itertools;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

pub mod calendar;
pub mod json;
pub mod rss;

/// An export that can be selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum ExportFormat {
    Json,
    Calendar,
    Rss,
}

impl ExportFormat {
    pub fn all() -> Vec<ExportFormat> {
        vec![ExportFormat::Json, ExportFormat::Calendar, ExportFormat::Rss]
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            ExportFormat::Json => "news_data.json",
            ExportFormat::Calendar => "calendar_events.json",
            ExportFormat::Rss => "feed.xml",
        }
    }
}

/// Items with an identity key already seen earlier in the list removed.
pub(crate) fn unique_items(items: &[AdmittedItem]) -> impl Iterator<Item = &AdmittedItem> {
    items.iter().unique_by(|item| item.key.clone())
}

/// Write each requested export and return the written paths.
///
/// Formats listed twice are written once. An empty run writes nothing so the
/// news center keeps serving the previous exports.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir.display(), items = items.len()))]
pub async fn write_exports(
    items: &[AdmittedItem],
    formats: &[ExportFormat],
    output_dir: &Path,
    config: &AppConfig,
) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    let mut written = Vec::new();
    if items.is_empty() {
        info!("Nothing new; keeping previous exports");
        return Ok(written);
    }
    for format in formats.iter().unique() {
        let contents = match format {
            ExportFormat::Json => json::render_news_data(items)?,
            ExportFormat::Calendar => calendar::render_calendar(items, &config.calendar)?,
            ExportFormat::Rss => rss::render_feed(items, &config.feed)?,
        };
        let path = output_dir.join(format.file_name());
        fs::write(&path, contents).await?;
        info!(path = %path.display(), ?format, "Wrote export");
        written.push(path);
    }
    Ok(written)
}
