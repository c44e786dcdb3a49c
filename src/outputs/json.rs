//! The news center data file.
//!
//! One record per delivered story, with the full normalized body:
//!
//! ```json
//! [{"id": "structure-fire-xenia", "title": "...", "full_story": "...",
//!   "category": "Fire & Rescue", "tags": ["Xenia"], "link": "...",
//!   "source": "wnoi-local", "date_added": "...", "published_at": "..."}]
//! ```

use crate::models::{AdmittedItem, Category, IdentityKey};
use crate::outputs::unique_items;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct NewsRecord<'a> {
    pub id: &'a IdentityKey,
    pub title: &'a str,
    pub full_story: &'a str,
    pub category: Category,
    pub tags: &'a [String],
    pub link: &'a str,
    pub source: &'a str,
    pub date_added: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

impl<'a> From<&'a AdmittedItem> for NewsRecord<'a> {
    fn from(item: &'a AdmittedItem) -> Self {
        Self {
            id: &item.key,
            title: item.title(),
            full_story: item.body(),
            category: item.category(),
            tags: item.localities().as_slice(),
            link: item.link(),
            source: &item.classified.item.source,
            date_added: item.admitted_at,
            published_at: item.classified.item.published_at,
        }
    }
}

pub fn news_records(items: &[AdmittedItem]) -> Vec<NewsRecord<'_>> {
    unique_items(items).map(NewsRecord::from).collect()
}

/// Pretty-printed `news_data.json` contents.
pub fn render_news_data(items: &[AdmittedItem]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&news_records(items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outputs::tests::sample;
    use serde_json::Value;

    #[test]
    fn test_render_news_data() {
        let items = vec![
            sample("structure-fire-xenia", "Structure fire", Some("Xenia")),
            sample("county-board", "County board meets", None),
        ];
        let json: Value = serde_json::from_str(&render_news_data(&items).unwrap()).unwrap();
        let records = json.as_array().unwrap();
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first["id"], "structure-fire-xenia");
        assert_eq!(first["title"], "Structure fire");
        assert_eq!(first["full_story"], "Structure fire body text.");
        assert_eq!(first["category"], "Fire & Rescue");
        assert_eq!(first["tags"], serde_json::json!(["Xenia"]));
        assert_eq!(first["link"], "https://www.wnoi.com/structure-fire-xenia");
        assert_eq!(first["source"], "wnoi-local");
        assert_eq!(first["date_added"], "2026-01-07T09:00:00Z");
        assert_eq!(first["published_at"], "2026-01-06T14:30:00Z");

        assert_eq!(records[1]["tags"], serde_json::json!(["County News"]));
    }

    #[test]
    fn test_duplicate_keys_written_once() {
        let items = vec![sample("a", "A", None), sample("a", "A", None)];
        assert_eq!(news_records(&items).len(), 1);
    }

    #[test]
    fn test_empty_export_is_empty_array() {
        assert_eq!(render_news_data(&[]).unwrap(), "[]");
    }
}
