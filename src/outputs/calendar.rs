//! Calendar events, one per delivered story.
//!
//! Each event is dated on the story's publication day, links to the news
//! center page, and takes its colors from the theme of its primary town.

use crate::config::CalendarConfig;
use crate::models::AdmittedItem;
use crate::outputs::unique_items;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ExtendedProps<'a> {
    pub town: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent<'a> {
    pub title: &'a str,
    /// `YYYY-MM-DD`
    pub start: String,
    pub description: &'a str,
    pub url: &'a str,
    pub background_color: &'a str,
    pub text_color: &'a str,
    pub extended_props: ExtendedProps<'a>,
}

pub fn calendar_events<'a>(
    items: &'a [AdmittedItem],
    config: &'a CalendarConfig,
) -> Vec<CalendarEvent<'a>> {
    unique_items(items)
        .map(|item| {
            let town = item.localities().primary();
            let theme = config.theme_for(town);
            CalendarEvent {
                title: item.title(),
                start: item.timestamp().format("%Y-%m-%d").to_string(),
                description: item.body(),
                url: &config.url,
                background_color: &theme.bg,
                text_color: &theme.text,
                extended_props: ExtendedProps { town },
            }
        })
        .collect()
}

pub fn render_calendar(
    items: &[AdmittedItem],
    config: &CalendarConfig,
) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&calendar_events(items, config))
}
