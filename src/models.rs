//! Data models for items as they move through a run.
//!
//! An item starts life as a [`RawItem`] yielded by a source adapter, becomes a
//! [`NormalizedItem`] once its text is cleaned, a [`ClassifiedItem`] once it
//! carries a [`Category`] and [`LocalityTags`], and finally an [`AdmittedItem`]
//! once it has an [`IdentityKey`] and has passed the dedup check.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A candidate item exactly as a source adapter produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawItem {
    /// Name of the adapter that produced the item.
    pub source: String,
    pub title: String,
    /// A short teaser or a full article, depending on the source.
    pub body_text: String,
    pub source_link: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// A [`RawItem`] whose title and body went through the normalizer.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedItem {
    pub source: String,
    pub title: String,
    pub body_text: String,
    pub source_link: String,
    pub published_at: Option<DateTime<Utc>>,
}

impl NormalizedItem {
    /// Title and body joined, as seen by the classifier.
    pub fn combined_text(&self) -> String {
        format!("{} {}", self.title, self.body_text)
    }
}

/// Topical category of a story. Exactly one per item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub enum Category {
    #[serde(rename = "General")]
    General,
    #[serde(rename = "Obituary")]
    Obituary,
    #[serde(rename = "Fire & Rescue")]
    FireRescue,
    #[serde(rename = "Police Report")]
    PoliceReport,
    #[serde(rename = "School News")]
    SchoolNews,
    #[serde(rename = "State/Regional")]
    StateRegional,
    #[serde(rename = "Arts & Entertainment")]
    ArtsEntertainment,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::General => "General",
            Category::Obituary => "Obituary",
            Category::FireRescue => "Fire & Rescue",
            Category::PoliceReport => "Police Report",
            Category::SchoolNews => "School News",
            Category::StateRegional => "State/Regional",
            Category::ArtsEntertainment => "Arts & Entertainment",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Localities a story pertains to.
///
/// Never empty: when no specific place applies the set holds only the
/// sentinel (county/region-wide) name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LocalityTags {
    tags: Vec<String>,
    #[serde(skip)]
    sentinel: bool,
}

impl LocalityTags {
    pub fn sentinel(name: &str) -> Self {
        Self {
            tags: vec![name.to_string()],
            sentinel: true,
        }
    }

    /// Use `found` as the tag set, or the sentinel when `found` is empty.
    pub fn from_matches(found: Vec<String>, sentinel: &str) -> Self {
        if found.is_empty() {
            Self::sentinel(sentinel)
        } else {
            Self {
                tags: found,
                sentinel: false,
            }
        }
    }

    /// The locality used for routing and identity.
    pub fn primary(&self) -> &str {
        // Both constructors guarantee at least one element.
        &self.tags[0]
    }

    pub fn is_sentinel(&self) -> bool {
        self.sentinel
    }

    pub fn as_slice(&self) -> &[String] {
        &self.tags
    }
}

/// A [`NormalizedItem`] with its category and locality.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedItem {
    pub item: NormalizedItem,
    pub category: Category,
    pub localities: LocalityTags,
}

/// Stable identifier of a story, derived from its normalized title.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct IdentityKey(String);

impl IdentityKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An item that passed admission and dedup, plus where it was delivered.
#[derive(Debug, Clone, PartialEq)]
pub struct AdmittedItem {
    pub key: IdentityKey,
    pub classified: ClassifiedItem,
    /// Destination ids that accepted the item. Empty until routed.
    pub delivered_to: Vec<String>,
    pub admitted_at: DateTime<Utc>,
}

impl AdmittedItem {
    pub fn title(&self) -> &str {
        &self.classified.item.title
    }

    pub fn body(&self) -> &str {
        &self.classified.item.body_text
    }

    pub fn link(&self) -> &str {
        &self.classified.item.source_link
    }

    pub fn category(&self) -> Category {
        self.classified.category
    }

    pub fn localities(&self) -> &LocalityTags {
        &self.classified.localities
    }

    /// Publication time when the source supplied one, admission time otherwise.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.classified.item.published_at.unwrap_or(self.admitted_at)
    }
}
