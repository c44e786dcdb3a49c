//! Deterministic topic and locality tagging.
//!
//! The [`Classifier`] is built from three pieces of data in [`AppConfig`]:
//! a blacklist of forbidden phrases, an ordered category rule table, and the
//! gazetteer of recognized place names. Rules are evaluated in declaration
//! order and the first match wins, so a "school fundraiser for the fire
//! department" always lands in the same category.

use crate::config::{AppConfig, LocalityPolicy};
use crate::error::ConfigError;
use crate::models::{Category, LocalityTags};
use regex::{Regex, RegexBuilder};
use std::fmt;

/// Why an item was turned away. Not an error: rejected items are expected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// A blacklisted phrase appears somewhere in the text.
    Blacklisted(String),
    /// Relevance keywords are configured and none (nor any locality) matched.
    NotRelevant,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Blacklisted(phrase) => write!(f, "blacklisted phrase '{phrase}'"),
            Rejection::NotRelevant => f.write_str("no relevant locality or keyword"),
        }
    }
}

/// Outcome of classifying one unit of text.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Rejected(Rejection),
    Accepted {
        category: Category,
        localities: LocalityTags,
    },
}

#[derive(Debug, Clone)]
struct CompiledRule {
    category: Category,
    patterns: Vec<Regex>,
}

#[derive(Debug, Clone)]
struct CompiledLocality {
    name: String,
    pattern: Regex,
}

#[derive(Debug, Clone)]
pub struct Classifier {
    blacklist: Vec<(String, Regex)>,
    relevance: Vec<Regex>,
    rules: Vec<CompiledRule>,
    gazetteer: Vec<CompiledLocality>,
    policy: LocalityPolicy,
    sentinel: String,
}

fn compile(pattern: &str) -> Result<Regex, ConfigError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| ConfigError::Pattern {
            pattern: pattern.to_string(),
            source,
        })
}

impl Classifier {
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let blacklist = config
            .blacklist
            .iter()
            .map(|phrase| Ok((phrase.clone(), compile(&regex::escape(phrase))?)))
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let relevance = config
            .relevance_keywords
            .iter()
            .map(|kw| compile(&regex::escape(kw)))
            .collect::<Result<Vec<_>, _>>()?;

        let rules = config
            .categories
            .iter()
            .map(|rule| {
                Ok(CompiledRule {
                    category: rule.category,
                    patterns: rule
                        .patterns
                        .iter()
                        .map(|p| compile(p))
                        .collect::<Result<Vec<_>, _>>()?,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let gazetteer = config
            .gazetteer
            .iter()
            .map(|loc| {
                Ok(CompiledLocality {
                    name: loc.name.clone(),
                    pattern: compile(&loc.pattern)?,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Self {
            blacklist,
            relevance,
            rules,
            gazetteer,
            policy: config.locality_policy,
            sentinel: config.sentinel_locality.clone(),
        })
    }

    /// Blacklist, then relevance, then category, then locality.
    pub fn classify(&self, text: &str) -> Verdict {
        if let Some((phrase, _)) = self.blacklist.iter().find(|(_, re)| re.is_match(text)) {
            return Verdict::Rejected(Rejection::Blacklisted(phrase.clone()));
        }

        let found = self.matched_localities(text);
        if !self.relevance.is_empty()
            && found.is_empty()
            && !self.relevance.iter().any(|re| re.is_match(text))
        {
            return Verdict::Rejected(Rejection::NotRelevant);
        }

        Verdict::Accepted {
            category: self.category(text),
            localities: self.apply_policy(found),
        }
    }

    /// First rule with any matching pattern, else [`Category::General`].
    pub fn category(&self, text: &str) -> Category {
        self.rules
            .iter()
            .find(|rule| rule.patterns.iter().any(|re| re.is_match(text)))
            .map(|rule| rule.category)
            .unwrap_or(Category::General)
    }

    /// Every gazetteer locality mentioned in `text`, in gazetteer order.
    pub fn matched_localities(&self, text: &str) -> Vec<String> {
        self.gazetteer
            .iter()
            .filter(|loc| loc.pattern.is_match(text))
            .map(|loc| loc.name.clone())
            .collect()
    }

    fn apply_policy(&self, mut found: Vec<String>) -> LocalityTags {
        match self.policy {
            LocalityPolicy::Exclusive if found.len() == 1 => {
                LocalityTags::from_matches(found, &self.sentinel)
            }
            LocalityPolicy::Exclusive => LocalityTags::sentinel(&self.sentinel),
            LocalityPolicy::All => LocalityTags::from_matches(found, &self.sentinel),
            LocalityPolicy::First => {
                found.truncate(1);
                LocalityTags::from_matches(found, &self.sentinel)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CategoryRule;

    fn classifier() -> Classifier {
        Classifier::from_config(&AppConfig::default()).unwrap()
    }

    fn with_policy(policy: LocalityPolicy) -> Classifier {
        let config = AppConfig {
            locality_policy: policy,
            ..AppConfig::default()
        };
        Classifier::from_config(&config).unwrap()
    }

    fn accepted(verdict: Verdict) -> (Category, Vec<String>) {
        match verdict {
            Verdict::Accepted { category, localities } => (category, localities.as_slice().to_vec()),
            Verdict::Rejected(r) => panic!("unexpected rejection: {r}"),
        }
    }

    #[test]
    fn test_structure_fire_in_xenia() {
        let (category, tags) = accepted(
            classifier().classify("Crews respond to structure fire. The home near Xenia was a total loss."),
        );
        assert_eq!(category, Category::FireRescue);
        assert_eq!(tags, vec!["Xenia"]);
    }

    #[test]
    fn test_pancake_breakfast_is_general() {
        let (category, tags) = accepted(
            classifier().classify("Flora Volunteer Fire Dept hosts pancake breakfast. Join them in Flora Saturday."),
        );
        assert_eq!(category, Category::General);
        assert_eq!(tags, vec!["Flora"]);
    }

    #[test]
    fn test_two_towns_use_sentinel_under_exclusive_policy() {
        let (_, tags) = accepted(classifier().classify("Flora and Louisville share a road project"));
        assert_eq!(tags, vec!["County News"]);
    }

    #[test]
    fn test_no_town_uses_sentinel() {
        let (category, tags) = accepted(classifier().classify("Clay County weather turns cold this week"));
        assert_eq!(category, Category::General);
        assert_eq!(tags, vec!["County News"]);
    }

    #[test]
    fn test_all_policy_tags_every_town() {
        let (_, tags) = accepted(
            with_policy(LocalityPolicy::All).classify("Louisville and Flora share a road project"),
        );
        // Gazetteer order, not text order.
        assert_eq!(tags, vec!["Flora", "Louisville"]);
    }

    #[test]
    fn test_first_policy_takes_first_gazetteer_match() {
        let (_, tags) =
            accepted(with_policy(LocalityPolicy::First).classify("Xenia and Clay City crews"));
        assert_eq!(tags, vec!["Clay City"]);
    }

    #[test]
    fn test_word_boundaries() {
        let c = classifier();
        assert!(c.matched_localities("Floral arrangements on display").is_empty());
        assert!(c.matched_localities("The Iolani palace tour").is_empty());
        assert_eq!(c.matched_localities("CLAYCITY residents"), vec!["Clay City"]);
        assert_eq!(c.matched_localities("sailor  springs water"), vec!["Sailor Springs"]);
    }

    #[test]
    fn test_blacklist_beats_strong_category() {
        let verdict = classifier().classify("Structure fire near Cisne destroys barn in Flora");
        assert_eq!(verdict, Verdict::Rejected(Rejection::Blacklisted("Cisne".to_string())));
    }

    #[test]
    fn test_blacklist_is_case_insensitive() {
        let verdict = classifier().classify("news from WAYNE COUNTY");
        assert!(matches!(verdict, Verdict::Rejected(Rejection::Blacklisted(_))));
    }

    #[test]
    fn test_first_rule_wins() {
        // Matches the school rule and the fire rule; fire is declared first.
        let (category, _) = accepted(
            classifier().classify("High school students help after house fire in Flora"),
        );
        assert_eq!(category, Category::FireRescue);
    }

    #[test]
    fn test_rule_order_is_configuration_order() {
        let mut config = AppConfig::default();
        config.categories = vec![
            CategoryRule {
                category: Category::SchoolNews,
                patterns: vec![r"\bschool\b".to_string()],
            },
            CategoryRule {
                category: Category::FireRescue,
                patterns: vec![r"\bfire\b".to_string()],
            },
        ];
        let c = Classifier::from_config(&config).unwrap();
        assert_eq!(c.category("school fundraiser for fire department"), Category::SchoolNews);

        config.categories.reverse();
        let c = Classifier::from_config(&config).unwrap();
        assert_eq!(c.category("school fundraiser for fire department"), Category::FireRescue);
    }

    #[test]
    fn test_relevance_filter() {
        let config = AppConfig {
            relevance_keywords: vec!["Clay County".to_string()],
            ..AppConfig::default()
        };
        let c = Classifier::from_config(&config).unwrap();
        assert_eq!(
            c.classify("Statewide gas prices climb"),
            Verdict::Rejected(Rejection::NotRelevant)
        );
        assert!(matches!(c.classify("Clay County board meets"), Verdict::Accepted { .. }));
        assert!(matches!(c.classify("Xenia board meets"), Verdict::Accepted { .. }));
    }

    #[test]
    fn test_default_config_rejects_out_of_county_story() {
        let c = classifier();
        assert_eq!(
            c.classify("Salem city council approves Marion County budget"),
            Verdict::Rejected(Rejection::NotRelevant)
        );
        assert!(matches!(
            c.classify("CLAY COUNTY fair dates announced"),
            Verdict::Accepted { .. }
        ));
    }

    #[test]
    fn test_other_categories() {
        let c = classifier();
        assert_eq!(c.category("Obituary: John Smith passed away Monday"), Category::Obituary);
        assert_eq!(c.category("Man arrested after traffic stop"), Category::PoliceReport);
        assert_eq!(c.category("Governor signs budget"), Category::StateRegional);
        assert_eq!(c.category("Summer concert series returns"), Category::ArtsEntertainment);
        assert_eq!(c.category("Board of Education approves calendar"), Category::SchoolNews);
    }

    #[test]
    fn test_locality_tags_never_empty() {
        let texts = ["", "Flora", "Flora Xenia", "nothing here", "Iola"];
        for policy in [LocalityPolicy::Exclusive, LocalityPolicy::All, LocalityPolicy::First] {
            let c = with_policy(policy);
            for t in texts {
                let tags = c.apply_policy(c.matched_localities(t));
                assert!(!tags.as_slice().is_empty(), "{policy:?} {t:?}");
            }
        }
    }
}
