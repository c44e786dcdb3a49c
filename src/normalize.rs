//! Text cleanup applied to every title and body before classification.
//!
//! A [`Normalizer`] strips markup, decodes common character references,
//! removes configured noise phrases (station branding, bylines, leading
//! date stamps), collapses whitespace and "welds" punctuation and number
//! fragments so a renderer never breaks a line between `56.5` and `%` or
//! between a word and its trailing comma.
//!
//! Email addresses and URLs are protected: noise phrases are never removed
//! from inside them.
//!
//! The whole pipeline is repeated until the text stops changing, so
//! `normalize(normalize(x)) == normalize(x)` holds even when removing one
//! phrase exposes another.

use crate::error::ConfigError;
use crate::models::{NormalizedItem, RawItem};
use once_cell::sync::Lazy;
use regex::{Captures, Regex, RegexBuilder};

static RE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</?[A-Za-z!][^<>]*>").expect("tag pattern"));
static RE_ENTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9A-Fa-f]{1,6}|[A-Za-z]{2,8});").expect("entity pattern")
});
static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern"));
static RE_PROTECTED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)[A-Z0-9._%+-]+@[A-Z0-9-]+(?:\.[A-Z0-9-]+)+|\bhttps?://[^\s<>]+|\bwww\.[^\s<>]+",
    )
    .expect("protected span pattern")
});
static RE_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new("\u{E000}([0-9]+)\u{E001}").expect("placeholder pattern"));
static RE_SPACE_BEFORE_PUNCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+([.,!?;:])").expect("punctuation pattern"));
static RE_ORDINAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d+)\s+(st|nd|rd|th)\b").expect("ordinal pattern"));
static RE_SPLIT_DECIMAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d)\.\s+(\d+\s*%)").expect("decimal pattern"));
static RE_PERCENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d)\s+%").expect("percent pattern"));
static RE_CURRENCY: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\s+(\d)").expect("currency pattern"));

/// Removes markup and configured noise from free text.
#[derive(Debug, Clone)]
pub struct Normalizer {
    noise: Vec<Regex>,
}

impl Normalizer {
    /// Compile the noise phrase list. Patterns are matched case-insensitively.
    pub fn new(patterns: &[String]) -> Result<Self, ConfigError> {
        let noise = patterns
            .iter()
            .map(|p| {
                RegexBuilder::new(p)
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| ConfigError::Pattern {
                        pattern: p.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { noise })
    }

    /// Clean `text`. Empty input gives an empty string.
    ///
    /// After the first pass every pass that changes the text makes it
    /// strictly shorter, so the byte length bounds the number of passes.
    pub fn normalize(&self, text: &str) -> String {
        let mut current = text.to_string();
        for _ in 0..=text.len() + 1 {
            let next = self.pass(&current);
            if next == current {
                break;
            }
            current = next;
        }
        current
    }

    pub fn normalize_item(&self, raw: &RawItem) -> NormalizedItem {
        NormalizedItem {
            source: raw.source.clone(),
            title: self.normalize(&raw.title),
            body_text: self.normalize(&raw.body_text),
            source_link: raw.source_link.trim().to_string(),
            published_at: raw.published_at,
        }
    }

    fn pass(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }
        let text = RE_TAG.replace_all(text, " ");
        let text = decode_entities(&text);
        let text = collapse(&text);
        let text = self.strip_noise(&text);
        weld(&collapse(&text))
    }

    /// Remove noise phrases everywhere except inside emails and URLs.
    fn strip_noise(&self, text: &str) -> String {
        let mut kept: Vec<String> = Vec::new();
        let masked = RE_PROTECTED.replace_all(text, |caps: &Captures| {
            kept.push(caps[0].to_string());
            format!("\u{E000}{}\u{E001}", kept.len() - 1)
        });

        let mut stripped = masked.into_owned();
        for re in &self.noise {
            stripped = re.replace_all(&stripped, "").into_owned();
        }

        RE_PLACEHOLDER
            .replace_all(&stripped, |caps: &Captures| {
                caps[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| kept.get(i).cloned())
                    .unwrap_or_default()
            })
            .into_owned()
    }
}

fn collapse(text: &str) -> String {
    RE_WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// Glue punctuation, ordinals, decimals, percentages and currency to the
/// token they belong to.
fn weld(text: &str) -> String {
    let text = RE_SPACE_BEFORE_PUNCT.replace_all(text, "$1");
    let text = RE_ORDINAL.replace_all(&text, "$1$2");
    let text = RE_SPLIT_DECIMAL.replace_all(&text, "$1.$2");
    let text = RE_PERCENT.replace_all(&text, "$1%");
    let text = RE_CURRENCY.replace_all(&text, "$$$1");
    text.trim().to_string()
}

fn decode_entities(text: &str) -> String {
    RE_ENTITY
        .replace_all(text, |caps: &Captures| {
            let name = &caps[1];
            let decoded = if let Some(num) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                u32::from_str_radix(num, 16).ok().and_then(char::from_u32)
            } else if let Some(num) = name.strip_prefix('#') {
                num.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                named_entity(name)
            };
            match decoded {
                Some('\u{a0}') => " ".to_string(),
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn named_entity(name: &str) -> Option<char> {
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "ndash" => '–',
        "mdash" => '—',
        "hellip" => '…',
        "lsquo" => '‘',
        "rsquo" => '’',
        "ldquo" => '“',
        "rdquo" => '”',
        _ => return None,
    };
    Some(c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn normalizer() -> Normalizer {
        Normalizer::new(&AppConfig::default().noise_patterns).unwrap()
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalizer().normalize(""), "");
        assert_eq!(normalizer().normalize("   \n\t "), "");
    }

    #[test]
    fn test_strips_markup_keeps_content() {
        let n = normalizer();
        assert_eq!(
            n.normalize("<p>Flora <strong>council</strong> meets</p><p>Tuesday</p>"),
            "Flora council meets Tuesday"
        );
    }

    #[test]
    fn test_removes_branding_byline_and_leading_date() {
        let n = normalizer();
        assert_eq!(
            n.normalize("1/2/26 LOCAL -- Xenia board meets. By Tom Lavine WNOI 103.9/99.3"),
            "Xenia board meets."
        );
    }

    #[test]
    fn test_date_only_removed_at_start() {
        let n = normalizer();
        assert_eq!(
            n.normalize("Meeting moved to 1/15/26 at noon"),
            "Meeting moved to 1/15/26 at noon"
        );
    }

    #[test]
    fn test_preserves_email_and_links() {
        let n = normalizer();
        let out = n.normalize("Send tips to news@wnoi.com or visit https://wnoi.com/tips today");
        assert_eq!(out, "Send tips to news@wnoi.com or visit https://wnoi.com/tips today");
    }

    #[test]
    fn test_anchor_text_survives() {
        let n = normalizer();
        assert_eq!(
            n.normalize(r#"Register at <a href="https://flora.org/signup">flora.org/signup</a>."#),
            "Register at flora.org/signup."
        );
    }

    #[test]
    fn test_welds_punctuation_ordinals_and_numbers() {
        let n = normalizer();
        assert_eq!(n.normalize("Hello , world !"), "Hello, world!");
        assert_eq!(n.normalize("the 17 th annual fair"), "the 17th annual fair");
        assert_eq!(n.normalize("turnout rose to 56. 5 %"), "turnout rose to 56.5%");
        assert_eq!(n.normalize("a 7 .2 magnitude"), "a 7.2 magnitude");
        assert_eq!(n.normalize("tickets are $ 5 each"), "tickets are $5 each");
    }

    #[test]
    fn test_sentence_ending_number_not_glued_to_next() {
        let n = normalizer();
        assert_eq!(n.normalize("Founded in 2019. 45 people came"), "Founded in 2019. 45 people came");
    }

    #[test]
    fn test_decodes_entities() {
        let n = normalizer();
        assert_eq!(
            n.normalize("Flora&#8217;s mayor &amp; council&nbsp;meet"),
            "Flora’s mayor & council meet"
        );
        assert_eq!(n.normalize("&bogus; stays"), "&bogus; stays");
    }

    #[test]
    fn test_nested_noise_removed_to_fixed_point() {
        let n = normalizer();
        assert_eq!(n.normalize("wnwnoioi Flora"), "Flora");
    }

    #[test]
    fn test_deeply_nested_input_is_idempotent() {
        let n = normalizer();
        let escaped = format!("&{}lt;b&gt; Flora", "amp;".repeat(9));
        let branded = format!("{}{} Flora", "wn".repeat(10), "oi".repeat(10));
        for s in [escaped, branded] {
            let once = n.normalize(&s);
            assert_eq!(once, "Flora", "input {s:?}");
            assert_eq!(n.normalize(&once), once);
        }
    }

    #[test]
    fn test_idempotent_over_samples() {
        let n = normalizer();
        let samples = [
            "<div>1/2/26 WNOI LOCAL -- The Flora   City Council , met</div>",
            "&amp;lt;b&amp;gt;bold&amp;lt;/b&amp;gt; text",
            "Contact jane.doe@claycounty.il.us . Visit www.wnoi.com !",
            "The 3 rd place team scored 7 . 5 % more , said By Tom Lavine",
            "  ",
            "wnwnoioi 103.9/99.3 tail",
            "$ 1,200 raised for the 2 nd year ; thanks !",
            "Plain text with nothing to change.",
        ];
        for s in samples {
            let once = n.normalize(s);
            assert_eq!(n.normalize(&once), once, "not idempotent for {s:?}");
        }
    }

    #[test]
    fn test_bad_pattern_is_config_error() {
        let err = Normalizer::new(&["(unclosed".to_string()]).unwrap_err();
        assert!(matches!(err, ConfigError::Pattern { .. }));
    }

    #[test]
    fn test_normalize_item_trims_link() {
        let n = normalizer();
        let raw = RawItem {
            source: "feed".to_string(),
            title: "<b>Title</b>".to_string(),
            body_text: "Body ,text".to_string(),
            source_link: "  https://example.com/a  ".to_string(),
            published_at: None,
        };
        let item = n.normalize_item(&raw);
        assert_eq!(item.title, "Title");
        assert_eq!(item.body_text, "Body,text");
        assert_eq!(item.source_link, "https://example.com/a");
    }
}
