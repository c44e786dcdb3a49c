//! Story identity and duplicate detection.
//!
//! Two items are the same story when their [`IdentityKey`]s are equal. A key
//! is a lower-cased, punctuation-free, dash-joined slug of the normalized
//! title, truncated to a fixed length. Distinct stories whose slugs agree on
//! the first `max_len` characters collapse into one; that loss is accepted.
//!
//! Both the in-run seen set and the persisted history answer the same
//! [`SeenStore`] contract, so the [`DedupEngine`] does not care where a key
//! came from.

use crate::config::IdentityConfig;
use crate::models::{ClassifiedItem, IdentityKey};
use itertools::Itertools;
use std::collections::HashSet;

/// A set of identity keys that have already been seen.
pub trait SeenStore {
    fn contains(&self, key: &IdentityKey) -> bool;

    /// Returns `true` when the key was not present before.
    fn insert(&mut self, key: IdentityKey) -> bool;
}

impl SeenStore for HashSet<IdentityKey> {
    fn contains(&self, key: &IdentityKey) -> bool {
        HashSet::contains(self, key)
    }

    fn insert(&mut self, key: IdentityKey) -> bool {
        HashSet::insert(self, key)
    }
}

/// Derive the identity key for `title`.
///
/// When `locality` is given it is appended to the title before slugging, for
/// deployments that must keep same-headline stories from different towns
/// apart.
///
/// ```ignore
/// assert_eq!(identify("Flora Council Meets!", None, 50).as_str(), "flora-council-meets");
/// ```
pub fn identify(title: &str, locality: Option<&str>, max_len: usize) -> IdentityKey {
    let basis = match locality {
        Some(loc) => format!("{title} {loc}"),
        None => title.to_string(),
    };
    let cleaned: String = basis
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    let slug: String = cleaned.split_whitespace().join("-").chars().take(max_len).collect();
    IdentityKey::new(slug.trim_end_matches('-'))
}

/// Identity of a classified item under the configured identity policy.
///
/// The locality only takes part when the policy asks for it and the item has
/// a specific (non-sentinel) primary locality.
pub fn identify_item(item: &ClassifiedItem, policy: &IdentityConfig) -> IdentityKey {
    let locality = (policy.include_locality && !item.localities.is_sentinel())
        .then(|| item.localities.primary());
    identify(&item.item.title, locality, policy.max_len)
}

/// Duplicate check over keys admitted this run plus prior-run history.
#[derive(Debug)]
pub struct DedupEngine<H: SeenStore> {
    in_run: HashSet<IdentityKey>,
    history: H,
}

impl<H: SeenStore> DedupEngine<H> {
    pub fn new(history: H) -> Self {
        Self {
            in_run: HashSet::new(),
            history,
        }
    }

    pub fn is_duplicate(&self, key: &IdentityKey) -> bool {
        SeenStore::contains(&self.in_run, key) || self.history.contains(key)
    }

    /// Mark `key` as seen this run. Returns `false` when it is a duplicate.
    pub fn admit(&mut self, key: &IdentityKey) -> bool {
        if self.is_duplicate(key) {
            return false;
        }
        SeenStore::insert(&mut self.in_run, key.clone())
    }

    pub fn admitted_this_run(&self) -> usize {
        self.in_run.len()
    }
}
