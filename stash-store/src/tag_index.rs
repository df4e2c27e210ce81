//! Bidirectional tag index: tag to keys and key to tags.
//!
//! Both outer maps are lock-free concurrent maps. Only the owning store's
//! critical section installs rows on both sides at once (`record`,
//! `take_tags`); the removal paths (`remove_key`) use nothing but lock-free
//! inner operations so they are safe to call from expiry and eviction code
//! that must not re-enter the critical section.

use dashmap::{DashMap, DashSet};

#[derive(Debug, Default)]
pub(crate) struct TagIndex {
    by_tag: DashMap<String, DashSet<String>>,
    by_key: DashMap<String, Vec<String>>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the key's tag rows. Caller holds the store's critical
    /// section.
    pub fn record(&self, key: &str, tags: &[String]) {
        self.remove_key(key);
        if tags.is_empty() {
            return;
        }
        self.by_key.insert(key.to_string(), tags.to_vec());
        for tag in tags {
            self.by_tag
                .entry(tag.clone())
                .or_default()
                .insert(key.to_string());
        }
    }

    /// Drop every row referencing `key`. Lock-free; safe from eviction
    /// paths.
    pub fn remove_key(&self, key: &str) {
        if let Some((_, tags)) = self.by_key.remove(key) {
            for tag in tags {
                if let Some(set) = self.by_tag.get(&tag) {
                    set.remove(key);
                }
            }
        }
    }

    /// Remove the given tags and return the union of keys they referenced.
    /// Caller holds the store's critical section and is responsible for
    /// cleaning the returned keys' cross-references via `remove_key`.
    pub fn take_tags(&self, tags: &[String]) -> Vec<String> {
        let mut keys = Vec::new();
        for tag in tags {
            if let Some((_, set)) = self.by_tag.remove(tag) {
                for key in set {
                    if !keys.contains(&key) {
                        keys.push(key);
                    }
                }
            }
        }
        keys
    }

    pub fn clear(&self) {
        self.by_tag.clear();
        self.by_key.clear();
    }

    #[cfg(test)]
    pub fn keys_for(&self, tag: &str) -> Vec<String> {
        self.by_tag
            .get(tag)
            .map(|set| set.iter().map(|k| k.clone()).collect())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub fn tags_for(&self, key: &str) -> Vec<String> {
        self.by_key.get(key).map(|t| t.clone()).unwrap_or_default()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty() && self.by_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_record_installs_both_sides() {
        let index = TagIndex::new();
        index.record("k1", &tags(&["products", "orders"]));
        assert_eq!(index.keys_for("products"), vec!["k1"]);
        assert_eq!(index.tags_for("k1"), tags(&["products", "orders"]));
    }

    #[test]
    fn test_record_replaces_prior_rows() {
        let index = TagIndex::new();
        index.record("k1", &tags(&["products"]));
        index.record("k1", &tags(&["orders"]));
        assert!(index.keys_for("products").is_empty());
        assert_eq!(index.keys_for("orders"), vec!["k1"]);
    }

    #[test]
    fn test_remove_key_cleans_cross_references() {
        let index = TagIndex::new();
        index.record("k1", &tags(&["products", "orders"]));
        index.record("k2", &tags(&["products"]));
        index.remove_key("k1");
        assert_eq!(index.keys_for("products"), vec!["k2"]);
        assert!(index.tags_for("k1").is_empty());
    }

    #[test]
    fn test_take_tags_returns_union() {
        let index = TagIndex::new();
        index.record("k1", &tags(&["products", "orders"]));
        index.record("k2", &tags(&["orders"]));
        index.record("k3", &tags(&["customers"]));

        let mut keys = index.take_tags(&tags(&["products", "orders"]));
        keys.sort();
        assert_eq!(keys, vec!["k1", "k2"]);
        assert_eq!(index.keys_for("customers"), vec!["k3"]);
    }
}
