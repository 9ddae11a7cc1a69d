//! Bidirectional tag registry.
//!
//! Tracks which cache keys each invalidation tag covers and, inversely,
//! which tags each key carries, so a narrow mutation drops exactly the
//! overlapping cached computations and nothing else.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use super::keys::{CacheKey, Tag};
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::registry";

pub struct TagRegistry {
    tag_to_keys: RwLock<HashMap<Tag, HashSet<CacheKey>>>,
    key_to_tags: RwLock<HashMap<CacheKey, HashSet<Tag>>>,
}

impl TagRegistry {
    pub fn new() -> Self {
        Self {
            tag_to_keys: RwLock::new(HashMap::new()),
            key_to_tags: RwLock::new(HashMap::new()),
        }
    }

    /// Register a freshly written cache entry under its tags, replacing
    /// any previous tag set for the same key.
    pub fn register(&self, key: CacheKey, tags: HashSet<Tag>) {
        self.unregister(&key);

        let mut t2k = rw_write(&self.tag_to_keys, SOURCE, "register.tag_to_keys");
        let mut k2t = rw_write(&self.key_to_tags, SOURCE, "register.key_to_tags");

        for tag in &tags {
            t2k.entry(tag.clone()).or_default().insert(key.clone());
        }
        k2t.insert(key, tags);
    }

    /// All keys currently covered by a tag.
    pub fn keys_for_tag(&self, tag: &Tag) -> HashSet<CacheKey> {
        rw_read(&self.tag_to_keys, SOURCE, "keys_for_tag")
            .get(tag)
            .cloned()
            .unwrap_or_default()
    }

    /// Drop one key and clean up its tag mappings. Called when an entry
    /// is evicted or invalidated.
    pub fn unregister(&self, key: &CacheKey) {
        let mut t2k = rw_write(&self.tag_to_keys, SOURCE, "unregister.tag_to_keys");
        let mut k2t = rw_write(&self.key_to_tags, SOURCE, "unregister.key_to_tags");

        if let Some(tags) = k2t.remove(key) {
            for tag in tags {
                if let Some(keys) = t2k.get_mut(&tag) {
                    keys.remove(key);
                    if keys.is_empty() {
                        t2k.remove(&tag);
                    }
                }
            }
        }
    }

    /// Remove a tag entirely, returning the keys it covered.
    pub fn take_tag(&self, tag: &Tag) -> HashSet<CacheKey> {
        let keys = {
            let mut t2k = rw_write(&self.tag_to_keys, SOURCE, "take_tag.tag_to_keys");
            t2k.remove(tag).unwrap_or_default()
        };
        {
            let mut k2t = rw_write(&self.key_to_tags, SOURCE, "take_tag.key_to_tags");
            for key in &keys {
                if let Some(tags) = k2t.get_mut(key) {
                    tags.remove(tag);
                }
            }
        }
        keys
    }

    pub fn key_count(&self) -> usize {
        rw_read(&self.key_to_tags, SOURCE, "key_count").len()
    }
}

impl Default for TagRegistry {
    fn default() -> Self {
        Self::new()
    }
}
