//! Tag-scoped cache for category reads.
//!
//! Every exported read is cached under a typed key with the single
//! `categories` TTL class and a set of invalidation tags assigned per
//! exact query shape. Mutations elsewhere in the system invalidate by
//! tag, dropping exactly the overlapping entries:
//!
//! - `categories:tree` — whole-tree reads
//! - `category:<slug>` — single-category lookups
//! - `category-children:<parent_id>` — lazy child expansions
//! - `attrs:category:<id>` / `attrs:global` — attribute-bearing context
//!   reads

mod config;
mod keys;
mod lock;
mod registry;
mod store;

use std::collections::HashSet;

use metrics::counter;
use tracing::debug;
use uuid::Uuid;

use crate::application::categories::{CategoryContext, CategoryWithParent};
use crate::domain::categories::CategoryWithCount;
use crate::domain::tree::{CategoryTreeNode, LiteCategoryNode};

pub use config::CacheConfig;
pub use keys::{CacheKey, Tag};
pub use registry::TagRegistry;
pub use store::CategoryStore;

fn observe(family: &'static str, hit: bool) {
    if hit {
        counter!("rubrika_cache_hit_total", "family" => family).increment(1);
    } else {
        counter!("rubrika_cache_miss_total", "family" => family).increment(1);
    }
}

/// Store plus tag registry behind one facade; the only shared mutable
/// state in the service.
pub struct CategoryCache {
    enabled: bool,
    store: CategoryStore,
    registry: TagRegistry,
}

impl CategoryCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            enabled: config.enabled,
            store: CategoryStore::new(config),
            registry: TagRegistry::new(),
        }
    }

    // A store miss means the entry is gone (cold, expired, or evicted),
    // so any tag mappings left for its key are stale; unregistering an
    // unknown key is a no-op.
    fn miss(&self, key: CacheKey) {
        self.registry.unregister(&key);
    }

    // LRU families evict their oldest entry under capacity pressure; the
    // victim's tag mappings come out with it so `invalidate` never counts
    // keys the store no longer holds.
    fn evicted(&self, key: Option<CacheKey>) {
        if let Some(key) = key {
            self.registry.unregister(&key);
        }
    }

    pub fn get_hierarchy(&self, max_depth: u8) -> Option<Vec<CategoryTreeNode>> {
        if !self.enabled {
            return None;
        }
        let value = self.store.get_hierarchy(max_depth);
        if value.is_none() {
            self.miss(CacheKey::Hierarchy { max_depth });
        }
        observe("hierarchy", value.is_some());
        value
    }

    pub fn set_hierarchy(&self, max_depth: u8, value: Vec<CategoryTreeNode>) {
        if !self.enabled {
            return;
        }
        self.store.set_hierarchy(max_depth, value);
        self.registry
            .register(CacheKey::Hierarchy { max_depth }, HashSet::from([Tag::Tree]));
    }

    pub fn get_picker(&self) -> Option<Vec<LiteCategoryNode>> {
        if !self.enabled {
            return None;
        }
        let value = self.store.get_picker();
        if value.is_none() {
            self.miss(CacheKey::Picker);
        }
        observe("picker", value.is_some());
        value
    }

    pub fn set_picker(&self, value: Vec<LiteCategoryNode>) {
        if !self.enabled {
            return;
        }
        self.store.set_picker(value);
        self.registry
            .register(CacheKey::Picker, HashSet::from([Tag::Tree]));
    }

    pub fn get_children(&self, parent_id: Uuid) -> Option<Vec<LiteCategoryNode>> {
        if !self.enabled {
            return None;
        }
        let value = self.store.get_children(parent_id);
        if value.is_none() {
            self.miss(CacheKey::Children(parent_id));
        }
        observe("children", value.is_some());
        value
    }

    pub fn set_children(&self, parent_id: Uuid, value: Vec<LiteCategoryNode>) {
        if !self.enabled {
            return;
        }
        self.evicted(self.store.set_children(parent_id, value));
        self.registry.register(
            CacheKey::Children(parent_id),
            HashSet::from([Tag::Children(parent_id)]),
        );
    }

    pub fn get_by_slug(&self, slug: &str) -> Option<Option<CategoryWithParent>> {
        if !self.enabled {
            return None;
        }
        let value = self.store.get_by_slug(slug);
        if value.is_none() {
            self.miss(CacheKey::BySlug(slug.to_string()));
        }
        observe("slug", value.is_some());
        value
    }

    pub fn set_by_slug(&self, slug: &str, value: Option<CategoryWithParent>) {
        if !self.enabled {
            return;
        }
        self.evicted(self.store.set_by_slug(slug.to_string(), value));
        self.registry.register(
            CacheKey::BySlug(slug.to_string()),
            HashSet::from([Tag::Category(slug.to_string())]),
        );
    }

    pub fn get_context(&self, slug: &str) -> Option<Option<CategoryContext>> {
        if !self.enabled {
            return None;
        }
        let value = self.store.get_context(slug);
        if value.is_none() {
            self.miss(CacheKey::Context(slug.to_string()));
        }
        observe("context", value.is_some());
        value
    }

    pub fn set_context(&self, slug: &str, value: Option<CategoryContext>, tags: HashSet<Tag>) {
        if !self.enabled {
            return;
        }
        self.evicted(self.store.set_context(slug.to_string(), value));
        self.registry
            .register(CacheKey::Context(slug.to_string()), tags);
    }

    pub fn get_browse(
        &self,
        parent_id: Option<Uuid>,
        filter_for_browse: bool,
    ) -> Option<Vec<CategoryWithCount>> {
        if !self.enabled {
            return None;
        }
        let value = self.store.get_browse(parent_id, filter_for_browse);
        if value.is_none() {
            self.miss(CacheKey::Browse {
                parent_id,
                filter_for_browse,
            });
        }
        observe("browse", value.is_some());
        value
    }

    pub fn set_browse(
        &self,
        parent_id: Option<Uuid>,
        filter_for_browse: bool,
        value: Vec<CategoryWithCount>,
    ) {
        if !self.enabled {
            return;
        }
        self.evicted(self.store.set_browse(parent_id, filter_for_browse, value));
        let tag = match parent_id {
            Some(parent) => Tag::Children(parent),
            None => Tag::Tree,
        };
        self.registry.register(
            CacheKey::Browse {
                parent_id,
                filter_for_browse,
            },
            HashSet::from([tag]),
        );
    }

    /// Drop every entry covered by `tag`. Returns how many keys fell.
    pub fn invalidate(&self, tag: &Tag) -> usize {
        let keys = self.registry.take_tag(tag);
        for key in &keys {
            self.store.remove(key);
            self.registry.unregister(key);
        }
        let dropped = keys.len();
        if dropped > 0 {
            debug!(tag = %tag, dropped, "cache tag invalidated");
        }
        counter!("rubrika_cache_invalidated_keys_total").increment(dropped as u64);
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_invalidation_drops_only_overlapping_keys() {
        let cache = CategoryCache::new(&CacheConfig::default());
        let parent = Uuid::new_v4();
        let other = Uuid::new_v4();

        cache.set_hierarchy(2, Vec::new());
        cache.set_picker(Vec::new());
        cache.set_children(parent, Vec::new());
        cache.set_children(other, Vec::new());
        cache.set_by_slug("phones", None);

        // Renaming one category: its slug tag plus the whole-tree tag.
        assert_eq!(cache.invalidate(&Tag::Category("phones".to_string())), 1);
        assert_eq!(cache.invalidate(&Tag::Tree), 2);

        assert!(cache.get_children(parent).is_some());
        assert!(cache.get_children(other).is_some());
        assert!(cache.get_hierarchy(2).is_none());
        assert!(cache.get_picker().is_none());
        assert!(cache.get_by_slug("phones").is_none());
    }

    #[test]
    fn disabled_cache_never_hits() {
        let cache = CategoryCache::new(&CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        });
        cache.set_picker(Vec::new());
        assert!(cache.get_picker().is_none());
    }

    #[test]
    fn lru_eviction_unregisters_the_victim() {
        let cache = CategoryCache::new(&CacheConfig {
            children_limit: 1,
            ..CacheConfig::default()
        });
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        cache.set_children(first, Vec::new());
        cache.set_children(second, Vec::new());

        // Capacity 1: writing `second` evicted `first` from the store, so
        // its tag must not claim a key that is no longer held.
        assert!(cache.get_children(first).is_none());
        assert_eq!(cache.invalidate(&Tag::Children(first)), 0);
        assert_eq!(cache.invalidate(&Tag::Children(second)), 1);
        assert_eq!(cache.registry.key_count(), 0);
    }

    #[test]
    fn expired_entries_are_unregistered_on_access() {
        let cache = CategoryCache::new(&CacheConfig {
            ttl_seconds: 0,
            ..CacheConfig::default()
        });
        cache.set_picker(Vec::new());
        cache.set_by_slug("phones", None);

        assert!(cache.get_picker().is_none());
        assert!(cache.get_by_slug("phones").is_none());
        assert_eq!(cache.invalidate(&Tag::Tree), 0);
        assert_eq!(cache.invalidate(&Tag::Category("phones".to_string())), 0);
    }

    #[test]
    fn browse_tags_follow_the_parent_scope() {
        let cache = CategoryCache::new(&CacheConfig::default());
        let parent = Uuid::new_v4();

        cache.set_browse(Some(parent), true, Vec::new());
        cache.set_browse(None, false, Vec::new());

        assert_eq!(cache.invalidate(&Tag::Children(parent)), 1);
        assert!(cache.get_browse(Some(parent), true).is_none());
        assert!(cache.get_browse(None, false).is_some());

        assert_eq!(cache.invalidate(&Tag::Tree), 1);
        assert!(cache.get_browse(None, false).is_none());
    }
}
