//! Typed storage for cached category projections.
//!
//! One family per query shape, all carrying the single `categories` TTL
//! class: an entry older than the configured TTL counts as a miss and is
//! evicted on access. Entries are immutable once written and replaced
//! wholesale, never patched in place.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Instant;

use lru::LruCache;
use uuid::Uuid;

use crate::application::categories::{CategoryContext, CategoryWithParent};
use crate::domain::categories::CategoryWithCount;
use crate::domain::tree::{CategoryTreeNode, LiteCategoryNode};

use super::config::CacheConfig;
use super::keys::CacheKey;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

#[derive(Clone)]
struct Entry<T> {
    value: T,
    stored_at: Instant,
}

impl<T: Clone> Entry<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            stored_at: Instant::now(),
        }
    }

    fn fresh(&self, config: &CacheConfig) -> Option<T> {
        (self.stored_at.elapsed() < config.ttl()).then(|| self.value.clone())
    }
}

/// In-process store for every cached category read.
pub struct CategoryStore {
    config: CacheConfig,

    // Whole-tree projections: at most a handful of entries, no eviction.
    hierarchies: RwLock<HashMap<u8, Entry<Vec<CategoryTreeNode>>>>,
    picker: RwLock<Option<Entry<Vec<LiteCategoryNode>>>>,

    // KV families with LRU eviction. Slug and children families also hold
    // negative results (absent category, leaf with no children).
    by_slug: RwLock<LruCache<String, Entry<Option<CategoryWithParent>>>>,
    contexts: RwLock<LruCache<String, Entry<Option<CategoryContext>>>>,
    children: RwLock<LruCache<Uuid, Entry<Vec<LiteCategoryNode>>>>,
    browse: RwLock<LruCache<(Option<Uuid>, bool), Entry<Vec<CategoryWithCount>>>>,
}

impl CategoryStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            config: config.clone(),
            hierarchies: RwLock::new(HashMap::new()),
            picker: RwLock::new(None),
            by_slug: RwLock::new(LruCache::new(config.slug_limit_non_zero())),
            contexts: RwLock::new(LruCache::new(config.context_limit_non_zero())),
            children: RwLock::new(LruCache::new(config.children_limit_non_zero())),
            browse: RwLock::new(LruCache::new(config.browse_limit_non_zero())),
        }
    }

    // ========================================================================
    // Whole-tree projections
    // ========================================================================

    pub fn get_hierarchy(&self, max_depth: u8) -> Option<Vec<CategoryTreeNode>> {
        let mut map = rw_write(&self.hierarchies, SOURCE, "get_hierarchy");
        match map.get(&max_depth).and_then(|e| e.fresh(&self.config)) {
            Some(value) => Some(value),
            None => {
                map.remove(&max_depth);
                None
            }
        }
    }

    pub fn set_hierarchy(&self, max_depth: u8, value: Vec<CategoryTreeNode>) {
        rw_write(&self.hierarchies, SOURCE, "set_hierarchy").insert(max_depth, Entry::new(value));
    }

    pub fn get_picker(&self) -> Option<Vec<LiteCategoryNode>> {
        let mut slot = rw_write(&self.picker, SOURCE, "get_picker");
        match slot.as_ref().and_then(|e| e.fresh(&self.config)) {
            Some(value) => Some(value),
            None => {
                *slot = None;
                None
            }
        }
    }

    pub fn set_picker(&self, value: Vec<LiteCategoryNode>) {
        *rw_write(&self.picker, SOURCE, "set_picker") = Some(Entry::new(value));
    }

    // ========================================================================
    // KV families
    // ========================================================================

    pub fn get_by_slug(&self, slug: &str) -> Option<Option<CategoryWithParent>> {
        let mut cache = rw_write(&self.by_slug, SOURCE, "get_by_slug");
        match cache.get(slug).and_then(|e| e.fresh(&self.config)) {
            Some(value) => Some(value),
            None => {
                cache.pop(slug);
                None
            }
        }
    }

    pub fn set_by_slug(
        &self,
        slug: String,
        value: Option<CategoryWithParent>,
    ) -> Option<CacheKey> {
        rw_write(&self.by_slug, SOURCE, "set_by_slug")
            .push(slug.clone(), Entry::new(value))
            .filter(|(evicted, _)| *evicted != slug)
            .map(|(evicted, _)| CacheKey::BySlug(evicted))
    }

    pub fn get_context(&self, slug: &str) -> Option<Option<CategoryContext>> {
        let mut cache = rw_write(&self.contexts, SOURCE, "get_context");
        match cache.get(slug).and_then(|e| e.fresh(&self.config)) {
            Some(value) => Some(value),
            None => {
                cache.pop(slug);
                None
            }
        }
    }

    pub fn set_context(&self, slug: String, value: Option<CategoryContext>) -> Option<CacheKey> {
        rw_write(&self.contexts, SOURCE, "set_context")
            .push(slug.clone(), Entry::new(value))
            .filter(|(evicted, _)| *evicted != slug)
            .map(|(evicted, _)| CacheKey::Context(evicted))
    }

    pub fn get_children(&self, parent_id: Uuid) -> Option<Vec<LiteCategoryNode>> {
        let mut cache = rw_write(&self.children, SOURCE, "get_children");
        match cache.get(&parent_id).and_then(|e| e.fresh(&self.config)) {
            Some(value) => Some(value),
            None => {
                cache.pop(&parent_id);
                None
            }
        }
    }

    pub fn set_children(
        &self,
        parent_id: Uuid,
        value: Vec<LiteCategoryNode>,
    ) -> Option<CacheKey> {
        rw_write(&self.children, SOURCE, "set_children")
            .push(parent_id, Entry::new(value))
            .filter(|(evicted, _)| *evicted != parent_id)
            .map(|(evicted, _)| CacheKey::Children(evicted))
    }

    pub fn get_browse(
        &self,
        parent_id: Option<Uuid>,
        filter_for_browse: bool,
    ) -> Option<Vec<CategoryWithCount>> {
        let mut cache = rw_write(&self.browse, SOURCE, "get_browse");
        let key = (parent_id, filter_for_browse);
        match cache.get(&key).and_then(|e| e.fresh(&self.config)) {
            Some(value) => Some(value),
            None => {
                cache.pop(&key);
                None
            }
        }
    }

    pub fn set_browse(
        &self,
        parent_id: Option<Uuid>,
        filter_for_browse: bool,
        value: Vec<CategoryWithCount>,
    ) -> Option<CacheKey> {
        let key = (parent_id, filter_for_browse);
        rw_write(&self.browse, SOURCE, "set_browse")
            .push(key, Entry::new(value))
            .filter(|(evicted, _)| *evicted != key)
            .map(|((evicted_parent, evicted_filter), _)| CacheKey::Browse {
                parent_id: evicted_parent,
                filter_for_browse: evicted_filter,
            })
    }

    // ========================================================================
    // Invalidation
    // ========================================================================

    /// Drop one entry by key, whichever family it lives in.
    pub fn remove(&self, key: &CacheKey) {
        match key {
            CacheKey::Hierarchy { max_depth } => {
                rw_write(&self.hierarchies, SOURCE, "remove.hierarchy").remove(max_depth);
            }
            CacheKey::Picker => {
                *rw_write(&self.picker, SOURCE, "remove.picker") = None;
            }
            CacheKey::BySlug(slug) => {
                rw_write(&self.by_slug, SOURCE, "remove.by_slug").pop(slug);
            }
            CacheKey::Context(slug) => {
                rw_write(&self.contexts, SOURCE, "remove.context").pop(slug);
            }
            CacheKey::Children(parent_id) => {
                rw_write(&self.children, SOURCE, "remove.children").pop(parent_id);
            }
            CacheKey::Browse {
                parent_id,
                filter_for_browse,
            } => {
                rw_write(&self.browse, SOURCE, "remove.browse")
                    .pop(&(*parent_id, *filter_for_browse));
            }
        }
    }

    pub fn len(&self) -> usize {
        rw_read(&self.hierarchies, SOURCE, "len.hierarchies").len()
            + usize::from(rw_read(&self.picker, SOURCE, "len.picker").is_some())
            + rw_read(&self.by_slug, SOURCE, "len.by_slug").len()
            + rw_read(&self.contexts, SOURCE, "len.contexts").len()
            + rw_read(&self.children, SOURCE, "len.children").len()
            + rw_read(&self.browse, SOURCE, "len.browse").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_ttl(ttl_seconds: u64) -> CategoryStore {
        CategoryStore::new(&CacheConfig {
            ttl_seconds,
            ..CacheConfig::default()
        })
    }

    #[test]
    fn children_family_holds_negative_results() {
        let store = store_with_ttl(300);
        let leaf = Uuid::new_v4();

        assert!(store.get_children(leaf).is_none(), "cold cache is a miss");
        store.set_children(leaf, Vec::new());
        assert_eq!(
            store.get_children(leaf),
            Some(Vec::new()),
            "cached emptiness is a hit"
        );
    }

    #[test]
    fn expired_entries_count_as_misses() {
        let store = store_with_ttl(0);
        store.set_picker(Vec::new());
        assert!(store.get_picker().is_none());
        assert!(store.is_empty(), "expired entry was evicted on access");
    }

    #[test]
    fn remove_dispatches_by_family() {
        let store = store_with_ttl(300);
        let parent = Uuid::new_v4();

        store.set_hierarchy(2, Vec::new());
        store.set_children(parent, Vec::new());
        store.set_by_slug("phones".to_string(), None);
        store.set_browse(Some(parent), true, Vec::new());

        store.remove(&CacheKey::Hierarchy { max_depth: 2 });
        store.remove(&CacheKey::Children(parent));
        store.remove(&CacheKey::BySlug("phones".to_string()));
        store.remove(&CacheKey::Browse {
            parent_id: Some(parent),
            filter_for_browse: true,
        });

        assert!(store.is_empty());
    }

    #[test]
    fn negative_slug_lookup_is_cached() {
        let store = store_with_ttl(300);
        store.set_by_slug("gone".to_string(), None);
        assert_eq!(store.get_by_slug("gone"), Some(None));
    }
}
