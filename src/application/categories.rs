//! Category read service: depth-bounded loading, count merging, and
//! cache orchestration.
//!
//! Every read degrades instead of failing: an adapter error shrinks to
//! the smallest empty scope (empty level, empty children list, absent
//! lookup) and is logged, never propagated to callers. Results computed
//! from a degraded fetch are returned but not cached, so the next
//! request gets a fresh attempt.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::application::fetcher::{FetchPlan, fetch_children_of};
use crate::application::repos::CategoryRepo;
use crate::cache::{CategoryCache, Tag};
use crate::domain::attributes::{CategoryAttribute, MAX_ANCESTOR_DEPTH, resolve_attributes};
use crate::domain::categories::{Category, CategoryWithCount, merge_counts, sibling_order};
use crate::domain::tree::{
    CategoryTreeNode, LiteCategoryNode, build_forest, build_lite_forest,
};

/// Eager loading ceiling for the full hierarchy (levels 0..=2).
pub const MAX_HIERARCHY_DEPTH: u8 = 2;
/// Eager loading ceiling for the picker tree (levels 0..=3).
pub const PICKER_DEPTH: u8 = 3;

/// Single lookup result: the category plus its resolved parent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryWithParent {
    #[serde(flatten)]
    pub category: Category,
    pub parent: Option<Category>,
}

/// Aggregate view for a category landing page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryContext {
    pub current: Category,
    pub parent: Option<Category>,
    /// Flat sibling list at the same level, the current category included.
    pub siblings: Vec<Category>,
    /// Children with counts, full taxonomy (`filter_for_browse = false`).
    pub children: Vec<CategoryWithCount>,
    pub attributes: Vec<CategoryAttribute>,
}

/// Rows accumulated across eager levels, plus the frontier at the depth
/// boundary and whether every fetch along the way succeeded.
struct Levels {
    rows: Vec<Category>,
    boundary: HashSet<Uuid>,
    complete: bool,
}

pub struct CategoryService {
    repo: Arc<dyn CategoryRepo>,
    cache: Arc<CategoryCache>,
    plan: FetchPlan,
}

impl CategoryService {
    pub fn new(repo: Arc<dyn CategoryRepo>, cache: Arc<CategoryCache>, plan: FetchPlan) -> Self {
        Self { repo, cache, plan }
    }

    /// Eager whole-tree fetch for broad navigation surfaces. `max_depth`
    /// is clamped to [`MAX_HIERARCHY_DEPTH`]; deeper levels are reached
    /// only through [`Self::children_of`].
    pub async fn hierarchy(&self, max_depth: u8) -> Vec<CategoryTreeNode> {
        let max_depth = max_depth.min(MAX_HIERARCHY_DEPTH);
        if let Some(cached) = self.cache.get_hierarchy(max_depth) {
            return cached;
        }

        let levels = self.load_levels(max_depth).await;
        let forest = build_forest(levels.rows);
        if levels.complete {
            self.cache.set_hierarchy(max_depth, forest.clone());
        }
        forest
    }

    /// Lite tree for category-selection UIs, eager to [`PICKER_DEPTH`].
    /// Boundary nodes get `has_children` from a count query, never a
    /// full fetch.
    pub async fn picker_tree(&self) -> Vec<LiteCategoryNode> {
        if let Some(cached) = self.cache.get_picker() {
            return cached;
        }

        let mut levels = self.load_levels(PICKER_DEPTH).await;
        let counts = if levels.boundary.is_empty() {
            Default::default()
        } else {
            let ids: Vec<Uuid> = levels.boundary.iter().copied().collect();
            match self.repo.count_children_of(&ids).await {
                Ok(counts) => counts,
                Err(error) => {
                    warn!(error = %error, "child count query failed, boundary nodes will look like leaves");
                    levels.complete = false;
                    Default::default()
                }
            }
        };

        let forest = build_lite_forest(levels.rows, &counts);
        if levels.complete {
            self.cache.set_picker(forest.clone());
        }
        forest
    }

    /// Single-level, on-demand expansion below the eager boundary.
    /// Returns a flat, sorted list of lite nodes; an id with zero real
    /// children yields `[]`, and that emptiness is cached so known
    /// leaves are not re-queried.
    pub async fn children_of(&self, parent_id: Uuid) -> Vec<LiteCategoryNode> {
        if let Some(cached) = self.cache.get_children(parent_id) {
            return cached;
        }

        let fan_out =
            fetch_children_of(self.repo.as_ref(), self.plan, &HashSet::from([parent_id])).await;
        let mut complete = fan_out.is_complete();
        let mut rows = fan_out.rows;
        rows.sort_by(sibling_order);

        let counts = if rows.is_empty() {
            Default::default()
        } else {
            let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
            match self.repo.count_children_of(&ids).await {
                Ok(counts) => counts,
                Err(error) => {
                    warn!(parent_id = %parent_id, error = %error, "child count query failed");
                    complete = false;
                    Default::default()
                }
            }
        };

        let nodes: Vec<LiteCategoryNode> = rows
            .iter()
            .map(|row| {
                LiteCategoryNode::flat(row, counts.get(&row.id).copied().unwrap_or(0) > 0)
            })
            .collect();

        if complete {
            self.cache.set_children(parent_id, nodes.clone());
        }
        nodes
    }

    /// Count-merged, policy-sorted sibling list at one level. `None`
    /// parent means the root level. `filter_for_browse` is always the
    /// caller's explicit choice.
    pub async fn subcategories_for_browse(
        &self,
        parent_id: Option<Uuid>,
        filter_for_browse: bool,
    ) -> Vec<CategoryWithCount> {
        if let Some(cached) = self.cache.get_browse(parent_id, filter_for_browse) {
            return cached;
        }

        let (rows, mut complete) = match parent_id {
            Some(parent) => {
                let fan_out =
                    fetch_children_of(self.repo.as_ref(), self.plan, &HashSet::from([parent]))
                        .await;
                let complete = fan_out.is_complete();
                (fan_out.rows, complete)
            }
            None => match self.repo.fetch_roots().await {
                Ok(rows) => (rows, true),
                Err(error) => {
                    warn!(error = %error, "root fetch failed, returning empty browse list");
                    (Vec::new(), false)
                }
            },
        };

        let counts = if rows.is_empty() {
            Default::default()
        } else {
            let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
            match self.repo.fetch_subtree_counts(&ids).await {
                Ok(counts) => counts,
                Err(error) => {
                    warn!(error = %error, "subtree count fetch failed, counts default to zero");
                    complete = false;
                    Default::default()
                }
            }
        };

        let merged = merge_counts(rows, &counts, filter_for_browse);
        if complete {
            self.cache
                .set_browse(parent_id, filter_for_browse, merged.clone());
        }
        merged
    }

    /// Single slug lookup with resolved parent. Absence is cached.
    pub async fn category_by_slug(&self, slug: &str) -> Option<CategoryWithParent> {
        if let Some(cached) = self.cache.get_by_slug(slug) {
            return cached;
        }

        let row = match self.repo.fetch_by_slug(slug).await {
            Ok(row) => row.filter(|category| !category.is_hidden()),
            Err(error) => {
                warn!(slug, error = %error, "slug lookup failed");
                return None;
            }
        };

        let Some(category) = row else {
            self.cache.set_by_slug(slug, None);
            return None;
        };

        let (parent, complete) = match category.parent_id {
            Some(parent_id) => match self.repo.fetch_by_id(parent_id).await {
                Ok(parent) => (parent.filter(|p| !p.is_hidden()), true),
                Err(error) => {
                    warn!(slug, parent_id = %parent_id, error = %error, "parent lookup failed");
                    (None, false)
                }
            },
            None => (None, true),
        };

        let value = CategoryWithParent { category, parent };
        if complete {
            self.cache.set_by_slug(slug, Some(value.clone()));
        }
        Some(value)
    }

    /// Aggregate view for a category landing page: current + parent +
    /// flat siblings + counted children + resolved attributes.
    pub async fn category_context(&self, slug: &str) -> Option<CategoryContext> {
        if let Some(cached) = self.cache.get_context(slug) {
            return cached;
        }

        let current = match self.repo.fetch_by_slug(slug).await {
            Ok(row) => row.filter(|category| !category.is_hidden()),
            Err(error) => {
                warn!(slug, error = %error, "slug lookup failed");
                return None;
            }
        };

        let Some(current) = current else {
            self.cache.set_context(
                slug,
                None,
                HashSet::from([Tag::Category(slug.to_string())]),
            );
            return None;
        };

        let mut complete = true;

        let parent = match current.parent_id {
            Some(parent_id) => match self.repo.fetch_by_id(parent_id).await {
                Ok(parent) => parent.filter(|p| !p.is_hidden()),
                Err(error) => {
                    warn!(slug, error = %error, "parent lookup failed");
                    complete = false;
                    None
                }
            },
            None => None,
        };

        let mut siblings = match current.parent_id {
            Some(parent_id) => {
                let fan_out = fetch_children_of(
                    self.repo.as_ref(),
                    self.plan,
                    &HashSet::from([parent_id]),
                )
                .await;
                complete &= fan_out.is_complete();
                fan_out.rows
            }
            None => match self.repo.fetch_roots().await {
                Ok(rows) => rows.into_iter().filter(|row| !row.is_hidden()).collect(),
                Err(error) => {
                    warn!(slug, error = %error, "sibling fetch failed");
                    complete = false;
                    Vec::new()
                }
            },
        };
        siblings.sort_by(sibling_order);

        let child_fan_out = fetch_children_of(
            self.repo.as_ref(),
            self.plan,
            &HashSet::from([current.id]),
        )
        .await;
        complete &= child_fan_out.is_complete();
        let child_rows = child_fan_out.rows;

        let child_counts = if child_rows.is_empty() {
            Default::default()
        } else {
            let ids: Vec<Uuid> = child_rows.iter().map(|row| row.id).collect();
            match self.repo.fetch_subtree_counts(&ids).await {
                Ok(counts) => counts,
                Err(error) => {
                    warn!(slug, error = %error, "subtree count fetch failed");
                    complete = false;
                    Default::default()
                }
            }
        };
        let children = merge_counts(child_rows, &child_counts, false);

        let ancestors = self.ancestor_chain(&current, &mut complete).await;
        let attributes = match self.repo.fetch_attributes(&ancestors, true).await {
            Ok(rows) => resolve_attributes(rows, current.id, &ancestors, true),
            Err(error) => {
                warn!(slug, error = %error, "attribute fetch failed");
                complete = false;
                Vec::new()
            }
        };

        let mut tags: HashSet<Tag> = HashSet::from([
            Tag::Category(slug.to_string()),
            Tag::Children(current.id),
            Tag::AttrsGlobal,
        ]);
        tags.extend(ancestors.iter().map(|&id| Tag::AttrsCategory(id)));

        let context = CategoryContext {
            current,
            parent,
            siblings,
            children,
            attributes,
        };
        if complete {
            self.cache.set_context(slug, Some(context.clone()), tags);
        }
        Some(context)
    }

    /// Drop every cache entry covered by `tag`; returns the number of
    /// keys that fell.
    pub fn invalidate(&self, tag: &Tag) -> usize {
        self.cache.invalidate(tag)
    }

    /// Self-first ancestor id chain, capped at [`MAX_ANCESTOR_DEPTH`].
    async fn ancestor_chain(&self, current: &Category, complete: &mut bool) -> Vec<Uuid> {
        let mut chain = vec![current.id];
        let mut next = current.parent_id;
        for _ in 0..MAX_ANCESTOR_DEPTH {
            let Some(id) = next else { break };
            // Cycles in bad data terminate the walk instead of looping.
            if chain.contains(&id) {
                break;
            }
            chain.push(id);
            next = match self.repo.fetch_by_id(id).await {
                Ok(Some(ancestor)) => ancestor.parent_id,
                Ok(None) => None,
                Err(error) => {
                    warn!(ancestor_id = %id, error = %error, "ancestor walk aborted");
                    *complete = false;
                    None
                }
            };
        }
        chain
    }

    async fn load_levels(&self, max_depth: u8) -> Levels {
        let roots = match self.repo.fetch_roots().await {
            Ok(rows) => rows
                .into_iter()
                .filter(|row| !row.is_hidden())
                .collect::<Vec<_>>(),
            Err(error) => {
                warn!(error = %error, "root fetch failed, returning empty tree");
                return Levels {
                    rows: Vec::new(),
                    boundary: HashSet::new(),
                    complete: false,
                };
            }
        };

        let mut frontier: HashSet<Uuid> = roots.iter().map(|row| row.id).collect();
        let mut rows = roots;
        let mut complete = true;

        for _ in 0..max_depth {
            if frontier.is_empty() {
                break;
            }
            let fan_out = fetch_children_of(self.repo.as_ref(), self.plan, &frontier).await;
            complete &= fan_out.is_complete();
            frontier = fan_out.rows.iter().map(|row| row.id).collect();
            rows.extend(fan_out.rows);
        }

        Levels {
            rows,
            boundary: frontier,
            complete,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::infra::memory::InMemoryCategories;

    fn row(name: &str, parent: Option<Uuid>, display_order: i32) -> Category {
        Category {
            id: Uuid::new_v4(),
            name: name.to_string(),
            name_bg: None,
            slug: name.to_lowercase().replace(' ', "-"),
            parent_id: parent,
            icon: None,
            image_url: None,
            display_order,
        }
    }

    fn service(repo: Arc<InMemoryCategories>) -> CategoryService {
        CategoryService::new(
            repo,
            Arc::new(CategoryCache::new(&CacheConfig::default())),
            FetchPlan::default(),
        )
    }

    #[tokio::test]
    async fn browse_excludes_hidden_and_keeps_populated() {
        // Fixture from the subsystem's acceptance scenario: one root,
        // one hidden child, one populated child.
        let electronics = row("Electronics", None, 1);
        let hidden = row("Hidden", Some(electronics.id), 9500);
        let phones = row("Phones", Some(electronics.id), 0);

        let repo = Arc::new(InMemoryCategories::with_rows(vec![
            electronics.clone(),
            hidden.clone(),
            phones.clone(),
        ]));
        repo.set_subtree_count(phones.id, 5);

        let service = service(repo);
        let merged = service
            .subcategories_for_browse(Some(electronics.id), true)
            .await;

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].category.id, phones.id);
        assert_eq!(merged[0].subtree_product_count, 5);
    }

    #[tokio::test]
    async fn negative_children_result_is_cached() {
        let root = row("Electronics", None, 1);
        let leaf = row("Cables", Some(root.id), 0);
        let repo = Arc::new(InMemoryCategories::with_rows(vec![root, leaf.clone()]));

        let service = service(repo.clone());
        assert!(service.children_of(leaf.id).await.is_empty());
        let fetches_after_first = repo.parent_queries();

        assert!(service.children_of(leaf.id).await.is_empty());
        assert_eq!(
            repo.parent_queries(),
            fetches_after_first,
            "second call must be served from the negative cache"
        );
    }

    #[tokio::test]
    async fn degraded_children_result_is_not_cached() {
        let root = row("Electronics", None, 1);
        let repo = Arc::new(InMemoryCategories::with_rows(vec![root.clone()]));
        repo.fail_parent(root.id);

        let service = service(repo.clone());
        assert!(service.children_of(root.id).await.is_empty());
        let after_first = repo.parent_queries();
        assert!(service.children_of(root.id).await.is_empty());
        assert!(
            repo.parent_queries() > after_first,
            "a degraded empty result must not poison the negative cache"
        );
    }

    #[tokio::test]
    async fn hierarchy_is_depth_bounded() {
        let l0 = row("Electronics", None, 1);
        let l1 = row("Phones", Some(l0.id), 0);
        let l2 = row("Smartphones", Some(l1.id), 0);
        let l3 = row("Android", Some(l2.id), 0);
        let repo = Arc::new(InMemoryCategories::with_rows(vec![
            l0.clone(),
            l1.clone(),
            l2.clone(),
            l3.clone(),
        ]));

        let service = service(repo);
        // requested depth above the ceiling is clamped to 2
        let forest = service.hierarchy(9).await;

        let level2 = &forest[0].children[0].children[0];
        assert_eq!(level2.category.id, l2.id);
        assert!(
            level2.children.is_empty(),
            "level-3 node must not appear in a depth-2 tree"
        );
    }

    #[tokio::test]
    async fn picker_boundary_nodes_show_as_expandable() {
        let l0 = row("Electronics", None, 1);
        let l1 = row("Phones", Some(l0.id), 0);
        let l2 = row("Smartphones", Some(l1.id), 0);
        let l3 = row("Android", Some(l2.id), 0);
        let l4 = row("Budget Android", Some(l3.id), 0);
        let repo = Arc::new(InMemoryCategories::with_rows(vec![
            l0.clone(),
            l1,
            l2,
            l3.clone(),
            l4,
        ]));

        let service = service(repo);
        let forest = service.picker_tree().await;

        let boundary = &forest[0].children[0].children[0].children[0];
        assert_eq!(boundary.id, l3.id);
        assert!(boundary.children.is_empty(), "level 4 is never fetched");
        assert!(
            boundary.has_children,
            "count query marks the boundary node expandable"
        );
    }

    #[tokio::test]
    async fn hierarchy_is_cached_between_calls() {
        let root = row("Electronics", None, 1);
        let repo = Arc::new(InMemoryCategories::with_rows(vec![root]));

        let service = service(repo.clone());
        let first = service.hierarchy(2).await;
        let second = service.hierarchy(2).await;

        assert_eq!(first, second);
        assert_eq!(repo.root_queries(), 1);
    }

    #[tokio::test]
    async fn invalidating_the_tree_tag_forces_a_reload() {
        let root = row("Electronics", None, 1);
        let repo = Arc::new(InMemoryCategories::with_rows(vec![root]));

        let service = service(repo.clone());
        service.hierarchy(2).await;
        assert_eq!(service.invalidate(&Tag::Tree), 1);
        service.hierarchy(2).await;
        assert_eq!(repo.root_queries(), 2);
    }

    #[tokio::test]
    async fn slug_lookup_resolves_parent_and_caches_absence() {
        let root = row("Electronics", None, 1);
        let child = row("Phones", Some(root.id), 0);
        let repo = Arc::new(InMemoryCategories::with_rows(vec![root.clone(), child]));

        let service = service(repo);
        let found = service.category_by_slug("phones").await.unwrap();
        assert_eq!(found.parent.as_ref().map(|p| p.id), Some(root.id));

        assert!(service.category_by_slug("no-such-slug").await.is_none());
        // second miss comes from the negative cache
        assert!(service.category_by_slug("no-such-slug").await.is_none());
    }

    #[tokio::test]
    async fn hidden_category_is_absent_from_every_surface() {
        let root = row("Electronics", None, 1);
        let hidden = row("Legacy", Some(root.id), 9200);
        let repo = Arc::new(InMemoryCategories::with_rows(vec![
            root.clone(),
            hidden.clone(),
        ]));

        let service = service(repo);
        assert!(service.category_by_slug("legacy").await.is_none());
        assert!(service.children_of(root.id).await.is_empty());
        assert!(
            service
                .subcategories_for_browse(Some(root.id), false)
                .await
                .is_empty()
        );
        let forest = service.hierarchy(2).await;
        assert!(forest[0].children.is_empty());
    }

    #[tokio::test]
    async fn context_carries_siblings_children_and_counts() {
        let root = row("Electronics", None, 1);
        let phones = row("Phones", Some(root.id), 0);
        let audio = row("Audio", Some(root.id), 0);
        let smart = row("Smartphones", Some(phones.id), 0);
        let repo = Arc::new(InMemoryCategories::with_rows(vec![
            root.clone(),
            phones.clone(),
            audio.clone(),
            smart.clone(),
        ]));
        repo.set_subtree_count(smart.id, 12);

        let service = service(repo);
        let context = service.category_context("phones").await.unwrap();

        assert_eq!(context.current.id, phones.id);
        assert_eq!(context.parent.as_ref().map(|p| p.id), Some(root.id));

        let sibling_ids: Vec<Uuid> = context.siblings.iter().map(|s| s.id).collect();
        assert!(sibling_ids.contains(&phones.id));
        assert!(sibling_ids.contains(&audio.id));

        assert_eq!(context.children.len(), 1);
        assert_eq!(context.children[0].category.id, smart.id);
        assert_eq!(context.children[0].subtree_product_count, 12);
    }

    #[tokio::test]
    async fn context_children_show_full_taxonomy_even_when_empty() {
        let root = row("Electronics", None, 1);
        let empty_child = row("Empty Corner", Some(root.id), 0);
        let repo = Arc::new(InMemoryCategories::with_rows(vec![
            root.clone(),
            empty_child.clone(),
        ]));

        let service = service(repo);
        let context = service.category_context("electronics").await.unwrap();
        // filter_for_browse = false: zero-count children stay visible
        assert_eq!(context.children.len(), 1);
        assert_eq!(context.children[0].subtree_product_count, 0);
    }
}
