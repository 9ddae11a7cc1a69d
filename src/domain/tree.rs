//! Assembles flat category rows into nested trees.
//!
//! Nodes live in a flat arena and children are linked by index; nested
//! structures are only materialised at the boundary, so reference cycles
//! cannot form no matter what the rows claim. A row whose `parent_id`
//! points outside the fetched set is dropped, never promoted to root —
//! an incomplete subtree beats a wrong one.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use super::categories::{Category, sibling_order};

/// Full display node: the whole category plus eagerly loaded children.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTreeNode {
    #[serde(flatten)]
    pub category: Category,
    pub children: Vec<CategoryTreeNode>,
}

/// Minimal picker node. `has_children` distinguishes a true leaf from a
/// branch whose children were simply not loaded at this depth.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiteCategoryNode {
    pub id: Uuid,
    pub name: String,
    pub name_bg: Option<String>,
    pub slug: String,
    pub parent_id: Option<Uuid>,
    pub display_order: i32,
    pub has_children: bool,
    pub children: Vec<LiteCategoryNode>,
}

impl LiteCategoryNode {
    /// A flat (children never attached) lite node, as returned by the
    /// lazy single-level expansion path.
    pub fn flat(category: &Category, has_children: bool) -> Self {
        Self {
            id: category.id,
            name: category.name.clone(),
            name_bg: category.name_bg.clone(),
            slug: category.slug.clone(),
            parent_id: category.parent_id,
            display_order: category.display_order,
            has_children,
            children: Vec::new(),
        }
    }
}

struct Arena {
    nodes: Vec<Category>,
    children: Vec<Vec<usize>>,
    roots: Vec<usize>,
}

fn link(rows: Vec<Category>) -> Arena {
    let visible: Vec<Category> = rows.into_iter().filter(|row| !row.is_hidden()).collect();

    let mut index: HashMap<Uuid, usize> = HashMap::with_capacity(visible.len());
    for (i, row) in visible.iter().enumerate() {
        index.insert(row.id, i);
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); visible.len()];
    let mut roots = Vec::new();

    for (i, row) in visible.iter().enumerate() {
        match row.parent_id {
            None => roots.push(i),
            Some(parent_id) => match index.get(&parent_id) {
                Some(&parent_index) if parent_index != i => children[parent_index].push(i),
                Some(_) => debug!(id = %row.id, "category is its own parent, dropped"),
                None => debug!(id = %row.id, parent_id = %parent_id, "orphan category dropped"),
            },
        }
    }

    let arena = Arena {
        nodes: visible,
        children,
        roots,
    };
    sort_arena(arena)
}

fn sort_arena(mut arena: Arena) -> Arena {
    let nodes = &arena.nodes;
    arena
        .roots
        .sort_by(|&a, &b| sibling_order(&nodes[a], &nodes[b]));
    for list in &mut arena.children {
        list.sort_by(|&a, &b| sibling_order(&nodes[a], &nodes[b]));
    }
    arena
}

/// Build an ordered forest of full nodes from one batch of rows.
///
/// Rows must already be depth-bounded by the caller; anything present in
/// `rows` is eligible for linking, anything absent simply does not exist
/// at this depth.
pub fn build_forest(rows: Vec<Category>) -> Vec<CategoryTreeNode> {
    let arena = link(rows);
    arena
        .roots
        .iter()
        .map(|&root| materialize(root, &arena))
        .collect()
}

fn materialize(index: usize, arena: &Arena) -> CategoryTreeNode {
    CategoryTreeNode {
        category: arena.nodes[index].clone(),
        children: arena.children[index]
            .iter()
            .map(|&child| materialize(child, arena))
            .collect(),
    }
}

/// Build an ordered forest of lite nodes.
///
/// `child_counts` reports how many visible children each category has in
/// the store, regardless of whether they were fetched; a node at the
/// depth boundary therefore still shows as expandable.
pub fn build_lite_forest(
    rows: Vec<Category>,
    child_counts: &HashMap<Uuid, i64>,
) -> Vec<LiteCategoryNode> {
    let arena = link(rows);
    arena
        .roots
        .iter()
        .map(|&root| materialize_lite(root, &arena, child_counts))
        .collect()
}

fn materialize_lite(
    index: usize,
    arena: &Arena,
    child_counts: &HashMap<Uuid, i64>,
) -> LiteCategoryNode {
    let category = &arena.nodes[index];
    let linked = &arena.children[index];
    let counted = child_counts.get(&category.id).copied().unwrap_or(0) > 0;

    let mut node = LiteCategoryNode::flat(category, !linked.is_empty() || counted);
    node.children = linked
        .iter()
        .map(|&child| materialize_lite(child, arena, child_counts))
        .collect();
    node
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn links_children_under_present_parents() {
        let root = row("Electronics", None, 1);
        let child = row("Phones", Some(root.id), 0);
        let grandchild = row("Smartphones", Some(child.id), 0);

        let forest = build_forest(vec![grandchild.clone(), root.clone(), child.clone()]);
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].category.id, root.id);
        assert_eq!(forest[0].children.len(), 1);
        assert_eq!(forest[0].children[0].category.id, child.id);
        assert_eq!(forest[0].children[0].children[0].category.id, grandchild.id);
    }

    #[test]
    fn orphans_are_dropped_not_promoted() {
        let root = row("Electronics", None, 1);
        let orphan = row("Lost", Some(Uuid::new_v4()), 0);

        let forest = build_forest(vec![root.clone(), orphan.clone()]);
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].category.id, root.id);

        fn contains(nodes: &[CategoryTreeNode], id: Uuid) -> bool {
            nodes
                .iter()
                .any(|n| n.category.id == id || contains(&n.children, id))
        }
        assert!(!contains(&forest, orphan.id));
    }

    #[test]
    fn hidden_rows_never_appear_at_any_depth() {
        let root = row("Electronics", None, 1);
        let hidden_root = row("Legacy", None, 9000);
        let hidden_child = row("Deprecated Phones", Some(root.id), 9500);
        let child = row("Phones", Some(root.id), 0);
        // child of a hidden parent is orphaned once the parent is gone
        let under_hidden = row("Under Hidden", Some(hidden_root.id), 0);

        let forest = build_forest(vec![root, hidden_root, hidden_child, child, under_hidden]);
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].children.len(), 1);
        assert_eq!(forest[0].children[0].category.name, "Phones");
    }

    #[test]
    fn sibling_lists_are_sorted_curated_first() {
        let root = row("Electronics", None, 1);
        let mut rows = vec![
            row("Zeta", Some(root.id), 0),
            row("Curated Two", Some(root.id), 2),
            row("Alpha", Some(root.id), 0),
            row("Curated One", Some(root.id), 1),
        ];
        rows.push(root);

        let forest = build_forest(rows);
        let names: Vec<&str> = forest[0]
            .children
            .iter()
            .map(|n| n.category.name.as_str())
            .collect();
        assert_eq!(names, vec!["Curated One", "Curated Two", "Alpha", "Zeta"]);
    }

    #[test]
    fn self_parent_row_is_dropped() {
        let mut twisted = row("Twisted", None, 0);
        twisted.parent_id = Some(twisted.id);
        let forest = build_forest(vec![twisted]);
        assert!(forest.is_empty());
    }

    #[test]
    fn lite_has_children_from_links_and_counts() {
        let root = row("Electronics", None, 1);
        let linked_parent = row("Phones", Some(root.id), 0);
        let leaf = row("Cables", Some(root.id), 0);
        let boundary = row("Audio", Some(root.id), 0);
        let linked_child = row("Smartphones", Some(linked_parent.id), 0);

        let mut counts = HashMap::new();
        // boundary node has unfetched children according to the count map
        counts.insert(boundary.id, 4_i64);

        let forest = build_lite_forest(
            vec![root, linked_parent, leaf, boundary, linked_child],
            &counts,
        );
        let by_name: HashMap<&str, &LiteCategoryNode> = forest[0]
            .children
            .iter()
            .map(|n| (n.name.as_str(), n))
            .collect();

        assert!(by_name["Phones"].has_children, "linked children");
        assert!(by_name["Audio"].has_children, "counted but unfetched");
        assert!(!by_name["Cables"].has_children, "true leaf");
        assert!(by_name["Audio"].children.is_empty());
    }
}
