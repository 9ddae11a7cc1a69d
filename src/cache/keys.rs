//! Cache key and invalidation tag definitions.
//!
//! Every cached read is addressed by a typed [`CacheKey`] and annotated
//! with the [`Tag`]s whose blast radius overlaps it. External
//! collaborators invalidate by tag name, so tags have a stable wire
//! grammar: `categories:tree`, `category:<slug>`,
//! `category-children:<parent_id>`, `attrs:category:<id>`, `attrs:global`.

use std::fmt;

use uuid::Uuid;

/// Invalidation tag, the unit external mutations talk in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Any whole-tree projection (hierarchy, picker).
    Tree,
    /// A single category addressed by slug.
    Category(String),
    /// A lazily expanded children list, or a browse list scoped to the
    /// same parent.
    Children(Uuid),
    /// Attribute metadata owned by one category.
    AttrsCategory(Uuid),
    /// Globally scoped attribute metadata.
    AttrsGlobal,
}

impl Tag {
    /// Parse a wire-format tag name. Returns `None` for anything outside
    /// the grammar so the invalidation endpoint can report it back.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw == "categories:tree" {
            return Some(Self::Tree);
        }
        if raw == "attrs:global" {
            return Some(Self::AttrsGlobal);
        }
        if let Some(id) = raw.strip_prefix("attrs:category:") {
            return Uuid::parse_str(id).ok().map(Self::AttrsCategory);
        }
        if let Some(id) = raw.strip_prefix("category-children:") {
            return Uuid::parse_str(id).ok().map(Self::Children);
        }
        if let Some(slug) = raw.strip_prefix("category:") {
            if slug.is_empty() {
                return None;
            }
            return Some(Self::Category(slug.to_string()));
        }
        None
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tree => write!(f, "categories:tree"),
            Self::Category(slug) => write!(f, "category:{slug}"),
            Self::Children(id) => write!(f, "category-children:{id}"),
            Self::AttrsCategory(id) => write!(f, "attrs:category:{id}"),
            Self::AttrsGlobal => write!(f, "attrs:global"),
        }
    }
}

/// Identifies one cached computation, one per exact query shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Full-node tree eager-loaded to `max_depth`.
    Hierarchy { max_depth: u8 },
    /// Lite-node picker tree.
    Picker,
    /// Single-level lazy expansion under one parent.
    Children(Uuid),
    /// Slug lookup, including the negative result.
    BySlug(String),
    /// Category landing-page aggregate.
    Context(String),
    /// Count-merged sibling list; `None` parent means the root level.
    Browse {
        parent_id: Option<Uuid>,
        filter_for_browse: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_wire_format_round_trips() {
        let id = Uuid::new_v4();
        let tags = vec![
            Tag::Tree,
            Tag::Category("mobile-phones".to_string()),
            Tag::Children(id),
            Tag::AttrsCategory(id),
            Tag::AttrsGlobal,
        ];
        for tag in tags {
            let rendered = tag.to_string();
            assert_eq!(Tag::parse(&rendered), Some(tag), "{rendered}");
        }
    }

    #[test]
    fn malformed_tags_are_rejected() {
        assert_eq!(Tag::parse(""), None);
        assert_eq!(Tag::parse("category:"), None);
        assert_eq!(Tag::parse("categories:treeee"), None);
        assert_eq!(Tag::parse("category-children:not-a-uuid"), None);
        assert_eq!(Tag::parse("attrs:category:42"), None);
        assert_eq!(Tag::parse("products:list"), None);
    }

    #[test]
    fn category_tag_keeps_raw_slug() {
        assert_eq!(
            Tag::parse("category:gpu-8gb"),
            Some(Tag::Category("gpu-8gb".to_string()))
        );
    }
}
