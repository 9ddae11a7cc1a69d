//! Category attribute metadata and inheritance resolution.
//!
//! Attributes are defined per category or globally (`category_id` absent)
//! and flow down the tree according to their `inherit_scope`. Resolution
//! overlays definitions by normalized key: an attribute defined on the
//! category itself wins over inherited ones, and closer ancestors win
//! over farther ones, but an inherited definition may still contribute
//! its option lists when the winning one has none.

use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

/// Ancestor walk ceiling when resolving inherited attributes.
pub const MAX_ANCESTOR_DEPTH: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    Select,
    Multiselect,
    Boolean,
    Number,
    Text,
    Date,
}

impl AttributeType {
    /// Unknown column values collapse to `text` rather than failing the
    /// whole context read.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "select" => Self::Select,
            "multiselect" => Self::Multiselect,
            "boolean" => Self::Boolean,
            "number" => Self::Number,
            "date" => Self::Date,
            _ => Self::Text,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Multiselect => "multiselect",
            Self::Boolean => "boolean",
            Self::Number => "number",
            Self::Text => "text",
            Self::Date => "date",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InheritScope {
    SelfOnly,
    Inherit,
    Global,
}

impl InheritScope {
    /// Legacy rows carry no scope: scoped rows default to `self_only`,
    /// unscoped (global) rows to `global`.
    pub fn parse(raw: Option<&str>, category_id: Option<Uuid>) -> Self {
        match raw {
            Some("inherit") => Self::Inherit,
            Some("global") => Self::Global,
            Some("self_only") => Self::SelfOnly,
            _ if category_id.is_none() => Self::Global,
            _ => Self::SelfOnly,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryAttribute {
    pub id: Uuid,
    pub category_id: Option<Uuid>,
    pub name: String,
    pub name_bg: Option<String>,
    pub attribute_key: Option<String>,
    pub attribute_type: AttributeType,
    pub inherit_scope: InheritScope,
    pub options: Option<Vec<String>>,
    pub options_bg: Option<Vec<String>>,
    pub is_filterable: bool,
    pub is_required: bool,
    pub unit_suffix: Option<String>,
    pub sort_order: i32,
}

impl CategoryAttribute {
    fn map_key(&self) -> String {
        let key = self
            .attribute_key
            .clone()
            .unwrap_or_else(|| normalize_attribute_key(&self.name));
        format!("{}::{}", key.trim().to_lowercase(), self.attribute_type.as_str())
    }

    fn has_options(&self) -> bool {
        self.options.as_ref().is_some_and(|o| !o.is_empty())
            || self.options_bg.as_ref().is_some_and(|o| !o.is_empty())
    }

    /// Borrow option lists from a shadowed definition when this one is
    /// bare. Keeps selects usable when a category overrides only the
    /// label of an inherited attribute.
    fn with_fallback_options(mut self, fallback: &CategoryAttribute) -> Self {
        if self.has_options() || !fallback.has_options() {
            return self;
        }
        self.options = fallback.options.clone();
        self.options_bg = fallback.options_bg.clone();
        if self.attribute_type == AttributeType::Text
            && fallback.attribute_type != AttributeType::Text
        {
            self.attribute_type = fallback.attribute_type;
        }
        self
    }
}

/// Lowercased, hyphen/space-collapsed key derived from a display name.
pub fn normalize_attribute_key(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

fn applies_to(attr: &CategoryAttribute, category_id: Uuid, include_global: bool) -> bool {
    match attr.category_id {
        Some(owner) if owner == category_id => true,
        Some(_) => matches!(attr.inherit_scope, InheritScope::Inherit | InheritScope::Global),
        None => include_global && attr.inherit_scope == InheritScope::Global,
    }
}

/// Resolve the effective attribute set for a category.
///
/// `ancestor_ids` is the self-first ancestor chain (`[self, parent,
/// grandparent, ...]`) used to rank inherited definitions: the closer the
/// owner, the later it is applied, so it overwrites farther ones.
pub fn resolve_attributes(
    rows: Vec<CategoryAttribute>,
    category_id: Uuid,
    ancestor_ids: &[Uuid],
    include_global: bool,
) -> Vec<CategoryAttribute> {
    let applicable: Vec<CategoryAttribute> = rows
        .into_iter()
        .filter(|attr| applies_to(attr, category_id, include_global))
        .collect();

    let depth_of: HashMap<Uuid, usize> = ancestor_ids
        .iter()
        .enumerate()
        .map(|(depth, &id)| (id, depth))
        .collect();

    // Farther ancestors first so closer definitions overwrite them.
    let mut inherited: Vec<&CategoryAttribute> = applicable
        .iter()
        .filter(|attr| attr.category_id != Some(category_id))
        .collect();
    inherited.sort_by(|a, b| {
        let da = a
            .category_id
            .and_then(|id| depth_of.get(&id).copied())
            .unwrap_or(usize::MAX);
        let db = b
            .category_id
            .and_then(|id| depth_of.get(&id).copied())
            .unwrap_or(usize::MAX);
        db.cmp(&da).then_with(|| a.sort_order.cmp(&b.sort_order))
    });

    let mut overlay: HashMap<String, (CategoryAttribute, bool)> = HashMap::new();
    for attr in inherited {
        let key = attr.map_key();
        let merged = match overlay.remove(&key) {
            Some((existing, _)) => attr.clone().with_fallback_options(&existing),
            None => attr.clone(),
        };
        overlay.insert(key, (merged, false));
    }

    for attr in applicable
        .iter()
        .filter(|attr| attr.category_id == Some(category_id))
    {
        let key = attr.map_key();
        let merged = match overlay.remove(&key) {
            Some((existing, _)) => attr.clone().with_fallback_options(&existing),
            None => attr.clone(),
        };
        overlay.insert(key, (merged, true));
    }

    let mut resolved: Vec<(CategoryAttribute, bool)> = overlay.into_values().collect();
    resolved.sort_by(|(a, a_own), (b, b_own)| {
        b_own
            .cmp(a_own)
            .then_with(|| a.sort_order.cmp(&b.sort_order))
            .then_with(|| a.name.cmp(&b.name))
    });
    resolved.into_iter().map(|(attr, _)| attr).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attr(
        name: &str,
        category_id: Option<Uuid>,
        scope: InheritScope,
        sort_order: i32,
    ) -> CategoryAttribute {
        CategoryAttribute {
            id: Uuid::new_v4(),
            category_id,
            name: name.to_string(),
            name_bg: None,
            attribute_key: None,
            attribute_type: AttributeType::Text,
            inherit_scope: scope,
            options: None,
            options_bg: None,
            is_filterable: true,
            is_required: false,
            unit_suffix: None,
            sort_order,
        }
    }

    #[test]
    fn key_normalization() {
        assert_eq!(normalize_attribute_key("Screen Size"), "screen_size");
        assert_eq!(normalize_attribute_key("  RAM (GB)  "), "ram_gb");
        assert_eq!(normalize_attribute_key("Цвят"), "цвят");
    }

    #[test]
    fn self_only_attributes_do_not_inherit() {
        let parent = Uuid::new_v4();
        let child = Uuid::new_v4();
        let rows = vec![
            attr("Private", Some(parent), InheritScope::SelfOnly, 1),
            attr("Shared", Some(parent), InheritScope::Inherit, 2),
        ];

        let resolved = resolve_attributes(rows, child, &[child, parent], true);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].name, "Shared");
    }

    #[test]
    fn own_definition_shadows_inherited() {
        let parent = Uuid::new_v4();
        let child = Uuid::new_v4();
        let mut inherited = attr("Brand", Some(parent), InheritScope::Inherit, 5);
        inherited.options = Some(vec!["Apple".into(), "Samsung".into()]);
        let own = attr("Brand", Some(child), InheritScope::SelfOnly, 1);

        let resolved =
            resolve_attributes(vec![inherited, own.clone()], child, &[child, parent], true);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].id, own.id);
        // bare override borrows the inherited option list
        assert_eq!(
            resolved[0].options,
            Some(vec!["Apple".to_string(), "Samsung".to_string()])
        );
    }

    #[test]
    fn global_attributes_included_only_on_request() {
        let child = Uuid::new_v4();
        let rows = vec![attr("Condition", None, InheritScope::Global, 1)];

        assert_eq!(
            resolve_attributes(rows.clone(), child, &[child], true).len(),
            1
        );
        assert!(resolve_attributes(rows, child, &[child], false).is_empty());
    }

    #[test]
    fn own_attributes_sort_before_inherited() {
        let parent = Uuid::new_v4();
        let child = Uuid::new_v4();
        let rows = vec![
            attr("Inherited A", Some(parent), InheritScope::Inherit, 1),
            attr("Own Z", Some(child), InheritScope::SelfOnly, 9),
        ];

        let resolved = resolve_attributes(rows, child, &[child, parent], true);
        let names: Vec<&str> = resolved.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Own Z", "Inherited A"]);
    }

    #[test]
    fn unknown_type_and_scope_fallbacks() {
        assert_eq!(AttributeType::parse("multiselect"), AttributeType::Multiselect);
        assert_eq!(AttributeType::parse("mystery"), AttributeType::Text);
        assert_eq!(
            InheritScope::parse(None, Some(Uuid::new_v4())),
            InheritScope::SelfOnly
        );
        assert_eq!(InheritScope::parse(None, None), InheritScope::Global);
    }
}
