//! Canonical category entity and the sibling ordering policy.
//!
//! `display_order` is overloaded: values at or above
//! [`HIDDEN_DISPLAY_ORDER`] mark a category as hidden/deprecated, values
//! strictly between zero and the threshold mark it as curated. Curated
//! categories always sort ahead of non-curated siblings; non-curated
//! siblings fall back to popularity (subtree product count) when counts
//! are in play.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;
use url::Url;
use uuid::Uuid;

/// Categories with `display_order >= 9000` are hidden from every surface.
pub const HIDDEN_DISPLAY_ORDER: i32 = 9000;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub name_bg: Option<String>,
    pub slug: String,
    pub parent_id: Option<Uuid>,
    pub icon: Option<String>,
    pub image_url: Option<String>,
    pub display_order: i32,
}

impl Category {
    pub fn is_hidden(&self) -> bool {
        self.display_order >= HIDDEN_DISPLAY_ORDER
    }

    pub fn is_curated(&self) -> bool {
        self.display_order > 0 && self.display_order < HIDDEN_DISPLAY_ORDER
    }

    /// Locale-aware label; falls back to the default-locale name.
    pub fn label_for(&self, locale: &str) -> &str {
        match locale {
            "bg" => self.name_bg.as_deref().unwrap_or(&self.name),
            _ => &self.name,
        }
    }
}

/// A category annotated with the pre-aggregated count of sellable items
/// anywhere in its subtree, itself included.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryWithCount {
    #[serde(flatten)]
    pub category: Category,
    pub subtree_product_count: i64,
}

/// Sibling total order without counts: curated first, then
/// `display_order`, then name. Used for trees and flat sibling lists.
pub fn sibling_order(a: &Category, b: &Category) -> Ordering {
    match (a.is_curated(), b.is_curated()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a
            .display_order
            .cmp(&b.display_order)
            .then_with(|| a.name.cmp(&b.name)),
    }
}

/// Sibling total order with counts in play: curated first by
/// `display_order`, non-curated by subtree count descending, names break
/// every tie so the order is deterministic.
pub fn sibling_order_with_counts(
    a: &Category,
    b: &Category,
    counts: &HashMap<Uuid, i64>,
) -> Ordering {
    match (a.is_curated(), b.is_curated()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (true, true) => a
            .display_order
            .cmp(&b.display_order)
            .then_with(|| a.name.cmp(&b.name)),
        (false, false) => {
            let count_a = counts.get(&a.id).copied().unwrap_or(0);
            let count_b = counts.get(&b.id).copied().unwrap_or(0);
            count_b.cmp(&count_a).then_with(|| a.name.cmp(&b.name))
        }
    }
}

/// Join subtree product counts onto one sibling level and apply the
/// browse filtering policy.
///
/// With `filter_for_browse` set, a category survives only if it is
/// curated or has at least one sellable item in its subtree; without it
/// every non-hidden category is kept so pickers and navigation show the
/// full taxonomy. Hidden categories never survive. Filtering happens
/// before sorting.
pub fn merge_counts(
    categories: Vec<Category>,
    counts: &HashMap<Uuid, i64>,
    filter_for_browse: bool,
) -> Vec<CategoryWithCount> {
    let mut merged: Vec<CategoryWithCount> = categories
        .into_iter()
        .filter(|category| !category.is_hidden())
        .map(|category| {
            let subtree_product_count = counts.get(&category.id).copied().unwrap_or(0);
            CategoryWithCount {
                category,
                subtree_product_count,
            }
        })
        .filter(|entry| {
            !filter_for_browse || entry.category.is_curated() || entry.subtree_product_count > 0
        })
        .collect();

    merged.sort_by(|a, b| sibling_order_with_counts(&a.category, &b.category, counts));
    merged
}

/// Normalize a raw `image_url` column value on read.
///
/// Trims whitespace, treats the empty string as absent, promotes
/// protocol-relative references to `https:`, and drops anything that does
/// not parse as an absolute http(s) URL.
pub fn normalize_image_url(raw: Option<String>) -> Option<String> {
    let trimmed = raw.as_deref().map(str::trim).unwrap_or_default();
    if trimmed.is_empty() {
        return None;
    }

    let candidate = if trimmed.starts_with("//") {
        format!("https:{trimmed}")
    } else {
        trimmed.to_string()
    };

    match Url::parse(&candidate) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Some(candidate),
        _ => None,
    }
}
