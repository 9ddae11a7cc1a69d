//! Repository trait describing the category row source.
//!
//! The relational store is treated as an opaque adapter queryable by
//! equality/`IN`/`LT` predicates; everything tree-shaped happens above
//! this seam so the store stays swappable.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::attributes::CategoryAttribute;
use crate::domain::categories::Category;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Narrow row-source interface over the flat category table.
///
/// Implementations must exclude hidden rows (`display_order >= 9000`)
/// from every result; the layers above filter defensively but never rely
/// on it.
#[async_trait]
pub trait CategoryRepo: Send + Sync {
    /// Root-level rows (`parent_id IS NULL`).
    async fn fetch_roots(&self) -> Result<Vec<Category>, RepoError>;

    /// One chunk of a fan-out: all visible children of the given parents.
    /// Callers keep `parent_ids` under the store's safe `IN` width.
    async fn fetch_by_parents(&self, parent_ids: &[Uuid]) -> Result<Vec<Category>, RepoError>;

    async fn fetch_by_id(&self, id: Uuid) -> Result<Option<Category>, RepoError>;

    async fn fetch_by_slug(&self, slug: &str) -> Result<Option<Category>, RepoError>;

    /// Lightweight `COUNT(*) GROUP BY parent_id` over visible children.
    /// Parents with zero children are simply absent from the map.
    async fn count_children_of(
        &self,
        parent_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, i64>, RepoError>;

    /// Pre-aggregated sellable-item counts per subtree, keyed by category
    /// id. Maintained outside this subsystem; absent means zero.
    async fn fetch_subtree_counts(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, i64>, RepoError>;

    /// Attribute rows scoped to any of `category_ids`, plus global rows
    /// when requested.
    async fn fetch_attributes(
        &self,
        category_ids: &[Uuid],
        include_global: bool,
    ) -> Result<Vec<CategoryAttribute>, RepoError>;
}
