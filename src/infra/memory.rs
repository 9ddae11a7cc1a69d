//! In-memory row source adapter.
//!
//! Backs the repository trait with plain vectors: used by the test
//! suites and handy for demos without a database. Mirrors the Postgres
//! adapter's contract, including hidden-row exclusion, and records how
//! many queries of each kind were issued so tests can assert fetch
//! behaviour (negative caching, batching) precisely.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use uuid::Uuid;

use crate::application::repos::{CategoryRepo, RepoError};
use crate::domain::attributes::CategoryAttribute;
use crate::domain::categories::Category;

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
pub struct InMemoryCategories {
    rows: RwLock<Vec<Category>>,
    subtree_counts: RwLock<HashMap<Uuid, i64>>,
    attributes: RwLock<Vec<CategoryAttribute>>,
    failing_parents: RwLock<HashSet<Uuid>>,

    root_queries: AtomicUsize,
    parent_queries: AtomicUsize,
    count_queries: AtomicUsize,
}

impl InMemoryCategories {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<Category>) -> Self {
        let adapter = Self::new();
        *write(&adapter.rows) = rows;
        adapter
    }

    pub fn insert(&self, row: Category) {
        write(&self.rows).push(row);
    }

    pub fn set_subtree_count(&self, id: Uuid, count: i64) {
        write(&self.subtree_counts).insert(id, count);
    }

    pub fn set_attributes(&self, attributes: Vec<CategoryAttribute>) {
        *write(&self.attributes) = attributes;
    }

    /// Make every chunk containing this parent id fail with a timeout.
    pub fn fail_parent(&self, parent_id: Uuid) {
        write(&self.failing_parents).insert(parent_id);
    }

    pub fn root_queries(&self) -> usize {
        self.root_queries.load(Ordering::SeqCst)
    }

    pub fn parent_queries(&self) -> usize {
        self.parent_queries.load(Ordering::SeqCst)
    }

    pub fn count_queries(&self) -> usize {
        self.count_queries.load(Ordering::SeqCst)
    }

    fn visible(&self) -> Vec<Category> {
        read(&self.rows)
            .iter()
            .filter(|row| !row.is_hidden())
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CategoryRepo for InMemoryCategories {
    async fn fetch_roots(&self) -> Result<Vec<Category>, RepoError> {
        self.root_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .visible()
            .into_iter()
            .filter(|row| row.parent_id.is_none())
            .collect())
    }

    async fn fetch_by_parents(&self, parent_ids: &[Uuid]) -> Result<Vec<Category>, RepoError> {
        self.parent_queries.fetch_add(1, Ordering::SeqCst);
        if parent_ids
            .iter()
            .any(|id| read(&self.failing_parents).contains(id))
        {
            return Err(RepoError::Timeout);
        }
        Ok(self
            .visible()
            .into_iter()
            .filter(|row| row.parent_id.is_some_and(|p| parent_ids.contains(&p)))
            .collect())
    }

    async fn fetch_by_id(&self, id: Uuid) -> Result<Option<Category>, RepoError> {
        Ok(self.visible().into_iter().find(|row| row.id == id))
    }

    async fn fetch_by_slug(&self, slug: &str) -> Result<Option<Category>, RepoError> {
        Ok(self.visible().into_iter().find(|row| row.slug == slug))
    }

    async fn count_children_of(
        &self,
        parent_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, i64>, RepoError> {
        self.count_queries.fetch_add(1, Ordering::SeqCst);
        let mut counts = HashMap::new();
        for row in self.visible() {
            if let Some(parent) = row.parent_id {
                if parent_ids.contains(&parent) {
                    *counts.entry(parent).or_insert(0) += 1;
                }
            }
        }
        Ok(counts)
    }

    async fn fetch_subtree_counts(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, i64>, RepoError> {
        let counts = read(&self.subtree_counts);
        Ok(ids
            .iter()
            .filter_map(|id| counts.get(id).map(|&count| (*id, count)))
            .collect())
    }

    async fn fetch_attributes(
        &self,
        category_ids: &[Uuid],
        include_global: bool,
    ) -> Result<Vec<CategoryAttribute>, RepoError> {
        Ok(read(&self.attributes)
            .iter()
            .filter(|attr| match attr.category_id {
                Some(owner) => category_ids.contains(&owner),
                None => include_global,
            })
            .cloned()
            .collect())
    }
}
