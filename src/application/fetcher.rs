//! Batched, concurrency-bounded fan-out fetching of child rows.
//!
//! The store enforces a practical width limit on `IN (...)` predicates,
//! and wide sibling sets fetched sequentially are too slow, so a logical
//! "children of these parents" read is split into fixed-size chunks
//! issued through a bounded window. A failed chunk contributes zero rows;
//! the remaining chunks still merge, so callers get a best-effort row set
//! instead of a hard error.

use std::collections::HashSet;

use futures::{StreamExt, stream};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use crate::application::repos::CategoryRepo;
use crate::domain::categories::Category;

const DEFAULT_BATCH_SIZE: usize = 50;
const DEFAULT_CONCURRENCY: usize = 4;

/// Chunking and concurrency limits for one fan-out.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct FetchPlan {
    /// Maximum parent ids per `IN` chunk.
    pub batch_size: usize,
    /// Maximum chunks in flight at once.
    pub concurrency: usize,
}

impl Default for FetchPlan {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl FetchPlan {
    fn batch_size_clamped(&self) -> usize {
        self.batch_size.max(1)
    }

    fn concurrency_clamped(&self) -> usize {
        self.concurrency.max(1)
    }
}

/// Merged result of one fan-out. `failed_chunks` lets callers tell a
/// genuinely empty level from a degraded one, so only complete results
/// get cached.
#[derive(Debug, Default)]
pub struct FanOut {
    pub rows: Vec<Category>,
    pub failed_chunks: usize,
}

impl FanOut {
    pub fn is_complete(&self) -> bool {
        self.failed_chunks == 0
    }
}

/// Fetch all visible children of `parent_ids`, batched and merged.
///
/// Input is de-duplicated; an empty set short-circuits without touching
/// the store. Row order is unspecified — ordering belongs to the tree
/// assembler.
pub async fn fetch_children_of<R>(
    repo: &R,
    plan: FetchPlan,
    parent_ids: &HashSet<Uuid>,
) -> FanOut
where
    R: CategoryRepo + ?Sized,
{
    if parent_ids.is_empty() {
        return FanOut::default();
    }

    // Stable chunk composition keeps logs comparable across requests.
    let mut ids: Vec<Uuid> = parent_ids.iter().copied().collect();
    ids.sort_unstable();

    let chunks: Vec<Vec<Uuid>> = ids
        .chunks(plan.batch_size_clamped())
        .map(|chunk| chunk.to_vec())
        .collect();

    let results = stream::iter(chunks)
        .map(|chunk| async move {
            match repo.fetch_by_parents(&chunk).await {
                Ok(rows) => Ok(rows),
                Err(error) => {
                    warn!(parent_ids = ?chunk, error = %error, "child fetch chunk failed, contributing zero rows");
                    Err(())
                }
            }
        })
        .buffer_unordered(plan.concurrency_clamped())
        .collect::<Vec<Result<Vec<Category>, ()>>>()
        .await;

    let mut fan_out = FanOut::default();
    for result in results {
        match result {
            Ok(rows) => fan_out
                .rows
                .extend(rows.into_iter().filter(|row| !row.is_hidden())),
            Err(()) => fan_out.failed_chunks += 1,
        }
    }
    fan_out
}
