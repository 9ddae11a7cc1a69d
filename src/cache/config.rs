//! Cache configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_TTL_SECONDS: u64 = 300;
const DEFAULT_SLUG_LIMIT: usize = 500;
const DEFAULT_CONTEXT_LIMIT: usize = 200;
const DEFAULT_CHILDREN_LIMIT: usize = 500;
const DEFAULT_BROWSE_LIMIT: usize = 200;

/// Settings for the `categories` TTL class and per-family LRU limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Expiry for the single `categories` TTL class, in seconds.
    pub ttl_seconds: u64,
    pub slug_limit: usize,
    pub context_limit: usize,
    pub children_limit: usize,
    pub browse_limit: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: DEFAULT_TTL_SECONDS,
            slug_limit: DEFAULT_SLUG_LIMIT,
            context_limit: DEFAULT_CONTEXT_LIMIT,
            children_limit: DEFAULT_CHILDREN_LIMIT,
            browse_limit: DEFAULT_BROWSE_LIMIT,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    pub fn slug_limit_non_zero(&self) -> NonZeroUsize {
        non_zero(self.slug_limit)
    }

    pub fn context_limit_non_zero(&self) -> NonZeroUsize {
        non_zero(self.context_limit)
    }

    pub fn children_limit_non_zero(&self) -> NonZeroUsize {
        non_zero(self.children_limit)
    }

    pub fn browse_limit_non_zero(&self) -> NonZeroUsize {
        non_zero(self.browse_limit)
    }
}

fn non_zero(value: usize) -> NonZeroUsize {
    NonZeroUsize::new(value.max(1)).expect("clamped to at least 1")
}
