//! Category hierarchy subsystem: flat `categories` rows in, navigable
//! depth-bounded trees out, with curated ordering, aggregate product
//! counts, and a tag-scoped in-process cache.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
