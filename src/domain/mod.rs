//! Domain layer types and invariants.

pub mod attributes;
pub mod categories;
pub mod tree;
