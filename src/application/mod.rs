//! Application services: orchestration between the domain rules and the
//! repository seam.

pub mod categories;
pub mod error;
pub mod fetcher;
pub mod repos;
