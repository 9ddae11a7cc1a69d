//! HTTP surface: a single public API over the category read service.

pub mod error;
pub mod handlers;
pub mod middleware;

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use crate::application::categories::CategoryService;
use crate::infra::db::PostgresCategories;

#[derive(Clone)]
pub struct ApiState {
    pub categories: Arc<CategoryService>,
    /// Absent when serving from a non-Postgres row source (tests, demos);
    /// the health endpoint then reports healthy unconditionally.
    pub db: Option<Arc<PostgresCategories>>,
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/categories/tree", get(handlers::category_tree))
        .route("/categories/picker", get(handlers::picker_tree))
        .route("/categories/browse", get(handlers::browse))
        .route("/categories/slug/{slug}", get(handlers::category_by_slug))
        .route(
            "/categories/slug/{slug}/context",
            get(handlers::category_context),
        )
        .route(
            "/categories/{parent_id}/children",
            get(handlers::children_of),
        )
        .route("/cache/invalidate", post(handlers::invalidate_cache))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}
