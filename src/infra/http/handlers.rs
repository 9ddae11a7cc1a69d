use axum::Json;
use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::categories::{
    CategoryContext, CategoryWithParent, MAX_HIERARCHY_DEPTH,
};
use crate::cache::Tag;
use crate::domain::categories::CategoryWithCount;
use crate::domain::tree::{CategoryTreeNode, LiteCategoryNode};

use super::ApiState;
use super::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct TreeQuery {
    pub depth: Option<u8>,
}

#[derive(Debug, Deserialize)]
pub struct BrowseQuery {
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub filter: bool,
}

#[derive(Debug, Serialize)]
pub struct ChildrenResponse {
    pub children: Vec<LiteCategoryNode>,
}

#[derive(Debug, Deserialize)]
pub struct InvalidateRequest {
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct InvalidateResponse {
    pub invalidated: usize,
    pub unknown: Vec<String>,
}

pub async fn category_tree(
    State(state): State<ApiState>,
    Query(query): Query<TreeQuery>,
) -> Json<Vec<CategoryTreeNode>> {
    let depth = query.depth.unwrap_or(MAX_HIERARCHY_DEPTH);
    Json(state.categories.hierarchy(depth).await)
}

pub async fn picker_tree(State(state): State<ApiState>) -> Json<Vec<LiteCategoryNode>> {
    Json(state.categories.picker_tree().await)
}

pub async fn children_of(
    State(state): State<ApiState>,
    Path(parent_id): Path<Uuid>,
) -> Json<ChildrenResponse> {
    Json(ChildrenResponse {
        children: state.categories.children_of(parent_id).await,
    })
}

pub async fn category_by_slug(
    State(state): State<ApiState>,
    Path(slug): Path<String>,
) -> Result<Json<CategoryWithParent>, ApiError> {
    state
        .categories
        .category_by_slug(&slug)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Category not found"))
}

pub async fn category_context(
    State(state): State<ApiState>,
    Path(slug): Path<String>,
) -> Result<Json<CategoryContext>, ApiError> {
    state
        .categories
        .category_context(&slug)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Category not found"))
}

pub async fn browse(
    State(state): State<ApiState>,
    Query(query): Query<BrowseQuery>,
) -> Json<Vec<CategoryWithCount>> {
    Json(
        state
            .categories
            .subcategories_for_browse(query.parent_id, query.filter)
            .await,
    )
}

pub async fn invalidate_cache(
    State(state): State<ApiState>,
    Json(request): Json<InvalidateRequest>,
) -> Json<InvalidateResponse> {
    let mut invalidated = 0;
    let mut unknown = Vec::new();
    for raw in request.tags {
        match Tag::parse(&raw) {
            Some(tag) => invalidated += state.categories.invalidate(&tag),
            None => unknown.push(raw),
        }
    }
    Json(InvalidateResponse {
        invalidated,
        unknown,
    })
}

pub async fn health(State(state): State<ApiState>) -> Result<(), ApiError> {
    match state.db.as_ref() {
        Some(db) => db
            .health_check()
            .await
            .map_err(|err| ApiError::unavailable(Some(err.to_string()))),
        None => Ok(()),
    }
}
