//! Postgres-backed category repository.
//!
//! Queries bind id sets with `= ANY($1)` so chunking stays the caller's
//! concern, and every row-returning statement excludes hidden rows in SQL
//! (`display_order >= 9000` never leaves the database). Compile-time
//! checked macros are deliberately avoided: the schema lives in
//! `migrations/` and the adapter must build without a live database.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::query;
use std::collections::HashMap;
use uuid::Uuid;

use crate::application::repos::{CategoryRepo, RepoError};
use crate::domain::attributes::{AttributeType, CategoryAttribute, InheritScope};
use crate::domain::categories::{Category, HIDDEN_DISPLAY_ORDER, normalize_image_url};

const CATEGORY_COLUMNS: &str =
    "id, name, name_bg, slug, parent_id, icon, image_url, display_order";

const ATTRIBUTE_COLUMNS: &str = "id, category_id, name, name_bg, attribute_key, attribute_type, \
     inherit_scope, options, options_bg, is_filterable, is_required, unit_suffix, sort_order";

pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::Database(db) if db.message().contains("invalid input syntax") => {
            RepoError::InvalidInput {
                message: db.message().to_string(),
            }
        }
        sqlx::Error::Database(db)
            if db
                .message()
                .contains("canceling statement due to user request") =>
        {
            RepoError::Timeout
        }
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        other => RepoError::from_persistence(other),
    }
}

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: Uuid,
    name: String,
    name_bg: Option<String>,
    slug: String,
    parent_id: Option<Uuid>,
    icon: Option<String>,
    image_url: Option<String>,
    display_order: i32,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            name_bg: row.name_bg,
            slug: row.slug,
            parent_id: row.parent_id,
            icon: row.icon,
            image_url: normalize_image_url(row.image_url),
            display_order: row.display_order,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AttributeRow {
    id: Uuid,
    category_id: Option<Uuid>,
    name: String,
    name_bg: Option<String>,
    attribute_key: Option<String>,
    attribute_type: String,
    inherit_scope: Option<String>,
    options: Option<Vec<String>>,
    options_bg: Option<Vec<String>>,
    is_filterable: bool,
    is_required: bool,
    unit_suffix: Option<String>,
    sort_order: i32,
}

impl From<AttributeRow> for CategoryAttribute {
    fn from(row: AttributeRow) -> Self {
        Self {
            id: row.id,
            category_id: row.category_id,
            name: row.name,
            name_bg: row.name_bg,
            attribute_key: row.attribute_key,
            attribute_type: AttributeType::parse(&row.attribute_type),
            inherit_scope: InheritScope::parse(row.inherit_scope.as_deref(), row.category_id),
            options: row.options,
            options_bg: row.options_bg,
            is_filterable: row.is_filterable,
            is_required: row.is_required,
            unit_suffix: row.unit_suffix,
            sort_order: row.sort_order,
        }
    }
}

#[derive(Clone)]
pub struct PostgresCategories {
    pool: Arc<PgPool>,
}

impl PostgresCategories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }
}

#[async_trait]
impl CategoryRepo for PostgresCategories {
    async fn fetch_roots(&self) -> Result<Vec<Category>, RepoError> {
        let rows: Vec<CategoryRow> = sqlx::query_as(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories \
             WHERE parent_id IS NULL AND display_order < $1 \
             ORDER BY display_order, name"
        ))
        .bind(HIDDEN_DISPLAY_ORDER)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Category::from).collect())
    }

    async fn fetch_by_parents(&self, parent_ids: &[Uuid]) -> Result<Vec<Category>, RepoError> {
        let rows: Vec<CategoryRow> = sqlx::query_as(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories \
             WHERE parent_id = ANY($1) AND display_order < $2"
        ))
        .bind(parent_ids)
        .bind(HIDDEN_DISPLAY_ORDER)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Category::from).collect())
    }

    async fn fetch_by_id(&self, id: Uuid) -> Result<Option<Category>, RepoError> {
        let row: Option<CategoryRow> = sqlx::query_as(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories \
             WHERE id = $1 AND display_order < $2"
        ))
        .bind(id)
        .bind(HIDDEN_DISPLAY_ORDER)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Category::from))
    }

    async fn fetch_by_slug(&self, slug: &str) -> Result<Option<Category>, RepoError> {
        let row: Option<CategoryRow> = sqlx::query_as(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories \
             WHERE slug = $1 AND display_order < $2"
        ))
        .bind(slug)
        .bind(HIDDEN_DISPLAY_ORDER)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Category::from))
    }

    async fn count_children_of(
        &self,
        parent_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, i64>, RepoError> {
        let rows: Vec<(Uuid, i64)> = sqlx::query_as(
            "SELECT parent_id, COUNT(*) FROM categories \
             WHERE parent_id = ANY($1) AND display_order < $2 \
             GROUP BY parent_id",
        )
        .bind(parent_ids)
        .bind(HIDDEN_DISPLAY_ORDER)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().collect())
    }

    async fn fetch_subtree_counts(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, i64>, RepoError> {
        let rows: Vec<(Uuid, i64)> = sqlx::query_as(
            "SELECT category_id, product_count FROM category_product_counts \
             WHERE category_id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().collect())
    }

    async fn fetch_attributes(
        &self,
        category_ids: &[Uuid],
        include_global: bool,
    ) -> Result<Vec<CategoryAttribute>, RepoError> {
        let rows: Vec<AttributeRow> = sqlx::query_as(&format!(
            "SELECT {ATTRIBUTE_COLUMNS} FROM category_attributes \
             WHERE category_id = ANY($1) OR (category_id IS NULL AND $2) \
             ORDER BY sort_order, name"
        ))
        .bind(category_ids)
        .bind(include_global)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(CategoryAttribute::from).collect())
    }
}
