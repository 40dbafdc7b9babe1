use std::collections::HashMap;
use std::sync::Arc;

use sqlx::PgPool;

use crate::core::config::MediaConfig;
use crate::core::error::{AppError, Result};
use crate::features::categories::dtos::{
    CategoryResponseDto, CategoryTreeDto, CreateCategoryDto, UpdateCategoryDto,
};
use crate::features::categories::models::Category;
use crate::modules::imaging;
use crate::modules::storage::MediaStore;
use crate::shared::constants::{category_image_file, CATEGORY_MEDIA_FOLDER};

/// Service for category operations
pub struct CategoryService {
    pool: PgPool,
    media: Arc<dyn MediaStore>,
    max_bound_px: u32,
    jpeg_quality: u8,
}

impl CategoryService {
    pub fn new(pool: PgPool, media: Arc<dyn MediaStore>, config: &MediaConfig) -> Self {
        Self {
            pool,
            media,
            max_bound_px: config.max_bound_px,
            jpeg_quality: config.jpeg_quality,
        }
    }

    /// List all categories as a tree of roots with recursive product counts
    pub async fn list_tree(&self) -> Result<Vec<CategoryTreeDto>> {
        let categories = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, parent_id, name, description, picture, created_at, updated_at
            FROM categories
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list categories: {:?}", e);
            AppError::Database(e)
        })?;

        let direct_counts: HashMap<i32, i64> = sqlx::query_as::<_, (i32, i64)>(
            r#"
            SELECT category_id, COUNT(*)
            FROM products
            GROUP BY category_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to count products per category: {:?}", e);
            AppError::Database(e)
        })?
        .into_iter()
        .collect();

        Ok(CategoryTreeDto::build_tree(categories, &direct_counts))
    }

    /// Create a category, processing and attaching the submitted picture.
    ///
    /// Runs as a single transaction: the row is inserted first so the image
    /// file name can be derived from the new id, then the picture reference
    /// is written back. If anything fails after the file was stored, the
    /// transaction rolls back and the orphaned file is removed.
    pub async fn create(&self, dto: CreateCategoryDto) -> Result<CategoryResponseDto> {
        let mut tx = self.pool.begin().await?;

        let mut category = sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (parent_id, name, description)
            VALUES ($1, $2, $3)
            RETURNING id, parent_id, name, description, picture, created_at, updated_at
            "#,
        )
        .bind(dto.parent_id)
        .bind(&dto.name)
        .bind(&dto.description)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create category: {:?}", e);
            AppError::Database(e)
        })?;

        let mut stored_file: Option<String> = None;
        if let Some(picture) = dto.picture.as_deref().filter(|p| !p.is_empty()) {
            let reference = if imaging::is_remote_url(picture) {
                picture.to_string()
            } else {
                let processed =
                    imaging::process_data_uri(picture, self.max_bound_px, self.jpeg_quality)?;
                let reference = self
                    .media
                    .store(
                        CATEGORY_MEDIA_FOLDER,
                        &category_image_file(category.id),
                        processed.bytes,
                        processed.content_type,
                    )
                    .await?;
                stored_file = Some(reference.clone());
                reference
            };

            category = match sqlx::query_as::<_, Category>(
                r#"
                UPDATE categories
                SET picture = $1, updated_at = NOW()
                WHERE id = $2
                RETURNING id, parent_id, name, description, picture, created_at, updated_at
                "#,
            )
            .bind(&reference)
            .bind(category.id)
            .fetch_one(&mut *tx)
            .await
            {
                Ok(row) => row,
                Err(e) => {
                    tracing::error!("Failed to attach category picture: {:?}", e);
                    self.discard(stored_file).await;
                    return Err(AppError::Database(e));
                }
            };
        }

        if let Err(e) = tx.commit().await {
            self.discard(stored_file).await;
            return Err(AppError::Database(e));
        }

        tracing::info!("Category created: id={}, name={}", category.id, category.name);
        Ok(category.into())
    }

    /// Merge-update a category; see `UpdateCategoryDto` for picture handling
    pub async fn update(&self, id: i32, dto: UpdateCategoryDto) -> Result<CategoryResponseDto> {
        let current = self.find(id).await?;

        let picture = match dto.picture.as_deref().filter(|p| !p.is_empty()) {
            None => current.picture.clone(),
            Some(p) if imaging::is_remote_url(p) => Some(p.to_string()),
            Some(p) => {
                let processed = imaging::process_data_uri(p, self.max_bound_px, self.jpeg_quality)?;
                let reference = self
                    .media
                    .store(
                        CATEGORY_MEDIA_FOLDER,
                        &category_image_file(id),
                        processed.bytes,
                        processed.content_type,
                    )
                    .await?;
                Some(reference)
            }
        };

        let updated = sqlx::query_as::<_, Category>(
            r#"
            UPDATE categories
            SET name = COALESCE($1, name),
                description = COALESCE($2, description),
                parent_id = COALESCE($3, parent_id),
                picture = $4,
                updated_at = NOW()
            WHERE id = $5
            RETURNING id, parent_id, name, description, picture, created_at, updated_at
            "#,
        )
        .bind(&dto.name)
        .bind(&dto.description)
        .bind(dto.parent_id)
        .bind(&picture)
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update category {}: {:?}", id, e);
            AppError::Database(e)
        })?;

        // The previous file is stale once the reference changed
        if let (Some(old), Some(new)) = (current.picture.as_deref(), updated.picture.as_deref()) {
            if old != new {
                if let Err(e) = self.media.remove(old).await {
                    tracing::warn!("Failed to remove stale category picture '{}': {}", old, e);
                }
            }
        }

        tracing::info!("Category updated: id={}", updated.id);
        Ok(updated.into())
    }

    /// Delete a category unless child categories or products still reference
    /// it. Returns `false` (with all data untouched) when deletion was
    /// refused.
    pub async fn delete(&self, id: i32) -> Result<bool> {
        let current = self.find(id).await?;

        let child_count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM categories WHERE parent_id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        let product_count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM products WHERE category_id = $1")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;

        if child_count > 0 || product_count > 0 {
            tracing::info!(
                "Refusing to delete category {}: {} children, {} products",
                id,
                child_count,
                product_count
            );
            return Ok(false);
        }

        if let Some(picture) = current.picture.as_deref() {
            self.media.remove(picture).await?;
        }

        sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to delete category {}: {:?}", id, e);
                AppError::Database(e)
            })?;

        tracing::info!("Category deleted: id={}", id);
        Ok(true)
    }

    async fn find(&self, id: i32) -> Result<Category> {
        let category = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, parent_id, name, description, picture, created_at, updated_at
            FROM categories
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        category.ok_or_else(|| AppError::NotFound(format!("Category {} not found", id)))
    }

    async fn discard(&self, stored: Option<String>) {
        if let Some(reference) = stored {
            if let Err(e) = self.media.remove(&reference).await {
                tracing::warn!("Failed to clean up orphaned media file '{}': {}", reference, e);
            }
        }
    }
}
