use std::collections::HashMap;
use std::sync::Arc;

use sqlx::PgPool;

use crate::core::config::MediaConfig;
use crate::core::error::{AppError, Result};
use crate::features::categories::models::Category;
use crate::features::products::dtos::{
    CategoryProductsDto, CreateProductDto, ProductResponseDto, UpdateProductDto,
};
use crate::features::products::models::Product;
use crate::modules::imaging;
use crate::modules::storage::MediaStore;
use crate::shared::constants::{product_image_file, PRODUCT_MEDIA_FOLDER};

/// Service for product operations
pub struct ProductService {
    pool: PgPool,
    media: Arc<dyn MediaStore>,
    max_bound_px: u32,
    jpeg_quality: u8,
}

impl ProductService {
    pub fn new(pool: PgPool, media: Arc<dyn MediaStore>, config: &MediaConfig) -> Self {
        Self {
            pool,
            media,
            max_bound_px: config.max_bound_px,
            jpeg_quality: config.jpeg_quality,
        }
    }

    /// List root categories, each carrying the flattened union of its own
    /// products and its direct children's products
    pub async fn list_by_category(&self) -> Result<Vec<CategoryProductsDto>> {
        let roots = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, parent_id, name, description, picture, created_at, updated_at
            FROM categories
            WHERE parent_id IS NULL
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list root categories: {:?}", e);
            AppError::Database(e)
        })?;

        let root_ids: Vec<i32> = roots.iter().map(|c| c.id).collect();

        let children = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, parent_id, name, description, picture, created_at, updated_at
            FROM categories
            WHERE parent_id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(&root_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list child categories: {:?}", e);
            AppError::Database(e)
        })?;

        let mut scope_ids = root_ids;
        scope_ids.extend(children.iter().map(|c| c.id));

        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, category_id, name, description, price, picture, created_at, updated_at
            FROM products
            WHERE category_id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(&scope_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list products: {:?}", e);
            AppError::Database(e)
        })?;

        let mut products_by_category: HashMap<i32, Vec<Product>> = HashMap::new();
        for product in products {
            products_by_category
                .entry(product.category_id)
                .or_default()
                .push(product);
        }

        Ok(CategoryProductsDto::assemble(
            roots,
            children,
            products_by_category,
        ))
    }

    /// Create a product, processing and attaching the submitted picture.
    ///
    /// Same transactional create-then-attach flow as categories: insert,
    /// derive the file name from the new id, write the reference back,
    /// commit; the stored file is removed again if the transaction fails.
    pub async fn create(&self, dto: CreateProductDto) -> Result<ProductResponseDto> {
        let mut tx = self.pool.begin().await?;

        let mut product = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (category_id, name, description, price)
            VALUES ($1, $2, $3, $4)
            RETURNING id, category_id, name, description, price, picture, created_at, updated_at
            "#,
        )
        .bind(dto.category_id)
        .bind(&dto.name)
        .bind(&dto.description)
        .bind(dto.price)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create product: {:?}", e);
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
                        PRODUCT_MEDIA_FOLDER,
                        &product_image_file(product.id),
                        processed.bytes,
                        processed.content_type,
                    )
                    .await?;
                stored_file = Some(reference.clone());
                reference
            };

            product = match sqlx::query_as::<_, Product>(
                r#"
                UPDATE products
                SET picture = $1, updated_at = NOW()
                WHERE id = $2
                RETURNING id, category_id, name, description, price, picture, created_at, updated_at
                "#,
            )
            .bind(&reference)
            .bind(product.id)
            .fetch_one(&mut *tx)
            .await
            {
                Ok(row) => row,
                Err(e) => {
                    tracing::error!("Failed to attach product picture: {:?}", e);
                    self.discard(stored_file).await;
                    return Err(AppError::Database(e));
                }
            };
        }

        if let Err(e) = tx.commit().await {
            self.discard(stored_file).await;
            return Err(AppError::Database(e));
        }

        tracing::info!("Product created: id={}, name={}", product.id, product.name);
        Ok(product.into())
    }

    /// Merge-update a product; see `UpdateProductDto` for picture handling
    pub async fn update(&self, id: i32, dto: UpdateProductDto) -> Result<ProductResponseDto> {
        let current = self.find(id).await?;

        let picture = match dto.picture.as_deref().filter(|p| !p.is_empty()) {
            None => current.picture.clone(),
            Some(p) if imaging::is_remote_url(p) => Some(p.to_string()),
            Some(p) => {
                let processed = imaging::process_data_uri(p, self.max_bound_px, self.jpeg_quality)?;
                let reference = self
                    .media
                    .store(
                        PRODUCT_MEDIA_FOLDER,
                        &product_image_file(id),
                        processed.bytes,
                        processed.content_type,
                    )
                    .await?;
                Some(reference)
            }
        };

        let updated = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
            SET category_id = COALESCE($1, category_id),
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                price = COALESCE($4, price),
                picture = $5,
                updated_at = NOW()
            WHERE id = $6
            RETURNING id, category_id, name, description, price, picture, created_at, updated_at
            "#,
        )
        .bind(dto.category_id)
        .bind(&dto.name)
        .bind(&dto.description)
        .bind(dto.price)
        .bind(&picture)
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update product {}: {:?}", id, e);
            AppError::Database(e)
        })?;

        // The previous file is stale once the reference changed
        if let (Some(old), Some(new)) = (current.picture.as_deref(), updated.picture.as_deref()) {
            if old != new {
                if let Err(e) = self.media.remove(old).await {
                    tracing::warn!("Failed to remove stale product picture '{}': {}", old, e);
                }
            }
        }

        tracing::info!("Product updated: id={}", updated.id);
        Ok(updated.into())
    }

    /// Delete a product, removing its stored picture file first
    pub async fn delete(&self, id: i32) -> Result<()> {
        let current = self.find(id).await?;

        if let Some(picture) = current.picture.as_deref() {
            self.media.remove(picture).await?;
        }

        sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to delete product {}: {:?}", id, e);
                AppError::Database(e)
            })?;

        tracing::info!("Product deleted: id={}", id);
        Ok(())
    }

    async fn find(&self, id: i32) -> Result<Product> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, category_id, name, description, price, picture, created_at, updated_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        product.ok_or_else(|| AppError::NotFound(format!("Product {} not found", id)))
    }

    async fn discard(&self, stored: Option<String>) {
        if let Some(reference) = stored {
            if let Err(e) = self.media.remove(&reference).await {
                tracing::warn!("Failed to clean up orphaned media file '{}': {}", reference, e);
            }
        }
    }
}
