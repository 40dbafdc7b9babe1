use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use validator::Validate;

use crate::core::error::{AppError, Result};
use crate::core::extractor::AppJson;
use crate::features::products::dtos::{
    CategoryProductsDto, CreateProductDto, DeleteProductResponseDto, ProductResponseDto,
    UpdateProductDto,
};
use crate::features::products::services::ProductService;
use crate::shared::types::{ApiResponse, Meta};

/// Query params identifying the target record
#[derive(Debug, Deserialize, IntoParams)]
pub struct IdQuery {
    /// Product id
    pub id: i32,
}

/// List products grouped by root category
///
/// Each root category carries the flattened union of its own products and
/// its direct children's products.
#[utoipa::path(
    get,
    path = "/api/products",
    responses(
        (status = 200, description = "Products per root category", body = ApiResponse<Vec<CategoryProductsDto>>),
    ),
    tag = "products"
)]
pub async fn list_products(
    State(service): State<Arc<ProductService>>,
) -> Result<Json<ApiResponse<Vec<CategoryProductsDto>>>> {
    let listing = service.list_by_category().await?;
    let total = listing.iter().map(|c| c.products.len() as i64).sum();
    Ok(Json(ApiResponse::success(
        Some(listing),
        None,
        Some(Meta { total }),
    )))
}

/// Create a product
#[utoipa::path(
    post,
    path = "/api/products",
    request_body = CreateProductDto,
    responses(
        (status = 201, description = "Product created", body = ApiResponse<ProductResponseDto>),
        (status = 400, description = "Validation error or bad image payload")
    ),
    tag = "products"
)]
pub async fn create_product(
    State(service): State<Arc<ProductService>>,
    AppJson(dto): AppJson<CreateProductDto>,
) -> Result<(StatusCode, Json<ApiResponse<ProductResponseDto>>)> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let product = service.create(dto).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(Some(product), None, None)),
    ))
}

/// Update a product
///
/// Merge-update: absent fields keep their current values. A `picture`
/// that is an `http(s)` URL is adopted verbatim; an embedded payload is
/// resized and stored, replacing the previously stored file.
#[utoipa::path(
    put,
    path = "/api/products",
    params(IdQuery),
    request_body = UpdateProductDto,
    responses(
        (status = 200, description = "Product updated", body = ApiResponse<ProductResponseDto>),
        (status = 404, description = "Product not found")
    ),
    tag = "products"
)]
pub async fn update_product(
    State(service): State<Arc<ProductService>>,
    Query(query): Query<IdQuery>,
    AppJson(dto): AppJson<UpdateProductDto>,
) -> Result<Json<ApiResponse<ProductResponseDto>>> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let product = service.update(query.id, dto).await?;
    Ok(Json(ApiResponse::success(Some(product), None, None)))
}

/// Delete a product
#[utoipa::path(
    delete,
    path = "/api/products",
    params(IdQuery),
    responses(
        (status = 200, description = "Product deleted", body = ApiResponse<DeleteProductResponseDto>),
        (status = 404, description = "Product not found")
    ),
    tag = "products"
)]
pub async fn delete_product(
    State(service): State<Arc<ProductService>>,
    Query(query): Query<IdQuery>,
) -> Result<Json<ApiResponse<DeleteProductResponseDto>>> {
    service.delete(query.id).await?;

    Ok(Json(ApiResponse::success(
        Some(DeleteProductResponseDto { deleted: true }),
        Some("Product deleted successfully".to_string()),
        None,
    )))
}
