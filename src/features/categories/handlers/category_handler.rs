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
use crate::features::categories::dtos::{
    CategoryResponseDto, CategoryTreeDto, CreateCategoryDto, DeleteCategoryResponseDto,
    UpdateCategoryDto,
};
use crate::features::categories::services::CategoryService;
use crate::shared::types::{ApiResponse, Meta};

/// Query params identifying the target record
#[derive(Debug, Deserialize, IntoParams)]
pub struct IdQuery {
    /// Category id
    pub id: i32,
}

/// List the category tree
///
/// Returns root categories with nested children and a recursive
/// `productCount` per node.
#[utoipa::path(
    get,
    path = "/api/categories",
    responses(
        (status = 200, description = "Category tree", body = ApiResponse<Vec<CategoryTreeDto>>),
    ),
    tag = "categories"
)]
pub async fn list_categories(
    State(service): State<Arc<CategoryService>>,
) -> Result<Json<ApiResponse<Vec<CategoryTreeDto>>>> {
    let tree = service.list_tree().await?;
    let total = tree.len() as i64;
    Ok(Json(ApiResponse::success(
        Some(tree),
        None,
        Some(Meta { total }),
    )))
}

/// Create a category
///
/// An embedded `picture` payload is resized and stored; the stored
/// reference comes back on the created record.
#[utoipa::path(
    post,
    path = "/api/categories",
    request_body = CreateCategoryDto,
    responses(
        (status = 201, description = "Category created", body = ApiResponse<CategoryResponseDto>),
        (status = 400, description = "Validation error or bad image payload")
    ),
    tag = "categories"
)]
pub async fn create_category(
    State(service): State<Arc<CategoryService>>,
    AppJson(dto): AppJson<CreateCategoryDto>,
) -> Result<(StatusCode, Json<ApiResponse<CategoryResponseDto>>)> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let category = service.create(dto).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(Some(category), None, None)),
    ))
}

/// Update a category
///
/// Merge-update: absent fields keep their current values. A `picture`
/// that is an `http(s)` URL is adopted verbatim; an embedded payload is
/// resized and stored, replacing the previously stored file.
#[utoipa::path(
    put,
    path = "/api/categories",
    params(IdQuery),
    request_body = UpdateCategoryDto,
    responses(
        (status = 200, description = "Category updated", body = ApiResponse<CategoryResponseDto>),
        (status = 404, description = "Category not found")
    ),
    tag = "categories"
)]
pub async fn update_category(
    State(service): State<Arc<CategoryService>>,
    Query(query): Query<IdQuery>,
    AppJson(dto): AppJson<UpdateCategoryDto>,
) -> Result<Json<ApiResponse<CategoryResponseDto>>> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let category = service.update(query.id, dto).await?;
    Ok(Json(ApiResponse::success(Some(category), None, None)))
}

/// Delete a category
///
/// Refused (with `deleted: false` and a descriptive message, not an error
/// status) while child categories or products still reference it.
#[utoipa::path(
    delete,
    path = "/api/categories",
    params(IdQuery),
    responses(
        (status = 200, description = "Deletion outcome", body = ApiResponse<DeleteCategoryResponseDto>),
        (status = 404, description = "Category not found")
    ),
    tag = "categories"
)]
pub async fn delete_category(
    State(service): State<Arc<CategoryService>>,
    Query(query): Query<IdQuery>,
) -> Result<Json<ApiResponse<DeleteCategoryResponseDto>>> {
    let deleted = service.delete(query.id).await?;

    let message = if deleted {
        "Category deleted successfully"
    } else {
        "Category has associated records. Handle them before deletion."
    };

    Ok(Json(ApiResponse::success(
        Some(DeleteCategoryResponseDto { deleted }),
        Some(message.to_string()),
        None,
    )))
}
