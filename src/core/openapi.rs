use utoipa::{Modify, OpenApi};

use crate::features::categories::{dtos as categories_dtos, handlers as categories_handlers};
use crate::features::products::{dtos as products_dtos, handlers as products_handlers};
use crate::shared::types::{ApiResponse, Meta};

#[derive(OpenApi)]
#[openapi(
    paths(
        // Categories
        categories_handlers::list_categories,
        categories_handlers::create_category,
        categories_handlers::update_category,
        categories_handlers::delete_category,
        // Products
        products_handlers::list_products,
        products_handlers::create_product,
        products_handlers::update_product,
        products_handlers::delete_product,
    ),
    components(
        schemas(
            // Shared
            Meta,
            // Categories
            categories_dtos::CategoryResponseDto,
            categories_dtos::CategoryTreeDto,
            categories_dtos::CreateCategoryDto,
            categories_dtos::UpdateCategoryDto,
            categories_dtos::DeleteCategoryResponseDto,
            ApiResponse<Vec<categories_dtos::CategoryTreeDto>>,
            ApiResponse<categories_dtos::CategoryResponseDto>,
            ApiResponse<categories_dtos::DeleteCategoryResponseDto>,
            // Products
            products_dtos::ProductResponseDto,
            products_dtos::CategoryProductsDto,
            products_dtos::CreateProductDto,
            products_dtos::UpdateProductDto,
            products_dtos::DeleteProductResponseDto,
            ApiResponse<Vec<products_dtos::CategoryProductsDto>>,
            ApiResponse<products_dtos::ProductResponseDto>,
            ApiResponse<products_dtos::DeleteProductResponseDto>,
        )
    ),
    tags(
        (name = "categories", description = "Hierarchical product categories"),
        (name = "products", description = "Catalog products"),
    ),
    info(
        title = "Storefront API",
        version = "0.1.0",
        description = "Catalog API for the storefront",
    )
)]
pub struct ApiDoc;

/// Modifier to override OpenAPI info from config
pub struct SwaggerInfoModifier {
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Modify for SwaggerInfoModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.info.title = self.title.clone();
        openapi.info.version = self.version.clone();
        openapi.info.description = Some(self.description.clone());
    }
}
