use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::features::categories::models::Category;
use crate::features::products::models::Product;

/// Response DTO for product
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductResponseDto {
    pub id: i32,
    pub category_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub picture: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Product> for ProductResponseDto {
    fn from(p: Product) -> Self {
        Self {
            id: p.id,
            category_id: p.category_id,
            name: p.name,
            description: p.description,
            price: p.price,
            picture: p.picture,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

/// Request DTO for creating a product
///
/// `picture` accepts an embedded `data:...;base64,` payload (resized and
/// stored server-side) or an already-hosted `http(s)` URL.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateProductDto {
    pub category_id: i32,
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub price: Decimal,
    pub picture: Option<String>,
}

/// Request DTO for updating a product (merge-update: absent fields keep
/// their current values)
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateProductDto {
    pub category_id: Option<i32>,
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub picture: Option<String>,
}

/// Response DTO for product deletion
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteProductResponseDto {
    pub deleted: bool,
}

/// A root category carrying the flattened union of its own products and
/// its direct children's products
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CategoryProductsDto {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub picture: Option<String>,
    pub products: Vec<ProductResponseDto>,
}

impl CategoryProductsDto {
    /// Assemble the product listing: one entry per root category, products
    /// of the root first, then each direct child's products in child order.
    pub fn assemble(
        roots: Vec<Category>,
        children: Vec<Category>,
        mut products_by_category: HashMap<i32, Vec<Product>>,
    ) -> Vec<CategoryProductsDto> {
        let mut children_of: HashMap<i32, Vec<i32>> = HashMap::new();
        for child in &children {
            if let Some(parent_id) = child.parent_id {
                children_of.entry(parent_id).or_default().push(child.id);
            }
        }

        roots
            .into_iter()
            .map(|root| {
                let mut products: Vec<Product> =
                    products_by_category.remove(&root.id).unwrap_or_default();
                for child_id in children_of.remove(&root.id).unwrap_or_default() {
                    products.extend(products_by_category.remove(&child_id).unwrap_or_default());
                }

                CategoryProductsDto {
                    id: root.id,
                    name: root.name,
                    description: root.description,
                    picture: root.picture,
                    products: products.into_iter().map(Into::into).collect(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(id: i32, parent_id: Option<i32>) -> Category {
        let now = Utc::now();
        Category {
            id,
            parent_id,
            name: format!("category-{}", id),
            description: None,
            picture: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn product(id: i32, category_id: i32) -> Product {
        let now = Utc::now();
        Product {
            id,
            category_id,
            name: format!("product-{}", id),
            description: None,
            price: Decimal::new(1999, 2),
            picture: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn group(products: Vec<Product>) -> HashMap<i32, Vec<Product>> {
        let mut map: HashMap<i32, Vec<Product>> = HashMap::new();
        for p in products {
            map.entry(p.category_id).or_default().push(p);
        }
        map
    }

    #[test]
    fn root_carries_own_and_child_products() {
        let listing = CategoryProductsDto::assemble(
            vec![category(1, None)],
            vec![category(2, Some(1))],
            group(vec![product(10, 1), product(11, 2), product(12, 2)]),
        );

        assert_eq!(listing.len(), 1);
        let ids: Vec<i32> = listing[0].products.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![10, 11, 12]);
    }

    #[test]
    fn own_products_come_before_child_products() {
        let listing = CategoryProductsDto::assemble(
            vec![category(1, None)],
            vec![category(2, Some(1)), category(3, Some(1))],
            group(vec![product(20, 2), product(30, 3), product(10, 1)]),
        );

        let ids: Vec<i32> = listing[0].products.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![10, 20, 30]);
    }

    #[test]
    fn roots_without_products_are_listed_empty() {
        let listing = CategoryProductsDto::assemble(
            vec![category(1, None), category(4, None)],
            vec![],
            HashMap::new(),
        );

        assert_eq!(listing.len(), 2);
        assert!(listing.iter().all(|c| c.products.is_empty()));
    }

    #[test]
    fn grandchild_products_are_not_flattened_in() {
        // Only one level deep: the listing unions root + direct children
        let listing = CategoryProductsDto::assemble(
            vec![category(1, None)],
            vec![category(2, Some(1)), category(3, Some(2))],
            group(vec![product(30, 3)]),
        );

        assert!(listing[0].products.is_empty());
    }
}
