use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::features::categories::models::Category;

/// Response DTO for category
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CategoryResponseDto {
    pub id: i32,
    pub parent_id: Option<i32>,
    pub name: String,
    pub description: Option<String>,
    pub picture: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Category> for CategoryResponseDto {
    fn from(c: Category) -> Self {
        Self {
            id: c.id,
            parent_id: c.parent_id,
            name: c.name,
            description: c.description,
            picture: c.picture,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

/// Request DTO for creating a category
///
/// `picture` accepts an embedded `data:...;base64,` payload (resized and
/// stored server-side) or an already-hosted `http(s)` URL.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateCategoryDto {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<i32>,
    pub picture: Option<String>,
}

/// Request DTO for updating a category (merge-update: absent fields keep
/// their current values)
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateCategoryDto {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub parent_id: Option<i32>,
    pub picture: Option<String>,
}

/// Response DTO for category deletion
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteCategoryResponseDto {
    /// False when deletion was refused because of associated records
    pub deleted: bool,
}

/// Response DTO for the category tree (hierarchical structure with
/// recursive product counts)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(no_recursion)]
pub struct CategoryTreeDto {
    pub id: i32,
    pub parent_id: Option<i32>,
    pub name: String,
    pub description: Option<String>,
    pub picture: Option<String>,
    /// Products attached to this category plus all of its descendants
    #[serde(rename = "productCount")]
    pub product_count: i64,
    pub children: Vec<CategoryTreeDto>,
}

impl CategoryTreeDto {
    /// Build the nested tree from the flat category rows and per-category
    /// direct product counts.
    ///
    /// Categories are grouped by parent id first, then each root (no
    /// `parent_id`) is expanded depth-first; `product_count` accumulates
    /// post-order. A category whose `parent_id` does not resolve to a row in
    /// the input is dropped from the output entirely, matching the
    /// storefront's behavior. Sibling order follows input order, and a
    /// cyclic parent chain is unreachable from any root, so construction
    /// never loops.
    pub fn build_tree(
        categories: Vec<Category>,
        direct_counts: &HashMap<i32, i64>,
    ) -> Vec<CategoryTreeDto> {
        let present: HashSet<i32> = categories.iter().map(|c| c.id).collect();

        let mut children_of: HashMap<i32, Vec<Category>> = HashMap::new();
        let mut roots: Vec<Category> = Vec::new();

        for category in categories {
            match category.parent_id {
                Some(parent_id) if present.contains(&parent_id) => {
                    children_of.entry(parent_id).or_default().push(category);
                }
                // Dangling parent reference: not a root, nobody's child
                Some(_) => {}
                None => roots.push(category),
            }
        }

        roots
            .into_iter()
            .map(|root| Self::build_node(root, &mut children_of, direct_counts))
            .collect()
    }

    fn build_node(
        category: Category,
        children_of: &mut HashMap<i32, Vec<Category>>,
        direct_counts: &HashMap<i32, i64>,
    ) -> CategoryTreeDto {
        let children: Vec<CategoryTreeDto> = children_of
            .remove(&category.id)
            .unwrap_or_default()
            .into_iter()
            .map(|child| Self::build_node(child, children_of, direct_counts))
            .collect();

        let product_count = direct_counts.get(&category.id).copied().unwrap_or(0)
            + children.iter().map(|c| c.product_count).sum::<i64>();

        CategoryTreeDto {
            id: category.id,
            parent_id: category.parent_id,
            name: category.name,
            description: category.description,
            picture: category.picture,
            product_count,
            children,
        }
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

    fn counts(pairs: &[(i32, i64)]) -> HashMap<i32, i64> {
        pairs.iter().copied().collect()
    }

    fn node_count(nodes: &[CategoryTreeDto]) -> usize {
        nodes
            .iter()
            .map(|n| 1 + node_count(&n.children))
            .sum::<usize>()
    }

    #[test]
    fn builds_nested_tree_with_recursive_counts() {
        // Worked example: 1 <- 2, 3 dangles off missing parent 99
        let tree = CategoryTreeDto::build_tree(
            vec![category(1, None), category(2, Some(1)), category(3, Some(99))],
            &counts(&[(1, 2), (2, 1)]),
        );

        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].id, 1);
        assert_eq!(tree[0].product_count, 3);
        assert_eq!(tree[0].children.len(), 1);
        assert_eq!(tree[0].children[0].id, 2);
        assert_eq!(tree[0].children[0].product_count, 1);
    }

    #[test]
    fn drops_category_with_dangling_parent() {
        let tree = CategoryTreeDto::build_tree(
            vec![category(1, None), category(3, Some(99))],
            &counts(&[(3, 5)]),
        );

        assert_eq!(node_count(&tree), 1);
        assert_eq!(tree[0].id, 1);
        assert_eq!(tree[0].product_count, 0);
    }

    #[test]
    fn every_connected_category_appears_exactly_once() {
        let input = vec![
            category(1, None),
            category(2, Some(1)),
            category(3, Some(1)),
            category(4, Some(2)),
            category(5, None),
        ];
        let tree = CategoryTreeDto::build_tree(input, &HashMap::new());

        assert_eq!(node_count(&tree), 5);

        fn collect_ids(nodes: &[CategoryTreeDto], into: &mut Vec<i32>) {
            for n in nodes {
                into.push(n.id);
                collect_ids(&n.children, into);
            }
        }
        let mut ids = Vec::new();
        collect_ids(&tree, &mut ids);
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn leaf_count_is_direct_count_and_internal_nodes_accumulate() {
        let tree = CategoryTreeDto::build_tree(
            vec![
                category(1, None),
                category(2, Some(1)),
                category(3, Some(2)),
            ],
            &counts(&[(1, 1), (2, 2), (3, 4)]),
        );

        let root = &tree[0];
        let mid = &root.children[0];
        let leaf = &mid.children[0];
        assert_eq!(leaf.product_count, 4);
        assert_eq!(mid.product_count, 6);
        assert_eq!(root.product_count, 7);
    }

    #[test]
    fn sibling_order_follows_input_order() {
        let tree = CategoryTreeDto::build_tree(
            vec![
                category(1, None),
                category(7, Some(1)),
                category(3, Some(1)),
                category(5, Some(1)),
            ],
            &HashMap::new(),
        );

        let child_ids: Vec<i32> = tree[0].children.iter().map(|c| c.id).collect();
        assert_eq!(child_ids, vec![7, 3, 5]);
    }

    #[test]
    fn cyclic_parents_disappear_without_looping() {
        let tree = CategoryTreeDto::build_tree(
            vec![category(1, None), category(2, Some(3)), category(3, Some(2))],
            &HashMap::new(),
        );

        assert_eq!(node_count(&tree), 1);
        assert_eq!(tree[0].id, 1);
    }

    #[test]
    fn product_count_serializes_camel_cased() {
        let tree = CategoryTreeDto::build_tree(vec![category(1, None)], &counts(&[(1, 2)]));
        let value = serde_json::to_value(&tree[0]).unwrap();
        assert_eq!(value["productCount"], 2);
    }
}
