/// URL prefix under which locally stored media is served
pub const MEDIA_ROUTE_PREFIX: &str = "/media";

/// Storage folder for category images
pub const CATEGORY_MEDIA_FOLDER: &str = "categories";

/// Storage folder for product images
pub const PRODUCT_MEDIA_FOLDER: &str = "products";

/// Deterministic file name for a category image
pub fn category_image_file(id: i32) -> String {
    format!("category_{}.jpg", id)
}

/// Deterministic file name for a product image
pub fn product_image_file(id: i32) -> String {
    format!("product_{}.jpg", id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_file_names_are_id_derived() {
        assert_eq!(category_image_file(12), "category_12.jpg");
        assert_eq!(product_image_file(7), "product_7.jpg");
    }
}
