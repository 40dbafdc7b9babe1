use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::core::error::{AppError, Result};
use crate::modules::storage::MediaStore;
use crate::shared::constants::MEDIA_ROUTE_PREFIX;

/// Filesystem-backed media store
///
/// Files live under `<root>/<folder>/<file>` and are referenced as
/// `/media/<folder>/<file>`, the prefix the server mounts as static files.
pub struct LocalMediaStore {
    root: PathBuf,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory served under the media route
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a `/media/...` reference back to its path on disk.
    ///
    /// Returns `None` for references outside the media prefix or containing
    /// parent-directory components.
    fn path_for(&self, reference: &str) -> Option<PathBuf> {
        let rest = reference
            .strip_prefix(MEDIA_ROUTE_PREFIX)?
            .strip_prefix('/')?;

        if rest.is_empty() || rest.split('/').any(|seg| seg.is_empty() || seg == "..") {
            return None;
        }

        Some(self.root.join(rest))
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn store(
        &self,
        folder: &str,
        file: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String> {
        let dir = self.root.join(folder);
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            AppError::Internal(format!("Failed to create media dir '{}': {}", dir.display(), e))
        })?;

        let path = dir.join(file);
        tokio::fs::write(&path, &bytes).await.map_err(|e| {
            AppError::Internal(format!("Failed to write media file '{}': {}", path.display(), e))
        })?;

        info!("Stored media file: {}", path.display());
        Ok(format!("{}/{}/{}", MEDIA_ROUTE_PREFIX, folder, file))
    }

    async fn remove(&self, reference: &str) -> Result<()> {
        let Some(path) = self.path_for(reference) else {
            debug!("Ignoring unmanaged media reference: {}", reference);
            return Ok(());
        };

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!("Removed media file: {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Internal(format!(
                "Failed to remove media file '{}': {}",
                path.display(),
                e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_root(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("storefront-media-{}-{}", std::process::id(), name))
    }

    #[tokio::test]
    async fn store_writes_file_and_returns_media_reference() {
        let root = test_root("store");
        let store = LocalMediaStore::new(&root);

        let reference = store
            .store("categories", "category_1.jpg", vec![1, 2, 3], "image/jpeg")
            .await
            .unwrap();

        assert_eq!(reference, "/media/categories/category_1.jpg");
        let on_disk = tokio::fs::read(root.join("categories/category_1.jpg"))
            .await
            .unwrap();
        assert_eq!(on_disk, vec![1, 2, 3]);

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn store_overwrites_existing_file() {
        let root = test_root("overwrite");
        let store = LocalMediaStore::new(&root);

        store
            .store("products", "product_5.jpg", vec![1], "image/jpeg")
            .await
            .unwrap();
        store
            .store("products", "product_5.jpg", vec![9, 9], "image/jpeg")
            .await
            .unwrap();

        let on_disk = tokio::fs::read(root.join("products/product_5.jpg"))
            .await
            .unwrap();
        assert_eq!(on_disk, vec![9, 9]);

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn remove_deletes_managed_file() {
        let root = test_root("remove");
        let store = LocalMediaStore::new(&root);

        let reference = store
            .store("categories", "category_2.jpg", vec![7], "image/jpeg")
            .await
            .unwrap();
        store.remove(&reference).await.unwrap();

        assert!(!root.join("categories/category_2.jpg").exists());

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn remove_is_noop_for_missing_and_unmanaged_references() {
        let store = LocalMediaStore::new(test_root("noop"));

        store.remove("/media/categories/never_written.jpg").await.unwrap();
        store.remove("https://cdn.example.com/pic.jpg").await.unwrap();
        store.remove("").await.unwrap();
    }

    #[tokio::test]
    async fn stored_file_is_served_back_over_http() {
        let root = test_root("serve");
        let store = LocalMediaStore::new(&root);

        let bytes = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x13, 0x37];
        let reference = store
            .store("products", "product_1.jpg", bytes.clone(), "image/jpeg")
            .await
            .unwrap();

        let app = axum::Router::new().nest_service(
            MEDIA_ROUTE_PREFIX,
            tower_http::services::ServeDir::new(store.root()),
        );
        let server = axum_test::TestServer::new(app).unwrap();

        let response = server.get(&reference).await;
        response.assert_status_ok();
        assert_eq!(response.as_bytes().to_vec(), bytes);

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }

    #[test]
    fn path_for_rejects_traversal() {
        let store = LocalMediaStore::new("public/media");

        assert!(store.path_for("/media/../etc/passwd").is_none());
        assert!(store.path_for("/media/categories/../../x").is_none());
        assert!(store.path_for("/other/categories/a.jpg").is_none());
        assert!(store
            .path_for("/media/categories/category_1.jpg")
            .is_some());
    }
}
