//! Media storage backends for processed catalog images
//!
//! Two interchangeable backends sit behind the [`MediaStore`] trait: an
//! S3-compatible object store returning absolute public URLs, and a local
//! filesystem store returning `/media/...` references served by the app.

mod local_store;
mod object_store;

use async_trait::async_trait;

use crate::core::error::Result;

pub use local_store::LocalMediaStore;
pub use object_store::ObjectStoreClient;

/// Storage backend for processed catalog images
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Store image bytes under `<folder>/<file>` and return the public
    /// reference (absolute URL or `/media/...` path) to persist on the record.
    async fn store(
        &self,
        folder: &str,
        file: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String>;

    /// Remove the file behind a previously returned reference.
    ///
    /// References this store did not produce (foreign URLs, other backends)
    /// are ignored, as is a file that is already gone.
    async fn remove(&self, reference: &str) -> Result<()>;
}
