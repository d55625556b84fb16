//! Upload storage abstraction.

use async_trait::async_trait;

use super::StorageError;

/// A file written under the upload root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Path recorded in the project, `<upload root>/<file_name>`.
    pub path: String,
    /// Server-generated file name.
    pub file_name: String,
    pub size: u64,
}

/// Filesystem operations used by the upload and download flows.
///
/// Implementations must only ever touch paths contained in their upload root.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Write `data` as `file_name` directly under the upload root.
    ///
    /// A failed write must not leave a partial file behind.
    async fn store(&self, file_name: &str, data: &[u8]) -> Result<StoredFile, StorageError>;

    /// Read a previously stored file fully into memory.
    async fn load(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    /// Delete a previously stored file.
    async fn remove(&self, path: &str) -> Result<(), StorageError>;
}
