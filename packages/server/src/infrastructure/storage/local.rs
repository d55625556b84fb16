//! Upload root on the local filesystem.
//!
//! Every path handed out or accepted by [`LocalFileStorage`] is checked to be
//! contained in the upload root: new files must be a single plain path
//! component, existing files are canonicalized and compared against the
//! canonical root.

use std::{
    io::ErrorKind,
    path::{Component, Path, PathBuf},
};

use async_trait::async_trait;
use tokio::{fs, io::AsyncWriteExt};

use crate::domain::{FileStorage, StorageError, StoredFile};

/// Default upload root, relative to the server's working directory.
pub const DEFAULT_UPLOAD_ROOT: &str = "uploads/projects";

fn io_error(path: &Path, err: std::io::Error) -> StorageError {
    if err.kind() == ErrorKind::NotFound {
        StorageError::NotFound(path.display().to_string())
    } else {
        StorageError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

/// Filesystem-backed [`FileStorage`].
#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    /// Root as configured; used to build the recorded paths.
    root: PathBuf,
    /// Canonical form of `root`; used for containment checks.
    canonical_root: PathBuf,
}

impl LocalFileStorage {
    /// Open the upload root, creating it if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| io_error(&root, e))?;
        let canonical_root = fs::canonicalize(&root)
            .await
            .map_err(|e| io_error(&root, e))?;
        tracing::info!("Upload root: {}", canonical_root.display());
        Ok(Self {
            root,
            canonical_root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a new file name to its target path.
    ///
    /// Only a single plain component is accepted, so the target is always a
    /// direct child of the upload root.
    fn target_for(&self, file_name: &str) -> Result<PathBuf, StorageError> {
        let mut components = Path::new(file_name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(part)), None) if part == file_name => {
                Ok(self.root.join(part))
            }
            _ => Err(StorageError::OutsideRoot(file_name.to_string())),
        }
    }

    /// Canonicalize an existing path and check it lies under the root.
    async fn ensure_contained(&self, path: &str) -> Result<PathBuf, StorageError> {
        let path = Path::new(path);
        let canonical = fs::canonicalize(path)
            .await
            .map_err(|e| io_error(path, e))?;
        if canonical.starts_with(&self.canonical_root) && canonical != self.canonical_root {
            Ok(canonical)
        } else {
            Err(StorageError::OutsideRoot(path.display().to_string()))
        }
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn store(&self, file_name: &str, data: &[u8]) -> Result<StoredFile, StorageError> {
        let target = self.target_for(file_name)?;

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .await
            .map_err(|e| {
                if e.kind() == ErrorKind::AlreadyExists {
                    StorageError::AlreadyExists(target.display().to_string())
                } else {
                    io_error(&target, e)
                }
            })?;

        let written = async {
            file.write_all(data).await?;
            file.flush().await
        }
        .await;
        drop(file);

        if let Err(e) = written {
            // 書きかけのファイルを残さない
            if let Err(cleanup) = fs::remove_file(&target).await {
                tracing::warn!(
                    "Failed to remove partial file '{}': {}",
                    target.display(),
                    cleanup
                );
            }
            return Err(io_error(&target, e));
        }

        tracing::debug!("Stored {} bytes at '{}'", data.len(), target.display());
        Ok(StoredFile {
            path: target.to_string_lossy().into_owned(),
            file_name: file_name.to_string(),
            size: data.len() as u64,
        })
    }

    async fn load(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let canonical = self.ensure_contained(path).await?;
        fs::read(&canonical)
            .await
            .map_err(|e| io_error(Path::new(path), e))
    }

    async fn remove(&self, path: &str) -> Result<(), StorageError> {
        let canonical = self.ensure_contained(path).await?;
        fs::remove_file(&canonical)
            .await
            .map_err(|e| io_error(Path::new(path), e))?;
        tracing::debug!("Removed '{}'", path);
        Ok(())
    }
}
