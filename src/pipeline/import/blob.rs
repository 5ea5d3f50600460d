//! Blob store for raw uploads.
//!
//! Layout: `{root}/{bucket}/{owner}/{id}_{sanitized_name}`. The stored
//! reference is `(bucket, "{owner}/{id}_{sanitized_name}")`.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::format::sanitize_file_name;
use super::StorageError;
use crate::models::{OwnerId, StorageRef};

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes under a path derived from owner and id. Never overwrites.
    async fn put(
        &self,
        owner: &OwnerId,
        id: &Uuid,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<StorageRef, StorageError>;

    async fn get(&self, storage_ref: &StorageRef) -> Result<Vec<u8>, StorageError>;

    /// Remove a blob. Missing blobs are not an error.
    async fn delete(&self, storage_ref: &StorageRef) -> Result<(), StorageError>;
}

/// Filesystem-backed blob store.
pub struct FsBlobStore {
    root: PathBuf,
    bucket: String,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>, bucket: &str) -> Self {
        Self {
            root: root.into(),
            bucket: bucket.to_string(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Resolve a reference to a path under this store's bucket directory.
    fn resolve(&self, storage_ref: &StorageRef) -> Result<PathBuf, StorageError> {
        if storage_ref.bucket != self.bucket {
            return Err(StorageError::UnsafePath(storage_ref.to_string()));
        }
        let relative = Path::new(&storage_ref.path);
        let is_plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if storage_ref.path.is_empty() || !is_plain {
            return Err(StorageError::UnsafePath(storage_ref.to_string()));
        }
        Ok(self.root.join(&self.bucket).join(relative))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(
        &self,
        owner: &OwnerId,
        id: &Uuid,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<StorageRef, StorageError> {
        let storage_ref = StorageRef {
            bucket: self.bucket.clone(),
            path: format!("{}/{}_{}", owner, id, sanitize_file_name(file_name)),
        };
        let full_path = self.resolve(&storage_ref)?;

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&full_path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => {
                    StorageError::AlreadyExists(storage_ref.to_string())
                }
                _ => StorageError::Io(e),
            })?;
        file.write_all(bytes).await?;
        file.sync_all().await?;

        tracing::debug!(
            storage_ref = %storage_ref,
            size = bytes.len(),
            "Blob stored"
        );
        Ok(storage_ref)
    }

    async fn get(&self, storage_ref: &StorageRef) -> Result<Vec<u8>, StorageError> {
        let full_path = self.resolve(storage_ref)?;
        fs::read(&full_path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(storage_ref.to_string()),
            _ => StorageError::Io(e),
        })
    }

    async fn delete(&self, storage_ref: &StorageRef) -> Result<(), StorageError> {
        let full_path = self.resolve(storage_ref)?;
        match fs::remove_file(&full_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> OwnerId {
        OwnerId::parse("user-1").unwrap()
    }

    #[tokio::test]
    async fn put_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path(), "originals");
        let id = Uuid::new_v4();

        let storage_ref = store
            .put(&owner(), &id, "Mein Brief.jpg", b"jpeg-bytes")
            .await
            .unwrap();

        assert_eq!(storage_ref.bucket, "originals");
        assert_eq!(storage_ref.path, format!("user-1/{id}_Mein_Brief.jpg"));
        assert_eq!(store.get(&storage_ref).await.unwrap(), b"jpeg-bytes");
        assert!(dir
            .path()
            .join("originals")
            .join("user-1")
            .join(format!("{id}_Mein_Brief.jpg"))
            .exists());
    }

    #[tokio::test]
    async fn traversal_in_file_name_stays_inside_owner_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path(), "originals");
        let id = Uuid::new_v4();

        let storage_ref = store
            .put(&owner(), &id, "../../../escape.png", b"x")
            .await
            .unwrap();
        assert_eq!(storage_ref.path, format!("user-1/{id}_escape.png"));
    }

    #[tokio::test]
    async fn same_id_is_never_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path(), "originals");
        let id = Uuid::new_v4();

        store.put(&owner(), &id, "a.png", b"first").await.unwrap();
        let err = store.put(&owner(), &id, "a.png", b"second").await.unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn get_rejects_foreign_bucket_and_dotdot() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path(), "originals");

        let foreign = StorageRef {
            bucket: "other".into(),
            path: "user-1/x.png".into(),
        };
        assert!(matches!(
            store.get(&foreign).await,
            Err(StorageError::UnsafePath(_))
        ));

        let dotdot = StorageRef {
            bucket: "originals".into(),
            path: "../secrets".into(),
        };
        assert!(matches!(
            store.get(&dotdot).await,
            Err(StorageError::UnsafePath(_))
        ));
    }

    #[tokio::test]
    async fn missing_blob_is_not_found_and_delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path(), "originals");
        let id = Uuid::new_v4();

        let storage_ref = store.put(&owner(), &id, "a.pdf", b"%PDF").await.unwrap();
        store.delete(&storage_ref).await.unwrap();
        assert!(matches!(
            store.get(&storage_ref).await,
            Err(StorageError::NotFound(_))
        ));
        store.delete(&storage_ref).await.unwrap();
    }
}
