//! Raw upload storage on the local filesystem.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

/// Errors raised while storing uploaded files.
#[derive(Debug, Error)]
#[error("Failed to store upload at {path}: {source}")]
pub struct UploadError {
    path: String,
    #[source]
    source: std::io::Error,
}

/// A stored upload and the reference recorded on its document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUpload {
    /// Public reference, `/uploads/<stored-name>`.
    pub file_url: String,
    /// Location on disk.
    pub path: PathBuf,
}

/// Writes uploaded files below a fixed directory.
#[derive(Debug, Clone)]
pub struct UploadStorage {
    dir: PathBuf,
}

impl UploadStorage {
    /// Store uploads under `dir`, creating it on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write `bytes` under a collision-free name that keeps the original extension.
    pub async fn store(
        &self,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<StoredUpload, UploadError> {
        let stored_name = stored_file_name(original_name);
        let path = self.dir.join(&stored_name);
        let io_error = |source| UploadError {
            path: path.display().to_string(),
            source,
        };

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(io_error)?;
        tokio::fs::write(&path, bytes).await.map_err(io_error)?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "Stored upload");

        Ok(StoredUpload {
            file_url: format!("/uploads/{stored_name}"),
            path,
        })
    }

    /// Delete a stored upload; failures are logged and otherwise ignored.
    pub async fn remove(&self, upload: &StoredUpload) {
        if let Err(error) = tokio::fs::remove_file(&upload.path).await {
            tracing::warn!(path = %upload.path.display(), error = %error, "Failed to remove upload");
        }
    }
}

fn stored_file_name(original_name: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    let suffix = Uuid::new_v4().simple().to_string();
    let stem = format!("{millis}-{}", &suffix[..8]);
    match Path::new(original_name)
        .extension()
        .and_then(|extension| extension.to_str())
    {
        Some(extension) => format!("{stem}.{}", extension.to_lowercase()),
        None => stem,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_name_keeps_lowercase_extension() {
        let name = stored_file_name("Lecture 1.PDF");
        assert!(name.ends_with(".pdf"), "{name}");
        assert!(!name.contains(' '));
        assert_ne!(stored_file_name("a.txt"), stored_file_name("a.txt"));
    }

    #[tokio::test]
    async fn store_and_remove_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = UploadStorage::new(dir.path().join("uploads"));

        let upload = storage.store("notes.txt", b"hello").await.unwrap();
        assert!(upload.file_url.starts_with("/uploads/"));
        assert_eq!(tokio::fs::read(&upload.path).await.unwrap(), b"hello");

        storage.remove(&upload).await;
        assert!(!upload.path.exists());
    }
}
