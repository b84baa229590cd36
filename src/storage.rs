use crate::errors::{ApiError, ApiResult};
use log::{debug, warn};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const ATTACHMENTS_DIR: &str = "session_attachments";
pub const PROFILE_PICTURES_DIR: &str = "profile_pictures";

/// Flat per-folder file storage rooted at the configured upload directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_dirs(&self) -> std::io::Result<()> {
        for folder in [ATTACHMENTS_DIR, PROFILE_PICTURES_DIR] {
            tokio::fs::create_dir_all(self.root.join(folder)).await?;
        }
        Ok(())
    }

    // Stored names are generated, but reject anything that could escape the folder.
    fn path(&self, folder: &str, name: &str) -> ApiResult<PathBuf> {
        let unsafe_name = name.is_empty()
            || name.contains('/')
            || name.contains('\\')
            || name.contains("..");
        if unsafe_name {
            return Err(ApiError::ValidationError(format!("Invalid stored file name: {}", name)));
        }
        Ok(self.root.join(folder).join(name))
    }

    pub async fn save(&self, folder: &str, name: &str, data: &[u8]) -> ApiResult<()> {
        let path = self.path(folder, name)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, data).await?;
        debug!("Stored {} bytes at {}", data.len(), path.display());
        Ok(())
    }

    pub async fn read(&self, folder: &str, name: &str) -> ApiResult<Vec<u8>> {
        let path = self.path(folder, name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("File {} is referenced but missing on disk", path.display());
                Err(ApiError::NotFoundError("File not found on disk".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Removes a stored file. A file that is already gone is not an error;
    /// the return value tells whether anything was removed.
    pub async fn delete(&self, folder: &str, name: &str) -> ApiResult<bool> {
        let path = self.path(folder, name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Removed {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("File {} already absent", path.display());
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn exists(&self, folder: &str, name: &str) -> ApiResult<bool> {
        let path = self.path(folder, name)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn save_read_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.ensure_dirs().await.unwrap();

        store.save(ATTACHMENTS_DIR, "a.pdf", b"%PDF-1.4").await.unwrap();
        assert!(store.exists(ATTACHMENTS_DIR, "a.pdf").await.unwrap());
        assert_eq!(store.read(ATTACHMENTS_DIR, "a.pdf").await.unwrap(), b"%PDF-1.4");

        assert!(store.delete(ATTACHMENTS_DIR, "a.pdf").await.unwrap());
        assert!(!store.exists(ATTACHMENTS_DIR, "a.pdf").await.unwrap());
    }

    #[actix_web::test]
    async fn delete_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert!(!store.delete(PROFILE_PICTURES_DIR, "gone.png").await.unwrap());
    }

    #[actix_web::test]
    async fn read_of_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let err = store.read(ATTACHMENTS_DIR, "nope.txt").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFoundError(_)));
    }

    #[actix_web::test]
    async fn path_traversal_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        for name in ["../x", "a/b", "", "..", "a\\b"] {
            assert!(store.save(ATTACHMENTS_DIR, name, b"x").await.is_err(), "{}", name);
        }
    }
}
