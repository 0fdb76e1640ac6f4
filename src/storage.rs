use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;
use tokio::fs;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("stored file not found")]
    Missing,
    #[error("stored path escapes the materials directory")]
    OutsideRoot,
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Blob storage for uploaded study materials, addressed by the stored name
/// persisted in `study_materials.file_path`.
#[async_trait]
pub trait MaterialStorage: Send + Sync + 'static {
    /// Writes `bytes` under a fresh random name and returns that name.
    async fn put(&self, bytes: Vec<u8>, extension: &str) -> Result<String, StorageError>;

    async fn read(&self, stored_name: &str) -> Result<Vec<u8>, StorageError>;

    async fn delete(&self, stored_name: &str) -> Result<(), StorageError>;
}

pub struct DiskStorage {
    root: PathBuf,
}

impl DiskStorage {
    /// Creates the directory if needed and pins its canonical form.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        fs::create_dir_all(root.as_ref()).await?;
        let root = fs::canonicalize(root.as_ref()).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn resolve(&self, stored_name: &str) -> Result<PathBuf, StorageError> {
        let candidate = self.root.join(stored_name);
        let canonical = match fs::canonicalize(&candidate).await {
            Ok(path) => path,
            Err(err) if err.kind() == ErrorKind::NotFound => return Err(StorageError::Missing),
            Err(err) => return Err(err.into()),
        };
        if !canonical.starts_with(&self.root) {
            return Err(StorageError::OutsideRoot);
        }
        Ok(canonical)
    }
}

pub fn random_file_stem() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[async_trait]
impl MaterialStorage for DiskStorage {
    async fn put(&self, bytes: Vec<u8>, extension: &str) -> Result<String, StorageError> {
        let stored_name = format!("{}.{}", random_file_stem(), extension);
        fs::write(self.root.join(&stored_name), bytes).await?;
        Ok(stored_name)
    }

    async fn read(&self, stored_name: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(stored_name).await?;
        Ok(fs::read(path).await?)
    }

    async fn delete(&self, stored_name: &str) -> Result<(), StorageError> {
        let path = match self.resolve(stored_name).await {
            Ok(path) => path,
            Err(StorageError::Missing) => return Ok(()),
            Err(err) => return Err(err),
        };
        fs::remove_file(path).await?;
        Ok(())
    }
}
