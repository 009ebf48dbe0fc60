mod layout;
mod local;

pub use layout::{client_file_name, PathPlanner, PlannedPath};
pub use local::LocalStore;

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncRead;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Object already exists: {0}")]
    AlreadyExists(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// A readable handle on stored bytes.
pub type ObjectReader = Box<dyn AsyncRead + Send + Unpin>;

/// Digest of the bytes actually present on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checksum {
    pub md5_hex: String,
    pub size_bytes: u64,
}

/// Abstraction over the object storage backend.
/// Paths are absolute and must live under `root()`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    fn root(&self) -> &Path;
    /// Create `path` and write `data` to it, failing with `AlreadyExists`
    /// instead of overwriting.
    async fn put_new(&self, path: &Path, data: Bytes) -> Result<(), ObjectStoreError>;
    async fn open(&self, path: &Path) -> Result<ObjectReader, ObjectStoreError>;
    async fn checksum(&self, path: &Path) -> Result<Checksum, ObjectStoreError>;
    async fn delete(&self, path: &Path) -> Result<(), ObjectStoreError>;
    /// Every regular file under the root.
    async fn list(&self) -> Result<Vec<PathBuf>, ObjectStoreError>;
}
