use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use walkdir::WalkDir;

use super::{Checksum, ObjectReader, ObjectStore, ObjectStoreError};

const CHECKSUM_BUFFER_SIZE: usize = 64 * 1024;

/// Local filesystem object store.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Create the root if needed and anchor it as an absolute path.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(root.as_ref())?;
        let root = std::fs::canonicalize(root.as_ref())?;
        Ok(Self { root })
    }

    fn check_path(&self, path: &Path) -> Result<(), ObjectStoreError> {
        let escapes = path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::CurDir));
        if escapes || !path.starts_with(&self.root) {
            return Err(ObjectStoreError::InvalidArgument(format!(
                "{} is outside the storage root",
                path.display()
            )));
        }
        Ok(())
    }
}

fn not_found_or_io(path: &Path, e: std::io::Error) -> ObjectStoreError {
    if e.kind() == ErrorKind::NotFound {
        ObjectStoreError::NotFound(path.display().to_string())
    } else {
        ObjectStoreError::Io(e)
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn put_new(&self, path: &Path, data: Bytes) -> Result<(), ObjectStoreError> {
        self.check_path(path)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // create_new is the collision arbiter; a prior stat would race
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(ObjectStoreError::AlreadyExists(path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let written = async {
            file.write_all(&data).await?;
            file.sync_all().await
        }
        .await;

        if let Err(e) = written {
            drop(file);
            if let Err(cleanup) = tokio::fs::remove_file(path).await {
                tracing::warn!(path = %path.display(), error = %cleanup, "Failed to remove partial file");
            }
            return Err(e.into());
        }
        Ok(())
    }

    async fn open(&self, path: &Path) -> Result<ObjectReader, ObjectStoreError> {
        self.check_path(path)?;
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| not_found_or_io(path, e))?;
        Ok(Box::new(file))
    }

    async fn checksum(&self, path: &Path) -> Result<Checksum, ObjectStoreError> {
        self.check_path(path)?;
        let mut file = tokio::fs::File::open(path)
            .await
            .map_err(|e| not_found_or_io(path, e))?;

        let mut context = md5::Context::new();
        let mut buf = vec![0u8; CHECKSUM_BUFFER_SIZE];
        let mut size_bytes = 0u64;
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            context.consume(&buf[..n]);
            size_bytes += n as u64;
        }

        Ok(Checksum {
            md5_hex: format!("{:x}", context.compute()),
            size_bytes,
        })
    }

    async fn delete(&self, path: &Path) -> Result<(), ObjectStoreError> {
        self.check_path(path)?;
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<PathBuf>, ObjectStoreError> {
        let root = self.root.clone();
        let files = tokio::task::spawn_blocking(move || {
            WalkDir::new(&root)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|entry| match entry {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        tracing::warn!(error = %e, "Skipping unreadable entry");
                        None
                    }
                })
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.into_path())
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| ObjectStoreError::Io(std::io::Error::other(e)))?;

        Ok(files)
    }
}
