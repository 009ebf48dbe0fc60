//! Upload, download and reindex orchestration.
//!
//! Upload plans a path, creates the file exclusively, re-reads it for the
//! checksum and only then allocates a key, so an index entry always points
//! at bytes that were fully written. Download resolves a key and opens the
//! stored file. Reindex backfills keys for files that reached the storage
//! tree without going through upload.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::error::GatewayError;
use crate::keys::KeyAllocator;
use crate::object_store::{client_file_name, ObjectReader, ObjectStore, PathPlanner};
use crate::storage::{Database, FileRecord};

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub project: String,
    pub module: Option<String>,
    pub file_name: String,
    pub data: Bytes,
    /// Store under a random hex name instead of `file_name`.
    pub rename: bool,
}

/// Outcome of a reindex pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReindexStats {
    pub scanned: u64,
    pub indexed: u64,
    /// Already indexed, or not representable as a UTF-8 path.
    pub skipped: u64,
    pub failed: u64,
}

pub struct Indexer {
    db: Database,
    store: Arc<dyn ObjectStore>,
    planner: PathPlanner,
    keys: KeyAllocator,
    max_upload_size: u64,
}

impl Indexer {
    pub fn new(
        db: Database,
        store: Arc<dyn ObjectStore>,
        keys: KeyAllocator,
        max_upload_size: u64,
    ) -> Self {
        let planner = PathPlanner::new(store.root());
        Self {
            db,
            store,
            planner,
            keys,
            max_upload_size,
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn planner(&self) -> &PathPlanner {
        &self.planner
    }

    pub fn max_upload_size(&self) -> u64 {
        self.max_upload_size
    }

    /// Store an upload and return its new key.
    pub async fn upload(&self, request: UploadRequest) -> Result<String, GatewayError> {
        self.upload_at(request, Utc::now()).await
    }

    /// [`upload`](Self::upload) with an explicit upload time, which picks the hour bucket.
    pub async fn upload_at(
        &self,
        request: UploadRequest,
        at: DateTime<Utc>,
    ) -> Result<String, GatewayError> {
        if request.data.len() as u64 > self.max_upload_size {
            return Err(GatewayError::SizeLimitExceeded {
                limit: self.max_upload_size,
            });
        }

        let planned = self.planner.plan(
            &request.project,
            request.module.as_deref(),
            at,
            &request.file_name,
            request.rename,
        )?;
        let path = planned.path;
        let storage_path = path.to_string_lossy().into_owned();

        // Conflict surfaces here, before this request owns anything on disk
        self.store.put_new(&path, request.data).await?;

        let checksum = match self.store.checksum(&path).await {
            Ok(checksum) => checksum,
            Err(e) => {
                self.discard(&path).await;
                return Err(e.into());
            }
        };

        let record = FileRecord {
            original_name: client_file_name(&request.file_name).to_string(),
            stored_name: planned.stored_name,
            storage_path: storage_path.clone(),
            checksum: checksum.md5_hex,
            size_bytes: checksum.size_bytes,
            created_at_ms: at.timestamp_millis(),
        };

        let key = match self.keys.allocate(&self.db, &storage_path, &record) {
            Ok(key) => key,
            Err(e) => {
                self.discard(&path).await;
                return Err(e.into());
            }
        };

        tracing::debug!(
            key = %key,
            path = %storage_path,
            size = record.size_bytes,
            "Stored upload"
        );
        Ok(key)
    }

    /// Resolve a key and open the stored bytes.
    ///
    /// A key whose file has disappeared is reported as `NotFound` rather
    /// than masked; the index and the filesystem can drift apart.
    pub async fn download(&self, key: &str) -> Result<(FileRecord, ObjectReader), GatewayError> {
        let record = self
            .db
            .get_record(key)?
            .ok_or_else(|| GatewayError::NotFound(format!("unknown key '{key}'")))?;

        let reader = self
            .store
            .open(Path::new(&record.storage_path))
            .await
            .map_err(|e| {
                tracing::warn!(
                    key = %key,
                    path = %record.storage_path,
                    error = %e,
                    "Index entry has no readable file"
                );
                GatewayError::from(e)
            })?;

        Ok((record, reader))
    }

    /// Give a key to every stored file that has none.
    ///
    /// Files are matched by storage path against the reverse index, so
    /// running this repeatedly does not mint duplicate keys. Meant to run
    /// while no uploads are in flight: a file written but not yet committed
    /// by a concurrent upload would be indexed twice.
    pub async fn reindex(&self) -> Result<ReindexStats, GatewayError> {
        let mut stats = ReindexStats::default();

        for path in self.store.list().await? {
            stats.scanned += 1;

            let Some(storage_path) = path.to_str() else {
                tracing::warn!(path = %path.display(), "Skipping non UTF-8 path");
                stats.skipped += 1;
                continue;
            };

            match self.db.key_for_path(storage_path) {
                Ok(Some(_)) => {
                    stats.skipped += 1;
                    continue;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(path = %storage_path, error = %e, "Failed to look up path");
                    stats.failed += 1;
                    continue;
                }
            }

            let checksum = match self.store.checksum(&path).await {
                Ok(checksum) => checksum,
                Err(e) => {
                    tracing::warn!(path = %storage_path, error = %e, "Failed to read file");
                    stats.failed += 1;
                    continue;
                }
            };

            let created_at_ms = tokio::fs::metadata(&path)
                .await
                .and_then(|m| m.modified())
                .map(|t| DateTime::<Utc>::from(t).timestamp_millis())
                .unwrap_or_else(|_| Utc::now().timestamp_millis());

            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let record = FileRecord {
                original_name: name.clone(),
                stored_name: name,
                storage_path: storage_path.to_string(),
                checksum: checksum.md5_hex,
                size_bytes: checksum.size_bytes,
                created_at_ms,
            };

            match self.keys.allocate(&self.db, storage_path, &record) {
                Ok(key) => {
                    tracing::debug!(key = %key, path = %storage_path, "Indexed file");
                    stats.indexed += 1;
                }
                Err(e) => {
                    tracing::warn!(path = %storage_path, error = %e, "Failed to index file");
                    stats.failed += 1;
                }
            }
        }

        tracing::info!(
            scanned = stats.scanned,
            indexed = stats.indexed,
            skipped = stats.skipped,
            failed = stats.failed,
            "Reindex complete"
        );
        Ok(stats)
    }

    async fn discard(&self, path: &Path) {
        if let Err(e) = self.store.delete(path).await {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove unindexed file");
        }
    }
}
