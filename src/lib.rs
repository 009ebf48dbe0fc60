//! oss-gateway - A minimal object-storage gateway
//!
//! This crate stores uploads on the local filesystem and hands out short keys for them:
//! - Deterministic, hour-bucketed storage layout with exclusive-create collision handling
//! - Short keys allocated through an atomic conditional insert into a redb index
//! - Token-bucket throttled downloads
//! - REST API with multipart upload support

pub mod api;
pub mod config;
pub mod error;
pub mod indexer;
pub mod keys;
pub mod object_store;
pub mod ratelimit;
pub mod storage;
#[cfg(test)]
pub mod testutil;

use std::sync::Arc;

use config::Config;
use indexer::Indexer;
use keys::KeyAllocator;
use object_store::{LocalStore, ObjectStore};
use storage::Database;

pub use error::GatewayError;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub indexer: Indexer,
}

impl AppState {
    /// Open the index and the storage root named by `config`.
    pub fn open(config: Config) -> anyhow::Result<Self> {
        let store = LocalStore::new(&config.storage.root)?;

        // Canonical paths also catch a data dir reached through a symlink
        std::fs::create_dir_all(&config.node.data_dir)?;
        let data_dir = std::fs::canonicalize(&config.node.data_dir)?;
        if data_dir.starts_with(store.root()) {
            anyhow::bail!(
                "DATA_DIR {} is inside STORAGE_ROOT {}",
                data_dir.display(),
                store.root().display()
            );
        }

        let db = Database::open(&data_dir)?;
        let keys = KeyAllocator::new(&config.keys);
        let indexer = Indexer::new(db, Arc::new(store), keys, config.max_upload_size);
        Ok(Self { config, indexer })
    }
}
