//! Shared test helpers for in-crate tests.

use std::sync::Arc;

use crate::config::{Config, KeyConfig, NodeConfig, StorageConfig};
use crate::AppState;

/// Create a test AppState with a temporary index and storage root.
pub fn test_state(temp_dir: &tempfile::TempDir) -> Arc<AppState> {
    test_state_with(temp_dir, |_| {})
}

/// Like [`test_state`], letting the caller adjust the configuration first.
pub fn test_state_with(
    temp_dir: &tempfile::TempDir,
    configure: impl FnOnce(&mut Config),
) -> Arc<AppState> {
    let data_dir = temp_dir.path().join("data");
    let storage_root = temp_dir.path().join("storage");

    let mut config = Config {
        node: NodeConfig {
            bind_address: "127.0.0.1:0".to_string(),
            data_dir: data_dir.to_string_lossy().to_string(),
        },
        storage: StorageConfig {
            root: storage_root.to_string_lossy().to_string(),
            rename: false,
        },
        keys: KeyConfig::default(),
        default_rate: 0,
        max_upload_size: 1024 * 1024, // 1MB for tests
    };
    configure(&mut config);

    Arc::new(AppState::open(config).expect("Failed to open test state"))
}
