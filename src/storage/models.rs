use serde::{Deserialize, Serialize};

/// Metadata for one stored object, as persisted in the index.
///
/// Records are immutable: they are written once when a key is committed and
/// never updated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// File name as supplied by the client.
    pub original_name: String,
    /// Name on disk; equals `original_name` unless the upload was renamed.
    pub stored_name: String,
    /// Absolute path of the stored bytes.
    pub storage_path: String,
    /// Hex-encoded MD5 of the bytes on disk.
    pub checksum: String,
    pub size_bytes: u64,
    pub created_at_ms: i64,
}
