use redb::TableDefinition;

/// Short keys: key -> FileRecord (msgpack)
pub const KEYS: TableDefinition<&str, &[u8]> = TableDefinition::new("keys");

/// Reverse index: storage path -> the first key allocated for it (used by reindex)
pub const PATH_KEYS: TableDefinition<&str, &str> = TableDefinition::new("path_keys");
