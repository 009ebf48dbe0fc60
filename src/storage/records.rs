use redb::ReadableTable;

use super::db::{Database, DatabaseError};
use super::models::FileRecord;
use super::tables::*;

impl Database {
    // ========================================================================
    // Key operations
    // ========================================================================

    /// Commit `record` under `key` unless the key is already taken.
    ///
    /// The existence check and the insert share one write transaction, and
    /// redb admits one writer at a time, so two callers racing on the same
    /// key cannot both see it as free. Returns `false` without writing when
    /// the key exists.
    pub fn insert_record_if_absent(
        &self,
        key: &str,
        record: &FileRecord,
    ) -> Result<bool, DatabaseError> {
        debug_assert!(!key.is_empty(), "key must not be empty");

        let data = rmp_serde::to_vec_named(record)?;
        let write_txn = self.begin_write()?;
        let inserted = {
            let mut table = write_txn.open_table(KEYS)?;
            if table.get(key)?.is_some() {
                false
            } else {
                table.insert(key, data.as_slice())?;

                // First key for a path stays the canonical one
                let mut path_table = write_txn.open_table(PATH_KEYS)?;
                if path_table.get(record.storage_path.as_str())?.is_none() {
                    path_table.insert(record.storage_path.as_str(), key)?;
                }
                true
            }
        };

        if inserted {
            write_txn.commit()?;
        } else {
            write_txn.abort()?;
        }
        Ok(inserted)
    }

    /// Get the record committed under a short key
    pub fn get_record(&self, key: &str) -> Result<Option<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(KEYS)?;

        match table.get(key)? {
            Some(data) => {
                let record: FileRecord = rmp_serde::from_slice(data.value())?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    pub fn contains_key(&self, key: &str) -> Result<bool, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(KEYS)?;
        Ok(table.get(key)?.is_some())
    }

    /// Resolve a storage path to the first key allocated for it
    pub fn key_for_path(&self, path: &str) -> Result<Option<String>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(PATH_KEYS)?;
        Ok(table.get(path)?.map(|v| v.value().to_string()))
    }

    /// All entries in key order
    pub fn list_records(&self) -> Result<Vec<(String, FileRecord)>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(KEYS)?;

        let mut records = Vec::new();
        for result in table.iter()? {
            let (key, value) = result?;
            let record: FileRecord = rmp_serde::from_slice(value.value())?;
            records.push((key.value().to_string(), record));
        }

        Ok(records)
    }
}
