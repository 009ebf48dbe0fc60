//! Short retrieval keys.
//!
//! A key is a run of characters drawn uniformly from a fixed charset. The
//! index decides uniqueness: a candidate only becomes a key when the index
//! accepts it through its conditional insert, so concurrent allocators can
//! never hand out the same key twice.
//!
//! Allocation is bounded. Each length gets `max_attempts` candidates; when
//! all of them collide the length grows by one, up to `max_length`, and then
//! allocation gives up with [`KeyError::Exhausted`].

use rand::Rng;
use thiserror::Error;

use crate::config::{KeyConfig, DEFAULT_KEY_CHARSET};
use crate::storage::{Database, DatabaseError, FileRecord};

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Key space exhausted after {attempts} attempts")]
    Exhausted { attempts: u32 },
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

#[derive(Debug, Clone)]
pub struct KeyAllocator {
    charset: Vec<char>,
    length: usize,
    max_attempts: u32,
    max_length: usize,
}

impl KeyAllocator {
    pub fn new(config: &KeyConfig) -> Self {
        let charset = if config.charset.is_empty() {
            DEFAULT_KEY_CHARSET
        } else {
            config.charset.as_str()
        };
        Self {
            charset: charset.chars().collect(),
            length: config.length.max(1),
            max_attempts: config.max_attempts.max(1),
            max_length: config.max_length.max(config.length),
        }
    }

    pub fn charset(&self) -> &[char] {
        &self.charset
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Draw a candidate key of `length` characters.
    pub fn candidate(&self, length: usize) -> String {
        let mut rng = rand::thread_rng();
        (0..length)
            .map(|_| self.charset[rng.gen_range(0..self.charset.len())])
            .collect()
    }

    /// Allocate a fresh key and commit `record` under it.
    ///
    /// `seed` only labels the allocation in logs. On success the key is
    /// already durable in `db`.
    pub fn allocate(
        &self,
        db: &Database,
        seed: &str,
        record: &FileRecord,
    ) -> Result<String, KeyError> {
        let mut attempts = 0u32;

        for length in self.length..=self.max_length {
            for _ in 0..self.max_attempts {
                attempts += 1;
                let key = self.candidate(length);
                if db.insert_record_if_absent(&key, record)? {
                    tracing::debug!(key = %key, seed = %seed, attempts, "Allocated key");
                    return Ok(key);
                }
                tracing::debug!(key = %key, seed = %seed, "Key collision");
            }
            if length < self.max_length {
                tracing::warn!(
                    length,
                    next_length = length + 1,
                    "Key space crowded, growing key length"
                );
            }
        }

        tracing::error!(seed = %seed, attempts, "Key space exhausted");
        Err(KeyError::Exhausted { attempts })
    }
}
