use thiserror::Error;

use crate::keys::KeyError;
use crate::object_store::ObjectStoreError;
use crate::storage::DatabaseError;

/// Every way an upload, download or reindex can fail.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("InvalidArgument: {0}")]
    InvalidArgument(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("NotFound: {0}")]
    NotFound(String),
    #[error("IOFailure: {0}")]
    Io(#[from] std::io::Error),
    #[error("SizeLimitExceeded: upload exceeds the maximum of {limit} bytes")]
    SizeLimitExceeded { limit: u64 },
    #[error("CapacityExhausted: no free key after {attempts} attempts")]
    CapacityExhausted { attempts: u32 },
    #[error("IndexFailure: {0}")]
    Index(#[from] DatabaseError),
}

impl From<ObjectStoreError> for GatewayError {
    fn from(e: ObjectStoreError) -> Self {
        match e {
            ObjectStoreError::Io(e) => GatewayError::Io(e),
            ObjectStoreError::NotFound(path) => {
                GatewayError::NotFound(format!("no stored file at {path}"))
            }
            ObjectStoreError::AlreadyExists(path) => {
                GatewayError::Conflict(format!("a file is already stored at {path}"))
            }
            ObjectStoreError::InvalidArgument(msg) => GatewayError::InvalidArgument(msg),
        }
    }
}

impl From<KeyError> for GatewayError {
    fn from(e: KeyError) -> Self {
        match e {
            KeyError::Exhausted { attempts } => GatewayError::CapacityExhausted { attempts },
            KeyError::Database(e) => GatewayError::Index(e),
        }
    }
}
