//! Location error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LocationError {
    #[error("Storage error: {0}")]
    Storage(#[from] waymark_storage::StorageError),

    #[error("Invalid history state: {0}")]
    InvalidState(#[from] serde_json::Error),

    #[error("History position {0} is out of range")]
    OutOfRange(i64),
}
