//! Router error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RouterError {
    #[error("URL error: {0}")]
    Url(#[from] waymark_url::UrlError),

    #[error("Recognition error: {0}")]
    Recognize(#[from] waymark_recognize::RecognizeError),

    #[error("Guard error: {0}")]
    Guard(#[from] waymark_guards::GuardError),

    #[error("Location error: {0}")]
    Location(#[from] waymark_location::LocationError),

    #[error("Storage error: {0}")]
    Storage(#[from] waymark_storage::StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Invalid navigation command: {0}")]
    InvalidCommand(String),
}
