//! URL error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UrlError {
    #[error("Cannot parse url '{url}': {reason}")]
    Malformed { url: String, reason: String },

    #[error("Empty path url segment cannot have parameters: '{0}'")]
    EmptySegmentWithParams(String),
}
