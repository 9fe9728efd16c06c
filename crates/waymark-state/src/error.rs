//! Route state error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("No {kind} provider registered for token '{token}'")]
    MissingProvider { kind: &'static str, token: String },
}
