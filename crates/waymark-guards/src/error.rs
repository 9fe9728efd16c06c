//! Guard and resolver error types

use thiserror::Error;
use waymark_state::{BoxError, StateError, Token};

#[derive(Error, Debug)]
pub enum GuardError {
    #[error("Provider lookup failed: {0}")]
    Provider(#[from] StateError),

    #[error("Guard '{token}' failed: {source}")]
    Guard { token: Token, source: BoxError },

    #[error("Guard '{token}' completed without a value")]
    EmptyGuard { token: Token },

    #[error("Resolver '{key}' failed: {source}")]
    Resolver { key: String, source: BoxError },
}
