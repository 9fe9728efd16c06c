//! Recognition error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecognizeError {
    #[error("Cannot match any routes. URL segment: '{segment_group}'")]
    NoMatch { segment_group: String },

    #[error("Two segments cannot have the same outlet name: '{first}' and '{second}'")]
    OutletCollision {
        outlet: String,
        first: String,
        second: String,
    },
}
