//! Waymark route recognition
//!
//! Turns a parsed URL tree into a [`RouterStateSnapshot`] by matching it
//! against the route configuration:
//! - route entries are tried in declaration order, first match wins
//! - empty-path entries may match zero segments, also on named outlets
//! - sibling outlets are sorted primary first and must be unique
//!
//! [`RouterStateSnapshot`]: waymark_state::RouterStateSnapshot

mod error;
mod matcher;
mod recognizer;

pub use error::RecognizeError;
pub use matcher::{default_url_matcher, match_route, SegmentMatch};
pub use recognizer::{recognize, Recognizer};

pub type Result<T> = std::result::Result<T, RecognizeError>;
