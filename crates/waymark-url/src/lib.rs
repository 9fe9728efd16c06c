//! Waymark URL model
//!
//! A requested location is held as a tree of segment groups:
//! - each group owns an ordered list of path segments
//! - each group maps outlet names to child groups
//! - the tree carries the shared query parameters and fragment
//!
//! Parsing and printing go through the [`UrlSerializer`] trait so the router
//! never depends on a concrete URL grammar.

mod contains;
mod encoding;
mod error;
mod serializer;
mod tree;

pub use contains::{contains_tree, IsActiveMatchOptions, MatrixParamsMatch, PathsMatch, QueryParamsMatch};
pub use error::UrlError;
pub use serializer::{DefaultUrlSerializer, UrlSerializer};
pub use tree::{
    equal_path, equal_segments, shallow_equal, Params, UrlSegment, UrlSegmentGroup, UrlTree,
    PRIMARY_OUTLET,
};

pub type Result<T> = std::result::Result<T, UrlError>;
