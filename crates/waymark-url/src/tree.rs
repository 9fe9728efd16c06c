//! URL tree data structures

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::serializer::{DefaultUrlSerializer, UrlSerializer};

/// Name of the default, unnamed outlet.
pub const PRIMARY_OUTLET: &str = "primary";

/// Path, matrix and query parameters. Keys are kept sorted so two bags with the
/// same entries always compare and print the same way.
pub type Params = BTreeMap<String, String>;

/// A single path segment with its matrix parameters, e.g. `user;flag=1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UrlSegment {
    pub path: String,
    #[serde(default)]
    pub parameters: Params,
}

impl UrlSegment {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            parameters: Params::new(),
        }
    }

    pub fn with_params(path: impl Into<String>, parameters: Params) -> Self {
        Self {
            path: path.into(),
            parameters,
        }
    }
}

impl fmt::Display for UrlSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&DefaultUrlSerializer::serialize_segment(self))
    }
}

/// A fragment of the URL tree: own segments plus one child group per outlet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlSegmentGroup {
    pub segments: Vec<UrlSegment>,
    #[serde(default)]
    pub children: BTreeMap<String, UrlSegmentGroup>,
}

impl UrlSegmentGroup {
    pub fn new(segments: Vec<UrlSegment>, children: BTreeMap<String, UrlSegmentGroup>) -> Self {
        Self { segments, children }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Group holding only the given segments under no outlets.
    pub fn from_segments(segments: Vec<UrlSegment>) -> Self {
        Self {
            segments,
            children: BTreeMap::new(),
        }
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn number_of_children(&self) -> usize {
        self.children.len()
    }

    pub fn primary(&self) -> Option<&UrlSegmentGroup> {
        self.children.get(PRIMARY_OUTLET)
    }

    /// Children ordered primary first, then by outlet name.
    pub fn outlets(&self) -> Vec<(&str, &UrlSegmentGroup)> {
        let mut outlets: Vec<(&str, &UrlSegmentGroup)> = Vec::with_capacity(self.children.len());
        if let Some(primary) = self.primary() {
            outlets.push((PRIMARY_OUTLET, primary));
        }
        outlets.extend(
            self.children
                .iter()
                .filter(|(name, _)| name.as_str() != PRIMARY_OUTLET)
                .map(|(name, group)| (name.as_str(), group)),
        );
        outlets
    }

    /// True when the group carries neither segments nor children.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty() && self.children.is_empty()
    }
}

/// A parsed URL: root segment group, query parameters and fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlTree {
    pub root: UrlSegmentGroup,
    #[serde(default)]
    pub query_params: Params,
    #[serde(default)]
    pub fragment: Option<String>,
}

impl UrlTree {
    pub fn new(root: UrlSegmentGroup, query_params: Params, fragment: Option<String>) -> Self {
        Self {
            root,
            query_params,
            fragment,
        }
    }

    /// The tree for `/`.
    pub fn root_url() -> Self {
        Self::default()
    }

    /// Builds `/a/b/c` style trees where every segment lives in the primary outlet.
    pub fn from_primary_segments(segments: Vec<UrlSegment>) -> Self {
        let mut root = UrlSegmentGroup::empty();
        if !segments.is_empty() {
            root.children.insert(
                PRIMARY_OUTLET.to_string(),
                UrlSegmentGroup::from_segments(segments),
            );
        }
        Self {
            root,
            query_params: Params::new(),
            fragment: None,
        }
    }
}

impl fmt::Display for UrlTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&DefaultUrlSerializer.serialize(self))
    }
}

/// Key-by-key equality of two parameter bags.
pub fn shallow_equal(a: &Params, b: &Params) -> bool {
    a == b
}

/// Segment paths equal, matrix parameters ignored.
pub fn equal_path(a: &[UrlSegment], b: &[UrlSegment]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.path == y.path)
}

/// Segment paths and matrix parameters equal.
pub fn equal_segments(a: &[UrlSegment], b: &[UrlSegment]) -> bool {
    equal_path(a, b) && a.iter().zip(b).all(|(x, y)| x.parameters == y.parameters)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outlets_primary_first() {
        let mut group = UrlSegmentGroup::empty();
        group
            .children
            .insert("aux".to_string(), UrlSegmentGroup::from_segments(vec![UrlSegment::new("a")]));
        group.children.insert(
            PRIMARY_OUTLET.to_string(),
            UrlSegmentGroup::from_segments(vec![UrlSegment::new("b")]),
        );
        group
            .children
            .insert("ads".to_string(), UrlSegmentGroup::from_segments(vec![UrlSegment::new("c")]));

        let names: Vec<&str> = group.outlets().iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["primary", "ads", "aux"]);
    }

    #[test]
    fn test_equal_path_ignores_matrix_params() {
        let mut params = Params::new();
        params.insert("x".to_string(), "1".to_string());

        let a = vec![UrlSegment::with_params("team", params)];
        let b = vec![UrlSegment::new("team")];

        assert!(equal_path(&a, &b));
        assert!(!equal_segments(&a, &b));
    }
}
