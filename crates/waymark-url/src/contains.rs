//! URL containment checks used to decide whether a URL is "active"

use serde::{Deserialize, Serialize};

use crate::tree::{equal_path, Params, UrlSegment, UrlSegmentGroup, UrlTree, PRIMARY_OUTLET};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathsMatch {
    /// Both trees must have the same shape and segments.
    Exact,
    /// The candidate may be a prefix of the container.
    Subset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryParamsMatch {
    Exact,
    Subset,
    Ignored,
}

pub type MatrixParamsMatch = QueryParamsMatch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsActiveMatchOptions {
    pub paths: PathsMatch,
    pub query_params: QueryParamsMatch,
    pub matrix_params: MatrixParamsMatch,
    /// When true the fragments must be equal.
    pub exact_fragment: bool,
}

impl IsActiveMatchOptions {
    /// Same paths, same query parameters; matrix params and fragment ignored.
    pub fn exact() -> Self {
        Self {
            paths: PathsMatch::Exact,
            query_params: QueryParamsMatch::Exact,
            matrix_params: QueryParamsMatch::Ignored,
            exact_fragment: false,
        }
    }

    /// Prefix paths, subset of query parameters; matrix params and fragment ignored.
    pub fn subset() -> Self {
        Self {
            paths: PathsMatch::Subset,
            query_params: QueryParamsMatch::Subset,
            matrix_params: QueryParamsMatch::Ignored,
            exact_fragment: false,
        }
    }
}

impl From<bool> for IsActiveMatchOptions {
    fn from(exact: bool) -> Self {
        if exact {
            Self::exact()
        } else {
            Self::subset()
        }
    }
}

fn params_match(container: &Params, containee: &Params, mode: QueryParamsMatch) -> bool {
    match mode {
        QueryParamsMatch::Exact => container == containee,
        QueryParamsMatch::Subset => containee
            .iter()
            .all(|(key, value)| container.get(key) == Some(value)),
        QueryParamsMatch::Ignored => true,
    }
}

fn matrix_params_match(
    container: &[UrlSegment],
    containee: &[UrlSegment],
    mode: MatrixParamsMatch,
) -> bool {
    containee
        .iter()
        .zip(container)
        .all(|(inner, outer)| params_match(&outer.parameters, &inner.parameters, mode))
}

fn equal_groups(container: &UrlSegmentGroup, containee: &UrlSegmentGroup, mode: MatrixParamsMatch) -> bool {
    if !equal_path(&container.segments, &containee.segments) {
        return false;
    }
    if !matrix_params_match(&container.segments, &containee.segments, mode) {
        return false;
    }
    if container.number_of_children() != containee.number_of_children() {
        return false;
    }
    containee.children.iter().all(|(outlet, child)| {
        container
            .children
            .get(outlet)
            .is_some_and(|outer| equal_groups(outer, child, mode))
    })
}

fn contains_group(container: &UrlSegmentGroup, containee: &UrlSegmentGroup, mode: MatrixParamsMatch) -> bool {
    contains_group_helper(container, containee, &containee.segments, mode)
}

fn contains_group_helper(
    container: &UrlSegmentGroup,
    containee: &UrlSegmentGroup,
    containee_paths: &[UrlSegment],
    mode: MatrixParamsMatch,
) -> bool {
    let own = container.segments.len();
    let wanted = containee_paths.len();

    if own > wanted {
        let current = &container.segments[..wanted];
        equal_path(current, containee_paths)
            && !containee.has_children()
            && matrix_params_match(current, containee_paths, mode)
    } else if own == wanted {
        if !equal_path(&container.segments, containee_paths)
            || !matrix_params_match(&container.segments, containee_paths, mode)
        {
            return false;
        }
        containee.children.iter().all(|(outlet, child)| {
            container
                .children
                .get(outlet)
                .is_some_and(|outer| contains_group(outer, child, mode))
        })
    } else {
        let (current, next) = containee_paths.split_at(own);
        if !equal_path(&container.segments, current)
            || !matrix_params_match(&container.segments, current, mode)
        {
            return false;
        }
        match container.children.get(PRIMARY_OUTLET) {
            Some(primary) => contains_group_helper(primary, containee, next, mode),
            None => false,
        }
    }
}

/// Whether `containee` is contained in `container` under the given options.
pub fn contains_tree(container: &UrlTree, containee: &UrlTree, options: IsActiveMatchOptions) -> bool {
    let paths = match options.paths {
        PathsMatch::Exact => equal_groups(&container.root, &containee.root, options.matrix_params),
        PathsMatch::Subset => contains_group(&container.root, &containee.root, options.matrix_params),
    };

    paths
        && params_match(&container.query_params, &containee.query_params, options.query_params)
        && !(options.exact_fragment && container.fragment != containee.fragment)
}
