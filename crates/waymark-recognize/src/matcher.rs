//! Path matching for a single route entry

use std::collections::BTreeMap;

use waymark_state::{PathMatch, Route, UrlMatchResult};
use waymark_url::{Params, UrlSegment};

/// Outcome of matching one entry against the front of a segment list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentMatch {
    pub consumed: Vec<UrlSegment>,
    pub remaining: Vec<UrlSegment>,
    /// Positional params, overlaid with the last consumed segment's matrix params.
    pub params: Params,
}

/// Matcher used for entries without a custom one: `/`-separated parts where
/// `:name` captures a segment and anything else must equal it.
pub fn default_url_matcher(segments: &[UrlSegment], has_children: bool, route: &Route) -> Option<UrlMatchResult> {
    let parts: Vec<&str> = route.path.split('/').collect();
    if parts.len() > segments.len() {
        return None;
    }
    if route.path_match == PathMatch::Full && (has_children || parts.len() < segments.len()) {
        return None;
    }

    let mut pos_params = BTreeMap::new();
    for (part, segment) in parts.iter().zip(segments) {
        match part.strip_prefix(':') {
            Some(name) => {
                pos_params.insert(name.to_string(), segment.clone());
            }
            None if *part != segment.path => return None,
            None => {}
        }
    }

    Some(UrlMatchResult {
        consumed: segments[..parts.len()].to_vec(),
        pos_params,
    })
}

/// Matches `route` against the front of `segments`. Empty paths consume
/// nothing; with full matching they also require nothing to be left.
pub fn match_route(route: &Route, segments: &[UrlSegment], has_children: bool) -> Option<SegmentMatch> {
    if route.matcher.is_none() && route.path.is_empty() {
        if route.path_match == PathMatch::Full && (has_children || !segments.is_empty()) {
            return None;
        }
        return Some(SegmentMatch {
            consumed: Vec::new(),
            remaining: segments.to_vec(),
            params: Params::new(),
        });
    }

    let result = match &route.matcher {
        Some(matcher) => matcher.match_url(segments, has_children, route),
        None => default_url_matcher(segments, has_children, route),
    }?;

    let consumed_len = result.consumed.len();
    if consumed_len > segments.len() {
        return None;
    }

    let mut params: Params = result
        .pos_params
        .into_iter()
        .map(|(name, segment)| (name, segment.path))
        .collect();
    if let Some(last) = result.consumed.last() {
        params.extend(last.parameters.clone());
    }

    Some(SegmentMatch {
        remaining: segments[consumed_len..].to_vec(),
        consumed: result.consumed,
        params,
    })
}
