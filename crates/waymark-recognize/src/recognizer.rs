//! Backtracking recognizer
//!
//! Walks the URL tree and the route configuration together. Within one
//! segment list the entries are tried in order; an entry only wins once its
//! whole subtree matched, otherwise the next entry is tried.

use std::collections::BTreeMap;
use std::sync::Arc;

use waymark_state::{
    ActivatedRouteSnapshot, ComponentId, ParamsInheritanceStrategy, PathMatch, Route, RouterStateSnapshot,
    TreeNode,
};
use waymark_url::{Params, UrlSegment, UrlSegmentGroup, UrlSerializer, UrlTree, PRIMARY_OUTLET};

use crate::error::RecognizeError;
use crate::matcher::match_route;
use crate::Result;

type Nodes = Vec<TreeNode<ActivatedRouteSnapshot>>;

/// Segment group as seen during recognition. `offset` is the number of
/// segments of the source group that precede `segments[0]`.
#[derive(Debug, Clone)]
struct Group {
    segments: Vec<UrlSegment>,
    children: BTreeMap<String, Group>,
    offset: usize,
}

impl Group {
    fn from_url(group: &UrlSegmentGroup) -> Self {
        Self {
            segments: group.segments.clone(),
            children: group
                .children
                .iter()
                .map(|(outlet, child)| (outlet.clone(), Group::from_url(child)))
                .collect(),
            offset: 0,
        }
    }

    fn empty(offset: usize) -> Self {
        Self {
            segments: Vec::new(),
            children: BTreeMap::new(),
            offset,
        }
    }

    fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Primary outlet first, then the rest by name.
    fn outlets(&self) -> Vec<(&str, &Group)> {
        let mut outlets: Vec<(&str, &Group)> = Vec::with_capacity(self.children.len());
        if let Some(primary) = self.children.get(PRIMARY_OUTLET) {
            outlets.push((PRIMARY_OUTLET, primary));
        }
        outlets.extend(
            self.children
                .iter()
                .filter(|(outlet, _)| outlet.as_str() != PRIMARY_OUTLET)
                .map(|(outlet, child)| (outlet.as_str(), child)),
        );
        outlets
    }
}

/// Whether `route` can match nothing at this point of the group.
fn empty_path_match(group: &Group, sliced: &[UrlSegment], route: &Route) -> bool {
    if (group.has_children() || !sliced.is_empty()) && route.path_match == PathMatch::Full {
        return false;
    }
    route.is_empty_path()
}

/// Prepares the group the children of a matched entry are recognized against.
/// Empty-path children on named outlets get their own empty groups so they
/// can match next to the primary remainder.
fn split(
    group: &Group,
    consumed: &[UrlSegment],
    sliced: &[UrlSegment],
    after: usize,
    config: &[Arc<Route>],
) -> (Group, Vec<UrlSegment>) {
    let config: Vec<&Route> = config
        .iter()
        .filter(|r| r.redirect_to.is_none())
        .map(|r| r.as_ref())
        .collect();

    let named_empty = config
        .iter()
        .any(|r| empty_path_match(group, sliced, r) && r.outlet_name() != PRIMARY_OUTLET);

    if !sliced.is_empty() && named_empty {
        let mut children = BTreeMap::new();
        children.insert(
            PRIMARY_OUTLET.to_string(),
            Group {
                segments: sliced.to_vec(),
                children: group.children.clone(),
                offset: after,
            },
        );
        for route in &config {
            if route.is_empty_path() && route.outlet_name() != PRIMARY_OUTLET {
                children.insert(route.outlet_name().to_string(), Group::empty(after));
            }
        }
        let outer = Group {
            segments: consumed.to_vec(),
            children,
            offset: after.saturating_sub(consumed.len()),
        };
        return (outer, Vec::new());
    }

    let mut children = group.children.clone();
    if sliced.is_empty() {
        for route in &config {
            if empty_path_match(group, sliced, route) && !children.contains_key(route.outlet_name()) {
                children.insert(route.outlet_name().to_string(), Group::empty(after));
            }
        }
    }

    (
        Group {
            segments: group.segments.clone(),
            children,
            offset: group.offset,
        },
        sliced.to_vec(),
    )
}

/// Entries for `outlet` first, everything else after, each in declaration order.
fn sort_by_matching_outlets(config: &[Arc<Route>], outlet: &str) -> Vec<Arc<Route>> {
    let (mut matching, rest): (Vec<_>, Vec<_>) = config
        .iter()
        .cloned()
        .partition(|r| r.outlet_name() == outlet);
    matching.extend(rest);
    matching
}

fn is_mergeable(node: &TreeNode<ActivatedRouteSnapshot>) -> bool {
    node.value
        .route_config
        .as_ref()
        .is_some_and(|c| c.is_empty_path() && c.redirect_to.is_none())
}

/// Folds sibling matches of the same empty-path entry into one node.
fn merge_empty_path_matches(nodes: Nodes) -> Nodes {
    let mut result: Nodes = Vec::with_capacity(nodes.len());
    let mut merged: Vec<usize> = Vec::new();

    for node in nodes {
        if !is_mergeable(&node) {
            result.push(node);
            continue;
        }
        match result.iter().position(|r| r.value.same_config(&node.value)) {
            Some(idx) => {
                result[idx].children.extend(node.children);
                if !merged.contains(&idx) {
                    merged.push(idx);
                }
            }
            None => result.push(node),
        }
    }

    if merged.is_empty() {
        return result;
    }

    let mut kept = Vec::with_capacity(result.len());
    let mut tail: Vec<Option<TreeNode<ActivatedRouteSnapshot>>> = merged.iter().map(|_| None).collect();
    for (idx, node) in result.into_iter().enumerate() {
        match merged.iter().position(|m| *m == idx) {
            Some(order) => tail[order] = Some(node),
            None => kept.push(node),
        }
    }
    for node in tail.into_iter().flatten() {
        let children = merge_empty_path_matches(node.children);
        kept.push(TreeNode::new(node.value, children));
    }
    kept
}

fn check_outlet_name_uniqueness(nodes: &Nodes) -> Result<()> {
    let mut seen: BTreeMap<&str, &ActivatedRouteSnapshot> = BTreeMap::new();
    for node in nodes {
        let route = &node.value;
        if let Some(existing) = seen.insert(route.outlet.as_str(), route) {
            return Err(RecognizeError::OutletCollision {
                outlet: route.outlet.clone(),
                first: existing.path().to_string(),
                second: route.path().to_string(),
            });
        }
    }
    Ok(())
}

fn sort_by_outlet(nodes: &mut Nodes) {
    nodes.sort_by(|a, b| {
        (!a.value.is_primary(), &a.value.outlet).cmp(&(!b.value.is_primary(), &b.value.outlet))
    });
}

/// One recognition pass over a URL tree.
pub struct Recognizer<'a> {
    root_component: Option<ComponentId>,
    config: &'a [Arc<Route>],
    url_tree: &'a UrlTree,
    serializer: &'a dyn UrlSerializer,
    strategy: ParamsInheritanceStrategy,
}

impl<'a> Recognizer<'a> {
    pub fn new(
        root_component: Option<ComponentId>,
        config: &'a [Arc<Route>],
        url_tree: &'a UrlTree,
        serializer: &'a dyn UrlSerializer,
        strategy: ParamsInheritanceStrategy,
    ) -> Self {
        Self {
            root_component,
            config,
            url_tree,
            serializer,
            strategy,
        }
    }

    pub fn recognize(&self) -> Result<RouterStateSnapshot> {
        let source = Group::from_url(&self.url_tree.root);
        let (root_group, _) = split(&source, &[], &[], 0, self.config);

        let children = self
            .process_segment_group(self.config, &root_group, PRIMARY_OUTLET)?
            .ok_or_else(|| RecognizeError::NoMatch {
                segment_group: self.serializer.serialize(&UrlTree::new(
                    self.url_tree.root.clone(),
                    Params::new(),
                    None,
                )),
            })?;

        let root = ActivatedRouteSnapshot::root(
            self.url_tree.query_params.clone(),
            self.url_tree.fragment.clone(),
            self.root_component.clone(),
        );
        let url = self.serializer.serialize(self.url_tree);
        let mut snapshot = RouterStateSnapshot::new(url, TreeNode::new(root, children));
        snapshot.inherit_params_and_data(self.strategy);

        tracing::debug!(
            url = %snapshot.url(),
            routes = snapshot.tree().len() - 1,
            "Recognized URL"
        );
        Ok(snapshot)
    }

    fn process_segment_group(&self, config: &[Arc<Route>], group: &Group, outlet: &str) -> Result<Option<Nodes>> {
        if group.segments.is_empty() && group.has_children() {
            return self.process_children(config, group);
        }
        self.process_segment(config, group, &group.segments, outlet)
    }

    fn process_children(&self, config: &[Arc<Route>], group: &Group) -> Result<Option<Nodes>> {
        let mut children = Vec::new();
        for (outlet, child) in group.outlets() {
            let sorted = sort_by_matching_outlets(config, outlet);
            match self.process_segment_group(&sorted, child, outlet)? {
                Some(nodes) => children.extend(nodes),
                None => return Ok(None),
            }
        }

        let mut merged = merge_empty_path_matches(children);
        check_outlet_name_uniqueness(&merged)?;
        sort_by_outlet(&mut merged);
        Ok(Some(merged))
    }

    fn process_segment(
        &self,
        config: &[Arc<Route>],
        group: &Group,
        segments: &[UrlSegment],
        outlet: &str,
    ) -> Result<Option<Nodes>> {
        for route in config {
            if let Some(nodes) = self.process_segment_against_route(route, group, segments, outlet)? {
                return Ok(Some(nodes));
            }
        }
        if segments.is_empty() && !group.children.contains_key(outlet) {
            return Ok(Some(Vec::new()));
        }
        Ok(None)
    }

    fn snapshot(
        &self,
        route: &Arc<Route>,
        url: Vec<UrlSegment>,
        params: Params,
        path_index: usize,
    ) -> ActivatedRouteSnapshot {
        ActivatedRouteSnapshot::new(
            url,
            params,
            self.url_tree.query_params.clone(),
            self.url_tree.fragment.clone(),
            route.data.clone(),
            route.outlet_name(),
            route.component.clone(),
            Some(Arc::clone(route)),
            path_index,
        )
    }

    fn process_segment_against_route(
        &self,
        route: &Arc<Route>,
        group: &Group,
        segments: &[UrlSegment],
        outlet: &str,
    ) -> Result<Option<Nodes>> {
        if route.redirect_to.is_some() {
            return Ok(None);
        }
        if route.outlet_name() != outlet && (outlet == PRIMARY_OUTLET || !empty_path_match(group, segments, route)) {
            return Ok(None);
        }

        let start = group.offset + group.segments.len().saturating_sub(segments.len());
        let (snapshot, consumed, remaining) = if route.is_wildcard() {
            let params = segments.last().map(|s| s.parameters.clone()).unwrap_or_default();
            let snapshot = self.snapshot(route, segments.to_vec(), params, start + segments.len());
            (snapshot, segments.to_vec(), Vec::new())
        } else {
            let Some(found) = match_route(route, segments, group.has_children()) else {
                return Ok(None);
            };
            let snapshot = self.snapshot(route, found.consumed.clone(), found.params, start + found.consumed.len());
            (snapshot, found.consumed, found.remaining)
        };

        let after = start + consumed.len();
        let child_config = route.child_config();
        let (child_group, sliced) = split(group, &consumed, &remaining, after, child_config);

        if sliced.is_empty() && child_group.has_children() {
            return Ok(self
                .process_children(child_config, &child_group)?
                .map(|children| vec![TreeNode::new(snapshot, children)]));
        }

        if child_config.is_empty() && sliced.is_empty() {
            return Ok(Some(vec![TreeNode::leaf(snapshot)]));
        }

        let child_outlet = if route.outlet_name() == outlet {
            PRIMARY_OUTLET
        } else {
            outlet
        };
        Ok(self
            .process_segment(child_config, &child_group, &sliced, child_outlet)?
            .map(|children| vec![TreeNode::new(snapshot, children)]))
    }
}

/// Matches `url_tree` against `config`, producing a snapshot whose params and
/// data have already been inherited according to `strategy`.
pub fn recognize(
    root_component: Option<ComponentId>,
    config: &[Arc<Route>],
    url_tree: &UrlTree,
    serializer: &dyn UrlSerializer,
    strategy: ParamsInheritanceStrategy,
) -> Result<RouterStateSnapshot> {
    Recognizer::new(root_component, config, url_tree, serializer, strategy).recognize()
}
