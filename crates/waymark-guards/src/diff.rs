//! State diff
//!
//! Pairs the candidate snapshot with the current one outlet by outlet and
//! decides, per node, whether it is entered, left or reused.

use waymark_state::{
    ActivatedRouteSnapshot, ChildrenOutletContexts, ComponentId, NodeId, RouterStateSnapshot, RunGuardsAndResolvers,
};
use waymark_url::{equal_path, equal_segments, shallow_equal};

/// A route about to be activated, with its ancestors from the root down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanActivateCheck {
    pub path: Vec<NodeId>,
}

impl CanActivateCheck {
    /// The node being activated. Ids refer to the candidate snapshot.
    pub fn route(&self) -> NodeId {
        self.path.last().copied().unwrap_or(NodeId::ROOT)
    }
}

/// A currently mounted route about to be torn down. Ids refer to the
/// current snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanDeactivateCheck {
    pub component: Option<ComponentId>,
    pub route: NodeId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Checks {
    /// Parent before child.
    pub can_activate: Vec<CanActivateCheck>,
    /// Deepest first.
    pub can_deactivate: Vec<CanDeactivateCheck>,
}

impl Checks {
    pub fn is_empty(&self) -> bool {
        self.can_activate.is_empty() && self.can_deactivate.is_empty()
    }
}

fn equal_params_and_url_segments(
    current: &RouterStateSnapshot,
    current_id: NodeId,
    future: &RouterStateSnapshot,
    future_id: NodeId,
) -> bool {
    let a = current.node(current_id);
    let b = future.node(future_id);
    if !(shallow_equal(&a.params, &b.params) && equal_segments(&a.url, &b.url)) {
        return false;
    }
    match (current.tree().parent(current_id), future.tree().parent(future_id)) {
        (Some(pa), Some(pb)) => equal_params_and_url_segments(current, pa, future, pb),
        (None, None) => true,
        _ => false,
    }
}

/// Whether a reused route has to run its guards and resolvers again.
pub fn should_run_guards_and_resolvers(
    current: &RouterStateSnapshot,
    current_id: NodeId,
    future: &RouterStateSnapshot,
    future_id: NodeId,
    mode: &RunGuardsAndResolvers,
) -> bool {
    let curr = current.node(current_id);
    let next = future.node(future_id);
    match mode {
        RunGuardsAndResolvers::Custom(predicate) => predicate(curr, next),
        RunGuardsAndResolvers::PathParamsChange => !equal_path(&curr.url, &next.url),
        RunGuardsAndResolvers::PathParamsOrQueryParamsChange => {
            !equal_path(&curr.url, &next.url) || !shallow_equal(&curr.query_params, &next.query_params)
        }
        RunGuardsAndResolvers::Always => true,
        RunGuardsAndResolvers::ParamsOrQueryParamsChange => {
            !equal_params_and_url_segments(current, current_id, future, future_id)
                || !shallow_equal(&curr.query_params, &next.query_params)
        }
        RunGuardsAndResolvers::ParamsChange => !equal_params_and_url_segments(current, current_id, future, future_id),
    }
}

struct Differ<'a> {
    current: Option<&'a RouterStateSnapshot>,
    checks: Checks,
}

impl<'a> Differ<'a> {
    fn child_routes(
        &mut self,
        future: &mut RouterStateSnapshot,
        future_id: NodeId,
        current_id: Option<NodeId>,
        contexts: Option<&ChildrenOutletContexts>,
        path: &[NodeId],
    ) {
        let mut previous: Vec<NodeId> = match (self.current, current_id) {
            (Some(current), Some(id)) => current.tree().children(id).to_vec(),
            _ => Vec::new(),
        };

        for child in future.tree().children(future_id).to_vec() {
            let outlet = future.node(child).outlet.clone();
            let matched = match self.current {
                Some(current) => previous
                    .iter()
                    .position(|p| current.node(*p).outlet == outlet)
                    .map(|idx| previous.remove(idx)),
                None => None,
            };
            let mut child_path = path.to_vec();
            child_path.push(child);
            self.route(future, child, matched, contexts, &child_path);
        }

        if let Some(current) = self.current {
            for leftover in previous {
                let outlet = &current.node(leftover).outlet;
                let context = contexts.and_then(|c| c.get_context(outlet));
                self.deactivate_route_and_children(
                    current,
                    leftover,
                    context.map(|c| &c.children),
                    context.and_then(|c| c.mounted_component()),
                );
            }
        }
    }

    fn route(
        &mut self,
        future: &mut RouterStateSnapshot,
        future_id: NodeId,
        current_id: Option<NodeId>,
        parent_contexts: Option<&ChildrenOutletContexts>,
        path: &[NodeId],
    ) {
        let outlet = future.node(future_id).outlet.clone();
        let context = parent_contexts.and_then(|c| c.get_context(&outlet));
        let has_component = future.node(future_id).component.is_some();
        let child_contexts = if has_component {
            context.map(|c| &c.children)
        } else {
            parent_contexts
        };

        let reused = match (self.current, current_id) {
            (Some(current), Some(id)) if current.node(id).same_config(future.node(future_id)) => Some((current, id)),
            _ => None,
        };

        match reused {
            Some((current, id)) => {
                let mode = future
                    .node(future_id)
                    .route_config
                    .as_ref()
                    .map(|c| c.run_guards_and_resolvers.clone())
                    .unwrap_or_default();
                let should_run = should_run_guards_and_resolvers(current, id, future, future_id, &mode);

                if should_run {
                    self.checks.can_activate.push(CanActivateCheck { path: path.to_vec() });
                } else {
                    let previous = current.node(id);
                    let next = future.node_mut(future_id);
                    next.data = previous.data.clone();
                    next.resolved_data = previous.resolved_data.clone();
                }

                self.child_routes(future, future_id, Some(id), child_contexts, path);

                if should_run {
                    if let Some(component) = context.and_then(|c| c.mounted_component()) {
                        self.checks.can_deactivate.push(CanDeactivateCheck {
                            component: Some(component.clone()),
                            route: id,
                        });
                    }
                }
            }
            None => {
                if let (Some(current), Some(id)) = (self.current, current_id) {
                    self.deactivate_route_and_children(
                        current,
                        id,
                        context.map(|c| &c.children),
                        context.and_then(|c| c.mounted_component()),
                    );
                }
                self.checks.can_activate.push(CanActivateCheck { path: path.to_vec() });
                self.child_routes(future, future_id, None, child_contexts, path);
            }
        }
    }

    /// Exit checks for `id` and everything below it, children first.
    fn deactivate_route_and_children(
        &mut self,
        current: &RouterStateSnapshot,
        id: NodeId,
        contexts: Option<&ChildrenOutletContexts>,
        mounted: Option<&ComponentId>,
    ) {
        let route: &ActivatedRouteSnapshot = current.node(id);

        for child in current.tree().children(id) {
            let child_outlet = &current.node(*child).outlet;
            if route.component.is_none() {
                // Componentless routes hand their parent's outlets down.
                self.deactivate_route_and_children(current, *child, contexts, mounted);
            } else {
                let context = contexts.and_then(|c| c.get_context(child_outlet));
                self.deactivate_route_and_children(
                    current,
                    *child,
                    context.map(|c| &c.children),
                    context.and_then(|c| c.mounted_component()),
                );
            }
        }

        let component = if route.component.is_none() {
            None
        } else {
            mounted.cloned()
        };
        self.checks.can_deactivate.push(CanDeactivateCheck { component, route: id });
    }
}

/// Diffs `future` against `current`. Reused routes whose guards are skipped get
/// their data copied from the current snapshot into `future`.
pub fn collect_checks(
    future: &mut RouterStateSnapshot,
    current: Option<&RouterStateSnapshot>,
    contexts: &ChildrenOutletContexts,
) -> Checks {
    let mut differ = Differ {
        current,
        checks: Checks::default(),
    };
    let root = future.root_id();
    differ.child_routes(future, root, current.map(|c| c.root_id()), Some(contexts), &[root]);

    tracing::debug!(
        activate = differ.checks.can_activate.len(),
        deactivate = differ.checks.can_deactivate.len(),
        "Collected route checks"
    );
    differ.checks
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use waymark_state::{Route, TreeNode};
    use waymark_url::{Params, UrlSegment};

    struct Fixture {
        team: Arc<Route>,
        user: Arc<Route>,
        chat: Arc<Route>,
    }

    impl Fixture {
        fn new(mode: RunGuardsAndResolvers) -> Self {
            Self {
                team: Arc::new(Route::new("team/:id").component("Team").run_guards_and_resolvers(mode)),
                user: Arc::new(Route::new("user/:name").component("User")),
                chat: Arc::new(Route::new("chat").component("Chat")),
            }
        }

        fn node(config: &Arc<Route>, value: &str, query: &[(&str, &str)]) -> ActivatedRouteSnapshot {
            let mut params = Params::new();
            params.insert("v".into(), value.into());
            ActivatedRouteSnapshot::new(
                vec![UrlSegment::new(config.path.clone()), UrlSegment::new(value)],
                params,
                query.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
                None,
                config.data.clone(),
                config.outlet_name(),
                config.component.clone(),
                Some(Arc::clone(config)),
                2,
            )
        }

        fn state(&self, team: &str, leaf: &Arc<Route>, leaf_value: &str, query: &[(&str, &str)]) -> RouterStateSnapshot {
            RouterStateSnapshot::new(
                "/",
                TreeNode::new(
                    ActivatedRouteSnapshot::root(Params::new(), None, Some("App".into())),
                    vec![TreeNode::new(
                        Self::node(&self.team, team, query),
                        vec![TreeNode::leaf(Self::node(leaf, leaf_value, query))],
                    )],
                ),
            )
        }
    }

    fn path_of(snapshot: &RouterStateSnapshot, check: &CanActivateCheck) -> Vec<String> {
        check.path.iter().map(|id| snapshot.node(*id).path().to_string()).collect()
    }

    #[test]
    fn test_initial_navigation_activates_everything() {
        let f = Fixture::new(RunGuardsAndResolvers::ParamsChange);
        let mut future = f.state("1", &f.user, "a", &[]);
        let checks = collect_checks(&mut future, None, &ChildrenOutletContexts::new());

        assert!(checks.can_deactivate.is_empty());
        assert_eq!(checks.can_activate.len(), 2);
        assert_eq!(path_of(&future, &checks.can_activate[0]), vec!["", "team/:id"]);
        assert_eq!(path_of(&future, &checks.can_activate[1]), vec!["", "team/:id", "user/:name"]);
    }

    #[test]
    fn test_changed_child_deactivates_deepest_first() {
        let f = Fixture::new(RunGuardsAndResolvers::ParamsChange);
        let current = f.state("1", &f.user, "a", &[]);
        let contexts = ChildrenOutletContexts::from_snapshot(&current);
        let mut future = f.state("1", &f.chat, "b", &[]);

        let checks = collect_checks(&mut future, Some(&current), &contexts);
        assert_eq!(checks.can_activate.len(), 1);
        assert_eq!(future.node(checks.can_activate[0].route()).path(), "chat");

        assert_eq!(checks.can_deactivate.len(), 1);
        let exit = &checks.can_deactivate[0];
        assert_eq!(current.node(exit.route).path(), "user/:name");
        assert_eq!(exit.component.as_deref(), Some("User"));
    }

    #[test]
    fn test_reused_route_with_changed_params_reruns() {
        let f = Fixture::new(RunGuardsAndResolvers::ParamsChange);
        let current = f.state("1", &f.user, "a", &[]);
        let contexts = ChildrenOutletContexts::from_snapshot(&current);
        let mut future = f.state("2", &f.user, "a", &[]);

        let checks = collect_checks(&mut future, Some(&current), &contexts);
        let activated: Vec<&str> = checks
            .can_activate
            .iter()
            .map(|c| future.node(c.route()).path())
            .collect();
        // user's own params are equal but an ancestor changed
        assert_eq!(activated, vec!["team/:id", "user/:name"]);

        let deactivated: Vec<&str> = checks
            .can_deactivate
            .iter()
            .map(|c| current.node(c.route).path())
            .collect();
        assert_eq!(deactivated, vec!["user/:name", "team/:id"]);
    }

    #[test]
    fn test_skipped_reuse_copies_data() {
        let f = Fixture::new(RunGuardsAndResolvers::ParamsChange);
        let mut current = f.state("1", &f.user, "a", &[]);
        let team = current.tree().find(|n| n.path() == "team/:id").unwrap();
        current.node_mut(team).data.insert("loaded".into(), json!(true));
        current.node_mut(team).resolved_data.insert("loaded".into(), json!(true));
        let contexts = ChildrenOutletContexts::from_snapshot(&current);

        let mut future = f.state("1", &f.user, "a", &[("q", "1")]);
        let checks = collect_checks(&mut future, Some(&current), &contexts);
        assert!(checks.is_empty());
        assert_eq!(future.node(team).data.get("loaded"), Some(&json!(true)));
        assert_eq!(future.node(team).resolved_data.get("loaded"), Some(&json!(true)));
    }

    #[test]
    fn test_query_change_modes() {
        let f = Fixture::new(RunGuardsAndResolvers::ParamsOrQueryParamsChange);
        let current = f.state("1", &f.user, "a", &[]);
        let contexts = ChildrenOutletContexts::from_snapshot(&current);
        let mut future = f.state("1", &f.user, "a", &[("q", "1")]);

        let checks = collect_checks(&mut future, Some(&current), &contexts);
        assert_eq!(checks.can_activate.len(), 1);
        assert_eq!(future.node(checks.can_activate[0].route()).path(), "team/:id");
    }

    #[test]
    fn test_always_and_custom_modes() {
        let f = Fixture::new(RunGuardsAndResolvers::Always);
        let current = f.state("1", &f.user, "a", &[]);
        let mut future = f.state("1", &f.user, "a", &[]);
        let checks = collect_checks(&mut future, Some(&current), &ChildrenOutletContexts::new());
        assert_eq!(checks.can_activate.len(), 1);

        let never =
            RunGuardsAndResolvers::Custom(Arc::new(|_: &ActivatedRouteSnapshot, _: &ActivatedRouteSnapshot| false));
        let f = Fixture::new(never);
        let current = f.state("1", &f.user, "a", &[]);
        let mut future = f.state("9", &f.user, "a", &[]);
        let checks = collect_checks(&mut future, Some(&current), &ChildrenOutletContexts::new());
        // team skipped, user still sees its ancestor's params change
        assert_eq!(checks.can_activate.len(), 1);
        assert_eq!(future.node(checks.can_activate[0].route()).path(), "user/:name");
    }
}
