//! Frozen route trees
//!
//! A [`RouterStateSnapshot`] owns every [`ActivatedRouteSnapshot`] of one
//! navigation in an arena. Each snapshot knows its own [`NodeId`]; parent and
//! child lookups go through the owning snapshot tree.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use waymark_url::{Params, UrlSegment, PRIMARY_OUTLET};

use crate::provider::ProviderScope;
use crate::route::{ComponentId, Data, Route};
use crate::tree::{NodeId, Tree, TreeNode};

/// How far params and data flow from parents into children.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParamsInheritanceStrategy {
    /// Inherit only into empty-path routes and from componentless parents.
    #[default]
    EmptyOnly,
    /// Every route inherits from all of its ancestors.
    Always,
}

#[derive(Debug, Clone)]
pub struct ActivatedRouteSnapshot {
    id: NodeId,
    pub url: Vec<UrlSegment>,
    pub params: Params,
    pub query_params: Params,
    pub fragment: Option<String>,
    /// Static data merged with inherited and resolved data.
    pub data: Data,
    /// Raw resolver output, keyed like `Route::resolve`.
    pub resolved_data: Data,
    pub outlet: String,
    pub component: Option<ComponentId>,
    /// `None` only for the synthetic root.
    pub route_config: Option<Arc<Route>>,
    /// Segments of the source segment group consumed up to and including this route.
    pub path_index: usize,
}

impl ActivatedRouteSnapshot {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        url: Vec<UrlSegment>,
        params: Params,
        query_params: Params,
        fragment: Option<String>,
        data: Data,
        outlet: impl Into<String>,
        component: Option<ComponentId>,
        route_config: Option<Arc<Route>>,
        path_index: usize,
    ) -> Self {
        Self {
            id: NodeId::ROOT,
            url,
            params,
            query_params,
            fragment,
            data,
            resolved_data: Data::new(),
            outlet: outlet.into(),
            component,
            route_config,
            path_index,
        }
    }

    /// The synthetic route sitting above every matched tree.
    pub fn root(query_params: Params, fragment: Option<String>, component: Option<ComponentId>) -> Self {
        Self::new(
            Vec::new(),
            Params::new(),
            query_params,
            fragment,
            Data::new(),
            PRIMARY_OUTLET,
            component,
            None,
            0,
        )
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Pointer identity of the matched route configs.
    pub fn same_config(&self, other: &ActivatedRouteSnapshot) -> bool {
        match (&self.route_config, &other.route_config) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    pub fn path(&self) -> &str {
        self.route_config.as_deref().map(|r| r.path.as_str()).unwrap_or("")
    }

    pub fn is_primary(&self) -> bool {
        self.outlet == PRIMARY_OUTLET
    }
}

/// Params and data a route ends up with after inheritance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inherited {
    pub params: Params,
    pub data: Data,
    /// Data including the route's own resolved values.
    pub resolve: Data,
}

#[derive(Debug, Clone)]
pub struct RouterStateSnapshot {
    url: String,
    tree: Tree<ActivatedRouteSnapshot>,
}

impl RouterStateSnapshot {
    pub fn new(url: impl Into<String>, root: TreeNode<ActivatedRouteSnapshot>) -> Self {
        let mut tree = Tree::from_node(root);
        for id in tree.preorder() {
            tree.get_mut(id).id = id;
        }
        Self {
            url: url.into(),
            tree,
        }
    }

    /// State before the first navigation: `/` with only the root route.
    pub fn empty(root_component: Option<ComponentId>) -> Self {
        Self::new(
            "/",
            TreeNode::leaf(ActivatedRouteSnapshot::root(Params::new(), None, root_component)),
        )
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn tree(&self) -> &Tree<ActivatedRouteSnapshot> {
        &self.tree
    }

    pub fn root_id(&self) -> NodeId {
        self.tree.root()
    }

    pub fn root(&self) -> &ActivatedRouteSnapshot {
        self.tree.get(self.tree.root())
    }

    pub fn node(&self, id: NodeId) -> &ActivatedRouteSnapshot {
        self.tree.get(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut ActivatedRouteSnapshot {
        self.tree.get_mut(id)
    }

    pub fn parent(&self, id: NodeId) -> Option<&ActivatedRouteSnapshot> {
        self.tree.parent(id).map(|p| self.tree.get(p))
    }

    pub fn children(&self, id: NodeId) -> Vec<&ActivatedRouteSnapshot> {
        self.tree.children(id).iter().map(|c| self.tree.get(*c)).collect()
    }

    pub fn first_child(&self, id: NodeId) -> Option<&ActivatedRouteSnapshot> {
        self.tree.first_child(id).map(|c| self.tree.get(c))
    }

    /// Child rendered into `outlet`, if any.
    pub fn child_by_outlet(&self, id: NodeId, outlet: &str) -> Option<&ActivatedRouteSnapshot> {
        self.children(id).into_iter().find(|c| c.outlet == outlet)
    }

    pub fn path_from_root(&self, id: NodeId) -> Vec<&ActivatedRouteSnapshot> {
        self.tree
            .path_from_root(id)
            .into_iter()
            .map(|p| self.tree.get(p))
            .collect()
    }

    /// `id` and its whole subtree, pre-order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        self.tree.descendants(id)
    }

    /// Deepest route reached by following primary children from the root.
    pub fn primary_leaf(&self) -> &ActivatedRouteSnapshot {
        let mut current = self.root();
        while let Some(next) = self.child_by_outlet(current.id, PRIMARY_OUTLET) {
            current = next;
        }
        current
    }

    /// Params and data `id` should carry given its parent's current values.
    pub fn inherited(&self, id: NodeId, strategy: ParamsInheritanceStrategy) -> Inherited {
        let route = self.node(id);
        let config = route.route_config.as_deref();
        let static_data = config.map(|c| c.data.clone()).unwrap_or_default();

        let parent = self.parent(id).filter(|parent| {
            strategy == ParamsInheritanceStrategy::Always
                || config.is_some_and(Route::is_empty_path)
                || parent.component.is_none()
        });

        // `data` lets the route's static values win; `resolve` lets the
        // parent's finished data win over them, and resolved values over both
        let mut inherited = Inherited {
            resolve: static_data.clone(),
            ..Inherited::default()
        };
        if let Some(parent) = parent {
            inherited.params = parent.params.clone();
            inherited.data = parent.data.clone();
            inherited.resolve.extend(parent.data.clone());
        }
        inherited.params.extend(route.params.clone());
        inherited.data.extend(static_data);
        inherited.resolve.extend(route.resolved_data.clone());
        inherited
    }

    /// Rewrites params and data top-down so every route sees its ancestors'
    /// finished values.
    pub fn inherit_params_and_data(&mut self, strategy: ParamsInheritanceStrategy) {
        for id in self.tree.preorder() {
            let inherited = self.inherited(id, strategy);
            let route = self.tree.get_mut(id);
            route.params = inherited.params;
            route.data = inherited.data;
        }
    }

    /// Scope that token lookups for `id` should start from: providers declared
    /// on the route itself, else the closest ancestor's loaded or route-level scope.
    pub fn closest_scope(&self, id: NodeId) -> Option<Arc<ProviderScope>> {
        let route = self.node(id);
        if let Some(scope) = route.route_config.as_ref().and_then(|c| c.providers.clone()) {
            return Some(scope);
        }

        let mut current = self.tree.parent(id);
        while let Some(ancestor) = current {
            if let Some(config) = &self.node(ancestor).route_config {
                if let Some(loaded) = &config.loaded {
                    return Some(Arc::clone(&loaded.scope));
                }
                if let Some(scope) = &config.providers {
                    return Some(Arc::clone(scope));
                }
            }
            current = self.tree.parent(ancestor);
        }
        None
    }
}
