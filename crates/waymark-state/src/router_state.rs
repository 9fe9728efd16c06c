//! Live router state
//!
//! [`ActivatedRoute`] handles outlive single navigations. When the next
//! committed snapshot matches the same route config at the same place, the
//! existing handle is kept and only the fields whose values changed notify
//! their subscribers.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

use waymark_url::{Params, UrlSegment};

use crate::route::{ComponentId, Data, Route};
use crate::snapshot::{ActivatedRouteSnapshot, RouterStateSnapshot};
use crate::tree::{NodeId, Tree};

struct Inner {
    outlet: String,
    component: Option<ComponentId>,
    route_config: Option<Arc<Route>>,
    url: watch::Sender<Vec<UrlSegment>>,
    params: watch::Sender<Params>,
    query_params: watch::Sender<Params>,
    fragment: watch::Sender<Option<String>>,
    data: watch::Sender<Data>,
    snapshot: RwLock<ActivatedRouteSnapshot>,
}

/// Long-lived handle to one mounted route.
#[derive(Clone)]
pub struct ActivatedRoute {
    inner: Arc<Inner>,
}

fn publish<T: PartialEq + Clone>(sender: &watch::Sender<T>, next: &T) {
    sender.send_if_modified(|current| {
        if current == next {
            false
        } else {
            *current = next.clone();
            true
        }
    });
}

impl ActivatedRoute {
    pub fn from_snapshot(snapshot: &ActivatedRouteSnapshot) -> Self {
        let (url, _) = watch::channel(snapshot.url.clone());
        let (params, _) = watch::channel(snapshot.params.clone());
        let (query_params, _) = watch::channel(snapshot.query_params.clone());
        let (fragment, _) = watch::channel(snapshot.fragment.clone());
        let (data, _) = watch::channel(snapshot.data.clone());

        Self {
            inner: Arc::new(Inner {
                outlet: snapshot.outlet.clone(),
                component: snapshot.component.clone(),
                route_config: snapshot.route_config.clone(),
                url,
                params,
                query_params,
                fragment,
                data,
                snapshot: RwLock::new(snapshot.clone()),
            }),
        }
    }

    pub fn outlet(&self) -> &str {
        &self.inner.outlet
    }

    pub fn component(&self) -> Option<&ComponentId> {
        self.inner.component.as_ref()
    }

    pub fn route_config(&self) -> Option<&Arc<Route>> {
        self.inner.route_config.as_ref()
    }

    pub fn url(&self) -> watch::Receiver<Vec<UrlSegment>> {
        self.inner.url.subscribe()
    }

    pub fn params(&self) -> watch::Receiver<Params> {
        self.inner.params.subscribe()
    }

    pub fn query_params(&self) -> watch::Receiver<Params> {
        self.inner.query_params.subscribe()
    }

    pub fn fragment(&self) -> watch::Receiver<Option<String>> {
        self.inner.fragment.subscribe()
    }

    pub fn data(&self) -> watch::Receiver<Data> {
        self.inner.data.subscribe()
    }

    /// Snapshot this handle was last advanced to.
    pub fn snapshot(&self) -> ActivatedRouteSnapshot {
        self.inner.snapshot.read().clone()
    }

    pub fn same_handle(&self, other: &ActivatedRoute) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn matches_config(&self, snapshot: &ActivatedRouteSnapshot) -> bool {
        match (&self.inner.route_config, &snapshot.route_config) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    /// Moves the handle to `next`, notifying only the fields that changed.
    pub fn advance(&self, next: &ActivatedRouteSnapshot) {
        publish(&self.inner.query_params, &next.query_params);
        publish(&self.inner.fragment, &next.fragment);
        publish(&self.inner.params, &next.params);
        publish(&self.inner.url, &next.url);
        publish(&self.inner.data, &next.data);
        *self.inner.snapshot.write() = next.clone();
    }
}

impl fmt::Debug for ActivatedRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivatedRoute")
            .field("outlet", &self.inner.outlet)
            .field("component", &self.inner.component)
            .field("path", &self.inner.route_config.as_ref().map(|r| r.path.clone()))
            .finish()
    }
}

/// Handles for the committed snapshot. Node ids are shared with the snapshot.
#[derive(Debug, Clone)]
pub struct RouterState {
    tree: Tree<ActivatedRoute>,
    snapshot: Arc<RouterStateSnapshot>,
}

impl RouterState {
    /// Fresh handles for every node.
    pub fn new(snapshot: Arc<RouterStateSnapshot>) -> Self {
        let tree = snapshot
            .tree()
            .map(|_, route| ActivatedRoute::from_snapshot(route));
        Self { tree, snapshot }
    }

    pub fn tree(&self) -> &Tree<ActivatedRoute> {
        &self.tree
    }

    pub fn snapshot(&self) -> &Arc<RouterStateSnapshot> {
        &self.snapshot
    }

    pub fn root(&self) -> &ActivatedRoute {
        self.tree.get(self.tree.root())
    }

    pub fn route_for(&self, id: NodeId) -> Option<&ActivatedRoute> {
        self.tree.try_get(id)
    }

    /// Handle for the first node using `config`.
    pub fn find_by_config(&self, config: &Arc<Route>) -> Option<&ActivatedRoute> {
        self.tree
            .find(|route| route.route_config().is_some_and(|c| Arc::ptr_eq(c, config)))
            .map(|id| self.tree.get(id))
    }

    /// State for `future`, keeping every handle whose config is unchanged
    /// at the same position. Kept handles are advanced to their new snapshot.
    pub fn advance(&self, future: Arc<RouterStateSnapshot>) -> RouterState {
        let mut reused = HashMap::new();
        self.pair(&future, future.root_id(), Some(self.tree.root()), &mut reused);

        let tree = future.tree().map(|id, route| match reused.remove(&id) {
            Some(handle) => {
                handle.advance(route);
                handle
            }
            None => ActivatedRoute::from_snapshot(route),
        });

        tracing::debug!(
            nodes = tree.len(),
            url = %future.url(),
            "Router state advanced"
        );
        RouterState {
            tree,
            snapshot: future,
        }
    }

    fn pair(
        &self,
        future: &RouterStateSnapshot,
        id: NodeId,
        previous: Option<NodeId>,
        reused: &mut HashMap<NodeId, ActivatedRoute>,
    ) {
        let route = future.node(id);
        let previous = previous.filter(|p| self.tree.get(*p).matches_config(route));

        match previous {
            Some(prev) => {
                reused.insert(id, self.tree.get(prev).clone());
                for child in future.tree().children(id) {
                    let candidate = self
                        .tree
                        .children(prev)
                        .iter()
                        .copied()
                        .find(|p| self.tree.get(*p).matches_config(future.node(*child)));
                    self.pair(future, *child, candidate, reused);
                }
            }
            None => {
                for child in future.tree().children(id) {
                    self.pair(future, *child, None, reused);
                }
            }
        }
    }
}
