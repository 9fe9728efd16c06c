//! Outlet contexts
//!
//! Mirror of what is currently mounted: one context per named outlet, each
//! holding the component rendered there and the contexts of that component's
//! own outlets. Componentless routes do not own outlets, so their children
//! share the parent's contexts.

use std::collections::BTreeMap;

use crate::route::ComponentId;
use crate::snapshot::RouterStateSnapshot;
use crate::tree::NodeId;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutletContext {
    pub component: Option<ComponentId>,
    /// Snapshot node rendered into the outlet.
    pub route: Option<NodeId>,
    pub activated: bool,
    pub children: ChildrenOutletContexts,
}

impl OutletContext {
    /// Component instance currently attached, if the outlet is active.
    pub fn mounted_component(&self) -> Option<&ComponentId> {
        if self.activated {
            self.component.as_ref()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChildrenOutletContexts {
    contexts: BTreeMap<String, OutletContext>,
}

impl ChildrenOutletContexts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_context(&self, outlet: &str) -> Option<&OutletContext> {
        self.contexts.get(outlet)
    }

    pub fn get_or_create_context(&mut self, outlet: &str) -> &mut OutletContext {
        self.contexts.entry(outlet.to_string()).or_default()
    }

    pub fn remove_context(&mut self, outlet: &str) -> Option<OutletContext> {
        self.contexts.remove(outlet)
    }

    pub fn outlets(&self) -> impl Iterator<Item = &str> {
        self.contexts.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Contexts for everything mounted under the snapshot's root.
    pub fn from_snapshot(snapshot: &RouterStateSnapshot) -> Self {
        let mut contexts = Self::new();
        for child in snapshot.tree().children(snapshot.root_id()) {
            contexts.mount(snapshot, *child);
        }
        contexts
    }

    fn mount(&mut self, snapshot: &RouterStateSnapshot, id: NodeId) {
        let route = snapshot.node(id);
        let children = snapshot.tree().children(id);

        match &route.component {
            Some(component) => {
                let context = self.get_or_create_context(&route.outlet);
                context.component = Some(component.clone());
                context.route = Some(id);
                context.activated = true;
                for child in children {
                    context.children.mount(snapshot, *child);
                }
            }
            None => {
                for child in children {
                    self.mount(snapshot, *child);
                }
            }
        }
    }
}
