//! Waymark route state
//!
//! Everything the navigation pipeline reads and writes:
//! - `Tree`: index-based ownership tree shared by snapshots and live state
//! - `Route`: read-only route configuration entries
//! - `RouterStateSnapshot`: one frozen tree of matched routes
//! - `RouterState`: long-lived `ActivatedRoute` handles updated in place
//! - `ProviderScope`: token lookup for guards and resolvers

mod error;
mod outlet;
mod provider;
mod route;
mod router_state;
mod snapshot;
mod tree;

pub use error::StateError;
pub use outlet::{ChildrenOutletContexts, OutletContext};
pub use provider::{
    BoxError, CanActivate, CanActivateChild, CanDeactivate, GuardResult, ProviderScope,
    ProviderScopeBuilder, Resolution, Resolve, ResolveResult, Token,
};
pub use route::{
    ComponentId, Data, LoadedRoutes, PathMatch, Route, RunGuardsAndResolvers, UrlMatchResult,
    UrlMatcher,
};
pub use router_state::{ActivatedRoute, RouterState};
pub use snapshot::{ActivatedRouteSnapshot, Inherited, ParamsInheritanceStrategy, RouterStateSnapshot};
pub use tree::{NodeId, Tree, TreeNode};

pub type Result<T> = std::result::Result<T, StateError>;
