//! Route configuration entries
//!
//! Entries are shared as `Arc<Route>` and compared by pointer identity: two
//! structurally equal entries are still two different routes.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use waymark_url::{UrlSegment, PRIMARY_OUTLET};

use crate::provider::{ProviderScope, Token};
use crate::snapshot::ActivatedRouteSnapshot;

/// Identity of the component rendered for a route.
pub type ComponentId = String;

/// Static and resolved route data.
pub type Data = BTreeMap<String, Value>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PathMatch {
    /// The path only has to match a prefix of the remaining segments.
    #[default]
    Prefix,
    /// The path has to consume every remaining segment.
    Full,
}

/// Decides whether guards and resolvers run again for a reused route.
#[derive(Clone, Default)]
pub enum RunGuardsAndResolvers {
    /// Path or matrix params of this route or an ancestor changed.
    #[default]
    ParamsChange,
    ParamsOrQueryParamsChange,
    /// Path segments changed, matrix params ignored.
    PathParamsChange,
    PathParamsOrQueryParamsChange,
    Always,
    /// Called with `(current, future)`.
    Custom(Arc<dyn Fn(&ActivatedRouteSnapshot, &ActivatedRouteSnapshot) -> bool + Send + Sync>),
}

impl fmt::Debug for RunGuardsAndResolvers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParamsChange => f.write_str("ParamsChange"),
            Self::ParamsOrQueryParamsChange => f.write_str("ParamsOrQueryParamsChange"),
            Self::PathParamsChange => f.write_str("PathParamsChange"),
            Self::PathParamsOrQueryParamsChange => f.write_str("PathParamsOrQueryParamsChange"),
            Self::Always => f.write_str("Always"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Segments consumed by a custom matcher plus the positional params it extracted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlMatchResult {
    pub consumed: Vec<UrlSegment>,
    pub pos_params: BTreeMap<String, UrlSegment>,
}

/// Custom path matching. `has_children` tells whether the segment group being
/// matched has outlet children.
pub trait UrlMatcher: Send + Sync {
    fn match_url(&self, segments: &[UrlSegment], has_children: bool, route: &Route) -> Option<UrlMatchResult>;
}

impl<F> UrlMatcher for F
where
    F: Fn(&[UrlSegment], bool, &Route) -> Option<UrlMatchResult> + Send + Sync,
{
    fn match_url(&self, segments: &[UrlSegment], has_children: bool, route: &Route) -> Option<UrlMatchResult> {
        self(segments, has_children, route)
    }
}

/// A child configuration that has already been loaded, with its own providers.
#[derive(Clone)]
pub struct LoadedRoutes {
    pub routes: Vec<Arc<Route>>,
    pub scope: Arc<ProviderScope>,
}

impl fmt::Debug for LoadedRoutes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedRoutes")
            .field("routes", &self.routes.len())
            .field("scope", &self.scope.name())
            .finish()
    }
}

#[derive(Clone, Default)]
pub struct Route {
    pub path: String,
    pub path_match: PathMatch,
    pub matcher: Option<Arc<dyn UrlMatcher>>,
    pub outlet: Option<String>,
    pub component: Option<ComponentId>,
    /// Redirects are expanded before recognition; such entries never match.
    pub redirect_to: Option<String>,
    pub children: Vec<Arc<Route>>,
    pub loaded: Option<LoadedRoutes>,
    /// Route-level providers, visible to this route and its descendants.
    pub providers: Option<Arc<ProviderScope>>,
    pub can_activate: Vec<Token>,
    pub can_activate_child: Vec<Token>,
    pub can_deactivate: Vec<Token>,
    pub resolve: BTreeMap<String, Token>,
    pub data: Data,
    pub run_guards_and_resolvers: RunGuardsAndResolvers,
}

impl Route {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn matcher(mut self, matcher: impl UrlMatcher + 'static) -> Self {
        self.matcher = Some(Arc::new(matcher));
        self
    }

    pub fn path_match(mut self, path_match: PathMatch) -> Self {
        self.path_match = path_match;
        self
    }

    pub fn full(self) -> Self {
        self.path_match(PathMatch::Full)
    }

    pub fn outlet(mut self, outlet: impl Into<String>) -> Self {
        self.outlet = Some(outlet.into());
        self
    }

    pub fn component(mut self, component: impl Into<ComponentId>) -> Self {
        self.component = Some(component.into());
        self
    }

    pub fn redirect_to(mut self, target: impl Into<String>) -> Self {
        self.redirect_to = Some(target.into());
        self
    }

    pub fn children<I, R>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Arc<Route>>,
    {
        self.children = children.into_iter().map(Into::into).collect();
        self
    }

    pub fn loaded(mut self, routes: Vec<Arc<Route>>, scope: Arc<ProviderScope>) -> Self {
        self.loaded = Some(LoadedRoutes { routes, scope });
        self
    }

    pub fn providers(mut self, scope: Arc<ProviderScope>) -> Self {
        self.providers = Some(scope);
        self
    }

    pub fn can_activate(mut self, token: impl Into<Token>) -> Self {
        self.can_activate.push(token.into());
        self
    }

    pub fn can_activate_child(mut self, token: impl Into<Token>) -> Self {
        self.can_activate_child.push(token.into());
        self
    }

    pub fn can_deactivate(mut self, token: impl Into<Token>) -> Self {
        self.can_deactivate.push(token.into());
        self
    }

    pub fn resolve(mut self, key: impl Into<String>, token: impl Into<Token>) -> Self {
        self.resolve.insert(key.into(), token.into());
        self
    }

    pub fn data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn run_guards_and_resolvers(mut self, mode: RunGuardsAndResolvers) -> Self {
        self.run_guards_and_resolvers = mode;
        self
    }

    /// Outlet this entry renders into.
    pub fn outlet_name(&self) -> &str {
        self.outlet.as_deref().unwrap_or(PRIMARY_OUTLET)
    }

    /// Empty path without a custom matcher.
    pub fn is_empty_path(&self) -> bool {
        self.matcher.is_none() && self.path.is_empty()
    }

    pub fn is_wildcard(&self) -> bool {
        self.matcher.is_none() && self.path == "**"
    }

    /// Routes matched below this entry: own children, else the loaded sub-tree.
    pub fn child_config(&self) -> &[Arc<Route>] {
        if !self.children.is_empty() {
            &self.children
        } else if let Some(loaded) = &self.loaded {
            &loaded.routes
        } else {
            &[]
        }
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("path", &self.path)
            .field("path_match", &self.path_match)
            .field("matcher", &self.matcher.as_ref().map(|_| ".."))
            .field("outlet", &self.outlet)
            .field("component", &self.component)
            .field("redirect_to", &self.redirect_to)
            .field("children", &self.children)
            .field("loaded", &self.loaded)
            .field("can_activate", &self.can_activate)
            .field("can_activate_child", &self.can_activate_child)
            .field("can_deactivate", &self.can_deactivate)
            .field("resolve", &self.resolve)
            .field("data", &self.data)
            .field("run_guards_and_resolvers", &self.run_guards_and_resolvers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let route = Route::new("team/:id").component("Team");
        assert_eq!(route.outlet_name(), "primary");
        assert_eq!(route.path_match, PathMatch::Prefix);
        assert!(!route.is_empty_path());
        assert!(matches!(
            route.run_guards_and_resolvers,
            RunGuardsAndResolvers::ParamsChange
        ));
    }

    #[test]
    fn test_child_config_prefers_children() {
        let scope = ProviderScope::builder("lazy").build();
        let loaded = vec![Arc::new(Route::new("settings"))];
        let route = Route::new("admin").loaded(loaded, scope);
        assert_eq!(route.child_config().len(), 1);

        let route = route.children(vec![Route::new("a"), Route::new("b")]);
        assert_eq!(route.child_config().len(), 2);
    }

    #[test]
    fn test_identity_not_structure() {
        let a: Arc<Route> = Route::new("x").into();
        let b: Arc<Route> = Route::new("x").into();
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a, &a.clone()));
    }
}
