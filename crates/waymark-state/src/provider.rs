//! Guard and resolver capabilities, looked up by token through scope chains
//!
//! A route names its guards and resolvers by [`Token`]. At navigation time the
//! token is resolved against the [`ProviderScope`] closest to the route in
//! question, walking up that scope's parents.

use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::Stream;

use crate::error::StateError;
use crate::route::ComponentId;
use crate::snapshot::{ActivatedRouteSnapshot, RouterStateSnapshot};
use crate::Result;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Token {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for Token {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The value a guard or resolver produces: immediately, later, or as a stream
/// of which only the first item counts.
pub enum Resolution<T> {
    Ready(T),
    Failed(BoxError),
    Future(BoxFuture<'static, std::result::Result<T, BoxError>>),
    Stream(BoxStream<'static, std::result::Result<T, BoxError>>),
}

impl<T: Send + 'static> Resolution<T> {
    pub fn ready(value: T) -> Self {
        Self::Ready(value)
    }

    pub fn failed(error: impl Into<BoxError>) -> Self {
        Self::Failed(error.into())
    }

    pub fn future<F>(future: F) -> Self
    where
        F: Future<Output = std::result::Result<T, BoxError>> + Send + 'static,
    {
        Self::Future(Box::pin(future))
    }

    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = std::result::Result<T, BoxError>> + Send + 'static,
    {
        Self::Stream(stream.boxed())
    }

    /// First produced value; `None` when a stream completes without one.
    pub async fn first(self) -> std::result::Result<Option<T>, BoxError> {
        match self {
            Self::Ready(value) => Ok(Some(value)),
            Self::Failed(error) => Err(error),
            Self::Future(future) => future.await.map(Some),
            Self::Stream(mut stream) => stream.next().await.transpose(),
        }
    }
}

impl From<bool> for Resolution<bool> {
    fn from(value: bool) -> Self {
        Self::Ready(value)
    }
}

impl<T> fmt::Debug for Resolution<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(_) => f.write_str("Resolution::Ready"),
            Self::Failed(e) => write!(f, "Resolution::Failed({})", e),
            Self::Future(_) => f.write_str("Resolution::Future"),
            Self::Stream(_) => f.write_str("Resolution::Stream"),
        }
    }
}

pub type GuardResult = Resolution<bool>;
pub type ResolveResult = Resolution<Value>;

pub trait CanActivate: Send + Sync {
    fn can_activate(&self, route: &ActivatedRouteSnapshot, state: &RouterStateSnapshot) -> GuardResult;
}

/// Declared on a parent, evaluated against the child being activated.
pub trait CanActivateChild: Send + Sync {
    fn can_activate_child(&self, child: &ActivatedRouteSnapshot, state: &RouterStateSnapshot) -> GuardResult;
}

pub trait CanDeactivate: Send + Sync {
    fn can_deactivate(
        &self,
        component: Option<&ComponentId>,
        current_route: &ActivatedRouteSnapshot,
        current_state: &RouterStateSnapshot,
        next_state: &RouterStateSnapshot,
    ) -> GuardResult;
}

pub trait Resolve: Send + Sync {
    fn resolve(&self, route: &ActivatedRouteSnapshot, state: &RouterStateSnapshot) -> ResolveResult;
}

impl<F> CanActivate for F
where
    F: Fn(&ActivatedRouteSnapshot, &RouterStateSnapshot) -> GuardResult + Send + Sync,
{
    fn can_activate(&self, route: &ActivatedRouteSnapshot, state: &RouterStateSnapshot) -> GuardResult {
        self(route, state)
    }
}

impl<F> Resolve for F
where
    F: Fn(&ActivatedRouteSnapshot, &RouterStateSnapshot) -> ResolveResult + Send + Sync,
{
    fn resolve(&self, route: &ActivatedRouteSnapshot, state: &RouterStateSnapshot) -> ResolveResult {
        self(route, state)
    }
}

impl<F> CanActivateChild for F
where
    F: Fn(&ActivatedRouteSnapshot, &RouterStateSnapshot) -> GuardResult + Send + Sync,
{
    fn can_activate_child(&self, child: &ActivatedRouteSnapshot, state: &RouterStateSnapshot) -> GuardResult {
        self(child, state)
    }
}

impl<F> CanDeactivate for F
where
    F: Fn(Option<&ComponentId>, &ActivatedRouteSnapshot, &RouterStateSnapshot, &RouterStateSnapshot) -> GuardResult
        + Send
        + Sync,
{
    fn can_deactivate(
        &self,
        component: Option<&ComponentId>,
        current_route: &ActivatedRouteSnapshot,
        current_state: &RouterStateSnapshot,
        next_state: &RouterStateSnapshot,
    ) -> GuardResult {
        self(component, current_route, current_state, next_state)
    }
}

/// A named set of guard and resolver registrations with an optional parent.
pub struct ProviderScope {
    name: String,
    parent: Option<Arc<ProviderScope>>,
    can_activate: HashMap<Token, Arc<dyn CanActivate>>,
    can_activate_child: HashMap<Token, Arc<dyn CanActivateChild>>,
    can_deactivate: HashMap<Token, Arc<dyn CanDeactivate>>,
    resolvers: HashMap<Token, Arc<dyn Resolve>>,
}

impl ProviderScope {
    pub fn builder(name: impl Into<String>) -> ProviderScopeBuilder {
        ProviderScopeBuilder {
            scope: ProviderScope {
                name: name.into(),
                parent: None,
                can_activate: HashMap::new(),
                can_activate_child: HashMap::new(),
                can_deactivate: HashMap::new(),
                resolvers: HashMap::new(),
            },
        }
    }

    /// Scope with no registrations.
    pub fn empty(name: impl Into<String>) -> Arc<Self> {
        Self::builder(name).build()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Arc<ProviderScope>> {
        self.parent.as_ref()
    }

    fn lookup<V: ?Sized>(
        &self,
        token: &Token,
        kind: &'static str,
        select: impl Fn(&ProviderScope) -> &HashMap<Token, Arc<V>>,
    ) -> Result<Arc<V>> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if let Some(found) = select(current).get(token) {
                return Ok(Arc::clone(found));
            }
            scope = current.parent.as_deref();
        }
        Err(StateError::MissingProvider {
            kind,
            token: token.to_string(),
        })
    }

    pub fn can_activate(&self, token: &Token) -> Result<Arc<dyn CanActivate>> {
        self.lookup(token, "CanActivate", |s| &s.can_activate)
    }

    pub fn can_activate_child(&self, token: &Token) -> Result<Arc<dyn CanActivateChild>> {
        self.lookup(token, "CanActivateChild", |s| &s.can_activate_child)
    }

    pub fn can_deactivate(&self, token: &Token) -> Result<Arc<dyn CanDeactivate>> {
        self.lookup(token, "CanDeactivate", |s| &s.can_deactivate)
    }

    pub fn resolver(&self, token: &Token) -> Result<Arc<dyn Resolve>> {
        self.lookup(token, "Resolve", |s| &s.resolvers)
    }
}

impl fmt::Debug for ProviderScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderScope")
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(|p| p.name.clone()))
            .finish_non_exhaustive()
    }
}

pub struct ProviderScopeBuilder {
    scope: ProviderScope,
}

impl ProviderScopeBuilder {
    pub fn parent(mut self, parent: Arc<ProviderScope>) -> Self {
        self.scope.parent = Some(parent);
        self
    }

    pub fn can_activate(mut self, token: impl Into<Token>, guard: impl CanActivate + 'static) -> Self {
        self.scope.can_activate.insert(token.into(), Arc::new(guard));
        self
    }

    pub fn can_activate_child(mut self, token: impl Into<Token>, guard: impl CanActivateChild + 'static) -> Self {
        self.scope.can_activate_child.insert(token.into(), Arc::new(guard));
        self
    }

    pub fn can_deactivate(mut self, token: impl Into<Token>, guard: impl CanDeactivate + 'static) -> Self {
        self.scope.can_deactivate.insert(token.into(), Arc::new(guard));
        self
    }

    pub fn resolver(mut self, token: impl Into<Token>, resolver: impl Resolve + 'static) -> Self {
        self.scope.resolvers.insert(token.into(), Arc::new(resolver));
        self
    }

    pub fn build(self) -> Arc<ProviderScope> {
        Arc::new(self.scope)
    }
}
