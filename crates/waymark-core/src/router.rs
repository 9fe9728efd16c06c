//! Navigation orchestration
//!
//! Every request gets the next navigation id and becomes the latest attempt.
//! An attempt checks that it is still the latest after each suspension point
//! and quietly gives up as soon as a newer one has started. The committed
//! snapshot and URL are written once, under the state lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::commands::{create_url_tree, Command};
use crate::config::{
    CanceledNavigationResolution, MalformedUrlPolicy, OnSameUrlNavigation, RouterConfig,
    UrlUpdateStrategy,
};
use crate::events::{NavigationCancellationCode, NavigationSkippedCode, RouterEvent};
use crate::navigation::{Navigation, NavigationExtras, NavigationTrigger};
use crate::phase::NavigationPhase;
use crate::Result;
use waymark_guards::{collect_checks, resolve_data, run_guards, ActivationEvent, ResolveOutcome};
use waymark_location::{HistoryState, Location, MemoryLocation, PopStateEvent};
use waymark_recognize::recognize;
use waymark_state::{
    ChildrenOutletContexts, NodeId, ProviderScope, Route, RouterState, RouterStateSnapshot,
};
use waymark_url::{contains_tree, DefaultUrlSerializer, IsActiveMatchOptions, UrlSerializer, UrlTree};

const EVENT_CAPACITY: usize = 256;

/// The last successful navigation.
struct Committed {
    url_tree: UrlTree,
    url: String,
    state: RouterState,
    outlets: ChildrenOutletContexts,
    page_id: i64,
    navigated: bool,
    navigation_id: u64,
}

struct RouterInner {
    config: RouterConfig,
    routes: RwLock<Arc<Vec<Arc<Route>>>>,
    root_scope: Arc<ProviderScope>,
    serializer: Arc<dyn UrlSerializer>,
    location: Arc<dyn Location>,
    events: broadcast::Sender<RouterEvent>,
    latest_id: AtomicU64,
    committed: RwLock<Committed>,
    current: RwLock<Option<Navigation>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

/// Per-attempt bookkeeping.
struct Attempt {
    id: u64,
    trigger: NavigationTrigger,
    url_tree: UrlTree,
    url: String,
    extras: NavigationExtras,
    replace: bool,
    target_page_id: i64,
    location_written: bool,
}

enum Outcome {
    Committed,
    Cancelled {
        code: NavigationCancellationCode,
        reason: String,
    },
}

impl Outcome {
    fn superseded(id: u64) -> Self {
        Self::Cancelled {
            code: NavigationCancellationCode::SupersededByNewNavigation,
            reason: format!("Navigation ID {id} is not equal to the current navigation id"),
        }
    }
}

/// `ActivationEnd` for every child, then `ChildActivationEnd` for the parent,
/// deepest routes first.
fn activation_end_events(snapshot: &RouterStateSnapshot, id: NodeId, out: &mut Vec<RouterEvent>) {
    let children = snapshot.tree().children(id);
    for child in children {
        activation_end_events(snapshot, *child, out);
        out.push(RouterEvent::ActivationEnd {
            snapshot: snapshot.node(*child).clone(),
        });
    }
    if !children.is_empty() {
        out.push(RouterEvent::ChildActivationEnd {
            snapshot: snapshot.node(id).clone(),
        });
    }
}

#[derive(Default)]
pub struct RouterBuilder {
    routes: Vec<Arc<Route>>,
    root_scope: Option<Arc<ProviderScope>>,
    location: Option<Arc<dyn Location>>,
    serializer: Option<Arc<dyn UrlSerializer>>,
    config: RouterConfig,
}

impl RouterBuilder {
    pub fn routes<I, R>(mut self, routes: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Arc<Route>>,
    {
        self.routes = routes.into_iter().map(Into::into).collect();
        self
    }

    pub fn root_scope(mut self, scope: Arc<ProviderScope>) -> Self {
        self.root_scope = Some(scope);
        self
    }

    pub fn location(mut self, location: Arc<dyn Location>) -> Self {
        self.location = Some(location);
        self
    }

    pub fn serializer(mut self, serializer: Arc<dyn UrlSerializer>) -> Self {
        self.serializer = Some(serializer);
        self
    }

    pub fn config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Router {
        let serializer = self
            .serializer
            .unwrap_or_else(|| Arc::new(DefaultUrlSerializer));
        let url_tree = UrlTree::root_url();
        let snapshot = Arc::new(RouterStateSnapshot::empty(self.config.root_component.clone()));
        let committed = Committed {
            url: serializer.serialize(&url_tree),
            url_tree,
            state: RouterState::new(snapshot),
            outlets: ChildrenOutletContexts::new(),
            page_id: 0,
            navigated: false,
            navigation_id: 0,
        };
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Router {
            inner: Arc::new(RouterInner {
                config: self.config,
                routes: RwLock::new(Arc::new(self.routes)),
                root_scope: self.root_scope.unwrap_or_else(|| ProviderScope::empty("root")),
                serializer,
                location: self.location.unwrap_or_else(|| Arc::new(MemoryLocation::new())),
                events,
                latest_id: AtomicU64::new(0),
                committed: RwLock::new(committed),
                current: RwLock::new(None),
                listener: Mutex::new(None),
            }),
        }
    }
}

/// Handle to a router. Clones share the same state.
#[derive(Clone)]
pub struct Router {
    inner: Arc<RouterInner>,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::default()
    }

    // === State ===

    pub fn config(&self) -> &RouterConfig {
        &self.inner.config
    }

    pub fn location(&self) -> &Arc<dyn Location> {
        &self.inner.location
    }

    pub fn events(&self) -> broadcast::Receiver<RouterEvent> {
        self.inner.events.subscribe()
    }

    /// Committed URL.
    pub fn url(&self) -> String {
        self.inner.committed.read().url.clone()
    }

    pub fn url_tree(&self) -> UrlTree {
        self.inner.committed.read().url_tree.clone()
    }

    pub fn router_state(&self) -> RouterState {
        self.inner.committed.read().state.clone()
    }

    pub fn snapshot(&self) -> Arc<RouterStateSnapshot> {
        Arc::clone(self.inner.committed.read().state.snapshot())
    }

    pub fn outlet_contexts(&self) -> ChildrenOutletContexts {
        self.inner.committed.read().outlets.clone()
    }

    /// True once any navigation has committed.
    pub fn navigated(&self) -> bool {
        self.inner.committed.read().navigated
    }

    pub fn current_navigation(&self) -> Option<Navigation> {
        self.inner.current.read().clone()
    }

    pub fn parse_url(&self, url: &str) -> Result<UrlTree> {
        Ok(self.inner.serializer.parse(url)?)
    }

    pub fn serialize_url(&self, tree: &UrlTree) -> String {
        self.inner.serializer.serialize(tree)
    }

    pub fn is_active(&self, url: &UrlTree, options: impl Into<IsActiveMatchOptions>) -> bool {
        contains_tree(&self.inner.committed.read().url_tree, url, options.into())
    }

    /// Replaces the route table used by later navigations.
    pub fn reset_config<I, R>(&self, routes: I)
    where
        I: IntoIterator<Item = R>,
        R: Into<Arc<Route>>,
    {
        let routes: Vec<Arc<Route>> = routes.into_iter().map(Into::into).collect();
        tracing::info!(routes = routes.len(), "Route config reset");
        *self.inner.routes.write() = Arc::new(routes);
    }

    // === Navigation ===

    pub fn create_url_tree(&self, commands: &[Command], extras: &NavigationExtras) -> Result<UrlTree> {
        let committed = self.inner.committed.read();
        let handling = extras
            .query_params_handling
            .unwrap_or(self.inner.config.default_query_params_handling);
        let query_params = handling.apply(&committed.url_tree.query_params, extras.query_params.as_ref());
        let fragment = if extras.preserve_fragment {
            committed.url_tree.fragment.clone()
        } else {
            extras.fragment.clone()
        };

        create_url_tree(
            &committed.url_tree,
            committed.state.snapshot(),
            extras.relative_to,
            commands,
            query_params,
            fragment,
        )
    }

    pub async fn navigate(&self, commands: &[Command], extras: NavigationExtras) -> Result<bool> {
        let tree = self.create_url_tree(commands, &extras)?;
        self.navigate_by_url_tree(tree, extras).await
    }

    /// `Ok(true)` when the navigation committed or was skipped, `Ok(false)`
    /// when it was rejected, starved or superseded.
    pub async fn navigate_by_url(&self, url: &str, extras: NavigationExtras) -> Result<bool> {
        let tree = self.parse_or_recover(url)?;
        self.navigate_by_url_tree(tree, extras).await
    }

    pub async fn navigate_by_url_tree(&self, tree: UrlTree, extras: NavigationExtras) -> Result<bool> {
        self.schedule(tree, NavigationTrigger::Imperative, None, extras).await
    }

    /// Navigates to whatever the location currently shows.
    pub async fn initial_navigation(&self) -> Result<bool> {
        let path = self.inner.location.path();
        let tree = self.parse_or_recover(&path)?;
        let restored = self.inner.location.state();
        self.schedule(
            tree,
            NavigationTrigger::Imperative,
            restored,
            NavigationExtras::default().replace_url(),
        )
        .await
    }

    /// Starts forwarding location changes into navigations. Calling it again
    /// while a listener runs does nothing.
    pub fn listen_to_location(&self) {
        let mut listener = self.inner.listener.lock();
        if listener.is_some() {
            return;
        }

        let mut changes = self.inner.location.subscribe();
        let router = self.clone();
        *listener = Some(tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(event) => {
                        let router = router.clone();
                        tokio::spawn(async move {
                            let url = event.url.clone();
                            if let Err(e) = router.navigate_from_location(event).await {
                                tracing::warn!(url = %url, error = %e, "Location change navigation failed");
                            }
                        });
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Location listener lagged behind");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }));
        tracing::debug!("Listening to location changes");
    }

    /// Stops the location listener.
    pub fn dispose(&self) {
        if let Some(handle) = self.inner.listener.lock().take() {
            handle.abort();
        }
    }

    async fn navigate_from_location(&self, event: PopStateEvent) -> Result<bool> {
        let tree = self.parse_or_recover(&event.url)?;
        self.schedule(tree, event.kind.into(), event.state, NavigationExtras::default())
            .await
    }

    fn parse_or_recover(&self, url: &str) -> Result<UrlTree> {
        match self.inner.serializer.parse(url) {
            Ok(tree) => Ok(tree),
            Err(e) if self.inner.config.malformed_url == MalformedUrlPolicy::Root => {
                tracing::warn!(url = %url, error = %e, "Malformed URL, navigating to root");
                Ok(UrlTree::root_url())
            }
            Err(e) => Err(e.into()),
        }
    }

    // === Pipeline ===

    fn is_stale(&self, id: u64) -> bool {
        self.inner.latest_id.load(Ordering::SeqCst) != id
    }

    fn emit(&self, event: RouterEvent) {
        tracing::trace!(event = %event, "Router event");
        let _ = self.inner.events.send(event);
    }

    fn set_phase(&self, id: u64, phase: NavigationPhase) {
        let mut current = self.inner.current.write();
        if let Some(navigation) = current.as_mut().filter(|n| n.id == id) {
            if !navigation.phase.can_transition_to(phase) {
                tracing::warn!(
                    navigation_id = id,
                    from = %navigation.phase,
                    to = %phase,
                    "Unexpected navigation phase transition"
                );
            }
            tracing::debug!(navigation_id = id, phase = %phase, "Navigation phase");
            navigation.phase = phase;
        }
    }

    /// Ends the attempt's entry in `current_navigation`, if it still owns it.
    fn finish(&self, id: u64, phase: NavigationPhase) {
        self.set_phase(id, phase);
        let mut current = self.inner.current.write();
        if current.as_ref().is_some_and(|n| n.id == id) {
            *current = None;
        }
    }

    async fn schedule(
        &self,
        url_tree: UrlTree,
        trigger: NavigationTrigger,
        restored_state: Option<HistoryState>,
        extras: NavigationExtras,
    ) -> Result<bool> {
        let id = self.inner.latest_id.fetch_add(1, Ordering::SeqCst) + 1;
        let url = self.inner.serializer.serialize(&url_tree);
        let (previous_url, current_page_id, navigated) = {
            let committed = self.inner.committed.read();
            (committed.url.clone(), committed.page_id, committed.navigated)
        };

        *self.inner.current.write() = Some(Navigation {
            id,
            trigger,
            previous_url: previous_url.clone(),
            extracted_url: url_tree.clone(),
            final_url: None,
            extras: extras.clone(),
            restored_state: restored_state.clone(),
            phase: NavigationPhase::Idle,
        });
        self.set_phase(id, NavigationPhase::CheckingSameUrl);

        let mode = extras
            .on_same_url_navigation
            .unwrap_or(self.inner.config.on_same_url_navigation);
        if navigated && mode == OnSameUrlNavigation::Ignore && url == previous_url {
            tracing::debug!(navigation_id = id, url = %url, "Ignoring navigation to the current URL");
            self.emit(RouterEvent::NavigationSkipped {
                id,
                url,
                code: NavigationSkippedCode::IgnoredSameUrlNavigation,
            });
            self.finish(id, NavigationPhase::Idle);
            return Ok(true);
        }

        let replace = extras.replace_url
            || trigger != NavigationTrigger::Imperative
            || self.inner.location.is_current_path_equal_to(&url);
        let target_page_id = match &restored_state {
            Some(state) => state.page_id,
            None if replace || extras.skip_location_change => current_page_id,
            None => current_page_id + 1,
        };

        tracing::info!(navigation_id = id, url = %url, trigger = ?trigger, "Navigation started");
        self.emit(RouterEvent::NavigationStart {
            id,
            url: url.clone(),
            trigger,
            restored_state,
        });

        let mut attempt = Attempt {
            id,
            trigger,
            url_tree,
            url,
            extras,
            replace,
            target_page_id,
            location_written: false,
        };

        let result = match self.write_location_eagerly(&mut attempt) {
            Ok(()) => self.run(&mut attempt).await,
            Err(e) => Err(e),
        };
        // A newer attempt owns the outcome; late failures of this one are dropped
        let result = match result {
            Err(e) if self.is_stale(id) => {
                tracing::debug!(navigation_id = id, error = %e, "Dropping failure of a superseded navigation");
                Ok(Outcome::superseded(id))
            }
            other => other,
        };

        match result {
            Ok(Outcome::Committed) => {
                self.finish(id, NavigationPhase::Idle);
                Ok(true)
            }
            Ok(Outcome::Cancelled { code, reason }) => {
                if code == NavigationCancellationCode::SupersededByNewNavigation {
                    tracing::debug!(navigation_id = id, "Navigation superseded");
                } else {
                    tracing::warn!(navigation_id = id, url = %attempt.url, reason = %reason, "Navigation cancelled");
                    self.restore_location();
                }
                self.emit(RouterEvent::NavigationCancel {
                    id,
                    url: attempt.url.clone(),
                    reason,
                    code,
                });
                self.finish(id, NavigationPhase::Cancelled);
                Ok(false)
            }
            Err(e) => {
                tracing::error!(navigation_id = id, url = %attempt.url, error = %e, "Navigation failed");
                self.restore_location();
                self.emit(RouterEvent::NavigationError {
                    id,
                    url: attempt.url.clone(),
                    error: e.to_string(),
                });
                self.finish(id, NavigationPhase::Errored);
                Err(e)
            }
        }
    }

    async fn run(&self, attempt: &mut Attempt) -> Result<Outcome> {
        let id = attempt.id;
        let strategy = self.inner.config.params_inheritance_strategy;

        self.set_phase(id, NavigationPhase::Recognizing);
        let routes = Arc::clone(&*self.inner.routes.read());
        let (current, outlets) = {
            let committed = self.inner.committed.read();
            (Arc::clone(committed.state.snapshot()), committed.outlets.clone())
        };
        let mut future = recognize(
            self.inner.config.root_component.clone(),
            &routes,
            &attempt.url_tree,
            self.inner.serializer.as_ref(),
            strategy,
        )?;
        if let Some(navigation) = self.inner.current.write().as_mut().filter(|n| n.id == id) {
            navigation.final_url = Some(attempt.url_tree.clone());
        }
        self.emit(RouterEvent::RoutesRecognized {
            id,
            url: attempt.url.clone(),
            url_after_redirects: attempt.url.clone(),
            state: Arc::new(future.clone()),
        });

        self.set_phase(id, NavigationPhase::Diffing);
        let checks = collect_checks(&mut future, Some(&*current), &outlets);
        tracing::debug!(
            navigation_id = id,
            can_activate = checks.can_activate.len(),
            can_deactivate = checks.can_deactivate.len(),
            "Checks collected"
        );

        self.set_phase(id, NavigationPhase::ExitGuards);
        self.emit(RouterEvent::GuardsCheckStart {
            id,
            url: attempt.url.clone(),
            state: Arc::new(future.clone()),
        });
        let should_activate = {
            let candidate = &future;
            let mut entered = false;
            run_guards(candidate, &current, &checks, &self.inner.root_scope, |event| {
                if !entered {
                    entered = true;
                    self.set_phase(id, NavigationPhase::EntryGuards);
                }
                self.emit(match event {
                    ActivationEvent::ChildActivationStart(node) => RouterEvent::ChildActivationStart {
                        snapshot: candidate.node(node).clone(),
                    },
                    ActivationEvent::ActivationStart(node) => RouterEvent::ActivationStart {
                        snapshot: candidate.node(node).clone(),
                    },
                });
            })
            .await?
        };
        if self.is_stale(id) {
            return Ok(Outcome::superseded(id));
        }
        self.emit(RouterEvent::GuardsCheckEnd {
            id,
            url: attempt.url.clone(),
            should_activate,
        });
        if !should_activate {
            return Ok(Outcome::Cancelled {
                code: NavigationCancellationCode::GuardRejected,
                reason: format!("Navigation to '{}' was rejected by a guard", attempt.url),
            });
        }

        self.set_phase(id, NavigationPhase::Resolving);
        self.emit(RouterEvent::ResolveStart {
            id,
            url: attempt.url.clone(),
        });
        let resolved = resolve_data(&mut future, &checks, strategy, &self.inner.root_scope).await?;
        if self.is_stale(id) {
            return Ok(Outcome::superseded(id));
        }
        if resolved == ResolveOutcome::Starved {
            return Ok(Outcome::Cancelled {
                code: NavigationCancellationCode::NoDataFromResolver,
                reason: format!("A resolver for '{}' completed without a value", attempt.url),
            });
        }
        let future = Arc::new(future);
        self.emit(RouterEvent::ResolveEnd {
            id,
            url: attempt.url.clone(),
            state: Arc::clone(&future),
        });

        self.set_phase(id, NavigationPhase::Committing);
        if !self.commit(attempt, Arc::clone(&future))? {
            return Ok(Outcome::superseded(id));
        }

        let mut ends = Vec::new();
        activation_end_events(&future, future.root_id(), &mut ends);
        for event in ends {
            self.emit(event);
        }
        self.emit(RouterEvent::NavigationEnd {
            id,
            url: attempt.url.clone(),
            url_after_redirects: attempt.url.clone(),
        });
        Ok(Outcome::Committed)
    }

    /// Writes location, state and URL together. `false` if the attempt went
    /// stale before it got the lock.
    fn commit(&self, attempt: &mut Attempt, future: Arc<RouterStateSnapshot>) -> Result<bool> {
        let mut committed = self.inner.committed.write();
        if self.is_stale(attempt.id) {
            return Ok(false);
        }

        if !attempt.extras.skip_location_change && !attempt.location_written {
            self.write_location(attempt)?;
        }

        committed.state = committed.state.advance(Arc::clone(&future));
        committed.outlets = ChildrenOutletContexts::from_snapshot(&future);
        committed.url_tree = attempt.url_tree.clone();
        committed.url = attempt.url.clone();
        committed.page_id = attempt.target_page_id;
        committed.navigated = true;
        committed.navigation_id = attempt.id;

        tracing::info!(navigation_id = attempt.id, url = %attempt.url, "Navigation committed");
        Ok(true)
    }

    fn write_location_eagerly(&self, attempt: &mut Attempt) -> Result<()> {
        if self.inner.config.url_update_strategy == UrlUpdateStrategy::Eager
            && attempt.trigger == NavigationTrigger::Imperative
            && !attempt.extras.skip_location_change
        {
            self.write_location(attempt)?;
        }
        Ok(())
    }

    fn write_location(&self, attempt: &mut Attempt) -> Result<()> {
        let state = HistoryState {
            navigation_id: attempt.id,
            page_id: attempt.target_page_id,
            extra: attempt.extras.state.clone(),
        };
        if attempt.replace {
            self.inner.location.replace_state(&attempt.url, state)?;
        } else {
            self.inner.location.go(&attempt.url, state)?;
        }
        attempt.location_written = true;
        Ok(())
    }

    /// Puts the location back on the committed URL after a failed attempt.
    fn restore_location(&self) {
        if let Err(e) = self.try_restore_location() {
            tracing::warn!(error = %e, "Failed to restore location");
        }
    }

    fn try_restore_location(&self) -> Result<()> {
        let (url, page_id, navigation_id) = {
            let committed = self.inner.committed.read();
            (committed.url.clone(), committed.page_id, committed.navigation_id)
        };
        let location = &self.inner.location;

        if self.inner.config.canceled_navigation_resolution == CanceledNavigationResolution::Computed {
            let browser_page_id = location.state().map_or(page_id, |s| s.page_id);
            let delta = page_id - browser_page_id;
            if delta != 0 {
                tracing::debug!(delta, "Restoring history position");
                location.history_go(delta)?;
                return Ok(());
            }
        }

        if !location.is_current_path_equal_to(&url) {
            let state = HistoryState {
                navigation_id,
                page_id,
                extra: None,
            };
            location.replace_state(&url, state)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("url", &self.url())
            .field("latest_id", &self.inner.latest_id.load(Ordering::SeqCst))
            .finish()
    }
}
