//! Guard execution
//!
//! Exit guards run first, all at once. Entry checks follow one by one in
//! parent-to-child order; inside a check the child guards of every ancestor
//! and the route's own guards run together. The first `false` ends the run.

use futures_util::future::try_join_all;
use std::future::Future;

use waymark_state::{GuardResult, NodeId, ProviderScope, RouterStateSnapshot, Token};

use crate::diff::Checks;
use crate::error::GuardError;
use crate::Result;

/// Outcome of a single guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Deny,
}

/// Lifecycle notifications emitted while entry checks run. Ids refer to the
/// candidate snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationEvent {
    ChildActivationStart(NodeId),
    ActivationStart(NodeId),
}

/// Short-circuit signal carried through `try_join_all`.
enum Halt {
    Deny,
    Error(GuardError),
}

async fn evaluate(token: Token, result: GuardResult) -> std::result::Result<Verdict, Halt> {
    match result.first().await {
        Ok(Some(true)) => Ok(Verdict::Allow),
        Ok(Some(false)) => Err(Halt::Deny),
        Ok(None) => Err(Halt::Error(GuardError::EmptyGuard { token })),
        Err(source) => Err(Halt::Error(GuardError::Guard { token, source })),
    }
}

/// Awaits every pending guard, stopping at the first denial or failure.
async fn all_allow<I, F>(pending: I) -> Result<Verdict>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = std::result::Result<Verdict, Halt>>,
{
    match try_join_all(pending).await {
        Ok(_) => Ok(Verdict::Allow),
        Err(Halt::Deny) => Ok(Verdict::Deny),
        Err(Halt::Error(error)) => Err(error),
    }
}

async fn run_can_deactivate(
    future: &RouterStateSnapshot,
    current: &RouterStateSnapshot,
    checks: &Checks,
    root_scope: &ProviderScope,
) -> Result<Verdict> {
    let mut pending = Vec::new();
    for check in &checks.can_deactivate {
        let route = current.node(check.route);
        let Some(config) = &route.route_config else {
            continue;
        };
        let found = current.closest_scope(check.route);
        let scope = found.as_deref().unwrap_or(root_scope);
        for token in &config.can_deactivate {
            let guard = scope.can_deactivate(token)?;
            let result = guard.can_deactivate(check.component.as_ref(), route, current, future);
            pending.push(evaluate(token.clone(), result));
        }
    }
    all_allow(pending).await
}

/// Starts the child guards of every ancestor (nearest first) and the route's
/// own guards for one entry check.
fn start_can_activate(
    future: &RouterStateSnapshot,
    path: &[NodeId],
    root_scope: &ProviderScope,
) -> Result<Vec<(Token, GuardResult)>> {
    let Some((&target, ancestors)) = path.split_last() else {
        return Ok(Vec::new());
    };
    let route = future.node(target);
    let mut started = Vec::new();

    for ancestor in ancestors.iter().rev() {
        let Some(config) = &future.node(*ancestor).route_config else {
            continue;
        };
        if config.can_activate_child.is_empty() {
            continue;
        }
        let found = future.closest_scope(*ancestor);
        let scope = found.as_deref().unwrap_or(root_scope);
        for token in &config.can_activate_child {
            let guard = scope.can_activate_child(token)?;
            started.push((token.clone(), guard.can_activate_child(route, future)));
        }
    }

    if let Some(config) = &route.route_config {
        let found = future.closest_scope(target);
        let scope = found.as_deref().unwrap_or(root_scope);
        for token in &config.can_activate {
            let guard = scope.can_activate(token)?;
            started.push((token.clone(), guard.can_activate(route, future)));
        }
    }
    Ok(started)
}

async fn run_can_activate<F>(
    future: &RouterStateSnapshot,
    checks: &Checks,
    root_scope: &ProviderScope,
    forward_event: &mut F,
) -> Result<Verdict>
where
    F: FnMut(ActivationEvent),
{
    for check in &checks.can_activate {
        let target = check.route();
        if let Some(parent) = future.tree().parent(target) {
            forward_event(ActivationEvent::ChildActivationStart(parent));
        }
        forward_event(ActivationEvent::ActivationStart(target));

        let started = start_can_activate(future, &check.path, root_scope)?;
        let verdict = all_allow(started.into_iter().map(|(token, result)| evaluate(token, result))).await?;
        if verdict == Verdict::Deny {
            tracing::debug!(route = %target, "Entry guard denied activation");
            return Ok(Verdict::Deny);
        }
    }
    Ok(Verdict::Allow)
}

/// Runs exit guards, then entry guards. `Ok(false)` is a rejection; guard
/// failures come back as errors.
pub async fn run_guards<F>(
    future: &RouterStateSnapshot,
    current: &RouterStateSnapshot,
    checks: &Checks,
    root_scope: &ProviderScope,
    mut forward_event: F,
) -> Result<bool>
where
    F: FnMut(ActivationEvent),
{
    if checks.is_empty() {
        return Ok(true);
    }

    if run_can_deactivate(future, current, checks, root_scope).await? == Verdict::Deny {
        tracing::debug!("Exit guard denied deactivation");
        return Ok(false);
    }

    let verdict = run_can_activate(future, checks, root_scope, &mut forward_event).await?;
    Ok(verdict == Verdict::Allow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::collect_checks;
    use futures_util::stream;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};
    use waymark_state::{
        ActivatedRouteSnapshot, BoxError, CanDeactivate, ChildrenOutletContexts, ComponentId, Route, TreeNode,
    };
    use waymark_url::Params;

    fn node(config: &Arc<Route>) -> ActivatedRouteSnapshot {
        ActivatedRouteSnapshot::new(
            Vec::new(),
            Params::new(),
            Params::new(),
            None,
            config.data.clone(),
            config.outlet_name(),
            config.component.clone(),
            Some(Arc::clone(config)),
            1,
        )
    }

    fn chain(configs: &[&Arc<Route>]) -> RouterStateSnapshot {
        let mut tail: Option<TreeNode<ActivatedRouteSnapshot>> = None;
        for config in configs.iter().rev() {
            let children = tail.take().into_iter().collect();
            tail = Some(TreeNode::new(node(config), children));
        }
        RouterStateSnapshot::new(
            "/",
            TreeNode::new(
                ActivatedRouteSnapshot::root(Params::new(), None, Some("App".into())),
                tail.into_iter().collect(),
            ),
        )
    }

    fn allow(_: &ActivatedRouteSnapshot, _: &RouterStateSnapshot) -> GuardResult {
        GuardResult::from(true)
    }

    fn deny(_: &ActivatedRouteSnapshot, _: &RouterStateSnapshot) -> GuardResult {
        GuardResult::from(false)
    }

    async fn run(
        future: &mut RouterStateSnapshot,
        current: &RouterStateSnapshot,
        scope: &ProviderScope,
    ) -> (Result<bool>, Vec<ActivationEvent>) {
        let contexts = ChildrenOutletContexts::from_snapshot(current);
        let checks = collect_checks(future, Some(current), &contexts);
        let mut events = Vec::new();
        let result = run_guards(future, current, &checks, scope, |e| events.push(e)).await;
        (result, events)
    }

    #[tokio::test]
    async fn test_no_checks_allows() {
        let home = Arc::new(Route::new("home").component("Home"));
        let current = chain(&[&home]);
        let mut future = chain(&[&home]);
        let scope = ProviderScope::empty("root");
        let (result, events) = run(&mut future, &current, &scope).await;
        assert!(result.unwrap());
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_entry_guard_denies() {
        let home = Arc::new(Route::new("home").component("Home"));
        let admin = Arc::new(Route::new("admin").component("Admin").can_activate("auth"));
        let scope = ProviderScope::builder("root").can_activate("auth", deny).build();

        let mut future = chain(&[&admin]);
        let (result, events) = run(&mut future, &chain(&[&home]), &scope).await;
        assert!(!result.unwrap());

        let admin_id = future.tree().find(|n| n.path() == "admin").unwrap();
        assert_eq!(
            events,
            vec![
                ActivationEvent::ChildActivationStart(future.root_id()),
                ActivationEvent::ActivationStart(admin_id),
            ]
        );
    }

    #[tokio::test]
    async fn test_exit_guard_blocks_entry_guards() {
        let editor = Arc::new(Route::new("editor").component("Editor").can_deactivate("unsaved"));
        let other = Arc::new(Route::new("other").component("Other").can_activate("count"));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let seen: Arc<Mutex<Option<ComponentId>>> = Arc::new(Mutex::new(None));
        let seen_in_guard = Arc::clone(&seen);

        let scope = ProviderScope::builder("root")
            .can_deactivate(
                "unsaved",
                move |component: Option<&ComponentId>,
                      _: &ActivatedRouteSnapshot,
                      _: &RouterStateSnapshot,
                      _: &RouterStateSnapshot| {
                    *seen_in_guard.lock().unwrap() = component.cloned();
                    GuardResult::from(false)
                },
            )
            .can_activate("count", move |_: &ActivatedRouteSnapshot, _: &RouterStateSnapshot| {
                counter.fetch_add(1, Ordering::SeqCst);
                GuardResult::from(true)
            })
            .build();

        let (result, events) = run(&mut chain(&[&other]), &chain(&[&editor]), &scope).await;
        assert!(!result.unwrap());
        assert!(events.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(seen.lock().unwrap().as_deref(), Some("Editor"));
    }

    fn delayed_exit(verdict: bool, millis: u64) -> impl CanDeactivate + 'static {
        move |_: Option<&ComponentId>, _: &ActivatedRouteSnapshot, _: &RouterStateSnapshot, _: &RouterStateSnapshot| {
            GuardResult::future(async move {
                tokio::time::sleep(Duration::from_millis(millis)).await;
                Ok(verdict)
            })
        }
    }

    /// `/left(side:right)` with an exit guard on each outlet.
    fn side_by_side(left_token: &str, right_token: &str) -> RouterStateSnapshot {
        let left = Arc::new(Route::new("left").component("Left").can_deactivate(left_token));
        let right = Arc::new(Route::new("right").outlet("side").component("Right").can_deactivate(right_token));
        RouterStateSnapshot::new(
            "/left(side:right)",
            TreeNode::new(
                ActivatedRouteSnapshot::root(Params::new(), None, Some("App".into())),
                vec![TreeNode::leaf(node(&left)), TreeNode::leaf(node(&right))],
            ),
        )
    }

    #[tokio::test]
    async fn test_exit_guards_run_concurrently() {
        let home = Arc::new(Route::new("home").component("Home"));
        let scope = ProviderScope::builder("root")
            .can_deactivate("left", delayed_exit(true, 60))
            .can_deactivate("right", delayed_exit(true, 60))
            .build();

        let started = Instant::now();
        let (result, _) = run(&mut chain(&[&home]), &side_by_side("left", "right"), &scope).await;
        assert!(result.unwrap());
        assert!(started.elapsed() < Duration::from_millis(110));
    }

    #[tokio::test]
    async fn test_exit_denial_does_not_wait_for_slower_guards() {
        let home = Arc::new(Route::new("home").component("Home"));
        let scope = ProviderScope::builder("root")
            .can_deactivate("quick-no", delayed_exit(false, 10))
            .can_deactivate("slow-yes", delayed_exit(true, 400))
            .build();

        let started = Instant::now();
        let (result, events) = run(&mut chain(&[&home]), &side_by_side("slow-yes", "quick-no"), &scope).await;
        assert!(!result.unwrap());
        assert!(events.is_empty());
        assert!(started.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_child_guards_of_ancestors_run() {
        let home = Arc::new(Route::new("home").component("Home"));
        let leaf = Arc::new(Route::new("users").component("Users"));
        let admin = Arc::new(
            Route::new("admin")
                .component("Admin")
                .can_activate_child("children")
                .children(vec![Arc::clone(&leaf)]),
        );
        let seen = Arc::new(Mutex::new(Vec::new()));
        let record = Arc::clone(&seen);
        let scope = ProviderScope::builder("root")
            .can_activate_child("children", move |child: &ActivatedRouteSnapshot, _: &RouterStateSnapshot| {
                record.lock().unwrap().push(child.path().to_string());
                GuardResult::from(true)
            })
            .build();

        let (result, _) = run(&mut chain(&[&admin, &leaf]), &chain(&[&home]), &scope).await;
        assert!(result.unwrap());
        // admin's own check has no guarded ancestors; users sees admin's child guard
        assert_eq!(*seen.lock().unwrap(), vec!["users".to_string()]);
    }

    #[tokio::test]
    async fn test_guard_error_and_empty_stream() {
        let home = Arc::new(Route::new("home").component("Home"));
        let broken = Arc::new(Route::new("broken").component("Broken").can_activate("fail"));
        let silent = Arc::new(Route::new("silent").component("Silent").can_activate("empty"));
        let scope = ProviderScope::builder("root")
            .can_activate("fail", |_: &ActivatedRouteSnapshot, _: &RouterStateSnapshot| {
                GuardResult::failed("backend down")
            })
            .can_activate("empty", |_: &ActivatedRouteSnapshot, _: &RouterStateSnapshot| {
                GuardResult::stream(stream::empty::<std::result::Result<bool, BoxError>>())
            })
            .build();

        let (result, _) = run(&mut chain(&[&broken]), &chain(&[&home]), &scope).await;
        assert!(matches!(result, Err(GuardError::Guard { ref token, .. }) if token.as_str() == "fail"));

        let (result, _) = run(&mut chain(&[&silent]), &chain(&[&home]), &scope).await;
        assert!(matches!(result, Err(GuardError::EmptyGuard { .. })));
    }

    #[tokio::test]
    async fn test_loaded_scope_wins_over_root() {
        let home = Arc::new(Route::new("home").component("Home"));
        let lazy_scope = ProviderScope::builder("lazy").can_activate("auth", allow).build();
        let settings = Arc::new(Route::new("settings").component("Settings").can_activate("auth"));
        let admin = Arc::new(
            Route::new("admin")
                .component("Admin")
                .loaded(vec![Arc::clone(&settings)], lazy_scope),
        );
        let root = ProviderScope::builder("root").can_activate("auth", deny).build();

        let (result, _) = run(&mut chain(&[&admin, &settings]), &chain(&[&home]), &root).await;
        assert!(result.unwrap());
    }

    #[tokio::test]
    async fn test_missing_provider_is_error() {
        let home = Arc::new(Route::new("home").component("Home"));
        let admin = Arc::new(Route::new("admin").component("Admin").can_activate("nobody"));
        let scope = ProviderScope::empty("root");
        let (result, _) = run(&mut chain(&[&admin]), &chain(&[&home]), &scope).await;
        assert!(matches!(result, Err(GuardError::Provider(_))));
    }
}
