mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{config, drain, names, router_with};
use futures::stream;
use serde_json::{json, Value};
use waymark_core::{
    ActivatedRouteSnapshot, BoxError, Location, NavigationCancellationCode, NavigationExtras, ProviderScope,
    ResolveResult, Route, RouterError, RouterEvent, RouterStateSnapshot,
};

fn delayed(value: Value, millis: u64) -> ResolveResult {
    ResolveResult::future(async move {
        tokio::time::sleep(Duration::from_millis(millis)).await;
        Ok(value)
    })
}

fn scope(calls: Arc<AtomicUsize>) -> Arc<ProviderScope> {
    ProviderScope::builder("root")
        .resolver("user", move |route: &ActivatedRouteSnapshot, _: &RouterStateSnapshot| {
            calls.fetch_add(1, Ordering::SeqCst);
            let id = route.params.get("id").cloned().unwrap_or_default();
            delayed(json!({ "id": id }), 60)
        })
        .resolver("perms", |_: &ActivatedRouteSnapshot, _: &RouterStateSnapshot| {
            delayed(json!(["read", "write"]), 50)
        })
        .resolver("silent", |_: &ActivatedRouteSnapshot, _: &RouterStateSnapshot| {
            ResolveResult::stream(stream::empty::<Result<Value, BoxError>>())
        })
        .resolver("offline", |_: &ActivatedRouteSnapshot, _: &RouterStateSnapshot| {
            ResolveResult::failed("database offline")
        })
        .build()
}

fn routes() -> Vec<Route> {
    vec![
        Route::new("home").component("Home"),
        Route::new("account/:id")
            .component("Account")
            .resolve("user", "user")
            .resolve("perms", "perms")
            .children([Route::new("").component("Overview")]),
        Route::new("audit").component("Audit").resolve("log", "silent"),
        Route::new("reports").component("Reports").resolve("rows", "offline"),
        Route::new("group")
            .data("section", json!("group"))
            .children([Route::new("detail")
                .component("Detail")
                .data("section", json!("detail"))
                .resolve("perms", "perms")]),
        Route::new("static/:id")
            .component("Static")
            .data("title", json!("Static"))
            .resolve("user", "user"),
    ]
}

#[tokio::test]
async fn test_two_async_resolvers() {
    let (router, _) = router_with(routes(), scope(Arc::default()), config());

    let started = tokio::time::Instant::now();
    assert!(router
        .navigate_by_url("/account/7", NavigationExtras::default())
        .await
        .unwrap());
    // both resolvers of one route run side by side
    assert!(started.elapsed() < Duration::from_millis(110));

    let snapshot = router.snapshot();
    let account = snapshot.tree().find(|r| r.path() == "account/:id").unwrap();
    let data = &snapshot.node(account).data;
    assert_eq!(data.get("user"), Some(&json!({ "id": "7" })));
    assert_eq!(data.get("perms"), Some(&json!(["read", "write"])));
    assert_eq!(snapshot.node(account).resolved_data.len(), 2);

    let overview = snapshot.primary_leaf();
    assert_eq!(overview.component.as_deref(), Some("Overview"));
    assert_eq!(overview.data.get("perms"), Some(&json!(["read", "write"])));

    let live = router.router_state();
    let handle = live.route_for(account).unwrap();
    assert_eq!(handle.data().borrow().get("user"), Some(&json!({ "id": "7" })));
}

#[tokio::test]
async fn test_starved_resolver_cancels_silently() {
    let (router, location) = router_with(routes(), scope(Arc::default()), config());
    router.navigate_by_url("/home", NavigationExtras::default()).await.unwrap();
    let mut events = router.events();

    assert!(!router.navigate_by_url("/audit", NavigationExtras::default()).await.unwrap());

    assert_eq!(router.url(), "/home");
    assert_eq!(location.path(), "/home");
    let seen = drain(&mut events);
    assert_eq!(
        names(&seen),
        vec![
            "NavigationStart",
            "RoutesRecognized",
            "GuardsCheckStart",
            "ChildActivationStart",
            "ActivationStart",
            "GuardsCheckEnd",
            "ResolveStart",
            "NavigationCancel",
        ]
    );
    assert!(matches!(
        seen.last(),
        Some(RouterEvent::NavigationCancel { code: NavigationCancellationCode::NoDataFromResolver, .. })
    ));
}

#[tokio::test]
async fn test_resolver_error_surfaces() {
    let (router, _) = router_with(routes(), scope(Arc::default()), config());
    router.navigate_by_url("/home", NavigationExtras::default()).await.unwrap();
    let mut events = router.events();

    let err = router
        .navigate_by_url("/reports", NavigationExtras::default())
        .await
        .unwrap_err();
    assert!(matches!(err, RouterError::Guard(_)));
    assert!(err.to_string().contains("database offline"));
    assert_eq!(router.url(), "/home");
    assert!(matches!(
        drain(&mut events).last(),
        Some(RouterEvent::NavigationError { .. })
    ));
}

#[tokio::test]
async fn test_unchanged_params_keep_resolved_data() {
    let calls = Arc::new(AtomicUsize::new(0));
    let (router, _) = router_with(routes(), scope(calls.clone()), config());

    router
        .navigate_by_url("/static/1", NavigationExtras::default())
        .await
        .unwrap();
    // query params alone do not re-run resolvers under the default policy
    router
        .navigate_by_url("/static/1?view=full", NavigationExtras::default())
        .await
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let leaf = router.snapshot().primary_leaf().clone();
    assert_eq!(leaf.data.get("user"), Some(&json!({ "id": "1" })));
    assert_eq!(leaf.data.get("title"), Some(&json!("Static")));

    router
        .navigate_by_url("/static/2", NavigationExtras::default())
        .await
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        router.snapshot().primary_leaf().data.get("user"),
        Some(&json!({ "id": "2" }))
    );
}

#[tokio::test]
async fn test_componentless_parent_data_overlays_child_static_data() {
    let (router, _) = router_with(routes(), scope(Arc::default()), config());

    assert!(router
        .navigate_by_url("/group/detail", NavigationExtras::default())
        .await
        .unwrap());

    let snapshot = router.snapshot();
    let detail = snapshot.primary_leaf();
    assert_eq!(detail.component.as_deref(), Some("Detail"));
    assert_eq!(detail.data.get("section"), Some(&json!("group")));
    assert_eq!(detail.data.get("perms"), Some(&json!(["read", "write"])));
}
