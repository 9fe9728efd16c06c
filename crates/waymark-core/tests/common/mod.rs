#![allow(dead_code)]

use std::sync::Arc;

use tokio::sync::broadcast;
use waymark_core::{
    ActivatedRouteSnapshot, GuardResult, MemoryLocation, ProviderScope, Route, Router,
    RouterConfig, RouterEvent, RouterStateSnapshot,
};

pub fn allow(_: &ActivatedRouteSnapshot, _: &RouterStateSnapshot) -> GuardResult {
    GuardResult::from(true)
}

pub fn deny(_: &ActivatedRouteSnapshot, _: &RouterStateSnapshot) -> GuardResult {
    GuardResult::from(false)
}

pub fn config() -> RouterConfig {
    RouterConfig {
        root_component: Some("App".into()),
        ..Default::default()
    }
}

pub fn router_with<I>(routes: I, scope: Arc<ProviderScope>, config: RouterConfig) -> (Router, Arc<MemoryLocation>)
where
    I: IntoIterator<Item = Route>,
{
    let location = Arc::new(MemoryLocation::new());
    let router = Router::builder()
        .routes(routes)
        .root_scope(scope)
        .location(location.clone())
        .config(config)
        .build();
    (router, location)
}

/// Everything broadcast so far.
pub fn drain(events: &mut broadcast::Receiver<RouterEvent>) -> Vec<RouterEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

pub fn names(events: &[RouterEvent]) -> Vec<&'static str> {
    events.iter().map(RouterEvent::name).collect()
}

/// Waits for the next terminal event.
pub async fn next_terminal(events: &mut broadcast::Receiver<RouterEvent>) -> RouterEvent {
    loop {
        let event = tokio::time::timeout(std::time::Duration::from_secs(2), events.recv())
            .await
            .expect("timed out waiting for navigation to finish")
            .expect("event channel closed");
        if event.is_terminal() {
            return event;
        }
    }
}
