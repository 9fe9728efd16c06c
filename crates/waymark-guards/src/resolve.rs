//! Data resolution
//!
//! Entry checks are resolved one after another so later routes see the data
//! their ancestors just received. All resolvers of a single route run at once.

use futures_util::future::try_join_all;
use serde_json::Value;
use std::collections::HashSet;

use waymark_state::{Data, NodeId, ParamsInheritanceStrategy, ProviderScope, ResolveResult, RouterStateSnapshot};

use crate::diff::Checks;
use crate::error::GuardError;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    Resolved,
    /// A resolver finished without producing a value.
    Starved,
}

enum Halt {
    Starved,
    Error(GuardError),
}

async fn first_value(key: String, result: ResolveResult) -> std::result::Result<(String, Value), Halt> {
    match result.first().await {
        Ok(Some(value)) => Ok((key, value)),
        Ok(None) => Err(Halt::Starved),
        Err(source) => Err(Halt::Error(GuardError::Resolver { key, source })),
    }
}

/// Runs every resolver declared on `id`. `None` means one of them starved.
async fn resolve_node(
    future: &RouterStateSnapshot,
    id: NodeId,
    root_scope: &ProviderScope,
) -> Result<Option<Data>> {
    let route = future.node(id);
    let Some(config) = &route.route_config else {
        return Ok(Some(Data::new()));
    };
    if config.resolve.is_empty() {
        return Ok(Some(Data::new()));
    }

    let found = future.closest_scope(id);
    let scope = found.as_deref().unwrap_or(root_scope);

    let mut pending = Vec::with_capacity(config.resolve.len());
    for (key, token) in &config.resolve {
        let resolver = scope.resolver(token)?;
        pending.push(first_value(key.clone(), resolver.resolve(route, future)));
    }

    match try_join_all(pending).await {
        Ok(values) => Ok(Some(values.into_iter().collect())),
        Err(Halt::Starved) => Ok(None),
        Err(Halt::Error(error)) => Err(error),
    }
}

/// Resolves data for every entry check and rewrites inherited data below
/// them. On [`ResolveOutcome::Starved`] the candidate must be discarded.
pub async fn resolve_data(
    future: &mut RouterStateSnapshot,
    checks: &Checks,
    strategy: ParamsInheritanceStrategy,
    root_scope: &ProviderScope,
) -> Result<ResolveOutcome> {
    if checks.can_activate.is_empty() {
        return Ok(ResolveOutcome::Resolved);
    }

    let targets: HashSet<NodeId> = checks.can_activate.iter().map(|c| c.route()).collect();
    let mut order = Vec::new();
    let mut visited = HashSet::new();
    for check in &checks.can_activate {
        let route = check.route();
        if visited.contains(&route) {
            continue;
        }
        for id in future.descendants(route) {
            if visited.insert(id) {
                order.push(id);
            }
        }
    }

    for id in order {
        if targets.contains(&id) {
            let Some(resolved) = resolve_node(future, id, root_scope).await? else {
                tracing::debug!(route = %id, "Resolver completed without a value");
                return Ok(ResolveOutcome::Starved);
            };
            future.node_mut(id).resolved_data = resolved;
        }
        let data = future.inherited(id, strategy).resolve;
        future.node_mut(id).data = data;
    }

    Ok(ResolveOutcome::Resolved)
}
