//! Waymark Core
//!
//! Turns requested URLs into committed router state:
//! recognize → diff → exit guards → entry guards → resolve → commit.
//! Every attempt is numbered; a newer attempt silently supersedes older ones.

mod commands;
mod config;
mod error;
mod events;
mod navigation;
mod phase;
mod router;

pub use commands::{create_url_tree, Command};
pub use config::{
    CanceledNavigationResolution, MalformedUrlPolicy, OnSameUrlNavigation, RouterConfig,
    UrlUpdateStrategy,
};
pub use error::RouterError;
pub use events::{NavigationCancellationCode, NavigationSkippedCode, RouterEvent};
pub use navigation::{Navigation, NavigationExtras, NavigationTrigger, QueryParamsHandling};
pub use phase::NavigationPhase;
pub use router::{Router, RouterBuilder};

// Re-export the pipeline crates
pub use waymark_guards::{GuardError, ResolveOutcome, Verdict};
pub use waymark_location::{
    HistoryState, Location, LocationError, MemoryLocation, PersistentLocation, PopStateEvent,
    PopStateKind,
};
pub use waymark_recognize::RecognizeError;
pub use waymark_state::{
    ActivatedRoute, ActivatedRouteSnapshot, BoxError, CanActivate, CanActivateChild,
    CanDeactivate, ChildrenOutletContexts, ComponentId, Data, GuardResult, NodeId,
    ParamsInheritanceStrategy, PathMatch, ProviderScope, Resolution, Resolve, ResolveResult,
    Route, RouterState, RouterStateSnapshot, RunGuardsAndResolvers, Token,
};
pub use waymark_storage::{Database, StorageError};
pub use waymark_url::{
    DefaultUrlSerializer, IsActiveMatchOptions, Params, UrlError, UrlSegment, UrlSegmentGroup,
    UrlSerializer, UrlTree, PRIMARY_OUTLET,
};

pub type Result<T> = std::result::Result<T, RouterError>;

/// Initialize logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(true).init();
}
