//! Router events
//!
//! Broadcast in a fixed order for every navigation:
//! NavigationStart, RoutesRecognized, GuardsCheckStart, (ChildActivationStart,
//! ActivationStart)*, GuardsCheckEnd, ResolveStart, ResolveEnd,
//! (ActivationEnd, ChildActivationEnd)*, then exactly one of NavigationEnd,
//! NavigationCancel or NavigationError.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::navigation::NavigationTrigger;
use waymark_location::HistoryState;
use waymark_state::{ActivatedRouteSnapshot, RouterStateSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NavigationCancellationCode {
    SupersededByNewNavigation,
    GuardRejected,
    NoDataFromResolver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NavigationSkippedCode {
    IgnoredSameUrlNavigation,
}

#[derive(Debug, Clone)]
pub enum RouterEvent {
    NavigationStart {
        id: u64,
        url: String,
        trigger: NavigationTrigger,
        restored_state: Option<HistoryState>,
    },
    RoutesRecognized {
        id: u64,
        url: String,
        url_after_redirects: String,
        state: Arc<RouterStateSnapshot>,
    },
    GuardsCheckStart {
        id: u64,
        url: String,
        state: Arc<RouterStateSnapshot>,
    },
    ChildActivationStart {
        snapshot: ActivatedRouteSnapshot,
    },
    ActivationStart {
        snapshot: ActivatedRouteSnapshot,
    },
    GuardsCheckEnd {
        id: u64,
        url: String,
        should_activate: bool,
    },
    ResolveStart {
        id: u64,
        url: String,
    },
    ResolveEnd {
        id: u64,
        url: String,
        state: Arc<RouterStateSnapshot>,
    },
    ActivationEnd {
        snapshot: ActivatedRouteSnapshot,
    },
    ChildActivationEnd {
        snapshot: ActivatedRouteSnapshot,
    },
    NavigationEnd {
        id: u64,
        url: String,
        url_after_redirects: String,
    },
    NavigationCancel {
        id: u64,
        url: String,
        reason: String,
        code: NavigationCancellationCode,
    },
    NavigationError {
        id: u64,
        url: String,
        error: String,
    },
    NavigationSkipped {
        id: u64,
        url: String,
        code: NavigationSkippedCode,
    },
}

impl RouterEvent {
    /// Navigation id, for events that carry one.
    pub fn id(&self) -> Option<u64> {
        match self {
            Self::NavigationStart { id, .. }
            | Self::RoutesRecognized { id, .. }
            | Self::GuardsCheckStart { id, .. }
            | Self::GuardsCheckEnd { id, .. }
            | Self::ResolveStart { id, .. }
            | Self::ResolveEnd { id, .. }
            | Self::NavigationEnd { id, .. }
            | Self::NavigationCancel { id, .. }
            | Self::NavigationError { id, .. }
            | Self::NavigationSkipped { id, .. } => Some(*id),
            Self::ChildActivationStart { .. }
            | Self::ActivationStart { .. }
            | Self::ActivationEnd { .. }
            | Self::ChildActivationEnd { .. } => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::NavigationStart { .. } => "NavigationStart",
            Self::RoutesRecognized { .. } => "RoutesRecognized",
            Self::GuardsCheckStart { .. } => "GuardsCheckStart",
            Self::ChildActivationStart { .. } => "ChildActivationStart",
            Self::ActivationStart { .. } => "ActivationStart",
            Self::GuardsCheckEnd { .. } => "GuardsCheckEnd",
            Self::ResolveStart { .. } => "ResolveStart",
            Self::ResolveEnd { .. } => "ResolveEnd",
            Self::ActivationEnd { .. } => "ActivationEnd",
            Self::ChildActivationEnd { .. } => "ChildActivationEnd",
            Self::NavigationEnd { .. } => "NavigationEnd",
            Self::NavigationCancel { .. } => "NavigationCancel",
            Self::NavigationError { .. } => "NavigationError",
            Self::NavigationSkipped { .. } => "NavigationSkipped",
        }
    }

    /// True for the event that ends a navigation.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::NavigationEnd { .. }
                | Self::NavigationCancel { .. }
                | Self::NavigationError { .. }
                | Self::NavigationSkipped { .. }
        )
    }
}

impl fmt::Display for RouterEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NavigationStart { id, url, .. }
            | Self::GuardsCheckStart { id, url, .. }
            | Self::ResolveStart { id, url }
            | Self::ResolveEnd { id, url, .. }
            | Self::NavigationSkipped { id, url, .. } => {
                write!(f, "{}(id: {}, url: '{}')", self.name(), id, url)
            }
            Self::RoutesRecognized { id, url, url_after_redirects, .. }
            | Self::NavigationEnd { id, url, url_after_redirects } => write!(
                f,
                "{}(id: {}, url: '{}', urlAfterRedirects: '{}')",
                self.name(),
                id,
                url,
                url_after_redirects
            ),
            Self::GuardsCheckEnd { id, url, should_activate } => write!(
                f,
                "{}(id: {}, url: '{}', shouldActivate: {})",
                self.name(),
                id,
                url,
                should_activate
            ),
            Self::NavigationCancel { id, url, reason, .. } => {
                write!(f, "{}(id: {}, url: '{}', reason: {})", self.name(), id, url, reason)
            }
            Self::NavigationError { id, url, error } => {
                write!(f, "{}(id: {}, url: '{}', error: {})", self.name(), id, url, error)
            }
            Self::ChildActivationStart { snapshot }
            | Self::ActivationStart { snapshot }
            | Self::ActivationEnd { snapshot }
            | Self::ChildActivationEnd { snapshot } => {
                write!(f, "{}(path: '{}')", self.name(), snapshot.path())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_ids() {
        let end = RouterEvent::NavigationEnd {
            id: 4,
            url: "/a".into(),
            url_after_redirects: "/a".into(),
        };
        assert_eq!(end.to_string(), "NavigationEnd(id: 4, url: '/a', urlAfterRedirects: '/a')");
        assert_eq!(end.id(), Some(4));
        assert!(end.is_terminal());

        let start = RouterEvent::ActivationStart {
            snapshot: ActivatedRouteSnapshot::root(Default::default(), None, None),
        };
        assert_eq!(start.id(), None);
        assert!(!start.is_terminal());
        assert_eq!(start.to_string(), "ActivationStart(path: '')");
    }
}
