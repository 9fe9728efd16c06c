//! Navigation requests

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::OnSameUrlNavigation;
use crate::phase::NavigationPhase;
use waymark_location::{HistoryState, PopStateKind};
use waymark_state::NodeId;
use waymark_url::{Params, UrlTree};

/// What asked for the navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavigationTrigger {
    Imperative,
    PopState,
    HashChange,
}

impl From<PopStateKind> for NavigationTrigger {
    fn from(kind: PopStateKind) -> Self {
        match kind {
            PopStateKind::PopState => Self::PopState,
            PopStateKind::HashChange => Self::HashChange,
        }
    }
}

/// How query parameters of the committed URL carry over into a new one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryParamsHandling {
    /// Use only the parameters passed with the navigation.
    #[default]
    Replace,
    /// Committed parameters, overridden by the ones passed in.
    Merge,
    /// Keep the committed parameters and ignore the ones passed in.
    Preserve,
}

impl QueryParamsHandling {
    pub fn apply(self, current: &Params, requested: Option<&Params>) -> Params {
        match self {
            Self::Replace => requested.cloned().unwrap_or_default(),
            Self::Preserve => current.clone(),
            Self::Merge => {
                let mut merged = current.clone();
                if let Some(requested) = requested {
                    merged.extend(requested.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
                merged
            }
        }
    }
}

/// Options for a single navigation.
#[derive(Debug, Clone, Default)]
pub struct NavigationExtras {
    /// Node of the committed snapshot that relative commands start from.
    pub relative_to: Option<NodeId>,
    pub query_params: Option<Params>,
    pub fragment: Option<String>,
    pub preserve_fragment: bool,
    pub query_params_handling: Option<QueryParamsHandling>,
    /// Overwrite the current history entry instead of pushing one.
    pub replace_url: bool,
    /// Commit without writing the location at all.
    pub skip_location_change: bool,
    /// Stored with the history entry.
    pub state: Option<Value>,
    pub on_same_url_navigation: Option<OnSameUrlNavigation>,
}

impl NavigationExtras {
    pub fn relative_to(mut self, node: NodeId) -> Self {
        self.relative_to = Some(node);
        self
    }

    pub fn query_params(mut self, params: Params) -> Self {
        self.query_params = Some(params);
        self
    }

    pub fn fragment(mut self, fragment: impl Into<String>) -> Self {
        self.fragment = Some(fragment.into());
        self
    }

    pub fn preserve_fragment(mut self) -> Self {
        self.preserve_fragment = true;
        self
    }

    pub fn query_params_handling(mut self, handling: QueryParamsHandling) -> Self {
        self.query_params_handling = Some(handling);
        self
    }

    pub fn replace_url(mut self) -> Self {
        self.replace_url = true;
        self
    }

    pub fn skip_location_change(mut self) -> Self {
        self.skip_location_change = true;
        self
    }

    pub fn state(mut self, state: Value) -> Self {
        self.state = Some(state);
        self
    }

    pub fn on_same_url_navigation(mut self, mode: OnSameUrlNavigation) -> Self {
        self.on_same_url_navigation = Some(mode);
        self
    }
}

/// An attempt in flight, as reported by `Router::current_navigation`.
#[derive(Debug, Clone)]
pub struct Navigation {
    pub id: u64,
    pub trigger: NavigationTrigger,
    /// URL committed when the attempt started.
    pub previous_url: String,
    pub extracted_url: UrlTree,
    /// Set once the URL has been recognized.
    pub final_url: Option<UrlTree>,
    pub extras: NavigationExtras,
    pub restored_state: Option<HistoryState>,
    pub phase: NavigationPhase,
}
