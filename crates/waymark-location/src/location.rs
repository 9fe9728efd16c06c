//! Location abstraction

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::Result;

/// State stored alongside each history entry by the router.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryState {
    /// Id of the navigation that wrote the entry.
    pub navigation_id: u64,
    /// Position of the entry in the session, as counted by the router.
    pub page_id: i64,
    /// Caller supplied state passed through navigation extras.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PopStateKind {
    PopState,
    HashChange,
}

/// Emitted when the current entry changes without the router asking for it.
#[derive(Debug, Clone, PartialEq)]
pub struct PopStateEvent {
    pub url: String,
    pub state: Option<HistoryState>,
    pub kind: PopStateKind,
}

/// Session history as seen by the router.
pub trait Location: Send + Sync {
    /// Path of the current entry, including query and fragment.
    fn path(&self) -> String;

    fn state(&self) -> Option<HistoryState>;

    /// Pushes a new entry, dropping everything after the current one.
    fn go(&self, path: &str, state: HistoryState) -> Result<()>;

    fn replace_state(&self, path: &str, state: HistoryState) -> Result<()>;

    /// Moves `delta` entries through the stack and emits a popstate event.
    fn history_go(&self, delta: i64) -> Result<()>;

    fn subscribe(&self) -> broadcast::Receiver<PopStateEvent>;

    fn back(&self) -> Result<()> {
        self.history_go(-1)
    }

    fn forward(&self) -> Result<()> {
        self.history_go(1)
    }

    fn is_current_path_equal_to(&self, path: &str) -> bool {
        normalize(&self.path()) == normalize(path)
    }
}

/// Leading slash, no trailing slash except for the root.
pub(crate) fn normalize(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}
