//! In-memory session history

use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::error::LocationError;
use crate::location::{normalize, HistoryState, Location, PopStateEvent, PopStateKind};
use crate::Result;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct HistoryEntry {
    pub path: String,
    pub state: Option<HistoryState>,
}

/// Ordered entries plus a cursor. Always holds at least one entry.
#[derive(Debug, Clone)]
pub(crate) struct HistoryStack {
    entries: Vec<HistoryEntry>,
    index: usize,
}

impl HistoryStack {
    pub fn new(path: &str) -> Self {
        Self {
            entries: vec![HistoryEntry {
                path: normalize(path),
                state: None,
            }],
            index: 0,
        }
    }

    /// Rebuilds a stack from stored entries. `None` if there are none.
    pub fn restore(entries: Vec<HistoryEntry>, index: usize) -> Option<Self> {
        if entries.is_empty() {
            return None;
        }
        let index = index.min(entries.len() - 1);
        Some(Self { entries, index })
    }

    pub fn current(&self) -> &HistoryEntry {
        &self.entries[self.index]
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn paths(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.path.clone()).collect()
    }

    pub fn push(&mut self, path: &str, state: Option<HistoryState>) {
        self.entries.truncate(self.index + 1);
        self.entries.push(HistoryEntry {
            path: normalize(path),
            state,
        });
        self.index = self.entries.len() - 1;
    }

    pub fn replace(&mut self, path: &str, state: Option<HistoryState>) {
        self.entries[self.index] = HistoryEntry {
            path: normalize(path),
            state,
        };
    }

    /// Index `delta` entries away from the cursor, if it exists.
    pub fn target(&self, delta: i64) -> Result<usize> {
        let target = self.index as i64 + delta;
        if target < 0 || target >= self.entries.len() as i64 {
            return Err(LocationError::OutOfRange(target));
        }
        Ok(target as usize)
    }

    pub fn move_to(&mut self, index: usize) -> &HistoryEntry {
        self.index = index;
        self.current()
    }
}

/// Location kept entirely in memory. Used by tests and headless hosts.
pub struct MemoryLocation {
    stack: Mutex<HistoryStack>,
    events: broadcast::Sender<PopStateEvent>,
}

impl MemoryLocation {
    pub fn new() -> Self {
        Self::with_path("/")
    }

    pub fn with_path(path: &str) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            stack: Mutex::new(HistoryStack::new(path)),
            events,
        }
    }

    pub fn history_len(&self) -> usize {
        self.stack.lock().len()
    }

    pub fn index(&self) -> usize {
        self.stack.lock().index()
    }

    /// Paths of every entry, oldest first.
    pub fn entries(&self) -> Vec<String> {
        self.stack.lock().paths()
    }

    /// Pushes `path` as if the user edited the fragment, then notifies.
    pub fn simulate_hash_change(&self, path: &str) {
        let url = {
            let mut stack = self.stack.lock();
            stack.push(path, None);
            stack.current().path.clone()
        };
        let _ = self.events.send(PopStateEvent {
            url,
            state: None,
            kind: PopStateKind::HashChange,
        });
    }
}

impl Default for MemoryLocation {
    fn default() -> Self {
        Self::new()
    }
}

impl Location for MemoryLocation {
    fn path(&self) -> String {
        self.stack.lock().current().path.clone()
    }

    fn state(&self) -> Option<HistoryState> {
        self.stack.lock().current().state.clone()
    }

    fn go(&self, path: &str, state: HistoryState) -> Result<()> {
        self.stack.lock().push(path, Some(state));
        Ok(())
    }

    fn replace_state(&self, path: &str, state: HistoryState) -> Result<()> {
        self.stack.lock().replace(path, Some(state));
        Ok(())
    }

    fn history_go(&self, delta: i64) -> Result<()> {
        if delta == 0 {
            return Ok(());
        }
        let event = {
            let mut stack = self.stack.lock();
            let target = stack.target(delta)?;
            let entry = stack.move_to(target);
            PopStateEvent {
                url: entry.path.clone(),
                state: entry.state.clone(),
                kind: PopStateKind::PopState,
            }
        };
        tracing::debug!(url = %event.url, delta, "History moved");
        let _ = self.events.send(event);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<PopStateEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(page_id: i64) -> HistoryState {
        HistoryState {
            navigation_id: page_id as u64,
            page_id,
            extra: None,
        }
    }

    #[test]
    fn test_push_truncates_forward_entries() {
        let location = MemoryLocation::new();
        location.go("/a", state(1)).unwrap();
        location.go("/b", state(2)).unwrap();
        location.back().unwrap();
        location.go("/c", state(2)).unwrap();

        assert_eq!(location.entries(), vec!["/", "/a", "/c"]);
        assert_eq!(location.path(), "/c");
    }

    #[test]
    fn test_replace_keeps_length() {
        let location = MemoryLocation::with_path("/start");
        location.replace_state("/other", state(0)).unwrap();

        assert_eq!(location.history_len(), 1);
        assert_eq!(location.path(), "/other");
        assert_eq!(location.state(), Some(state(0)));
    }

    #[test]
    fn test_history_go_out_of_range() {
        let location = MemoryLocation::new();
        assert!(matches!(location.history_go(-1), Err(LocationError::OutOfRange(-1))));
        assert_eq!(location.index(), 0);
    }

    #[tokio::test]
    async fn test_back_emits_popstate() {
        let location = MemoryLocation::new();
        let mut events = location.subscribe();
        location.go("/a", state(1)).unwrap();
        location.go("/b", state(2)).unwrap();

        location.back().unwrap();
        let event = events.recv().await.unwrap();
        assert_eq!(event.url, "/a");
        assert_eq!(event.state, Some(state(1)));
        assert_eq!(event.kind, PopStateKind::PopState);
    }

    #[tokio::test]
    async fn test_hash_change_event() {
        let location = MemoryLocation::new();
        let mut events = location.subscribe();
        location.simulate_hash_change("/page#top");

        let event = events.recv().await.unwrap();
        assert_eq!(event.kind, PopStateKind::HashChange);
        assert_eq!(event.url, "/page#top");
        assert_eq!(location.history_len(), 2);
    }
}
