//! SQLite-backed session history
//!
//! The stack is mirrored in memory for reads. Every write goes to the
//! `history_entries` table and the `location.index` setting in one
//! transaction, so a restart lands on the same entry.

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::location::{HistoryState, Location, PopStateEvent, PopStateKind};
use crate::memory::{HistoryEntry, HistoryStack};
use crate::Result;
use waymark_storage::Database;

const INDEX_KEY: &str = "location.index";
const EVENT_CAPACITY: usize = 64;

pub struct PersistentLocation {
    db: Database,
    stack: Mutex<HistoryStack>,
    events: broadcast::Sender<PopStateEvent>,
}

fn encode_state(state: Option<&HistoryState>) -> Result<Option<String>> {
    Ok(state.map(serde_json::to_string).transpose()?)
}

fn save_index(conn: &rusqlite::Connection, index: usize) -> waymark_storage::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![INDEX_KEY, index.to_string(), Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

impl PersistentLocation {
    /// Loads the stored stack, or starts a new one at `/`.
    pub fn open(db: Database) -> Result<Self> {
        let rows: Vec<(String, Option<String>)> = db.with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT path, state FROM history_entries ORDER BY position")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;

        let mut entries = Vec::with_capacity(rows.len());
        for (path, state) in rows {
            let state = match state {
                Some(json) => Some(serde_json::from_str(&json)?),
                None => None,
            };
            entries.push(HistoryEntry { path, state });
        }

        let index = db
            .get_setting(INDEX_KEY)?
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0);

        let stack = match HistoryStack::restore(entries, index) {
            Some(stack) => {
                tracing::info!(entries = stack.len(), index = stack.index(), "Restored session history");
                stack
            }
            None => {
                let stack = HistoryStack::new("/");
                db.transaction(|conn| {
                    conn.execute(
                        "INSERT INTO history_entries (position, path, state, updated_at) VALUES (0, ?1, NULL, ?2)",
                        rusqlite::params![stack.current().path, Utc::now().to_rfc3339()],
                    )?;
                    save_index(conn, 0)
                })?;
                stack
            }
        };

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            db,
            stack: Mutex::new(stack),
            events,
        })
    }

    pub fn history_len(&self) -> usize {
        self.stack.lock().len()
    }

    pub fn index(&self) -> usize {
        self.stack.lock().index()
    }

    fn write_current(&self, stack: &HistoryStack, truncate: bool) -> Result<()> {
        let entry = stack.current();
        let state = encode_state(entry.state.as_ref())?;
        let position = stack.index() as i64;
        self.db.transaction(|conn| {
            if truncate {
                conn.execute("DELETE FROM history_entries WHERE position >= ?1", [position])?;
            }
            conn.execute(
                "INSERT OR REPLACE INTO history_entries (position, path, state, updated_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![position, entry.path, state, Utc::now().to_rfc3339()],
            )?;
            save_index(conn, stack.index())
        })?;
        Ok(())
    }
}

impl Location for PersistentLocation {
    fn path(&self) -> String {
        self.stack.lock().current().path.clone()
    }

    fn state(&self) -> Option<HistoryState> {
        self.stack.lock().current().state.clone()
    }

    fn go(&self, path: &str, state: HistoryState) -> Result<()> {
        let mut next = self.stack.lock().clone();
        next.push(path, Some(state));
        self.write_current(&next, true)?;
        *self.stack.lock() = next;
        Ok(())
    }

    fn replace_state(&self, path: &str, state: HistoryState) -> Result<()> {
        let mut next = self.stack.lock().clone();
        next.replace(path, Some(state));
        self.write_current(&next, false)?;
        *self.stack.lock() = next;
        Ok(())
    }

    fn history_go(&self, delta: i64) -> Result<()> {
        if delta == 0 {
            return Ok(());
        }
        let event = {
            let mut stack = self.stack.lock();
            let target = stack.target(delta)?;
            self.db.with_connection(|conn| save_index(conn, target))?;
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
    fn test_new_database_starts_at_root() {
        let location = PersistentLocation::open(Database::open_in_memory().unwrap()).unwrap();
        assert_eq!(location.path(), "/");
        assert_eq!(location.state(), None);
        assert_eq!(location.history_len(), 1);
    }

    #[test]
    fn test_history_survives_reopen() {
        let db = Database::open_in_memory().unwrap();
        {
            let location = PersistentLocation::open(db.clone()).unwrap();
            location.go("/team/33", state(1)).unwrap();
            location.go("/team/33/user/11", state(2)).unwrap();
            location.back().unwrap();
        }

        let location = PersistentLocation::open(db).unwrap();
        assert_eq!(location.history_len(), 3);
        assert_eq!(location.index(), 1);
        assert_eq!(location.path(), "/team/33");
        assert_eq!(location.state(), Some(state(1)));
    }

    #[test]
    fn test_push_after_back_drops_forward_rows() {
        let db = Database::open_in_memory().unwrap();
        let location = PersistentLocation::open(db.clone()).unwrap();
        location.go("/a", state(1)).unwrap();
        location.go("/b", state(2)).unwrap();
        location.history_go(-2).unwrap();
        location.go("/c", state(1)).unwrap();

        let reopened = PersistentLocation::open(db).unwrap();
        assert_eq!(reopened.history_len(), 2);
        assert_eq!(reopened.path(), "/c");
    }

    #[test]
    fn test_replace_rewrites_current_row() {
        let db = Database::open_in_memory().unwrap();
        let location = PersistentLocation::open(db.clone()).unwrap();
        location.go("/inbox", state(1)).unwrap();
        location.replace_state("/inbox/3", state(1)).unwrap();

        let reopened = PersistentLocation::open(db).unwrap();
        assert_eq!(reopened.history_len(), 2);
        assert_eq!(reopened.path(), "/inbox/3");
        assert_eq!(reopened.state(), Some(state(1)));
    }
}
