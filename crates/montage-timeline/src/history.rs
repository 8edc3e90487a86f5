//! Bounded undo/redo over whole-project snapshots.
//!
//! Snapshots are immutable and shared; restoring one clones it back into
//! the live timeline.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::project::Project;

/// Default number of snapshots kept.
pub const DEFAULT_CAPACITY: usize = 50;

/// An immutable copy of a project at one point in the edit history.
#[derive(Debug, Clone)]
pub struct HistorySnapshot {
    pub project: Arc<Project>,
    pub label: String,
    /// Unix time in milliseconds.
    pub timestamp_ms: u64,
}

/// Snapshot list with a cursor at the current state.
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<HistorySnapshot>,
    /// Index of the current snapshot. Meaningless while `entries` is empty.
    cursor: usize,
    capacity: usize,
}

impl History {
    /// Create an empty history keeping at most `capacity` snapshots.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.max(1)),
            cursor: 0,
            capacity: capacity.max(1),
        }
    }

    /// Record a new state. Any redo future is discarded and the oldest
    /// snapshot is evicted once over capacity.
    pub fn push_state(&mut self, project: &Project, label: impl Into<String>) {
        if !self.entries.is_empty() {
            self.entries.truncate(self.cursor + 1);
        }
        self.entries.push_back(HistorySnapshot {
            project: Arc::new(project.clone()),
            label: label.into(),
            timestamp_ms: now_millis(),
        });
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        self.cursor = self.entries.len() - 1;
    }

    /// Step back one snapshot. `None` at the oldest entry.
    pub fn undo(&mut self) -> Option<Arc<Project>> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        Some(self.entries[self.cursor].project.clone())
    }

    /// Step forward one snapshot. `None` at the newest entry.
    pub fn redo(&mut self) -> Option<Arc<Project>> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        Some(self.entries[self.cursor].project.clone())
    }

    pub fn can_undo(&self) -> bool {
        !self.entries.is_empty() && self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    /// The snapshot the cursor points at.
    pub fn current(&self) -> Option<&HistorySnapshot> {
        self.entries.get(self.cursor)
    }

    /// Labels from oldest to newest.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.label.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Clear all history.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str) -> Project {
        Project::new(name)
    }

    #[test]
    fn test_empty_history_has_no_moves() {
        let mut history = History::default();
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert!(history.undo().is_none());
        assert!(history.redo().is_none());
        assert!(history.current().is_none());
    }

    #[test]
    fn test_undo_redo_cursor() {
        let mut history = History::default();
        history.push_state(&named("a"), "a");
        history.push_state(&named("b"), "b");
        history.push_state(&named("c"), "c");

        assert!(history.can_undo());
        assert!(!history.can_redo());
        assert_eq!(history.undo().unwrap().name, "b");
        assert_eq!(history.undo().unwrap().name, "a");
        assert!(!history.can_undo());
        assert!(history.undo().is_none());

        assert_eq!(history.redo().unwrap().name, "b");
        assert!(history.can_redo());
        assert_eq!(history.current().unwrap().label, "b");
    }

    #[test]
    fn test_push_truncates_future() {
        let mut history = History::default();
        history.push_state(&named("a"), "a");
        history.push_state(&named("b"), "b");
        history.undo();
        history.push_state(&named("c"), "c");

        assert!(!history.can_redo());
        assert_eq!(history.labels().collect::<Vec<_>>(), vec!["a", "c"]);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut history = History::new(3);
        for name in ["a", "b", "c", "d", "e"] {
            history.push_state(&named(name), name);
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.labels().collect::<Vec<_>>(), vec!["c", "d", "e"]);
        assert_eq!(history.undo().unwrap().name, "d");
        assert_eq!(history.undo().unwrap().name, "c");
        assert!(history.undo().is_none());
    }

    #[test]
    fn test_snapshots_are_isolated_from_live_state() {
        let mut history = History::default();
        let mut live = named("before");
        history.push_state(&live, "open");
        live.name = "after".into();
        assert_eq!(history.current().unwrap().project.name, "before");
    }
}
