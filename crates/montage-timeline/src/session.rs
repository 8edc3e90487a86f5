//! An editing session: a timeline plus its undo history.

use montage_core::{EditorConfig, Result};

use crate::history::History;
use crate::timeline::Timeline;

/// Runs labelled edits against a timeline and snapshots each one.
#[derive(Debug)]
pub struct EditSession {
    timeline: Timeline,
    history: History,
}

impl EditSession {
    /// Start a session that can undo up to `capacity` edits. The opening
    /// state is kept as an extra snapshot below them.
    pub fn new(timeline: Timeline, capacity: usize) -> Self {
        let mut history = History::new(capacity.saturating_add(1));
        history.push_state(timeline.project(), "Open project");
        Self { timeline, history }
    }

    /// Start a session sized from the editing config.
    pub fn with_config(timeline: Timeline, config: &EditorConfig) -> Self {
        Self::new(timeline, config.editing.history_capacity)
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Apply a batch of mutations as one undo step.
    ///
    /// If `f` fails, the timeline is restored to the last snapshot and the
    /// error is returned; nothing is recorded.
    pub fn edit<T>(
        &mut self,
        label: &str,
        f: impl FnOnce(&mut Timeline) -> Result<T>,
    ) -> Result<T> {
        match f(&mut self.timeline) {
            Ok(value) => {
                self.history.push_state(self.timeline.project(), label);
                tracing::debug!(label, depth = self.history.len(), "Edit recorded");
                Ok(value)
            }
            Err(e) => {
                if let Some(snapshot) = self.history.current() {
                    self.timeline.restore((*snapshot.project).clone());
                }
                tracing::debug!(label, error = %e, "Edit rolled back");
                Err(e)
            }
        }
    }

    /// Step back one edit. Returns false at the oldest snapshot.
    pub fn undo(&mut self) -> bool {
        match self.history.undo() {
            Some(project) => {
                self.timeline.restore((*project).clone());
                true
            }
            None => false,
        }
    }

    /// Re-apply an undone edit. Returns false when there is nothing to redo.
    pub fn redo(&mut self) -> bool {
        match self.history.redo() {
            Some(project) => {
                self.timeline.restore((*project).clone());
                true
            }
            None => false,
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn into_timeline(self) -> Timeline {
        self.timeline
    }
}
