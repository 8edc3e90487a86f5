//! Observers notified of timeline changes.
//!
//! Observers are handed to the timeline at construction; there is no
//! global logger state.

use montage_core::{ClipId, EffectId, KeyframeId, RationalTime, TransitionId};
use parking_lot::Mutex;

/// A change applied to (or refused by) the timeline.
#[derive(Debug, Clone, PartialEq)]
pub enum TimelineEvent {
    ClipAdded(ClipId),
    ClipUpdated(ClipId),
    ClipRemoved(ClipId),
    ClipMoved {
        clip: ClipId,
        start: RationalTime,
        layer: i32,
    },
    ClipResized {
        clip: ClipId,
        duration: RationalTime,
    },
    ClipSplit {
        left: ClipId,
        right: ClipId,
    },
    PlacementRejected {
        clip: ClipId,
        conflict: ClipId,
    },
    EffectChanged(EffectId),
    TransitionChanged(TransitionId),
    KeyframeChanged(KeyframeId),
    Restored,
}

/// Receives timeline events.
pub trait TimelineObserver: Send + Sync {
    fn on_event(&self, event: &TimelineEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl TimelineObserver for TracingObserver {
    fn on_event(&self, event: &TimelineEvent) {
        match event {
            TimelineEvent::PlacementRejected { clip, conflict } => {
                tracing::warn!(%clip, %conflict, "Clip placement rejected: overlaps sibling");
            }
            TimelineEvent::Restored => tracing::info!("Timeline restored from snapshot"),
            other => tracing::debug!(event = ?other, "Timeline changed"),
        }
    }
}

/// Ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl TimelineObserver for NullObserver {
    fn on_event(&self, _event: &TimelineEvent) {}
}

/// Records events in memory.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<TimelineEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far.
    pub fn events(&self) -> Vec<TimelineEvent> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl TimelineObserver for EventLog {
    fn on_event(&self, event: &TimelineEvent) {
        self.events.lock().push(event.clone());
    }
}
