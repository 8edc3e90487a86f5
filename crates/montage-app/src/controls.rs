//! Keyboard controls for playback and the timeline view.

use montage_render::PlaybackClock;

const ZOOM_STEP: f32 = 0.2;
const ZOOM_MIN: f32 = 0.4;
const ZOOM_MAX: f32 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    TogglePlayback,
    ZoomIn,
    ZoomOut,
    /// Zoom back to 1.0 and scroll to the start.
    ResetView,
    Quit,
}

/// Map a key press to its action.
pub fn action_for_key(key: char) -> Option<ControlAction> {
    match key {
        ' ' => Some(ControlAction::TogglePlayback),
        '+' | '=' => Some(ControlAction::ZoomIn),
        '-' | '_' => Some(ControlAction::ZoomOut),
        '0' => Some(ControlAction::ResetView),
        'q' => Some(ControlAction::Quit),
        _ => None,
    }
}

/// Horizontal zoom and scroll of the timeline display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineView {
    pub zoom: f32,
    /// Left edge of the view, in seconds.
    pub scroll: f32,
}

impl Default for TimelineView {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            scroll: 0.0,
        }
    }
}

impl TimelineView {
    pub fn zoom_in(&mut self) {
        self.zoom = (self.zoom + ZOOM_STEP).min(ZOOM_MAX);
    }

    pub fn zoom_out(&mut self) {
        self.zoom = (self.zoom - ZOOM_STEP).max(ZOOM_MIN);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Apply `action`. Returns false when the caller should stop.
pub fn apply(action: ControlAction, clock: &mut PlaybackClock, view: &mut TimelineView) -> bool {
    match action {
        ControlAction::TogglePlayback => clock.toggle(),
        ControlAction::ZoomIn => view.zoom_in(),
        ControlAction::ZoomOut => view.zoom_out(),
        ControlAction::ResetView => view.reset(),
        ControlAction::Quit => return false,
    }
    tracing::debug!(?action, zoom = view.zoom, playing = clock.is_playing(), "Control applied");
    true
}
