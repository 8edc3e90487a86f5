//! Timed transitions between adjacent clips.

use montage_core::{ClipId, Easing, RationalTime, TimeRange, TransitionId, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::clip::check_unit;

/// How a transition blends the outgoing and incoming clips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionKind {
    Fade,
    Slide,
    Wipe,
    Zoom,
    Dissolve,
    Push,
    Reveal,
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fade => "fade",
            Self::Slide => "slide",
            Self::Wipe => "wipe",
            Self::Zoom => "zoom",
            Self::Dissolve => "dissolve",
            Self::Push => "push",
            Self::Reveal => "reveal",
        };
        f.write_str(name)
    }
}

/// Direction of travel for directional transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    /// Unit vector the incoming content travels along.
    pub fn vector(self) -> (f32, f32) {
        match self {
            Self::Left => (-1.0, 0.0),
            Self::Right => (1.0, 0.0),
            Self::Up => (0.0, -1.0),
            Self::Down => (0.0, 1.0),
        }
    }
}

/// A transition window on the timeline.
///
/// `from` and `to` name the outgoing and incoming clips. When absent, the
/// compositor infers them from clip boundaries inside the window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    pub id: TransitionId,
    pub kind: TransitionKind,
    pub start: RationalTime,
    pub duration: RationalTime,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub easing: Easing,
    #[serde(default = "full_intensity")]
    pub intensity: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<ClipId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<ClipId>,
}

fn enabled_by_default() -> bool {
    true
}

fn full_intensity() -> f32 {
    1.0
}

impl Transition {
    /// Create an enabled, linear transition.
    pub fn new(kind: TransitionKind, start: RationalTime, duration: RationalTime) -> Self {
        Self {
            id: TransitionId::new(),
            kind,
            start,
            duration,
            enabled: true,
            direction: Direction::Left,
            easing: Easing::Linear,
            intensity: 1.0,
            from: None,
            to: None,
        }
    }

    /// Builder-style explicit clip roles.
    pub fn between(mut self, from: ClipId, to: ClipId) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    #[inline]
    pub fn end(&self) -> RationalTime {
        self.start + self.duration
    }

    #[inline]
    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.start, self.duration)
    }

    /// Whether `time` falls inside the window, edges included.
    pub fn is_active_at(&self, time: RationalTime) -> bool {
        self.enabled && self.range().contains_inclusive(time)
    }

    /// Linear progress through the window, clamped to [0, 1].
    pub fn progress(&self, time: RationalTime) -> f64 {
        if !self.duration.is_positive() {
            return 1.0;
        }
        let elapsed = (time - self.start).to_seconds_f64();
        (elapsed / self.duration.to_seconds_f64()).clamp(0.0, 1.0)
    }

    /// Progress after easing.
    pub fn eased_progress(&self, time: RationalTime) -> f64 {
        self.easing.apply(self.progress(time))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.duration.is_positive() {
            return Err(ValidationError::InvalidTransition(self.duration));
        }
        if self.start.is_negative() {
            return Err(ValidationError::NegativeStart(self.start));
        }
        check_unit("intensity", self.intensity)
    }
}

/// Partial update for [`Transition`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransitionPatch {
    pub kind: Option<TransitionKind>,
    pub start: Option<RationalTime>,
    pub duration: Option<RationalTime>,
    pub enabled: Option<bool>,
    pub direction: Option<Direction>,
    pub easing: Option<Easing>,
    pub intensity: Option<f32>,
    pub from: Option<Option<ClipId>>,
    pub to: Option<Option<ClipId>>,
}

impl TransitionPatch {
    pub fn apply_to(&self, transition: &mut Transition) {
        if let Some(kind) = self.kind {
            transition.kind = kind;
        }
        if let Some(start) = self.start {
            transition.start = start;
        }
        if let Some(duration) = self.duration {
            transition.duration = duration;
        }
        if let Some(enabled) = self.enabled {
            transition.enabled = enabled;
        }
        if let Some(direction) = self.direction {
            transition.direction = direction;
        }
        if let Some(easing) = self.easing {
            transition.easing = easing;
        }
        if let Some(intensity) = self.intensity {
            transition.intensity = intensity;
        }
        if let Some(from) = self.from {
            transition.from = from;
        }
        if let Some(to) = self.to {
            transition.to = to;
        }
    }
}
