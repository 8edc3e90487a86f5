//! Transition blending.
//!
//! A transition never draws anything itself. It modulates how the outgoing
//! and incoming clips are composited: opacity, offset, scale about the frame
//! centre, and a reveal rectangle. All values are in project pixels.

use std::collections::HashMap;

use glam::Vec2;
use montage_core::{ClipId, RationalTime, Rect};
use montage_timeline::{Clip, Direction, Project, Transition, TransitionKind};

/// Which side of a transition a clip is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Outgoing,
    Incoming,
}

/// How one clip is modulated by the transitions active at a time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipBlend {
    pub opacity: f32,
    pub offset: Vec2,
    pub scale: f32,
    /// Only the part of the frame inside this rectangle is drawn.
    pub reveal: Option<Rect>,
}

impl Default for ClipBlend {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl ClipBlend {
    pub const IDENTITY: Self = Self {
        opacity: 1.0,
        offset: Vec2::ZERO,
        scale: 1.0,
        reveal: None,
    };

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Combine two blends applying to the same clip.
    pub fn then(self, other: Self) -> Self {
        let reveal = match (self.reveal, other.reveal) {
            (Some(a), Some(b)) => Some(a.intersection(b).unwrap_or_default()),
            (a, b) => a.or(b),
        };
        Self {
            opacity: self.opacity * other.opacity,
            offset: self.offset + other.offset,
            scale: self.scale * other.scale,
            reveal,
        }
    }
}

/// Blend for one role at eased progress `p` in [0, 1].
///
/// At `p == 0` the outgoing clip is untouched and the incoming clip is fully
/// hidden; at `p == 1` the reverse.
pub fn blend_for(
    kind: TransitionKind,
    direction: Direction,
    intensity: f32,
    role: Role,
    p: f32,
    frame: Vec2,
) -> ClipBlend {
    let p = p.clamp(0.0, 1.0);
    let dir = Vec2::from(direction.vector());
    let mut blend = ClipBlend::IDENTITY;

    match (kind, role) {
        (TransitionKind::Fade, Role::Outgoing) => blend.opacity = (1.0 - 2.0 * p).max(0.0),
        (TransitionKind::Fade, Role::Incoming) => blend.opacity = (2.0 * p - 1.0).max(0.0),
        (TransitionKind::Dissolve, Role::Outgoing) => blend.opacity = 1.0 - p,
        (TransitionKind::Dissolve, Role::Incoming) => blend.opacity = p,
        (TransitionKind::Slide | TransitionKind::Push, Role::Incoming) => {
            blend.offset = dir * (p - 1.0) * frame;
            if p <= 0.0 {
                blend.opacity = 0.0;
            }
        }
        (TransitionKind::Slide, Role::Outgoing) => {}
        (TransitionKind::Push, Role::Outgoing) => blend.offset = dir * p * frame,
        (TransitionKind::Wipe | TransitionKind::Reveal, Role::Incoming) => {
            if p < 1.0 {
                blend.reveal = Some(leading_rect(direction, p, frame));
            }
        }
        (TransitionKind::Wipe, Role::Outgoing) => {}
        (TransitionKind::Reveal, Role::Outgoing) => {
            if p > 0.0 {
                blend.reveal = Some(trailing_rect(direction, 1.0 - p, frame));
            }
        }
        (TransitionKind::Zoom, Role::Outgoing) => {
            blend.scale = 1.0 + intensity * p;
            blend.opacity = 1.0 - p;
        }
        (TransitionKind::Zoom, Role::Incoming) => {
            blend.scale = 1.0 + intensity * (1.0 - p);
            blend.opacity = p;
        }
    }
    blend
}

/// The fraction `t` of the frame nearest the edge content travels from.
fn leading_rect(direction: Direction, t: f32, frame: Vec2) -> Rect {
    match direction {
        Direction::Left => Rect::new(frame.x * (1.0 - t), 0.0, frame.x * t, frame.y),
        Direction::Right => Rect::new(0.0, 0.0, frame.x * t, frame.y),
        Direction::Up => Rect::new(0.0, frame.y * (1.0 - t), frame.x, frame.y * t),
        Direction::Down => Rect::new(0.0, 0.0, frame.x, frame.y * t),
    }
}

/// The fraction `t` of the frame nearest the edge content travels towards.
fn trailing_rect(direction: Direction, t: f32, frame: Vec2) -> Rect {
    match direction {
        Direction::Left => Rect::new(0.0, 0.0, frame.x * t, frame.y),
        Direction::Right => Rect::new(frame.x * (1.0 - t), 0.0, frame.x * t, frame.y),
        Direction::Up => Rect::new(0.0, 0.0, frame.x, frame.y * t),
        Direction::Down => Rect::new(0.0, frame.y * (1.0 - t), frame.x, frame.y * t),
    }
}

/// Outgoing and incoming clips of `transition`.
///
/// Explicit `from`/`to` win. Otherwise a clip starting inside the window is
/// incoming and a clip ending inside it is outgoing.
pub fn roles<'a>(project: &'a Project, transition: &Transition) -> Vec<(&'a Clip, Role)> {
    if transition.from.is_some() || transition.to.is_some() {
        return [(transition.from, Role::Outgoing), (transition.to, Role::Incoming)]
            .into_iter()
            .filter_map(|(id, role)| id.and_then(|id| project.clip(id)).map(|c| (c, role)))
            .collect();
    }
    let window = transition.range();
    project
        .clips
        .iter()
        .filter_map(|clip| {
            if window.contains_inclusive(clip.start) {
                Some((clip, Role::Incoming))
            } else if window.contains_inclusive(clip.end()) {
                Some((clip, Role::Outgoing))
            } else {
                None
            }
        })
        .collect()
}

/// Blends for every clip touched by a transition active at `time`.
pub fn blends_at(project: &Project, time: RationalTime) -> HashMap<ClipId, ClipBlend> {
    let frame = Vec2::new(
        project.resolution.width as f32,
        project.resolution.height as f32,
    );
    let mut blends: HashMap<ClipId, ClipBlend> = HashMap::new();
    for transition in project.transitions.iter().filter(|t| t.is_active_at(time)) {
        let p = transition.eased_progress(time) as f32;
        for (clip, role) in roles(project, transition) {
            let blend = blend_for(
                transition.kind,
                transition.direction,
                transition.intensity,
                role,
                p,
                frame,
            );
            let entry = blends.entry(clip.id).or_default();
            *entry = entry.then(blend);
        }
    }
    blends
}
