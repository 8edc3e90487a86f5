//! Placement and collision resolution for moving, resizing and splitting
//! clips.
//!
//! Clips on the same layer may never overlap. A proposal that would
//! overlap a sibling is rejected and the clip keeps its prior range.

use montage_core::{ClipId, EditorConfig, Keyframe, KeyframeId, RationalTime, TimeRange, ValidationError};

use crate::clip::Clip;
use crate::project::Project;

/// Placement rules used by the timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineSettings {
    pub snapping_enabled: bool,
    /// Grid spacing for snapping.
    pub grid: RationalTime,
    /// Shortest duration a resize may produce.
    pub min_duration: RationalTime,
    /// Clamp resizes to the project duration measured from the clip start.
    pub limit_resize_to_project: bool,
}

impl Default for TimelineSettings {
    fn default() -> Self {
        Self {
            snapping_enabled: true,
            grid: RationalTime::from_secs(1),
            min_duration: RationalTime::new(1, 10),
            limit_resize_to_project: true,
        }
    }
}

impl From<&EditorConfig> for TimelineSettings {
    fn from(config: &EditorConfig) -> Self {
        Self {
            snapping_enabled: config.snapping.enabled,
            grid: config.snapping.grid(),
            min_duration: config.editing.min_clip_duration(),
            limit_resize_to_project: config.editing.limit_resize_to_project,
        }
    }
}

/// Outcome of a move or resize proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// The clip may take this range.
    Accepted(TimeRange),
    /// The proposal overlapped `conflict`; the clip stays at `prior`.
    Rejected { prior: TimeRange, conflict: ClipId },
}

impl Placement {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    /// The range the clip ends up with.
    pub fn range(&self) -> TimeRange {
        match *self {
            Self::Accepted(range) => range,
            Self::Rejected { prior, .. } => prior,
        }
    }
}

/// The two halves produced by a split, plus the keyframes copied onto the
/// right half.
#[derive(Debug, Clone)]
pub struct SplitOutcome {
    pub left: Clip,
    pub right: Clip,
    pub right_keyframes: Vec<Keyframe>,
}

/// Computes accepted placements. Never mutates the project.
#[derive(Debug, Clone, Default)]
pub struct PlacementResolver {
    settings: TimelineSettings,
}

impl PlacementResolver {
    pub fn new(settings: TimelineSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &TimelineSettings {
        &self.settings
    }

    /// Round to the nearest grid line when snapping is enabled.
    pub fn snap(&self, time: RationalTime) -> RationalTime {
        if self.settings.snapping_enabled {
            time.snap_to_grid(self.settings.grid)
        } else {
            time
        }
    }

    /// First clip on `layer`, other than `clip`, whose range intersects
    /// `range` (half-open on both sides).
    pub fn conflict<'a>(
        &self,
        project: &'a Project,
        clip: ClipId,
        layer: i32,
        range: TimeRange,
    ) -> Option<&'a Clip> {
        project
            .clips
            .iter()
            .filter(|other| other.id != clip && other.layer == layer)
            .find(|other| range.start < other.end() && range.end() > other.start)
    }

    /// Resolve dragging a clip to a new start on its own layer.
    pub fn resolve_move(
        &self,
        project: &Project,
        id: ClipId,
        start: RationalTime,
    ) -> Result<Placement, ValidationError> {
        let clip = find(project, id)?;
        self.resolve_move_to_layer(project, id, start, clip.layer)
    }

    /// Resolve dragging a clip to a new start on `layer`.
    pub fn resolve_move_to_layer(
        &self,
        project: &Project,
        id: ClipId,
        start: RationalTime,
        layer: i32,
    ) -> Result<Placement, ValidationError> {
        let clip = find(project, id)?;
        let start = self.snap(start).max(RationalTime::ZERO);
        let proposed = TimeRange::new(start, clip.duration);
        Ok(self.check(project, clip, layer, proposed))
    }

    /// Resolve resizing a clip from its fixed start edge.
    pub fn resolve_resize(
        &self,
        project: &Project,
        id: ClipId,
        duration: RationalTime,
    ) -> Result<Placement, ValidationError> {
        let clip = find(project, id)?;
        let mut duration = self.snap(duration);
        if self.settings.limit_resize_to_project {
            let limit = project.duration() - clip.start;
            duration = duration.min(limit);
        }
        duration = duration.max(self.settings.min_duration);
        let proposed = TimeRange::new(clip.start, duration);
        Ok(self.check(project, clip, clip.layer, proposed))
    }

    fn check(&self, project: &Project, clip: &Clip, layer: i32, proposed: TimeRange) -> Placement {
        match self.conflict(project, clip.id, layer, proposed) {
            Some(other) => {
                tracing::debug!(
                    clip = %clip.id,
                    conflict = %other.id,
                    layer,
                    proposed = %proposed,
                    "Placement rejected"
                );
                Placement::Rejected {
                    prior: clip.range(),
                    conflict: other.id,
                }
            }
            None => Placement::Accepted(proposed),
        }
    }

    /// Cut a clip in two at `at`, which must lie strictly inside it.
    ///
    /// The left half keeps the id; the right half gets a fresh id, fresh
    /// effect ids, an advanced source offset and a copy of the clip's
    /// keyframes.
    pub fn split(
        &self,
        project: &Project,
        id: ClipId,
        at: RationalTime,
    ) -> Result<SplitOutcome, ValidationError> {
        let clip = find(project, id)?;
        if at <= clip.start || at >= clip.end() {
            return Err(ValidationError::InvalidSplit { clip: id, at });
        }

        let offset = at - clip.start;
        let mut left = clip.clone();
        left.duration = offset;

        let mut right = clip.clone();
        right.id = ClipId::new();
        right.start = at;
        right.duration = clip.duration - offset;
        right.source_in = clip.source_in + offset;
        right.effects = clip.effects.iter().map(|e| e.duplicate()).collect();

        let right_keyframes = project
            .keyframes_of(id)
            .map(|kf| Keyframe {
                id: KeyframeId::new(),
                clip_id: right.id,
                ..kf.clone()
            })
            .collect();

        Ok(SplitOutcome {
            left,
            right,
            right_keyframes,
        })
    }
}

fn find(project: &Project, id: ClipId) -> Result<&Clip, ValidationError> {
    project
        .clip(id)
        .ok_or_else(|| ValidationError::not_found("clip", id))
}
