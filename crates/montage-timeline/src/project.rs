//! The project document.

use montage_core::{
    ClipId, Color, FrameRate, Keyframe, ProjectId, RationalTime, Resolution, TimeRange,
    ValidationError,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::clip::Clip;
use crate::effect::Effect;
use crate::track::{tracks_by_layer, Track};
use crate::transition::Transition;

/// A project: output settings plus everything placed on the timeline.
///
/// The duration is always derived from the clips and never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Unique project ID
    pub id: ProjectId,
    /// Project name
    pub name: String,
    pub frame_rate: FrameRate,
    /// Output resolution
    pub resolution: Resolution,
    #[serde(default = "default_background")]
    pub background: Color,
    #[serde(default)]
    pub clips: Vec<Clip>,
    /// Global effects, applied after all clips
    #[serde(default)]
    pub effects: Vec<Effect>,
    #[serde(default)]
    pub transitions: Vec<Transition>,
    #[serde(default)]
    pub keyframes: Vec<Keyframe>,
}

fn default_background() -> Color {
    Color::BLACK
}

impl Project {
    /// Create a new empty project.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ProjectId::new(),
            name: name.into(),
            frame_rate: FrameRate::FPS_30,
            resolution: Resolution::FULL_HD,
            background: Color::BLACK,
            clips: Vec::new(),
            effects: Vec::new(),
            transitions: Vec::new(),
            keyframes: Vec::new(),
        }
    }

    /// Builder-style output settings.
    pub fn with_output(mut self, resolution: Resolution, frame_rate: FrameRate) -> Self {
        self.resolution = resolution;
        self.frame_rate = frame_rate;
        self
    }

    /// Latest clip end, or zero for an empty project.
    pub fn duration(&self) -> RationalTime {
        self.clips
            .iter()
            .map(Clip::end)
            .max()
            .unwrap_or(RationalTime::ZERO)
    }

    /// Get the time range of the project.
    pub fn time_range(&self) -> TimeRange {
        TimeRange::new(RationalTime::ZERO, self.duration())
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn clip(&self, id: ClipId) -> Option<&Clip> {
        self.clips.iter().find(|c| c.id == id)
    }

    pub fn clip_mut(&mut self, id: ClipId) -> Option<&mut Clip> {
        self.clips.iter_mut().find(|c| c.id == id)
    }

    pub(crate) fn clip_index(&self, id: ClipId) -> Option<usize> {
        self.clips.iter().position(|c| c.id == id)
    }

    /// Clips showing at `time` (both clip edges inclusive), bottom layer
    /// first, ties broken by start.
    pub fn active_clips_at(&self, time: RationalTime) -> Vec<&Clip> {
        let mut active: Vec<&Clip> = self
            .clips
            .iter()
            .filter(|c| c.is_active_at(time))
            .collect();
        active.sort_by(|a, b| a.layer.cmp(&b.layer).then(a.start.cmp(&b.start)));
        active
    }

    /// Clips grouped per layer, for presentation.
    pub fn tracks_by_layer(&self) -> Vec<Track<'_>> {
        tracks_by_layer(&self.clips)
    }

    /// Keyframes owned by `clip`.
    pub fn keyframes_of(&self, clip: ClipId) -> impl Iterator<Item = &Keyframe> {
        self.keyframes.iter().filter(move |kf| kf.clip_id == clip)
    }

    /// Check every document invariant. Used when loading documents from
    /// outside the timeline model.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.resolution.is_valid() {
            return Err(ValidationError::ExportFormat(format!(
                "project resolution {} is empty",
                self.resolution
            )));
        }
        if !self.frame_rate.is_valid() {
            return Err(ValidationError::ExportFormat(format!(
                "project frame rate {}/{} is invalid",
                self.frame_rate.numerator, self.frame_rate.denominator
            )));
        }

        let mut ids = HashSet::new();
        for clip in &self.clips {
            clip.validate()?;
            if !ids.insert(clip.id) {
                return Err(ValidationError::DuplicateId {
                    kind: "clip",
                    id: clip.id.to_string(),
                });
            }
        }

        for track in self.tracks_by_layer() {
            for pair in track.clips.windows(2) {
                if pair[0].range().overlaps(pair[1].range()) {
                    return Err(ValidationError::Overlap {
                        clip: pair[1].id,
                        other: pair[0].id,
                        layer: track.layer,
                    });
                }
            }
        }

        for transition in &self.transitions {
            transition.validate()?;
        }

        let mut keys = HashSet::new();
        for kf in &self.keyframes {
            if !ids.contains(&kf.clip_id) {
                return Err(ValidationError::not_found("clip", kf.clip_id));
            }
            if !keys.insert((kf.clip_id, kf.property, kf.time)) {
                return Err(ValidationError::DuplicateKeyframe {
                    property: kf.property.to_string(),
                    time: kf.time,
                });
            }
        }
        Ok(())
    }
}

impl Default for Project {
    fn default() -> Self {
        Self::new("Untitled Project")
    }
}
