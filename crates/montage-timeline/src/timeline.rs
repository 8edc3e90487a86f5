//! The timeline model: every mutation of a project goes through here.
//!
//! Each operation either applies completely or returns an error and leaves
//! the project untouched.

use std::sync::Arc;

use montage_core::{
    ClipId, Easing, EffectId, Keyframe, KeyframeId, KeyframeTrack, Property, RationalTime, Result,
    TimeRange, TransitionId, ValidationError,
};

use crate::clip::{Clip, ClipPatch};
use crate::effect::{Effect, EffectPatch};
use crate::observer::{TimelineEvent, TimelineObserver, TracingObserver};
use crate::placement::{Placement, PlacementResolver, TimelineSettings};
use crate::project::Project;
use crate::track::Track;
use crate::transition::{Transition, TransitionPatch};

/// Partial update for a keyframe. Its clip and property are fixed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyframePatch {
    pub time: Option<RationalTime>,
    pub value: Option<f64>,
    pub easing: Option<Easing>,
    pub enabled: Option<bool>,
}

/// Owns the live project and enforces its invariants.
pub struct Timeline {
    project: Project,
    resolver: PlacementResolver,
    observer: Arc<dyn TimelineObserver>,
}

impl std::fmt::Debug for Timeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timeline")
            .field("project", &self.project.name)
            .field("clips", &self.project.clips.len())
            .field("settings", self.resolver.settings())
            .finish()
    }
}

impl Timeline {
    /// Wrap a project. The project must already satisfy every invariant.
    pub fn new(
        project: Project,
        settings: TimelineSettings,
        observer: Arc<dyn TimelineObserver>,
    ) -> Result<Self> {
        project.validate()?;
        Ok(Self {
            project,
            resolver: PlacementResolver::new(settings),
            observer,
        })
    }

    /// Default settings, logging through `tracing`.
    pub fn from_project(project: Project) -> Result<Self> {
        Self::new(project, TimelineSettings::default(), Arc::new(TracingObserver))
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn into_project(self) -> Project {
        self.project
    }

    pub fn resolver(&self) -> &PlacementResolver {
        &self.resolver
    }

    pub fn duration(&self) -> RationalTime {
        self.project.duration()
    }

    /// Replace the live project with a snapshot.
    pub fn restore(&mut self, project: Project) {
        self.project = project;
        self.emit(TimelineEvent::Restored);
    }

    fn emit(&self, event: TimelineEvent) {
        self.observer.on_event(&event);
    }

    // ── Queries ─────────────────────────────────────────────────

    pub fn clip(&self, id: ClipId) -> Option<&Clip> {
        self.project.clip(id)
    }

    /// Clips showing at `time`, bottom layer first.
    pub fn active_clips_at(&self, time: RationalTime) -> Vec<&Clip> {
        self.project.active_clips_at(time)
    }

    pub fn tracks_by_layer(&self) -> Vec<Track<'_>> {
        self.project.tracks_by_layer()
    }

    /// Keyframes for one clip property, sorted by time.
    pub fn keyframes_for(&self, clip: ClipId, property: Property) -> Vec<&Keyframe> {
        let mut keys: Vec<&Keyframe> = self
            .project
            .keyframes_of(clip)
            .filter(|kf| kf.property == property)
            .collect();
        keys.sort_by_key(|kf| kf.time);
        keys
    }

    pub fn keyframe_track(&self, clip: ClipId, property: Property) -> KeyframeTrack {
        KeyframeTrack::collect(clip, property, &self.project.keyframes)
    }

    fn existing_clip(&self, id: ClipId) -> std::result::Result<&Clip, ValidationError> {
        self.project
            .clip(id)
            .ok_or_else(|| ValidationError::not_found("clip", id))
    }

    fn check_free(&self, clip: &Clip) -> std::result::Result<(), ValidationError> {
        match self
            .resolver
            .conflict(&self.project, clip.id, clip.layer, clip.range())
        {
            Some(other) => Err(ValidationError::Overlap {
                clip: clip.id,
                other: other.id,
                layer: clip.layer,
            }),
            None => Ok(()),
        }
    }

    // ── Clips ───────────────────────────────────────────────────

    /// Add a clip. Rejected if it is malformed or overlaps a sibling.
    pub fn add_clip(&mut self, clip: Clip) -> Result<ClipId> {
        clip.validate()?;
        if self.project.clip(clip.id).is_some() {
            return Err(ValidationError::DuplicateId {
                kind: "clip",
                id: clip.id.to_string(),
            }
            .into());
        }
        self.check_free(&clip)?;

        let id = clip.id;
        self.project.clips.push(clip);
        self.emit(TimelineEvent::ClipAdded(id));
        Ok(id)
    }

    /// Apply a partial update. Placement changes are checked for overlap
    /// but not snapped.
    pub fn update_clip(&mut self, id: ClipId, patch: &ClipPatch) -> Result<()> {
        let mut updated = self.existing_clip(id)?.clone();
        patch.apply_to(&mut updated);
        updated.validate()?;
        if patch.changes_placement() {
            self.check_free(&updated)?;
        }

        let shift = match self.project.clip_mut(id) {
            Some(slot) => {
                let shift = updated.start - slot.start;
                *slot = updated;
                shift
            }
            None => RationalTime::ZERO,
        };
        self.shift_keyframes(id, shift);
        self.emit(TimelineEvent::ClipUpdated(id));
        Ok(())
    }

    /// Remove a clip along with its keyframes. Transitions that named it
    /// fall back to inferring their clips.
    pub fn remove_clip(&mut self, id: ClipId) -> Result<Clip> {
        let index = self
            .project
            .clip_index(id)
            .ok_or_else(|| ValidationError::not_found("clip", id))?;
        let clip = self.project.clips.remove(index);

        self.project.keyframes.retain(|kf| kf.clip_id != id);
        for transition in &mut self.project.transitions {
            if transition.from == Some(id) {
                transition.from = None;
            }
            if transition.to == Some(id) {
                transition.to = None;
            }
        }

        self.emit(TimelineEvent::ClipRemoved(id));
        Ok(clip)
    }

    /// Drag a clip along its layer. Returns the accepted range.
    pub fn move_clip(&mut self, id: ClipId, start: RationalTime) -> Result<TimeRange> {
        let layer = self.existing_clip(id)?.layer;
        let placement = self.resolver.resolve_move(&self.project, id, start)?;
        self.apply_placement(id, placement, layer)
    }

    /// Drag a clip to a new start on another layer.
    pub fn move_clip_to_layer(
        &mut self,
        id: ClipId,
        start: RationalTime,
        layer: i32,
    ) -> Result<TimeRange> {
        let placement = self
            .resolver
            .resolve_move_to_layer(&self.project, id, start, layer)?;
        self.apply_placement(id, placement, layer)
    }

    /// Change a clip's duration, keeping its start fixed.
    pub fn resize_clip(&mut self, id: ClipId, duration: RationalTime) -> Result<TimeRange> {
        let layer = self.existing_clip(id)?.layer;
        let placement = self.resolver.resolve_resize(&self.project, id, duration)?;
        let range = self.apply_placement(id, placement, layer)?;
        self.emit(TimelineEvent::ClipResized {
            clip: id,
            duration: range.duration,
        });
        Ok(range)
    }

    fn apply_placement(
        &mut self,
        id: ClipId,
        placement: Placement,
        layer: i32,
    ) -> Result<TimeRange> {
        match placement {
            Placement::Rejected { conflict, .. } => {
                self.emit(TimelineEvent::PlacementRejected { clip: id, conflict });
                Err(ValidationError::Overlap {
                    clip: id,
                    other: conflict,
                    layer,
                }
                .into())
            }
            Placement::Accepted(range) => {
                let clip = self
                    .project
                    .clip_mut(id)
                    .ok_or_else(|| ValidationError::not_found("clip", id))?;
                let shift = range.start - clip.start;
                let moved = !shift.is_zero() || clip.layer != layer;
                clip.start = range.start;
                clip.duration = range.duration;
                clip.layer = layer;
                self.shift_keyframes(id, shift);
                if moved {
                    self.emit(TimelineEvent::ClipMoved {
                        clip: id,
                        start: range.start,
                        layer,
                    });
                }
                Ok(range)
            }
        }
    }

    /// Keyframes hold timeline time, so they travel with their clip.
    fn shift_keyframes(&mut self, id: ClipId, shift: RationalTime) {
        if shift.is_zero() {
            return;
        }
        for keyframe in self.project.keyframes.iter_mut().filter(|kf| kf.clip_id == id) {
            keyframe.time = keyframe.time + shift;
        }
    }

    /// Split a clip at `at`. Returns the id of the new right half.
    pub fn split_clip(&mut self, id: ClipId, at: RationalTime) -> Result<ClipId> {
        let outcome = self.resolver.split(&self.project, id, at)?;
        let index = self
            .project
            .clip_index(id)
            .ok_or_else(|| ValidationError::not_found("clip", id))?;

        let right_id = outcome.right.id;
        self.project.clips[index] = outcome.left;
        self.project.clips.insert(index + 1, outcome.right);
        self.project.keyframes.extend(outcome.right_keyframes);

        self.emit(TimelineEvent::ClipSplit {
            left: id,
            right: right_id,
        });
        Ok(right_id)
    }

    // ── Global effects ──────────────────────────────────────────

    pub fn add_effect(&mut self, effect: Effect) -> Result<EffectId> {
        if self.project.effects.iter().any(|e| e.id == effect.id) {
            return Err(ValidationError::DuplicateId {
                kind: "effect",
                id: effect.id.to_string(),
            }
            .into());
        }
        let id = effect.id;
        self.project.effects.push(effect);
        self.emit(TimelineEvent::EffectChanged(id));
        Ok(id)
    }

    pub fn update_effect(&mut self, id: EffectId, patch: &EffectPatch) -> Result<()> {
        let effect = find_effect(&mut self.project.effects, id)?;
        patch.apply_to(effect);
        self.emit(TimelineEvent::EffectChanged(id));
        Ok(())
    }

    pub fn set_effect_enabled(&mut self, id: EffectId, enabled: bool) -> Result<()> {
        self.update_effect(
            id,
            &EffectPatch {
                enabled: Some(enabled),
                ..Default::default()
            },
        )
    }

    pub fn remove_effect(&mut self, id: EffectId) -> Result<Effect> {
        let effect = take_effect(&mut self.project.effects, id)?;
        self.emit(TimelineEvent::EffectChanged(id));
        Ok(effect)
    }

    // ── Clip effects ────────────────────────────────────────────

    pub fn add_clip_effect(&mut self, clip: ClipId, effect: Effect) -> Result<EffectId> {
        let target = self
            .project
            .clip_mut(clip)
            .ok_or_else(|| ValidationError::not_found("clip", clip))?;
        if target.effects.iter().any(|e| e.id == effect.id) {
            return Err(ValidationError::DuplicateId {
                kind: "effect",
                id: effect.id.to_string(),
            }
            .into());
        }
        let id = effect.id;
        target.effects.push(effect);
        self.emit(TimelineEvent::EffectChanged(id));
        Ok(id)
    }

    pub fn update_clip_effect(
        &mut self,
        clip: ClipId,
        id: EffectId,
        patch: &EffectPatch,
    ) -> Result<()> {
        let target = self
            .project
            .clip_mut(clip)
            .ok_or_else(|| ValidationError::not_found("clip", clip))?;
        patch.apply_to(find_effect(&mut target.effects, id)?);
        self.emit(TimelineEvent::EffectChanged(id));
        Ok(())
    }

    pub fn remove_clip_effect(&mut self, clip: ClipId, id: EffectId) -> Result<Effect> {
        let target = self
            .project
            .clip_mut(clip)
            .ok_or_else(|| ValidationError::not_found("clip", clip))?;
        let effect = take_effect(&mut target.effects, id)?;
        self.emit(TimelineEvent::EffectChanged(id));
        Ok(effect)
    }

    // ── Transitions ─────────────────────────────────────────────

    fn check_transition(&self, transition: &Transition) -> std::result::Result<(), ValidationError> {
        transition.validate()?;
        for clip in [transition.from, transition.to].into_iter().flatten() {
            self.existing_clip(clip)?;
        }
        Ok(())
    }

    pub fn add_transition(&mut self, transition: Transition) -> Result<TransitionId> {
        self.check_transition(&transition)?;
        if self.project.transitions.iter().any(|t| t.id == transition.id) {
            return Err(ValidationError::DuplicateId {
                kind: "transition",
                id: transition.id.to_string(),
            }
            .into());
        }
        let id = transition.id;
        self.project.transitions.push(transition);
        self.emit(TimelineEvent::TransitionChanged(id));
        Ok(id)
    }

    pub fn update_transition(&mut self, id: TransitionId, patch: &TransitionPatch) -> Result<()> {
        let index = self
            .project
            .transitions
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| ValidationError::not_found("transition", id))?;
        let mut updated = self.project.transitions[index].clone();
        patch.apply_to(&mut updated);
        self.check_transition(&updated)?;

        self.project.transitions[index] = updated;
        self.emit(TimelineEvent::TransitionChanged(id));
        Ok(())
    }

    pub fn remove_transition(&mut self, id: TransitionId) -> Result<Transition> {
        let index = self
            .project
            .transitions
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| ValidationError::not_found("transition", id))?;
        let transition = self.project.transitions.remove(index);
        self.emit(TimelineEvent::TransitionChanged(id));
        Ok(transition)
    }

    // ── Keyframes ───────────────────────────────────────────────

    /// Add a keyframe. Its clip must exist and no other keyframe may sit at
    /// the same (clip, property, time).
    pub fn add_keyframe(&mut self, keyframe: Keyframe) -> Result<KeyframeId> {
        self.existing_clip(keyframe.clip_id)?;
        check_value(keyframe.value)?;
        if self.project.keyframes.iter().any(|kf| kf.id == keyframe.id) {
            return Err(ValidationError::DuplicateId {
                kind: "keyframe",
                id: keyframe.id.to_string(),
            }
            .into());
        }
        let mut track = self.keyframe_track(keyframe.clip_id, keyframe.property);
        track.insert(keyframe.clone())?;

        let id = keyframe.id;
        self.project.keyframes.push(keyframe);
        self.emit(TimelineEvent::KeyframeChanged(id));
        Ok(id)
    }

    pub fn update_keyframe(&mut self, id: KeyframeId, patch: &KeyframePatch) -> Result<()> {
        let index = self
            .project
            .keyframes
            .iter()
            .position(|kf| kf.id == id)
            .ok_or_else(|| ValidationError::not_found("keyframe", id))?;
        let current = &self.project.keyframes[index];

        if let Some(time) = patch.time {
            let mut track = self.keyframe_track(current.clip_id, current.property);
            track.remove(id);
            if track.has_key_at(time) {
                return Err(ValidationError::DuplicateKeyframe {
                    property: current.property.to_string(),
                    time,
                }
                .into());
            }
        }
        if let Some(value) = patch.value {
            check_value(value)?;
        }

        let keyframe = &mut self.project.keyframes[index];
        if let Some(time) = patch.time {
            keyframe.time = time;
        }
        if let Some(value) = patch.value {
            keyframe.value = value;
        }
        if let Some(easing) = patch.easing {
            keyframe.easing = easing;
        }
        if let Some(enabled) = patch.enabled {
            keyframe.enabled = enabled;
        }
        self.emit(TimelineEvent::KeyframeChanged(id));
        Ok(())
    }

    pub fn remove_keyframe(&mut self, id: KeyframeId) -> Result<Keyframe> {
        let index = self
            .project
            .keyframes
            .iter()
            .position(|kf| kf.id == id)
            .ok_or_else(|| ValidationError::not_found("keyframe", id))?;
        let keyframe = self.project.keyframes.remove(index);
        self.emit(TimelineEvent::KeyframeChanged(id));
        Ok(keyframe)
    }
}

fn check_value(value: f64) -> std::result::Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            field: "keyframe value",
            value: value as f32,
        })
    }
}

fn find_effect(effects: &mut [Effect], id: EffectId) -> std::result::Result<&mut Effect, ValidationError> {
    effects
        .iter_mut()
        .find(|e| e.id == id)
        .ok_or_else(|| ValidationError::not_found("effect", id))
}

fn take_effect(effects: &mut Vec<Effect>, id: EffectId) -> std::result::Result<Effect, ValidationError> {
    let index = effects
        .iter()
        .position(|e| e.id == id)
        .ok_or_else(|| ValidationError::not_found("effect", id))?;
    Ok(effects.remove(index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::{AssetRef, MediaKind};
    use crate::effect::EffectKind;
    use crate::observer::EventLog;
    use crate::transition::TransitionKind;
    use montage_core::MontageError;

    fn secs(s: i64) -> RationalTime {
        RationalTime::from_secs(s)
    }

    fn clip(start: i64, duration: i64, layer: i32) -> Clip {
        Clip::new(
            "c",
            AssetRef::new("a.mp4", MediaKind::Video),
            secs(start),
            secs(duration),
            layer,
        )
    }

    fn timeline() -> (Timeline, Arc<EventLog>) {
        let log = Arc::new(EventLog::new());
        let timeline = Timeline::new(
            Project::new("test"),
            TimelineSettings::default(),
            log.clone(),
        )
        .unwrap();
        (timeline, log)
    }

    fn is_overlap(err: &MontageError) -> bool {
        matches!(err, MontageError::Validation(ValidationError::Overlap { .. }))
    }

    #[test]
    fn test_add_clip_rejects_overlap() {
        let (mut tl, _) = timeline();
        tl.add_clip(clip(0, 5, 0)).unwrap();
        let err = tl.add_clip(clip(4, 2, 0)).unwrap_err();
        assert!(is_overlap(&err));
        assert_eq!(tl.project().clips.len(), 1);

        tl.add_clip(clip(4, 2, 1)).unwrap();
        assert_eq!(tl.project().clips.len(), 2);
    }

    #[test]
    fn test_add_clip_rejects_bad_geometry() {
        let (mut tl, _) = timeline();
        let mut bad = clip(0, 1, 0);
        bad.duration = secs(-1);
        assert!(tl.add_clip(bad).unwrap_err().is_validation());
        assert!(tl.project().is_empty());
    }

    #[test]
    fn test_duration_tracks_clips() {
        let (mut tl, _) = timeline();
        tl.add_clip(clip(0, 30, 0)).unwrap();
        assert_eq!(tl.duration(), secs(30));
        let late = tl.add_clip(clip(40, 2, 1)).unwrap();
        assert_eq!(tl.duration(), secs(42));
        tl.remove_clip(late).unwrap();
        assert_eq!(tl.duration(), secs(30));
    }

    #[test]
    fn test_rejected_move_leaves_clip_and_notifies() {
        let (mut tl, log) = timeline();
        let a = tl.add_clip(clip(0, 5, 0)).unwrap();
        let b = tl.add_clip(clip(5, 5, 0)).unwrap();
        log.clear();

        let err = tl.move_clip(a, secs(6)).unwrap_err();
        assert!(is_overlap(&err));
        assert_eq!(tl.clip(a).unwrap().start, RationalTime::ZERO);
        assert_eq!(
            log.events(),
            vec![TimelineEvent::PlacementRejected {
                clip: a,
                conflict: b
            }]
        );
    }

    #[test]
    fn test_move_and_resize() {
        let (mut tl, _) = timeline();
        let a = tl.add_clip(clip(0, 5, 0)).unwrap();
        tl.add_clip(clip(0, 20, 1)).unwrap();

        let range = tl.move_clip(a, RationalTime::new(71, 10)).unwrap();
        assert_eq!(range.start, secs(7));
        assert_eq!(tl.clip(a).unwrap().end(), secs(12));

        let range = tl.resize_clip(a, secs(3)).unwrap();
        assert_eq!(range, TimeRange::new(secs(7), secs(3)));

        let range = tl.move_clip_to_layer(a, secs(1), 2).unwrap();
        assert_eq!(range.start, secs(1));
        assert_eq!(tl.clip(a).unwrap().layer, 2);
    }

    #[test]
    fn test_keyframes_follow_moved_clip() {
        let (mut tl, _) = timeline();
        let a = tl.add_clip(clip(0, 10, 0)).unwrap();
        tl.add_keyframe(Keyframe::new(a, Property::Opacity, secs(0), 0.0))
            .unwrap();
        tl.add_keyframe(Keyframe::new(a, Property::Opacity, secs(2), 1.0))
            .unwrap();
        let opacity_at = |tl: &Timeline, t: RationalTime| {
            tl.keyframe_track(a, Property::Opacity).evaluate(t, 1.0)
        };
        assert_eq!(opacity_at(&tl, secs(1)), 0.5);

        tl.move_clip(a, secs(20)).unwrap();
        let times: Vec<_> = tl.keyframes_for(a, Property::Opacity).iter().map(|k| k.time).collect();
        assert_eq!(times, vec![secs(20), secs(22)]);
        assert_eq!(opacity_at(&tl, secs(21)), 0.5);

        tl.move_clip_to_layer(a, secs(5), 1).unwrap();
        assert_eq!(opacity_at(&tl, secs(6)), 0.5);

        tl.update_clip(
            a,
            &ClipPatch {
                start: Some(secs(30)),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(opacity_at(&tl, secs(31)), 0.5);
    }

    #[test]
    fn test_rejected_move_keeps_keyframes() {
        let (mut tl, _) = timeline();
        let a = tl.add_clip(clip(0, 5, 0)).unwrap();
        tl.add_clip(clip(5, 5, 0)).unwrap();
        tl.add_keyframe(Keyframe::new(a, Property::X, secs(1), 10.0))
            .unwrap();

        assert!(tl.move_clip(a, secs(6)).is_err());
        assert_eq!(tl.keyframes_for(a, Property::X)[0].time, secs(1));
    }

    #[test]
    fn test_update_clip_checks_placement() {
        let (mut tl, _) = timeline();
        let a = tl.add_clip(clip(0, 5, 0)).unwrap();
        tl.add_clip(clip(5, 5, 0)).unwrap();

        let patch = ClipPatch {
            duration: Some(secs(6)),
            ..Default::default()
        };
        assert!(is_overlap(&tl.update_clip(a, &patch).unwrap_err()));
        assert_eq!(tl.clip(a).unwrap().duration, secs(5));

        let patch = ClipPatch {
            opacity: Some(2.0),
            ..Default::default()
        };
        assert!(tl.update_clip(a, &patch).is_err());

        let patch = ClipPatch {
            name: Some("intro".into()),
            opacity: Some(0.25),
            ..Default::default()
        };
        tl.update_clip(a, &patch).unwrap();
        assert_eq!(tl.clip(a).unwrap().name, "intro");
        assert_eq!(tl.clip(a).unwrap().opacity, 0.25);
    }

    #[test]
    fn test_remove_clip_cleans_references() {
        let (mut tl, _) = timeline();
        let a = tl.add_clip(clip(0, 5, 0)).unwrap();
        let b = tl.add_clip(clip(5, 5, 0)).unwrap();
        tl.add_keyframe(Keyframe::new(a, Property::Opacity, secs(1), 0.5))
            .unwrap();
        let t = tl
            .add_transition(
                Transition::new(TransitionKind::Dissolve, secs(4), secs(2)).between(a, b),
            )
            .unwrap();

        tl.remove_clip(a).unwrap();
        assert!(tl.project().keyframes.is_empty());
        let transition = tl.project().transitions.iter().find(|x| x.id == t).unwrap();
        assert_eq!(transition.from, None);
        assert_eq!(transition.to, Some(b));
        assert!(tl.remove_clip(a).is_err());
    }

    #[test]
    fn test_split_scenario() {
        let (mut tl, log) = timeline();
        let mut original = clip(2, 6, 4);
        original.opacity = 0.6;
        let id = tl.add_clip(original).unwrap();

        let right = tl.split_clip(id, secs(5)).unwrap();
        let left = tl.clip(id).unwrap();
        let right_clip = tl.clip(right).unwrap();
        assert_eq!(left.range(), TimeRange::new(secs(2), secs(3)));
        assert_eq!(right_clip.range(), TimeRange::new(secs(5), secs(3)));
        assert_eq!((left.layer, right_clip.layer), (4, 4));
        assert_eq!((left.opacity, right_clip.opacity), (0.6, 0.6));
        assert!(log
            .events()
            .contains(&TimelineEvent::ClipSplit { left: id, right }));
        assert!(tl.project().validate().is_ok());
    }

    #[test]
    fn test_keyframe_crud() {
        let (mut tl, _) = timeline();
        let c = tl.add_clip(clip(0, 10, 0)).unwrap();

        let k2 = tl
            .add_keyframe(Keyframe::new(c, Property::X, secs(2), 100.0))
            .unwrap();
        tl.add_keyframe(Keyframe::new(c, Property::X, secs(0), 0.0))
            .unwrap();
        let dup = tl.add_keyframe(Keyframe::new(c, Property::X, secs(2), 5.0));
        assert!(matches!(
            dup,
            Err(MontageError::Validation(ValidationError::DuplicateKeyframe { .. }))
        ));
        // Same time on another property is fine.
        tl.add_keyframe(Keyframe::new(c, Property::Y, secs(2), 5.0))
            .unwrap();

        let orphan = tl.add_keyframe(Keyframe::new(ClipId::new(), Property::X, secs(1), 1.0));
        assert!(orphan.is_err());

        let times: Vec<_> = tl
            .keyframes_for(c, Property::X)
            .iter()
            .map(|kf| kf.time)
            .collect();
        assert_eq!(times, vec![secs(0), secs(2)]);

        let clash = tl.update_keyframe(
            k2,
            &KeyframePatch {
                time: Some(secs(0)),
                ..Default::default()
            },
        );
        assert!(clash.is_err());

        tl.update_keyframe(
            k2,
            &KeyframePatch {
                time: Some(secs(4)),
                easing: Some(Easing::EaseOut),
                ..Default::default()
            },
        )
        .unwrap();
        let track = tl.keyframe_track(c, Property::X);
        assert!(track.has_key_at(secs(4)));
        assert!((track.evaluate(secs(2), 0.0) - 50.0).abs() > 1.0);

        tl.remove_keyframe(k2).unwrap();
        assert_eq!(tl.keyframes_for(c, Property::X).len(), 1);
    }

    #[test]
    fn test_effects_crud() {
        let (mut tl, _) = timeline();
        let c = tl.add_clip(clip(0, 10, 0)).unwrap();

        let global = tl
            .add_effect(Effect::new(EffectKind::Contrast { amount: 1.2 }))
            .unwrap();
        tl.set_effect_enabled(global, false).unwrap();
        assert!(!tl.project().effects[0].enabled);
        tl.update_effect(
            global,
            &EffectPatch {
                kind: Some(EffectKind::Contrast { amount: 2.0 }),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(
            tl.project().effects[0].kind,
            EffectKind::Contrast { amount: 2.0 }
        );
        tl.remove_effect(global).unwrap();
        assert!(tl.remove_effect(global).is_err());

        let local = tl
            .add_clip_effect(c, Effect::new(EffectKind::Blur { radius: 1 }))
            .unwrap();
        tl.update_clip_effect(
            c,
            local,
            &EffectPatch {
                enabled: Some(false),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(!tl.clip(c).unwrap().effects[0].enabled);
        tl.remove_clip_effect(c, local).unwrap();
        assert!(tl.clip(c).unwrap().effects.is_empty());
    }

    #[test]
    fn test_transition_validation() {
        let (mut tl, _) = timeline();
        let bad = Transition::new(TransitionKind::Fade, secs(0), RationalTime::ZERO);
        assert!(tl.add_transition(bad).is_err());

        let dangling = Transition::new(TransitionKind::Fade, secs(0), secs(1))
            .between(ClipId::new(), ClipId::new());
        assert!(tl.add_transition(dangling).is_err());

        let ok = tl
            .add_transition(Transition::new(TransitionKind::Push, secs(0), secs(1)))
            .unwrap();
        tl.update_transition(
            ok,
            &TransitionPatch {
                duration: Some(secs(2)),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(tl.project().transitions[0].duration, secs(2));
        assert!(tl
            .update_transition(
                ok,
                &TransitionPatch {
                    intensity: Some(3.0),
                    ..Default::default()
                }
            )
            .is_err());
        tl.remove_transition(ok).unwrap();
    }

    #[test]
    fn test_new_rejects_invalid_project() {
        let mut project = Project::new("bad");
        project.clips = vec![clip(0, 5, 0), clip(1, 5, 0)];
        assert!(Timeline::from_project(project).is_err());
    }
}
