//! Property tests over the editing invariants.

use montage_core::{value_at, ClipId, Keyframe, Property, RationalTime, ValidationError};
use montage_timeline::{
    AssetRef, Clip, EditSession, MediaKind, NullObserver, PlacementResolver, Project, Timeline,
    TimelineSettings,
};
use proptest::prelude::*;
use std::sync::Arc;

fn tenths(n: i64) -> RationalTime {
    RationalTime::new(n, 10)
}

#[derive(Debug, Clone)]
enum Op {
    Add { start: i64, duration: i64, layer: i32 },
    Move { pick: usize, start: i64 },
    MoveToLayer { pick: usize, start: i64, layer: i32 },
    Resize { pick: usize, duration: i64 },
    Split { pick: usize, at: i64 },
    Remove { pick: usize },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0i64..200, 1i64..60, 0i32..3)
            .prop_map(|(start, duration, layer)| Op::Add { start, duration, layer }),
        (any::<usize>(), 0i64..200).prop_map(|(pick, start)| Op::Move { pick, start }),
        (any::<usize>(), 0i64..200, 0i32..3)
            .prop_map(|(pick, start, layer)| Op::MoveToLayer { pick, start, layer }),
        (any::<usize>(), 1i64..80).prop_map(|(pick, duration)| Op::Resize { pick, duration }),
        (any::<usize>(), 0i64..200).prop_map(|(pick, at)| Op::Split { pick, at }),
        any::<usize>().prop_map(|pick| Op::Remove { pick }),
    ]
}

fn settings() -> TimelineSettings {
    TimelineSettings {
        grid: RationalTime::new(1, 2),
        ..TimelineSettings::default()
    }
}

fn empty_timeline() -> Timeline {
    Timeline::new(Project::new("Props"), settings(), Arc::new(NullObserver)).unwrap()
}

fn pick(timeline: &Timeline, pick: usize) -> montage_core::Result<ClipId> {
    let clips = &timeline.project().clips;
    if clips.is_empty() {
        return Err(ValidationError::not_found("clip", pick).into());
    }
    Ok(clips[pick % clips.len()].id)
}

fn apply(timeline: &mut Timeline, op: &Op) -> montage_core::Result<()> {
    match *op {
        Op::Add { start, duration, layer } => {
            timeline.add_clip(Clip::new(
                "clip",
                AssetRef::new("clip.png", MediaKind::Image),
                tenths(start),
                tenths(duration),
                layer,
            ))?;
        }
        Op::Move { pick: p, start } => {
            let id = pick(timeline, p)?;
            timeline.move_clip(id, tenths(start))?;
        }
        Op::MoveToLayer { pick: p, start, layer } => {
            let id = pick(timeline, p)?;
            timeline.move_clip_to_layer(id, tenths(start), layer)?;
        }
        Op::Resize { pick: p, duration } => {
            let id = pick(timeline, p)?;
            timeline.resize_clip(id, tenths(duration))?;
        }
        Op::Split { pick: p, at } => {
            let id = pick(timeline, p)?;
            timeline.split_clip(id, tenths(at))?;
        }
        Op::Remove { pick: p } => {
            let id = pick(timeline, p)?;
            timeline.remove_clip(id)?;
        }
    }
    Ok(())
}

fn assert_no_overlap(project: &Project) -> Result<(), TestCaseError> {
    for (i, a) in project.clips.iter().enumerate() {
        prop_assert!(a.duration.is_positive());
        for b in &project.clips[i + 1..] {
            if a.layer == b.layer {
                prop_assert!(
                    !a.range().overlaps(b.range()),
                    "{} and {} overlap on layer {}",
                    a.range(),
                    b.range(),
                    a.layer
                );
            }
        }
    }
    Ok(())
}

#[test]
fn interpolation_law() {
    let clip = ClipId::new();
    let keys = [
        Keyframe::new(clip, Property::Opacity, RationalTime::ZERO, 0.0),
        Keyframe::new(clip, Property::Opacity, RationalTime::from_secs(2), 1.0),
    ];
    let at = |s: i64| value_at(&keys, RationalTime::from_secs(s), 0.25);
    assert!((at(1) - 0.5).abs() < 1e-12);
    assert_eq!(at(-1), 0.0);
    assert_eq!(at(3), 1.0);
    assert_eq!(value_at(std::iter::empty(), RationalTime::from_secs(1), 0.25), 0.25);
}

proptest! {
    #[test]
    fn duration_is_latest_clip_end(ops in prop::collection::vec(op(), 1..40)) {
        let mut timeline = empty_timeline();
        for op in &ops {
            let _ = apply(&mut timeline, op);
            let project = timeline.project();
            let latest = project
                .clips
                .iter()
                .map(|c| c.start + c.duration)
                .max()
                .unwrap_or(RationalTime::ZERO);
            prop_assert_eq!(project.duration(), latest);
        }
    }

    #[test]
    fn same_layer_clips_never_overlap(ops in prop::collection::vec(op(), 1..60)) {
        let mut timeline = empty_timeline();
        for op in &ops {
            let _ = apply(&mut timeline, op);
            assert_no_overlap(timeline.project())?;
        }
    }

    #[test]
    fn resolver_snap_is_idempotent(n in -100_000i64..100_000, d in 1i64..1000) {
        let resolver = PlacementResolver::new(settings());
        let once = resolver.snap(RationalTime::new(n, d));
        prop_assert_eq!(resolver.snap(once), once);
    }

    #[test]
    fn undoing_every_edit_restores_original(ops in prop::collection::vec(op(), 1..30)) {
        let mut timeline = empty_timeline();
        for seed in [Op::Add { start: 0, duration: 20, layer: 0 }, Op::Add { start: 30, duration: 10, layer: 1 }] {
            apply(&mut timeline, &seed).unwrap();
        }
        let original = timeline.project().clone();
        let mut session = EditSession::new(timeline, 64);

        let mut accepted = 0;
        for op in &ops {
            if session.edit("op", |t| apply(t, op)).is_ok() {
                accepted += 1;
            }
        }

        for _ in 0..accepted {
            prop_assert!(session.undo());
        }
        prop_assert!(!session.can_undo());
        prop_assert_eq!(session.timeline().project(), &original);
    }

    #[test]
    fn linear_keyframes_stay_between_values(
        t in -100i64..300,
        v0 in -50.0f64..50.0,
        v1 in -50.0f64..50.0,
    ) {
        let clip = ClipId::new();
        let keys = [
            Keyframe::new(clip, Property::X, RationalTime::ZERO, v0),
            Keyframe::new(clip, Property::X, RationalTime::from_secs(2), v1),
        ];
        let value = value_at(&keys, RationalTime::new(t, 100), 0.0);
        prop_assert!(value >= v0.min(v1) - 1e-9 && value <= v0.max(v1) + 1e-9);
    }
}
