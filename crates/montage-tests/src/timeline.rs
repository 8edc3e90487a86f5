//! Integration tests for timeline editing.
//!
//! Exercises montage-core and montage-timeline together: placement rules,
//! derived duration, splitting, sessions and project files.

use std::sync::Arc;

use montage_core::{
    EditorConfig, Keyframe, MontageError, Property, RationalTime, TimeRange, ValidationError,
};
use montage_timeline::{
    AssetRef, Clip, EditSession, EventLog, MediaKind, Project, ProjectFile, TimelineEvent,
    Timeline, TimelineSettings,
};

// ── Helpers ────────────────────────────────────────────────────

fn secs(s: i64) -> RationalTime {
    RationalTime::from_secs(s)
}

fn video(name: &str, start: i64, duration: i64, layer: i32) -> Clip {
    Clip::new(
        name,
        AssetRef::new(format!("media/{name}.png"), MediaKind::Image),
        secs(start),
        secs(duration),
        layer,
    )
}

fn timeline_with(clips: Vec<Clip>) -> Timeline {
    let mut timeline = Timeline::from_project(Project::new("Integration")).unwrap();
    for clip in clips {
        timeline.add_clip(clip).unwrap();
    }
    timeline
}

// ── Scenarios ──────────────────────────────────────────────────

#[test]
fn overlapping_move_is_rejected_and_clip_stays() {
    let a = video("a", 0, 5, 0);
    let b = video("b", 5, 5, 0);
    let a_id = a.id;
    let b_id = b.id;
    let mut timeline = timeline_with(vec![a, b]);

    let err = timeline.move_clip(a_id, secs(6)).unwrap_err();
    assert!(matches!(
        err,
        MontageError::Validation(ValidationError::Overlap { clip, other, layer: 0 })
            if clip == a_id && other == b_id
    ));
    assert_eq!(timeline.clip(a_id).unwrap().start, RationalTime::ZERO);
    assert_eq!(timeline.clip(a_id).unwrap().duration, secs(5));
}

#[test]
fn adding_later_clip_extends_duration() {
    let mut timeline = timeline_with(vec![video("a", 0, 30, 0)]);
    assert_eq!(timeline.duration(), secs(30));

    timeline.add_clip(video("b", 40, 2, 1)).unwrap();
    assert_eq!(timeline.duration(), secs(42));
    assert_eq!(timeline.project().duration(), secs(42));
}

#[test]
fn split_produces_adjacent_halves() {
    let mut clip = video("long", 2, 6, 3);
    clip.opacity = 0.6;
    let id = clip.id;
    let mut timeline = timeline_with(vec![clip]);

    let right = timeline.split_clip(id, secs(5)).unwrap();
    let left = timeline.clip(id).unwrap();
    let right = timeline.clip(right).unwrap();

    assert_eq!(left.range(), TimeRange::from_start_end(secs(2), secs(5)));
    assert_eq!(right.range(), TimeRange::from_start_end(secs(5), secs(8)));
    assert_eq!((left.layer, right.layer), (3, 3));
    assert_eq!((left.opacity, right.opacity), (0.6, 0.6));
    assert_eq!(right.source_in, secs(3));
}

// ── Editing ────────────────────────────────────────────────────

#[test]
fn split_copies_keyframes_to_right_half() {
    let clip = video("keyed", 0, 4, 0);
    let id = clip.id;
    let mut timeline = timeline_with(vec![clip]);
    timeline
        .add_keyframe(Keyframe::new(id, Property::Opacity, secs(1), 0.5))
        .unwrap();

    let right = timeline.split_clip(id, secs(2)).unwrap();
    assert_eq!(timeline.project().keyframes_of(id).count(), 1);
    assert_eq!(timeline.project().keyframes_of(right).count(), 1);
}

#[test]
fn move_to_free_layer_succeeds() {
    let a = video("a", 0, 5, 0);
    let b = video("b", 5, 5, 0);
    let a_id = a.id;
    let mut timeline = timeline_with(vec![a, b]);

    let range = timeline.move_clip_to_layer(a_id, secs(6), 1).unwrap();
    assert_eq!(range.start, secs(6));
    assert_eq!(timeline.clip(a_id).unwrap().layer, 1);
}

#[test]
fn resize_is_limited_to_project_duration() {
    let a = video("a", 0, 4, 0);
    let a_id = a.id;
    let mut timeline = timeline_with(vec![a, video("b", 0, 10, 1)]);

    let range = timeline.resize_clip(a_id, secs(25)).unwrap();
    assert_eq!(range.duration, secs(10));
}

#[test]
fn rejected_placement_is_observed() {
    let log = Arc::new(EventLog::new());
    let a = video("a", 0, 5, 0);
    let b = video("b", 5, 5, 0);
    let a_id = a.id;
    let mut project = Project::new("Observed");
    project.clips = vec![a, b];
    let mut timeline = Timeline::new(project, TimelineSettings::default(), log.clone()).unwrap();

    assert!(timeline.move_clip(a_id, secs(7)).is_err());
    assert!(log
        .events()
        .iter()
        .any(|e| matches!(e, TimelineEvent::PlacementRejected { clip, .. } if *clip == a_id)));
}

#[test]
fn session_undo_redo_round_trip() {
    let a = video("a", 0, 5, 0);
    let a_id = a.id;
    let timeline = timeline_with(vec![a]);
    let original = timeline.project().clone();
    let mut session = EditSession::with_config(timeline, &EditorConfig::default());

    session.edit("Move", |t| t.move_clip(a_id, secs(3))).unwrap();
    session.edit("Resize", |t| t.resize_clip(a_id, secs(2))).unwrap();
    session
        .edit("Add", |t| t.add_clip(video("b", 10, 1, 0)))
        .unwrap();
    let edited = session.timeline().project().clone();

    while session.undo() {}
    assert_eq!(session.timeline().project(), &original);
    assert!(!session.can_undo());

    while session.redo() {}
    assert_eq!(session.timeline().project(), &edited);
}

#[test]
fn failed_edit_batch_rolls_back() {
    let a = video("a", 0, 5, 0);
    let b = video("b", 5, 5, 0);
    let (a_id, b_id) = (a.id, b.id);
    let mut session = EditSession::new(timeline_with(vec![a, b]), 10);
    let before = session.timeline().project().clone();

    let result = session.edit("Shuffle", |t| {
        t.move_clip(b_id, secs(20))?;
        t.move_clip(a_id, secs(21))
    });
    assert!(result.is_err());
    assert_eq!(session.timeline().project(), &before);
    assert_eq!(session.history().len(), 1);
}

// ── Persistence ────────────────────────────────────────────────

#[test]
fn project_file_survives_disk_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("project.json");

    let mut clip = video("a", 1, 3, 0);
    clip.transform.x = 40.0;
    let id = clip.id;
    let mut timeline = timeline_with(vec![clip, Clip::text("Title", secs(0), secs(2), 2)]);
    timeline
        .add_keyframe(Keyframe::new(id, Property::X, secs(2), 80.0))
        .unwrap();
    let project = timeline.into_project();

    ProjectFile::new(project.clone()).save_to_file(&path).unwrap();
    let loaded = ProjectFile::load_from_file(&path).unwrap();
    assert_eq!(loaded.project, project);
}

#[test]
fn loading_overlapping_project_fails() {
    let mut project = Project::new("Broken");
    project.clips = vec![video("a", 0, 5, 0), video("b", 3, 5, 0)];
    let json = ProjectFile::new(project).to_json().unwrap();
    assert!(ProjectFile::from_json(&json).is_err());
}
