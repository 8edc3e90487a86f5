//! Integration tests for rendering.
//!
//! Projects are built and edited through montage-timeline, then rendered
//! by montage-render with in-memory and on-disk assets.

use std::sync::Arc;
use std::time::Duration;

use montage_core::{
    CancelToken, Color, FrameBuffer, FrameRate, Keyframe, Property, RationalTime, Resolution,
};
use montage_render::{Compositor, FileAssets, MemoryAssets, PreviewDriver};
use montage_timeline::{
    AssetRef, Clip, Direction, Effect, EffectKind, MediaKind, NullObserver, Project, ProjectFile,
    Timeline, Transition, TransitionKind,
};

const RED: [u8; 4] = [255, 0, 0, 255];
const GREEN: [u8; 4] = [0, 255, 0, 255];
const BLACK: [u8; 4] = [0, 0, 0, 255];

fn secs(s: i64) -> RationalTime {
    RationalTime::from_secs(s)
}

fn still(url: &str, start: i64, duration: i64, layer: i32) -> Clip {
    Clip::new(url, AssetRef::new(url, MediaKind::Image), secs(start), secs(duration), layer)
}

fn project() -> Project {
    Project::new("Render").with_output(Resolution::new(320, 240), FrameRate::FPS_30)
}

fn assets() -> MemoryAssets {
    let assets = MemoryAssets::new();
    assets.insert_still("red", FrameBuffer::filled(4, 4, Color::RED));
    assets.insert_still("green", FrameBuffer::filled(4, 4, Color::GREEN));
    assets
}

fn compositor() -> Compositor {
    Compositor::new(
        Arc::new(assets()),
        Arc::new(NullObserver),
        Default::default(),
    )
}

#[test]
fn keyframes_added_through_timeline_animate_render() {
    let clip = still("red", 0, 4, 0);
    let id = clip.id;
    let mut timeline = Timeline::from_project(project()).unwrap();
    timeline.add_clip(clip).unwrap();
    timeline
        .add_keyframe(Keyframe::new(id, Property::X, secs(0), 0.0))
        .unwrap();
    timeline
        .add_keyframe(Keyframe::new(id, Property::X, secs(2), 100.0))
        .unwrap();

    let c = compositor();
    let frame = c.render_frame(timeline.project(), secs(1));
    assert_eq!(frame.pixel(50, 10), RED);
    assert_eq!(frame.pixel(49, 10), BLACK);

    let held = c.render_frame(timeline.project(), secs(3));
    assert_eq!(held.pixel(100, 10), RED);
    assert_eq!(held.pixel(99, 10), BLACK);
}

#[test]
fn moved_clip_renders_at_new_time() {
    let clip = still("red", 0, 2, 0);
    let id = clip.id;
    let mut timeline = Timeline::from_project(project()).unwrap();
    timeline.add_clip(clip).unwrap();
    timeline.move_clip(id, secs(5)).unwrap();

    let c = compositor();
    assert_eq!(c.render_frame(timeline.project(), secs(1)).pixel(10, 10), BLACK);
    assert_eq!(c.render_frame(timeline.project(), secs(6)).pixel(10, 10), RED);
}

#[test]
fn moved_clip_keeps_its_animation() {
    let clip = still("red", 0, 4, 0);
    let id = clip.id;
    let mut timeline = Timeline::from_project(project()).unwrap();
    timeline.add_clip(clip).unwrap();
    timeline
        .add_keyframe(Keyframe::new(id, Property::X, secs(0), 0.0))
        .unwrap();
    timeline
        .add_keyframe(Keyframe::new(id, Property::X, secs(2), 100.0))
        .unwrap();
    timeline.move_clip(id, secs(10)).unwrap();

    // One second into the clip it is halfway along, as before the move.
    let frame = compositor().render_frame(timeline.project(), secs(11));
    assert_eq!(frame.pixel(50, 10), RED);
    assert_eq!(frame.pixel(49, 10), BLACK);
}

#[test]
fn reloaded_project_renders_identically() {
    let mut p = project();
    let mut clip = still("red", 0, 3, 0);
    clip.transform.x = 30.0;
    clip.transform.rotation = 0.3;
    clip.effects.push(Effect::new(EffectKind::Brightness { amount: 0.5 }));
    p.clips.push(clip);
    p.clips.push(Clip::text("Hi", secs(0), secs(3), 1));
    p.effects.push(Effect::new(EffectKind::Vignette {
        strength: 0.4,
        radius: 0.8,
    }));

    let json = ProjectFile::new(p.clone()).to_json().unwrap();
    let reloaded = ProjectFile::from_json(&json).unwrap().project;

    let c = compositor();
    assert_eq!(
        c.render_frame(&p, secs(1)),
        c.render_frame(&reloaded, secs(1))
    );
}

#[test]
fn fade_is_exact_at_window_boundaries() {
    let mut p = project();
    let a = still("red", 0, 5, 0);
    let b = still("green", 5, 5, 0);
    let (a_id, b_id) = (a.id, b.id);
    p.clips.extend([a, b]);
    p.transitions
        .push(Transition::new(TransitionKind::Fade, secs(4), secs(2)).between(a_id, b_id));

    let c = compositor();
    assert_eq!(c.render_frame(&p, secs(4)).pixel(10, 10), RED);
    assert_eq!(c.render_frame(&p, secs(5)).pixel(10, 10), BLACK);
    assert_eq!(c.render_frame(&p, secs(6)).pixel(10, 10), GREEN);
}

#[test]
fn wipe_reveals_incoming_across_whole_window() {
    let mut p = project();
    let a = still("red", 0, 5, 0);
    let b = still("green", 5, 5, 0);
    let (a_id, b_id) = (a.id, b.id);
    p.clips.extend([a, b]);
    let mut wipe = Transition::new(TransitionKind::Wipe, secs(4), secs(2)).between(a_id, b_id);
    wipe.direction = Direction::Right;
    p.transitions.push(wipe);

    let c = compositor();
    let green: Vec<usize> = (0..=8)
        .map(|q| {
            let frame = c.render_frame(&p, secs(4) + RationalTime::new(q, 4));
            frame.data().chunks_exact(4).filter(|px| *px == GREEN).count()
        })
        .collect();

    assert_eq!(green[0], 0);
    assert!(green[1] > 0, "incoming hidden before the cut: {green:?}");
    assert!(green.windows(2).all(|w| w[0] <= w[1]), "{green:?}");
    assert_eq!(green[8], 200 * 150);
}

#[test]
fn file_assets_resolve_relative_to_root() {
    let dir = tempfile::tempdir().unwrap();
    let png = dir.path().join("logo.png");
    std::fs::write(&png, green_png()).unwrap();

    let mut p = project();
    p.clips.push(still("logo.png", 0, 2, 0));
    let c = Compositor::with_assets(Arc::new(FileAssets::new(dir.path())));
    let frame = c.render_frame(&p, secs(1));
    assert_eq!(frame.pixel(10, 10), GREEN);
}

#[test]
fn missing_file_renders_placeholder_not_background() {
    let dir = tempfile::tempdir().unwrap();
    let mut p = project();
    p.clips.push(still("absent.png", 0, 2, 0));
    let c = Compositor::with_assets(Arc::new(FileAssets::new(dir.path())));

    let frame = c.render_frame(&p, secs(1));
    assert_ne!(frame.pixel(190, 140), BLACK);
    assert_eq!(frame.pixel(250, 200), BLACK);
}

#[test]
fn preview_step_renders_clock_position() {
    let mut p = project();
    p.clips.push(still("red", 1, 2, 0));
    let mut driver = PreviewDriver::new(Arc::new(compositor()), Arc::new(p), CancelToken::new())
        .with_resolution(Resolution::new(160, 120));
    driver.clock_mut().play();

    let first = driver.step(Duration::from_millis(500));
    assert_eq!(first.time, RationalTime::new(1, 2));
    assert_eq!(first.frame.pixel(5, 5), BLACK);

    let second = driver.step(Duration::from_millis(1000));
    assert_eq!(second.time, RationalTime::new(3, 2));
    assert_eq!((second.frame.width, second.frame.height), (160, 120));
    assert_eq!(second.frame.pixel(5, 5), RED);
}

/// A 4x4 opaque green PNG.
fn green_png() -> Vec<u8> {
    let frame = FrameBuffer::filled(4, 4, Color::GREEN);
    let mut out = std::io::Cursor::new(Vec::new());
    image::write_buffer_with_format(
        &mut out,
        frame.data(),
        frame.width,
        frame.height,
        image::ExtendedColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .unwrap();
    out.into_inner()
}
