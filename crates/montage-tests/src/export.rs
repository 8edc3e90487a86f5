//! Integration tests for the export pipeline.
//!
//! Renders real projects through montage-render and encodes them with the
//! built-in YUV4MPEG2 encoder.

use std::sync::Arc;

use montage_core::config::ExportConfig;
use montage_core::{
    Color, ExportError, FrameBuffer, FrameRate, MontageError, RationalTime, Resolution,
};
use montage_media::encoder::rgb_to_yuv;
use montage_media::{
    EncodedMedia, ExportFormat, ExportObserver, ExportPipeline, ExportProgress, ExportRequest,
    ExportStage, Y4mEncoder,
};
use montage_render::{Compositor, MemoryAssets};
use montage_timeline::{AssetRef, Clip, MediaKind, NullObserver, Project};
use parking_lot::Mutex;

// ── Helpers ────────────────────────────────────────────────────

fn two_second_project() -> Project {
    let mut project =
        Project::new("Export").with_output(Resolution::new(640, 360), FrameRate::FPS_30);
    project.clips.push(Clip::new(
        "red",
        AssetRef::new("red", MediaKind::Image),
        RationalTime::ZERO,
        RationalTime::from_secs(2),
        0,
    ));
    project
}

fn pipeline(config: ExportConfig) -> ExportPipeline {
    let assets = MemoryAssets::new();
    assets.insert_still("red", FrameBuffer::filled(2, 2, Color::RED));
    let compositor = Compositor::new(Arc::new(assets), Arc::new(NullObserver), Default::default());
    ExportPipeline::new(Arc::new(compositor), config, Arc::new(NullObserver))
}

fn y4m_format(project: &Project) -> ExportFormat {
    ExportFormat::y4m(project.resolution, project.frame_rate)
}

/// Bytes of one YUV4MPEG2 4:4:4 frame including its marker.
fn y4m_frame_len(resolution: Resolution) -> usize {
    b"FRAME\n".len() + resolution.width as usize * resolution.height as usize * 3
}

// ── Scenarios ──────────────────────────────────────────────────

#[tokio::test]
async fn two_seconds_at_30fps_renders_sixty_frames() {
    let project = two_second_project();
    let format = y4m_format(&project);
    let mut events: Vec<ExportProgress> = Vec::new();

    let media = pipeline(ExportConfig::default())
        .export(&project, &format, &mut Y4mEncoder::new(), |p| events.push(p))
        .await
        .unwrap();

    assert_eq!(media.frames, 60);
    let rendering = events
        .iter()
        .filter(|e| e.stage == ExportStage::Rendering)
        .count();
    assert_eq!(rendering, 60);

    let last = events.last().unwrap();
    assert_eq!((last.stage, last.percent), (ExportStage::Complete, 100.0));
    assert!(events.windows(2).all(|w| w[0].percent <= w[1].percent));
}

#[tokio::test]
async fn y4m_output_contains_every_rendered_frame() {
    let project = two_second_project();
    let format = y4m_format(&project);

    let media = pipeline(ExportConfig::default())
        .export(&project, &format, &mut Y4mEncoder::new(), |_| {})
        .await
        .unwrap();

    let header = b"YUV4MPEG2 W640 H360 F30:1 Ip A1:1 C444 XCOLORRANGE=FULL\n";
    assert!(media.data.starts_with(header));
    assert_eq!(
        media.data.len(),
        header.len() + 60 * y4m_frame_len(format.resolution)
    );
    assert_eq!(media.mime, "video/x-yuv4mpeg");

    // First luma sample of the first frame is the red clip.
    let (y, _, _) = rgb_to_yuv(255, 0, 0);
    assert_eq!(media.data[header.len() + b"FRAME\n".len()], y);
}

#[tokio::test]
async fn scaled_export_uses_format_resolution() {
    let project = two_second_project();
    let format = ExportFormat::y4m(Resolution::new(320, 180), FrameRate::FPS_24);

    let media = pipeline(ExportConfig::default())
        .export(&project, &format, &mut Y4mEncoder::new(), |_| {})
        .await
        .unwrap();
    assert_eq!(media.frames, 48);
    assert!(media.data.starts_with(b"YUV4MPEG2 W320 H180 F24:1"));
}

// ── Failure paths ──────────────────────────────────────────────

#[tokio::test]
async fn cancelled_export_fails_without_output() {
    let project = two_second_project();
    let format = y4m_format(&project);
    let pipeline = pipeline(ExportConfig::default());
    let cancel = pipeline.cancel_handle();
    let mut events = Vec::new();

    let result = pipeline
        .export(&project, &format, &mut Y4mEncoder::new(), |p: ExportProgress| {
            if p.stage == ExportStage::Rendering && p.percent >= 40.0 {
                cancel.cancel();
            }
            events.push(p);
        })
        .await;

    assert!(matches!(
        result,
        Err(MontageError::Export(ExportError::Cancelled))
    ));
    assert_eq!(events.last().unwrap().stage, ExportStage::Failed);
    assert!(!events.iter().any(|e| e.stage == ExportStage::Encoding));
}

#[tokio::test]
async fn tiny_memory_budget_is_rejected_up_front() {
    let project = two_second_project();
    let format = y4m_format(&project);
    let config = ExportConfig {
        frame_memory_budget: 1024,
        ..ExportConfig::default()
    };
    let mut rendered = 0;

    let result = pipeline(config)
        .export(&project, &format, &mut Y4mEncoder::new(), |p| {
            if p.stage == ExportStage::Rendering {
                rendered += 1;
            }
        })
        .await;

    assert!(matches!(
        result,
        Err(MontageError::Export(ExportError::InsufficientResources(_)))
    ));
    assert_eq!(rendered, 0);
}

#[tokio::test]
async fn export_longer_than_memory_budget_streams_through() {
    let project = two_second_project();
    let format = y4m_format(&project);
    let config = ExportConfig {
        batch_size: 16,
        frame_memory_budget: 10 * format.frame_bytes(),
        ..ExportConfig::default()
    };

    let media = pipeline(config)
        .export(&project, &format, &mut Y4mEncoder::new(), |_| {})
        .await
        .unwrap();
    assert_eq!(media.frames, 60);
    assert!(media.data.starts_with(b"YUV4MPEG2 W640 H360 F30:1"));
}

#[tokio::test]
async fn pipeline_is_reusable_after_cancel() {
    let project = two_second_project();
    let format = ExportFormat::y4m(Resolution::new(64, 36), project.frame_rate);
    let pipeline = pipeline(ExportConfig::default());
    let cancel = pipeline.cancel_handle();

    let first = pipeline
        .export(&project, &format, &mut Y4mEncoder::new(), |_| cancel.cancel())
        .await;
    assert!(matches!(first, Err(MontageError::Export(ExportError::Cancelled))));

    let second = pipeline
        .export(&project, &format, &mut Y4mEncoder::new(), |_| {})
        .await
        .unwrap();
    assert_eq!(second.frames, 60);
}

#[tokio::test]
async fn export_to_file_writes_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let project = two_second_project();
    let request = ExportRequest {
        format: ExportFormat::y4m(Resolution::new(64, 36), project.frame_rate),
        project,
        destination: dir.path().join("render"),
    };

    let report = pipeline(ExportConfig::default())
        .export_to_file(&request, &mut Y4mEncoder::new(), |_| {})
        .await;

    assert!(report.success, "{:?}", report.error);
    let location = report.artifact_location.unwrap();
    assert_eq!(location, dir.path().join("render.y4m"));
    let written = std::fs::read(&location).unwrap();
    assert!(written.starts_with(b"YUV4MPEG2 W64 H36"));
}

// ── Observers ──────────────────────────────────────────────────

#[derive(Default)]
struct Counts {
    started: Mutex<Vec<u64>>,
    finished: Mutex<Vec<u64>>,
}

impl ExportObserver for Counts {
    fn on_started(&self, total_frames: u64, _format: &ExportFormat) {
        self.started.lock().push(total_frames);
    }

    fn on_finished(&self, media: &EncodedMedia) {
        self.finished.lock().push(media.frames);
    }

    fn on_failed(&self, _error: &MontageError) {}
}

#[tokio::test]
async fn observer_sees_lifecycle() {
    let project = two_second_project();
    let format = ExportFormat::y4m(Resolution::new(32, 18), project.frame_rate);
    let counts = Arc::new(Counts::default());
    let assets = MemoryAssets::new();
    assets.insert_still("red", FrameBuffer::filled(2, 2, Color::RED));
    let compositor = Compositor::new(Arc::new(assets), Arc::new(NullObserver), Default::default());
    let pipeline = ExportPipeline::new(
        Arc::new(compositor),
        ExportConfig {
            batch_size: 1,
            ..ExportConfig::default()
        },
        counts.clone(),
    );

    pipeline
        .export(&project, &format, &mut Y4mEncoder::new(), |_| {})
        .await
        .unwrap();
    assert_eq!(*counts.started.lock(), vec![60]);
    assert_eq!(*counts.finished.lock(), vec![60]);
}
