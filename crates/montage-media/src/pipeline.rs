//! Export pipeline: render every output frame, stream it to the encoder,
//! report progress.
//!
//! Frames are rendered in batches and handed to the encoder as each batch
//! completes, so only one batch is held in memory. Stages and their progress
//! ranges:
//! - rendering: `10 + 70 * f / total` for each frame `f`, in frame order
//! - encoding: 80 to 90 while the encoder closes its stream
//! - complete: 100
//!
//! Any failure aborts the run and the encoder, reports a `failed` event and
//! discards what was produced. Nothing is retried.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use montage_core::config::ExportConfig;
use montage_core::{
    CancelToken, ExportError, FrameBuffer, MontageError, RationalTime, Result, ValidationError,
};
use montage_render::Compositor;
use montage_timeline::{NullObserver, Project, TracingObserver};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::encoder::Encoder;
use crate::format::ExportFormat;

/// Cancels an export between frames.
pub type ExportCancel = CancelToken;

/// Where an export run is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportStage {
    Rendering,
    Encoding,
    Complete,
    Failed,
}

impl std::fmt::Display for ExportStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(match self {
            Self::Rendering => "rendering",
            Self::Encoding => "encoding",
            Self::Complete => "complete",
            Self::Failed => "failed",
        })
    }
}

/// One progress report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportProgress {
    pub percent: f32,
    pub stage: ExportStage,
    pub message: String,
}

/// Lifecycle notifications for export runs.
pub trait ExportObserver: Send + Sync {
    fn on_started(&self, total_frames: u64, format: &ExportFormat);
    fn on_finished(&self, media: &EncodedMedia);
    fn on_failed(&self, error: &MontageError);
}

impl ExportObserver for TracingObserver {
    fn on_started(&self, total_frames: u64, format: &ExportFormat) {
        info!(
            total_frames,
            resolution = %format.resolution,
            fps = %format.frame_rate,
            codec = %format.codec,
            "Export started"
        );
    }

    fn on_finished(&self, media: &EncodedMedia) {
        info!(frames = media.frames, bytes = media.data.len(), mime = media.mime, "Export finished");
    }

    fn on_failed(&self, error: &MontageError) {
        warn!(error = %error, "Export failed");
    }
}

impl ExportObserver for NullObserver {
    fn on_started(&self, _total_frames: u64, _format: &ExportFormat) {}
    fn on_finished(&self, _media: &EncodedMedia) {}
    fn on_failed(&self, _error: &MontageError) {}
}

/// A finished export held in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedMedia {
    pub data: Vec<u8>,
    pub mime: &'static str,
    pub extension: String,
    pub frames: u64,
    pub encoder: String,
}

/// Export to a destination file.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub project: Project,
    pub format: ExportFormat,
    pub destination: PathBuf,
}

/// Terminal result of [`ExportPipeline::export_to_file`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportReport {
    pub success: bool,
    pub artifact_location: Option<PathBuf>,
    pub error: Option<String>,
}

/// Renders projects to encoded media.
pub struct ExportPipeline {
    compositor: Arc<Compositor>,
    config: ExportConfig,
    observer: Arc<dyn ExportObserver>,
    cancel: ExportCancel,
}

impl std::fmt::Debug for ExportPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportPipeline")
            .field("config", &self.config)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Emits progress and remembers the last percentage so failure events do
/// not move backwards.
struct Reporter<'a> {
    sink: &'a mut dyn FnMut(ExportProgress),
    last: f32,
}

impl Reporter<'_> {
    fn report(&mut self, stage: ExportStage, percent: f32, message: impl Into<String>) {
        let percent = percent.max(self.last);
        self.last = percent;
        (self.sink)(ExportProgress {
            percent,
            stage,
            message: message.into(),
        });
    }
}

impl ExportPipeline {
    pub fn new(
        compositor: Arc<Compositor>,
        config: ExportConfig,
        observer: Arc<dyn ExportObserver>,
    ) -> Self {
        Self {
            compositor,
            config,
            observer,
            cancel: ExportCancel::new(),
        }
    }

    /// Share an existing cancel flag. The flag is cleared when a run starts.
    pub fn with_cancel(mut self, cancel: ExportCancel) -> Self {
        self.cancel = cancel;
        self
    }

    /// Handle that cancels the run in progress.
    pub fn cancel_handle(&self) -> ExportCancel {
        self.cancel.clone()
    }

    /// Frames rendered in parallel per batch.
    pub fn batch_size(&self) -> usize {
        match self.config.batch_size {
            0 => num_cpus::get().max(1),
            n => n,
        }
    }

    /// Frames rendered in parallel per batch, reduced so that one batch fits
    /// the frame memory budget.
    fn frames_in_flight(&self, format: &ExportFormat) -> Result<u64> {
        let frame_bytes = format.frame_bytes().max(1);
        let budget = self.config.frame_memory_budget;
        match budget / frame_bytes {
            0 => Err(ExportError::InsufficientResources(format!(
                "one {} frame needs {frame_bytes} bytes, budget is {budget}",
                format.resolution
            ))
            .into()),
            fits => Ok((self.batch_size() as u64).min(fits)),
        }
    }

    /// Render and encode `project`.
    pub async fn export(
        &self,
        project: &Project,
        format: &ExportFormat,
        encoder: &mut dyn Encoder,
        mut on_progress: impl FnMut(ExportProgress),
    ) -> Result<EncodedMedia> {
        self.cancel.reset();
        let mut reporter = Reporter {
            sink: &mut on_progress,
            last: 0.0,
        };
        match self.run(project, format, encoder, &mut reporter).await {
            Ok(media) => {
                self.observer.on_finished(&media);
                Ok(media)
            }
            Err(e) => {
                let last = reporter.last;
                reporter.report(ExportStage::Failed, last, e.to_string());
                self.observer.on_failed(&e);
                Err(e)
            }
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(ExportError::Cancelled.into())
        } else {
            Ok(())
        }
    }

    async fn run(
        &self,
        project: &Project,
        format: &ExportFormat,
        encoder: &mut dyn Encoder,
        reporter: &mut Reporter<'_>,
    ) -> Result<EncodedMedia> {
        format.validate()?;
        if project.is_empty() {
            return Err(ValidationError::EmptyProject.into());
        }
        if !encoder.supports(format) {
            return Err(ExportError::EncoderUnavailable(format!(
                "{} for {}",
                encoder.name(),
                format.codec
            ))
            .into());
        }

        let total = format.frame_rate.frame_count(project.duration());
        let batch = self.frames_in_flight(format)?;
        self.observer.on_started(total, format);

        let project = Arc::new(project.clone());
        encoder.begin(format, total)?;
        if let Err(e) = self
            .stream_frames(&project, format, total, batch, encoder, reporter)
            .await
        {
            encoder.abort();
            return Err(e);
        }

        reporter.report(ExportStage::Encoding, 80.0, format!("Finishing {}", encoder.name()));
        let data = encoder.finish()?;
        reporter.report(ExportStage::Encoding, 90.0, "Encoded");

        reporter.report(ExportStage::Complete, 100.0, "Export complete");
        Ok(EncodedMedia {
            data,
            mime: format.mime(),
            extension: format.extension.clone(),
            frames: total,
            encoder: encoder.name().to_string(),
        })
    }

    /// Render `total` frames in batches of `batch` and feed them to the
    /// encoder in order.
    async fn stream_frames(
        &self,
        project: &Arc<Project>,
        format: &ExportFormat,
        total: u64,
        batch: u64,
        encoder: &mut dyn Encoder,
        reporter: &mut Reporter<'_>,
    ) -> Result<()> {
        let mut next = 0u64;
        while next < total {
            self.check_cancelled()?;
            let end = (next + batch).min(total);
            let rendered = self.render_batch(project, format, next..end).await?;

            for (offset, frame) in rendered.into_iter().enumerate() {
                self.check_cancelled()?;
                let f = next + offset as u64;
                encoder.write_frame(frame)?;
                reporter.report(
                    ExportStage::Rendering,
                    10.0 + 70.0 * f as f32 / total as f32,
                    format!("Rendered frame {} of {total}", f + 1),
                );
            }
            next = end;
            tokio::task::yield_now().await;
        }
        self.check_cancelled()
    }

    /// Render frames `range` in parallel on the rayon pool, off the async
    /// thread. Output is in frame order.
    async fn render_batch(
        &self,
        project: &Arc<Project>,
        format: &ExportFormat,
        range: std::ops::Range<u64>,
    ) -> Result<Vec<FrameBuffer>> {
        let compositor = Arc::clone(&self.compositor);
        let project = Arc::clone(project);
        let rate = format.frame_rate;
        let resolution = format.resolution;
        tokio::task::spawn_blocking(move || {
            range
                .into_par_iter()
                .map(|f| {
                    let time: RationalTime = rate.frame_time(f);
                    compositor.render_frame_at(&project, time, resolution)
                })
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| ExportError::Render(e.to_string()).into())
    }

    /// Export and write the result atomically to `request.destination`.
    ///
    /// Never returns an error; failures are described in the report.
    pub async fn export_to_file(
        &self,
        request: &ExportRequest,
        encoder: &mut dyn Encoder,
        on_progress: impl FnMut(ExportProgress),
    ) -> ExportReport {
        let destination = with_extension(&request.destination, &request.format.extension);
        let written = match self
            .export(&request.project, &request.format, encoder, on_progress)
            .await
        {
            Ok(media) => write_atomically(&destination, &media.data),
            Err(e) => Err(e),
        };
        match written {
            Ok(()) => ExportReport {
                success: true,
                artifact_location: Some(destination),
                error: None,
            },
            Err(e) => ExportReport {
                success: false,
                artifact_location: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// `path` with `extension` added when it has none.
fn with_extension(path: &Path, extension: &str) -> PathBuf {
    if path.extension().is_some() {
        path.to_path_buf()
    } else {
        path.with_extension(extension)
    }
}

/// Write through a temp file in the same directory, then rename.
fn write_atomically(destination: &Path, data: &[u8]) -> Result<()> {
    let dir = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.flush()?;
    tmp.persist(destination).map_err(|e| MontageError::Io(e.error))?;
    info!(path = %destination.display(), bytes = data.len(), "Export written");
    Ok(())
}
