//! Montage Media - export formats, encoders and the export pipeline
//!
//! - Export format description and validation
//! - Encoder contract with a built-in YUV4MPEG2 encoder and an ffmpeg
//!   process encoder
//! - Async export pipeline with progress, cancellation and atomic output

pub mod encoder;
pub mod format;
pub mod pipeline;

pub use encoder::{encoder_for, Encoder, FfmpegEncoder, Y4mEncoder};
pub use format::{mime_for_extension, Codec, ExportFormat, Quality};
pub use pipeline::{
    EncodedMedia, ExportCancel, ExportObserver, ExportPipeline, ExportProgress, ExportReport,
    ExportRequest, ExportStage,
};
