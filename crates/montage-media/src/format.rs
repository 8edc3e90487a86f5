//! Export format description and validation.

use std::fmt;
use std::str::FromStr;

use montage_core::memory_budget::MAX_DIMENSION;
use montage_core::{FrameRate, Resolution, ValidationError};
use serde::{Deserialize, Serialize};

// ── Quality ─────────────────────────────────────────────────────

/// Quality tier. Encoders map it onto their own rate controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    #[default]
    Medium,
    High,
    Ultra,
}

impl Quality {
    /// CRF for x264/x265-style encoders (lower is better).
    pub fn crf(self) -> u32 {
        match self {
            Self::Low => 30,
            Self::Medium => 23,
            Self::High => 18,
            Self::Ultra => 12,
        }
    }

    /// ProRes profile number.
    pub fn prores_profile(self) -> u32 {
        match self {
            Self::Low => 0,
            Self::Medium => 2,
            Self::High => 3,
            Self::Ultra => 4,
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Ultra => "ultra",
        })
    }
}

impl FromStr for Quality {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "ultra" => Ok(Self::Ultra),
            other => Err(ValidationError::ExportFormat(format!(
                "unsupported quality '{other}'"
            ))),
        }
    }
}

// ── Codec ───────────────────────────────────────────────────────

/// Video codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    /// Uncompressed YUV4MPEG2, written without external tools.
    Y4m,
    H264,
    Vp9,
    ProRes,
}

impl Codec {
    /// FFmpeg encoder name. `None` for codecs encoded in-process.
    pub fn ffmpeg_encoder(self) -> Option<&'static str> {
        match self {
            Self::Y4m => None,
            Self::H264 => Some("libx264"),
            Self::Vp9 => Some("libvpx-vp9"),
            Self::ProRes => Some("prores_ks"),
        }
    }

    /// Containers this codec can be written into.
    pub fn containers(self) -> &'static [&'static str] {
        match self {
            Self::Y4m => &["y4m"],
            Self::H264 => &["mp4", "mov", "mkv"],
            Self::Vp9 => &["webm", "mkv"],
            Self::ProRes => &["mov"],
        }
    }

    /// Default container extension.
    pub fn default_extension(self) -> &'static str {
        self.containers()[0]
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Y4m => "y4m",
            Self::H264 => "h264",
            Self::Vp9 => "vp9",
            Self::ProRes => "prores",
        })
    }
}

impl FromStr for Codec {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "y4m" | "yuv4mpeg" => Ok(Self::Y4m),
            "h264" | "avc" => Ok(Self::H264),
            "vp9" => Ok(Self::Vp9),
            "prores" => Ok(Self::ProRes),
            other => Err(ValidationError::ExportFormat(format!(
                "unsupported codec '{other}'"
            ))),
        }
    }
}

/// MIME type for a container extension.
pub fn mime_for_extension(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "y4m" => "video/x-yuv4mpeg",
        _ => "application/octet-stream",
    }
}

// ── Format ──────────────────────────────────────────────────────

/// Everything the export pipeline needs to know about the output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportFormat {
    pub resolution: Resolution,
    pub frame_rate: FrameRate,
    #[serde(default)]
    pub quality: Quality,
    pub codec: Codec,
    /// Container extension without the dot.
    pub extension: String,
}

impl ExportFormat {
    pub fn new(resolution: Resolution, frame_rate: FrameRate, codec: Codec) -> Self {
        Self {
            resolution,
            frame_rate,
            quality: Quality::default(),
            codec,
            extension: codec.default_extension().to_string(),
        }
    }

    /// Uncompressed output, no external tools needed.
    pub fn y4m(resolution: Resolution, frame_rate: FrameRate) -> Self {
        Self::new(resolution, frame_rate, Codec::Y4m)
    }

    /// H.264 1080p30 MP4.
    pub fn h264_hd() -> Self {
        Self::new(Resolution::FULL_HD, FrameRate::FPS_30, Codec::H264).with_quality(Quality::High)
    }

    /// VP9 720p30 WebM.
    pub fn vp9_web() -> Self {
        Self::new(Resolution::HD, FrameRate::FPS_30, Codec::Vp9)
    }

    /// ProRes 1080p24 for mastering.
    pub fn prores_master() -> Self {
        Self::new(Resolution::FULL_HD, FrameRate::FPS_24, Codec::ProRes).with_quality(Quality::Ultra)
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// MIME type derived from the extension.
    pub fn mime(&self) -> &'static str {
        mime_for_extension(&self.extension)
    }

    /// Bytes of one RGBA frame at the output size.
    pub fn frame_bytes(&self) -> u64 {
        self.resolution.rgba_bytes() as u64
    }

    /// Reject formats no encoder can produce.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let Resolution { width, height } = self.resolution;
        if !self.resolution.is_valid() {
            return Err(ValidationError::ExportFormat(format!(
                "resolution {} must be positive",
                self.resolution
            )));
        }
        if width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(ValidationError::ExportFormat(format!(
                "resolution {} exceeds {MAX_DIMENSION} pixels per side",
                self.resolution
            )));
        }
        if !self.frame_rate.is_valid() {
            return Err(ValidationError::ExportFormat(format!(
                "frame rate {} must be positive",
                self.frame_rate
            )));
        }
        if self.codec != Codec::Y4m && (width % 2 != 0 || height % 2 != 0) {
            return Err(ValidationError::ExportFormat(format!(
                "{} needs even dimensions (got {})",
                self.codec, self.resolution
            )));
        }
        let ext = self.extension.to_ascii_lowercase();
        if !self.codec.containers().contains(&ext.as_str()) {
            return Err(ValidationError::ExportFormat(format!(
                "{} cannot be written to .{}",
                self.codec, self.extension
            )));
        }
        Ok(())
    }
}
