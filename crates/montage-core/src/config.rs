//! Editor configuration.
//!
//! Every section falls back to its defaults when missing from the file, so a
//! partial `config.json` is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{MontageError, Result};
use crate::geometry::Resolution;
use crate::time::RationalTime;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub snapping: SnappingConfig,
    pub editing: EditingConfig,
    pub render: RenderConfig,
    pub export: ExportConfig,
    pub logging: LoggingConfig,
}

/// Grid snapping for clip placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnappingConfig {
    pub enabled: bool,
    /// Grid spacing in seconds.
    pub grid_size_secs: f64,
}

/// Edit constraints and history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditingConfig {
    /// Shortest duration a resize may produce, in seconds.
    pub min_clip_duration_secs: f64,
    /// Keep resized clips inside the current project duration.
    pub limit_resize_to_project: bool,
    /// Number of snapshots kept by the history.
    pub history_capacity: usize,
}

/// Compositor defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Box that image and video content is fitted into before transforms.
    pub content_width: u32,
    pub content_height: u32,
    /// Glyph cell height for text clips, in pixels.
    pub text_size: u32,
}

/// Export pipeline tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Frames rendered in parallel per batch. 0 picks the CPU count.
    pub batch_size: usize,
    /// Upper bound on memory held by one batch of rendered frames, in bytes.
    pub frame_memory_budget: u64,
}

/// Logging output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. "info" or "montage_media=debug,warn".
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for SnappingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            grid_size_secs: 1.0,
        }
    }
}

impl Default for EditingConfig {
    fn default() -> Self {
        Self {
            min_clip_duration_secs: 0.1,
            limit_resize_to_project: true,
            history_capacity: 50,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            content_width: 200,
            content_height: 150,
            text_size: 24,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            batch_size: 0,
            frame_memory_budget: crate::memory_budget::EXPORT_FRAME_BUDGET,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl SnappingConfig {
    /// Grid spacing as exact time.
    pub fn grid(&self) -> RationalTime {
        RationalTime::from_seconds_f64(self.grid_size_secs)
    }
}

impl EditingConfig {
    pub fn min_clip_duration(&self) -> RationalTime {
        RationalTime::from_seconds_f64(self.min_clip_duration_secs)
    }
}

impl RenderConfig {
    pub fn content_size(&self) -> Resolution {
        Resolution::new(self.content_width, self.content_height)
    }
}

impl EditorConfig {
    /// Load from the standard location, falling back to defaults.
    pub fn load() -> Self {
        match config_file_path() {
            Some(path) if path.exists() => Self::load_or_default(&path),
            _ => Self::default(),
        }
    }

    /// Load from `path`, logging and falling back to defaults on failure.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load_from(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to load config, using defaults");
                Self::default()
            }
        }
    }

    /// Load from `path`, surfacing read and parse failures.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| MontageError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Save to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| MontageError::Serialization(e.to_string()))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Reject values the editor cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !(self.snapping.grid_size_secs.is_finite() && self.snapping.grid_size_secs > 0.0) {
            return Err(MontageError::Config(format!(
                "snapping.grid_size_secs must be positive (got {})",
                self.snapping.grid_size_secs
            )));
        }
        if !(self.editing.min_clip_duration_secs.is_finite()
            && self.editing.min_clip_duration_secs > 0.0)
        {
            return Err(MontageError::Config(format!(
                "editing.min_clip_duration_secs must be positive (got {})",
                self.editing.min_clip_duration_secs
            )));
        }
        if self.editing.history_capacity == 0 {
            return Err(MontageError::Config(
                "editing.history_capacity must be at least 1".into(),
            ));
        }
        if self.render.content_width == 0 || self.render.content_height == 0 {
            return Err(MontageError::Config(
                "render content box must be non-empty".into(),
            ));
        }
        Ok(())
    }
}

/// Standard config file location: `<config dir>/montage/config.json`.
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("montage").join("config.json"))
}
