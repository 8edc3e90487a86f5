//! Project serialization with versioning and migration.
//!
//! Uses JSON with a schema version field for forward-compatible persistence.

use montage_core::{MontageError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::project::Project;

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Versioned project file wrapper.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectFile {
    /// Schema version for migration.
    pub version: u32,
    /// The project data.
    pub project: Project,
    /// Application version that wrote this file.
    pub app_version: String,
}

impl ProjectFile {
    /// Create a new project file from a project.
    pub fn new(project: Project) -> Self {
        Self {
            version: CURRENT_VERSION,
            project,
            app_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Serialize to JSON bytes.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| MontageError::Serialization(format!("Failed to serialize project: {e}")))
    }

    /// Deserialize from JSON bytes, applying migrations and validating the
    /// loaded project.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let raw: serde_json::Value = serde_json::from_slice(data)
            .map_err(|e| MontageError::Serialization(format!("Invalid JSON: {e}")))?;

        let version = raw.get("version").and_then(|v| v.as_u64()).unwrap_or(0) as u32;

        if version > CURRENT_VERSION {
            return Err(MontageError::Serialization(format!(
                "Project file version {version} is newer than supported version {CURRENT_VERSION}"
            )));
        }

        let migrated = migrate(raw, version)?;

        let file: Self = serde_json::from_value(migrated)
            .map_err(|e| MontageError::Serialization(format!("Failed to parse project: {e}")))?;
        file.project.validate()?;
        Ok(file)
    }

    /// Save project to a file path.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let data = self.to_json()?;
        std::fs::write(path, data)?;
        tracing::info!(path = %path.display(), project = %self.project.name, "Project saved");
        Ok(())
    }

    /// Load project from a file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        let file = Self::from_json(&data)?;
        tracing::info!(
            path = %path.display(),
            project = %file.project.name,
            clips = file.project.clips.len(),
            "Project loaded"
        );
        Ok(file)
    }
}

/// Apply sequential migrations from `from_version` to CURRENT_VERSION.
fn migrate(mut data: serde_json::Value, from_version: u32) -> Result<serde_json::Value> {
    let mut version = from_version;

    while version < CURRENT_VERSION {
        match version {
            0 => {
                // v0 → v1: the whole document is the bare project, which may
                // still carry stored end times and a stored duration.
                if data.get("version").is_none() {
                    strip_derived_fields(&mut data);
                    data = serde_json::json!({
                        "version": 1,
                        "project": data,
                        "appVersion": "0.0.0",
                    });
                }
                version = 1;
            }
            _ => {
                return Err(MontageError::Serialization(format!(
                    "No migration path from version {version}"
                )));
            }
        }
    }

    Ok(data)
}

fn strip_derived_fields(project: &mut serde_json::Value) {
    if let Some(obj) = project.as_object_mut() {
        obj.remove("duration");
    }
    if let Some(clips) = project.get_mut("clips").and_then(|c| c.as_array_mut()) {
        for clip in clips.iter_mut().filter_map(|c| c.as_object_mut()) {
            clip.remove("end");
            clip.remove("endTime");
        }
    }
}
