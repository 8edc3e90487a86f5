//! Error types for Montage.

use thiserror::Error;

use crate::ids::ClipId;
use crate::time::RationalTime;

/// Main error type for Montage operations.
#[derive(Error, Debug)]
pub enum MontageError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Resource error for {asset}: {reason}")]
    Resource { asset: String, reason: String },

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl MontageError {
    /// Build a resource error for an asset.
    pub fn resource(asset: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Resource {
            asset: asset.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error rejected a mutation without touching state.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Rejected mutations and invalid requests. State is never modified when
/// one of these is returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("clip duration must be positive (got {0})")]
    NonPositiveDuration(RationalTime),

    #[error("clip start must not be negative (got {0})")]
    NegativeStart(RationalTime),

    #[error("{field} must be within [0, 1] (got {value})")]
    OutOfRange { field: &'static str, value: f32 },

    #[error("clip {clip} overlaps clip {other} on layer {layer}")]
    Overlap {
        clip: ClipId,
        other: ClipId,
        layer: i32,
    },

    #[error("clip {clip} is a {kind} clip but its source is {source_kind}")]
    KindMismatch {
        clip: ClipId,
        kind: String,
        source_kind: String,
    },

    #[error("split point {at} is not strictly inside clip {clip}")]
    InvalidSplit { clip: ClipId, at: RationalTime },

    #[error("a keyframe for {property} already exists at {time}")]
    DuplicateKeyframe { property: String, time: RationalTime },

    #[error("transition duration must be positive (got {0})")]
    InvalidTransition(RationalTime),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("duplicate {kind} id {id}")]
    DuplicateId { kind: &'static str, id: String },

    #[error("invalid export format: {0}")]
    ExportFormat(String),

    #[error("project has nothing to export")]
    EmptyProject,
}

impl ValidationError {
    /// Shorthand for a missing entity.
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

/// Unrecoverable export failures. Never retried automatically.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExportError {
    #[error("export cancelled")]
    Cancelled,

    #[error("insufficient resources: {0}")]
    InsufficientResources(String),

    #[error("encoder {encoder} failed: {reason}")]
    Encoder { encoder: String, reason: String },

    #[error("encoder {0} is not available")]
    EncoderUnavailable(String),

    #[error("frame rendering failed: {0}")]
    Render(String),
}

impl ExportError {
    /// Build an encoder failure.
    pub fn encoder(encoder: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Encoder {
            encoder: encoder.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for Montage operations.
pub type Result<T> = std::result::Result<T, MontageError>;
