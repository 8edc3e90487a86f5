//! Montage Core - Foundation types for the Montage editor
//!
//! This crate provides the fundamental types shared by every other crate:
//! - Time representation (RationalTime, FrameRate, TimeRange)
//! - Entity ids, colors and geometric primitives
//! - RGBA frame buffers
//! - Keyframe interpolation
//! - Errors, configuration and cancellation

pub mod cancel;
pub mod color;
pub mod config;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod ids;
pub mod keyframe;
pub mod time;

pub use cancel::CancelToken;
pub use color::Color;
pub use config::EditorConfig;
pub use error::{ExportError, MontageError, Result, ValidationError};
pub use frame::{FrameBuffer, SharedFrameBuffer};
pub use geometry::{Rect, Resolution, Transform, Vec2};
pub use ids::{ClipId, EffectId, KeyframeId, ProjectId, TransitionId};
pub use keyframe::{value_at, CubicBezier, Easing, Keyframe, KeyframeTrack, Property};
pub use time::{FrameRate, RationalTime, TimeRange};

/// Memory budget constants for rendering and export.
pub mod memory_budget {
    /// Default ceiling for the rendered frames an export holds at once.
    pub const EXPORT_FRAME_BUDGET: u64 = 2 * 1024 * 1024 * 1024; // 2 GB

    /// Decoded still images kept by the file asset cache.
    pub const ASSET_CACHE_ENTRIES: usize = 64;

    /// Largest output side the compositor accepts.
    pub const MAX_DIMENSION: u32 = 8192;
}
