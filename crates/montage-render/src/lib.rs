//! Montage Render - CPU compositing and preview
//!
//! - Transform-stack canvas with scoped state
//! - Pixel effects and transition blends
//! - Asset stores resolving clip sources to frames
//! - The per-frame compositor
//! - Playback clock and async preview driver

pub mod assets;
pub mod canvas;
pub mod compositor;
pub mod effects;
pub mod preview;
pub mod transitions;

pub use assets::{AssetStore, FileAssets, MemoryAssets};
pub use canvas::{Canvas, CanvasScope};
pub use compositor::{animated_state, AnimatedState, Compositor, RenderObserver};
pub use effects::{apply_effects, apply_pixel_effect};
pub use preview::{PlaybackClock, PreviewDriver, PreviewFrame, PreviewStats};
pub use transitions::{blends_at, ClipBlend, Role};
