//! Effects attached to clips or to the whole project.
//!
//! Each effect type carries only its own parameters. Documents name the
//! type in a `type` field; unrecognised types load as [`EffectKind::Unknown`]
//! and render as a no-op.

use montage_core::{Color, EffectId};
use serde::{Deserialize, Serialize};

/// Effect parameters, tagged by type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EffectKind {
    /// Multiply channels by `amount`.
    Brightness { amount: f32 },
    /// Scale channels away from mid-gray by `amount`.
    Contrast { amount: f32 },
    /// Scale channels away from luma by `amount`.
    Saturation { amount: f32 },
    /// Rotate hue by `degrees`.
    Hue { degrees: f32 },
    /// Box blur with the given radius in pixels.
    Blur { radius: u32 },
    /// Multiply alpha by `amount`.
    Opacity { amount: f32 },
    /// Extra scale applied after the clip transform.
    Scale { x: f32, y: f32 },
    /// Extra rotation in radians applied after the clip transform.
    Rotation { radians: f32 },
    /// Extra translation in pixels applied after the clip transform.
    Position { x: f32, y: f32 },
    /// Trim fractions of the content box from each edge.
    Crop {
        left: f32,
        top: f32,
        right: f32,
        bottom: f32,
    },
    /// Darken towards the corners.
    Vignette { strength: f32, radius: f32 },
    /// Deterministic per-pixel noise.
    Noise {
        amount: f32,
        #[serde(default)]
        seed: u64,
    },
    /// Unsharp mask.
    Sharpen { amount: f32 },
    /// Blurred bright copy added on top.
    Glow { radius: u32, intensity: f32 },
    /// Offset blurred silhouette drawn under the content.
    #[serde(rename_all = "camelCase")]
    Shadow {
        offset_x: f32,
        offset_y: f32,
        blur: u32,
        color: Color,
    },
    /// Blend every pixel towards `color` by `amount`.
    Colorize { color: Color, amount: f32 },
    /// A type this build does not know about.
    #[serde(other)]
    Unknown,
}

impl EffectKind {
    /// Type name as written in documents.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Brightness { .. } => "brightness",
            Self::Contrast { .. } => "contrast",
            Self::Saturation { .. } => "saturation",
            Self::Hue { .. } => "hue",
            Self::Blur { .. } => "blur",
            Self::Opacity { .. } => "opacity",
            Self::Scale { .. } => "scale",
            Self::Rotation { .. } => "rotation",
            Self::Position { .. } => "position",
            Self::Crop { .. } => "crop",
            Self::Vignette { .. } => "vignette",
            Self::Noise { .. } => "noise",
            Self::Sharpen { .. } => "sharpen",
            Self::Glow { .. } => "glow",
            Self::Shadow { .. } => "shadow",
            Self::Colorize { .. } => "colorize",
            Self::Unknown => "unknown",
        }
    }

    /// Effects that change geometry rather than pixels.
    pub fn is_geometric(&self) -> bool {
        matches!(
            self,
            Self::Scale { .. } | Self::Rotation { .. } | Self::Position { .. } | Self::Crop { .. }
        )
    }
}

/// An effect instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    pub id: EffectId,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(flatten)]
    pub kind: EffectKind,
}

fn enabled_by_default() -> bool {
    true
}

impl Effect {
    /// Create an enabled effect.
    pub fn new(kind: EffectKind) -> Self {
        Self {
            id: EffectId::new(),
            enabled: true,
            kind,
        }
    }

    /// Copy with a fresh id.
    pub fn duplicate(&self) -> Self {
        Self {
            id: EffectId::new(),
            ..self.clone()
        }
    }
}

/// Partial update for [`Effect`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffectPatch {
    pub kind: Option<EffectKind>,
    pub enabled: Option<bool>,
}

impl EffectPatch {
    pub fn apply_to(&self, effect: &mut Effect) {
        if let Some(kind) = &self.kind {
            effect.kind = kind.clone();
        }
        if let Some(enabled) = self.enabled {
            effect.enabled = enabled;
        }
    }
}
