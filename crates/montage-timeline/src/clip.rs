//! Clip types for the timeline.

use montage_core::{ClipId, Color, RationalTime, TimeRange, Transform, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::effect::Effect;

/// What a clip draws (or plays).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Image,
    Text,
    Audio,
}

impl MediaKind {
    /// Kinds that carry a sound track.
    pub fn has_audio(self) -> bool {
        matches!(self, Self::Video | Self::Audio)
    }

    /// Kinds the compositor draws.
    pub fn is_visual(self) -> bool {
        !matches!(self, Self::Audio)
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Video => "video",
            Self::Image => "image",
            Self::Text => "text",
            Self::Audio => "audio",
        };
        f.write_str(name)
    }
}

/// Reference to a media asset, resolved by an asset store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRef {
    /// URL or path of the asset.
    pub url: String,
    pub kind: MediaKind,
    /// Source media length, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<RationalTime>,
    /// Size in bytes, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl AssetRef {
    /// Create a reference with no metadata.
    pub fn new(url: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            url: url.into(),
            kind,
            duration: None,
            size: None,
        }
    }
}

/// Text drawn by a text clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextContent {
    pub text: String,
    #[serde(default = "default_text_color")]
    pub color: Color,
    /// Glyph height in pixels; the render default applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
}

fn default_text_color() -> Color {
    Color::WHITE
}

/// A clip on the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clip {
    /// Unique clip ID
    pub id: ClipId,
    /// Clip name (displayed in UI)
    pub name: String,
    pub kind: MediaKind,
    /// Reference to source media
    pub source: AssetRef,
    /// Offset into the source media
    #[serde(default)]
    pub source_in: RationalTime,
    /// Position on the timeline
    pub start: RationalTime,
    /// Duration on the timeline
    pub duration: RationalTime,
    /// Z-order and collision group
    #[serde(default)]
    pub layer: i32,
    #[serde(default)]
    pub transform: Transform,
    #[serde(default = "full_opacity")]
    pub opacity: f32,
    /// Clip-local effects, applied in order
    #[serde(default)]
    pub effects: Vec<Effect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<TextContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f32>,
    #[serde(default)]
    pub muted: bool,
}

fn full_opacity() -> f32 {
    1.0
}

impl Clip {
    /// Create a clip for an asset.
    pub fn new(
        name: impl Into<String>,
        source: AssetRef,
        start: RationalTime,
        duration: RationalTime,
        layer: i32,
    ) -> Self {
        let kind = source.kind;
        Self {
            id: ClipId::new(),
            name: name.into(),
            kind,
            source,
            source_in: RationalTime::ZERO,
            start,
            duration,
            layer,
            transform: Transform::IDENTITY,
            opacity: 1.0,
            effects: Vec::new(),
            text: None,
            volume: kind.has_audio().then_some(1.0),
            muted: false,
        }
    }

    /// Create a text clip.
    pub fn text(
        text: impl Into<String>,
        start: RationalTime,
        duration: RationalTime,
        layer: i32,
    ) -> Self {
        let text = text.into();
        let mut clip = Self::new(
            text.clone(),
            AssetRef::new("", MediaKind::Text),
            start,
            duration,
            layer,
        );
        clip.text = Some(TextContent {
            text,
            color: Color::WHITE,
            size: None,
        });
        clip
    }

    /// End time on the timeline (exclusive).
    #[inline]
    pub fn end(&self) -> RationalTime {
        self.start + self.duration
    }

    /// Timeline range covered by this clip.
    #[inline]
    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.start, self.duration)
    }

    /// Whether the clip is showing at `time`. Both edges are inclusive.
    #[inline]
    pub fn is_active_at(&self, time: RationalTime) -> bool {
        self.range().contains_inclusive(time)
    }

    /// Position in the source media for a timeline time.
    pub fn source_time(&self, time: RationalTime) -> RationalTime {
        self.source_in + (time - self.start)
    }

    /// Label drawn on placeholders and text clips.
    pub fn label(&self) -> &str {
        match &self.text {
            Some(content) => &content.text,
            None => &self.name,
        }
    }

    /// Check the clip's own geometry and ranges.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.duration.is_positive() {
            return Err(ValidationError::NonPositiveDuration(self.duration));
        }
        if self.start.is_negative() {
            return Err(ValidationError::NegativeStart(self.start));
        }
        if self.source_in.is_negative() {
            return Err(ValidationError::NegativeStart(self.source_in));
        }
        if self.kind != self.source.kind {
            return Err(ValidationError::KindMismatch {
                clip: self.id,
                kind: self.kind.to_string(),
                source_kind: self.source.kind.to_string(),
            });
        }
        check_unit("opacity", self.opacity)?;
        if let Some(volume) = self.volume {
            check_unit("volume", volume)?;
        }
        Ok(())
    }
}

pub(crate) fn check_unit(field: &'static str, value: f32) -> Result<(), ValidationError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange { field, value })
    }
}

/// Partial update for [`Clip`]. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClipPatch {
    pub name: Option<String>,
    pub source: Option<AssetRef>,
    pub source_in: Option<RationalTime>,
    pub start: Option<RationalTime>,
    pub duration: Option<RationalTime>,
    pub layer: Option<i32>,
    pub transform: Option<Transform>,
    pub opacity: Option<f32>,
    pub text: Option<TextContent>,
    pub volume: Option<f32>,
    pub muted: Option<bool>,
}

impl ClipPatch {
    /// Whether the patch moves the clip in time or across layers.
    pub fn changes_placement(&self) -> bool {
        self.start.is_some() || self.duration.is_some() || self.layer.is_some()
    }

    /// Apply onto `clip` without validating.
    pub fn apply_to(&self, clip: &mut Clip) {
        if let Some(name) = &self.name {
            clip.name = name.clone();
        }
        if let Some(source) = &self.source {
            clip.kind = source.kind;
            clip.source = source.clone();
        }
        if let Some(source_in) = self.source_in {
            clip.source_in = source_in;
        }
        if let Some(start) = self.start {
            clip.start = start;
        }
        if let Some(duration) = self.duration {
            clip.duration = duration;
        }
        if let Some(layer) = self.layer {
            clip.layer = layer;
        }
        if let Some(transform) = self.transform {
            clip.transform = transform;
        }
        if let Some(opacity) = self.opacity {
            clip.opacity = opacity;
        }
        if let Some(text) = &self.text {
            clip.text = Some(text.clone());
        }
        if let Some(volume) = self.volume {
            clip.volume = Some(volume);
        }
        if let Some(muted) = self.muted {
            clip.muted = muted;
        }
    }
}
