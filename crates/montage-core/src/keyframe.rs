//! Keyframe animation with eased interpolation.
//!
//! Easing presets are cubic Bézier curves evaluated with Newton-Raphson
//! to map linear progress onto the curve.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;
use crate::ids::{ClipId, KeyframeId};
use crate::time::RationalTime;

// ── Easing curves ───────────────────────────────────────────────

/// Cubic Bézier control points for easing (x1, y1, x2, y2).
/// The curve goes from (0,0) to (1,1).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CubicBezier {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl CubicBezier {
    pub const fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    fn sample_x(&self, t: f64) -> f64 {
        let mt = 1.0 - t;
        3.0 * mt * mt * t * self.x1 + 3.0 * mt * t * t * self.x2 + t * t * t
    }

    fn sample_y(&self, t: f64) -> f64 {
        let mt = 1.0 - t;
        3.0 * mt * mt * t * self.y1 + 3.0 * mt * t * t * self.y2 + t * t * t
    }

    /// Derivative of X with respect to t.
    fn sample_dx(&self, t: f64) -> f64 {
        let mt = 1.0 - t;
        3.0 * mt * mt * self.x1 + 6.0 * mt * t * (self.x2 - self.x1) + 3.0 * t * t * (1.0 - self.x2)
    }

    /// Solve for the curve parameter at `x` and return the y value there.
    pub fn evaluate(&self, x: f64) -> f64 {
        if x <= 0.0 {
            return 0.0;
        }
        if x >= 1.0 {
            return 1.0;
        }

        let mut t = x;
        for _ in 0..8 {
            let x_est = self.sample_x(t) - x;
            if x_est.abs() < 1e-10 {
                break;
            }
            let dx = self.sample_dx(t);
            if dx.abs() < 1e-12 {
                break;
            }
            t = (t - x_est / dx).clamp(0.0, 1.0);
        }

        self.sample_y(t)
    }

    pub const EASE: Self = Self::new(0.25, 0.1, 0.25, 1.0);
    pub const EASE_IN: Self = Self::new(0.42, 0.0, 1.0, 1.0);
    pub const EASE_OUT: Self = Self::new(0.0, 0.0, 0.58, 1.0);
    pub const EASE_IN_OUT: Self = Self::new(0.42, 0.0, 0.58, 1.0);
}

/// Easing applied to normalized progress before blending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Easing {
    #[default]
    Linear,
    Ease,
    EaseIn,
    EaseOut,
    EaseInOut,
}

impl Easing {
    /// Map progress in [0, 1] through the curve. Linear is the identity.
    pub fn apply(self, progress: f64) -> f64 {
        let p = progress.clamp(0.0, 1.0);
        match self {
            Self::Linear => p,
            Self::Ease => CubicBezier::EASE.evaluate(p),
            Self::EaseIn => CubicBezier::EASE_IN.evaluate(p),
            Self::EaseOut => CubicBezier::EASE_OUT.evaluate(p),
            Self::EaseInOut => CubicBezier::EASE_IN_OUT.evaluate(p),
        }
    }
}

// ── Animated properties ─────────────────────────────────────────

/// Clip properties that keyframes can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Property {
    Opacity,
    X,
    Y,
    ScaleX,
    ScaleY,
    Rotation,
    SkewX,
    SkewY,
    Volume,
}

impl Property {
    pub const ALL: [Property; 9] = [
        Self::Opacity,
        Self::X,
        Self::Y,
        Self::ScaleX,
        Self::ScaleY,
        Self::Rotation,
        Self::SkewX,
        Self::SkewY,
        Self::Volume,
    ];

    /// Name used in project documents.
    pub fn name(self) -> &'static str {
        match self {
            Self::Opacity => "opacity",
            Self::X => "x",
            Self::Y => "y",
            Self::ScaleX => "scaleX",
            Self::ScaleY => "scaleY",
            Self::Rotation => "rotation",
            Self::SkewX => "skewX",
            Self::SkewY => "skewY",
            Self::Volume => "volume",
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Keyframe ────────────────────────────────────────────────────

/// A (time, value) sample for one property of one clip.
///
/// `time` is absolute timeline time. `easing` shapes the segment that
/// ends at this keyframe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Keyframe {
    pub id: KeyframeId,
    pub clip_id: ClipId,
    pub time: RationalTime,
    pub property: Property,
    pub value: f64,
    #[serde(default)]
    pub easing: Easing,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl Keyframe {
    /// Create an enabled, linear keyframe.
    pub fn new(clip_id: ClipId, property: Property, time: RationalTime, value: f64) -> Self {
        Self {
            id: KeyframeId::new(),
            clip_id,
            time,
            property,
            value,
            easing: Easing::Linear,
            enabled: true,
        }
    }

    /// Builder-style easing override.
    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }
}

/// Evaluate a property's keyframes at `time`.
///
/// Disabled keyframes are ignored. With no keyframes the `fallback` (the
/// clip's static value) is returned; outside the keyed span the nearest
/// keyframe's value holds; between two keyframes the later one's easing
/// shapes the progress before the linear blend.
pub fn value_at<'a>(
    keyframes: impl IntoIterator<Item = &'a Keyframe>,
    time: RationalTime,
    fallback: f64,
) -> f64 {
    let mut before: Option<&Keyframe> = None;
    let mut after: Option<&Keyframe> = None;

    for kf in keyframes.into_iter().filter(|kf| kf.enabled) {
        if kf.time <= time {
            if before.map_or(true, |b| kf.time >= b.time) {
                before = Some(kf);
            }
        } else if after.map_or(true, |a| kf.time < a.time) {
            after = Some(kf);
        }
    }

    match (before, after) {
        (None, None) => fallback,
        (Some(b), None) => b.value,
        (None, Some(a)) => a.value,
        (Some(b), Some(a)) => interpolate(b, a, time),
    }
}

fn interpolate(before: &Keyframe, after: &Keyframe, time: RationalTime) -> f64 {
    let t0 = before.time.to_seconds_f64();
    let span = after.time.to_seconds_f64() - t0;
    if span <= 0.0 {
        return after.value;
    }
    let progress = ((time.to_seconds_f64() - t0) / span).clamp(0.0, 1.0);
    let eased = after.easing.apply(progress);
    before.value + (after.value - before.value) * eased
}

// ── Keyframe track ──────────────────────────────────────────────

/// The keyframes of one (clip, property) pair, sorted by time with at most
/// one keyframe per time.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyframeTrack {
    pub clip_id: ClipId,
    pub property: Property,
    keyframes: Vec<Keyframe>,
}

impl KeyframeTrack {
    /// Create an empty track.
    pub fn new(clip_id: ClipId, property: Property) -> Self {
        Self {
            clip_id,
            property,
            keyframes: Vec::new(),
        }
    }

    /// Collect the matching keyframes out of a flat list.
    pub fn collect<'a>(
        clip_id: ClipId,
        property: Property,
        keyframes: impl IntoIterator<Item = &'a Keyframe>,
    ) -> Self {
        let mut matching: Vec<Keyframe> = keyframes
            .into_iter()
            .filter(|kf| kf.clip_id == clip_id && kf.property == property)
            .cloned()
            .collect();
        matching.sort_by_key(|kf| kf.time);
        matching.dedup_by_key(|kf| kf.time);
        Self {
            clip_id,
            property,
            keyframes: matching,
        }
    }

    /// Insert in sorted position. A keyframe at an existing time is rejected.
    pub fn insert(&mut self, keyframe: Keyframe) -> Result<(), ValidationError> {
        match self
            .keyframes
            .binary_search_by(|kf| kf.time.cmp(&keyframe.time))
        {
            Ok(_) => Err(ValidationError::DuplicateKeyframe {
                property: self.property.to_string(),
                time: keyframe.time,
            }),
            Err(pos) => {
                self.keyframes.insert(pos, keyframe);
                Ok(())
            }
        }
    }

    /// Remove a keyframe by id.
    pub fn remove(&mut self, id: KeyframeId) -> Option<Keyframe> {
        let pos = self.keyframes.iter().position(|kf| kf.id == id)?;
        Some(self.keyframes.remove(pos))
    }

    /// Whether a keyframe sits exactly at `time`.
    pub fn has_key_at(&self, time: RationalTime) -> bool {
        self.keyframes
            .binary_search_by(|kf| kf.time.cmp(&time))
            .is_ok()
    }

    /// Evaluate the track at `time`.
    pub fn evaluate(&self, time: RationalTime, fallback: f64) -> f64 {
        value_at(&self.keyframes, time, fallback)
    }

    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    pub fn len(&self) -> usize {
        self.keyframes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }
}

impl fmt::Display for KeyframeTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "KeyframeTrack({} {}, {} keyframes)",
            self.clip_id,
            self.property,
            self.keyframes.len()
        )
    }
}

// ── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn kf(time: RationalTime, value: f64) -> Keyframe {
        Keyframe::new(ClipId::new(), Property::Opacity, time, value)
    }

    #[test]
    fn test_interpolation_law() {
        let keys = vec![
            kf(RationalTime::ZERO, 0.0),
            kf(RationalTime::from_secs(2), 1.0),
        ];
        assert!((value_at(&keys, RationalTime::from_secs(1), 9.0) - 0.5).abs() < 1e-9);
        assert_eq!(value_at(&keys, RationalTime::from_secs(-1), 9.0), 0.0);
        assert_eq!(value_at(&keys, RationalTime::from_secs(3), 9.0), 1.0);
    }

    #[test]
    fn test_empty_returns_fallback() {
        let keys: Vec<Keyframe> = Vec::new();
        assert_eq!(value_at(&keys, RationalTime::from_secs(1), 0.75), 0.75);
    }

    #[test]
    fn test_exact_keyframe_time_returns_its_value() {
        let keys = vec![
            kf(RationalTime::ZERO, 0.0),
            kf(RationalTime::from_secs(1), 10.0),
            kf(RationalTime::from_secs(2), 4.0),
        ];
        assert_eq!(value_at(&keys, RationalTime::from_secs(1), 0.0), 10.0);
        assert!((value_at(&keys, RationalTime::new(3, 2), 0.0) - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_disabled_keyframes_are_ignored() {
        let mut middle = kf(RationalTime::from_secs(1), 100.0);
        middle.enabled = false;
        let keys = vec![
            kf(RationalTime::ZERO, 0.0),
            middle,
            kf(RationalTime::from_secs(2), 2.0),
        ];
        assert!((value_at(&keys, RationalTime::from_secs(1), 0.0) - 1.0).abs() < 1e-9);

        let only_disabled = vec![{
            let mut k = kf(RationalTime::ZERO, 5.0);
            k.enabled = false;
            k
        }];
        assert_eq!(value_at(&only_disabled, RationalTime::ZERO, 3.0), 3.0);
    }

    #[test]
    fn test_unsorted_input_is_handled() {
        let keys = vec![
            kf(RationalTime::from_secs(2), 1.0),
            kf(RationalTime::ZERO, 0.0),
        ];
        assert!((value_at(&keys, RationalTime::from_secs(1), 0.0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_after_keyframe_easing_shapes_segment() {
        let keys = vec![
            kf(RationalTime::ZERO, 0.0),
            kf(RationalTime::from_secs(1), 100.0).with_easing(Easing::EaseIn),
        ];
        let early = value_at(&keys, RationalTime::new(1, 10), 0.0);
        assert!(early < 10.0, "ease-in should start slower than linear, got {early}");
    }

    #[test]
    fn test_cubic_bezier_endpoints() {
        for curve in [
            CubicBezier::EASE,
            CubicBezier::EASE_IN,
            CubicBezier::EASE_OUT,
            CubicBezier::EASE_IN_OUT,
        ] {
            assert!(curve.evaluate(0.0).abs() < 0.001);
            assert!((curve.evaluate(1.0) - 1.0).abs() < 0.001);
        }
    }

    #[test]
    fn test_ease_in_out_is_symmetric() {
        let mid = Easing::EaseInOut.apply(0.5);
        assert!((mid - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_easing_is_monotonic() {
        for easing in [
            Easing::Linear,
            Easing::Ease,
            Easing::EaseIn,
            Easing::EaseOut,
            Easing::EaseInOut,
        ] {
            let mut last = 0.0;
            for i in 0..=100 {
                let v = easing.apply(i as f64 / 100.0);
                assert!(v + 1e-9 >= last, "{easing:?} decreased at step {i}");
                last = v;
            }
        }
    }

    #[test]
    fn test_property_serde_names() {
        let json = serde_json::to_string(&Property::ScaleX).unwrap();
        assert_eq!(json, "\"scaleX\"");
        let easing: Easing = serde_json::from_str("\"ease-in-out\"").unwrap();
        assert_eq!(easing, Easing::EaseInOut);
    }

    #[test]
    fn test_track_stays_sorted_and_unique() {
        let clip = ClipId::new();
        let mut track = KeyframeTrack::new(clip, Property::X);
        track
            .insert(Keyframe::new(clip, Property::X, RationalTime::from_secs(2), 20.0))
            .unwrap();
        track
            .insert(Keyframe::new(clip, Property::X, RationalTime::ZERO, 0.0))
            .unwrap();
        let dup = track.insert(Keyframe::new(clip, Property::X, RationalTime::from_secs(2), 5.0));
        assert!(matches!(dup, Err(ValidationError::DuplicateKeyframe { .. })));

        let times: Vec<_> = track.keyframes().iter().map(|kf| kf.time).collect();
        assert_eq!(times, vec![RationalTime::ZERO, RationalTime::from_secs(2)]);
        assert!((track.evaluate(RationalTime::from_secs(1), 0.0) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_track_collect_filters_by_clip_and_property() {
        let clip = ClipId::new();
        let other = ClipId::new();
        let keys = vec![
            Keyframe::new(clip, Property::Opacity, RationalTime::from_secs(1), 1.0),
            Keyframe::new(clip, Property::X, RationalTime::from_secs(1), 5.0),
            Keyframe::new(other, Property::Opacity, RationalTime::ZERO, 0.5),
            Keyframe::new(clip, Property::Opacity, RationalTime::ZERO, 0.0),
        ];
        let track = KeyframeTrack::collect(clip, Property::Opacity, &keys);
        assert_eq!(track.len(), 2);
        assert_eq!(track.keyframes()[0].time, RationalTime::ZERO);
        assert!(track.has_key_at(RationalTime::from_secs(1)));
    }
}
