//! CPU frame compositor.
//!
//! Rendering is a pure function of `(project, time)`: clear to the
//! background, draw every active clip bottom layer first into its own layer,
//! run the clip's pixel effects on that layer, composite it, then run the
//! project's global effects over the result. Clips taking part in a running
//! transition are drawn even outside their own range.

use std::sync::Arc;

use montage_core::config::RenderConfig;
use montage_core::{
    value_at, ClipId, Color, FrameBuffer, MontageError, Property, RationalTime, Rect, Resolution,
    Transform,
};
use montage_timeline::{Clip, EffectKind, MediaKind, NullObserver, Project, TracingObserver};
use tracing::trace;

use crate::assets::AssetStore;
use crate::canvas::Canvas;
use crate::effects::apply_effects;
use crate::transitions::{blends_at, roles, ClipBlend};

/// Notified about problems that do not stop a frame from rendering.
pub trait RenderObserver: Send + Sync {
    /// An asset failed to load; a placeholder was drawn instead.
    fn on_resource_error(&self, clip: ClipId, error: &MontageError);
}

impl RenderObserver for TracingObserver {
    fn on_resource_error(&self, clip: ClipId, error: &MontageError) {
        tracing::warn!(%clip, error = %error, "Asset unavailable, drawing placeholder");
    }
}

impl RenderObserver for NullObserver {
    fn on_resource_error(&self, _clip: ClipId, _error: &MontageError) {}
}

const PLACEHOLDER_FILL: Color = Color::new(0.25, 0.25, 0.25, 1.0);

/// Clip properties after keyframes are applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimatedState {
    pub transform: Transform,
    pub opacity: f32,
}

/// Resolve every animatable visual property of `clip` at `time`.
pub fn animated_state(project: &Project, clip: &Clip, time: RationalTime) -> AnimatedState {
    let resolve = |property: Property, fallback: f32| -> f32 {
        value_at(
            project
                .keyframes_of(clip.id)
                .filter(|kf| kf.property == property),
            time,
            fallback as f64,
        ) as f32
    };
    let t = clip.transform;
    AnimatedState {
        transform: Transform {
            x: resolve(Property::X, t.x),
            y: resolve(Property::Y, t.y),
            scale_x: resolve(Property::ScaleX, t.scale_x),
            scale_y: resolve(Property::ScaleY, t.scale_y),
            rotation: resolve(Property::Rotation, t.rotation),
            skew_x: resolve(Property::SkewX, t.skew_x),
            skew_y: resolve(Property::SkewY, t.skew_y),
        },
        opacity: resolve(Property::Opacity, clip.opacity).clamp(0.0, 1.0),
    }
}

/// Renders project frames on the CPU.
pub struct Compositor {
    assets: Arc<dyn AssetStore>,
    observer: Arc<dyn RenderObserver>,
    config: RenderConfig,
}

impl std::fmt::Debug for Compositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compositor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Compositor {
    pub fn new(
        assets: Arc<dyn AssetStore>,
        observer: Arc<dyn RenderObserver>,
        config: RenderConfig,
    ) -> Self {
        Self {
            assets,
            observer,
            config,
        }
    }

    /// Compositor with default settings that logs resource errors.
    pub fn with_assets(assets: Arc<dyn AssetStore>) -> Self {
        Self::new(assets, Arc::new(TracingObserver), RenderConfig::default())
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Render at the project's own resolution.
    pub fn render_frame(&self, project: &Project, time: RationalTime) -> FrameBuffer {
        self.render_frame_at(project, time, project.resolution)
    }

    /// Render scaled to `resolution`.
    pub fn render_frame_at(
        &self,
        project: &Project,
        time: RationalTime,
        resolution: Resolution,
    ) -> FrameBuffer {
        let mut canvas = Canvas::new(resolution.width, resolution.height);
        canvas.clear(project.background);

        let base = (
            resolution.width as f32 / project.resolution.width.max(1) as f32,
            resolution.height as f32 / project.resolution.height.max(1) as f32,
        );
        let blends = blends_at(project, time);

        for clip in clips_to_draw(project, time) {
            if !clip.kind.is_visual() {
                continue;
            }
            let blend = blends.get(&clip.id).copied().unwrap_or_default();
            // Transition partners outside their own range hold their edge frame.
            let local = time.clamp(clip.start, clip.end());
            self.draw_clip(&mut canvas, project, clip, local, blend, base);
        }

        let mut frame = canvas.into_frame();
        apply_effects(&mut frame, &project.effects);
        frame
    }

    fn draw_clip(
        &self,
        canvas: &mut Canvas,
        project: &Project,
        clip: &Clip,
        time: RationalTime,
        blend: ClipBlend,
        base: (f32, f32),
    ) {
        let state = animated_state(project, clip, time);
        let opacity = state.opacity * blend.opacity;
        if opacity <= 0.0 {
            return;
        }
        trace!(clip = %clip.id, layer = clip.layer, opacity, "Drawing clip");

        let mut layer = Canvas::new(canvas.width(), canvas.height());
        {
            let mut scope = layer.save();
            scope.scale(base.0, base.1);
            if let Some(reveal) = blend.reveal {
                scope.clip_rect(reveal);
            }
            if blend.scale != 1.0 {
                let cx = project.resolution.width as f32 / 2.0;
                let cy = project.resolution.height as f32 / 2.0;
                scope.translate(cx, cy);
                scope.scale(blend.scale, blend.scale);
                scope.translate(-cx, -cy);
            }
            scope.translate(blend.offset.x, blend.offset.y);
            scope.transform(state.transform.to_affine());

            let mut crop = Rect::new(0.0, 0.0, 1.0, 1.0);
            for effect in clip.effects.iter().filter(|e| e.enabled) {
                match effect.kind {
                    EffectKind::Position { x, y } => scope.translate(x, y),
                    EffectKind::Rotation { radians } => scope.rotate(radians),
                    EffectKind::Scale { x, y } => scope.scale(x, y),
                    EffectKind::Crop {
                        left,
                        top,
                        right,
                        bottom,
                    } => {
                        let cut = Rect::new(left, top, 1.0 - left - right, 1.0 - top - bottom);
                        crop = crop.intersection(cut).unwrap_or_default();
                    }
                    _ => {}
                }
            }

            self.draw_content(&mut scope, clip, time, crop);
        }

        apply_effects(layer.frame_mut(), &clip.effects);
        canvas.composite(layer.frame(), opacity);
    }

    fn draw_content(&self, canvas: &mut Canvas, clip: &Clip, time: RationalTime, crop: Rect) {
        let content = self.config.content_size();
        let (cw, ch) = (content.width as f32, content.height as f32);
        let crop_box = crop.scaled(cw, ch);
        if crop_box.is_empty() {
            return;
        }

        match clip.kind {
            MediaKind::Text => {
                let (text, color, size) = match &clip.text {
                    Some(t) => (t.text.as_str(), t.color, t.size.unwrap_or(self.config.text_size)),
                    None => (clip.name.as_str(), Color::WHITE, self.config.text_size),
                };
                let mut scope = canvas.save();
                if crop != Rect::new(0.0, 0.0, 1.0, 1.0) {
                    scope.clip_rect(crop_box);
                }
                draw_block_text(&mut scope, text, size as f32, color);
            }
            MediaKind::Image | MediaKind::Video => {
                match self.assets.frame(&clip.source, clip.source_time(time)) {
                    Ok(image) => canvas.draw_image(&image, crop, crop_box),
                    Err(err) => {
                        self.observer.on_resource_error(clip.id, &err);
                        draw_placeholder(canvas, clip.label(), cw, ch, self.config.text_size as f32);
                    }
                }
            }
            MediaKind::Audio => {}
        }
    }
}

/// Active clips plus every clip taking part in a transition active at
/// `time`, bottom layer first.
fn clips_to_draw(project: &Project, time: RationalTime) -> Vec<&Clip> {
    let mut clips = project.active_clips_at(time);
    for transition in project.transitions.iter().filter(|t| t.is_active_at(time)) {
        for (clip, _) in roles(project, transition) {
            if !clips.iter().any(|c| c.id == clip.id) {
                clips.push(clip);
            }
        }
    }
    clips.sort_by_key(|c| (c.layer, c.start));
    clips
}

/// Draw `text` as solid glyph cells starting at the local origin.
///
/// Each visible character fills most of a `0.6 * size` by `size` cell;
/// newlines start a new row.
pub fn draw_block_text(canvas: &mut Canvas, text: &str, size: f32, color: Color) {
    let cell_w = size * 0.6;
    let line_h = size * 1.2;
    for (row, line) in text.lines().enumerate() {
        for (col, ch) in line.chars().enumerate() {
            if ch.is_whitespace() {
                continue;
            }
            let x = col as f32 * cell_w;
            let y = row as f32 * line_h;
            canvas.fill_rect(Rect::new(x, y, cell_w * 0.8, size), color);
        }
    }
}

/// Solid content box with the clip label across it.
fn draw_placeholder(canvas: &mut Canvas, label: &str, width: f32, height: f32, text_size: f32) {
    canvas.fill_rect(Rect::new(0.0, 0.0, width, height), PLACEHOLDER_FILL);
    let size = (text_size / 2.0).max(1.0);
    let mut scope = canvas.save();
    scope.clip_rect(Rect::new(0.0, 0.0, width, height));
    scope.translate(size * 0.5, size * 0.5);
    draw_block_text(&mut scope, label, size, Color::WHITE);
}
