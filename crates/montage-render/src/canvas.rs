//! A software canvas with an explicit transform stack.
//!
//! Drawing state (transform, alpha, clip) is only ever changed inside a
//! [`CanvasScope`], which restores the previous state when dropped.

use glam::{Affine2, Vec2};
use montage_core::{Color, FrameBuffer, Rect};
use smallvec::SmallVec;
use std::ops::{Deref, DerefMut};

use montage_core::geometry::skew_matrix;

#[derive(Debug, Clone, Copy, PartialEq)]
struct DrawState {
    transform: Affine2,
    alpha: f32,
    /// Device-space clip rectangle.
    clip: Option<Rect>,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            transform: Affine2::IDENTITY,
            alpha: 1.0,
            clip: None,
        }
    }
}

/// RGBA8 drawing surface.
#[derive(Debug, Clone)]
pub struct Canvas {
    frame: FrameBuffer,
    state: DrawState,
    stack: SmallVec<[DrawState; 8]>,
}

impl Canvas {
    /// Transparent canvas.
    pub fn new(width: u32, height: u32) -> Self {
        Self::from_frame(FrameBuffer::new(width, height))
    }

    pub fn from_frame(frame: FrameBuffer) -> Self {
        Self {
            frame,
            state: DrawState::default(),
            stack: SmallVec::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.frame.width
    }

    pub fn height(&self) -> u32 {
        self.frame.height
    }

    pub fn frame(&self) -> &FrameBuffer {
        &self.frame
    }

    /// Direct pixel access for whole-surface effects.
    pub fn frame_mut(&mut self) -> &mut FrameBuffer {
        &mut self.frame
    }

    pub fn into_frame(self) -> FrameBuffer {
        self.frame
    }

    /// Push the current state. It comes back when the scope drops.
    pub fn save(&mut self) -> CanvasScope<'_> {
        self.stack.push(self.state);
        CanvasScope { canvas: self }
    }

    fn restore(&mut self) {
        if let Some(state) = self.stack.pop() {
            self.state = state;
        }
    }

    /// Number of open scopes.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn current_transform(&self) -> Affine2 {
        self.state.transform
    }

    pub fn alpha(&self) -> f32 {
        self.state.alpha
    }

    // ── State ───────────────────────────────────────────────────

    pub fn translate(&mut self, x: f32, y: f32) {
        self.transform(Affine2::from_translation(Vec2::new(x, y)));
    }

    pub fn rotate(&mut self, radians: f32) {
        self.transform(Affine2::from_angle(radians));
    }

    pub fn scale(&mut self, sx: f32, sy: f32) {
        self.transform(Affine2::from_scale(Vec2::new(sx, sy)));
    }

    pub fn skew(&mut self, skew_x: f32, skew_y: f32) {
        self.transform(skew_matrix(skew_x, skew_y));
    }

    /// Post-multiply the current transform.
    pub fn transform(&mut self, m: Affine2) {
        self.state.transform = self.state.transform * m;
    }

    /// Multiply the global alpha.
    pub fn multiply_alpha(&mut self, alpha: f32) {
        self.state.alpha *= alpha.clamp(0.0, 1.0);
    }

    /// Restrict drawing to `rect` (local coordinates). The device-space
    /// bounding box of the transformed rect is intersected with any
    /// existing clip.
    pub fn clip_rect(&mut self, rect: Rect) {
        let device = self.device_bounds(rect);
        let clipped = match self.state.clip {
            Some(existing) => existing.intersection(device),
            None => Some(device),
        };
        self.state.clip = Some(clipped.unwrap_or(Rect::new(0.0, 0.0, 0.0, 0.0)));
    }

    // ── Drawing ─────────────────────────────────────────────────

    /// Overwrite every pixel, ignoring transform, alpha and clip.
    pub fn clear(&mut self, color: Color) {
        self.frame.fill(color);
    }

    /// Fill a local-space rectangle.
    pub fn fill_rect(&mut self, rect: Rect, color: Color) {
        let rgba = color.to_rgba8();
        let alpha = self.state.alpha;
        self.for_each_covered(rect, |frame, x, y, _local| {
            frame.blend_pixel(x, y, rgba, alpha);
        });
    }

    /// Draw `image` stretched over `dest`, sampling the normalized source
    /// region `uv` (nearest neighbour).
    pub fn draw_image(&mut self, image: &FrameBuffer, uv: Rect, dest: Rect) {
        if image.width == 0 || image.height == 0 || dest.is_empty() {
            return;
        }
        let alpha = self.state.alpha;
        let (iw, ih) = (image.width as f32, image.height as f32);
        self.for_each_covered(dest, |frame, x, y, local| {
            let u = uv.x + (local.x - dest.x) / dest.width * uv.width;
            let v = uv.y + (local.y - dest.y) / dest.height * uv.height;
            let sx = ((u * iw) as i64).clamp(0, image.width as i64 - 1) as u32;
            let sy = ((v * ih) as i64).clamp(0, image.height as i64 - 1) as u32;
            frame.blend_pixel(x, y, image.pixel(sx, sy), alpha);
        });
    }

    /// Source-over a same-sized surface in device space.
    pub fn composite(&mut self, src: &FrameBuffer, opacity: f32) {
        self.frame.composite(src, opacity * self.state.alpha);
    }

    /// Device-space bounding box of a local rect.
    fn device_bounds(&self, rect: Rect) -> Rect {
        let corners = rect
            .corners()
            .map(|c| self.state.transform.transform_point2(c));
        let mut min = corners[0];
        let mut max = corners[0];
        for c in &corners[1..] {
            min = min.min(*c);
            max = max.max(*c);
        }
        Rect::from_corners(min, max)
    }

    /// Visit every device pixel whose centre maps inside `rect`.
    fn for_each_covered(
        &mut self,
        rect: Rect,
        mut f: impl FnMut(&mut FrameBuffer, u32, u32, Vec2),
    ) {
        if rect.is_empty() || self.state.alpha <= 0.0 {
            return;
        }
        if self.state.transform.matrix2.determinant().abs() < 1e-9 {
            return;
        }
        let inverse = self.state.transform.inverse();

        let surface = Rect::new(0.0, 0.0, self.frame.width as f32, self.frame.height as f32);
        let mut bounds = match self.device_bounds(rect).intersection(surface) {
            Some(b) => b,
            None => return,
        };
        if let Some(clip) = self.state.clip {
            bounds = match bounds.intersection(clip) {
                Some(b) => b,
                None => return,
            };
        }

        let x0 = bounds.x.floor().max(0.0) as u32;
        let y0 = bounds.y.floor().max(0.0) as u32;
        let x1 = (bounds.x + bounds.width).ceil().min(self.frame.width as f32) as u32;
        let y1 = (bounds.y + bounds.height).ceil().min(self.frame.height as f32) as u32;
        let clip = self.state.clip;

        for y in y0..y1 {
            for x in x0..x1 {
                let centre = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                if let Some(c) = clip {
                    if !c.contains(centre) {
                        continue;
                    }
                }
                let local = inverse.transform_point2(centre);
                if rect.contains(local) {
                    f(&mut self.frame, x, y, local);
                }
            }
        }
    }
}

/// Open drawing scope. Dereferences to the canvas; dropping it restores
/// the state that was current when [`Canvas::save`] was called.
pub struct CanvasScope<'a> {
    canvas: &'a mut Canvas,
}

impl Deref for CanvasScope<'_> {
    type Target = Canvas;

    fn deref(&self) -> &Canvas {
        self.canvas
    }
}

impl DerefMut for CanvasScope<'_> {
    fn deref_mut(&mut self) -> &mut Canvas {
        self.canvas
    }
}

impl Drop for CanvasScope<'_> {
    fn drop(&mut self) {
        self.canvas.restore();
    }
}
