//! Frame buffers for rendered video frames in CPU memory.
//!
//! Pixels are tightly packed, non-premultiplied RGBA8, row-major.

use std::sync::Arc;

use crate::color::Color;
use crate::geometry::Resolution;

/// An RGBA8 frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    pub width: u32,
    pub height: u32,
    data: Vec<u8>,
}

impl FrameBuffer {
    /// Create a fully transparent frame.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; width as usize * height as usize * 4],
        }
    }

    /// Create a frame filled with a single color.
    pub fn filled(width: u32, height: u32, color: Color) -> Self {
        let mut frame = Self::new(width, height);
        frame.fill(color);
        frame
    }

    /// Wrap existing RGBA8 data. Returns `None` if the length does not match.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if data.len() != width as usize * height as usize * 4 {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
        })
    }

    /// Frame size.
    #[inline]
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// Raw pixel data.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Raw pixel data, mutable.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Consume into the raw pixel vector.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Total memory usage of this frame in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len()
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    /// Read one pixel.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = self.offset(x, y);
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    /// Overwrite one pixel.
    #[inline]
    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        let i = self.offset(x, y);
        self.data[i..i + 4].copy_from_slice(&rgba);
    }

    /// Get a row of pixel data.
    #[inline]
    pub fn row(&self, y: u32) -> &[u8] {
        let start = self.offset(0, y);
        &self.data[start..start + self.width as usize * 4]
    }

    /// Overwrite every pixel with `color`.
    pub fn fill(&mut self, color: Color) {
        let rgba = color.to_rgba8();
        for px in self.data.chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
    }

    /// Source-over blend of `src` onto pixel (x, y), with extra opacity.
    #[inline]
    pub fn blend_pixel(&mut self, x: u32, y: u32, src: [u8; 4], opacity: f32) {
        let i = self.offset(x, y);
        let dst = &mut self.data[i..i + 4];
        blend_over(dst, &src, opacity);
    }

    /// Source-over composite of a same-sized frame onto this one.
    pub fn composite(&mut self, src: &FrameBuffer, opacity: f32) {
        debug_assert_eq!(self.resolution(), src.resolution());
        for (dst, s) in self.data.chunks_exact_mut(4).zip(src.data.chunks_exact(4)) {
            blend_over(dst, s, opacity);
        }
    }

    /// Create a test pattern frame (8 vertical color bars).
    pub fn test_pattern(width: u32, height: u32) -> Self {
        const BARS: [[u8; 4]; 8] = [
            [255, 255, 255, 255],
            [255, 255, 0, 255],
            [0, 255, 255, 255],
            [0, 255, 0, 255],
            [255, 0, 255, 255],
            [255, 0, 0, 255],
            [0, 0, 255, 255],
            [0, 0, 0, 255],
        ];
        let mut frame = Self::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let bar = (x as u64 * 8 / width.max(1) as u64) as usize;
                frame.set_pixel(x, y, BARS[bar.min(7)]);
            }
        }
        frame
    }
}

fn blend_over(dst: &mut [u8], src: &[u8], opacity: f32) {
    let sa = src[3] as f32 / 255.0 * opacity.clamp(0.0, 1.0);
    if sa <= 0.0 {
        return;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    for c in 0..3 {
        let s = src[c] as f32;
        let d = dst[c] as f32;
        dst[c] = ((s * sa + d * da * (1.0 - sa)) / out_a).round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

/// Arc-wrapped frame buffer for shared ownership (decoded asset frames).
pub type SharedFrameBuffer = Arc<FrameBuffer>;
