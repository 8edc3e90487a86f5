//! Pixel effects on RGBA8 frames.
//!
//! Each effect reads and writes the frame in place. Row loops run on the
//! rayon pool. Alpha is left alone except by the effects that are defined on
//! it (opacity, blur, shadow).

use montage_core::{Color, FrameBuffer};
use montage_timeline::{Effect, EffectKind};
use rayon::prelude::*;

/// Apply every enabled, non-geometric effect in order.
pub fn apply_effects<'a>(frame: &mut FrameBuffer, effects: impl IntoIterator<Item = &'a Effect>) {
    for effect in effects {
        if effect.enabled {
            apply_pixel_effect(frame, &effect.kind);
        }
    }
}

/// Apply a single effect. Geometric and unknown effects do nothing here.
pub fn apply_pixel_effect(frame: &mut FrameBuffer, kind: &EffectKind) {
    match *kind {
        EffectKind::Brightness { amount } => {
            let a = amount.max(0.0);
            map_rgb(frame, move |c| (c * a).min(255.0));
        }
        EffectKind::Contrast { amount } => {
            map_rgb(frame, move |c| (c - 128.0) * amount + 128.0);
        }
        EffectKind::Saturation { amount } => saturate(frame, amount),
        EffectKind::Hue { degrees } => hue_rotate(frame, degrees),
        EffectKind::Blur { radius } => {
            if radius > 0 {
                *frame = box_blur(frame, radius);
            }
        }
        EffectKind::Opacity { amount } => {
            let a = amount.clamp(0.0, 1.0);
            map_pixels(frame, move |_, _, px| {
                px[3] = to_u8(px[3] as f32 * a);
            });
        }
        EffectKind::Vignette { strength, radius } => vignette(frame, strength, radius),
        EffectKind::Noise { amount, seed } => noise(frame, amount, seed),
        EffectKind::Sharpen { amount } => sharpen(frame, amount),
        EffectKind::Glow { radius, intensity } => glow(frame, radius, intensity),
        EffectKind::Shadow {
            offset_x,
            offset_y,
            blur,
            color,
        } => shadow(frame, offset_x, offset_y, blur, color),
        EffectKind::Colorize { color, amount } => colorize(frame, color, amount),
        EffectKind::Scale { .. }
        | EffectKind::Rotation { .. }
        | EffectKind::Position { .. }
        | EffectKind::Crop { .. }
        | EffectKind::Unknown => {}
    }
}

#[inline]
fn to_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Run `f(x, y, pixel)` over every pixel, rows in parallel.
fn map_pixels(frame: &mut FrameBuffer, f: impl Fn(u32, u32, &mut [u8]) + Sync) {
    let stride = frame.width as usize * 4;
    if stride == 0 {
        return;
    }
    frame
        .data_mut()
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, px) in row.chunks_exact_mut(4).enumerate() {
                f(x as u32, y as u32, px);
            }
        });
}

/// Map each color channel independently.
fn map_rgb(frame: &mut FrameBuffer, f: impl Fn(f32) -> f32 + Sync) {
    map_pixels(frame, |_, _, px| {
        for c in &mut px[..3] {
            *c = to_u8(f(*c as f32));
        }
    });
}

fn saturate(frame: &mut FrameBuffer, amount: f32) {
    map_pixels(frame, |_, _, px| {
        let gray = 0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32;
        for c in &mut px[..3] {
            *c = to_u8(gray + (*c as f32 - gray) * amount);
        }
    });
}

fn hue_rotate(frame: &mut FrameBuffer, degrees: f32) {
    let (sin, cos) = degrees.to_radians().sin_cos();
    let m = [
        [
            0.213 + cos * 0.787 - sin * 0.213,
            0.715 - cos * 0.715 - sin * 0.715,
            0.072 - cos * 0.072 + sin * 0.928,
        ],
        [
            0.213 - cos * 0.213 + sin * 0.143,
            0.715 + cos * 0.285 + sin * 0.140,
            0.072 - cos * 0.072 - sin * 0.283,
        ],
        [
            0.213 - cos * 0.213 - sin * 0.787,
            0.715 - cos * 0.715 + sin * 0.715,
            0.072 + cos * 0.928 + sin * 0.072,
        ],
    ];
    map_pixels(frame, |_, _, px| {
        let (r, g, b) = (px[0] as f32, px[1] as f32, px[2] as f32);
        for (i, row) in m.iter().enumerate() {
            px[i] = to_u8(row[0] * r + row[1] * g + row[2] * b);
        }
    });
}

/// Separable box blur over all four channels, edges clamped.
pub fn box_blur(frame: &FrameBuffer, radius: u32) -> FrameBuffer {
    let (w, h) = (frame.width as usize, frame.height as usize);
    if radius == 0 || w == 0 || h == 0 {
        return frame.clone();
    }
    let r = radius as isize;
    let taps = (2 * r + 1) as f32;
    let src = frame.data();

    let mut horizontal = vec![0u8; src.len()];
    horizontal
        .par_chunks_mut(w * 4)
        .enumerate()
        .for_each(|(y, row)| {
            for x in 0..w {
                let mut acc = [0f32; 4];
                for dx in -r..=r {
                    let sx = (x as isize + dx).clamp(0, w as isize - 1) as usize;
                    let i = (y * w + sx) * 4;
                    for c in 0..4 {
                        acc[c] += src[i + c] as f32;
                    }
                }
                for c in 0..4 {
                    row[x * 4 + c] = to_u8(acc[c] / taps);
                }
            }
        });

    let mut out = vec![0u8; src.len()];
    out.par_chunks_mut(w * 4).enumerate().for_each(|(y, row)| {
        for x in 0..w {
            let mut acc = [0f32; 4];
            for dy in -r..=r {
                let sy = (y as isize + dy).clamp(0, h as isize - 1) as usize;
                let i = (sy * w + x) * 4;
                for c in 0..4 {
                    acc[c] += horizontal[i + c] as f32;
                }
            }
            for c in 0..4 {
                row[x * 4 + c] = to_u8(acc[c] / taps);
            }
        }
    });

    FrameBuffer::from_rgba(frame.width, frame.height, out).unwrap_or_else(|| frame.clone())
}

fn vignette(frame: &mut FrameBuffer, strength: f32, radius: f32) {
    let cx = frame.width as f32 / 2.0;
    let cy = frame.height as f32 / 2.0;
    let max_dist = (cx * cx + cy * cy).sqrt().max(f32::EPSILON);
    let inner = radius.clamp(0.0, 0.999);
    let strength = strength.clamp(0.0, 1.0);
    map_pixels(frame, |x, y, px| {
        let dx = x as f32 + 0.5 - cx;
        let dy = y as f32 + 0.5 - cy;
        let d = (dx * dx + dy * dy).sqrt() / max_dist;
        let t = ((d - inner) / (1.0 - inner)).clamp(0.0, 1.0);
        let factor = 1.0 - strength * t * t;
        for c in &mut px[..3] {
            *c = to_u8(*c as f32 * factor);
        }
    });
}

/// Stable hash of a pixel position, mapped to [-1, 1].
fn pixel_hash(x: u32, y: u32, seed: u64) -> f32 {
    let mut z = seed ^ ((x as u64) << 32 | y as u64);
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^= z >> 31;
    (z >> 40) as f32 / (1u64 << 23) as f32 - 1.0
}

fn noise(frame: &mut FrameBuffer, amount: f32, seed: u64) {
    let scale = amount.clamp(0.0, 1.0) * 255.0;
    map_pixels(frame, |x, y, px| {
        let n = pixel_hash(x, y, seed) * scale;
        for c in &mut px[..3] {
            *c = to_u8(*c as f32 + n);
        }
    });
}

fn sharpen(frame: &mut FrameBuffer, amount: f32) {
    let blurred = box_blur(frame, 1);
    let soft = blurred.data();
    frame
        .data_mut()
        .par_chunks_mut(4)
        .zip(soft.par_chunks(4))
        .for_each(|(px, b)| {
            for c in 0..3 {
                let v = px[c] as f32;
                px[c] = to_u8(v + (v - b[c] as f32) * amount);
            }
        });
}

fn glow(frame: &mut FrameBuffer, radius: u32, intensity: f32) {
    let blurred = box_blur(frame, radius.max(1));
    let soft = blurred.data();
    let k = intensity.max(0.0);
    frame
        .data_mut()
        .par_chunks_mut(4)
        .zip(soft.par_chunks(4))
        .for_each(|(px, b)| {
            let ba = b[3] as f32 / 255.0;
            for c in 0..3 {
                px[c] = to_u8(px[c] as f32 + b[c] as f32 * ba * k);
            }
        });
}

fn shadow(frame: &mut FrameBuffer, offset_x: f32, offset_y: f32, blur: u32, color: Color) {
    let (w, h) = (frame.width, frame.height);
    let [r, g, b, a] = color.to_rgba8();
    let ox = offset_x.round() as i64;
    let oy = offset_y.round() as i64;

    let mut silhouette = FrameBuffer::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let sx = x as i64 - ox;
            let sy = y as i64 - oy;
            if sx < 0 || sy < 0 || sx >= w as i64 || sy >= h as i64 {
                continue;
            }
            let src_alpha = frame.pixel(sx as u32, sy as u32)[3];
            let alpha = to_u8(src_alpha as f32 * a as f32 / 255.0);
            silhouette.set_pixel(x, y, [r, g, b, alpha]);
        }
    }
    let mut out = box_blur(&silhouette, blur);
    out.composite(frame, 1.0);
    *frame = out;
}

fn colorize(frame: &mut FrameBuffer, color: Color, amount: f32) {
    let [tr, tg, tb, _] = color.to_rgba8();
    let target = [tr as f32, tg as f32, tb as f32];
    let t = amount.clamp(0.0, 1.0);
    map_pixels(frame, |_, _, px| {
        for c in 0..3 {
            let v = px[c] as f32;
            px[c] = to_u8(v + (target[c] - v) * t);
        }
    });
}
