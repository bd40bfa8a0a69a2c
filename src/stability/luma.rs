//! Region-of-interest luma sampling and exposure-compensated frame differencing.

use crate::camera::Frame;

/// ITU-R BT.601 luma weights.
const LUMA_R: f32 = 0.299;
const LUMA_G: f32 = 0.587;
const LUMA_B: f32 = 0.114;

/// Broadcast luma of one RGB triple, in 0.0..=255.0.
pub fn luma(r: f32, g: f32, b: f32) -> f32 {
    LUMA_R * r + LUMA_G * g + LUMA_B * b
}

/// Downscaled luma of the centered region of interest of one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct LumaSample {
    /// Region width in analysis pixels
    pub width: usize,
    /// Region height in analysis pixels
    pub height: usize,
    /// Luma per analysis pixel, row-major
    pub values: Vec<f32>,
    /// Mean of `values`
    pub mean: f32,
}

impl LumaSample {
    /// True when both samples cover the same analysis geometry.
    pub fn same_geometry(&self, other: &LumaSample) -> bool {
        self.width == other.width && self.height == other.height
    }
}

/// Downscale `frame` to `analysis_width` (keeping aspect ratio), crop the
/// centered `roi_fraction` of it, and convert the region to luma.
///
/// Each analysis pixel averages the block of source pixels it covers, the
/// same way the ASCII downsampler averages a character cell. Only the region
/// of interest is computed.
///
/// Returns `None` when the frame has no usable dimensions.
pub fn sample_region(frame: &Frame, analysis_width: u32, roi_fraction: f32) -> Option<LumaSample> {
    if !frame.is_usable() {
        return None;
    }

    let src_w = frame.width;
    let src_h = frame.height;
    let bpp = frame.bytes_per_pixel();

    let aw = analysis_width.clamp(1, src_w);
    let ah = ((aw as f64 * src_h as f64 / src_w as f64).round() as u32).max(1);

    let roi = roi_fraction.clamp(f32::MIN_POSITIVE, 1.0);
    let rw = ((aw as f32 * roi).round() as u32).clamp(1, aw);
    let rh = ((ah as f32 * roi).round() as u32).clamp(1, ah);
    let x0 = (aw - rw) / 2;
    let y0 = (ah - rh) / 2;

    let scale_x = src_w as f32 / aw as f32;
    let scale_y = src_h as f32 / ah as f32;

    let mut values = Vec::with_capacity((rw * rh) as usize);
    let mut total = 0.0f64;

    for ry in 0..rh {
        let ay = y0 + ry;
        let sy0 = ((ay as f32 * scale_y) as u32).min(src_h - 1);
        let sy1 = (((ay + 1) as f32 * scale_y) as u32).clamp(sy0 + 1, src_h);

        for rx in 0..rw {
            let ax = x0 + rx;
            let sx0 = ((ax as f32 * scale_x) as u32).min(src_w - 1);
            let sx1 = (((ax + 1) as f32 * scale_x) as u32).clamp(sx0 + 1, src_w);

            let (mut r, mut g, mut b, mut count) = (0u32, 0u32, 0u32, 0u32);
            for sy in sy0..sy1 {
                let row = (sy * src_w) as usize * bpp;
                for sx in sx0..sx1 {
                    let idx = row + sx as usize * bpp;
                    r += frame.data[idx] as u32;
                    g += frame.data[idx + 1] as u32;
                    b += frame.data[idx + 2] as u32;
                    count += 1;
                }
            }

            let n = count.max(1) as f32;
            let y = luma(r as f32 / n, g as f32 / n, b as f32 / n);
            total += y as f64;
            values.push(y);
        }
    }

    let mean = (total / values.len() as f64) as f32;
    Some(LumaSample {
        width: rw as usize,
        height: rh as usize,
        values,
        mean,
    })
}

/// Percentage of pixels that moved between `prev` and `curr`.
///
/// The mean-luma delta is subtracted from every per-pixel difference, so a
/// whole-frame brightness shift (auto-exposure hunting) cancels out instead
/// of registering as motion.
///
/// Returns `None` when the samples do not share the same geometry.
pub fn motion_percent(curr: &LumaSample, prev: &LumaSample, pixel_threshold: f32) -> Option<f32> {
    if !curr.same_geometry(prev) || curr.values.is_empty() {
        return None;
    }

    let exposure_shift = curr.mean - prev.mean;
    let moving = curr
        .values
        .iter()
        .zip(&prev.values)
        .filter(|(c, p)| ((*c - *p) - exposure_shift).abs() > pixel_threshold)
        .count();

    Some(moving as f32 / curr.values.len() as f32 * 100.0)
}
