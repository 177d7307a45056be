//! Foreground mask builder.
//!
//! Overview
//! - Every pixel is compared with the [`BackgroundSignature`]: against the
//!   alpha threshold when the sheet is transparent, otherwise by its colour
//!   distance to the reference (max or Euclidean norm over RGB). Checkered
//!   backgrounds carry a secondary reference; matching either one is enough.
//! - Pixels farther than `tolerance` from every reference are foreground. The tolerance band
//!   absorbs compression ringing and faint colour bleed that exact equality
//!   would turn into thousands of micro-regions.
//! - `BorderFlood` mode only counts a background-coloured pixel as
//!   background when it is connected to the image border. Enclosed
//!   background-coloured areas (eyes, letter counters) stay foreground.
//! - The raw mask is opened to delete isolated specks and optionally closed
//!   to reseal small gaps inside a glyph.

pub mod morphology;

use crate::background::BackgroundSignature;
use crate::image::{OccupancyMask, SourceImage};
use log::debug;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DistanceNorm {
    /// Largest per-channel absolute difference.
    #[default]
    Max,
    /// Euclidean distance in RGB space.
    Euclidean,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MaskMode {
    /// Any pixel within tolerance of the reference is background.
    #[default]
    Threshold,
    /// Background must additionally be 8-connected to the border.
    BorderFlood,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskOptions {
    /// Colour distance at or below which a pixel matches the background.
    pub tolerance: f32,
    pub norm: DistanceNorm,
    pub mode: MaskMode,
    /// Radius of the square element used by the opening (0 disables it).
    pub open_radius: usize,
    /// Radius of the square element used by the closing (0 disables it).
    pub close_radius: usize,
}

impl Default for MaskOptions {
    fn default() -> Self {
        Self {
            tolerance: 20.0,
            norm: DistanceNorm::Max,
            mode: MaskMode::Threshold,
            open_radius: 1,
            close_radius: 0,
        }
    }
}

/// Distance of `px` from `reference` under `norm`.
#[inline]
pub fn color_distance(px: [u8; 3], reference: [u8; 3], norm: DistanceNorm) -> f32 {
    match norm {
        DistanceNorm::Max => (0..3)
            .map(|c| px[c].abs_diff(reference[c]))
            .max()
            .unwrap_or(0) as f32,
        DistanceNorm::Euclidean => (0..3)
            .map(|c| {
                let d = px[c] as f32 - reference[c] as f32;
                d * d
            })
            .sum::<f32>()
            .sqrt(),
    }
}

/// Build the cleaned occupancy mask for `source`.
pub fn build_mask(
    source: &SourceImage,
    signature: &BackgroundSignature,
    opts: &MaskOptions,
) -> OccupancyMask {
    let raw = raw_mask(source, signature, opts);
    let raw_count = raw.count();
    let opened = morphology::open(&raw, opts.open_radius);
    let cleaned = morphology::close(&opened, opts.close_radius);
    debug!(
        "mask: raw={} opened={} final={} ({}x{})",
        raw_count,
        opened.count(),
        cleaned.count(),
        cleaned.w,
        cleaned.h
    );
    cleaned
}

fn raw_mask(
    source: &SourceImage,
    signature: &BackgroundSignature,
    opts: &MaskOptions,
) -> OccupancyMask {
    let (w, h) = (source.width(), source.height());
    let mut mask = OccupancyMask::new(w, h);
    match *signature {
        BackgroundSignature::Alpha { threshold } => {
            for (i, px) in source.pixels().pixels().enumerate() {
                mask.data[i] = px[3] >= threshold;
            }
        }
        BackgroundSignature::Color {
            reference,
            secondary,
            ..
        } => {
            for (i, px) in source.pixels().pixels().enumerate() {
                let rgb = [px[0], px[1], px[2]];
                let near = |r: [u8; 3]| color_distance(rgb, r, opts.norm) <= opts.tolerance;
                mask.data[i] = !(near(reference) || secondary.is_some_and(near));
            }
            if opts.mode == MaskMode::BorderFlood {
                keep_border_connected_background(&mut mask);
            }
        }
    }
    mask
}

/// Turn background-coloured pixels that are not reachable from the border
/// back into foreground.
fn keep_border_connected_background(mask: &mut OccupancyMask) {
    let (w, h) = (mask.w, mask.h);
    if w == 0 || h == 0 {
        return;
    }
    let mut reached = vec![false; w * h];
    let mut stack: Vec<usize> = Vec::new();
    let seed = |x: usize, y: usize, reached: &mut [bool], stack: &mut Vec<usize>| {
        let i = mask.idx(x, y);
        if !mask.data[i] && !reached[i] {
            reached[i] = true;
            stack.push(i);
        }
    };
    for x in 0..w {
        seed(x, 0, &mut reached, &mut stack);
        seed(x, h - 1, &mut reached, &mut stack);
    }
    for y in 0..h {
        seed(0, y, &mut reached, &mut stack);
        seed(w - 1, y, &mut reached, &mut stack);
    }
    while let Some(i) = stack.pop() {
        let (x, y) = ((i % w) as isize, (i / w) as isize);
        for (dx, dy) in crate::regions::NEIGH_OFFSETS {
            let (nx, ny) = (x + dx, y + dy);
            if nx < 0 || ny < 0 || nx >= w as isize || ny >= h as isize {
                continue;
            }
            let j = ny as usize * w + nx as usize;
            if !mask.data[j] && !reached[j] {
                reached[j] = true;
                stack.push(j);
            }
        }
    }
    for (v, r) in mask.data.iter_mut().zip(reached) {
        if !*v && !r {
            *v = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background::{estimate_background, BackgroundOptions};
    use crate::image::ImageView;
    use image::{Rgba, RgbaImage};

    fn sheet_with_square(noise: u8) -> SourceImage {
        let mut img = RgbaImage::from_pixel(40, 30, Rgba([76, 81, 80, 255]));
        for y in 10..20 {
            for x in 10..22 {
                img.put_pixel(x, y, Rgba([220, 40, 40, 255]));
            }
        }
        // compression-style noise near the background colour
        img.put_pixel(3, 3, Rgba([76 + noise, 81, 80, 255]));
        img.put_pixel(30, 25, Rgba([76, 81 - noise, 80, 255]));
        SourceImage::from_rgba(img, false)
    }

    #[test]
    fn tolerance_band_absorbs_noise() {
        let source = sheet_with_square(12);
        let sig = estimate_background(&source, &BackgroundOptions::default());
        let mask = build_mask(&source, &sig, &MaskOptions::default());
        assert_eq!((mask.w, mask.h), (40, 30));
        assert_eq!(mask.count(), 12 * 10);
        assert!(mask.get(10, 10) && !mask.get(3, 3));
    }

    #[test]
    fn opening_removes_out_of_band_specks() {
        let source = sheet_with_square(60);
        let sig = estimate_background(&source, &BackgroundOptions::default());
        let mask = build_mask(&source, &sig, &MaskOptions::default());
        assert!(!mask.get(3, 3));
        assert!(!mask.get(30, 25));
        assert_eq!(mask.count(), 120);
    }

    #[test]
    fn alpha_signature_uses_alpha_channel() {
        let mut img = RgbaImage::from_pixel(10, 10, Rgba([255, 255, 255, 0]));
        for y in 2..6 {
            for x in 2..7 {
                img.put_pixel(x, y, Rgba([255, 255, 255, 255]));
            }
        }
        let source = SourceImage::from_rgba(img, true);
        let sig = BackgroundSignature::Alpha { threshold: 16 };
        let mask = build_mask(&source, &sig, &MaskOptions::default());
        assert_eq!(mask.count(), 20);
    }

    #[test]
    fn border_flood_keeps_enclosed_holes() {
        let mut img = RgbaImage::from_pixel(20, 20, Rgba([0, 0, 0, 255]));
        for y in 4..16 {
            for x in 4..16 {
                let ring = !(7..13).contains(&x) || !(7..13).contains(&y);
                if ring {
                    img.put_pixel(x, y, Rgba([250, 250, 250, 255]));
                }
            }
        }
        let source = SourceImage::from_rgba(img, false);
        let sig = estimate_background(&source, &BackgroundOptions::default());
        let opts = MaskOptions {
            mode: MaskMode::BorderFlood,
            ..Default::default()
        };
        let mask = build_mask(&source, &sig, &opts);
        assert!(mask.get(10, 10), "hole should be filled");
        assert_eq!(mask.count(), 144);

        let plain = build_mask(&source, &sig, &MaskOptions::default());
        assert!(!plain.get(10, 10));
    }

    #[test]
    fn both_checker_colours_are_background() {
        let mut img = RgbaImage::from_fn(48, 48, |x, y| {
            let v = if (x / 8 + y / 8) % 2 == 0 { 255 } else { 220 };
            Rgba([v, v, v, 255])
        });
        for y in 16..32 {
            for x in 16..32 {
                img.put_pixel(x, y, Rgba([30, 120, 60, 255]));
            }
        }
        let source = SourceImage::from_rgba(img, false);
        let sig = estimate_background(&source, &BackgroundOptions::default());
        let mask = build_mask(&source, &sig, &MaskOptions::default());
        assert_eq!(mask.count(), 16 * 16);
        assert!(mask.get(20, 20) && !mask.get(9, 1));
    }

    #[test]
    fn euclidean_norm_is_larger_than_max_norm() {
        let d_max = color_distance([10, 10, 10], [0, 0, 0], DistanceNorm::Max);
        let d_l2 = color_distance([10, 10, 10], [0, 0, 0], DistanceNorm::Euclidean);
        assert_eq!(d_max, 10.0);
        assert!(d_l2 > 17.0 && d_l2 < 17.4);
    }
}
