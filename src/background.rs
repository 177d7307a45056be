//! Background model: decides what "empty canvas" looks like for one sheet.
//!
//! With a real alpha channel the answer is trivial (transparent pixels are
//! background). Otherwise every border pixel is sampled. The dominant border
//! colour becomes the reference; when a second colour covers a large share
//! of the border (the grey/white checks of a flattened "transparent" export)
//! it is kept as a secondary reference, and both count as background.
//!
//! Border pixels that match neither palette colour measure how uneven the
//! background is. When a high quantile of that mismatch exceeds
//! `ambiguity_spread` (gradients, vignettes) the signature is flagged; the
//! mask built from it is still usable but provisional.
use crate::image::SourceImage;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundOptions {
    /// Alpha values strictly below this are background.
    pub alpha_threshold: u8,
    /// Border mismatch (max per-channel distance to the nearest palette
    /// colour) above which the colour reference is considered unreliable.
    /// Also the radius used to gather pixels of one palette colour.
    pub ambiguity_spread: u8,
    /// Share of border pixels a second colour needs to join the palette.
    pub secondary_share: f32,
    /// Quantile of the border mismatch reported as `spread`.
    pub spread_quantile: f32,
}

impl Default for BackgroundOptions {
    fn default() -> Self {
        Self {
            alpha_threshold: 16,
            ambiguity_spread: 24,
            secondary_share: 0.25,
            spread_quantile: 0.9,
        }
    }
}

/// Reference used by every mask decision within one run.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum BackgroundSignature {
    Alpha {
        threshold: u8,
    },
    Color {
        reference: [u8; 3],
        /// Second checker colour, when the border alternates between two.
        secondary: Option<[u8; 3]>,
        /// Border mismatch at `spread_quantile`.
        spread: u8,
        ambiguous: bool,
    },
}

impl BackgroundSignature {
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, BackgroundSignature::Color { ambiguous: true, .. })
    }
}

#[inline]
fn max_channel_diff(a: [u8; 3], b: [u8; 3]) -> u8 {
    (0..3).map(|c| a[c].abs_diff(b[c])).max().unwrap_or(0)
}

fn border_pixels(source: &SourceImage) -> Vec<[u8; 3]> {
    let (w, h) = (source.width(), source.height());
    let rgb = |x: usize, y: usize| {
        let p = source.pixel(x, y);
        [p[0], p[1], p[2]]
    };
    let mut out = Vec::with_capacity(2 * (w + h));
    for x in 0..w {
        out.push(rgb(x, 0));
        if h > 1 {
            out.push(rgb(x, h - 1));
        }
    }
    for y in 1..h.saturating_sub(1) {
        out.push(rgb(0, y));
        if w > 1 {
            out.push(rgb(w - 1, y));
        }
    }
    out
}

/// Per-channel (upper) median.
fn channel_median(samples: &[[u8; 3]]) -> [u8; 3] {
    let mut out = [0u8; 3];
    if samples.is_empty() {
        return out;
    }
    for (c, slot) in out.iter_mut().enumerate() {
        let mut values: Vec<u8> = samples.iter().map(|p| p[c]).collect();
        values.sort_unstable();
        *slot = values[values.len() / 2];
    }
    out
}

/// Dominant colour of `samples` and the pixels within `radius` of it.
///
/// The most populated coarse bin seeds the estimate; the median of every
/// sample within `radius` of the seed refines it.
fn dominant_color(samples: &[[u8; 3]], radius: u8) -> Option<([u8; 3], usize)> {
    let mut bins: HashMap<[u8; 3], Vec<[u8; 3]>> = HashMap::new();
    for &p in samples {
        bins.entry([p[0] >> 4, p[1] >> 4, p[2] >> 4])
            .or_default()
            .push(p);
    }
    let (_, seed_bin) = bins
        .into_iter()
        .max_by(|(ka, a), (kb, b)| a.len().cmp(&b.len()).then(kb.cmp(ka)))?;
    let seed = channel_median(&seed_bin);
    let near: Vec<[u8; 3]> = samples
        .iter()
        .copied()
        .filter(|&p| max_channel_diff(p, seed) <= radius)
        .collect();
    Some((channel_median(&near), near.len()))
}

fn quantile(mut values: Vec<u8>, q: f32) -> u8 {
    if values.is_empty() {
        return 0;
    }
    values.sort_unstable();
    let pos = ((values.len() - 1) as f32 * q.clamp(0.0, 1.0)).round() as usize;
    values[pos]
}

/// Derive the background signature of `source`.
pub fn estimate_background(source: &SourceImage, opts: &BackgroundOptions) -> BackgroundSignature {
    if source.has_alpha() {
        debug!(
            "background: alpha channel present, threshold={}",
            opts.alpha_threshold
        );
        return BackgroundSignature::Alpha {
            threshold: opts.alpha_threshold,
        };
    }

    let border = border_pixels(source);
    let Some((reference, _)) = dominant_color(&border, opts.ambiguity_spread) else {
        return BackgroundSignature::Color {
            reference: [0; 3],
            secondary: None,
            spread: 0,
            ambiguous: true,
        };
    };

    let rest: Vec<[u8; 3]> = border
        .iter()
        .copied()
        .filter(|&p| max_channel_diff(p, reference) > opts.ambiguity_spread)
        .collect();
    let secondary = dominant_color(&rest, opts.ambiguity_spread)
        .filter(|&(_, n)| n as f32 >= border.len() as f32 * opts.secondary_share)
        .map(|(color, _)| color);

    let mismatch: Vec<u8> = border
        .iter()
        .map(|&p| {
            let d = max_channel_diff(p, reference);
            secondary.map_or(d, |s| d.min(max_channel_diff(p, s)))
        })
        .collect();
    let spread = quantile(mismatch, opts.spread_quantile);
    let ambiguous = spread > opts.ambiguity_spread;

    debug!(
        "background: reference={:?} secondary={:?} spread={} ambiguous={} border_px={}",
        reference,
        secondary,
        spread,
        ambiguous,
        border.len()
    );

    BackgroundSignature::Color {
        reference,
        secondary,
        spread,
        ambiguous,
    }
}
