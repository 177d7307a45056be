//! Caption recognition used to break ties the size stage cannot resolve.
//!
//! Generated sheets often print a small caption under each asset. The
//! bottom strip of a box is cropped, binarised with Otsu's threshold and
//! handed to a [`TextRecognizer`]. Readings are only trusted when the
//! recognizer's own confidence is high enough, and even then only to pick
//! among entries that are still open.
use crate::error::{Result, SlicerError};
use crate::image::SourceImage;
use crate::types::BoundingBox;
use image::{DynamicImage, GrayImage, Luma};
use log::debug;
use std::path::PathBuf;
use std::process::Command;

/// Recognised caption text with a confidence in `[0, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct TextReading {
    pub text: String,
    pub confidence: f32,
}

impl TextReading {
    pub fn empty() -> Self {
        Self {
            text: String::new(),
            confidence: 0.0,
        }
    }
}

/// Anything that can read a short caption from a binarised strip.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, caption: &GrayImage) -> Result<TextReading>;
}

/// Strips shorter than this are replaced by a fixed-height strip.
const MIN_STRIP_PX: u32 = 10;
const FALLBACK_STRIP_PX: u32 = 30;
/// Strips at or below this height carry no legible text.
const MIN_LEGIBLE_PX: u32 = 5;

/// Bottom part of `bbox` where a caption is expected.
pub fn caption_region(bbox: BoundingBox, fraction: f32) -> Option<BoundingBox> {
    let h = bbox.height;
    let mut split = (h as f32 * (1.0 - fraction.clamp(0.0, 1.0))) as u32;
    if h - split < MIN_STRIP_PX {
        split = h.saturating_sub(FALLBACK_STRIP_PX);
    }
    let strip = h - split;
    (strip > MIN_LEGIBLE_PX).then(|| BoundingBox::new(bbox.x, bbox.y + split, bbox.width, strip))
}

/// Crop, grey and binarise the caption strip of `bbox`.
pub fn caption_image(source: &SourceImage, bbox: BoundingBox, fraction: f32) -> Option<GrayImage> {
    let region = caption_region(bbox, fraction)?;
    let gray = DynamicImage::ImageRgba8(source.crop(region)).into_luma8();
    Some(binarize_otsu(&gray))
}

/// Binarise with the threshold that maximises between-class variance.
pub fn binarize_otsu(gray: &GrayImage) -> GrayImage {
    let t = otsu_threshold(gray.as_raw());
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        if gray.get_pixel(x, y)[0] > t {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

pub fn otsu_threshold(pixels: &[u8]) -> u8 {
    let mut histogram = [0u32; 256];
    for &value in pixels {
        histogram[value as usize] += 1;
    }

    let total = pixels.len() as f64;
    let sum_total: f64 = histogram
        .iter()
        .enumerate()
        .map(|(v, &c)| v as f64 * c as f64)
        .sum();

    let mut sum_background = 0f64;
    let mut weight_background = 0f64;
    let mut max_variance = f64::MIN;
    let mut threshold = 0u8;

    for (value, &count) in histogram.iter().enumerate() {
        weight_background += count as f64;
        if weight_background == 0.0 {
            continue;
        }
        let weight_foreground = total - weight_background;
        if weight_foreground == 0.0 {
            break;
        }
        sum_background += value as f64 * count as f64;
        let mean_background = sum_background / weight_background;
        let mean_foreground = (sum_total - sum_background) / weight_foreground;
        let diff = mean_background - mean_foreground;
        let variance = weight_background * weight_foreground * diff * diff;
        if variance > max_variance {
            max_variance = variance;
            threshold = value as u8;
        }
    }
    threshold
}

/// Normalise free text into a file-stem-like label.
///
/// Lowercases, turns whitespace into `_`, keeps `[a-z0-9._-]` and drops a
/// trailing image extension.
pub fn sanitize_label(text: &str) -> String {
    let mut out: String = text
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    for ext in [".png", ".webp", ".jpg", ".jpeg"] {
        if let Some(stripped) = out.strip_suffix(ext) {
            out = stripped.to_string();
            break;
        }
    }
    out.trim_matches(|c| c == '_' || c == '.').to_string()
}

/// Normalised edit similarity in `[0, 1]`.
pub fn label_similarity(a: &str, b: &str) -> f32 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 0.0;
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        cur[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let subst = prev[j] + usize::from(ca != cb);
            cur[j + 1] = subst.min(prev[j + 1] + 1).min(cur[j] + 1);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    1.0 - prev[b.len()] as f32 / longest as f32
}

/// Runs the external `tesseract` binary on a temporary PNG.
///
/// Output is requested as TSV so that per-word confidences are available;
/// the reading's confidence is their mean scaled to `[0, 1]`.
#[derive(Clone, Debug)]
pub struct TesseractRecognizer {
    pub binary: PathBuf,
    /// Page segmentation mode; 6 assumes one uniform block of text.
    pub psm: u8,
}

impl Default for TesseractRecognizer {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("tesseract"),
            psm: 6,
        }
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(&self, caption: &GrayImage) -> Result<TextReading> {
        let file = tempfile::Builder::new()
            .prefix("caption-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| SlicerError::Recognizer(format!("temp file: {e}")))?;
        caption
            .save(file.path())
            .map_err(|e| SlicerError::Recognizer(format!("write caption: {e}")))?;

        let output = Command::new(&self.binary)
            .arg(file.path())
            .arg("stdout")
            .args(["--psm", &self.psm.to_string()])
            .arg("tsv")
            .output()
            .map_err(|e| {
                SlicerError::Recognizer(format!("failed to run {}: {e}", self.binary.display()))
            })?;
        if !output.status.success() {
            return Err(SlicerError::Recognizer(format!(
                "{} exited with {}",
                self.binary.display(),
                output.status
            )));
        }
        let reading = parse_tesseract_tsv(&String::from_utf8_lossy(&output.stdout));
        debug!(
            "tesseract: '{}' confidence={:.2}",
            reading.text, reading.confidence
        );
        Ok(reading)
    }
}

/// Collect words and their mean confidence from tesseract's TSV output.
pub fn parse_tesseract_tsv(tsv: &str) -> TextReading {
    let mut words = Vec::new();
    let mut conf_sum = 0f32;
    for line in tsv.lines().skip(1) {
        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() < 12 {
            continue;
        }
        let conf: f32 = match cols[10].trim().parse() {
            Ok(c) => c,
            Err(_) => continue,
        };
        let word = cols[11].trim();
        if conf < 0.0 || word.is_empty() {
            continue;
        }
        conf_sum += conf;
        words.push(word.to_string());
    }
    if words.is_empty() {
        return TextReading::empty();
    }
    TextReading {
        confidence: (conf_sum / words.len() as f32 / 100.0).clamp(0.0, 1.0),
        text: words.join(" "),
    }
}
