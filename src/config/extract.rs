use super::load_json;
use crate::classify::text::TesseractRecognizer;
use crate::error::Result;
use crate::export::Exporter;
use crate::extractor::ExtractorParams;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config of `sheet_slicer extract`.
///
/// ```json
/// {
///   "sheets": [
///     { "input": "sheets/seating.png", "manifest": "manifests/seating.json",
///       "report": "out/seating.report.json", "unmapped_dir": "out/review" }
///   ],
///   "export": { "bundled_root": "src/assets", "public_root": "public/assets" },
///   "params": { "mask": { "tolerance": 20.0 }, "regions": { "min_area": 500 } },
///   "ocr": { "binary": "tesseract", "psm": 6 }
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct ExtractToolConfig {
    pub sheets: Vec<SheetConfig>,
    #[serde(default)]
    pub export: Exporter,
    #[serde(default)]
    pub params: ExtractorParams,
    /// Caption recognition; disabled when absent.
    #[serde(default)]
    pub ocr: Option<OcrConfig>,
    /// Skip writing assets and only produce reports.
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Deserialize)]
pub struct SheetConfig {
    pub input: PathBuf,
    pub manifest: PathBuf,
    /// Where the run summary JSON goes.
    #[serde(default)]
    pub report: Option<PathBuf>,
    /// Directory receiving crops of unmapped boxes for review.
    #[serde(default)]
    pub unmapped_dir: Option<PathBuf>,
    /// Optional PNG dump of the occupancy mask.
    #[serde(default)]
    pub mask_image: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub binary: PathBuf,
    pub psm: u8,
}

impl Default for OcrConfig {
    fn default() -> Self {
        let t = TesseractRecognizer::default();
        Self {
            binary: t.binary,
            psm: t.psm,
        }
    }
}

impl OcrConfig {
    pub fn recognizer(&self) -> TesseractRecognizer {
        TesseractRecognizer {
            binary: self.binary.clone(),
            psm: self.psm,
        }
    }
}

pub fn load_config(path: &Path) -> Result<ExtractToolConfig> {
    load_json(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SlicerError;

    #[test]
    fn minimal_config_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("extract.json");
        std::fs::write(
            &path,
            r#"{ "sheets": [ { "input": "a.png", "manifest": "a.json" } ],
                 "params": { "merge": { "max_vertical_gap_px": 20 } } }"#,
        )
        .unwrap();
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.sheets.len(), 1);
        assert!(cfg.ocr.is_none());
        assert!(!cfg.dry_run);
        assert_eq!(cfg.params.merge.max_vertical_gap_px, 20);
        assert_eq!(cfg.params.regions.min_area, 500);
        assert!(cfg.export.overwrite);
    }

    #[test]
    fn malformed_config_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ \"sheets\": 3 }").unwrap();
        assert!(matches!(
            load_config(&path),
            Err(SlicerError::Config { .. })
        ));
    }
}
