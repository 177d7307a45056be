//! Batch driver behind `sheet_slicer extract`.
//!
//! Every configured sheet is handled on its own: a manifest that fails to
//! load, an image that fails to decode or an output that cannot be written
//! is recorded against that sheet, and the remaining sheets still run.
use crate::config::extract::{ExtractToolConfig, SheetConfig};
use crate::diagnostics::RunSummary;
use crate::error::{Result, SlicerError};
use crate::export::Exporter;
use crate::extractor::{ProcessedSheet, SheetExtractor, SheetJob};
use crate::image::io::{save_mask, write_json_file};
use crate::manifest::load_manifest;
use log::{debug, warn};
use std::path::PathBuf;

/// What happened to one configured sheet.
#[derive(Debug)]
pub struct SheetOutcome {
    pub input: PathBuf,
    /// Present once the sheet went through the pipeline.
    pub summary: Option<RunSummary>,
    pub errors: Vec<SlicerError>,
}

impl SheetOutcome {
    fn new(input: PathBuf) -> Self {
        Self {
            input,
            summary: None,
            errors: Vec::new(),
        }
    }

    /// Processed, every output written and no export failures.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
            && self
                .summary
                .as_ref()
                .is_some_and(|s| s.exports.as_ref().map_or(true, |e| e.is_clean()))
    }

    fn note(&mut self, result: Result<()>) {
        if let Err(err) = result {
            warn!("{}: {err}", self.input.display());
            self.errors.push(err);
        }
    }
}

/// Run every sheet of `config`. Outcomes keep the order of `config.sheets`.
pub fn run_extract(config: &ExtractToolConfig) -> Vec<SheetOutcome> {
    let mut extractor = SheetExtractor::new(config.params.clone());
    if let Some(ocr) = &config.ocr {
        extractor = extractor.with_recognizer(Box::new(ocr.recognizer()));
    }

    let mut outcomes: Vec<SheetOutcome> = config
        .sheets
        .iter()
        .map(|s| SheetOutcome::new(s.input.clone()))
        .collect();

    let mut jobs = Vec::with_capacity(config.sheets.len());
    let mut owners = Vec::with_capacity(config.sheets.len());
    for (i, sheet) in config.sheets.iter().enumerate() {
        match load_manifest(&sheet.manifest) {
            Ok(manifest) => {
                jobs.push(SheetJob {
                    image: sheet.input.clone(),
                    manifest,
                });
                owners.push(i);
            }
            Err(err) => outcomes[i].note(Err(err)),
        }
    }
    debug!(
        "extract: {} sheets, {} with a usable manifest",
        config.sheets.len(),
        jobs.len()
    );

    for (i, result) in owners.into_iter().zip(extractor.process_batch(&jobs)) {
        let outcome = &mut outcomes[i];
        match result {
            Ok(processed) => finish_sheet(
                &config.sheets[i],
                processed,
                &config.export,
                config.dry_run,
                outcome,
            ),
            Err(err) => outcome.note(Err(err)),
        }
    }
    outcomes
}

fn finish_sheet(
    sheet: &SheetConfig,
    processed: ProcessedSheet,
    export: &Exporter,
    dry_run: bool,
    outcome: &mut SheetOutcome,
) {
    let ProcessedSheet { source, mut report } = processed;
    if let Some(path) = &sheet.mask_image {
        outcome.note(save_mask(&report.mask, path));
    }
    if !dry_run {
        export.export_report(&mut report, &source);
        if let Some(dir) = &sheet.unmapped_dir {
            let written =
                export.export_unmapped(&report.summary.unmapped, &source, &report.mask, dir);
            outcome.note(written.map(|_| ()));
        }
    }
    if let Some(path) = &sheet.report {
        outcome.note(write_json_file(path, &report.summary));
    }
    outcome.summary = Some(report.summary);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::extract::SheetConfig;
    use image::{Rgba, RgbaImage};
    use std::path::Path;

    fn write_sheet(path: &Path) {
        let mut img = RgbaImage::from_pixel(200, 100, Rgba([240, 240, 240, 255]));
        for x0 in [10u32, 80, 150] {
            for y in 20..60 {
                for x in x0..x0 + 30 {
                    img.put_pixel(x, y, Rgba([30, 90, 160, 255]));
                }
            }
        }
        img.save(path).unwrap();
    }

    fn write_manifest(path: &Path) {
        std::fs::write(
            path,
            r#"{ "rows": [ { "entries": [
                { "root": "bundled", "subdir": "props", "filename": "p0.png" },
                { "root": "bundled", "subdir": "props", "filename": "p1.png" },
                { "root": "bundled", "subdir": "props", "filename": "p2.png" }
            ] } ] }"#,
        )
        .unwrap();
    }

    fn sheet(input: PathBuf, manifest: PathBuf, report: Option<PathBuf>) -> SheetConfig {
        SheetConfig {
            input,
            manifest,
            report,
            unmapped_dir: None,
            mask_image: None,
        }
    }

    #[test]
    fn one_broken_sheet_does_not_stop_the_others() {
        let dir = tempfile::tempdir().unwrap();
        let d = dir.path();
        let image = d.join("sheet.png");
        let manifest = d.join("manifest.json");
        write_sheet(&image);
        write_manifest(&manifest);
        // A plain file where a report directory is expected.
        std::fs::write(d.join("blocker"), b"x").unwrap();

        let config = ExtractToolConfig {
            sheets: vec![
                sheet(image.clone(), d.join("no_such_manifest.json"), None),
                sheet(image.clone(), manifest.clone(), Some(d.join("blocker/r1.json"))),
                sheet(d.join("no_such_sheet.png"), manifest.clone(), None),
                sheet(image.clone(), manifest.clone(), Some(d.join("reports/r3.json"))),
            ],
            export: Exporter::new(d.join("bundled"), d.join("public")),
            params: Default::default(),
            ocr: None,
            dry_run: false,
        };

        let outcomes = run_extract(&config);
        assert_eq!(outcomes.len(), 4);

        assert!(outcomes[0].summary.is_none());
        assert!(matches!(outcomes[0].errors[..], [SlicerError::Io { .. }]));

        let partial = &outcomes[1];
        assert_eq!(partial.errors.len(), 1);
        assert_eq!(partial.summary.as_ref().map(|s| s.records.len()), Some(3));
        assert!(!partial.is_clean());

        assert!(matches!(outcomes[2].errors[..], [SlicerError::Decode { .. }]));
        assert!(outcomes[2].summary.is_none());

        assert!(outcomes[3].is_clean(), "{:?}", outcomes[3].errors);
        assert!(d.join("reports/r3.json").is_file());
        assert!(d.join("bundled/props/p2.png").is_file());
    }

    #[test]
    fn dry_run_writes_reports_only() {
        let dir = tempfile::tempdir().unwrap();
        let d = dir.path();
        write_sheet(&d.join("sheet.png"));
        write_manifest(&d.join("manifest.json"));
        let config = ExtractToolConfig {
            sheets: vec![sheet(
                d.join("sheet.png"),
                d.join("manifest.json"),
                Some(d.join("report.json")),
            )],
            export: Exporter::new(d.join("bundled"), d.join("public")),
            params: Default::default(),
            ocr: None,
            dry_run: true,
        };
        let outcomes = run_extract(&config);
        assert!(outcomes[0].is_clean());
        assert!(d.join("report.json").is_file());
        assert!(!d.join("bundled").exists());
    }
}
