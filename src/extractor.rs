//! Sheet extractor chaining every stage of the pipeline.
//!
//! Overview
//! - Estimates the background signature of the sheet (alpha or border palette).
//! - Builds the occupancy mask and cleans it with morphology.
//! - Finds connected regions, merges vertical fragments and groups rows.
//! - Classifies boxes against the manifest, falling back to size ranking and
//!   optional caption recognition when a row does not match.
//!
//! The extractor never writes files; pass its [`ExtractionReport`] to an
//! [`Exporter`](crate::export::Exporter) for that. One sheet is processed
//! synchronously. [`SheetExtractor::process_batch`] handles several sheets
//! independently, in parallel when the `parallel` feature is enabled.
use crate::background::{estimate_background, BackgroundOptions, BackgroundSignature};
use crate::classify::text::TextRecognizer;
use crate::classify::{Classifier, ClassifyOptions};
use crate::diagnostics::timing::elapsed_ms;
use crate::diagnostics::{
    BackgroundStage, InputDescriptor, MaskStage, RegionStage, RunSummary, TimingBreakdown, Warning,
};
use crate::error::Result;
use crate::export::{ExportOutcome, Exporter};
use crate::image::io::load_source_image;
use crate::image::{OccupancyMask, SourceImage};
use crate::manifest::Manifest;
use crate::mask::{build_mask, MaskOptions};
use crate::merge::{merge_boxes, MergeOptions};
use crate::regions::{detect_regions, RegionOptions, RegionStatus};
use crate::rows::{group_rows, RowOptions};
use crate::types::Row;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Tunables of every stage, grouped the way they appear in config files.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorParams {
    pub background: BackgroundOptions,
    pub mask: MaskOptions,
    pub regions: RegionOptions,
    pub merge: MergeOptions,
    pub rows: RowOptions,
    pub classify: ClassifyOptions,
}

/// Result of processing one sheet.
#[derive(Clone, Debug)]
pub struct ExtractionReport {
    pub mask: OccupancyMask,
    pub rows: Vec<Row>,
    pub summary: RunSummary,
}

/// A decoded sheet together with its report, kept for export.
#[derive(Clone, Debug)]
pub struct ProcessedSheet {
    pub source: SourceImage,
    pub report: ExtractionReport,
}

/// One sheet and the manifest describing it.
#[derive(Clone, Debug)]
pub struct SheetJob {
    pub image: PathBuf,
    pub manifest: Manifest,
}

pub struct SheetExtractor {
    params: ExtractorParams,
    recognizer: Option<Box<dyn TextRecognizer>>,
}

impl SheetExtractor {
    pub fn new(params: ExtractorParams) -> Self {
        Self {
            params,
            recognizer: None,
        }
    }

    /// Enable caption-assisted matching for rows the size stage cannot settle.
    pub fn with_recognizer(mut self, recognizer: Box<dyn TextRecognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    /// Run every stage on `source` and describe the outcome.
    pub fn process(&self, source: &SourceImage, manifest: &Manifest) -> ExtractionReport {
        let (width, height) = (source.width(), source.height());
        debug!(
            "SheetExtractor::process start w={} h={} alpha={} manifest_rows={}",
            width,
            height,
            source.has_alpha(),
            manifest.rows.len()
        );
        let total_start = Instant::now();
        let mut timings = TimingBreakdown::default();
        let mut warnings = Vec::new();

        let signature = timings.time("background", || {
            estimate_background(source, &self.params.background)
        });
        if let BackgroundSignature::Color {
            spread,
            ambiguous: true,
            ..
        } = signature
        {
            warn!("background border is uneven (spread {spread}); mask is provisional");
            warnings.push(Warning::AmbiguousBackground { spread });
        }

        let mask = timings.time("mask", || build_mask(source, &signature, &self.params.mask));
        let mask_stage = MaskStage {
            foreground_px: mask.count(),
            coverage: mask.coverage(),
        };
        debug!(
            "mask: {} foreground px ({:.1}%)",
            mask_stage.foreground_px,
            mask_stage.coverage * 100.0
        );

        let detection = timings.time("regions", || detect_regions(&mask, &self.params.regions));
        let merged = timings.time("merge", || merge_boxes(&detection.boxes(), &self.params.merge));
        let expected = manifest.expected_count();
        let status = RegionStatus::classify(merged.len(), expected);
        match status {
            RegionStatus::Empty => {
                warn!("no regions detected; background tolerance may not match this sheet");
                warnings.push(Warning::NoRegions);
            }
            RegionStatus::Sparse => {
                warn!(
                    "only {} regions for {} manifest entries",
                    merged.len(),
                    expected
                );
                warnings.push(Warning::SparseRegions {
                    found: merged.len(),
                    expected,
                });
            }
            RegionStatus::Ok => {}
        }

        let rows = timings.time("rows", || group_rows(&merged, &self.params.rows));

        let classification = timings.time("classify", || {
            let mut classifier = Classifier::new(self.params.classify);
            if let Some(recognizer) = self.recognizer.as_deref() {
                classifier = classifier.with_recognizer(recognizer);
            }
            classifier.classify(&rows, manifest, source, &mask)
        });
        warnings.extend(
            classification
                .rows
                .iter()
                .filter(|r| r.count_mismatch)
                .map(|r| Warning::RowCountMismatch {
                    row: r.index,
                    observed: r.observed,
                    expected: r.expected,
                }),
        );

        timings.total_ms = elapsed_ms(total_start);
        let summary = RunSummary {
            input: InputDescriptor {
                path: None,
                width,
                height,
                has_alpha: source.has_alpha(),
            },
            background: BackgroundStage {
                ambiguous: signature.is_ambiguous(),
                signature,
            },
            mask: mask_stage,
            regions: RegionStage {
                detected: detection.regions.len(),
                discarded: detection.discarded,
                merged: merged.len(),
                status,
            },
            rows: classification.rows,
            fallback_rows: classification.fallback_rows,
            records: classification.records,
            unmapped: classification.unmapped,
            ignored: classification.ignored,
            missing: classification.missing,
            warnings,
            exports: None,
            timings,
        };
        info!("{}", summary.headline());

        ExtractionReport {
            mask,
            rows,
            summary,
        }
    }

    /// Load `path` and process it. Decode failures are returned, not logged.
    pub fn process_path(&self, path: &Path, manifest: &Manifest) -> Result<ProcessedSheet> {
        let source = load_source_image(path)?;
        let mut report = self.process(&source, manifest);
        report.summary.input.path = Some(path.to_path_buf());
        Ok(ProcessedSheet { source, report })
    }

    /// Process each job independently. One failing sheet does not affect
    /// the others; results keep the order of `jobs`.
    pub fn process_batch(&self, jobs: &[SheetJob]) -> Vec<Result<ProcessedSheet>> {
        #[cfg(feature = "parallel")]
        {
            jobs.par_iter()
                .map(|job| self.process_path(&job.image, &job.manifest))
                .collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            jobs.iter()
                .map(|job| self.process_path(&job.image, &job.manifest))
                .collect()
        }
    }
}

impl Exporter {
    /// Write the mapped records of `report` and attach the outcome to its
    /// summary.
    pub fn export_report<'a>(
        &self,
        report: &'a mut ExtractionReport,
        source: &SourceImage,
    ) -> &'a ExportOutcome {
        let start = Instant::now();
        let outcome = self.export(&report.summary.records, source, &report.mask);
        report.summary.timings.push("export", elapsed_ms(start));
        report.summary.exports.insert(outcome)
    }
}
