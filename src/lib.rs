#![doc = include_str!("../README.md")]

// Public modules (stable-ish surface)
pub mod batch;
pub mod error;
pub mod export;
pub mod extractor;
pub mod image;
pub mod manifest;
pub mod types;

// Pipeline stages, usable on their own by tools and tests.
pub mod background;
pub mod classify;
pub mod mask;
pub mod merge;
pub mod regions;
pub mod rows;

pub mod config;
pub mod diagnostics;

// --- High-level re-exports -------------------------------------------------

// Main entry points: extractor, exporter and results.
pub use crate::batch::{run_extract, SheetOutcome};
pub use crate::error::{Result, SlicerError};
pub use crate::export::{ExportOutcome, ExportedFile, Exporter};
pub use crate::extractor::{
    ExtractionReport, ExtractorParams, ProcessedSheet, SheetExtractor, SheetJob,
};
pub use crate::manifest::{load_manifest, DestinationRoot, Manifest, ManifestEntry, ManifestRow};
pub use crate::types::{AssetRecord, Assignment, BoundingBox};

// Run report written next to the exported assets.
pub use crate::diagnostics::{RunSummary, Warning};

// --- Prelude ---------------------------------------------------------------

/// Small prelude for quick experiments.
///
/// ```no_run
/// use sheet_slicer::prelude::*;
/// use std::path::Path;
///
/// # fn main() -> sheet_slicer::Result<()> {
/// let source = load_source_image(Path::new("sheet.png"))?;
/// let manifest = load_manifest(Path::new("manifest.json"))?;
///
/// let mut report = SheetExtractor::new(ExtractorParams::default()).process(&source, &manifest);
/// let exporter = Exporter::new("src/assets", "public/assets");
/// let outcome = exporter.export_report(&mut report, &source);
/// println!("wrote {} files", outcome.written.len());
/// # Ok(())
/// # }
/// ```
pub mod prelude {
    pub use crate::image::io::load_source_image;
    pub use crate::image::SourceImage;
    pub use crate::{
        load_manifest, Exporter, ExtractionReport, ExtractorParams, Manifest, SheetExtractor,
    };
}

// --- Stage-level API (for tools & advanced users) ---------------------------

pub mod stages {
    pub use crate::background::{estimate_background, BackgroundOptions, BackgroundSignature};
    pub use crate::classify::{Classification, Classifier, ClassifyOptions, RowOutcome};
    pub use crate::mask::{build_mask, MaskOptions};
    pub use crate::merge::{merge_boxes, MergeOptions};
    pub use crate::regions::{detect_regions, RegionDetection, RegionOptions, RegionStatus};
    pub use crate::rows::{group_rows, RowOptions};

    pub use crate::diagnostics::{
        BackgroundStage, InputDescriptor, MaskStage, RegionStage, StageTiming, TimingBreakdown,
    };
}
