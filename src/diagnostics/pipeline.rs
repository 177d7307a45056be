use crate::background::BackgroundSignature;
use crate::classify::RowOutcome;
use crate::diagnostics::{TimingBreakdown, Warning};
use crate::export::ExportOutcome;
use crate::regions::RegionStatus;
use crate::types::{AssetRecord, IgnoredBox, MissingEntry, UnmappedBox};
use serde::Serialize;
use std::path::PathBuf;

/// Everything a run learned about one sheet, ready to be written as JSON.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub input: InputDescriptor,
    pub background: BackgroundStage,
    pub mask: MaskStage,
    pub regions: RegionStage,
    pub rows: Vec<RowOutcome>,
    /// Rows that needed the fallback chain.
    pub fallback_rows: usize,
    pub records: Vec<AssetRecord>,
    pub unmapped: Vec<UnmappedBox>,
    pub ignored: Vec<IgnoredBox>,
    pub missing: Vec<MissingEntry>,
    pub warnings: Vec<Warning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exports: Option<ExportOutcome>,
    pub timings: TimingBreakdown,
}

impl RunSummary {
    pub fn mapped(&self) -> usize {
        self.records.len()
    }

    /// One-line digest for logs and the CLI.
    pub fn headline(&self) -> String {
        format!(
            "{}x{}: {} regions, {} rows, mapped {}, unmapped {}, ignored {}, missing {}, warnings {}",
            self.input.width,
            self.input.height,
            self.regions.merged,
            self.rows.len(),
            self.mapped(),
            self.unmapped.len(),
            self.ignored.len(),
            self.missing.len(),
            self.warnings.len()
        )
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputDescriptor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub width: usize,
    pub height: usize,
    pub has_alpha: bool,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundStage {
    pub signature: BackgroundSignature,
    pub ambiguous: bool,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskStage {
    pub foreground_px: usize,
    pub coverage: f32,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionStage {
    /// Components kept after size filtering.
    pub detected: usize,
    /// Components rejected by the size filters.
    pub discarded: usize,
    /// Boxes left after fragment merging.
    pub merged: usize,
    pub status: RegionStatus,
}
