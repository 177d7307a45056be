//! Exporter: writes classified crops to their destination roots.
//!
//! Each [`AssetRecord`] is cropped from the source image and written to
//! `{root}/{subdir}/{filename}`, plus the opposite root when the entry is
//! mirrored. Colour always comes from the source; alpha is the source's own
//! channel when it has one, otherwise the occupancy mask. A failure on one
//! file is recorded and the remaining files are still written.
use crate::error::Result;
use crate::image::io::save_rgba;
use crate::image::{ImageView, OccupancyMask, SourceImage};
use crate::manifest::DestinationRoot;
use crate::types::{AssetRecord, BoundingBox, UnmappedBox};
use image::{Rgba, RgbaImage};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Exporter {
    /// Root for assets bundled with the application sources.
    pub bundled_root: PathBuf,
    /// Root for statically served assets.
    pub public_root: PathBuf,
    /// Replace existing files instead of skipping them.
    pub overwrite: bool,
}

impl Default for Exporter {
    fn default() -> Self {
        Self {
            bundled_root: PathBuf::from("out/bundled"),
            public_root: PathBuf::from("out/public"),
            overwrite: true,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedFile {
    pub record: AssetRecord,
    pub path: PathBuf,
    pub bytes: u64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedFile {
    pub path: PathBuf,
    pub row: usize,
    pub column: usize,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportFailure {
    pub path: PathBuf,
    pub row: usize,
    pub column: usize,
    pub message: String,
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportOutcome {
    pub written: Vec<ExportedFile>,
    pub skipped: Vec<SkippedFile>,
    pub failures: Vec<ExportFailure>,
}

impl ExportOutcome {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl Exporter {
    pub fn new(bundled_root: impl Into<PathBuf>, public_root: impl Into<PathBuf>) -> Self {
        Self {
            bundled_root: bundled_root.into(),
            public_root: public_root.into(),
            overwrite: true,
        }
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn root(&self, root: DestinationRoot) -> &Path {
        match root {
            DestinationRoot::Bundled => &self.bundled_root,
            DestinationRoot::Public => &self.public_root,
        }
    }

    /// Every path `record` is written to, primary root first.
    pub fn destinations(&self, record: &AssetRecord) -> Vec<PathBuf> {
        let rel = record.entry.relative_path();
        record
            .entry
            .roots()
            .into_iter()
            .map(|root| self.root(root).join(&rel))
            .collect()
    }

    /// Write every record. Never stops at the first failing file.
    pub fn export(
        &self,
        records: &[AssetRecord],
        source: &SourceImage,
        mask: &OccupancyMask,
    ) -> ExportOutcome {
        let mut outcome = ExportOutcome::default();
        for record in records {
            let crop = cutout(source, mask, record.bbox);
            for path in self.destinations(record) {
                if !self.overwrite && path.exists() {
                    debug!("export: {} exists, skipped", path.display());
                    outcome.skipped.push(SkippedFile {
                        path,
                        row: record.row,
                        column: record.column,
                    });
                    continue;
                }
                match save_rgba(&crop, &path) {
                    Ok(bytes) => {
                        debug!("export: r{} c{} -> {}", record.row, record.column, path.display());
                        outcome.written.push(ExportedFile {
                            record: record.clone(),
                            path,
                            bytes,
                        });
                    }
                    Err(err) => {
                        warn!("export: {err}");
                        outcome.failures.push(ExportFailure {
                            path,
                            row: record.row,
                            column: record.column,
                            message: err.to_string(),
                        });
                    }
                }
            }
        }
        info!(
            "export: wrote {} files, skipped {}, failed {}",
            outcome.written.len(),
            outcome.skipped.len(),
            outcome.failures.len()
        );
        outcome
    }

    /// Write unmapped boxes to `dir` as `unmapped_r{row}_c{col}.png` for review.
    pub fn export_unmapped(
        &self,
        unmapped: &[UnmappedBox],
        source: &SourceImage,
        mask: &OccupancyMask,
        dir: &Path,
    ) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::with_capacity(unmapped.len());
        for item in unmapped {
            let path = dir.join(format!("unmapped_r{}_c{}.png", item.row, item.column));
            if !self.overwrite && path.exists() {
                continue;
            }
            save_rgba(&cutout(source, mask, item.bbox), &path)?;
            paths.push(path);
        }
        if !paths.is_empty() {
            info!("export: {} unmapped crops in {}", paths.len(), dir.display());
        }
        Ok(paths)
    }
}

/// Crop `bbox` and attach alpha from the source or, failing that, the mask.
pub fn cutout(source: &SourceImage, mask: &OccupancyMask, bbox: BoundingBox) -> RgbaImage {
    let mut crop = source.crop(bbox);
    if source.has_alpha() {
        return crop;
    }
    for (x, y, px) in crop.enumerate_pixels_mut() {
        let (mx, my) = ((bbox.x + x) as usize, (bbox.y + y) as usize);
        let a = if mx < mask.width() && my < mask.height() {
            mask.alpha(mx, my)
        } else {
            0
        };
        *px = Rgba([px[0], px[1], px[2], a]);
    }
    crop
}
