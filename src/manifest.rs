//! Manifest: the ordered description of what a sheet is expected to hold.
//!
//! Row `i` of the manifest describes detected row `i` of the sheet. Each
//! entry names the destination root, a category subdirectory and a file
//! name. The manifest is the only place where asset identities come from;
//! the classifier never invents names.
//!
//! ```json
//! {
//!   "rows": [
//!     { "entries": [
//!         { "root": "bundled", "subdir": "seating", "filename": "chair.png" },
//!         { "root": "public", "subdir": "overlays", "filename": "glow.png", "mirror": true }
//!     ] },
//!     { "ignore": true },
//!     { "strategy": "size", "tolerance": 1, "entries": [ ... ] }
//!   ]
//! }
//! ```
use crate::error::{Result, SlicerError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Top-level output location of a finished asset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationRoot {
    /// Co-located with the application's source assets.
    Bundled,
    /// Served as a static runtime asset.
    Public,
}

impl DestinationRoot {
    pub fn other(self) -> Self {
        match self {
            DestinationRoot::Bundled => DestinationRoot::Public,
            DestinationRoot::Public => DestinationRoot::Bundled,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub root: DestinationRoot,
    #[serde(default)]
    pub subdir: String,
    pub filename: String,
    /// Expected size relative to the other entries of the row; larger means
    /// bigger. Only used when every entry of the row carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_size: Option<f32>,
    /// Caption printed under the asset, if any. Defaults to the file stem.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    /// Also write the file to the other destination root.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub mirror: bool,
}

impl ManifestEntry {
    pub fn new(root: DestinationRoot, subdir: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            root,
            subdir: subdir.into(),
            filename: filename.into(),
            relative_size: None,
            caption: None,
            mirror: false,
        }
    }

    pub fn with_relative_size(mut self, size: f32) -> Self {
        self.relative_size = Some(size);
        self
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    pub fn mirrored(mut self) -> Self {
        self.mirror = true;
        self
    }

    /// `subdir/filename` relative to the destination root.
    pub fn relative_path(&self) -> PathBuf {
        let mut path = PathBuf::new();
        if !self.subdir.is_empty() {
            path.push(&self.subdir);
        }
        path.push(&self.filename);
        path
    }

    /// Text expected under the asset, normalised for matching.
    pub fn caption_label(&self) -> String {
        let raw = match &self.caption {
            Some(c) => c.clone(),
            None => Path::new(&self.filename)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        crate::classify::text::sanitize_label(&raw)
    }

    /// Roots this entry is written to, primary first.
    pub fn roots(&self) -> Vec<DestinationRoot> {
        if self.mirror {
            vec![self.root, self.root.other()]
        } else {
            vec![self.root]
        }
    }
}

/// How a row with matching counts is assigned.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowStrategy {
    /// Column `i` maps to entry `i`.
    #[default]
    Positional,
    /// Boxes are matched by descending area against entries ranked by
    /// `relative_size`.
    Size,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestRow {
    pub entries: Vec<ManifestEntry>,
    /// Allowed deviation between observed and expected box counts before
    /// the mismatch is reported as a warning.
    pub tolerance: usize,
    pub strategy: RowStrategy,
    /// Row holds captions or decoration; its boxes are reported, not mapped.
    pub ignore: bool,
}

impl ManifestRow {
    pub fn expected(&self) -> usize {
        if self.ignore {
            0
        } else {
            self.entries.len()
        }
    }

    /// Entry indices ordered by descending expected size, or `None` when the
    /// row does not declare sizes for every entry.
    pub fn size_ranking(&self) -> Option<Vec<usize>> {
        if self.entries.is_empty() || self.entries.iter().any(|e| e.relative_size.is_none()) {
            return None;
        }
        let mut order: Vec<usize> = (0..self.entries.len()).collect();
        order.sort_by(|&a, &b| {
            let sa = self.entries[a].relative_size.unwrap_or(0.0);
            let sb = self.entries[b].relative_size.unwrap_or(0.0);
            sb.partial_cmp(&sa)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });
        Some(order)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub rows: Vec<ManifestRow>,
}

impl Manifest {
    pub fn new(rows: Vec<ManifestRow>) -> Self {
        Self { rows }
    }

    /// Parse and validate a manifest from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let manifest: Manifest = serde_json::from_str(json)
            .map_err(|e| SlicerError::InvalidManifest(format!("parse error: {e}")))?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn row(&self, index: usize) -> Option<&ManifestRow> {
        self.rows.get(index)
    }

    /// Total number of boxes the manifest expects to be mapped.
    pub fn expected_count(&self) -> usize {
        self.rows.iter().map(ManifestRow::expected).sum()
    }

    /// Reject entries that could escape their root or collide on disk.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for (r, row) in self.rows.iter().enumerate() {
            for entry in &row.entries {
                if entry.filename.trim().is_empty() {
                    return Err(SlicerError::InvalidManifest(format!(
                        "row {r}: entry with empty filename"
                    )));
                }
                let rel = entry.relative_path();
                if !is_contained(&rel) || Path::new(&entry.filename).components().count() != 1 {
                    return Err(SlicerError::InvalidManifest(format!(
                        "row {r}: destination {} escapes its root",
                        rel.display()
                    )));
                }
                if let Some(size) = entry.relative_size {
                    if !size.is_finite() || size < 0.0 {
                        return Err(SlicerError::InvalidManifest(format!(
                            "row {r}: {} has invalid relative_size {size}",
                            entry.filename
                        )));
                    }
                }
                for root in entry.roots() {
                    if !seen.insert((root, rel.clone())) {
                        return Err(SlicerError::InvalidManifest(format!(
                            "row {r}: duplicate destination {:?}/{}",
                            root,
                            rel.display()
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

fn is_contained(path: &Path) -> bool {
    path.components().all(|c| matches!(c, Component::Normal(_)))
}

/// Load a manifest from a JSON file.
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let data = fs::read_to_string(path).map_err(|e| SlicerError::io(path, e))?;
    Manifest::from_json_str(&data).map_err(|e| match e {
        SlicerError::InvalidManifest(msg) => {
            SlicerError::InvalidManifest(format!("{}: {msg}", path.display()))
        }
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rows_with_defaults() {
        let json = r#"{
            "rows": [
                { "entries": [
                    { "root": "bundled", "subdir": "seating", "filename": "chair.png" },
                    { "root": "public", "subdir": "overlays", "filename": "glow.png", "mirror": true }
                ] },
                { "ignore": true },
                { "strategy": "size", "tolerance": 2, "entries": [
                    { "root": "public", "subdir": "fx", "filename": "big.png", "relative_size": 3.0 },
                    { "root": "public", "subdir": "fx", "filename": "small.png", "relative_size": 1.0 }
                ] }
            ]
        }"#;
        let m = Manifest::from_json_str(json).unwrap();
        assert_eq!(m.rows.len(), 3);
        assert_eq!(m.rows[0].strategy, RowStrategy::Positional);
        assert_eq!(m.rows[0].tolerance, 0);
        assert!(m.rows[0].entries[1].mirror);
        assert!(m.rows[1].ignore);
        assert_eq!(m.rows[2].strategy, RowStrategy::Size);
        assert_eq!(m.expected_count(), 4);
        assert_eq!(
            m.rows[0].entries[0].relative_path(),
            PathBuf::from("seating/chair.png")
        );
    }

    #[test]
    fn rejects_parent_traversal() {
        let json = r#"{ "rows": [ { "entries": [
            { "root": "bundled", "subdir": "../outside", "filename": "x.png" }
        ] } ] }"#;
        let err = Manifest::from_json_str(json).unwrap_err();
        assert!(matches!(err, SlicerError::InvalidManifest(_)), "{err:?}");
    }

    #[test]
    fn rejects_duplicate_destinations() {
        let row = ManifestRow {
            entries: vec![
                ManifestEntry::new(DestinationRoot::Public, "fx", "a.png"),
                ManifestEntry::new(DestinationRoot::Bundled, "fx", "a.png").mirrored(),
            ],
            ..Default::default()
        };
        assert!(Manifest::new(vec![row]).validate().is_err());
    }

    #[test]
    fn size_ranking_requires_every_entry_sized() {
        let mut row = ManifestRow {
            entries: vec![
                ManifestEntry::new(DestinationRoot::Public, "", "s.png").with_relative_size(1.0),
                ManifestEntry::new(DestinationRoot::Public, "", "l.png").with_relative_size(4.0),
                ManifestEntry::new(DestinationRoot::Public, "", "m.png").with_relative_size(2.0),
            ],
            ..Default::default()
        };
        assert_eq!(row.size_ranking(), Some(vec![1, 2, 0]));
        row.entries[0].relative_size = None;
        assert_eq!(row.size_ranking(), None);
    }

    #[test]
    fn caption_label_defaults_to_file_stem() {
        let e = ManifestEntry::new(DestinationRoot::Public, "characters", "Violin Alt.png");
        assert_eq!(e.caption_label(), "violin_alt");
        let e = e.with_caption("French Horn");
        assert_eq!(e.caption_label(), "french_horn");
    }
}
