//! Asset classifier: assigns detected boxes to manifest entries.
//!
//! Per row the manifest decides first. When the number of boxes equals the
//! number of entries and the row is positional, column `i` takes entry `i`
//! and nothing else is consulted. Otherwise the row falls back:
//!
//! 1. [`size`]: rank boxes by pixel area against the entries' declared
//!    relative sizes, dropping clearly smaller surplus boxes.
//! 2. [`text`]: read the caption strip of boxes that are still open and
//!    match it against the remaining entries. Only used when a recognizer
//!    is configured and only among entries nobody has taken.
//! 3. Whatever is left is reported as unmapped; entries that received no
//!    box are reported as missing.

pub mod size;
pub mod text;

use self::size::{rank_by_size, OpenBox};
use self::text::{caption_image, label_similarity, sanitize_label, TextRecognizer};
use crate::image::{ImageView, OccupancyMask, SourceImage};
use crate::manifest::{Manifest, ManifestRow, RowStrategy};
use crate::types::{
    AssetRecord, Assignment, BoundingBox, IgnoredBox, MissingEntry, Row, UnmappedBox,
    UnmappedReason,
};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifyOptions {
    /// Minimum area ratio between neighbouring ranks to treat them as
    /// distinguishable by size.
    pub size_separation: f32,
    /// Height fraction at the bottom of a box searched for a caption.
    pub caption_fraction: f32,
    /// Readings below this recognizer confidence are ignored.
    pub min_text_confidence: f32,
    /// Minimum label similarity for a caption to claim an entry.
    pub min_similarity: f32,
    /// Required similarity lead over the runner-up entry.
    pub min_margin: f32,
}

impl Default for ClassifyOptions {
    fn default() -> Self {
        Self {
            size_separation: 1.15,
            caption_fraction: 0.2,
            min_text_confidence: 0.5,
            min_similarity: 0.6,
            min_margin: 0.1,
        }
    }
}

/// How a detected row was resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RowResolution {
    Positional,
    Fallback,
    Ignored,
    /// No manifest row describes this detected row.
    Unlisted,
    /// A manifest row with no detected counterpart.
    NotDetected,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowOutcome {
    pub index: usize,
    pub observed: usize,
    pub expected: usize,
    pub resolution: RowResolution,
    /// Observed count deviates from the manifest beyond its tolerance.
    pub count_mismatch: bool,
    pub mapped: usize,
    pub text_assisted: usize,
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub records: Vec<AssetRecord>,
    pub unmapped: Vec<UnmappedBox>,
    pub ignored: Vec<IgnoredBox>,
    pub missing: Vec<MissingEntry>,
    pub rows: Vec<RowOutcome>,
    /// Rows that needed the fallback chain.
    pub fallback_rows: usize,
}

/// Inputs shared by every row of one sheet.
struct SheetContext<'a> {
    source: &'a SourceImage,
    mask: &'a OccupancyMask,
}

pub struct Classifier<'r> {
    opts: ClassifyOptions,
    recognizer: Option<&'r dyn TextRecognizer>,
}

impl<'r> Classifier<'r> {
    pub fn new(opts: ClassifyOptions) -> Self {
        Self {
            opts,
            recognizer: None,
        }
    }

    pub fn with_recognizer(mut self, recognizer: &'r dyn TextRecognizer) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    /// Assign every box of every row, or report why it could not be.
    pub fn classify(
        &self,
        rows: &[Row],
        manifest: &Manifest,
        source: &SourceImage,
        mask: &OccupancyMask,
    ) -> Classification {
        let ctx = SheetContext { source, mask };
        let mut out = Classification::default();

        for row in rows {
            let outcome = match manifest.row(row.index) {
                None => self.unlisted_row(row, &ctx, &mut out),
                Some(listed) if listed.ignore => {
                    out.ignored.extend(row.boxes.iter().enumerate().map(|(column, &bbox)| {
                        IgnoredBox {
                            row: row.index,
                            column,
                            bbox,
                            area: pixel_area(ctx.mask, bbox),
                        }
                    }));
                    RowOutcome {
                        index: row.index,
                        observed: row.len(),
                        expected: 0,
                        resolution: RowResolution::Ignored,
                        count_mismatch: false,
                        mapped: 0,
                        text_assisted: 0,
                    }
                }
                Some(listed) => self.classify_row(row, listed, &ctx, &mut out),
            };
            out.rows.push(outcome);
        }

        for (index, listed) in manifest.rows.iter().enumerate().skip(rows.len()) {
            if listed.ignore {
                continue;
            }
            if !listed.entries.is_empty() {
                warn!(
                    "row {}: expected {} assets but no such row was detected",
                    index,
                    listed.entries.len()
                );
            }
            out.missing.extend(listed.entries.iter().map(|entry| MissingEntry {
                row: index,
                entry: entry.clone(),
            }));
            out.rows.push(RowOutcome {
                index,
                observed: 0,
                expected: listed.entries.len(),
                resolution: RowResolution::NotDetected,
                count_mismatch: !listed.entries.is_empty(),
                mapped: 0,
                text_assisted: 0,
            });
        }

        debug!(
            "classify: mapped={} unmapped={} ignored={} missing={} fallback_rows={}",
            out.records.len(),
            out.unmapped.len(),
            out.ignored.len(),
            out.missing.len(),
            out.fallback_rows
        );
        out
    }

    fn unlisted_row(&self, row: &Row, ctx: &SheetContext<'_>, out: &mut Classification) -> RowOutcome {
        warn!(
            "row {}: {} boxes but the manifest has no entry list for this row",
            row.index,
            row.len()
        );
        out.unmapped.extend(row.boxes.iter().enumerate().map(|(column, &bbox)| UnmappedBox {
            row: row.index,
            column,
            bbox,
            area: pixel_area(ctx.mask, bbox),
            reason: UnmappedReason::NoManifestRow,
        }));
        RowOutcome {
            index: row.index,
            observed: row.len(),
            expected: 0,
            resolution: RowResolution::Unlisted,
            count_mismatch: true,
            mapped: 0,
            text_assisted: 0,
        }
    }

    fn classify_row(
        &self,
        row: &Row,
        listed: &ManifestRow,
        ctx: &SheetContext<'_>,
        out: &mut Classification,
    ) -> RowOutcome {
        let observed = row.len();
        let expected = listed.entries.len();
        let areas: Vec<u64> = row.boxes.iter().map(|&b| pixel_area(ctx.mask, b)).collect();
        let record = |column: usize, entry: usize, assignment: Assignment| AssetRecord {
            bbox: row.boxes[column],
            area: areas[column],
            row: row.index,
            column,
            entry: listed.entries[entry].clone(),
            assignment,
        };

        if observed == expected && listed.strategy == RowStrategy::Positional {
            out.records.extend((0..observed).map(|i| record(i, i, Assignment::Positional)));
            return RowOutcome {
                index: row.index,
                observed,
                expected,
                resolution: RowResolution::Positional,
                count_mismatch: false,
                mapped: observed,
                text_assisted: 0,
            };
        }

        let deviation = observed.abs_diff(expected);
        let count_mismatch = deviation > listed.tolerance;
        if count_mismatch {
            warn!(
                "row {}: observed {} boxes, expected {}; using fallbacks",
                row.index, observed, expected
            );
        } else if deviation > 0 {
            debug!(
                "row {}: observed {} boxes, expected {} (within tolerance {})",
                row.index, observed, expected, listed.tolerance
            );
        }
        out.fallback_rows += 1;

        let sized = rank_by_size(&areas, listed, self.opts.size_separation);
        let mut taken = vec![false; expected];
        let mut assigned: Vec<(usize, usize, Assignment)> = Vec::with_capacity(observed);
        for (column, entry, method) in sized.pairs {
            taken[entry] = true;
            assigned.push((column, entry, method));
        }

        let (text_pairs, mut unresolved) =
            self.resolve_by_text(row, listed, ctx, sized.open, &taken);
        for (column, entry, method) in text_pairs {
            taken[entry] = true;
            assigned.push((column, entry, method));
        }

        assigned.sort_by_key(|a| a.0);
        let text_assisted = assigned
            .iter()
            .filter(|a| matches!(a.2, Assignment::TextAssisted { .. }))
            .count();
        let mapped = assigned.len();
        out.records
            .extend(assigned.into_iter().map(|(c, e, m)| record(c, e, m)));

        unresolved.sort_by_key(|o| o.column);
        out.unmapped.extend(unresolved.into_iter().map(|open| UnmappedBox {
            row: row.index,
            column: open.column,
            bbox: row.boxes[open.column],
            area: areas[open.column],
            reason: open.reason,
        }));
        out.missing.extend(
            listed.entries
                .iter()
                .zip(&taken)
                .filter(|(_, &t)| !t)
                .map(|(entry, _)| MissingEntry {
                    row: row.index,
                    entry: entry.clone(),
                }),
        );

        RowOutcome {
            index: row.index,
            observed,
            expected,
            resolution: RowResolution::Fallback,
            count_mismatch,
            mapped,
            text_assisted,
        }
    }

    /// Try to settle open boxes by reading their captions.
    ///
    /// Returns the accepted `(column, entry, method)` triples and the boxes
    /// that remain unresolved.
    fn resolve_by_text(
        &self,
        row: &Row,
        listed: &ManifestRow,
        ctx: &SheetContext<'_>,
        open: Vec<OpenBox>,
        taken: &[bool],
    ) -> (Vec<(usize, usize, Assignment)>, Vec<OpenBox>) {
        let Some(recognizer) = self.recognizer else {
            return (Vec::new(), open);
        };

        struct Claim {
            column: usize,
            entry: usize,
            score: f32,
            confidence: f32,
            text: String,
        }

        let mut claims: Vec<Claim> = Vec::new();
        for candidate in &open {
            let free: Vec<usize> = candidate
                .candidates
                .iter()
                .copied()
                .filter(|&e| !taken[e])
                .collect();
            if free.is_empty() {
                continue;
            }
            let bbox = row.boxes[candidate.column];
            let Some(caption) = caption_image(ctx.source, bbox, self.opts.caption_fraction) else {
                continue;
            };
            let reading = match recognizer.recognize(&caption) {
                Ok(r) => r,
                Err(err) => {
                    warn!("row {} col {}: {err}", row.index, candidate.column);
                    continue;
                }
            };
            if reading.confidence < self.opts.min_text_confidence {
                debug!(
                    "row {} col {}: caption '{}' below confidence ({:.2})",
                    row.index, candidate.column, reading.text, reading.confidence
                );
                continue;
            }
            let label = sanitize_label(&reading.text);
            if label.is_empty() {
                continue;
            }
            let mut scored: Vec<(usize, f32)> = free
                .iter()
                .map(|&e| (e, label_similarity(&label, &listed.entries[e].caption_label())))
                .collect();
            scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            let (best_entry, best) = scored[0];
            let runner_up = scored.get(1).map_or(0.0, |s| s.1);
            if best >= self.opts.min_similarity && best - runner_up >= self.opts.min_margin {
                claims.push(Claim {
                    column: candidate.column,
                    entry: best_entry,
                    score: best,
                    confidence: reading.confidence,
                    text: reading.text,
                });
            } else {
                debug!(
                    "row {} col {}: caption '{}' does not single out an entry (best={:.2} next={:.2})",
                    row.index, candidate.column, label, best, runner_up
                );
            }
        }

        claims.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.column.cmp(&b.column))
        });
        let mut entry_taken = taken.to_vec();
        let mut accepted = Vec::new();
        let mut resolved_columns = Vec::new();
        for claim in claims {
            if entry_taken[claim.entry] {
                continue;
            }
            entry_taken[claim.entry] = true;
            resolved_columns.push(claim.column);
            accepted.push((
                claim.column,
                claim.entry,
                Assignment::TextAssisted {
                    confidence: claim.confidence,
                    text: claim.text,
                },
            ));
        }

        let unresolved = open
            .into_iter()
            .filter(|o| !resolved_columns.contains(&o.column))
            .map(|mut o| {
                if !o.candidates.is_empty() {
                    o.reason = UnmappedReason::TextUnresolved;
                }
                o
            })
            .collect();
        (accepted, unresolved)
    }
}

/// Foreground pixels of `mask` inside `bbox`.
pub fn pixel_area(mask: &OccupancyMask, bbox: BoundingBox) -> u64 {
    let x0 = (bbox.x as usize).min(mask.w);
    let x1 = (bbox.right() as usize).min(mask.w);
    let y0 = (bbox.y as usize).min(mask.h);
    let y1 = (bbox.bottom() as usize).min(mask.h);
    mask.rows()
        .skip(y0)
        .take(y1 - y0)
        .map(|row| row[x0..x1].iter().filter(|&&v| v).count() as u64)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::text::TextReading;
    use super::*;
    use crate::error::Result;
    use crate::image::ImageViewMut;
    use crate::manifest::{DestinationRoot, ManifestEntry};
    use image::{GrayImage, Rgba, RgbaImage};
    use std::sync::Mutex;

    /// Paints solid boxes on a mask and returns matching rows.
    fn scene(w: usize, h: usize, rows: &[Vec<BoundingBox>]) -> (SourceImage, OccupancyMask, Vec<Row>) {
        let mut mask = OccupancyMask::new(w, h);
        let mut img = RgbaImage::from_pixel(w as u32, h as u32, Rgba([0, 0, 0, 255]));
        let mut out = Vec::new();
        for (index, boxes) in rows.iter().enumerate() {
            for b in boxes {
                for y in b.y..b.bottom() {
                    for x in b.x..b.right() {
                        mask.set(x as usize, y as usize, true);
                        img.put_pixel(x, y, Rgba([200, 200, 200, 255]));
                    }
                }
            }
            out.push(Row {
                index,
                top: boxes[0].y,
                height: boxes[0].height,
                boxes: boxes.clone(),
            });
        }
        (SourceImage::from_rgba(img, false), mask, out)
    }

    fn entries(names: &[&str]) -> Vec<ManifestEntry> {
        names
            .iter()
            .map(|n| ManifestEntry::new(DestinationRoot::Bundled, "seating", *n))
            .collect()
    }

    #[test]
    fn matching_counts_assign_positionally_without_fallback() {
        let boxes: Vec<BoundingBox> = (0..4).map(|i| BoundingBox::new(10 + i * 40, 10, 30, 30)).collect();
        let (src, mask, rows) = scene(200, 60, &[boxes]);
        let manifest = Manifest::new(vec![ManifestRow {
            entries: entries(&["a.png", "b.png", "c.png", "d.png"]),
            ..Default::default()
        }]);
        let result = Classifier::new(ClassifyOptions::default()).classify(&rows, &manifest, &src, &mask);
        assert_eq!(result.fallback_rows, 0);
        assert!(result.unmapped.is_empty() && result.missing.is_empty());
        let names: Vec<&str> = result.records.iter().map(|r| r.entry.filename.as_str()).collect();
        assert_eq!(names, vec!["a.png", "b.png", "c.png", "d.png"]);
        assert!(result.records.iter().all(|r| r.assignment == Assignment::Positional));
        assert_eq!(result.records[0].area, 900);
    }

    #[test]
    fn extra_rows_are_unmapped_and_missing_rows_reported() {
        let (src, mask, rows) = scene(
            200,
            200,
            &[
                vec![BoundingBox::new(10, 10, 30, 30)],
                vec![BoundingBox::new(10, 100, 30, 30)],
            ],
        );
        let manifest = Manifest::new(vec![ManifestRow {
            entries: entries(&["a.png"]),
            ..Default::default()
        }]);
        let result = Classifier::new(ClassifyOptions::default()).classify(&rows, &manifest, &src, &mask);
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.unmapped.len(), 1);
        assert_eq!(result.unmapped[0].reason, UnmappedReason::NoManifestRow);
        assert_eq!(result.unmapped[0].area, 900);

        let longer = Manifest::new(vec![
            ManifestRow {
                entries: entries(&["a.png"]),
                ..Default::default()
            },
            ManifestRow {
                entries: entries(&["b.png"]),
                ..Default::default()
            },
            ManifestRow {
                entries: entries(&["c.png"]),
                ..Default::default()
            },
        ]);
        let result = Classifier::new(ClassifyOptions::default()).classify(&rows, &longer, &src, &mask);
        assert_eq!(result.missing.len(), 1);
        assert_eq!(result.missing[0].entry.filename, "c.png");
        assert_eq!(result.rows[2].resolution, RowResolution::NotDetected);
    }

    #[test]
    fn ignored_rows_are_reported_not_mapped() {
        let (src, mask, rows) = scene(200, 60, &[vec![BoundingBox::new(10, 10, 30, 8)]]);
        let manifest = Manifest::new(vec![ManifestRow {
            ignore: true,
            ..Default::default()
        }]);
        let result = Classifier::new(ClassifyOptions::default()).classify(&rows, &manifest, &src, &mask);
        assert!(result.records.is_empty() && result.unmapped.is_empty());
        assert_eq!(result.ignored.len(), 1);
        assert_eq!(result.rows[0].resolution, RowResolution::Ignored);
    }

    #[test]
    fn speck_in_row_is_dropped_and_rest_keeps_order() {
        let boxes = vec![
            BoundingBox::new(10, 10, 30, 30),
            BoundingBox::new(50, 10, 4, 4),
            BoundingBox::new(60, 10, 30, 30),
        ];
        let (src, mask, rows) = scene(120, 60, &[boxes]);
        let manifest = Manifest::new(vec![ManifestRow {
            entries: entries(&["a.png", "b.png"]),
            tolerance: 1,
            ..Default::default()
        }]);
        let result = Classifier::new(ClassifyOptions::default()).classify(&rows, &manifest, &src, &mask);
        assert_eq!(result.fallback_rows, 1);
        assert!(!result.rows[0].count_mismatch);
        let got: Vec<(usize, &str)> = result
            .records
            .iter()
            .map(|r| (r.column, r.entry.filename.as_str()))
            .collect();
        assert_eq!(got, vec![(0, "a.png"), (2, "b.png")]);
        assert_eq!(result.unmapped.len(), 1);
        assert_eq!(result.unmapped[0].reason, UnmappedReason::SurplusBox);
    }

    /// Recognizer returning scripted readings in call order.
    struct Scripted(Mutex<Vec<TextReading>>);

    impl TextRecognizer for Scripted {
        fn recognize(&self, _caption: &GrayImage) -> Result<TextReading> {
            let mut queue = self.0.lock().unwrap();
            Ok(if queue.is_empty() {
                TextReading::empty()
            } else {
                queue.remove(0)
            })
        }
    }

    #[test]
    fn captions_resolve_equal_sized_boxes_when_counts_differ() {
        let boxes = vec![
            BoundingBox::new(10, 10, 40, 60),
            BoundingBox::new(60, 10, 40, 60),
        ];
        let (src, mask, rows) = scene(120, 80, &[boxes]);
        let manifest = Manifest::new(vec![ManifestRow {
            entries: entries(&["aoc_character_violin.png", "aoc_character_viola.png", "aoc_character_cello.png"]),
            ..Default::default()
        }]);
        let recognizer = Scripted(Mutex::new(vec![
            TextReading {
                text: "aoc character cello".into(),
                confidence: 0.9,
            },
            TextReading {
                text: "aoc character violin".into(),
                confidence: 0.3,
            },
        ]));
        let result = Classifier::new(ClassifyOptions::default())
            .with_recognizer(&recognizer)
            .classify(&rows, &manifest, &src, &mask);

        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].column, 0);
        assert_eq!(result.records[0].entry.filename, "aoc_character_cello.png");
        assert!(matches!(
            result.records[0].assignment,
            Assignment::TextAssisted { .. }
        ));
        assert_eq!(result.rows[0].text_assisted, 1);
        // Second reading was not confident enough.
        assert_eq!(result.unmapped.len(), 1);
        assert_eq!(result.unmapped[0].reason, UnmappedReason::TextUnresolved);
        assert_eq!(result.missing.len(), 2);
    }

    #[test]
    fn text_never_overrides_positional_rows() {
        let boxes = vec![BoundingBox::new(10, 10, 40, 60)];
        let (src, mask, rows) = scene(80, 80, &[boxes]);
        let manifest = Manifest::new(vec![ManifestRow {
            entries: entries(&["chair.png"]),
            ..Default::default()
        }]);
        let recognizer = Scripted(Mutex::new(vec![TextReading {
            text: "music stand".into(),
            confidence: 1.0,
        }]));
        let result = Classifier::new(ClassifyOptions::default())
            .with_recognizer(&recognizer)
            .classify(&rows, &manifest, &src, &mask);
        assert_eq!(result.records[0].entry.filename, "chair.png");
        assert_eq!(result.records[0].assignment, Assignment::Positional);
    }
}
