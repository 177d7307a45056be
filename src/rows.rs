//! Row grouper: clusters merged boxes into visual rows.
//!
//! Boxes are walked top to bottom. A row is anchored at its first box and
//! its band never moves: a following box joins while its top lies within
//! `band_ratio` of the anchor's height below the anchor's top, and while it
//! shares at least `min_overlap_ratio` of the shorter height with every box
//! already in the row. The first box that fails either test closes the row
//! and anchors the next one.
//!
//! The input is sorted on the full `(y, x, width, height)` key first, so the
//! grouping does not depend on the order in which boxes were supplied.
use crate::types::{BoundingBox, Row};
use log::debug;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RowOptions {
    /// Fraction of the anchor height a box top may sit below the anchor.
    pub band_ratio: f32,
    /// Minimum vertical overlap between any two members, as a fraction of
    /// the shorter box's height.
    pub min_overlap_ratio: f32,
}

impl Default for RowOptions {
    fn default() -> Self {
        Self {
            band_ratio: 0.5,
            min_overlap_ratio: 0.5,
        }
    }
}

/// True when `a` and `b` overlap vertically by at least `ratio` of the
/// shorter height.
pub fn shares_row(a: &BoundingBox, b: &BoundingBox, ratio: f32) -> bool {
    let shorter = a.height.min(b.height) as f32;
    a.vertical_overlap(b) as f32 >= shorter * ratio
}

struct Band {
    anchor: BoundingBox,
    boxes: Vec<BoundingBox>,
}

impl Band {
    fn start(b: BoundingBox) -> Self {
        Self {
            anchor: b,
            boxes: vec![b],
        }
    }

    fn admits(&self, b: &BoundingBox, opts: &RowOptions) -> bool {
        let limit = self.anchor.y as f32 + self.anchor.height as f32 * opts.band_ratio;
        (b.y as f32) <= limit
            && self
                .boxes
                .iter()
                .all(|m| shares_row(m, b, opts.min_overlap_ratio))
    }

    fn close(mut self, index: usize) -> Row {
        self.boxes.sort_by_key(|b| (b.x, b.y, b.width, b.height));
        Row {
            index,
            top: self.anchor.y,
            height: self.anchor.height,
            boxes: self.boxes,
        }
    }
}

/// Group boxes into rows ordered top to bottom, each ordered left to right.
pub fn group_rows(boxes: &[BoundingBox], opts: &RowOptions) -> Vec<Row> {
    let mut sorted = boxes.to_vec();
    sorted.sort_by_key(|b| (b.y, b.x, b.width, b.height));

    let mut rows: Vec<Row> = Vec::new();
    let mut current: Option<Band> = None;
    for b in sorted {
        if let Some(band) = current.as_mut().filter(|band| band.admits(&b, opts)) {
            band.boxes.push(b);
            continue;
        }
        if let Some(done) = current.replace(Band::start(b)) {
            rows.push(done.close(rows.len()));
        }
    }
    if let Some(done) = current {
        rows.push(done.close(rows.len()));
    }

    debug!(
        "rows: {} boxes -> {} rows {:?}",
        boxes.len(),
        rows.len(),
        rows.iter().map(Row::len).collect::<Vec<_>>()
    );
    rows
}
