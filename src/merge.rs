//! Box merger: fuses fragments of one logical asset.
//!
//! Two boxes are fused when they share at least `min_overlap_ratio` of the
//! narrower box's width and the vertical gap between them is below
//! `max_vertical_gap_px`. The gap is a fixed pixel count rather than a
//! fraction of box height: a height-relative gap fuses neighbouring grid
//! rows into one blob as soon as the assets are tall. Fusing repeats until
//! no pair qualifies.
use crate::types::BoundingBox;
use log::debug;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeOptions {
    /// Required horizontal overlap as a fraction of the narrower width.
    pub min_overlap_ratio: f32,
    /// Vertical gaps strictly below this many pixels are bridged.
    pub max_vertical_gap_px: i64,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            min_overlap_ratio: 0.5,
            max_vertical_gap_px: 15,
        }
    }
}

impl MergeOptions {
    /// Whether `a` and `b` are fragments of the same asset.
    pub fn should_merge(&self, a: &BoundingBox, b: &BoundingBox) -> bool {
        let overlap = a.horizontal_overlap(b);
        if overlap == 0 {
            return false;
        }
        let narrower = a.width.min(b.width) as f32;
        overlap as f32 >= self.min_overlap_ratio * narrower
            && a.vertical_gap(b) < self.max_vertical_gap_px
    }
}

/// Merge fragment boxes until a fixed point; the result is sorted by `(y, x)`.
pub fn merge_boxes(boxes: &[BoundingBox], opts: &MergeOptions) -> Vec<BoundingBox> {
    let mut current: Vec<BoundingBox> = boxes.to_vec();
    current.sort_by_key(|b| (b.y, b.x, b.width, b.height));

    let mut passes = 0usize;
    loop {
        passes += 1;
        let (next, changed) = merge_pass(current, opts);
        current = next;
        if !changed {
            break;
        }
    }
    current.sort_by_key(|b| (b.y, b.x, b.width, b.height));

    debug!(
        "merge: {} -> {} boxes in {} passes",
        boxes.len(),
        current.len(),
        passes
    );
    current
}

fn merge_pass(mut pending: Vec<BoundingBox>, opts: &MergeOptions) -> (Vec<BoundingBox>, bool) {
    let mut merged = Vec::with_capacity(pending.len());
    let mut changed = false;
    pending.reverse();
    while let Some(mut acc) = pending.pop() {
        // Absorb until `acc` stops growing; a grown box may reach new partners.
        loop {
            let before = pending.len();
            pending.retain(|other| {
                if opts.should_merge(&acc, other) {
                    acc = acc.union(other);
                    false
                } else {
                    true
                }
            });
            if pending.len() == before {
                break;
            }
            changed = true;
        }
        merged.push(acc);
    }
    (merged, changed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stacked_fragments_merge_into_union() {
        let top = BoundingBox::new(10, 10, 40, 30);
        let bottom = BoundingBox::new(15, 45, 30, 10);
        let out = merge_boxes(&[bottom, top], &MergeOptions::default());
        assert_eq!(out, vec![top.union(&bottom)]);
        assert_eq!(out[0], BoundingBox::new(10, 10, 40, 45));
    }

    #[test]
    fn gap_at_threshold_is_not_bridged() {
        let top = BoundingBox::new(0, 0, 50, 50);
        let below = BoundingBox::new(0, 65, 50, 50);
        let out = merge_boxes(&[top, below], &MergeOptions::default());
        assert_eq!(out.len(), 2, "rows must not fuse: {out:?}");
    }

    #[test]
    fn tall_rows_with_small_relative_gap_stay_apart() {
        // A 20% height-relative rule would fuse these 200px-tall rows.
        let a = BoundingBox::new(0, 0, 100, 200);
        let b = BoundingBox::new(0, 230, 100, 200);
        assert_eq!(merge_boxes(&[a, b], &MergeOptions::default()).len(), 2);
    }

    #[test]
    fn side_by_side_boxes_are_not_merged() {
        let a = BoundingBox::new(0, 0, 20, 20);
        let b = BoundingBox::new(30, 0, 20, 20);
        assert_eq!(merge_boxes(&[a, b], &MergeOptions::default()).len(), 2);
    }

    #[test]
    fn weak_horizontal_overlap_is_not_enough() {
        let a = BoundingBox::new(0, 0, 40, 20);
        let b = BoundingBox::new(30, 22, 40, 20);
        assert_eq!(merge_boxes(&[a, b], &MergeOptions::default()).len(), 2);
    }

    #[test]
    fn chains_reach_a_fixed_point() {
        let a = BoundingBox::new(0, 0, 30, 10);
        let b = BoundingBox::new(0, 15, 30, 10);
        let c = BoundingBox::new(0, 30, 30, 10);
        let out = merge_boxes(&[c, a, b], &MergeOptions::default());
        assert_eq!(out, vec![BoundingBox::new(0, 0, 30, 40)]);
    }
}
