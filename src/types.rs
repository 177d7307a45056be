use crate::manifest::ManifestEntry;
use serde::{Deserialize, Serialize};

/// Axis-aligned box in source-image pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        debug_assert!(width > 0 && height > 0, "degenerate box {width}x{height}");
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge.
    #[inline]
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    #[inline]
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    #[inline]
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Smallest box containing both `self` and `other`.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = self.right().max(other.right());
        let y1 = self.bottom().max(other.bottom());
        BoundingBox::new(x0, y0, x1 - x0, y1 - y0)
    }

    /// Length of the shared x-interval, zero when disjoint.
    pub fn horizontal_overlap(&self, other: &BoundingBox) -> u32 {
        let lo = self.x.max(other.x);
        let hi = self.right().min(other.right());
        hi.saturating_sub(lo)
    }

    /// Length of the shared y-interval, zero when disjoint.
    pub fn vertical_overlap(&self, other: &BoundingBox) -> u32 {
        let lo = self.y.max(other.y);
        let hi = self.bottom().min(other.bottom());
        hi.saturating_sub(lo)
    }

    /// Signed distance between the facing horizontal edges.
    ///
    /// Positive when the boxes are vertically separated, zero when they
    /// touch and negative when their y-intervals overlap.
    pub fn vertical_gap(&self, other: &BoundingBox) -> i64 {
        let (upper, lower) = if self.y <= other.y {
            (self, other)
        } else {
            (other, self)
        };
        lower.y as i64 - upper.bottom() as i64
    }
}

/// Connected mask component reduced to its box and pixel count.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    pub bbox: BoundingBox,
    pub pixel_area: u64,
}

/// Boxes sharing a vertical band, ordered left to right.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    pub index: usize,
    pub top: u32,
    pub height: u32,
    pub boxes: Vec<BoundingBox>,
}

impl Row {
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }
}

/// How a box obtained its manifest identity.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "method")]
pub enum Assignment {
    Positional,
    SizeRank,
    TextAssisted { confidence: f32, text: String },
}

/// A detected box paired with its destination.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
    pub bbox: BoundingBox,
    pub area: u64,
    pub row: usize,
    pub column: usize,
    pub entry: ManifestEntry,
    pub assignment: Assignment,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnmappedReason {
    /// The manifest declares fewer rows than were detected.
    NoManifestRow,
    /// More boxes than entries and the box was among the smallest.
    SurplusBox,
    /// Size ranking could not separate this box from its neighbours.
    AmbiguousSize,
    /// Caption recognition did not single out an entry.
    TextUnresolved,
}

/// A box that could not be assigned, kept for manual manifest correction.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmappedBox {
    pub row: usize,
    pub column: usize,
    pub bbox: BoundingBox,
    pub area: u64,
    pub reason: UnmappedReason,
}

/// A box of a row the manifest marks as ignored (captions, decoration).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IgnoredBox {
    pub row: usize,
    pub column: usize,
    pub bbox: BoundingBox,
    pub area: u64,
}

/// A manifest entry that received no box.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingEntry {
    pub row: usize,
    pub entry: ManifestEntry,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_covers_both_boxes() {
        let a = BoundingBox::new(10, 10, 5, 5);
        let b = BoundingBox::new(12, 20, 10, 2);
        assert_eq!(a.union(&b), BoundingBox::new(10, 10, 12, 12));
    }

    #[test]
    fn vertical_gap_is_symmetric_and_signed() {
        let a = BoundingBox::new(0, 0, 10, 10);
        let b = BoundingBox::new(0, 14, 10, 10);
        assert_eq!(a.vertical_gap(&b), 4);
        assert_eq!(b.vertical_gap(&a), 4);
        let c = BoundingBox::new(0, 5, 10, 10);
        assert_eq!(a.vertical_gap(&c), -5);
    }

    #[test]
    fn overlap_of_disjoint_boxes_is_zero() {
        let a = BoundingBox::new(0, 0, 10, 10);
        let b = BoundingBox::new(20, 0, 10, 10);
        assert_eq!(a.horizontal_overlap(&b), 0);
        assert_eq!(a.vertical_overlap(&b), 10);
    }
}
