//! Region detector: connected components of the occupancy mask.
//!
//! Components are grown with an explicit stack over the 8-neighbourhood, so
//! only outer shapes are found; holes inside a shape are background pixels
//! and never seed a region of their own. Each component is reduced to its
//! bounding box and pixel count, then filtered by minimum area and height to
//! drop anti-aliasing speckle and shadow fragments.
use crate::image::OccupancyMask;
use crate::types::{BoundingBox, Region};
use log::debug;
use serde::{Deserialize, Serialize};

pub(crate) const NEIGH_OFFSETS: [(isize, isize); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionOptions {
    /// Components with fewer foreground pixels are discarded.
    pub min_area: u64,
    /// Components whose box is shorter than this are discarded.
    pub min_height: u32,
}

impl Default for RegionOptions {
    fn default() -> Self {
        Self {
            min_area: 500,
            min_height: 1,
        }
    }
}

/// Coarse verdict on the number of regions found.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RegionStatus {
    /// Nothing survived; usually a background-signature mismatch.
    Empty,
    /// Fewer regions than the manifest asks for; likely a tolerance problem.
    Sparse,
    Ok,
}

impl RegionStatus {
    pub fn classify(found: usize, expected: usize) -> Self {
        if found == 0 {
            RegionStatus::Empty
        } else if found < expected {
            RegionStatus::Sparse
        } else {
            RegionStatus::Ok
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionDetection {
    /// Surviving regions in discovery (raster) order.
    pub regions: Vec<Region>,
    /// Components rejected by the size filters.
    pub discarded: usize,
}

impl RegionDetection {
    pub fn boxes(&self) -> Vec<BoundingBox> {
        self.regions.iter().map(|r| r.bbox).collect()
    }
}

/// Find connected foreground components in `mask`.
pub fn detect_regions(mask: &OccupancyMask, opts: &RegionOptions) -> RegionDetection {
    let (w, h) = (mask.w, mask.h);
    let mut visited = vec![false; w * h];
    let mut stack: Vec<usize> = Vec::new();
    let mut regions = Vec::new();
    let mut discarded = 0usize;

    for seed in 0..w * h {
        if !mask.data[seed] || visited[seed] {
            continue;
        }
        visited[seed] = true;
        stack.push(seed);

        let (mut x0, mut y0) = (usize::MAX, usize::MAX);
        let (mut x1, mut y1) = (0usize, 0usize);
        let mut area = 0u64;

        while let Some(i) = stack.pop() {
            let (x, y) = (i % w, i / w);
            area += 1;
            x0 = x0.min(x);
            y0 = y0.min(y);
            x1 = x1.max(x);
            y1 = y1.max(y);
            for (dx, dy) in NEIGH_OFFSETS {
                let nx = x as isize + dx;
                let ny = y as isize + dy;
                if nx < 0 || ny < 0 || nx >= w as isize || ny >= h as isize {
                    continue;
                }
                let j = ny as usize * w + nx as usize;
                if mask.data[j] && !visited[j] {
                    visited[j] = true;
                    stack.push(j);
                }
            }
        }

        let bbox = BoundingBox::new(
            x0 as u32,
            y0 as u32,
            (x1 - x0 + 1) as u32,
            (y1 - y0 + 1) as u32,
        );
        if area < opts.min_area || bbox.height < opts.min_height {
            discarded += 1;
            continue;
        }
        regions.push(Region {
            bbox,
            pixel_area: area,
        });
    }

    debug!(
        "regions: kept={} discarded={} (min_area={} min_height={})",
        regions.len(),
        discarded,
        opts.min_area,
        opts.min_height
    );

    RegionDetection { regions, discarded }
}
