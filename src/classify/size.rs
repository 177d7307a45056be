//! Size stage of the classifier fallback chain.
//!
//! Boxes are ranked by pixel area. When a row holds more boxes than the
//! manifest expects, the smallest ones are set aside, but only if a clear
//! step in area separates them from the rest. The kept boxes are then
//! matched rank to rank against entries ordered by `relative_size`, or
//! left to right when the row declares no sizes. Runs of boxes whose areas
//! are too close to order stay open for the text stage, restricted to the
//! entries of their rank range.
use crate::manifest::ManifestRow;
use crate::types::{Assignment, UnmappedReason};

/// A box the size stage could not place.
#[derive(Clone, Debug, PartialEq)]
pub struct OpenBox {
    pub column: usize,
    /// Entry indices the box may still take; empty when none apply.
    pub candidates: Vec<usize>,
    pub reason: UnmappedReason,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SizeMatch {
    /// `(column, entry index, method)`
    pub pairs: Vec<(usize, usize, Assignment)>,
    pub open: Vec<OpenBox>,
}

#[inline]
fn clearly_larger(a: u64, b: u64, separation: f32) -> bool {
    a as f64 >= b as f64 * separation as f64 && a > b
}

/// Match a row's boxes (given by area, in column order) against `row`.
pub fn rank_by_size(areas: &[u64], row: &ManifestRow, separation: f32) -> SizeMatch {
    let n = areas.len();
    let m = row.entries.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| areas[b].cmp(&areas[a]).then(a.cmp(&b)));

    let all_entries: Vec<usize> = (0..m).collect();
    let open_all = |cols: &[usize], reason| SizeMatch {
        pairs: Vec::new(),
        open: cols
            .iter()
            .map(|&column| OpenBox {
                column,
                candidates: all_entries.clone(),
                reason,
            })
            .collect(),
    };

    if m == 0 {
        let mut out = open_all(&order, UnmappedReason::SurplusBox);
        out.open.iter_mut().for_each(|o| o.candidates.clear());
        return out;
    }
    if n < m {
        return open_all(&order, UnmappedReason::AmbiguousSize);
    }

    let mut result = SizeMatch::default();
    let kept: Vec<usize> = if n > m {
        let (last_kept, first_dropped) = (areas[order[m - 1]], areas[order[m]]);
        if !clearly_larger(last_kept, first_dropped, separation) {
            return open_all(&order, UnmappedReason::AmbiguousSize);
        }
        result.open.extend(order[m..].iter().map(|&column| OpenBox {
            column,
            candidates: Vec::new(),
            reason: UnmappedReason::SurplusBox,
        }));
        order[..m].to_vec()
    } else {
        order
    };

    match row.size_ranking() {
        Some(ranking) => {
            let mut start = 0;
            while start < kept.len() {
                let mut end = start + 1;
                while end < kept.len()
                    && !clearly_larger(areas[kept[end - 1]], areas[kept[end]], separation)
                {
                    end += 1;
                }
                if end - start == 1 {
                    result
                        .pairs
                        .push((kept[start], ranking[start], Assignment::SizeRank));
                } else {
                    let candidates = ranking[start..end].to_vec();
                    result.open.extend(kept[start..end].iter().map(|&column| OpenBox {
                        column,
                        candidates: candidates.clone(),
                        reason: UnmappedReason::AmbiguousSize,
                    }));
                }
                start = end;
            }
        }
        None => {
            let mut by_column = kept;
            by_column.sort_unstable();
            // Surplus removal selected the boxes; their order is positional.
            let method = if n > m {
                Assignment::SizeRank
            } else {
                Assignment::Positional
            };
            result.pairs.extend(
                by_column
                    .into_iter()
                    .enumerate()
                    .map(|(entry, column)| (column, entry, method.clone())),
            );
        }
    }
    result.open.sort_by_key(|o| o.column);
    result
}
