//! Binary morphology with square structuring elements.
//!
//! A `(2r+1)×(2r+1)` square is separable, so erosion and dilation run as a
//! horizontal pass followed by a vertical pass. Each pass is a sliding
//! window over prefix counts, linear in the number of pixels regardless of
//! the radius. Pixels outside the grid are neutral: they never turn a
//! pixel on during dilation and never turn it off during erosion.
use crate::image::OccupancyMask;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Op {
    Erode,
    Dilate,
}

pub fn erode(mask: &OccupancyMask, radius: usize) -> OccupancyMask {
    separable(mask, radius, Op::Erode)
}

pub fn dilate(mask: &OccupancyMask, radius: usize) -> OccupancyMask {
    separable(mask, radius, Op::Dilate)
}

/// Erosion then dilation: deletes specks smaller than the element.
pub fn open(mask: &OccupancyMask, radius: usize) -> OccupancyMask {
    if radius == 0 {
        return mask.clone();
    }
    dilate(&erode(mask, radius), radius)
}

/// Dilation then erosion: reseals gaps narrower than the element.
pub fn close(mask: &OccupancyMask, radius: usize) -> OccupancyMask {
    if radius == 0 {
        return mask.clone();
    }
    erode(&dilate(mask, radius), radius)
}

fn separable(mask: &OccupancyMask, radius: usize, op: Op) -> OccupancyMask {
    if radius == 0 || mask.data.is_empty() {
        return mask.clone();
    }
    let (w, h) = (mask.w, mask.h);
    let mut tmp = OccupancyMask::new(w, h);
    let mut line = Vec::with_capacity(w.max(h));
    let mut out_line = Vec::with_capacity(w.max(h));

    for y in 0..h {
        line.clear();
        line.extend_from_slice(&mask.data[y * w..(y + 1) * w]);
        window_pass(&line, &mut out_line, radius, op);
        tmp.data[y * w..(y + 1) * w].copy_from_slice(&out_line);
    }

    let mut out = OccupancyMask::new(w, h);
    for x in 0..w {
        line.clear();
        line.extend((0..h).map(|y| tmp.data[y * w + x]));
        window_pass(&line, &mut out_line, radius, op);
        for (y, &v) in out_line.iter().enumerate() {
            out.data[y * w + x] = v;
        }
    }
    out
}

fn window_pass(input: &[bool], output: &mut Vec<bool>, radius: usize, op: Op) {
    let n = input.len();
    // prefix[i] = number of set pixels in input[..i]
    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0usize);
    for &v in input {
        let last = prefix[prefix.len() - 1];
        prefix.push(last + v as usize);
    }
    output.clear();
    output.extend((0..n).map(|i| {
        let lo = i.saturating_sub(radius);
        let hi = (i + radius + 1).min(n);
        let set = prefix[hi] - prefix[lo];
        match op {
            Op::Erode => set == hi - lo,
            Op::Dilate => set > 0,
        }
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{ImageView, ImageViewMut};

    fn mask_with(w: usize, h: usize, on: &[(usize, usize)]) -> OccupancyMask {
        let mut m = OccupancyMask::new(w, h);
        for &(x, y) in on {
            m.set(x, y, true);
        }
        m
    }

    fn fill_rect(m: &mut OccupancyMask, x0: usize, y0: usize, w: usize, h: usize) {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                m.set(x, y, true);
            }
        }
    }

    #[test]
    fn open_removes_isolated_pixels() {
        let m = mask_with(9, 9, &[(4, 4), (1, 7)]);
        assert_eq!(open(&m, 1).count(), 0);
    }

    #[test]
    fn open_preserves_solid_rectangles() {
        let mut m = OccupancyMask::new(20, 20);
        fill_rect(&mut m, 5, 5, 6, 4);
        let opened = open(&m, 1);
        assert_eq!(opened, m);
    }

    #[test]
    fn rectangles_touching_the_border_survive_erosion() {
        let mut m = OccupancyMask::new(10, 10);
        fill_rect(&mut m, 0, 0, 4, 4);
        let opened = open(&m, 1);
        assert!(opened.get(0, 0));
        assert_eq!(opened.count(), 16);
    }

    #[test]
    fn close_fills_single_pixel_gap() {
        let mut m = OccupancyMask::new(20, 10);
        fill_rect(&mut m, 2, 2, 5, 5);
        fill_rect(&mut m, 8, 2, 5, 5);
        assert!(!m.get(7, 4));
        let closed = close(&m, 1);
        assert!(closed.get(7, 4));
    }

    #[test]
    fn dilation_grows_by_radius() {
        let m = mask_with(9, 9, &[(4, 4)]);
        let d = dilate(&m, 2);
        assert_eq!(d.count(), 25);
        assert!(d.get(2, 2) && d.get(6, 6));
        assert!(!d.get(1, 4));
    }
}
