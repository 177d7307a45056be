//! Owned binary occupancy grid in row-major layout.
//!
//! `true` marks foreground ("ink") pixels. The mask always has the same
//! dimensions as the source image it was built from.
use super::traits::{ImageView, ImageViewMut};
use image::{GrayImage, Luma};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OccupancyMask {
    /// Mask width in pixels
    pub w: usize,
    /// Mask height in pixels
    pub h: usize,
    /// Backing storage in row-major order
    pub data: Vec<bool>,
}

impl OccupancyMask {
    /// All-background mask of size `w × h`.
    pub fn new(w: usize, h: usize) -> Self {
        Self {
            w,
            h,
            data: vec![false; w * h],
        }
    }

    #[inline]
    pub fn idx(&self, x: usize, y: usize) -> usize {
        y * self.w + x
    }

    /// Number of foreground pixels.
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    /// Fraction of the grid marked foreground.
    pub fn coverage(&self) -> f32 {
        if self.data.is_empty() {
            0.0
        } else {
            self.count() as f32 / self.data.len() as f32
        }
    }

    /// Alpha value for a pixel: 255 for foreground, 0 otherwise.
    #[inline]
    pub fn alpha(&self, x: usize, y: usize) -> u8 {
        if self.get(x, y) {
            255
        } else {
            0
        }
    }

    /// Render the mask as an 8-bit image (255 foreground, 0 background).
    pub fn to_gray(&self) -> GrayImage {
        GrayImage::from_fn(self.w as u32, self.h as u32, |x, y| {
            Luma([self.alpha(x as usize, y as usize)])
        })
    }
}

impl ImageView for OccupancyMask {
    type Pixel = bool;

    #[inline]
    fn width(&self) -> usize {
        self.w
    }
    #[inline]
    fn height(&self) -> usize {
        self.h
    }
    #[inline]
    fn row(&self, y: usize) -> &[bool] {
        let start = y * self.w;
        &self.data[start..start + self.w]
    }
}

impl ImageViewMut for OccupancyMask {
    #[inline]
    fn row_mut(&mut self, y: usize) -> &mut [bool] {
        let start = y * self.w;
        &mut self.data[start..start + self.w]
    }
}
