use crate::types::BoundingBox;
use image::{DynamicImage, Rgba, RgbaImage};

/// Decoded composite sheet.
///
/// Pixels are always held as RGBA8. `has_alpha` is set only when the decoded
/// file had an alpha channel that actually marks something transparent; an
/// opaque RGBA export is treated like a plain RGB image.
#[derive(Clone, Debug)]
pub struct SourceImage {
    pixels: RgbaImage,
    has_alpha: bool,
}

impl SourceImage {
    pub fn from_dynamic(img: DynamicImage) -> Self {
        let channel_alpha = img.color().has_alpha();
        let pixels = img.into_rgba8();
        let has_alpha = channel_alpha && pixels.pixels().any(|p| p[3] < u8::MAX);
        Self { pixels, has_alpha }
    }

    /// Wrap an RGBA buffer and let the caller decide how alpha is interpreted.
    pub fn from_rgba(pixels: RgbaImage, has_alpha: bool) -> Self {
        Self { pixels, has_alpha }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.pixels.width() as usize
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.pixels.height() as usize
    }

    #[inline]
    pub fn has_alpha(&self) -> bool {
        self.has_alpha
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> Rgba<u8> {
        *self.pixels.get_pixel(x as u32, y as u32)
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Copy of the pixels inside `bbox`, clamped to the image bounds.
    pub fn crop(&self, bbox: BoundingBox) -> RgbaImage {
        let (x, y, w, h) = self.clamp(bbox);
        image::imageops::crop_imm(&self.pixels, x, y, w, h).to_image()
    }

    fn clamp(&self, bbox: BoundingBox) -> (u32, u32, u32, u32) {
        let x = bbox.x.min(self.pixels.width());
        let y = bbox.y.min(self.pixels.height());
        let w = bbox.width.min(self.pixels.width() - x);
        let h = bbox.height.min(self.pixels.height() - y);
        (x, y, w, h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn opaque_rgba_is_treated_as_color_only() {
        let img = RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 255]));
        let source = SourceImage::from_dynamic(DynamicImage::ImageRgba8(img));
        assert!(!source.has_alpha());
    }

    #[test]
    fn transparent_pixels_enable_alpha() {
        let mut img = RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 255]));
        img.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
        let source = SourceImage::from_dynamic(DynamicImage::ImageRgba8(img));
        assert!(source.has_alpha());
    }

    #[test]
    fn rgb_input_has_no_alpha() {
        let img = RgbImage::new(3, 3);
        let source = SourceImage::from_dynamic(DynamicImage::ImageRgb8(img));
        assert!(!source.has_alpha());
        assert_eq!(source.pixel(1, 1), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn crop_is_clamped_to_bounds() {
        let img = RgbaImage::from_pixel(10, 10, Rgba([1, 2, 3, 255]));
        let source = SourceImage::from_rgba(img, false);
        let crop = source.crop(BoundingBox::new(8, 8, 5, 5));
        assert_eq!(crop.dimensions(), (2, 2));
    }
}
