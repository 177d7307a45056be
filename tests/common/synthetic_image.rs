use image::{Rgba, RgbaImage};
use sheet_slicer::image::SourceImage;
use sheet_slicer::BoundingBox;

pub const WHITE: [u8; 4] = [255, 255, 255, 255];
pub const TRANSPARENT: [u8; 4] = [0, 0, 0, 0];

/// Textured fill that stays far from both white and full transparency.
pub fn texture(x: u32, y: u32) -> Rgba<u8> {
    Rgba([
        (x * 7 % 180) as u8 + 10,
        (y * 5 % 180) as u8 + 10,
        ((x + y) % 120) as u8 + 40,
        255,
    ])
}

fn paint_boxes(img: &mut RgbaImage, boxes: &[BoundingBox]) {
    for b in boxes {
        assert!(b.right() <= img.width() && b.bottom() <= img.height(), "box {b:?} outside image");
        for y in b.y..b.bottom() {
            for x in b.x..b.right() {
                img.put_pixel(x, y, texture(x, y));
            }
        }
    }
}

/// Paints textured rectangles on a uniform background.
pub fn sheet_with_boxes(width: u32, height: u32, background: [u8; 4], boxes: &[BoundingBox]) -> RgbaImage {
    assert!(width > 0 && height > 0, "image dimensions must be positive");
    let mut img = RgbaImage::from_pixel(width, height, Rgba(background));
    paint_boxes(&mut img, boxes);
    img
}

/// Opaque sheet whose background is a grey/white checkerboard, the way
/// editors flatten transparency on export.
pub fn checkered_sheet(width: u32, height: u32, cell: u32, boxes: &[BoundingBox]) -> SourceImage {
    let mut img = RgbaImage::from_fn(width, height, |x, y| {
        let v = if (x / cell + y / cell) % 2 == 0 { 255 } else { 220 };
        Rgba([v, v, v, 255])
    });
    paint_boxes(&mut img, boxes);
    SourceImage::from_rgba(img, false)
}

/// Opaque sheet on a left-to-right black-to-white gradient.
pub fn gradient_sheet(width: u32, height: u32, boxes: &[BoundingBox]) -> SourceImage {
    let mut img = RgbaImage::from_fn(width, height, |x, _| {
        let v = (x * 255 / (width - 1).max(1)) as u8;
        Rgba([v, v, v, 255])
    });
    paint_boxes(&mut img, boxes);
    SourceImage::from_rgba(img, false)
}

/// Opaque white sheet wrapped as a pipeline input.
pub fn opaque_sheet(width: u32, height: u32, boxes: &[BoundingBox]) -> SourceImage {
    SourceImage::from_rgba(sheet_with_boxes(width, height, WHITE, boxes), false)
}

/// `count` squares of side `size` in a row starting at (`x0`, `y`).
pub fn row_of_squares(count: u32, size: u32, x0: u32, y: u32, gap: u32) -> Vec<BoundingBox> {
    (0..count)
        .map(|i| BoundingBox::new(x0 + i * (size + gap), y, size, size))
        .collect()
}
