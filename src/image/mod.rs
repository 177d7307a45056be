//! Image containers used across the pipeline.
//!
//! - [`SourceImage`]: the decoded sheet, stored as RGBA8 with a flag telling
//!   whether the alpha channel carries real transparency.
//! - [`OccupancyMask`]: binary foreground grid with the same dimensions.
//! - [`io`]: decode/encode and JSON helpers.

pub mod io;
pub mod mask;
pub mod source;
pub mod traits;

pub use self::mask::OccupancyMask;
pub use self::source::SourceImage;
pub use self::traits::{ImageView, ImageViewMut, Rows};
