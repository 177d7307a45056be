//! I/O helpers for sheets, crops and JSON.
//!
//! - `load_source_image`: decode a PNG/JPEG/WebP sheet into a [`SourceImage`].
//! - `save_rgba`: write an RGBA crop; the format follows the file extension.
//! - `save_mask`: write an [`OccupancyMask`] as a black/white PNG.
//! - `write_json_file`: pretty-print a serializable value to disk.
use super::{OccupancyMask, SourceImage};
use crate::error::{Result, SlicerError};
use image::RgbaImage;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Decode an image file from disk.
pub fn load_source_image(path: &Path) -> Result<SourceImage> {
    let img = image::open(path).map_err(|source| SlicerError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(SourceImage::from_dynamic(img))
}

/// Save an RGBA buffer, creating parent directories. Returns the file size.
pub fn save_rgba(image: &RgbaImage, path: &Path) -> Result<u64> {
    ensure_parent_dir(path)?;
    image.save(path).map_err(|source| SlicerError::Encode {
        path: path.to_path_buf(),
        source,
    })?;
    let meta = fs::metadata(path).map_err(|e| SlicerError::io(path, e))?;
    Ok(meta.len())
}

/// Save a mask as an 8-bit PNG (foreground white).
pub fn save_mask(mask: &OccupancyMask, path: &Path) -> Result<()> {
    ensure_parent_dir(path)?;
    mask.to_gray()
        .save(path)
        .map_err(|source| SlicerError::Encode {
            path: path.to_path_buf(),
            source,
        })
}

/// Serialize a value as pretty JSON to `path`, creating parent directories.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    ensure_parent_dir(path)?;
    let json = serde_json::to_string_pretty(value).map_err(|e| SlicerError::Config {
        path: path.to_path_buf(),
        message: format!("failed to serialize JSON: {e}"),
    })?;
    fs::write(path, json).map_err(|e| SlicerError::io(path, e))
}

pub(crate) fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| SlicerError::io(parent, e))?;
        }
    }
    Ok(())
}
