//! JSON configuration for the command-line tools.
//!
//! Every tunable has a default, so a config only needs the paths it is
//! about: inputs, manifests and output roots.

pub mod extract;
pub mod mask_debug;

use crate::error::{Result, SlicerError};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

/// Read and parse a JSON config file.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = fs::read_to_string(path).map_err(|e| SlicerError::io(path, e))?;
    serde_json::from_str(&data).map_err(|e| SlicerError::Config {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
