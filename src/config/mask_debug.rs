use super::load_json;
use crate::error::Result;
use crate::extractor::ExtractorParams;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config of the `mask_debug` tool.
#[derive(Debug, Deserialize)]
pub struct MaskDebugConfig {
    pub input: PathBuf,
    #[serde(default)]
    pub params: ExtractorParams,
    pub output: MaskDebugOutput,
}

#[derive(Debug, Deserialize)]
pub struct MaskDebugOutput {
    pub mask_image: PathBuf,
    pub regions_json: PathBuf,
}

pub fn load_config(path: &Path) -> Result<MaskDebugConfig> {
    load_json(path)
}
