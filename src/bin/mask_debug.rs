use serde::Serialize;
use sheet_slicer::background::{estimate_background, BackgroundSignature};
use sheet_slicer::config::mask_debug::load_config;
use sheet_slicer::image::io::{load_source_image, save_mask, write_json_file};
use sheet_slicer::mask::build_mask;
use sheet_slicer::merge::merge_boxes;
use sheet_slicer::regions::detect_regions;
use sheet_slicer::rows::group_rows;
use sheet_slicer::types::{Region, Row};
use sheet_slicer::{BoundingBox, Result};
use std::env;
use std::path::Path;

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let Some(config_path) = env::args().nth(1) else {
        eprintln!("{}", usage());
        std::process::exit(1);
    };
    let config = load_config(Path::new(&config_path))?;
    let params = &config.params;

    let source = load_source_image(&config.input)?;
    let background = estimate_background(&source, &params.background);
    let mask = build_mask(&source, &background, &params.mask);
    let detection = detect_regions(&mask, &params.regions);
    let merged = merge_boxes(&detection.boxes(), &params.merge);
    let rows = group_rows(&merged, &params.rows);

    let summary = MaskDebugSummary {
        width: mask.w,
        height: mask.h,
        background,
        coverage: mask.coverage(),
        discarded: detection.discarded,
        region_count: detection.regions.len(),
        regions: detection.regions,
        merged,
        rows,
    };

    save_mask(&mask, &config.output.mask_image)?;
    write_json_file(&config.output.regions_json, &summary)?;

    println!(
        "Saved mask to {} ({:.1}% foreground)",
        config.output.mask_image.display(),
        summary.coverage * 100.0
    );
    println!(
        "Saved {} regions ({} after merge, {} rows) to {}",
        summary.region_count,
        summary.merged.len(),
        summary.rows.len(),
        config.output.regions_json.display()
    );
    Ok(())
}

fn usage() -> String {
    "Usage: mask_debug <config.json>".to_string()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MaskDebugSummary {
    width: usize,
    height: usize,
    background: BackgroundSignature,
    coverage: f32,
    discarded: usize,
    region_count: usize,
    regions: Vec<Region>,
    merged: Vec<BoundingBox>,
    rows: Vec<Row>,
}
