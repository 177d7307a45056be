use clap::{Parser, Subcommand};
use sheet_slicer::config::extract::load_config;
use sheet_slicer::image::io::load_source_image;
use sheet_slicer::manifest::{load_manifest, Manifest};
use sheet_slicer::{run_extract, ExtractorParams, Result, SheetExtractor};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "sheet_slicer")]
#[command(about = "Cut composite asset sheets into individual files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and export assets as described by a config file
    Extract {
        /// Path to the JSON tool config
        config: PathBuf,
    },

    /// Detect and print rows and boxes without writing anything
    Analyze {
        /// Sheet image (PNG, JPEG or WebP)
        image: PathBuf,

        /// Manifest to classify against
        #[arg(short, long)]
        manifest: Option<PathBuf>,

        /// Minimum region area in pixels
        #[arg(long)]
        min_area: Option<u64>,
    },
}

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Extract { config } => extract(&config),
        Commands::Analyze {
            image,
            manifest,
            min_area,
        } => analyze(&image, manifest.as_deref(), min_area),
    }
}

fn extract(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let outcomes = run_extract(&config);

    for outcome in &outcomes {
        let input = outcome.input.display();
        if let Some(summary) = &outcome.summary {
            println!("{input}: {}", summary.headline());
            for warning in &summary.warnings {
                println!("  warning: {warning}");
            }
            for failure in summary.exports.iter().flat_map(|e| &e.failures) {
                eprintln!("{input}: {}: {}", failure.path.display(), failure.message);
            }
        }
        for err in &outcome.errors {
            eprintln!("{input}: {err}");
        }
    }

    let failed = outcomes.iter().filter(|o| !o.is_clean()).count();
    if failed > 0 {
        eprintln!("{failed} of {} sheets had failures", outcomes.len());
        std::process::exit(2);
    }
    Ok(())
}

fn analyze(image: &Path, manifest: Option<&Path>, min_area: Option<u64>) -> Result<()> {
    let source = load_source_image(image)?;
    let manifest = match manifest {
        Some(path) => load_manifest(path)?,
        None => Manifest::default(),
    };
    let mut params = ExtractorParams::default();
    if let Some(min_area) = min_area {
        params.regions.min_area = min_area;
    }

    let report = SheetExtractor::new(params).process(&source, &manifest);
    let summary = &report.summary;
    println!(
        "{} ({}x{}, alpha={}): {} regions ({} discarded), {} after merge",
        image.display(),
        summary.input.width,
        summary.input.height,
        summary.input.has_alpha,
        summary.regions.detected,
        summary.regions.discarded,
        summary.regions.merged
    );
    for row in &report.rows {
        println!("row {} (y={} h={}): {} boxes", row.index, row.top, row.height, row.len());
        for (col, b) in row.boxes.iter().enumerate() {
            let name = summary
                .records
                .iter()
                .find(|r| r.row == row.index && r.column == col)
                .map(|r| r.entry.relative_path().display().to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  [{col}] x={} y={} w={} h={} area={}  {name}",
                b.x,
                b.y,
                b.width,
                b.height,
                b.area()
            );
        }
    }
    for warning in &summary.warnings {
        println!("warning: {warning}");
    }
    Ok(())
}
