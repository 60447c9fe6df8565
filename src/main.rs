use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use image::{DynamicImage, Rgb};
use imageproc::drawing::draw_hollow_circle_mut;
use log::info;

use graindetect::detection::GrainDetector;
use graindetect::output::{DEFAULT_OUTPUT, validate_output_path, write_csv_file};
use graindetect::pipeline::DEFAULT_TILE_SIZE;
use graindetect::raster::{GeoTiffRaster, RasterSource};
use graindetect::tiling::{manual_window, validate_tile_size};
use graindetect::{BlurMethod, DetectionConfig, Pipeline, Tile};

/// Window edge used by --visualize without --loc
const PREVIEW_SIZE: u32 = 1200;
/// Window edge used by --probe without --loc
const PROBE_SIZE: u32 = 500;
/// Thresholds tried by --probe
const PROBE_THRESHOLDS: std::ops::Range<u8> = 170..230;
const PROBE_STEP: usize = 5;

#[derive(Parser)]
#[command(name = "graindetect")]
#[command(about = "Detect grains in a georeferenced image and write their coordinates to CSV")]
struct Cli {
    /// Path to georeferenced image in .tif format
    #[arg(value_name = "FILE")]
    file_path: PathBuf,

    /// Save a preview of one window with detections marked (random window unless --loc is given)
    #[arg(long)]
    visualize: bool,

    /// Report detection counts for a range of thresholds on one window
    #[arg(short, long)]
    probe: bool,

    /// Upper left corner and size of the window used by --visualize and --probe
    #[arg(long = "loc", num_args = 3, value_names = ["X", "Y", "SIZE"])]
    location: Option<Vec<u32>>,

    /// Do not run the full detection or write a result file
    #[arg(short = 's', long = "suppress", visible_alias = "surpress")]
    suppress: bool,

    /// Threshold between [0, 255]; pixels darker than this are grains
    #[arg(short, long, default_value_t = DetectionConfig::DEFAULT_THRESHOLD as i64, allow_negative_numbers = true)]
    threshold: i64,

    /// Either 'none', 'average', 'gaussian', 'median' or 'bilateral'
    #[arg(long, default_value = "none")]
    blurmethod: String,

    /// Blur parameters, e.g. "(5,5)" for average, "[(3,3),0]" for gaussian, "5" for median, "(9,75,75)" for bilateral
    #[arg(long)]
    blurformat: Option<String>,

    /// Trim outliers with |z| > 3 (1 = on, 0 = off)
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(0..=1))]
    trim1: u8,

    /// Trim again with |z| > 2 after the first pass (1 = on, 0 = off)
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(0..=1))]
    trim2: u8,

    /// Edge length of the image slices loaded into memory at once
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE)]
    slicingsize: u32,

    /// Path to output file in csv format
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Keep a tile's detection even when it is the only one
    #[arg(long)]
    keep_single: bool,

    /// Worker threads (defaults to the number of CPUs)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Where --visualize saves its preview
    #[arg(long, default_value = "preview.png")]
    preview: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let _logger = graindetect::logging::setup_logging(args.verbose)?;

    let config = DetectionConfig::new(DetectionConfig::threshold_from(args.threshold)?)
        .with_blur(BlurMethod::parse(&args.blurmethod, args.blurformat.as_deref())?)
        .with_trim(args.trim1 == 1, args.trim2 == 1)
        .with_single_blob_suppression(!args.keep_single);
    let tile_size = validate_tile_size(args.slicingsize)?;
    validate_output_path(&args.output)?;

    if let Some(jobs) = args.jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs.max(1))
            .build_global()
            .context("Failed to configure worker threads")?;
    }

    info!("Loading image: {}", args.file_path.display());
    let raster = GeoTiffRaster::open(&args.file_path)?;
    info!("Image loaded: {}x{}", raster.width(), raster.height());

    let mut suppress = args.suppress;

    if args.visualize {
        suppress = true;
        let window = pick_window(&raster, args.location.as_deref(), PREVIEW_SIZE)?;
        save_preview(&raster, &window, &config, &args.preview)?;
    }

    if args.probe {
        suppress = true;
        let window = pick_window(&raster, args.location.as_deref(), PROBE_SIZE)?;
        probe_thresholds(&raster, &window, &config)?;
    }

    if suppress {
        println!("The program has terminated.");
        return Ok(());
    }

    let pipeline = Pipeline::new(config).with_tile_size(tile_size);
    let results = pipeline.run(&raster)?;

    write_csv_file(&args.output, results.points())
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    println!(
        "Wrote {} grain coordinate(s) to {}",
        results.len(),
        args.output.display()
    );
    println!("The program has terminated.");

    Ok(())
}

/// The `--loc` window, or a random window of `default_size` that fits the raster
fn pick_window(raster: &GeoTiffRaster, location: Option<&[u32]>, default_size: u32) -> anyhow::Result<Tile> {
    if let Some(&[x, y, size]) = location {
        return Ok(manual_window(x, y, size, raster.width(), raster.height())?);
    }
    let size = default_size.min(raster.width()).min(raster.height());
    let x = rand::random_range(0..=raster.width() - size);
    let y = rand::random_range(0..=raster.height() - size);
    Ok(manual_window(x, y, size, raster.width(), raster.height())?)
}

fn save_preview(
    raster: &GeoTiffRaster,
    window: &Tile,
    config: &DetectionConfig,
    path: &Path,
) -> anyhow::Result<()> {
    let pixels = raster.read_tile(window)?;
    let detection = GrainDetector::new(*config).detect(&pixels);

    let mut canvas = match pixels.to_rgb_image() {
        Some(rgb) => rgb,
        None => DynamicImage::ImageLuma8(pixels.first_band_image()).to_rgb8(),
    };
    for blob in &detection.blobs {
        draw_hollow_circle_mut(&mut canvas, (blob.cx as i32, blob.cy as i32), 3, Rgb([0, 255, 255]));
    }
    canvas
        .save(path)
        .map_err(|e| anyhow::anyhow!("Failed to save preview: {}", e))?;

    println!(
        "Preview of window ({}, {}) {}x{} with {} detection(s) saved to {}",
        window.x,
        window.y,
        window.width,
        window.height,
        detection.len(),
        path.display()
    );
    Ok(())
}

fn probe_thresholds(raster: &GeoTiffRaster, window: &Tile, config: &DetectionConfig) -> anyhow::Result<()> {
    let pixels = raster.read_tile(window)?;
    println!(
        "\n=== Threshold probe on window ({}, {}) {}x{} ===",
        window.x, window.y, window.width, window.height
    );
    for threshold in PROBE_THRESHOLDS.step_by(PROBE_STEP) {
        let detector = GrainDetector::new(DetectionConfig { threshold, ..*config });
        let detection = detector.detect(&pixels);
        println!("  Threshold = {:3}: {} grain(s)", threshold, detection.len());
    }
    Ok(())
}
