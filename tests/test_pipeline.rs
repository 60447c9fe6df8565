mod common;

use common::*;
use graindetect::output::{CSV_HEADER, write_csv_file};
use graindetect::pipeline::TileOutput;

fn config() -> DetectionConfig {
    DetectionConfig::new(THRESHOLD).with_trim(true, true)
}

fn expected_points(centers: &[(u32, u32)], transform: &AffineTransform) -> Vec<GeoPoint> {
    centers
        .iter()
        .map(|&(x, y)| transform.apply(x as f64, y as f64))
        .collect()
}

#[test]
fn test_ten_disks_on_two_by_two_grid() -> anyhow::Result<()> {
    let raster = disk_raster(2000, 2000, &SCENARIO_A_CENTERS, 5, TEST_TRANSFORM);
    let pipeline = Pipeline::new(config()).with_tile_size(1500);

    let results = pipeline.run(&raster)?;

    assert_eq!(results.tiles_processed(), 4);
    assert_eq!(results.len(), 10);
    assert_eq!(results.degenerate_contours(), 0);
    assert_eq!(results.suppressed_tiles(), 0);
    let expected = expected_points(&SCENARIO_A_CENTERS, &TEST_TRANSFORM);
    assert!(matches_all(results.points(), &expected, 0.51));
    Ok(())
}

#[test]
fn test_empty_raster_writes_header_only() -> anyhow::Result<()> {
    let raster = disk_raster(2000, 2000, &[], 5, TEST_TRANSFORM);
    let results = Pipeline::new(config()).with_tile_size(1500).run(&raster)?;
    assert!(results.is_empty());
    assert_eq!(results.tiles_processed(), 4);

    let dir = tempfile::TempDir::new()?;
    let path = dir.path().join("grains.csv");
    write_csv_file(&path, results.points())?;
    let text = std::fs::read_to_string(&path)?;
    assert_eq!(text.lines().collect::<Vec<_>>(), vec![CSV_HEADER]);
    Ok(())
}

#[test]
fn test_single_blob_tile_yields_nothing() -> anyhow::Result<()> {
    let raster = disk_raster(400, 400, &[(200, 200)], 6, TEST_TRANSFORM);

    let results = Pipeline::new(config()).with_tile_size(400).run(&raster)?;
    assert!(results.is_empty());
    assert_eq!(results.suppressed_tiles(), 1);

    let kept = Pipeline::new(config().with_single_blob_suppression(false))
        .with_tile_size(400)
        .run(&raster)?;
    assert_eq!(kept.len(), 1);
    let expected = expected_points(&[(200, 200)], &TEST_TRANSFORM);
    assert!(matches_all(kept.points(), &expected, 0.51));
    Ok(())
}

#[test]
fn test_single_blob_suppression_is_per_tile() -> anyhow::Result<()> {
    // Left tile holds one disk, right tile three
    let centers = [(50, 100), (250, 50), (300, 100), (350, 150)];
    let raster = disk_raster(400, 200, &centers, 4, TEST_TRANSFORM);

    let results = Pipeline::new(config()).with_tile_size(200).run(&raster)?;

    assert_eq!(results.len(), 3);
    assert_eq!(results.suppressed_tiles(), 1);
    let expected = expected_points(&centers[1..], &TEST_TRANSFORM);
    assert!(matches_all(results.points(), &expected, 0.51));
    Ok(())
}

#[test]
fn test_partial_edge_tiles_are_read_within_bounds() -> anyhow::Result<()> {
    // 1030x770 with 256 px tiles leaves narrow strips on the right and bottom
    let centers = [(20, 20), (1020, 20), (20, 760), (1020, 760), (500, 400), (520, 420)];
    let raster = disk_raster(1030, 770, &centers, 3, AffineTransform::IDENTITY);

    let mut tiles = Vec::new();
    let results = Pipeline::new(config().with_single_blob_suppression(false))
        .with_tile_size(256)
        .run_with(&raster, |out: &TileOutput| {
            tiles.push(out.tile);
            Ok(())
        })?;

    assert_eq!(tiles.len(), 5 * 4);
    assert!(tiles.iter().all(|t| t.fits_within(1030, 770)));
    assert_eq!(results.len(), centers.len());
    Ok(())
}

#[test]
fn test_output_order_is_reproducible() -> anyhow::Result<()> {
    let raster = disk_raster(2000, 2000, &SCENARIO_A_CENTERS, 5, TEST_TRANSFORM);

    let one_at_a_time = Pipeline::new(config())
        .with_tile_size(700)
        .with_max_tiles_in_flight(1)
        .run(&raster)?;
    let batched = Pipeline::new(config())
        .with_tile_size(700)
        .with_max_tiles_in_flight(8)
        .run(&raster)?;

    assert_eq!(one_at_a_time.points(), batched.points());
    Ok(())
}

#[test]
fn test_sink_sees_tiles_in_plan_order() -> anyhow::Result<()> {
    let raster = disk_raster(2000, 2000, &SCENARIO_A_CENTERS, 5, TEST_TRANSFORM);
    let pipeline = Pipeline::new(config()).with_tile_size(1500).with_max_tiles_in_flight(3);

    let mut seen = Vec::new();
    let results = pipeline.run_with(&raster, |out| {
        seen.push((out.tile.x, out.tile.y, out.points.len()));
        Ok(())
    })?;

    assert_eq!(
        seen,
        vec![(0, 0, 4), (0, 1500, 2), (1500, 0, 2), (1500, 1500, 2)]
    );
    let streamed: usize = seen.iter().map(|s| s.2).sum();
    assert_eq!(streamed, results.len());
    Ok(())
}

#[test]
fn test_sink_error_aborts_run() {
    let raster = disk_raster(600, 600, &[], 5, TEST_TRANSFORM);
    let mut calls = 0;
    let result = Pipeline::new(config())
        .with_tile_size(200)
        .with_max_tiles_in_flight(1)
        .run_with(&raster, |_| {
            calls += 1;
            if calls == 2 {
                Err(GrainError::input("disk full"))
            } else {
                Ok(())
            }
        });
    assert!(matches!(result, Err(GrainError::Input(_))));
    assert_eq!(calls, 2);
}

/// Raster whose reads fail for one tile origin
struct FlakyRaster {
    inner: InMemoryRaster,
    fail_at: (u32, u32),
}

impl RasterSource for FlakyRaster {
    fn width(&self) -> u32 {
        self.inner.width()
    }

    fn height(&self) -> u32 {
        self.inner.height()
    }

    fn band_count(&self) -> usize {
        self.inner.band_count()
    }

    fn transform(&self) -> AffineTransform {
        self.inner.transform()
    }

    fn read_window(&self, x: u32, y: u32, width: u32, height: u32) -> graindetect::Result<PixelWindow> {
        if (x, y) == self.fail_at {
            return Err(GrainError::Io(std::io::Error::other("read failed")));
        }
        self.inner.read_window(x, y, width, height)
    }
}

#[test]
fn test_tile_read_failure_aborts_run() {
    let raster = FlakyRaster {
        inner: disk_raster(2000, 2000, &SCENARIO_A_CENTERS, 5, TEST_TRANSFORM),
        fail_at: (1500, 0),
    };
    let result = Pipeline::new(config()).with_tile_size(1500).run(&raster);
    assert!(matches!(result, Err(GrainError::Io(_))));
}

#[test]
fn test_zero_tile_size_is_config_error() {
    let raster = disk_raster(100, 100, &[], 5, TEST_TRANSFORM);
    let result = Pipeline::new(config()).with_tile_size(0).run(&raster);
    assert!(matches!(result, Err(GrainError::Config(_))));
}

#[test]
fn test_trim_removes_oversized_blob() -> anyhow::Result<()> {
    // Twenty small grains and one large blob in a single tile
    let centers: Vec<(u32, u32)> = (0..20).map(|i| (30 + (i % 5) * 60, 30 + (i / 5) * 60)).collect();
    let mut img = disk_image(600, 400, &centers, 4);
    let big = disk_image(600, 400, &[(480, 300)], 40);
    for (x, y, p) in big.enumerate_pixels() {
        if p[0] == GRAIN {
            img.put_pixel(x, y, *p);
        }
    }
    let raster = InMemoryRaster::from_gray(&img, 3, AffineTransform::IDENTITY)?;

    let untrimmed = Pipeline::new(config().with_trim(false, false)).with_tile_size(600).run(&raster)?;
    let trimmed = Pipeline::new(config()).with_tile_size(600).run(&raster)?;

    assert_eq!(untrimmed.len(), 21);
    assert_eq!(trimmed.len(), 20);
    assert!(trimmed.iter().all(|p| !(p.x == 480.0 && p.y == 300.0)));
    Ok(())
}

#[test]
fn test_grayscale_weighting_drives_threshold() -> anyhow::Result<()> {
    // Pure blue grains: luma 0.114 * 255 = 29, dark enough on a white background
    let mut rgb = image::RgbImage::from_pixel(300, 300, image::Rgb([255, 255, 255]));
    for &(cx, cy) in &[(80i64, 80i64), (200, 200)] {
        for dy in -5i64..=5 {
            for dx in -5i64..=5 {
                if dx * dx + dy * dy <= 25 {
                    rgb.put_pixel((cx + dx) as u32, (cy + dy) as u32, image::Rgb([0, 0, 255]));
                }
            }
        }
    }
    let raster = InMemoryRaster::from_rgb(&rgb, AffineTransform::IDENTITY)?;

    let found = Pipeline::new(DetectionConfig::new(100)).with_tile_size(300).run(&raster)?;
    assert_eq!(found.len(), 2);

    let none = Pipeline::new(DetectionConfig::new(20)).with_tile_size(300).run(&raster)?;
    assert!(none.is_empty());
    Ok(())
}
