use log::{debug, info};
use rayon::prelude::*;

use crate::config::DetectionConfig;
use crate::detection::GrainDetector;
use crate::error::Result;
use crate::geo::{AffineTransform, map_blobs};
use crate::models::{GeoPoint, Tile, TileDetectionResult};
use crate::raster::RasterSource;
use crate::tiling::{plan_tiles, validate_tile_size};

/// Default tile edge in pixels
pub const DEFAULT_TILE_SIZE: u32 = 2000;

/// Everything one tile produced
#[derive(Debug, Clone)]
pub struct TileOutput {
    pub tile: Tile,
    pub detection: TileDetectionResult,
    /// Georeferenced centres of `detection.blobs`, same order
    pub points: Vec<GeoPoint>,
}

/// Grain locations of a run, in tile-plan order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    points: Vec<GeoPoint>,
    tiles_processed: usize,
    degenerate_contours: usize,
    suppressed_tiles: usize,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one tile's output
    pub fn push_tile(&mut self, output: &TileOutput) {
        self.points.extend_from_slice(&output.points);
        self.tiles_processed += 1;
        self.degenerate_contours += output.detection.degenerate_contours;
        if output.detection.suppressed_single {
            self.suppressed_tiles += 1;
        }
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GeoPoint> {
        self.points.iter()
    }

    pub fn tiles_processed(&self) -> usize {
        self.tiles_processed
    }

    pub fn degenerate_contours(&self) -> usize {
        self.degenerate_contours
    }

    /// Tiles whose lone detection was dropped
    pub fn suppressed_tiles(&self) -> usize {
        self.suppressed_tiles
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a GeoPoint;
    type IntoIter = std::slice::Iter<'a, GeoPoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

/// Tiled grain detection over a whole raster
#[derive(Debug, Clone)]
pub struct Pipeline {
    detector: GrainDetector,
    tile_size: u32,
    max_tiles_in_flight: usize,
}

impl Pipeline {
    pub fn new(config: DetectionConfig) -> Self {
        Self {
            detector: GrainDetector::new(config),
            tile_size: DEFAULT_TILE_SIZE,
            max_tiles_in_flight: rayon::current_num_threads().max(1),
        }
    }

    /// Edge length of the square tiles read at once
    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size;
        self
    }

    /// Upper bound on tiles held in memory at the same time
    pub fn with_max_tiles_in_flight(mut self, max: usize) -> Self {
        self.max_tiles_in_flight = max.max(1);
        self
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn detector(&self) -> &GrainDetector {
        &self.detector
    }

    /// Detect grains over the whole raster
    pub fn run<R: RasterSource + ?Sized>(&self, raster: &R) -> Result<ResultSet> {
        self.run_with(raster, |_| Ok(()))
    }

    /// Like [`Pipeline::run`], handing each tile's output to `sink` in plan order
    /// as soon as it is final. An error from the sink aborts the run.
    pub fn run_with<R, F>(&self, raster: &R, mut sink: F) -> Result<ResultSet>
    where
        R: RasterSource + ?Sized,
        F: FnMut(&TileOutput) -> Result<()>,
    {
        let tile_size = validate_tile_size(self.tile_size)?;
        self.detector.config().validate()?;

        let transform = raster.transform();
        let tiles = plan_tiles(raster.width(), raster.height(), tile_size);
        info!(
            "Processing {}x{} raster in {} tile(s) of {} px (threshold {}, blur {})",
            raster.width(),
            raster.height(),
            tiles.len(),
            tile_size,
            self.detector.config().threshold,
            self.detector.config().blur
        );

        let mut results = ResultSet::new();
        for batch in tiles.chunks(self.max_tiles_in_flight) {
            let outputs = batch
                .par_iter()
                .map(|tile| self.process_tile(raster, tile, &transform))
                .collect::<Result<Vec<_>>>()?;

            for output in &outputs {
                sink(output)?;
                results.push_tile(output);
            }
            info!(
                "Processed {}/{} tiles, {} grain(s) so far",
                results.tiles_processed(),
                tiles.len(),
                results.len()
            );
        }

        info!(
            "Detected {} grain(s); {} degenerate contour(s), {} tile(s) with a suppressed single detection",
            results.len(),
            results.degenerate_contours(),
            results.suppressed_tiles()
        );
        Ok(results)
    }

    /// Read, detect and georeference a single tile
    pub fn process_tile<R: RasterSource + ?Sized>(
        &self,
        raster: &R,
        tile: &Tile,
        transform: &AffineTransform,
    ) -> Result<TileOutput> {
        let window = raster.read_tile(tile)?;
        let detection = self.detector.detect(&window);
        let points = map_blobs(&detection.blobs, tile, transform);
        debug!(
            "Tile ({}, {}) {}x{}: {} grain(s)",
            tile.x,
            tile.y,
            tile.width,
            tile.height,
            points.len()
        );
        Ok(TileOutput {
            tile: *tile,
            detection,
            points,
        })
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(DetectionConfig::default())
    }
}
