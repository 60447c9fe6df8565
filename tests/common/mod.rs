#![allow(dead_code)]

mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from graindetect for tests
pub use graindetect::{
    AffineTransform, Blob, BlurMethod, DetectionConfig, GeoPoint, GrainDetector, GrainError, InMemoryRaster,
    PixelWindow, Pipeline, RasterSource, ResultSet, Tile,
};
