pub mod config;
pub mod detection;
pub mod error;
pub mod geo;
pub mod logging;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod raster;
pub mod tiling;

pub use config::{BlurMethod, DetectionConfig};
pub use detection::GrainDetector;
pub use error::{GrainError, Result};
pub use geo::AffineTransform;
pub use models::{Blob, GeoPoint, Tile, TileDetectionResult};
pub use pipeline::{Pipeline, ResultSet, TileOutput};
pub use raster::{GeoTiffRaster, InMemoryRaster, PixelWindow, RasterSource};
