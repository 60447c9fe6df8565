pub mod contours;
pub mod outliers;
pub mod preprocessing;

use image::GrayImage;
use log::trace;

use crate::config::DetectionConfig;
use crate::models::TileDetectionResult;
use crate::raster::PixelWindow;

/// Per-tile grain detection: intensity, smoothing, thresholding, contours, trimming
#[derive(Debug, Clone, Copy)]
pub struct GrainDetector {
    config: DetectionConfig,
}

impl GrainDetector {
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Run the full per-tile detection on a raster window
    pub fn detect(&self, window: &PixelWindow) -> TileDetectionResult {
        let smoothed = self.smoothed_intensity(window);
        self.detect_in_intensity(&smoothed)
    }

    /// Detection on an already smoothed intensity image
    pub fn detect_in_intensity(&self, smoothed: &GrayImage) -> TileDetectionResult {
        let (blobs, degenerate_contours) = contours::extract_blobs(smoothed, self.config.threshold);
        let found = blobs.len();

        let blobs = outliers::trim_outliers(blobs, self.config.trim_first, self.config.trim_second);
        trace!(
            "{} contour(s), {} after trimming, {} degenerate",
            found,
            blobs.len(),
            degenerate_contours
        );

        // A lone survivor on a large tile is almost always noise
        if self.config.suppress_single_blob && blobs.len() == 1 {
            return TileDetectionResult {
                blobs: Vec::new(),
                degenerate_contours,
                suppressed_single: true,
            };
        }

        TileDetectionResult {
            blobs,
            degenerate_contours,
            suppressed_single: false,
        }
    }

    /// Grayscale conversion followed by the configured blur
    pub fn smoothed_intensity(&self, window: &PixelWindow) -> GrayImage {
        let gray = preprocessing::to_intensity(window);
        preprocessing::apply_blur(&gray, &self.config.blur)
    }
}

impl Default for GrainDetector {
    fn default() -> Self {
        Self::new(DetectionConfig::default())
    }
}
