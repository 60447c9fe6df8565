/// Rectangular window of the raster, in global pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tile {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Tile {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Exclusive right edge
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// True if the tile lies completely inside a raster of the given size
    pub fn fits_within(&self, raster_width: u32, raster_height: u32) -> bool {
        self.x.checked_add(self.width).is_some_and(|r| r <= raster_width)
            && self.y.checked_add(self.height).is_some_and(|b| b <= raster_height)
    }
}

/// A detected grain, in tile-local pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Blob {
    pub cx: u32,
    pub cy: u32,
    /// Radius of the minimal enclosing circle of the contour
    pub radius: f64,
    /// Closed arc length of the contour
    pub perimeter: f64,
}

impl Blob {
    pub fn center(&self) -> (u32, u32) {
        (self.cx, self.cy)
    }
}

/// Everything one tile contributes before coordinate mapping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TileDetectionResult {
    pub blobs: Vec<Blob>,
    /// Contours whose enclosed area was zero (centroid placeholder (0, 0))
    pub degenerate_contours: usize,
    /// Set when a lone surviving blob was dropped
    pub suppressed_single: bool,
}

impl TileDetectionResult {
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }
}

/// A grain location in the raster's coordinate reference system
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    /// Longitude or easting
    pub x: f64,
    /// Latitude or northing
    pub y: f64,
}
