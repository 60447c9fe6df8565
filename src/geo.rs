use crate::models::{Blob, GeoPoint, Tile};

/// Six-coefficient affine map from pixel (col, row) to georeferenced (x, y):
///
/// ```text
/// x = a * col + b * row + c
/// y = d * col + e * row + f
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl AffineTransform {
    pub const IDENTITY: Self = Self::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0);

    pub const fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    /// North-up transform from an origin and pixel size (y pixel size is usually negative)
    pub const fn from_origin(x_origin: f64, y_origin: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self::new(pixel_width, 0.0, x_origin, 0.0, pixel_height, y_origin)
    }

    pub fn apply(&self, col: f64, row: f64) -> GeoPoint {
        GeoPoint {
            x: self.a * col + self.b * row + self.c,
            y: self.d * col + self.e * row + self.f,
        }
    }

    pub fn determinant(&self) -> f64 {
        self.a * self.e - self.b * self.d
    }

    /// Geo -> pixel transform, or `None` for a singular matrix
    pub fn inverse(&self) -> Option<Self> {
        let det = self.determinant();
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let ia = self.e / det;
        let ib = -self.b / det;
        let id = -self.d / det;
        let ie = self.a / det;
        Some(Self::new(
            ia,
            ib,
            -(ia * self.c + ib * self.f),
            id,
            ie,
            -(id * self.c + ie * self.f),
        ))
    }
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Map a tile-local blob centroid to a georeferenced point
pub fn map_blob(blob: &Blob, tile: &Tile, transform: &AffineTransform) -> GeoPoint {
    let col = blob.cx as f64 + tile.x as f64;
    let row = blob.cy as f64 + tile.y as f64;
    transform.apply(col, row)
}

/// Map every blob of a tile, preserving order
pub fn map_blobs(blobs: &[Blob], tile: &Tile, transform: &AffineTransform) -> Vec<GeoPoint> {
    blobs.iter().map(|b| map_blob(b, tile, transform)).collect()
}
