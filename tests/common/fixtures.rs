use graindetect::{AffineTransform, InMemoryRaster};
use image::{GrayImage, Luma};

pub const BACKGROUND: u8 = 230;
pub const GRAIN: u8 = 20;
pub const THRESHOLD: u8 = 128;

/// UTM-like north-up georeferencing with half-metre pixels
pub const TEST_TRANSFORM: AffineTransform = AffineTransform::from_origin(500_000.0, 4_100_000.0, 0.5, -0.5);

/// Bright image with dark filled disks of `radius` centred on the given pixels
pub fn disk_image(width: u32, height: u32, centers: &[(u32, u32)], radius: u32) -> GrayImage {
    let mut img = GrayImage::from_pixel(width, height, Luma([BACKGROUND]));
    let r = radius as i64;
    for &(cx, cy) in centers {
        for dy in -r..=r {
            for dx in -r..=r {
                if dx * dx + dy * dy > r * r {
                    continue;
                }
                let x = cx as i64 + dx;
                let y = cy as i64 + dy;
                if x >= 0 && y >= 0 && x < width as i64 && y < height as i64 {
                    img.put_pixel(x as u32, y as u32, Luma([GRAIN]));
                }
            }
        }
    }
    img
}

/// Three identical bands built from [`disk_image`]
pub fn disk_raster(
    width: u32,
    height: u32,
    centers: &[(u32, u32)],
    radius: u32,
    transform: AffineTransform,
) -> InMemoryRaster {
    InMemoryRaster::from_gray(&disk_image(width, height, centers, radius), 3, transform)
        .expect("Failed to build test raster")
}

/// Ten disks on a 2000x2000 raster, at least two in each tile of a 1500 px grid
pub const SCENARIO_A_CENTERS: [(u32, u32); 10] = [
    (200, 200),
    (600, 300),
    (1000, 900),
    (1300, 1200),
    (300, 1700),
    (900, 1800),
    (1700, 400),
    (1800, 1100),
    (1600, 1600),
    (1900, 1900),
];

/// True if `points` contains a point within `tolerance` of every expected location, and nothing else
pub fn matches_all(points: &[graindetect::GeoPoint], expected: &[graindetect::GeoPoint], tolerance: f64) -> bool {
    points.len() == expected.len()
        && expected.iter().all(|e| {
            points
                .iter()
                .any(|p| (p.x - e.x).abs() <= tolerance && (p.y - e.y).abs() <= tolerance)
        })
}
