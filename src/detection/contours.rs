use image::{GrayImage, Luma};
use imageproc::contours::find_contours;
use imageproc::geometry::arc_length;
use imageproc::point::Point;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::models::Blob;

/// Foreground (255) where intensity is below `threshold`: grains are darker than the background
pub fn binarize(img: &GrayImage, threshold: u8) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        if img.get_pixel(x, y)[0] < threshold {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Trace every border of the binary image, outer borders and holes alike,
/// keeping only the vertices where the chain changes direction
pub fn find_grain_contours(binary: &GrayImage) -> Vec<Vec<Point<i32>>> {
    find_contours::<i32>(binary)
        .into_iter()
        .map(|c| simplify_chain(&c.points))
        .collect()
}

/// Collapse straight horizontal, vertical and diagonal runs of a closed chain to their endpoints
pub fn simplify_chain(points: &[Point<i32>]) -> Vec<Point<i32>> {
    let n = points.len();
    if n <= 2 {
        return points.to_vec();
    }
    let simplified: Vec<Point<i32>> = (0..n)
        .filter(|&i| {
            let prev = points[(i + n - 1) % n];
            let cur = points[i];
            let next = points[(i + 1) % n];
            (cur.x - prev.x, cur.y - prev.y) != (next.x - cur.x, next.y - cur.y)
        })
        .map(|i| points[i])
        .collect();
    if simplified.is_empty() {
        points[..1].to_vec()
    } else {
        simplified
    }
}

/// Area moments of the polygon spanned by a contour.
///
/// Accumulated with integer arithmetic (Green's theorem): `area2` is twice the
/// signed area, `sum_x`/`sum_y` are six times the first moments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PolygonMoments {
    area2: i64,
    sum_x: i64,
    sum_y: i64,
}

impl PolygonMoments {
    pub fn of(points: &[Point<i32>]) -> Self {
        let n = points.len();
        let mut m = Self::default();
        if n < 3 {
            return m;
        }
        for i in 0..n {
            let (x0, y0) = (points[i].x as i64, points[i].y as i64);
            let (x1, y1) = (points[(i + 1) % n].x as i64, points[(i + 1) % n].y as i64);
            let cross = x0 * y1 - x1 * y0;
            m.area2 += cross;
            m.sum_x += (x0 + x1) * cross;
            m.sum_y += (y0 + y1) * cross;
        }
        m
    }

    /// Zeroth moment (enclosed area, orientation independent)
    pub fn m00(&self) -> f64 {
        self.area2.abs() as f64 / 2.0
    }

    pub fn m10(&self) -> f64 {
        self.sum_x as f64 / 6.0 * self.area2.signum() as f64
    }

    pub fn m01(&self) -> f64 {
        self.sum_y as f64 / 6.0 * self.area2.signum() as f64
    }

    /// Centroid rounded down to whole pixels, or `None` for zero area
    pub fn centroid(&self) -> Option<(u32, u32)> {
        if self.area2 == 0 {
            return None;
        }
        let (denom, sx, sy) = if self.area2 < 0 {
            (-3 * self.area2, -self.sum_x, -self.sum_y)
        } else {
            (3 * self.area2, self.sum_x, self.sum_y)
        };
        let cx = sx.div_euclid(denom).max(0);
        let cy = sy.div_euclid(denom).max(0);
        Some((cx as u32, cy as u32))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub cx: f64,
    pub cy: f64,
    pub radius: f64,
}

impl Circle {
    fn contains(&self, p: (f64, f64)) -> bool {
        let dx = p.0 - self.cx;
        let dy = p.1 - self.cy;
        (dx * dx + dy * dy).sqrt() <= self.radius * (1.0 + 1e-9) + 1e-9
    }

    fn from_two(a: (f64, f64), b: (f64, f64)) -> Self {
        let cx = (a.0 + b.0) / 2.0;
        let cy = (a.1 + b.1) / 2.0;
        let radius = ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt() / 2.0;
        Self { cx, cy, radius }
    }

    fn from_three(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> Self {
        let (bx, by) = (b.0 - a.0, b.1 - a.1);
        let (cx, cy) = (c.0 - a.0, c.1 - a.1);
        let d = 2.0 * (bx * cy - by * cx);
        if d.abs() < 1e-12 {
            // Collinear: the widest pair spans the circle
            return [Self::from_two(a, c), Self::from_two(b, c)]
                .into_iter()
                .fold(Self::from_two(a, b), |best, c| if c.radius > best.radius { c } else { best });
        }
        let b2 = bx * bx + by * by;
        let c2 = cx * cx + cy * cy;
        let ux = (cy * b2 - by * c2) / d;
        let uy = (bx * c2 - cx * b2) / d;
        Self {
            cx: a.0 + ux,
            cy: a.1 + uy,
            radius: (ux * ux + uy * uy).sqrt(),
        }
    }
}

/// Smallest circle containing every point (Welzl, incremental form).
///
/// Points are visited in a shuffled order with a fixed seed so the expected
/// running time is linear and results are reproducible.
pub fn min_enclosing_circle(points: &[Point<i32>]) -> Circle {
    let Some(min_x) = points.iter().map(|p| p.x).min() else {
        return Circle { cx: 0.0, cy: 0.0, radius: 0.0 };
    };
    let min_y = points.iter().map(|p| p.y).min().unwrap_or(0);
    // Work relative to the bounding box so equal shapes give bit-identical radii
    let mut pts: Vec<(f64, f64)> = points
        .iter()
        .map(|p| ((p.x - min_x) as f64, (p.y - min_y) as f64))
        .collect();
    let mut rng = StdRng::seed_from_u64(0x6772_6169_6e73);
    pts.shuffle(&mut rng);

    let mut circle = Circle { cx: pts[0].0, cy: pts[0].1, radius: 0.0 };
    for i in 1..pts.len() {
        if circle.contains(pts[i]) {
            continue;
        }
        circle = Circle { cx: pts[i].0, cy: pts[i].1, radius: 0.0 };
        for j in 0..i {
            if circle.contains(pts[j]) {
                continue;
            }
            circle = Circle::from_two(pts[i], pts[j]);
            for k in 0..j {
                if !circle.contains(pts[k]) {
                    circle = Circle::from_three(pts[i], pts[j], pts[k]);
                }
            }
        }
    }
    Circle {
        cx: circle.cx + min_x as f64,
        cy: circle.cy + min_y as f64,
        radius: circle.radius,
    }
}

/// Shape metrics of one traced contour
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContourMetrics {
    /// `None` when the contour encloses no area
    pub centroid: Option<(u32, u32)>,
    pub radius: f64,
    pub perimeter: f64,
}

pub fn measure_contour(points: &[Point<i32>]) -> ContourMetrics {
    ContourMetrics {
        centroid: PolygonMoments::of(points).centroid(),
        radius: min_enclosing_circle(points).radius.max(0.0),
        perimeter: arc_length(points, true).max(0.0),
    }
}

/// Threshold, trace and measure every contour in an intensity image.
///
/// Returns the blobs in tracing order and the number of zero-area contours.
/// Zero-area contours stay in the list with a (0, 0) centroid.
pub fn extract_blobs(intensity: &GrayImage, threshold: u8) -> (Vec<Blob>, usize) {
    let binary = binarize(intensity, threshold);
    let contours = find_grain_contours(&binary);

    let mut degenerate = 0;
    let blobs = contours
        .iter()
        .map(|points| {
            let metrics = measure_contour(points);
            let (cx, cy) = metrics.centroid.unwrap_or_else(|| {
                degenerate += 1;
                (0, 0)
            });
            Blob {
                cx,
                cy,
                radius: metrics.radius,
                perimeter: metrics.perimeter,
            }
        })
        .collect();
    (blobs, degenerate)
}
