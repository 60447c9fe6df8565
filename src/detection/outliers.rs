use crate::models::Blob;

/// |z| above this is removed by the first trimming pass
pub const FIRST_PASS_LIMIT: f64 = 3.0;
/// |z| above this is removed by the second trimming pass
pub const SECOND_PASS_LIMIT: f64 = 2.0;

/// Standard scores using the population standard deviation.
///
/// Zero for every value when there is at most one value or when all values are
/// equal (a spread at rounding-noise level counts as equal).
pub fn zscores(values: &[f64]) -> Vec<f64> {
    if values.len() <= 1 {
        return vec![0.0; values.len()];
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();
    if !std_dev.is_finite() || std_dev <= mean.abs() * 1e-12 || std_dev == 0.0 {
        return vec![0.0; values.len()];
    }
    values.iter().map(|v| (v - mean) / std_dev).collect()
}

/// Keep blobs whose radius z-score is within `limit`
pub fn trim_by_radius(blobs: Vec<Blob>, limit: f64) -> Vec<Blob> {
    let radii: Vec<f64> = blobs.iter().map(|b| b.radius).collect();
    let z = zscores(&radii);
    blobs
        .into_iter()
        .zip(z)
        .filter(|(_, z)| z.abs() <= limit)
        .map(|(b, _)| b)
        .collect()
}

/// Run the enabled passes in order; the second pass sees only the survivors of the first
pub fn trim_outliers(blobs: Vec<Blob>, first_pass: bool, second_pass: bool) -> Vec<Blob> {
    let blobs = if first_pass {
        trim_by_radius(blobs, FIRST_PASS_LIMIT)
    } else {
        blobs
    };
    if second_pass {
        trim_by_radius(blobs, SECOND_PASS_LIMIT)
    } else {
        blobs
    }
}
