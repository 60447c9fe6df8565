use image::{GrayImage, Luma, RgbImage};
use imageproc::filter::{bilateral_filter, box_filter, median_filter, separable_filter};

use crate::config::BlurMethod;
use crate::raster::PixelWindow;

/// Single-channel intensity of a raster window.
///
/// Three or more bands: luma of the first three as RGB. Fewer: the first band.
pub fn to_intensity(window: &PixelWindow) -> GrayImage {
    match window.to_rgb_image() {
        Some(rgb) => to_grayscale(&rgb),
        None => window.first_band_image(),
    }
}

/// Convert RGB to gray with the 0.299 / 0.587 / 0.114 weighting
pub fn to_grayscale(img: &RgbImage) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let [r, g, b] = img.get_pixel(x, y).0;
        let luma = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
        Luma([luma.round().clamp(0.0, 255.0) as u8])
    })
}

/// Apply the configured smoothing
pub fn apply_blur(img: &GrayImage, blur: &BlurMethod) -> GrayImage {
    match *blur {
        BlurMethod::None => img.clone(),
        BlurMethod::Average { kernel_width, kernel_height } => {
            box_filter(img, kernel_width / 2, kernel_height / 2)
        }
        BlurMethod::Gaussian { kernel_width, kernel_height, sigma } => {
            gaussian_blur(img, kernel_width, kernel_height, sigma)
        }
        BlurMethod::Median { kernel_size } => median_filter(img, kernel_size / 2, kernel_size / 2),
        BlurMethod::Bilateral { diameter, sigma_color, sigma_space } => {
            bilateral_blur(img, diameter, sigma_color, sigma_space)
        }
    }
}

/// Gaussian blur with an explicit kernel size per axis
pub fn gaussian_blur(img: &GrayImage, kernel_width: u32, kernel_height: u32, sigma: f32) -> GrayImage {
    let h_kernel = gaussian_kernel(kernel_width, sigma);
    let v_kernel = gaussian_kernel(kernel_height, sigma);
    separable_filter(img, &h_kernel, &v_kernel)
}

/// Odd kernel size covering three sigma on each side
pub fn gaussian_size_for(sigma: f32) -> u32 {
    ((sigma.max(0.0) * 6.0 + 1.0).round() as u32 | 1).max(1)
}

/// Normalised 1D Gaussian kernel.
///
/// `sigma <= 0` derives sigma from the size, `size == 0` derives the size from sigma.
pub fn gaussian_kernel(size: u32, sigma: f32) -> Vec<f32> {
    let size = if size == 0 { gaussian_size_for(sigma) } else { size };
    let sigma = if sigma > 0.0 {
        sigma
    } else {
        0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8
    };

    let center = (size / 2) as f32;
    let denom = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (0..size)
        .map(|i| {
            let d = i as f32 - center;
            (-(d * d) / denom).exp()
        })
        .collect();
    let sum: f32 = kernel.iter().sum();
    for k in &mut kernel {
        *k /= sum;
    }
    kernel
}

/// Edge-preserving smoothing.
///
/// A zero `diameter` derives the window from `sigma_space`; non-positive sigmas fall back to 1.
pub fn bilateral_blur(img: &GrayImage, diameter: u32, sigma_color: f32, sigma_space: f32) -> GrayImage {
    if img.width() == 0 || img.height() == 0 {
        return img.clone();
    }
    let sigma_color = if sigma_color > 0.0 { sigma_color } else { 1.0 };
    let sigma_space = if sigma_space > 0.0 { sigma_space } else { 1.0 };
    bilateral_filter(img, bilateral_window(diameter, sigma_space), sigma_color, sigma_space)
}

/// Window edge used by [`bilateral_blur`]
pub fn bilateral_window(diameter: u32, sigma_space: f32) -> u32 {
    if diameter > 0 {
        diameter
    } else {
        let radius = (sigma_space * 1.5).round().max(1.0) as u32;
        radius.saturating_mul(2).saturating_add(1)
    }
}
