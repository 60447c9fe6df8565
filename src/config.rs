use std::fmt;
use std::str::FromStr;

use crate::detection::preprocessing::{bilateral_window, gaussian_size_for};
use crate::error::{GrainError, Result};

/// Smoothing applied to the intensity image before thresholding
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum BlurMethod {
    #[default]
    None,
    /// Box filter
    Average { kernel_width: u32, kernel_height: u32 },
    /// Gaussian filter. A sigma of zero derives it from the kernel size,
    /// a kernel size of zero derives it from sigma.
    Gaussian { kernel_width: u32, kernel_height: u32, sigma: f32 },
    /// Median filter with an odd square kernel
    Median { kernel_size: u32 },
    /// Edge-preserving filter. A diameter of zero derives it from `sigma_space`.
    Bilateral { diameter: u32, sigma_color: f32, sigma_space: f32 },
}

impl BlurMethod {
    pub const NAMES: [&'static str; 5] = ["none", "average", "gaussian", "median", "bilateral"];

    /// Largest kernel edge or window a blur may use, explicit or derived from a sigma
    pub const MAX_KERNEL_SIZE: u32 = 255;

    /// Build a blur from its method name and an optional parameter string.
    ///
    /// Parameters are read as a flat list of numbers, so `(5,5)`, `[(3,3),0]`,
    /// `5` and `9, 75, 75` are all accepted. Omitted parameters fall back to
    /// average 5x5, gaussian 3x3 with derived sigma, median 5, bilateral 9/75/75.
    pub fn parse(method: &str, params: Option<&str>) -> Result<Self> {
        let method = method.trim().to_ascii_lowercase();
        let values = match params {
            Some(p) if !p.trim().is_empty() && !p.trim().eq_ignore_ascii_case("none") => {
                Some(parse_numbers(p)?)
            }
            _ => None,
        };

        let blur = match (method.as_str(), values.as_deref()) {
            ("none", _) => Self::None,
            ("average", None) => Self::Average { kernel_width: 5, kernel_height: 5 },
            ("average", Some([k])) => Self::Average {
                kernel_width: kernel(*k, "average")?,
                kernel_height: kernel(*k, "average")?,
            },
            ("average", Some([kw, kh])) => Self::Average {
                kernel_width: kernel(*kw, "average")?,
                kernel_height: kernel(*kh, "average")?,
            },
            ("gaussian", None) => Self::Gaussian { kernel_width: 3, kernel_height: 3, sigma: 0.0 },
            ("gaussian", Some([kw, kh, sigma])) => Self::Gaussian {
                kernel_width: non_negative_int(*kw, "gaussian kernel")?,
                kernel_height: non_negative_int(*kh, "gaussian kernel")?,
                sigma: *sigma as f32,
            },
            ("median", None) => Self::Median { kernel_size: 5 },
            ("median", Some([k])) => Self::Median { kernel_size: kernel(*k, "median")? },
            ("bilateral", None) => Self::Bilateral { diameter: 9, sigma_color: 75.0, sigma_space: 75.0 },
            ("bilateral", Some([d, color, space])) => Self::Bilateral {
                diameter: non_negative_int(*d, "bilateral diameter")?,
                sigma_color: *color as f32,
                sigma_space: *space as f32,
            },
            (name, Some(values)) if Self::NAMES.contains(&name) => {
                return Err(GrainError::config(format!(
                    "blur method '{name}' does not accept {} parameter(s): {values:?}",
                    values.len()
                )));
            }
            (name, _) => {
                return Err(GrainError::config(format!(
                    "blur method must be one of {:?}, got '{name}'",
                    Self::NAMES
                )));
            }
        };
        blur.validate()?;
        Ok(blur)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Average { .. } => "average",
            Self::Gaussian { .. } => "gaussian",
            Self::Median { .. } => "median",
            Self::Bilateral { .. } => "bilateral",
        }
    }

    /// Reject parameter combinations the filters cannot run with
    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::None => Ok(()),
            Self::Average { kernel_width, kernel_height } => {
                if kernel_width == 0 || kernel_height == 0 {
                    return Err(GrainError::config("average kernel size must be positive"));
                }
                check_kernel_size(kernel_width.max(kernel_height), "average kernel")
            }
            Self::Gaussian { kernel_width, kernel_height, sigma } => {
                if !sigma.is_finite() {
                    return Err(GrainError::config("gaussian sigma must be finite"));
                }
                for k in [kernel_width, kernel_height] {
                    if k != 0 && k % 2 == 0 {
                        return Err(GrainError::config(format!("gaussian kernel size must be odd, got {k}")));
                    }
                }
                if (kernel_width == 0 || kernel_height == 0) && sigma <= 0.0 {
                    return Err(GrainError::config(
                        "gaussian needs a positive sigma when a kernel size is zero",
                    ));
                }
                for k in [kernel_width, kernel_height] {
                    let size = if k == 0 { gaussian_size_for(sigma) } else { k };
                    check_kernel_size(size, "gaussian kernel")?;
                }
                Ok(())
            }
            Self::Median { kernel_size } => {
                if kernel_size == 0 || kernel_size % 2 == 0 {
                    return Err(GrainError::config(format!(
                        "median kernel size must be odd and positive, got {kernel_size}"
                    )));
                }
                check_kernel_size(kernel_size, "median kernel")
            }
            Self::Bilateral { diameter, sigma_color, sigma_space } => {
                if !(sigma_color.is_finite() && sigma_space.is_finite()) {
                    return Err(GrainError::config("bilateral sigmas must be finite"));
                }
                if diameter == 0 && sigma_space <= 0.0 {
                    return Err(GrainError::config(
                        "bilateral needs a positive sigma_space when diameter is zero",
                    ));
                }
                check_kernel_size(bilateral_window(diameter, sigma_space), "bilateral window")
            }
        }
    }
}

impl fmt::Display for BlurMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Average { kernel_width, kernel_height } => {
                write!(f, "average ({kernel_width}x{kernel_height})")
            }
            Self::Gaussian { kernel_width, kernel_height, sigma } => {
                write!(f, "gaussian ({kernel_width}x{kernel_height}, sigma {sigma})")
            }
            Self::Median { kernel_size } => write!(f, "median ({kernel_size})"),
            Self::Bilateral { diameter, sigma_color, sigma_space } => {
                write!(f, "bilateral (d {diameter}, color {sigma_color}, space {sigma_space})")
            }
        }
    }
}

impl FromStr for BlurMethod {
    type Err = GrainError;

    /// Method name with default parameters
    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s, None)
    }
}

fn check_kernel_size(size: u32, what: &str) -> Result<()> {
    if size > BlurMethod::MAX_KERNEL_SIZE {
        return Err(GrainError::config(format!(
            "{what} of {size} exceeds the maximum of {}",
            BlurMethod::MAX_KERNEL_SIZE
        )));
    }
    Ok(())
}

fn parse_numbers(params: &str) -> Result<Vec<f64>> {
    params
        .split(|c: char| matches!(c, ',' | '(' | ')' | '[' | ']') || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>()
                .map_err(|_| GrainError::config(format!("malformed blur parameter '{s}' in '{params}'")))
        })
        .collect()
}

fn non_negative_int(value: f64, what: &str) -> Result<u32> {
    if value.fract() != 0.0 || value < 0.0 || value > u32::MAX as f64 {
        return Err(GrainError::config(format!("{what} must be a non-negative integer, got {value}")));
    }
    Ok(value as u32)
}

fn kernel(value: f64, what: &str) -> Result<u32> {
    let k = non_negative_int(value, what)?;
    if k == 0 {
        return Err(GrainError::config(format!("{what} kernel size must be positive")));
    }
    Ok(k)
}

/// Parameters for detecting grains inside one tile
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionConfig {
    /// Pixels darker than this are foreground
    pub threshold: u8,
    pub blur: BlurMethod,
    /// Drop blobs whose radius z-score exceeds 3
    pub trim_first: bool,
    /// Drop blobs whose radius z-score, recomputed after the first pass, exceeds 2
    pub trim_second: bool,
    /// Report no detections for a tile where exactly one blob survives.
    /// Lone detections on large tiles are usually noise; disable for small tiles.
    pub suppress_single_blob: bool,
}

impl DetectionConfig {
    pub const DEFAULT_THRESHOLD: u8 = 208;

    pub fn new(threshold: u8) -> Self {
        Self {
            threshold,
            ..Self::default()
        }
    }

    /// Validate a threshold coming from user input
    pub fn threshold_from(value: i64) -> Result<u8> {
        u8::try_from(value)
            .map_err(|_| GrainError::config(format!("threshold value must be in range [0, 255], got {value}")))
    }

    pub fn with_blur(mut self, blur: BlurMethod) -> Self {
        self.blur = blur;
        self
    }

    pub fn with_trim(mut self, first: bool, second: bool) -> Self {
        self.trim_first = first;
        self.trim_second = second;
        self
    }

    pub fn with_single_blob_suppression(mut self, suppress: bool) -> Self {
        self.suppress_single_blob = suppress;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.blur.validate()
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold: Self::DEFAULT_THRESHOLD,
            blur: BlurMethod::None,
            trim_first: true,
            trim_second: true,
            suppress_single_blob: true,
        }
    }
}
