use thiserror::Error;

/// Errors raised while configuring or running grain detection
#[derive(Debug, Error)]
pub enum GrainError {
    /// Missing or unreadable input, bad file extension, window outside the raster
    #[error("input error: {0}")]
    Input(String),

    /// Threshold, blur or tiling parameters that cannot be used
    #[error("configuration error: {0}")]
    Config(String),

    /// A window read that does not fit inside the raster.
    /// Planned tiles are always clipped, so hitting this from the pipeline is a bug.
    #[error("window {x},{y} {width}x{height} exceeds raster bounds {raster_width}x{raster_height}")]
    WindowOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        raster_width: u32,
        raster_height: u32,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Tiff(#[from] tiff::TiffError),
}

impl GrainError {
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, GrainError>;
