use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};

use image::{GrayImage, RgbImage};
use log::{debug, warn};
use tiff::ColorType;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;

use crate::error::{GrainError, Result};
use crate::geo::AffineTransform;
use crate::models::Tile;

/// File extensions accepted as georeferenced rasters
pub const RASTER_EXTENSIONS: [&str; 2] = ["tif", "tiff"];

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const PLANAR_SEPARATE: u16 = 2;

/// Band-sequential pixel buffer read from a raster window: `bands x height x width`
#[derive(Debug, Clone, PartialEq)]
pub struct PixelWindow {
    width: u32,
    height: u32,
    bands: usize,
    data: Vec<u8>,
}

impl PixelWindow {
    pub fn new(width: u32, height: u32, bands: usize, data: Vec<u8>) -> Result<Self> {
        let expected = bands * width as usize * height as usize;
        if bands == 0 || data.len() != expected {
            return Err(GrainError::input(format!(
                "pixel buffer of {} bytes does not match {bands} band(s) of {width}x{height}",
                data.len()
            )));
        }
        Ok(Self { width, height, bands, data })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bands(&self) -> usize {
        self.bands
    }

    /// One band as a row-major plane
    pub fn band(&self, band: usize) -> &[u8] {
        let plane = self.width as usize * self.height as usize;
        &self.data[band * plane..(band + 1) * plane]
    }

    pub fn sample(&self, band: usize, x: u32, y: u32) -> u8 {
        self.band(band)[y as usize * self.width as usize + x as usize]
    }

    /// Interleave the first three bands into an RGB image.
    /// Returns `None` when the window has fewer than three bands.
    pub fn to_rgb_image(&self) -> Option<RgbImage> {
        if self.bands < 3 {
            return None;
        }
        let (r, g, b) = (self.band(0), self.band(1), self.band(2));
        let mut interleaved = Vec::with_capacity(r.len() * 3);
        for i in 0..r.len() {
            interleaved.extend_from_slice(&[r[i], g[i], b[i]]);
        }
        RgbImage::from_raw(self.width, self.height, interleaved)
    }

    /// The first band as a grayscale image
    pub fn first_band_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| image::Luma([self.sample(0, x, y)]))
    }
}

/// Read-only access to a georeferenced raster.
///
/// Windowed reads may be issued concurrently from several tile workers.
pub trait RasterSource: Sync {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    fn band_count(&self) -> usize;

    /// Pixel (col, row) to georeferenced (x, y)
    fn transform(&self) -> AffineTransform;

    /// Read a window. Fails if it does not lie entirely within the raster.
    fn read_window(&self, x: u32, y: u32, width: u32, height: u32) -> Result<PixelWindow>;

    fn read_tile(&self, tile: &Tile) -> Result<PixelWindow> {
        self.read_window(tile.x, tile.y, tile.width, tile.height)
    }

    fn check_window(&self, x: u32, y: u32, width: u32, height: u32) -> Result<()> {
        let (raster_width, raster_height) = (self.width(), self.height());
        if Tile::new(x, y, width, height).fits_within(raster_width, raster_height) {
            Ok(())
        } else {
            Err(GrainError::WindowOutOfBounds {
                x,
                y,
                width,
                height,
                raster_width,
                raster_height,
            })
        }
    }
}

/// Raster held fully in memory as band-sequential bytes
#[derive(Debug, Clone)]
pub struct InMemoryRaster {
    pixels: PixelWindow,
    transform: AffineTransform,
}

impl InMemoryRaster {
    pub fn new(pixels: PixelWindow, transform: AffineTransform) -> Self {
        Self { pixels, transform }
    }

    /// Grayscale image replicated into `bands` identical bands
    pub fn from_gray(image: &GrayImage, bands: usize, transform: AffineTransform) -> Result<Self> {
        let plane = image.as_raw();
        let mut data = Vec::with_capacity(plane.len() * bands);
        for _ in 0..bands {
            data.extend_from_slice(plane);
        }
        let pixels = PixelWindow::new(image.width(), image.height(), bands, data)?;
        Ok(Self::new(pixels, transform))
    }

    pub fn from_rgb(image: &RgbImage, transform: AffineTransform) -> Result<Self> {
        let plane = image.width() as usize * image.height() as usize;
        let mut data = vec![0u8; plane * 3];
        for (i, px) in image.pixels().enumerate() {
            data[i] = px[0];
            data[plane + i] = px[1];
            data[2 * plane + i] = px[2];
        }
        let pixels = PixelWindow::new(image.width(), image.height(), 3, data)?;
        Ok(Self::new(pixels, transform))
    }
}

impl RasterSource for InMemoryRaster {
    fn width(&self) -> u32 {
        self.pixels.width()
    }

    fn height(&self) -> u32 {
        self.pixels.height()
    }

    fn band_count(&self) -> usize {
        self.pixels.bands()
    }

    fn transform(&self) -> AffineTransform {
        self.transform
    }

    fn read_window(&self, x: u32, y: u32, width: u32, height: u32) -> Result<PixelWindow> {
        self.check_window(x, y, width, height)?;
        let bands = self.pixels.bands();
        let mut data = Vec::with_capacity(bands * width as usize * height as usize);
        let stride = self.pixels.width() as usize;
        for band in 0..bands {
            let plane = self.pixels.band(band);
            for row in y as usize..(y + height) as usize {
                let start = row * stride + x as usize;
                data.extend_from_slice(&plane[start..start + width as usize]);
            }
        }
        PixelWindow::new(width, height, bands, data)
    }
}

/// A GeoTIFF read window by window.
///
/// Only the header, georeferencing and sample layout are kept in memory. Each
/// window read decodes just the strips or tiles it overlaps, so memory follows
/// the window size rather than the raster size.
///
/// Georeferencing comes from the ModelTransformation tag, or ModelTiepoint plus
/// ModelPixelScale, then from an ESRI world file next to the image. Without
/// either the identity transform is used and pixel coordinates are reported.
#[derive(Debug, Clone)]
pub struct GeoTiffRaster {
    path: PathBuf,
    width: u32,
    height: u32,
    bands: usize,
    transform: AffineTransform,
}

impl GeoTiffRaster {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !has_raster_extension(path) {
            return Err(GrainError::input(format!(
                "file format must be .tif, got {}",
                path.display()
            )));
        }
        if !path.is_file() {
            return Err(GrainError::input(format!("file could not be read: {}", path.display())));
        }

        let mut decoder = open_decoder(path)
            .map_err(|e| GrainError::input(format!("failed to decode {}: {e}", path.display())))?;
        let (width, height) = decoder.dimensions()?;
        let bands = bands_of(decoder.colortype()?)?;
        if decoder.find_tag_unsigned::<u16>(Tag::PlanarConfiguration)? == Some(PLANAR_SEPARATE) {
            return Err(GrainError::input(format!(
                "{}: separate sample planes are not supported",
                path.display()
            )));
        }

        let transform = match geotiff_transform(&mut decoder) {
            Ok(Some(t)) => t,
            Ok(None) => fallback_transform(path)?,
            Err(e) => {
                warn!("Could not read GeoTIFF tags from {}: {e}", path.display());
                fallback_transform(path)?
            }
        };

        let (chunk_width, chunk_height) = decoder.chunk_dimensions();
        debug!(
            "Opened {} ({}x{}, {} band(s), {}x{} chunks)",
            path.display(),
            width,
            height,
            bands,
            chunk_width,
            chunk_height
        );

        Ok(Self {
            path: path.to_path_buf(),
            width,
            height,
            bands,
            transform,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RasterSource for GeoTiffRaster {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn band_count(&self) -> usize {
        self.bands
    }

    fn transform(&self) -> AffineTransform {
        self.transform
    }

    /// Decodes the chunks overlapping the window and copies the overlap into
    /// band-sequential order. Every call opens its own decoder, so concurrent
    /// reads do not contend.
    fn read_window(&self, x: u32, y: u32, width: u32, height: u32) -> Result<PixelWindow> {
        self.check_window(x, y, width, height)?;
        let bands = self.bands;
        let plane = width as usize * height as usize;
        let mut data = vec![0u8; plane * bands];
        if plane == 0 {
            return PixelWindow::new(width, height, bands, data);
        }

        let mut decoder = open_decoder(&self.path)?;
        let (chunk_width, chunk_height) = decoder.chunk_dimensions();
        if chunk_width == 0 || chunk_height == 0 {
            return Err(GrainError::input(format!("{}: empty strip or tile size", self.path.display())));
        }
        let chunks_across = self.width.div_ceil(chunk_width);

        for chunk_row in y / chunk_height..=(y + height - 1) / chunk_height {
            for chunk_col in x / chunk_width..=(x + width - 1) / chunk_width {
                let index = chunk_row * chunks_across + chunk_col;
                let (data_width, data_height) = decoder.chunk_data_dimensions(index);
                let samples = samples_as_u8(decoder.read_chunk(index)?)?;
                if samples.len() < data_width as usize * data_height as usize * bands {
                    return Err(GrainError::input(format!(
                        "{}: chunk {index} is shorter than its {data_width}x{data_height} extent",
                        self.path.display()
                    )));
                }

                let (x0, y0) = (chunk_col * chunk_width, chunk_row * chunk_height);
                let (col_start, col_end) = (x.max(x0), (x + width).min(x0 + data_width));
                let (row_start, row_end) = (y.max(y0), (y + height).min(y0 + data_height));
                for row in row_start..row_end {
                    let src_row = (row - y0) as usize * data_width as usize;
                    let dst_row = (row - y) as usize * width as usize;
                    for col in col_start..col_end {
                        let src = (src_row + (col - x0) as usize) * bands;
                        let dst = dst_row + (col - x) as usize;
                        for band in 0..bands {
                            data[band * plane + dst] = samples[src + band];
                        }
                    }
                }
            }
        }

        PixelWindow::new(width, height, bands, data)
    }
}

pub fn has_raster_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| RASTER_EXTENSIONS.iter().any(|ext| e.eq_ignore_ascii_case(ext)))
}

fn open_decoder(path: &Path) -> Result<Decoder<BufReader<File>>> {
    Ok(Decoder::new(BufReader::new(File::open(path)?))?)
}

/// Samples per pixel for the supported 8 and 16 bit layouts
fn bands_of(color: ColorType) -> Result<usize> {
    match color {
        ColorType::Gray(8 | 16) => Ok(1),
        ColorType::GrayA(8 | 16) => Ok(2),
        ColorType::RGB(8 | 16) => Ok(3),
        ColorType::RGBA(8 | 16) => Ok(4),
        other => Err(GrainError::input(format!("unsupported TIFF color type {other:?}"))),
    }
}

/// 16 bit samples keep their high byte
fn samples_as_u8(chunk: DecodingResult) -> Result<Vec<u8>> {
    match chunk {
        DecodingResult::U8(buf) => Ok(buf),
        DecodingResult::U16(buf) => Ok(buf.into_iter().map(|v| (v >> 8) as u8).collect()),
        _ => Err(GrainError::input("only unsigned 8 and 16 bit samples are supported")),
    }
}

fn fallback_transform(path: &Path) -> Result<AffineTransform> {
    if let Some(t) = read_world_file(path)? {
        debug!("Using world file georeferencing for {}", path.display());
        return Ok(t);
    }
    warn!(
        "{} carries no georeferencing, reporting pixel coordinates",
        path.display()
    );
    Ok(AffineTransform::IDENTITY)
}

/// Read the affine transform from GeoTIFF model tags
fn geotiff_transform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Option<AffineTransform>> {
    if let Some(value) = decoder.find_tag(Tag::from_u16_exhaustive(MODEL_TRANSFORMATION))? {
        let m = value.into_f64_vec()?;
        if m.len() >= 8 {
            return Ok(Some(AffineTransform::new(m[0], m[1], m[3], m[4], m[5], m[7])));
        }
    }

    let tiepoint = decoder.find_tag(Tag::from_u16_exhaustive(MODEL_TIEPOINT))?;
    let scale = decoder.find_tag(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE))?;
    if let (Some(tiepoint), Some(scale)) = (tiepoint, scale) {
        let tp = tiepoint.into_f64_vec()?;
        let sc = scale.into_f64_vec()?;
        if tp.len() >= 6 && sc.len() >= 2 {
            let (i, j, x, y) = (tp[0], tp[1], tp[3], tp[4]);
            let (sx, sy) = (sc[0], sc[1]);
            return Ok(Some(AffineTransform::new(sx, 0.0, x - i * sx, 0.0, -sy, y + j * sy)));
        }
    }

    Ok(None)
}

/// Read an ESRI world file (`.tfw`, `.tifw` or `.wld`) next to `path`
pub fn read_world_file(path: &Path) -> Result<Option<AffineTransform>> {
    for ext in ["tfw", "tifw", "wld"] {
        let candidate = path.with_extension(ext);
        if !candidate.is_file() {
            continue;
        }
        let text = std::fs::read_to_string(&candidate)?;
        return parse_world_file(&text)
            .map(Some)
            .map_err(|e| GrainError::input(format!("{}: {e}", candidate.display())));
    }
    Ok(None)
}

/// Parse the six lines of a world file (A, D, B, E, C, F).
///
/// C and F locate the centre of the upper-left pixel; the returned transform
/// maps the pixel corner, like the GeoTIFF tags do.
pub fn parse_world_file(text: &str) -> std::result::Result<AffineTransform, String> {
    let values = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| l.parse::<f64>().map_err(|_| format!("invalid world file line '{l}'")))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let [a, d, b, e, c, f] = values[..] else {
        return Err(format!("world file needs 6 values, found {}", values.len()));
    };
    Ok(AffineTransform::new(
        a,
        b,
        c - 0.5 * a - 0.5 * b,
        d,
        e,
        f - 0.5 * d - 0.5 * e,
    ))
}
