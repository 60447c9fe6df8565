use crate::error::{GrainError, Result};
use crate::models::Tile;

/// Plan the tile grid covering a `width` x `height` raster.
///
/// Origins step by `tile_size` along both axes, x outer and y inner. Tiles on
/// the right and bottom edges are clipped to the raster, so the grid covers it
/// exactly once. `tile_size` must be non-zero; see [`validate_tile_size`].
pub fn plan_tiles(width: u32, height: u32, tile_size: u32) -> Vec<Tile> {
    debug_assert!(tile_size > 0, "tile size must be positive");
    let step = tile_size.max(1) as usize;

    let mut tiles = Vec::with_capacity(tile_count(width, height, tile_size.max(1)));
    for x in (0..width).step_by(step) {
        for y in (0..height).step_by(step) {
            tiles.push(Tile {
                x,
                y,
                width: tile_size.min(width - x),
                height: tile_size.min(height - y),
            });
        }
    }
    tiles
}

/// Number of tiles [`plan_tiles`] produces
pub fn tile_count(width: u32, height: u32, tile_size: u32) -> usize {
    (width.div_ceil(tile_size) as usize) * (height.div_ceil(tile_size) as usize)
}

pub fn validate_tile_size(tile_size: u32) -> Result<u32> {
    if tile_size == 0 {
        return Err(GrainError::config("tile size must be greater than zero"));
    }
    Ok(tile_size)
}

/// Square window at (`x`, `y`) with side `size`, checked against the raster
pub fn manual_window(x: u32, y: u32, size: u32, raster_width: u32, raster_height: u32) -> Result<Tile> {
    let tile = Tile::new(x, y, size, size);
    if size == 0 || !tile.fits_within(raster_width, raster_height) {
        return Err(GrainError::input(format!(
            "location {x} {y} {size} does not fit inside the {raster_width}x{raster_height} image; \
             check that the upper left corner is within the image and size does not exceed it"
        )));
    }
    Ok(tile)
}
