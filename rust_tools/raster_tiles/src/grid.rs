//! Tile grid planning in ground coordinates.
//!
//! A raster covering `extent_x` by `extent_y` ground units is split into
//! `floor(extent_x)` by `floor(extent_y)` tiles. Tiles are stretched uniformly so the
//! truncated count covers the whole raster, so a 3.5 m wide mosaic gives three tiles of
//! 1.1666 m rather than three 1 m tiles and a 0.5 m sliver.

use crate::error::{Result, TileError};
use log::debug;

/// Origin, resolution and pixel dimensions of a north-up raster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterGeoreference {
    /// Ground x of the top-left pixel corner
    pub origin_x: f64,
    /// Ground y of the top-left pixel corner
    pub origin_y: f64,
    /// Ground distance per pixel, as a positive magnitude
    pub pixel_size: f64,
    pub width_px: usize,
    pub height_px: usize,
}

impl RasterGeoreference {
    pub fn new(
        origin_x: f64,
        origin_y: f64,
        pixel_size: f64,
        width_px: usize,
        height_px: usize,
    ) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_size,
            width_px,
            height_px,
        }
    }

    /// Build from a GDAL geotransform. The y pixel size is conventionally negative in
    /// the geotransform; only the magnitude of the x pixel size is kept.
    pub fn from_geotransform(geotransform: &[f64; 6], width_px: usize, height_px: usize) -> Self {
        Self::new(
            geotransform[0],
            geotransform[3],
            geotransform[1].abs(),
            width_px,
            height_px,
        )
    }

    pub fn extent_x(&self) -> f64 {
        self.pixel_size * self.width_px as f64
    }

    pub fn extent_y(&self) -> f64 {
        self.pixel_size * self.height_px as f64
    }

    pub fn validate(&self) -> Result<()> {
        if !self.pixel_size.is_finite() || self.pixel_size <= 0.0 {
            return Err(TileError::InvalidGeoreference(format!(
                "pixel size must be positive, got {}",
                self.pixel_size
            )));
        }
        if self.width_px == 0 || self.height_px == 0 {
            return Err(TileError::InvalidGeoreference(format!(
                "raster dimensions must be positive, got {}x{}",
                self.width_px, self.height_px
            )));
        }
        if !self.origin_x.is_finite() || !self.origin_y.is_finite() {
            return Err(TileError::InvalidGeoreference(format!(
                "origin must be finite, got ({}, {})",
                self.origin_x, self.origin_y
            )));
        }
        Ok(())
    }
}

/// Ground-coordinate bounds of one grid cell, tagged with its grid indices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileBoundingBox {
    /// Column index, counted from the west edge
    pub i: usize,
    /// Row index, counted from the north edge
    pub j: usize,
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl TileBoundingBox {
    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    /// Bounds in `gdal_translate -projwin` order: (ulx, uly, lrx, lry)
    pub fn proj_win(&self) -> (f64, f64, f64, f64) {
        (self.xmin, self.ymax, self.xmax, self.ymin)
    }
}

#[derive(Debug, Clone)]
pub struct TileGrid {
    origin_x: f64,
    origin_y: f64,
    extent_x: f64,
    extent_y: f64,
    pub tile_size_x: f64,
    pub tile_size_y: f64,
    pub tile_count_x: usize,
    pub tile_count_y: usize,
    pub total_tiles: usize,
}

impl TileGrid {
    /// Plan the tile grid for a raster.
    ///
    /// A raster narrower or shorter than one ground unit yields an empty grid; that is
    /// not an error.
    pub fn plan(georef: &RasterGeoreference) -> Result<Self> {
        georef.validate()?;

        let extent_x = georef.extent_x();
        let extent_y = georef.extent_y();

        // Float-to-int casts saturate, so absurd extents surface as overflow below
        let tile_count_x = extent_x.floor() as usize;
        let tile_count_y = extent_y.floor() as usize;
        let total_tiles = tile_count_x.checked_mul(tile_count_y).ok_or_else(|| {
            TileError::InvalidGeoreference(format!(
                "{}x{} tiles exceeds the addressable tile count",
                tile_count_x, tile_count_y
            ))
        })?;

        let tile_size_x = if tile_count_x > 0 {
            extent_x / tile_count_x as f64
        } else {
            0.0
        };
        let tile_size_y = if tile_count_y > 0 {
            extent_y / tile_count_y as f64
        } else {
            0.0
        };

        debug!(
            "TileGrid: extent {:.6}x{:.6} → {}x{} tiles of {:.6}x{:.6} ({} total)",
            extent_x, extent_y, tile_count_x, tile_count_y, tile_size_x, tile_size_y, total_tiles
        );

        Ok(Self {
            origin_x: georef.origin_x,
            origin_y: georef.origin_y,
            extent_x,
            extent_y,
            tile_size_x,
            tile_size_y,
            tile_count_x,
            tile_count_y,
            total_tiles,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.total_tiles == 0
    }

    /// x breakpoint `i`, for `i` in `0..=tile_count_x`
    pub fn x_step(&self, i: usize) -> f64 {
        if i >= self.tile_count_x {
            // Pin the far edge to the raster extent instead of trusting step * count
            return self.origin_x + self.extent_x;
        }
        self.origin_x + self.tile_size_x * i as f64
    }

    /// y breakpoint `j`, for `j` in `0..=tile_count_y`. Decreases with `j`.
    pub fn y_step(&self, j: usize) -> f64 {
        if j >= self.tile_count_y {
            return self.origin_y - self.extent_y;
        }
        self.origin_y - self.tile_size_y * j as f64
    }

    pub fn iter(&self) -> TileIterator<'_> {
        TileIterator::new(self)
    }

    /// Tile at linear index `idx`; `i` is the outer (slow) index, `j` the inner one.
    ///
    /// `None` when `idx` is past the last tile, which is every index on an empty grid.
    pub fn get_tile(&self, idx: usize) -> Option<TileBoundingBox> {
        if idx >= self.total_tiles {
            return None;
        }
        let i = idx / self.tile_count_y;
        let j = idx % self.tile_count_y;

        Some(TileBoundingBox {
            i,
            j,
            xmin: self.x_step(i),
            xmax: self.x_step(i + 1),
            ymax: self.y_step(j),
            ymin: self.y_step(j + 1),
        })
    }
}

/// Plan the tiles covering `georef`.
pub fn plan(georef: &RasterGeoreference) -> Result<TileGrid> {
    TileGrid::plan(georef)
}

pub struct TileIterator<'a> {
    grid: &'a TileGrid,
    current_idx: usize,
}

impl<'a> TileIterator<'a> {
    fn new(grid: &'a TileGrid) -> Self {
        Self {
            grid,
            current_idx: 0,
        }
    }
}

impl<'a> Iterator for TileIterator<'a> {
    type Item = TileBoundingBox;

    fn next(&mut self) -> Option<Self::Item> {
        let tile = self.grid.get_tile(self.current_idx)?;
        self.current_idx += 1;
        Some(tile)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.grid.total_tiles - self.current_idx;
        (remaining, Some(remaining))
    }
}

impl<'a> ExactSizeIterator for TileIterator<'a> {}
