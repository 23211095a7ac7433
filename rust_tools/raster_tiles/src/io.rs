use crate::crs::{check_ground_unit, detect_ground_unit};
use crate::error::{Result, TileError};
use crate::grid::{RasterGeoreference, TileBoundingBox};
use gdal::cpl::CslStringList;
use gdal::raster::{GdalDataType, GdalType, RasterBand};
use gdal::{Dataset, DriverManager, Metadata};
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Raster decoding and windowed extraction, as consumed by the tiling workflow
pub trait RasterBackend: Sync {
    /// Origin, resolution and pixel size of the raster at `path`
    fn read_georeference(&self, path: &Path) -> Result<RasterGeoreference>;

    /// Write the part of `source` covered by `bbox` to `output` at `resolution`
    fn extract_window(
        &self,
        source: &Path,
        bbox: &TileBoundingBox,
        resolution: f64,
        nodata: Option<f64>,
        output: &Path,
    ) -> Result<PathBuf>;
}

#[derive(Debug, Clone)]
pub struct RasterMetadata {
    pub width: usize,
    pub height: usize,
    pub band_count: usize,
    pub geotransform: [f64; 6],
    pub projection: String,
    pub nodata: Option<f64>,
    pub pixel_width: f64,
    pub pixel_height: f64,
}

impl RasterMetadata {
    pub fn georeference(&self) -> RasterGeoreference {
        RasterGeoreference::from_geotransform(&self.geotransform, self.width, self.height)
    }
}

/// Pixel offsets and size of a tile inside its source raster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWindow {
    pub col_off: usize,
    pub row_off: usize,
    pub cols: usize,
    pub rows: usize,
}

/// Why a tile box has no usable pixel window
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowError {
    #[error("lies outside the source raster")]
    OutsideRaster,

    #[error("is narrower than one source pixel")]
    Empty,
}

/// Map a tile box to source pixels, rounding each edge to the nearest pixel.
pub fn pixel_window(
    geotransform: &[f64; 6],
    raster_size: (usize, usize),
    bbox: &TileBoundingBox,
) -> std::result::Result<PixelWindow, WindowError> {
    let col_start = ((bbox.xmin - geotransform[0]) / geotransform[1]).round();
    let col_end = ((bbox.xmax - geotransform[0]) / geotransform[1]).round();
    let row_start = ((bbox.ymax - geotransform[3]) / geotransform[5]).round();
    let row_end = ((bbox.ymin - geotransform[3]) / geotransform[5]).round();

    // Negated comparisons so NaN edges are rejected too
    if !(col_start >= 0.0 && row_start >= 0.0) {
        return Err(WindowError::OutsideRaster);
    }
    if !(col_end <= raster_size.0 as f64 && row_end <= raster_size.1 as f64) {
        return Err(WindowError::OutsideRaster);
    }
    if col_end <= col_start || row_end <= row_start {
        return Err(WindowError::Empty);
    }

    Ok(PixelWindow {
        col_off: col_start as usize,
        row_off: row_start as usize,
        cols: (col_end - col_start) as usize,
        rows: (row_end - row_start) as usize,
    })
}

/// Output dimensions of a tile written at `resolution`
pub fn output_size(
    window: &PixelWindow,
    bbox: &TileBoundingBox,
    resolution: f64,
    source_pixel_size: f64,
) -> (usize, usize) {
    if (resolution - source_pixel_size).abs() <= source_pixel_size * 1e-9 {
        return (window.cols, window.rows);
    }
    let cols = (bbox.width() / resolution).round().max(1.0) as usize;
    let rows = (bbox.height() / resolution).round().max(1.0) as usize;
    (cols, rows)
}

/// Geotransform of a tile covering `window`, resampled to `out_size` pixels
pub fn window_geotransform(
    geotransform: &[f64; 6],
    window: &PixelWindow,
    out_size: (usize, usize),
) -> [f64; 6] {
    [
        geotransform[0] + window.col_off as f64 * geotransform[1],
        geotransform[1] * window.cols as f64 / out_size.0 as f64,
        0.0,
        geotransform[3] + window.row_off as f64 * geotransform[5],
        0.0,
        geotransform[5] * window.rows as f64 / out_size.1 as f64,
    ]
}

/// Reject geotransforms the planner cannot tile: rotated or south-up rasters
fn check_orientation(geotransform: &[f64; 6]) -> std::result::Result<(), String> {
    if geotransform[2] != 0.0 || geotransform[4] != 0.0 {
        return Err(format!(
            "rotated geotransform (row/column rotation {}, {}) is not supported",
            geotransform[2], geotransform[4]
        ));
    }
    if geotransform[5] >= 0.0 {
        return Err(format!(
            "raster is not north-up (y pixel size {})",
            geotransform[5]
        ));
    }
    Ok(())
}

/// Extract metadata from a dataset without reading pixel data
pub fn extract_metadata_from_dataset(dataset: &Dataset) -> Result<RasterMetadata> {
    let rasterband: RasterBand = dataset.rasterband(1)?;

    let width = rasterband.x_size() as usize;
    let height = rasterband.y_size() as usize;
    let nodata = rasterband.no_data_value();
    let geotransform = dataset.geo_transform()?;

    Ok(RasterMetadata {
        width,
        height,
        band_count: dataset.raster_count() as usize,
        geotransform,
        projection: dataset.projection(),
        nodata,
        pixel_width: geotransform[1].abs(),
        pixel_height: geotransform[5].abs(),
    })
}

/// `RasterBackend` on top of GDAL, writing every tile as a GeoTIFF
#[derive(Debug, Clone, Default)]
pub struct GdalBackend {
    creation_options: Vec<String>,
}

impl GdalBackend {
    pub fn new(creation_options: Vec<String>) -> Self {
        Self { creation_options }
    }

    fn open_dataset(path: &Path) -> Result<Dataset> {
        if !path.exists() {
            return Err(TileError::raster_open(path, "file not found"));
        }
        Dataset::open(path).map_err(|e| TileError::raster_open(path, e))
    }

    /// Read metadata and check the raster is something the planner can tile
    pub fn read_metadata(&self, path: &Path) -> Result<RasterMetadata> {
        let dataset = Self::open_dataset(path)?;
        let metadata = extract_metadata_from_dataset(&dataset)
            .map_err(|e| TileError::raster_open(path, e))?;
        check_orientation(&metadata.geotransform).map_err(|e| TileError::raster_open(path, e))?;
        Ok(metadata)
    }

    fn write_window<T: GdalType + Copy>(
        &self,
        source: &Dataset,
        metadata: &RasterMetadata,
        window: &PixelWindow,
        out_size: (usize, usize),
        nodata: Option<f64>,
        output: &Path,
    ) -> Result<()> {
        let driver = DriverManager::get_driver_by_name("GTiff")?;

        let mut gdal_options = CslStringList::new();
        for opt in &self.creation_options {
            gdal_options.add_string(opt)?;
        }

        let mut tile = driver.create_with_band_type_with_options::<T, _>(
            output,
            out_size.0,
            out_size.1,
            metadata.band_count,
            &gdal_options,
        )?;

        let filled = fill_tile::<T>(&mut tile, source, metadata, window, out_size, nodata);
        if filled.is_err() {
            // Close the handle first so GDAL does not flush into the removed path
            drop(tile);
            if let Err(e) = fs::remove_file(output) {
                warn!("Could not remove partial tile {}: {}", output.display(), e);
            }
        }
        filled
    }
}

fn fill_tile<T: GdalType + Copy>(
    tile: &mut Dataset,
    source: &Dataset,
    metadata: &RasterMetadata,
    window: &PixelWindow,
    out_size: (usize, usize),
    nodata: Option<f64>,
) -> Result<()> {
    tile.set_geo_transform(&window_geotransform(&metadata.geotransform, window, out_size))?;
    if !metadata.projection.is_empty() {
        tile.set_projection(&metadata.projection)?;
    }

    for band_index in 1..=metadata.band_count {
        let source_band = source.rasterband(band_index)?;
        let mut buffer = source_band.read_as::<T>(
            (window.col_off as isize, window.row_off as isize),
            (window.cols, window.rows),
            out_size,
            None,
        )?;

        let mut tile_band = tile.rasterband(band_index)?;
        tile_band.write((0, 0), out_size, &mut buffer)?;

        if let Some(nd) = nodata.or_else(|| source_band.no_data_value()) {
            tile_band.set_no_data_value(Some(nd))?;
        }

        let description = source_band.description()?;
        if !description.is_empty() {
            tile_band.set_description(&description)?;
        }
    }

    Ok(())
}

impl RasterBackend for GdalBackend {
    fn read_georeference(&self, path: &Path) -> Result<RasterGeoreference> {
        info!("Opening input raster: {}", path.display());
        let metadata = self.read_metadata(path)?;

        debug!(
            "Raster dimensions: {}x{}, {} band(s)",
            metadata.width, metadata.height, metadata.band_count
        );
        debug!(
            "Pixel size: {:.6} x {:.6}",
            metadata.pixel_width, metadata.pixel_height
        );

        if (metadata.pixel_width - metadata.pixel_height).abs() > 1e-9 {
            warn!(
                "Non-square pixels detected ({:.6} x {:.6}), using width for tiling",
                metadata.pixel_width, metadata.pixel_height
            );
        }

        let unit = detect_ground_unit(&metadata.projection);
        info!("Ground unit: {}", unit);
        check_ground_unit(&unit);

        Ok(metadata.georeference())
    }

    fn extract_window(
        &self,
        source: &Path,
        bbox: &TileBoundingBox,
        resolution: f64,
        nodata: Option<f64>,
        output: &Path,
    ) -> Result<PathBuf> {
        if !resolution.is_finite() || resolution <= 0.0 {
            return Err(TileError::extraction(
                output,
                format!("output resolution must be positive, got {}", resolution),
            ));
        }

        let dataset = Dataset::open(source).map_err(|e| TileError::extraction(output, e))?;
        let metadata = extract_metadata_from_dataset(&dataset)
            .map_err(|e| TileError::extraction(output, e))?;

        let window = pixel_window(
            &metadata.geotransform,
            (metadata.width, metadata.height),
            bbox,
        )
        .map_err(|e| {
            TileError::extraction(
                output,
                format!(
                    "tile ({}, {}) [{}, {}, {}, {}] {} ({}x{} px at {})",
                    bbox.i,
                    bbox.j,
                    bbox.xmin,
                    bbox.ymin,
                    bbox.xmax,
                    bbox.ymax,
                    e,
                    metadata.width,
                    metadata.height,
                    metadata.pixel_width
                ),
            )
        })?;
        let out_size = output_size(&window, bbox, resolution, metadata.pixel_width);

        debug!(
            "Extracting tile ({}, {}): window=({},{}) size=({},{}) → {}x{}",
            bbox.i,
            bbox.j,
            window.col_off,
            window.row_off,
            window.cols,
            window.rows,
            out_size.0,
            out_size.1
        );

        let band_type = dataset
            .rasterband(1)
            .map_err(|e| TileError::extraction(output, e))?
            .band_type();
        let written = match band_type {
            GdalDataType::UInt8 => {
                self.write_window::<u8>(&dataset, &metadata, &window, out_size, nodata, output)
            }
            GdalDataType::UInt16 => {
                self.write_window::<u16>(&dataset, &metadata, &window, out_size, nodata, output)
            }
            GdalDataType::Int16 => {
                self.write_window::<i16>(&dataset, &metadata, &window, out_size, nodata, output)
            }
            GdalDataType::UInt32 => {
                self.write_window::<u32>(&dataset, &metadata, &window, out_size, nodata, output)
            }
            GdalDataType::Int32 => {
                self.write_window::<i32>(&dataset, &metadata, &window, out_size, nodata, output)
            }
            GdalDataType::Float32 => {
                self.write_window::<f32>(&dataset, &metadata, &window, out_size, nodata, output)
            }
            GdalDataType::Float64 => {
                self.write_window::<f64>(&dataset, &metadata, &window, out_size, nodata, output)
            }
            other => {
                return Err(TileError::extraction(
                    output,
                    TileError::UnsupportedBandType(format!("{:?}", other)),
                ))
            }
        };

        written.map_err(|e| match e {
            TileError::Gdal(gdal_err) => TileError::extraction(output, gdal_err),
            other => other,
        })?;

        Ok(output.to_path_buf())
    }
}
