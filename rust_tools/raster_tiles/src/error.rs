use thiserror::Error;

#[derive(Error, Debug)]
pub enum TileError {
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid georeference: {0}")]
    InvalidGeoreference(String),

    #[error("Cannot open raster {path}: {reason}")]
    RasterOpen { path: String, reason: String },

    #[error("Extraction into {path} failed: {reason}")]
    Extraction { path: String, reason: String },

    #[error("Invalid compression type: {0}")]
    InvalidCompression(String),

    #[error("Invalid block size: {0} (must be a positive multiple of 16)")]
    InvalidBlockSize(usize),

    #[error("Unsupported band data type: {0}")]
    UnsupportedBandType(String),

    #[error("{failed} of {total} tiles failed")]
    TilesFailed { failed: usize, total: usize },

    #[error("{failed} of {total} rasters could not be tiled")]
    RastersFailed { failed: usize, total: usize },
}

impl TileError {
    pub(crate) fn raster_open(path: impl AsRef<std::path::Path>, reason: impl ToString) -> Self {
        TileError::RasterOpen {
            path: path.as_ref().display().to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn extraction(path: impl AsRef<std::path::Path>, reason: impl ToString) -> Self {
        TileError::Extraction {
            path: path.as_ref().display().to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TileError>;
