// Library exports for testing and reuse

pub mod cli;
pub mod creation;
pub mod crs;
pub mod error;
pub mod grid;
pub mod io;
pub mod tiler;

// Re-export commonly used types
pub use error::{Result, TileError};
pub use grid::{plan, RasterGeoreference, TileBoundingBox, TileGrid};
pub use io::{GdalBackend, RasterBackend, RasterMetadata};
pub use tiler::{tile_prefixes, tile_raster, tile_raster_as, FailurePolicy, TilingOptions, TilingReport};
