use crate::error::{Result, TileError};

pub const COMPRESSION_TYPES: [&str; 4] = ["DEFLATE", "LZW", "ZSTD", "NONE"];

/// Validate compression type
pub fn validate_compression(compression: &str) -> Result<()> {
    if !COMPRESSION_TYPES.contains(&compression) {
        return Err(TileError::InvalidCompression(compression.to_string()));
    }
    Ok(())
}

/// Validate internal block size (must be multiple of 16)
pub fn validate_block_size(block_size: usize) -> Result<()> {
    if block_size == 0 || block_size % 16 != 0 {
        return Err(TileError::InvalidBlockSize(block_size));
    }
    Ok(())
}

/// GeoTIFF creation options for every written tile
pub fn create_dataset_options(compression: &str, block_size: Option<usize>) -> Vec<String> {
    let mut options = vec![format!("COMPRESS={}", compression)];

    if let Some(size) = block_size {
        options.push("TILED=YES".to_string());
        options.push(format!("BLOCKXSIZE={}", size));
        options.push(format!("BLOCKYSIZE={}", size));
    }

    options.push("BIGTIFF=IF_SAFER".to_string());
    options
}
