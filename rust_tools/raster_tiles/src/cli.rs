use crate::tiler::FailurePolicy;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "raster-tiles")]
#[command(about = "Split georeferenced rasters into tiles spanning whole ground units")]
#[command(version)]
pub struct Args {
    /// Input raster path (orthomosaic or DEM); repeat for several rasters
    #[arg(short, long = "input", value_name = "FILE", required = true)]
    pub inputs: Vec<String>,

    /// Directory the tiles are written to (created if missing)
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: String,

    /// Nodata value for written tiles (default: read from input)
    #[arg(long, value_name = "VALUE", allow_hyphen_values = true)]
    pub nodata: Option<f64>,

    /// Compression of written tiles (DEFLATE, LZW, ZSTD, NONE)
    #[arg(long, value_name = "TYPE", default_value = "NONE")]
    pub compression: String,

    /// Write internally tiled GeoTIFFs with this block size (multiple of 16)
    #[arg(long, value_name = "PIXELS")]
    pub block_size: Option<usize>,

    /// What to do when a tile cannot be written
    #[arg(long, value_enum, default_value_t = FailurePolicy::Continue)]
    pub on_error: FailurePolicy,

    /// Extra attempts for a tile that failed to write
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub retries: usize,

    /// Keep tiles that already exist in the output directory
    #[arg(long)]
    pub skip_existing: bool,

    /// Log the planned tile bounds without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Extract tiles in parallel on this many threads
    #[arg(short, long, value_name = "N")]
    pub threads: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["raster-tiles", "-i", "dem.tif", "-o", "tiles"]).unwrap();
        assert_eq!(args.inputs, vec!["dem.tif"]);
        assert_eq!(args.output_dir, "tiles");
        assert_eq!(args.compression, "NONE");
        assert_eq!(args.on_error, FailurePolicy::Continue);
        assert_eq!(args.retries, 0);
        assert!(args.threads.is_none());
        assert!(!args.dry_run);
    }

    #[test]
    fn test_multiple_inputs_and_options() {
        let args = Args::try_parse_from([
            "raster-tiles",
            "-i",
            "dem.tif",
            "-i",
            "ortho.tif",
            "-o",
            "tiles",
            "--nodata",
            "-9999",
            "--on-error",
            "abort",
            "-t",
            "4",
        ])
        .unwrap();
        assert_eq!(args.inputs, vec!["dem.tif", "ortho.tif"]);
        assert_eq!(args.nodata, Some(-9999.0));
        assert_eq!(args.on_error, FailurePolicy::Abort);
        assert_eq!(args.threads, Some(4));
    }

    #[test]
    fn test_input_required() {
        assert!(Args::try_parse_from(["raster-tiles", "-o", "tiles"]).is_err());
    }
}
