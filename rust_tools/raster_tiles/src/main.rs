use clap::Parser;
use env_logger::Env;
use log::{error, info, warn};
use std::path::Path;

use raster_tiles::cli::Args;
use raster_tiles::creation::{create_dataset_options, validate_block_size, validate_compression};
use raster_tiles::tiler::{
    check_reports, tile_prefixes, tile_raster_as, FailurePolicy, TilingOptions,
};
use raster_tiles::{GdalBackend, Result, TileError};

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logger
    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    info!("=== Raster Tiler ===");

    // Set thread pool size if specified
    if let Some(n_threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .build_global()
            .expect("Failed to build thread pool");
        info!("Extracting tiles on {} threads", n_threads);
    }

    validate_compression(&args.compression)?;
    if let Some(block_size) = args.block_size {
        validate_block_size(block_size)?;
    }

    let backend = GdalBackend::new(create_dataset_options(&args.compression, args.block_size));

    let options = TilingOptions {
        output_dir: args.output_dir.clone().into(),
        nodata: args.nodata,
        on_error: args.on_error,
        retries: args.retries,
        skip_existing: args.skip_existing,
        parallel: args.threads.is_some(),
        dry_run: args.dry_run,
    };

    if let Some(nd) = options.nodata {
        info!("Using nodata value: {}", nd);
    }

    let mut reports = Vec::with_capacity(args.inputs.len());
    let mut unreadable = 0;
    let prefixes = tile_prefixes(&args.inputs);
    for (input, prefix) in args.inputs.iter().zip(&prefixes) {
        let input = Path::new(input);
        if input.file_stem().map_or(true, |stem| stem.to_string_lossy() != prefix.as_str()) {
            warn!("Tiles of {} are named {}_tile_*", input.display(), prefix);
        }
        match tile_raster_as(&backend, input, prefix, &options) {
            Ok(report) => reports.push(report),
            Err(e) if options.on_error == FailurePolicy::Continue => {
                error!("Skipping {}: {}", input.display(), e);
                unreadable += 1;
            }
            Err(e) => return Err(e),
        }
    }

    let written: usize = reports.iter().map(|r| r.written.len()).sum();
    info!(
        "Wrote {} tiles from {} of {} rasters to {}",
        written,
        reports.len(),
        args.inputs.len(),
        args.output_dir
    );

    check_reports(&reports)?;
    if unreadable > 0 {
        return Err(TileError::RastersFailed {
            failed: unreadable,
            total: args.inputs.len(),
        });
    }

    info!("=== Done! ===");
    Ok(())
}
