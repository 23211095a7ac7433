use crate::error::{Result, TileError};
use crate::grid::{plan, TileBoundingBox};
use crate::io::RasterBackend;
use clap::ValueEnum;
use log::{debug, error, info, warn};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// What to do when a single tile cannot be extracted
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FailurePolicy {
    /// Log the failure and keep extracting the remaining tiles
    Continue,
    /// Stop at the first failed tile
    Abort,
}

#[derive(Debug, Clone)]
pub struct TilingOptions {
    pub output_dir: PathBuf,
    pub nodata: Option<f64>,
    pub on_error: FailurePolicy,
    pub retries: usize,
    pub skip_existing: bool,
    pub parallel: bool,
    pub dry_run: bool,
}

impl TilingOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            nodata: None,
            on_error: FailurePolicy::Continue,
            retries: 0,
            skip_existing: false,
            parallel: false,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TileFailure {
    pub i: usize,
    pub j: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct TilingReport {
    pub source: PathBuf,
    pub planned: usize,
    pub written: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<TileFailure>,
}

impl TilingReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

enum TileOutcome {
    Written(PathBuf),
    Skipped(PathBuf),
    Planned,
}

/// File name of tile `(i, j)` cut from a raster named `stem`
pub fn tile_file_name(stem: &str, bbox: &TileBoundingBox) -> String {
    format!("{}_tile_{}_{}.tif", stem, bbox.i, bbox.j)
}

fn source_stem(input: &Path) -> String {
    input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "raster".to_string())
}

/// Tile name prefix for each input, unique across `inputs`.
///
/// The file stem is used as is unless another input shares it; rasters with a shared
/// stem are numbered in input order (`DEM_1`, `DEM_2`) so their tiles never collide
/// in one output directory.
pub fn tile_prefixes<I, P>(inputs: I) -> Vec<String>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let stems: Vec<String> = inputs
        .into_iter()
        .map(|p| source_stem(p.as_ref()))
        .collect();

    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut prefixes = Vec::with_capacity(stems.len());
    for stem in &stems {
        let shared = stems.iter().filter(|s| *s == stem).count() > 1;
        if shared {
            let n = seen.entry(stem.as_str()).or_insert(0);
            *n += 1;
            prefixes.push(format!("{}_{}", stem, n));
        } else {
            prefixes.push(stem.clone());
        }
    }

    // A numbered name can still equal another input's stem (`DEM_1.tif` next to two
    // `DEM.tif`); fall back to the input position for those
    let mut used: HashSet<String> = HashSet::new();
    prefixes
        .into_iter()
        .enumerate()
        .map(|(idx, prefix)| {
            if used.insert(prefix.clone()) {
                prefix
            } else {
                let fallback = format!("{}_input{}", prefix, idx + 1);
                used.insert(fallback.clone());
                fallback
            }
        })
        .collect()
}

/// Plan the tile grid of `input` and extract every tile into `options.output_dir`,
/// naming tiles after the input's file stem
pub fn tile_raster<B: RasterBackend>(
    backend: &B,
    input: &Path,
    options: &TilingOptions,
) -> Result<TilingReport> {
    tile_raster_as(backend, input, &source_stem(input), options)
}

/// Like [`tile_raster`], naming tiles `{prefix}_tile_{i}_{j}.tif`
pub fn tile_raster_as<B: RasterBackend>(
    backend: &B,
    input: &Path,
    prefix: &str,
    options: &TilingOptions,
) -> Result<TilingReport> {
    let georef = backend.read_georeference(input)?;
    info!(
        "Raster {}: {}x{} px at {:.6} → extent {:.3} x {:.3}",
        input.display(),
        georef.width_px,
        georef.height_px,
        georef.pixel_size,
        georef.extent_x(),
        georef.extent_y()
    );

    let grid = plan(&georef)?;
    let mut report = TilingReport {
        source: input.to_path_buf(),
        planned: grid.total_tiles,
        ..Default::default()
    };

    if grid.is_empty() {
        warn!(
            "Raster {} is smaller than one ground unit ({:.3} x {:.3}), no tiles produced",
            input.display(),
            georef.extent_x(),
            georef.extent_y()
        );
        return Ok(report);
    }

    info!(
        "Planned {}x{} tiles of {:.6} x {:.6} ({} total)",
        grid.tile_count_x, grid.tile_count_y, grid.tile_size_x, grid.tile_size_y, grid.total_tiles
    );

    if !options.dry_run {
        fs::create_dir_all(&options.output_dir)?;
    }

    let tiles: Vec<TileBoundingBox> = grid.iter().collect();

    let run = |bbox: &TileBoundingBox| -> Result<TileOutcome> {
        let output = options.output_dir.join(tile_file_name(prefix, bbox));
        process_tile(backend, input, bbox, georef.pixel_size, &output, options)
    };

    let results: Vec<(TileBoundingBox, Result<TileOutcome>)> = if options.parallel {
        match options.on_error {
            FailurePolicy::Abort => tiles
                .par_iter()
                .map(|bbox| run(bbox).map(|outcome| (*bbox, Ok(outcome))))
                .collect::<Result<Vec<_>>>()?,
            FailurePolicy::Continue => tiles.par_iter().map(|bbox| (*bbox, run(bbox))).collect(),
        }
    } else {
        let mut results = Vec::with_capacity(tiles.len());
        for bbox in &tiles {
            let outcome = run(bbox);
            if options.on_error == FailurePolicy::Abort {
                results.push((*bbox, Ok(outcome?)));
            } else {
                results.push((*bbox, outcome));
            }
        }
        results
    };

    for (bbox, outcome) in results {
        match outcome {
            Ok(TileOutcome::Written(path)) => report.written.push(path),
            Ok(TileOutcome::Skipped(path)) => report.skipped.push(path),
            Ok(TileOutcome::Planned) => {}
            Err(e) => {
                error!("Tile ({}, {}) failed: {}", bbox.i, bbox.j, e);
                report.failed.push(TileFailure {
                    i: bbox.i,
                    j: bbox.j,
                    reason: e.to_string(),
                });
            }
        }
    }

    info!(
        "Raster {}: {} written, {} skipped, {} failed of {} planned",
        input.display(),
        report.written.len(),
        report.skipped.len(),
        report.failed.len(),
        report.planned
    );

    Ok(report)
}

fn process_tile<B: RasterBackend>(
    backend: &B,
    input: &Path,
    bbox: &TileBoundingBox,
    resolution: f64,
    output: &Path,
    options: &TilingOptions,
) -> Result<TileOutcome> {
    if options.dry_run {
        info!(
            "Tile ({}, {}): xmin={} ymin={} xmax={} ymax={} → {}",
            bbox.i,
            bbox.j,
            bbox.xmin,
            bbox.ymin,
            bbox.xmax,
            bbox.ymax,
            output.display()
        );
        return Ok(TileOutcome::Planned);
    }

    if options.skip_existing && output.exists() {
        debug!("Tile ({}, {}) exists, skipping {}", bbox.i, bbox.j, output.display());
        return Ok(TileOutcome::Skipped(output.to_path_buf()));
    }

    debug!(
        "Tile ({}, {}): xmin={} ymin={} xmax={} ymax={}",
        bbox.i, bbox.j, bbox.xmin, bbox.ymin, bbox.xmax, bbox.ymax
    );

    let mut attempt = 0;
    loop {
        match backend.extract_window(input, bbox, resolution, options.nodata, output) {
            Ok(path) => return Ok(TileOutcome::Written(path)),
            Err(e) if attempt < options.retries => {
                attempt += 1;
                warn!(
                    "Tile ({}, {}) attempt {} failed, retrying: {}",
                    bbox.i, bbox.j, attempt, e
                );
            }
            Err(e) => {
                remove_partial_tile(output);
                return Err(e);
            }
        }
    }
}

fn remove_partial_tile(output: &Path) {
    if output.exists() {
        match fs::remove_file(output) {
            Ok(()) => debug!("Removed partial tile {}", output.display()),
            Err(e) => warn!("Could not remove partial tile {}: {}", output.display(), e),
        }
    }
}

/// Fail the run when any tile in `reports` failed
pub fn check_reports(reports: &[TilingReport]) -> Result<()> {
    let failed: usize = reports.iter().map(|r| r.failed.len()).sum();
    let total: usize = reports.iter().map(|r| r.planned).sum();
    if failed > 0 {
        return Err(TileError::TilesFailed { failed, total });
    }
    Ok(())
}
