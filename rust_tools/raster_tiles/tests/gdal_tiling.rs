use gdal::raster::{Buffer, GdalDataType};
use gdal::{Dataset, DriverManager, Metadata};
use raster_tiles::io::{pixel_window, WindowError};
use raster_tiles::{plan, tile_raster, GdalBackend, RasterBackend, TileError, TilingOptions};
use std::path::{Path, PathBuf};

const WIDTH: usize = 30;
const HEIGHT: usize = 20;
const GEOTRANSFORM: [f64; 6] = [500000.0, 0.1, 0.0, 5200000.0, 0.0, -0.1];

/// 3 m x 2 m raster at 10 cm, pixel value = col + 100 * row
fn write_source(dir: &Path, geotransform: [f64; 6]) -> PathBuf {
    let path = dir.join("DEM_reef_slope.tif");
    let driver = DriverManager::get_driver_by_name("GTiff").unwrap();
    let mut dataset = driver
        .create_with_band_type::<f32, _>(&path, WIDTH, HEIGHT, 1)
        .unwrap();
    dataset.set_geo_transform(&geotransform).unwrap();

    let data: Vec<f32> = (0..HEIGHT)
        .flat_map(|row| (0..WIDTH).map(move |col| (col + 100 * row) as f32))
        .collect();
    let mut band = dataset.rasterband(1).unwrap();
    let mut buffer = Buffer::new((WIDTH, HEIGHT), data);
    band.write((0, 0), (WIDTH, HEIGHT), &mut buffer).unwrap();
    band.set_no_data_value(Some(-9999.0)).unwrap();

    path
}

/// Same footprint as `write_source`, three byte bands named red/green/blue,
/// pixel value = 50 * band + col + row
fn write_rgb_source(dir: &Path) -> PathBuf {
    let path = dir.join("ortho_rgb.tif");
    let driver = DriverManager::get_driver_by_name("GTiff").unwrap();
    let mut dataset = driver
        .create_with_band_type::<u8, _>(&path, WIDTH, HEIGHT, 3)
        .unwrap();
    dataset.set_geo_transform(&GEOTRANSFORM).unwrap();

    for (band_index, name) in [(1, "red"), (2, "green"), (3, "blue")] {
        let data: Vec<u8> = (0..HEIGHT)
            .flat_map(|row| (0..WIDTH).map(move |col| (50 * band_index + col + row) as u8))
            .collect();
        let mut band = dataset.rasterband(band_index).unwrap();
        let mut buffer = Buffer::new((WIDTH, HEIGHT), data);
        band.write((0, 0), (WIDTH, HEIGHT), &mut buffer).unwrap();
        band.set_description(name).unwrap();
    }

    path
}

#[test]
fn test_read_georeference() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), GEOTRANSFORM);

    let georef = GdalBackend::default().read_georeference(&source).unwrap();
    assert_eq!(georef.origin_x, 500000.0);
    assert_eq!(georef.origin_y, 5200000.0);
    assert_eq!(georef.pixel_size, 0.1);
    assert_eq!((georef.width_px, georef.height_px), (WIDTH, HEIGHT));
}

#[test]
fn test_missing_raster_is_open_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = GdalBackend::default().read_georeference(&dir.path().join("missing.tif"));
    assert!(matches!(result, Err(TileError::RasterOpen { .. })));
}

#[test]
fn test_south_up_raster_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), [0.0, 0.1, 0.0, 0.0, 0.0, 0.1]);
    let result = GdalBackend::default().read_georeference(&source);
    assert!(matches!(result, Err(TileError::RasterOpen { .. })));
}

#[test]
fn test_tiles_written_with_source_pixels() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), GEOTRANSFORM);
    let out_dir = dir.path().join("tiles");

    let report = tile_raster(&GdalBackend::default(), &source, &TilingOptions::new(&out_dir)).unwrap();
    assert_eq!(report.planned, 6);
    assert_eq!(report.written.len(), 6);
    assert!(report.is_complete());

    // Tile (1, 0): second metre east, first metre south of the origin
    let tile = Dataset::open(out_dir.join("DEM_reef_slope_tile_1_0.tif")).unwrap();
    assert_eq!(tile.raster_size(), (10, 10));

    let gt = tile.geo_transform().unwrap();
    assert!((gt[0] - 500001.0).abs() < 1e-6);
    assert!((gt[3] - 5200000.0).abs() < 1e-6);
    assert!((gt[1] - 0.1).abs() < 1e-12);
    assert!((gt[5] + 0.1).abs() < 1e-12);

    let band = tile.rasterband(1).unwrap();
    assert_eq!(band.no_data_value(), Some(-9999.0));
    let pixels = band.read_as::<f32>((0, 0), (10, 10), (10, 10), None).unwrap();
    assert_eq!(pixels.data()[0], 10.0);
    assert_eq!(pixels.data()[99], 19.0 + 900.0);
}

#[test]
fn test_extract_outside_raster_fails() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), GEOTRANSFORM);
    let backend = GdalBackend::default();

    let georef = backend.read_georeference(&source).unwrap();
    let mut bbox = plan(&georef).unwrap().get_tile(0).unwrap();
    bbox.xmin -= 5.0;
    bbox.xmax -= 5.0;
    assert_eq!(
        pixel_window(&GEOTRANSFORM, (WIDTH, HEIGHT), &bbox),
        Err(WindowError::OutsideRaster)
    );

    let result = backend.extract_window(&source, &bbox, 0.1, None, &dir.path().join("out.tif"));
    assert!(matches!(result, Err(TileError::Extraction { .. })));
}

#[test]
fn test_nodata_override_and_coarser_resolution() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), GEOTRANSFORM);
    let backend = GdalBackend::default();

    let georef = backend.read_georeference(&source).unwrap();
    let bbox = plan(&georef).unwrap().get_tile(0).unwrap();
    let output = dir.path().join("coarse.tif");
    backend
        .extract_window(&source, &bbox, 0.2, Some(-1.0), &output)
        .unwrap();

    let tile = Dataset::open(&output).unwrap();
    assert_eq!(tile.raster_size(), (5, 5));
    let gt = tile.geo_transform().unwrap();
    assert!((gt[1] - 0.2).abs() < 1e-12);
    assert_eq!(tile.rasterband(1).unwrap().no_data_value(), Some(-1.0));
}

#[test]
fn test_multiband_byte_tiles_keep_type_and_descriptions() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_rgb_source(dir.path());
    let out_dir = dir.path().join("tiles");

    let report = tile_raster(&GdalBackend::default(), &source, &TilingOptions::new(&out_dir)).unwrap();
    assert_eq!(report.written.len(), 6);

    let tile = Dataset::open(out_dir.join("ortho_rgb_tile_1_0.tif")).unwrap();
    assert_eq!(tile.raster_size(), (10, 10));
    assert_eq!(tile.raster_count(), 3);

    for (band_index, name) in [(1, "red"), (2, "green"), (3, "blue")] {
        let band = tile.rasterband(band_index).unwrap();
        assert_eq!(band.band_type(), GdalDataType::UInt8);
        assert_eq!(band.description().unwrap(), name);

        let pixels = band.read_as::<u8>((0, 0), (10, 10), (10, 10), None).unwrap();
        // Top-left of the tile is source column 10, row 0
        assert_eq!(pixels.data()[0], (50 * band_index + 10) as u8);
        assert_eq!(pixels.data()[99], (50 * band_index + 19 + 9) as u8);
    }
}

#[test]
fn test_unsupported_band_type_is_extraction_error() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("counts.vrt");
    std::fs::write(
        &source,
        r#"<VRTDataset rasterXSize="20" rasterYSize="20">
  <GeoTransform>0.0, 0.1, 0.0, 2.0, 0.0, -0.1</GeoTransform>
  <VRTRasterBand dataType="Int64" band="1"/>
</VRTDataset>"#,
    )
    .unwrap();
    let backend = GdalBackend::default();

    let georef = backend.read_georeference(&source).unwrap();
    let bbox = plan(&georef).unwrap().get_tile(0).unwrap();
    let output = dir.path().join("counts_tile_0_0.tif");

    match backend.extract_window(&source, &bbox, 0.1, None, &output) {
        Err(TileError::Extraction { reason, .. }) => {
            assert!(reason.contains("Unsupported band data type"), "{}", reason)
        }
        other => panic!("expected an extraction error, got {:?}", other),
    }
    assert!(!output.exists());
}
