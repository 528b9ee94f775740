mod common;

use approx::assert_relative_eq;
use skyfuse::{
    Error, IndexName, IndexReportOptions, RasterDataType, clip_raster_file, compute_index_report,
    read_raster,
};
use tempfile::tempdir;

#[test]
fn geotiff_round_trip_keeps_georeferencing() {
    let dir = tempdir().unwrap();
    let source = common::optical(6, 5);
    let path = common::write(dir.path(), "scene.tif", &source);

    let back = read_raster(&path).unwrap();
    assert_eq!(back.band_count(), 13);
    assert_eq!(back.shape(), (6, 5));
    assert_eq!(back.data_type(), RasterDataType::F32);
    assert_eq!(back.crs(), common::CRS);
    for (a, b) in back
        .transform()
        .to_gdal()
        .iter()
        .zip(source.transform().to_gdal().iter())
    {
        assert_relative_eq!(*a, *b, epsilon = 1e-9);
    }
    assert_relative_eq!(back.band(7)[[2, 3]], source.band(7)[[2, 3]], epsilon = 1e-3);
}

#[test]
fn clip_file_crops_to_footprint() {
    let dir = tempdir().unwrap();
    let raster = common::write(dir.path(), "scene.tif", &common::optical(10, 10));
    // Pixel centres of columns 2..=5 and rows 3..=6.
    let roi = common::footprint(dir.path(), 500_020.0, 4_199_930.0, 500_060.0, 4_199_970.0);
    let output = dir.path().join("scene_crop.tif");

    clip_raster_file(&raster, &roi, &output).unwrap();
    let clipped = read_raster(&output).unwrap();
    assert_eq!(clipped.shape(), (4, 4));
    assert_eq!(clipped.band_count(), 13);
    let (x0, y0) = clipped.transform().apply(0.0, 0.0);
    assert_relative_eq!(x0, 500_020.0, epsilon = 1e-6);
    assert_relative_eq!(y0, 4_199_970.0, epsilon = 1e-6);
    // band 0, row 3, col 2 of the source
    assert_relative_eq!(clipped.band(0)[[0, 0]], 1032.0, epsilon = 1e-3);
}

#[test]
fn clip_outside_raster_is_empty() {
    let dir = tempdir().unwrap();
    let raster = common::write(dir.path(), "scene.tif", &common::optical(4, 4));
    let roi = common::footprint(dir.path(), 600_000.0, 4_000_000.0, 600_100.0, 4_000_100.0);
    let err = clip_raster_file(&raster, &roi, &dir.path().join("out.tif")).unwrap_err();
    assert!(matches!(err, Error::EmptyClipResult));
    assert!(!dir.path().join("out.tif").exists());
}

#[test]
fn index_report_writes_rasters_and_heatmaps() {
    let dir = tempdir().unwrap();
    let input = common::write(dir.path(), "scene.tif", &common::optical(4, 4));
    let out = dir.path().join("indices");
    let mut options = IndexReportOptions::new(&out);
    options.indices = vec![IndexName::Ndvi, IndexName::Ndwi];

    let entries = compute_index_report(&input, &options).unwrap();
    assert_eq!(entries.len(), 2);
    for entry in &entries {
        assert!(entry.error.is_none(), "{}", entry);
        assert!(entry.raster.as_ref().unwrap().exists());
        let heatmap = entry.heatmap.as_ref().unwrap();
        assert!(heatmap.exists());
        assert!(heatmap.with_extension("jgw").exists());
    }

    let ndvi = read_raster(out.join("NDVI.tif")).unwrap();
    assert_eq!(ndvi.band_count(), 1);
    assert_eq!(ndvi.shape(), (4, 4));
    // (B8 - B4) / (B8 + B4) at the origin pixel: (1700 - 1300) / 3000
    assert_relative_eq!(ndvi.band(0)[[0, 0]], 400.0 / 3000.0, epsilon = 1e-6);
}

#[test]
fn heatmap_failure_keeps_the_index_result() {
    let dir = tempdir().unwrap();
    let input = common::write(dir.path(), "scene.tif", &common::optical(4, 4));
    let out = dir.path().join("indices");
    // A directory squatting on the JPEG path makes the heat map unwritable.
    std::fs::create_dir_all(out.join("NDVI_heatmap.jpg")).unwrap();
    let mut options = IndexReportOptions::new(&out);
    options.indices = vec![IndexName::Ndvi];

    let entries = compute_index_report(&input, &options).unwrap();
    let ndvi = &entries[0];
    assert!(ndvi.error.is_none(), "{}", ndvi);
    assert!(ndvi.verdict.is_some());
    assert!(ndvi.raster.as_ref().unwrap().exists());
    assert!(ndvi.heatmap.is_none());
    assert!(ndvi.heatmap_error.is_some());
    assert!(ndvi.to_string().ends_with("[no heat map]"));
}
