#![allow(dead_code)]

use std::path::{Path, PathBuf};

use ndarray::Array3;
use skyfuse::{GeoTransform, LinearFusionModel, Raster, RasterDataType, write_raster};

pub const CRS: &str = "EPSG:32635";

pub fn transform() -> GeoTransform {
    GeoTransform::north_up(500_000.0, 4_200_000.0, 10.0, -10.0)
}

/// Optical DN stack with distinct values per band and pixel.
pub fn optical(rows: usize, cols: usize) -> Raster {
    let bands = Array3::from_shape_fn((13, rows, cols), |(b, r, c)| {
        (1000 + b * 100 + r * 10 + c) as f64
    });
    Raster::new(bands, transform(), CRS, None, RasterDataType::F32).unwrap()
}

/// VV/VH backscatter in dB.
pub fn radar(rows: usize, cols: usize) -> Raster {
    let bands = Array3::from_shape_fn((2, rows, cols), |(b, _, _)| if b == 0 { -12.0 } else { -19.0 });
    Raster::new(bands, transform(), CRS, None, RasterDataType::F32).unwrap()
}

pub fn write(dir: &Path, name: &str, raster: &Raster) -> PathBuf {
    let path = dir.join(name);
    write_raster(&path, raster).unwrap();
    path
}

/// Identity fusion weights as a JSON checkpoint.
pub fn identity_checkpoint(dir: &Path) -> PathBuf {
    let path = dir.join("fusion.json");
    let ckpt = LinearFusionModel::identity().to_checkpoint();
    std::fs::write(&path, serde_json::to_vec(&ckpt).unwrap()).unwrap();
    path
}

/// GeoJSON rectangle in the test CRS.
pub fn footprint(dir: &Path, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> PathBuf {
    let path = dir.join("roi.geojson");
    let geojson = serde_json::json!({
        "type": "FeatureCollection",
        "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::32635"}},
        "features": [{
            "type": "Feature",
            "properties": {},
            "geometry": {
                "type": "Polygon",
                "coordinates": [[
                    [min_x, min_y], [max_x, min_y], [max_x, max_y], [min_x, max_y], [min_x, min_y]
                ]]
            }
        }]
    });
    std::fs::write(&path, serde_json::to_vec(&geojson).unwrap()).unwrap();
    path
}
