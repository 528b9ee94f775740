//! Region-of-interest loading through OGR (KML, GeoJSON, GeoPackage, Shapefile).
use std::path::Path;

use gdal::Dataset;
use gdal::spatial_ref::SpatialRef;
use gdal::vector::LayerAccess;
use geo::{Geometry as GeoGeometry, MultiPolygon, Polygon};
use tracing::{debug, warn};

use crate::core::geometry::Geometry;
use crate::error::{Error, Result};

/// CRS assumed for layers that do not declare one (KML is always WGS84).
pub const DEFAULT_VECTOR_CRS: &str = "EPSG:4326";

fn srs_identifier(srs: &SpatialRef) -> Option<String> {
    match (srs.auth_name(), srs.auth_code()) {
        (Some(name), Ok(code)) => Some(format!("{}:{}", name, code)),
        _ => srs.to_wkt().ok(),
    }
}

fn collect_polygons(geom: GeoGeometry<f64>, out: &mut Vec<Polygon<f64>>) -> bool {
    match geom {
        GeoGeometry::Polygon(p) => {
            out.push(p);
            true
        }
        GeoGeometry::MultiPolygon(mp) => {
            out.extend(mp.0);
            true
        }
        GeoGeometry::Rect(r) => {
            out.push(r.to_polygon());
            true
        }
        GeoGeometry::GeometryCollection(gc) => {
            let mut any = false;
            for g in gc.0 {
                any |= collect_polygons(g, out);
            }
            any
        }
        _ => false,
    }
}

/// Fold per-layer footprints into one, expressed in the CRS of the first layer.
fn merge_layers(layers: Vec<Geometry>) -> Result<Option<Geometry>> {
    let mut layers = layers.into_iter();
    let Some(first) = layers.next() else {
        return Ok(None);
    };
    let crs = first.crs().unwrap_or(DEFAULT_VECTOR_CRS).to_string();
    let mut polygons = first.polygons().0.clone();
    for layer in layers {
        polygons.extend(layer.to_crs(&crs)?.polygons().0.iter().cloned());
    }
    Ok(Some(Geometry::new(MultiPolygon::new(polygons), Some(crs))))
}

/// Read every polygon of every layer of `path` into one footprint.
///
/// Layers in different CRSs are reprojected onto the CRS of the first polygon layer.
pub fn read_geometry<P: AsRef<Path>>(path: P) -> Result<Geometry> {
    let path = path.as_ref();
    let dataset = Dataset::open(path).map_err(|e| {
        Error::MalformedRequest(format!("cannot open vector file {}: {}", path.display(), e))
    })?;

    let mut layers = Vec::new();
    for mut layer in dataset.layers() {
        let crs = layer
            .spatial_ref()
            .as_ref()
            .and_then(srs_identifier)
            .unwrap_or_else(|| DEFAULT_VECTOR_CRS.to_string());
        let mut polygons = Vec::new();
        for feature in layer.features() {
            let Some(geometry) = feature.geometry() else {
                continue;
            };
            let converted = match geometry.to_geo() {
                Ok(g) => g,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable feature geometry");
                    continue;
                }
            };
            if !collect_polygons(converted, &mut polygons) {
                warn!(
                    path = %path.display(),
                    kind = %geometry.geometry_name(),
                    "Skipping non-polygon feature"
                );
            }
        }
        if !polygons.is_empty() {
            layers.push(Geometry::new(MultiPolygon::new(polygons), Some(crs)));
        }
    }

    let layer_count = layers.len();
    let Some(footprint) = merge_layers(layers)? else {
        return Err(Error::MalformedRequest(format!(
            "no polygon features in {}",
            path.display()
        )));
    };
    debug!(
        path = %path.display(),
        layers = layer_count,
        polygons = footprint.polygons().0.len(),
        crs = footprint.crs().unwrap_or_default(),
        "Loaded geometry"
    );
    Ok(footprint)
}
