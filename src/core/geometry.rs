//! Vector footprint used as a clip mask: a union of polygons in a declared CRS.
use gdal::spatial_ref::{AxisMappingStrategy, CoordTransform, SpatialRef};
use geo::{BoundingRect, Coord, LineString, MultiPolygon, Polygon, Rect};
use tracing::debug;

use crate::error::{Error, Result};

/// Polygon footprint. Never mutated after load; reprojection returns a new value.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    polygons: MultiPolygon<f64>,
    crs: Option<String>,
}

impl Geometry {
    pub fn new(polygons: MultiPolygon<f64>, crs: Option<String>) -> Self {
        Self { polygons, crs }
    }

    pub fn from_polygon(polygon: Polygon<f64>, crs: Option<String>) -> Self {
        Self::new(MultiPolygon::new(vec![polygon]), crs)
    }

    /// Axis-aligned rectangle, handy for tests and bbox requests.
    pub fn from_rect(min_x: f64, min_y: f64, max_x: f64, max_y: f64, crs: Option<String>) -> Self {
        let rect = Rect::new(Coord { x: min_x, y: min_y }, Coord { x: max_x, y: max_y });
        Self::from_polygon(rect.to_polygon(), crs)
    }

    pub fn polygons(&self) -> &MultiPolygon<f64> {
        &self.polygons
    }

    pub fn crs(&self) -> Option<&str> {
        self.crs.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.0.is_empty()
    }

    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        self.polygons.bounding_rect()
    }

    /// Express the footprint in `target_crs`.
    ///
    /// An undeclared CRS on either side, or an identical definition, returns the geometry as is.
    pub fn to_crs(&self, target_crs: &str) -> Result<Geometry> {
        let source_crs = match self.crs.as_deref() {
            Some(c) if !c.trim().is_empty() => c,
            _ => return Ok(self.clone()),
        };
        if target_crs.trim().is_empty() || same_definition(source_crs, target_crs) {
            return Ok(self.clone());
        }

        let mismatch = |reason: String| Error::GeometryCrsMismatch {
            geometry_crs: source_crs.to_string(),
            raster_crs: target_crs.to_string(),
            reason,
        };

        let mut src = SpatialRef::from_definition(source_crs).map_err(|e| mismatch(e.to_string()))?;
        let mut dst = SpatialRef::from_definition(target_crs).map_err(|e| mismatch(e.to_string()))?;
        if src == dst {
            return Ok(Geometry::new(self.polygons.clone(), Some(target_crs.to_string())));
        }
        src.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
        dst.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
        let ct = CoordTransform::new(&src, &dst).map_err(|e| mismatch(e.to_string()))?;

        let mut out = Vec::with_capacity(self.polygons.0.len());
        for polygon in &self.polygons.0 {
            let exterior = transform_ring(polygon.exterior(), &ct).map_err(&mismatch)?;
            let interiors = polygon
                .interiors()
                .iter()
                .map(|ring| transform_ring(ring, &ct))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(&mismatch)?;
            out.push(Polygon::new(exterior, interiors));
        }
        debug!(from = source_crs, to = target_crs, polygons = out.len(), "Reprojected geometry");
        Ok(Geometry::new(MultiPolygon::new(out), Some(target_crs.to_string())))
    }
}

fn same_definition(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

fn transform_ring(
    ring: &LineString<f64>,
    ct: &CoordTransform,
) -> std::result::Result<LineString<f64>, String> {
    let mut xs: Vec<f64> = ring.coords().map(|c| c.x).collect();
    let mut ys: Vec<f64> = ring.coords().map(|c| c.y).collect();
    let mut zs = vec![0.0; xs.len()];
    ct.transform_coords(&mut xs, &mut ys, &mut zs)
        .map_err(|e| e.to_string())?;
    if xs.iter().chain(ys.iter()).any(|v| !v.is_finite()) {
        return Err("transform produced non-finite coordinates".to_string());
    }
    Ok(LineString::from(
        xs.into_iter()
            .zip(ys)
            .map(|(x, y)| Coord { x, y })
            .collect::<Vec<_>>(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn same_crs_is_identity() {
        let g = Geometry::from_rect(0.0, 0.0, 1.0, 1.0, Some("EPSG:32630".to_string()));
        let r = g.to_crs("epsg:32630").unwrap();
        assert_eq!(r, g);
    }

    #[test]
    fn undeclared_crs_is_identity() {
        let g = Geometry::from_rect(0.0, 0.0, 1.0, 1.0, None);
        assert_eq!(g.to_crs("EPSG:4326").unwrap(), g);
    }

    #[test]
    fn reprojects_wgs84_to_web_mercator() {
        let g = Geometry::from_rect(-1.0, -1.0, 1.0, 1.0, Some("EPSG:4326".to_string()));
        let r = g.to_crs("EPSG:3857").unwrap();
        let rect = r.bounding_rect().unwrap();
        assert_abs_diff_eq!(rect.min().x, -111_319.49, epsilon = 1.0);
        assert_abs_diff_eq!(rect.max().x, 111_319.49, epsilon = 1.0);
        assert_eq!(r.crs(), Some("EPSG:3857"));
    }

    #[test]
    fn unknown_crs_is_a_mismatch() {
        let g = Geometry::from_rect(0.0, 0.0, 1.0, 1.0, Some("EPSG:4326".to_string()));
        let err = g.to_crs("not a crs").unwrap_err();
        assert!(matches!(err, Error::GeometryCrsMismatch { .. }));
    }
}
