//! In-memory raster model: a band stack sharing one pixel grid, its affine
//! transform, CRS and optional nodata sentinel.
use ndarray::{Array2, Array3, ArrayView2, s};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::RasterDataType;

/// Affine pixel-to-map transform, stored in GDAL coefficient order.
///
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub pixel_width: f64,
    pub row_rotation: f64,
    pub origin_y: f64,
    pub col_rotation: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// North-up transform without rotation terms.
    pub fn north_up(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            pixel_width,
            row_rotation: 0.0,
            origin_y,
            col_rotation: 0.0,
            pixel_height,
        }
    }

    pub fn from_gdal(c: [f64; 6]) -> Self {
        Self {
            origin_x: c[0],
            pixel_width: c[1],
            row_rotation: c[2],
            origin_y: c[3],
            col_rotation: c[4],
            pixel_height: c[5],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.row_rotation,
            self.origin_y,
            self.col_rotation,
            self.pixel_height,
        ]
    }

    /// Map coordinate of a fractional pixel position (col, row).
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width + row * self.row_rotation,
            self.origin_y + col * self.col_rotation + row * self.pixel_height,
        )
    }

    /// Map coordinate of the centre of pixel (col, row).
    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        self.apply(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Fractional pixel position of a map coordinate, `None` for a degenerate transform.
    pub fn invert(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let det = self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation;
        if det.abs() < 1e-12 {
            return None;
        }
        let dx = x - self.origin_x;
        let dy = y - self.origin_y;
        let col = (self.pixel_height * dx - self.row_rotation * dy) / det;
        let row = (-self.col_rotation * dx + self.pixel_width * dy) / det;
        Some((col, row))
    }

    /// Transform of a sub-window whose top-left pixel is (col_off, row_off).
    /// Pixel size and rotation terms are carried over unchanged.
    pub fn shifted(&self, col_off: usize, row_off: usize) -> Self {
        let (origin_x, origin_y) = self.apply(col_off as f64, row_off as f64);
        Self {
            origin_x,
            origin_y,
            ..*self
        }
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::north_up(0.0, 0.0, 1.0, 1.0)
    }
}

/// A georeferenced band stack. Samples are held as `f64` whatever the on-disk type;
/// `data_type` remembers what to write back.
#[derive(Debug, Clone)]
pub struct Raster {
    bands: Array3<f64>,
    transform: GeoTransform,
    crs: String,
    nodata: Option<f64>,
    data_type: RasterDataType,
}

impl Raster {
    /// Build a raster from a (bands, rows, cols) stack.
    pub fn new(
        bands: Array3<f64>,
        transform: GeoTransform,
        crs: impl Into<String>,
        nodata: Option<f64>,
        data_type: RasterDataType,
    ) -> Result<Self> {
        if bands.dim().0 == 0 {
            return Err(Error::Processing("raster has no bands".to_string()));
        }
        Ok(Self {
            bands,
            transform,
            crs: crs.into(),
            nodata,
            data_type,
        })
    }

    /// Build a raster from individual 2-D bands, which must share one shape.
    pub fn from_bands(
        bands: Vec<Array2<f64>>,
        transform: GeoTransform,
        crs: impl Into<String>,
        nodata: Option<f64>,
        data_type: RasterDataType,
    ) -> Result<Self> {
        let first = bands
            .first()
            .ok_or_else(|| Error::Processing("raster has no bands".to_string()))?;
        let (rows, cols) = first.dim();
        let mut stack = Array3::<f64>::zeros((bands.len(), rows, cols));
        for (i, band) in bands.iter().enumerate() {
            if band.dim() != (rows, cols) {
                return Err(Error::Processing(format!(
                    "band {} is {:?}, expected {:?}",
                    i + 1,
                    band.dim(),
                    (rows, cols)
                )));
            }
            stack.slice_mut(s![i, .., ..]).assign(band);
        }
        Self::new(stack, transform, crs, nodata, data_type)
    }

    pub fn band_count(&self) -> usize {
        self.bands.dim().0
    }

    /// (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        let (_, rows, cols) = self.bands.dim();
        (rows, cols)
    }

    pub fn band(&self, index: usize) -> ArrayView2<'_, f64> {
        self.bands.slice(s![index, .., ..])
    }

    pub fn bands(&self) -> &Array3<f64> {
        &self.bands
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn crs(&self) -> &str {
        &self.crs
    }

    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    pub fn data_type(&self) -> RasterDataType {
        self.data_type
    }

    /// Whether `value` counts as "no measurement" for this raster.
    pub fn is_nodata(&self, value: f64) -> bool {
        if value.is_nan() {
            return true;
        }
        match self.nodata {
            Some(nd) if nd.is_nan() => false,
            Some(nd) => value == nd,
            None => false,
        }
    }

    /// Map extent as (min_x, min_y, max_x, max_y).
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        let (rows, cols) = self.shape();
        let corners = [
            self.transform.apply(0.0, 0.0),
            self.transform.apply(cols as f64, 0.0),
            self.transform.apply(0.0, rows as f64),
            self.transform.apply(cols as f64, rows as f64),
        ];
        corners.iter().fold(
            (f64::MAX, f64::MAX, f64::MIN, f64::MIN),
            |(min_x, min_y, max_x, max_y), &(x, y)| {
                (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
            },
        )
    }

    pub fn into_bands(self) -> Array3<f64> {
        self.bands
    }
}
