use gdal::raster::GdalDataType;
use gdal::{Dataset, errors::GdalError as GdalCrateError};
use ndarray::Array2;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::core::raster::{GeoTransform, Raster};
use crate::types::RasterDataType;

/// Errors encountered when using GDAL reader
#[derive(Debug, Error)]
pub enum GdalError {
    #[error("GDAL error: {0}")]
    Gdal(#[from] GdalCrateError),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Dimension mismatch: expected {0}x{1}, got {2}x{3}")]
    DimensionMismatch(usize, usize, usize, usize),
}

/// Metadata extracted from a GDAL-supported dataset
#[derive(Debug, Clone)]
pub struct GdalMetadata {
    /// Width (pixels) of the raster
    pub size_x: usize,
    /// Height (lines) of the raster
    pub size_y: usize,
    /// Number of raster bands
    pub bands: usize,
    /// Affine geotransform coefficients ([origin_x, pixel_width, rot_x, origin_y, rot_y, pixel_height])
    pub geotransform: [f64; 6],
    /// Projection, shortened to `EPSG:XXXX` when the WKT carries an authority code
    pub projection: String,
    /// Nodata value of band 1
    pub nodata: Option<f64>,
    /// Sample type of band 1
    pub data_type: RasterDataType,
}

/// Reader for GeoTIFF and other GDAL-supported rasters
pub struct GdalRasterReader {
    pub dataset: Dataset,
    pub metadata: GdalMetadata,
}

// Helper to extract EPSG code from WKT authority tag
pub(crate) fn parse_epsg(wkt: &str) -> Option<String> {
    const KEY: &str = "AUTHORITY[\"EPSG\",\"";
    if let Some(idx) = wkt.rfind(KEY) {
        let start = idx + KEY.len();
        if let Some(end) = wkt[start..].find('"') {
            let code = &wkt[start..start + end];
            return Some(format!("EPSG:{}", code));
        }
    }
    None
}

/// Prefer a compact `EPSG:XXXX` identifier over full WKT.
pub(crate) fn shorten_projection(proj: String) -> String {
    if proj.starts_with("EPSG:") {
        proj
    } else if let Some(code) = parse_epsg(&proj) {
        code
    } else {
        proj
    }
}

fn map_data_type(t: GdalDataType) -> RasterDataType {
    match t {
        GdalDataType::UInt8 => RasterDataType::U8,
        GdalDataType::UInt16 => RasterDataType::U16,
        GdalDataType::Int16 => RasterDataType::I16,
        GdalDataType::UInt32 => RasterDataType::U32,
        GdalDataType::Int32 => RasterDataType::I32,
        GdalDataType::Float32 => RasterDataType::F32,
        // Wider or unknown types are held as f64 anyway.
        _ => RasterDataType::F64,
    }
}

impl GdalRasterReader {
    /// Open a GDAL-supported dataset (e.g., GeoTIFF, JP2, VRT)
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GdalError> {
        let dataset = Dataset::open(path.as_ref())?;
        let (size_x, size_y) = dataset.raster_size();
        let bands = dataset.raster_count() as usize;
        if bands == 0 {
            return Err(GdalError::UnsupportedFormat("No raster bands found".into()));
        }
        let geotransform = match dataset.geo_transform() {
            Ok(gt) => gt,
            Err(_) => [0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
        };
        let mut proj = dataset.projection();
        if proj.is_empty() {
            // Fallback to GCP projection if available
            if let Some(gcp_proj) = dataset.gcp_projection() {
                if !gcp_proj.is_empty() {
                    proj = gcp_proj;
                }
            }
        }
        let projection = shorten_projection(proj);
        let first = dataset.rasterband(1)?;
        let nodata = first.no_data_value();
        let data_type = map_data_type(first.band_type());
        debug!(
            path = %path.as_ref().display(),
            size_x, size_y, bands, %projection, ?nodata, %data_type,
            "Opened raster"
        );
        Ok(GdalRasterReader {
            dataset,
            metadata: GdalMetadata {
                size_x: size_x as usize,
                size_y: size_y as usize,
                bands,
                geotransform,
                projection,
                nodata,
                data_type,
            },
        })
    }

    /// Read a single band (1-based index) as an f64 ndarray of shape (height, width)
    pub fn read_band(&self, index: usize) -> Result<Array2<f64>, GdalError> {
        if index == 0 || index > self.metadata.bands {
            return Err(GdalError::UnsupportedFormat(format!(
                "Band index {} out of range",
                index
            )));
        }
        let band = self.dataset.rasterband(index)?;
        let window = (self.metadata.size_x, self.metadata.size_y);
        let buf = band.read_as::<f64>((0, 0), window, window, None)?;
        let data_vec = buf.data().to_vec();
        let found = data_vec.len();
        Array2::from_shape_vec((self.metadata.size_y, self.metadata.size_x), data_vec).map_err(
            |_| {
                GdalError::DimensionMismatch(
                    self.metadata.size_x,
                    self.metadata.size_y,
                    found,
                    1,
                )
            },
        )
    }

    /// Read every band into a `Raster` carrying the dataset's transform, CRS and nodata.
    pub fn read_raster(&self) -> Result<Raster, crate::Error> {
        let mut bands = Vec::with_capacity(self.metadata.bands);
        for idx in 1..=self.metadata.bands {
            bands.push(self.read_band(idx)?);
        }
        Raster::from_bands(
            bands,
            GeoTransform::from_gdal(self.metadata.geotransform),
            self.metadata.projection.clone(),
            self.metadata.nodata,
            self.metadata.data_type,
        )
    }
}

/// Open `path` and read it fully.
pub fn read_raster<P: AsRef<Path>>(path: P) -> crate::Result<Raster> {
    GdalRasterReader::open(path)?.read_raster()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epsg_is_taken_from_the_last_authority() {
        let wkt = r#"PROJCS["WGS 84 / UTM zone 33N",GEOGCS["WGS 84",AUTHORITY["EPSG","4326"]],AUTHORITY["EPSG","32633"]]"#;
        assert_eq!(parse_epsg(wkt).as_deref(), Some("EPSG:32633"));
        assert_eq!(shorten_projection(wkt.to_string()), "EPSG:32633");
        assert_eq!(shorten_projection("LOCAL_CS[\"x\"]".to_string()), "LOCAL_CS[\"x\"]");
    }
}
