//! I/O layer: GDAL-backed raster reading, OGR region-of-interest loading, the
//! external export and preprocessing adapters, and `writers` for GeoTIFF/JPEG
//! outputs and their georeferencing sidecars.
pub mod gdal;
pub use gdal::{GdalError, GdalMetadata, GdalRasterReader, read_raster};

pub mod vector;
pub use vector::read_geometry;

pub mod export;
pub use export::{CommandExportService, DateSelection, ExportRequest, ExportService};

pub mod preprocess;
pub use preprocess::{GdalWarpPreprocessor, SensorPreprocessor};

pub mod writers;
