//! Output writers: GeoTIFF rasters, JPEG heat maps and their georeferencing sidecars.
pub mod jpeg;
pub mod tiff;
pub mod worldfile;

pub use tiff::{write_raster, write_raster_atomic};
