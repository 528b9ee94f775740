use gdal::errors::GdalError as GdalCrateError;
use gdal::raster::{Buffer, GdalType};
use gdal::spatial_ref::SpatialRef;
use gdal::{Dataset, DriverManager};
use std::path::Path;
use tracing::debug;

use crate::core::raster::Raster;
use crate::error::{Error, Result};
use crate::types::RasterDataType;

fn write_bands<T, F>(
    output: &Path,
    raster: &Raster,
    convert: F,
) -> std::result::Result<Dataset, GdalCrateError>
where
    T: GdalType + Copy,
    F: Fn(f64) -> T,
{
    let (rows, cols) = raster.shape();
    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let mut ds = driver.create_with_band_type::<T, _>(output, cols, rows, raster.band_count())?;
    ds.set_geo_transform(&raster.transform().to_gdal())?;
    if !raster.crs().is_empty() {
        // Accept `EPSG:XXXX` as well as WKT.
        match SpatialRef::from_definition(raster.crs()) {
            Ok(srs) => ds.set_spatial_ref(&srs)?,
            Err(_) => ds.set_projection(raster.crs())?,
        }
    }
    for b in 0..raster.band_count() {
        let data: Vec<T> = raster.band(b).iter().map(|&v| convert(v)).collect();
        let mut buf = Buffer::new((cols, rows), data);
        let mut band = ds.rasterband(b + 1)?;
        if let Some(nd) = raster.nodata() {
            band.set_no_data_value(Some(nd))?;
        }
        band.write((0, 0), (cols, rows), &mut buf)?;
    }
    Ok(ds)
}

/// Write `raster` as a GeoTIFF using its own sample type, transform, CRS and nodata.
/// Samples are rounded and saturated into integer types; NaN becomes 0 there.
pub fn write_raster(output: &Path, raster: &Raster) -> Result<()> {
    let ds = match raster.data_type() {
        RasterDataType::U8 => write_bands::<u8, _>(output, raster, |v| v.round() as u8),
        RasterDataType::U16 => write_bands::<u16, _>(output, raster, |v| v.round() as u16),
        RasterDataType::I16 => write_bands::<i16, _>(output, raster, |v| v.round() as i16),
        RasterDataType::U32 => write_bands::<u32, _>(output, raster, |v| v.round() as u32),
        RasterDataType::I32 => write_bands::<i32, _>(output, raster, |v| v.round() as i32),
        RasterDataType::F32 => write_bands::<f32, _>(output, raster, |v| v as f32),
        RasterDataType::F64 => write_bands::<f64, _>(output, raster, |v| v),
    }
    .map_err(|e| Error::write_failure(output, e))?;
    // Dropping the dataset flushes it to disk.
    drop(ds);
    debug!(path = %output.display(), data_type = %raster.data_type(), "Wrote GeoTIFF");
    Ok(())
}

/// Write to a hidden temporary file next to `output`, then move it into place.
/// On failure nothing is left at `output`.
pub fn write_raster_atomic(output: &Path, raster: &Raster) -> Result<()> {
    let dir = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| Error::write_failure(output, e))?;
    let tmp = tempfile::Builder::new()
        .prefix(".skyfuse-")
        .suffix(".tif")
        .tempfile_in(dir)
        .map_err(|e| Error::write_failure(output, e))?;

    // `tmp` is removed on drop if we bail out below.
    write_raster(tmp.path(), raster).map_err(|e| match e {
        Error::RasterWriteFailure { reason, .. } => Error::write_failure(output, reason),
        other => other,
    })?;
    // Temp files are created 0600.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(tmp.path(), std::fs::Permissions::from_mode(0o644))
            .map_err(|e| Error::write_failure(output, e))?;
    }
    tmp.persist(output)
        .map_err(|e| Error::write_failure(output, e.error))?;
    Ok(())
}
