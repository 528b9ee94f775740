//! Sensor Preprocessing Service adapter.
//!
//! Turns a raw sensor product into a raster meeting the band-count and 10 m grid
//! contract of its `SensorProfile`. Resampling is delegated to `gdalwarp`; radar
//! calibration, border-noise removal and terrain correction are expected to have
//! been applied upstream (the input is already a dB product).
use std::path::Path;
use std::process::Command;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::io::gdal::GdalRasterReader;
use crate::types::SensorProfile;

/// Target ground sampling distance in metres.
pub const TARGET_RESOLUTION: f64 = 10.0;

pub trait SensorPreprocessor: Send + Sync {
    fn preprocess(&self, profile: SensorProfile, input: &Path, output: &Path) -> Result<()>;
}

/// Bilinear resampling to a square 10 m grid through `gdalwarp`.
#[derive(Debug, Clone)]
pub struct GdalWarpPreprocessor {
    pub resolution: f64,
    pub program: String,
}

impl Default for GdalWarpPreprocessor {
    fn default() -> Self {
        Self {
            resolution: TARGET_RESOLUTION,
            program: "gdalwarp".to_string(),
        }
    }
}

impl GdalWarpPreprocessor {
    fn warp_args(&self, input: &Path, output: &Path) -> Vec<String> {
        let res = self.resolution.to_string();
        vec![
            "-of".into(),
            "GTiff".into(),
            "-overwrite".into(),
            "-r".into(),
            "bilinear".into(),
            "-tr".into(),
            res.clone(),
            res,
            input.to_string_lossy().into_owned(),
            output.to_string_lossy().into_owned(),
        ]
    }
}

impl SensorPreprocessor for GdalWarpPreprocessor {
    fn preprocess(&self, profile: SensorProfile, input: &Path, output: &Path) -> Result<()> {
        let args = self.warp_args(input, output);
        debug!(program = %self.program, ?args, "Resampling product");
        let status = Command::new(&self.program)
            .args(&args)
            .status()
            .map_err(|e| Error::External(format!("{} exec error: {}", self.program, e)))?;
        if !status.success() {
            // Best-effort cleanup
            let _ = std::fs::remove_file(output);
            return Err(Error::External(format!("{} failed ({})", self.program, status)));
        }

        let reader = GdalRasterReader::open(output)?;
        let found = reader.metadata.bands;
        if found != profile.band_count() {
            return Err(Error::SensorProfileMismatch {
                profile,
                expected: profile.band_count(),
                found,
            });
        }
        info!(
            %profile,
            input = %input.display(),
            output = %output.display(),
            size_x = reader.metadata.size_x,
            size_y = reader.metadata.size_y,
            "Preprocessed product"
        );
        Ok(())
    }
}
