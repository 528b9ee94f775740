//! Cloud removal: normalize an optical/radar pair, run the shared model once and
//! georeference its output on the optical grid.
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ndarray::{Array3, Axis};
use tracing::{debug, info};

use crate::core::model::ReconstructionModel;
use crate::core::processing::normalize::normalize;
use crate::core::raster::Raster;
use crate::error::{Error, Result};
use crate::io::gdal::read_raster;
use crate::io::writers::write_raster_atomic;
use crate::types::{RasterDataType, SensorProfile};

/// Owns the loaded model. `forward` calls are serialized: one in flight, others wait.
pub struct CloudRemovalPipeline {
    model: Arc<dyn ReconstructionModel>,
    device: Mutex<()>,
}

impl std::fmt::Debug for CloudRemovalPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudRemovalPipeline")
            .field("model", &self.model.name())
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "model panicked".to_string()
    }
}

impl CloudRemovalPipeline {
    pub fn new(model: Arc<dyn ReconstructionModel>) -> Self {
        Self {
            model,
            device: Mutex::new(()),
        }
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Reconstruct the optical scene. The result reuses the optical transform and CRS
    /// and holds the model output as Float32 bands in optical band order.
    pub fn reconstruct(&self, optical: &Raster, radar: &Raster) -> Result<Raster> {
        let opt = normalize(optical, SensorProfile::Optical)?;
        let sar = normalize(radar, SensorProfile::Radar)?;
        let (_, oh, ow) = opt.dim();
        let (_, sh, sw) = sar.dim();
        if (oh, ow) != (sh, sw) {
            return Err(Error::PairedInputShapeMismatch {
                optical: (oh, ow),
                radar: (sh, sw),
            });
        }

        let opt = opt.insert_axis(Axis(0));
        let sar = sar.insert_axis(Axis(0));
        let output = {
            // A panic inside forward is caught below, so the lock is never poisoned by it.
            let _device = self.device.lock().unwrap_or_else(|p| p.into_inner());
            debug!(model = self.model.name(), rows = oh, cols = ow, "Running forward pass");
            catch_unwind(AssertUnwindSafe(|| self.model.forward(opt.view(), sar.view())))
        };
        let output = match output {
            Ok(Ok(t)) => t,
            Ok(Err(Error::InferenceFailure(msg))) => return Err(Error::InferenceFailure(msg)),
            Ok(Err(e)) => return Err(Error::InferenceFailure(e.to_string())),
            Err(payload) => return Err(Error::InferenceFailure(panic_message(payload.as_ref()))),
        };

        let expected = (1, SensorProfile::Optical.band_count(), oh, ow);
        if output.dim() != expected {
            return Err(Error::InferenceFailure(format!(
                "model returned {:?}, expected {:?}",
                output.dim(),
                expected
            )));
        }
        let bands: Array3<f64> = output.index_axis(Axis(0), 0).mapv(f64::from);
        Raster::new(
            bands,
            *optical.transform(),
            optical.crs(),
            None,
            RasterDataType::F32,
        )
    }

    /// Read a pair from disk, reconstruct and write the result to `output` atomically.
    pub fn reconstruct_files(&self, optical: &Path, radar: &Path, output: &Path) -> Result<PathBuf> {
        let optical_raster = read_raster(optical)?;
        let radar_raster = read_raster(radar)?;
        let reconstructed = self.reconstruct(&optical_raster, &radar_raster)?;
        write_raster_atomic(output, &reconstructed)?;
        info!(
            optical = %optical.display(),
            sar = %radar.display(),
            output = %output.display(),
            "Wrote reconstruction"
        );
        Ok(output.to_path_buf())
    }
}

/// `<optical stem>_pred.tiff` in `save_dir`, or next to the optical input.
pub fn prediction_path(optical: &Path, save_dir: Option<&Path>) -> PathBuf {
    let stem = optical
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "prediction".to_string());
    let dir = match save_dir {
        Some(d) => d.to_path_buf(),
        None => optical.parent().map(Path::to_path_buf).unwrap_or_default(),
    };
    dir.join(format!("{}_pred.tiff", stem))
}
