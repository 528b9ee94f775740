//! Reconstruction model capability and checkpoint loading.
//!
//! The pipeline only sees `ReconstructionModel::forward`; any backend that can map a
//! normalized optical tensor and a normalized radar tensor (both batch-first
//! `(N, C, H, W)` `f32`) to an optical-layout tensor plugs in through this trait.
//! `LinearFusionModel` is the backend shipped with the crate: a per-pixel linear
//! mix of the 13 optical and 2 radar channels, stored as a JSON checkpoint.
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use ndarray::{Array1, Array2, Array3, Array4, ArrayView4, Axis};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::types::SensorProfile;

/// Opaque forward pass. Implementations never see geometry.
pub trait ReconstructionModel: Send + Sync {
    fn forward(&self, optical: ArrayView4<'_, f32>, sar: ArrayView4<'_, f32>) -> Result<Array4<f32>>;

    fn name(&self) -> &str {
        "reconstruction-model"
    }
}

/// Turns a checkpoint artifact into a ready model.
pub trait ModelLoader: Send + Sync {
    fn load(&self, checkpoint: &Path) -> Result<Arc<dyn ReconstructionModel>>;
}

/// Serialized weights of `LinearFusionModel`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionCheckpoint {
    /// 13 rows (output band) of 13 optical weights.
    pub optical_weights: Vec<Vec<f32>>,
    /// 13 rows (output band) of 2 radar weights.
    pub sar_weights: Vec<Vec<f32>>,
    /// One bias per output band.
    pub bias: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct LinearFusionModel {
    optical: Array2<f32>,
    sar: Array2<f32>,
    bias: Array1<f32>,
}

impl LinearFusionModel {
    pub fn from_checkpoint(ckpt: &FusionCheckpoint) -> Result<Self> {
        let out = SensorProfile::Optical.band_count();
        let optical = matrix("optical_weights", &ckpt.optical_weights, out, out)?;
        let sar = matrix(
            "sar_weights",
            &ckpt.sar_weights,
            out,
            SensorProfile::Radar.band_count(),
        )?;
        if ckpt.bias.len() != out {
            return Err(Error::Processing(format!(
                "bias has {} entries, expected {}",
                ckpt.bias.len(),
                out
            )));
        }
        Ok(Self {
            optical,
            sar,
            bias: Array1::from(ckpt.bias.clone()),
        })
    }

    /// Passes the optical tensor through unchanged.
    pub fn identity() -> Self {
        let out = SensorProfile::Optical.band_count();
        Self {
            optical: Array2::eye(out),
            sar: Array2::zeros((out, SensorProfile::Radar.band_count())),
            bias: Array1::zeros(out),
        }
    }

    pub fn to_checkpoint(&self) -> FusionCheckpoint {
        let rows = |m: &Array2<f32>| m.outer_iter().map(|r| r.to_vec()).collect();
        FusionCheckpoint {
            optical_weights: rows(&self.optical),
            sar_weights: rows(&self.sar),
            bias: self.bias.to_vec(),
        }
    }
}

fn matrix(field: &str, rows: &[Vec<f32>], n_rows: usize, n_cols: usize) -> Result<Array2<f32>> {
    if rows.len() != n_rows || rows.iter().any(|r| r.len() != n_cols) {
        return Err(Error::Processing(format!(
            "{} must be {}x{}",
            field, n_rows, n_cols
        )));
    }
    let flat: Vec<f32> = rows.iter().flatten().copied().collect();
    Array2::from_shape_vec((n_rows, n_cols), flat).map_err(|e| Error::Processing(e.to_string()))
}

impl ReconstructionModel for LinearFusionModel {
    fn forward(&self, optical: ArrayView4<'_, f32>, sar: ArrayView4<'_, f32>) -> Result<Array4<f32>> {
        let (n, c_opt, h, w) = optical.dim();
        let (n_sar, c_sar, h_sar, w_sar) = sar.dim();
        if n != n_sar || (h, w) != (h_sar, w_sar) {
            return Err(Error::InferenceFailure(format!(
                "input tensors disagree: optical {:?}, sar {:?}",
                optical.dim(),
                sar.dim()
            )));
        }
        if c_opt != self.optical.ncols() || c_sar != self.sar.ncols() {
            return Err(Error::InferenceFailure(format!(
                "expected {} optical and {} sar channels, got {} and {}",
                self.optical.ncols(),
                self.sar.ncols(),
                c_opt,
                c_sar
            )));
        }

        let c_out = self.optical.nrows();
        let mut out = Array4::<f32>::zeros((n, c_out, h, w));
        for (i, mut sample) in out.axis_iter_mut(Axis(0)).enumerate() {
            let opt = flatten(optical.index_axis(Axis(0), i).to_owned(), c_opt, h * w)?;
            let rad = flatten(sar.index_axis(Axis(0), i).to_owned(), c_sar, h * w)?;
            let mut mixed = self.optical.dot(&opt) + self.sar.dot(&rad);
            for (mut row, b) in mixed.outer_iter_mut().zip(self.bias.iter()) {
                row += *b;
            }
            let mixed = mixed
                .into_shape((c_out, h, w))
                .map_err(|e| Error::InferenceFailure(e.to_string()))?;
            sample.assign(&mixed);
        }
        Ok(out)
    }

    fn name(&self) -> &str {
        "linear-fusion"
    }
}

fn flatten(a: Array3<f32>, c: usize, hw: usize) -> Result<Array2<f32>> {
    a.into_shape((c, hw))
        .map_err(|e| Error::InferenceFailure(e.to_string()))
}

/// Loads `LinearFusionModel` weights from a JSON checkpoint file.
#[derive(Debug, Default, Clone, Copy)]
pub struct FusionCheckpointLoader;

impl ModelLoader for FusionCheckpointLoader {
    fn load(&self, checkpoint: &Path) -> Result<Arc<dyn ReconstructionModel>> {
        if !checkpoint.is_file() {
            return Err(Error::CheckpointMissing(checkpoint.to_path_buf()));
        }
        let reader = BufReader::new(File::open(checkpoint)?);
        let ckpt: FusionCheckpoint = serde_json::from_reader(reader)?;
        let model = LinearFusionModel::from_checkpoint(&ckpt)?;
        info!(checkpoint = %checkpoint.display(), "Loaded linear fusion checkpoint");
        Ok(Arc::new(model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tensors(h: usize, w: usize) -> (Array4<f32>, Array4<f32>) {
        let opt = Array4::from_shape_fn((1, 13, h, w), |(_, c, r, col)| {
            c as f32 * 0.01 + r as f32 * 0.1 + col as f32
        });
        let sar = Array4::from_shape_fn((1, 2, h, w), |(_, c, _, _)| 0.5 + c as f32 * 0.25);
        (opt, sar)
    }

    #[test]
    fn identity_returns_optical_input() {
        let (opt, sar) = tensors(3, 4);
        let out = LinearFusionModel::identity()
            .forward(opt.view(), sar.view())
            .unwrap();
        assert_eq!(out, opt);
    }

    #[test]
    fn weights_mix_channels_per_pixel() {
        let mut ckpt = LinearFusionModel::identity().to_checkpoint();
        ckpt.sar_weights[4] = vec![2.0, -1.0];
        ckpt.bias[4] = 0.1;
        let model = LinearFusionModel::from_checkpoint(&ckpt).unwrap();

        let (opt, sar) = tensors(2, 2);
        let out = model.forward(opt.view(), sar.view()).unwrap();
        // band 4 = opt[4] + 2*0.5 - 0.75 + 0.1
        assert_relative_eq!(out[[0, 4, 1, 1]], opt[[0, 4, 1, 1]] + 0.35, epsilon = 1e-6);
        assert_relative_eq!(out[[0, 3, 1, 1]], opt[[0, 3, 1, 1]], epsilon = 1e-6);
    }

    #[test]
    fn mismatched_tensors_fail_inference() {
        let (opt, _) = tensors(3, 4);
        let (_, sar) = tensors(4, 4);
        let err = LinearFusionModel::identity()
            .forward(opt.view(), sar.view())
            .unwrap_err();
        assert!(matches!(err, Error::InferenceFailure(_)));
    }

    #[test]
    fn malformed_checkpoint_is_rejected() {
        let mut ckpt = LinearFusionModel::identity().to_checkpoint();
        ckpt.optical_weights.pop();
        assert!(LinearFusionModel::from_checkpoint(&ckpt).is_err());
    }

    #[test]
    fn loader_reports_missing_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        match FusionCheckpointLoader.load(&path) {
            Err(Error::CheckpointMissing(p)) => assert_eq!(p, path),
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("load should fail"),
        }
    }

    #[test]
    fn loader_reads_json_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fusion.json");
        let ckpt = LinearFusionModel::identity().to_checkpoint();
        std::fs::write(&path, serde_json::to_vec(&ckpt).unwrap()).unwrap();
        let model = FusionCheckpointLoader.load(&path).unwrap();
        assert_eq!(model.name(), "linear-fusion");
    }
}
