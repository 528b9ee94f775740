//! The three serving endpoints: `parser` (archive export), `cropper` (footprint clip)
//! and `clouds` (batched cloud removal).
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::api;
use crate::core::processing::pipeline::prediction_path;
use crate::error::{Error, Result};
use crate::io::export::{DateSelection, ExportRequest, ExportService};
use crate::serving::envelope::{InferRequest, OutputTensor};
use crate::serving::lifecycle::ModelLifecycle;
use crate::types::PipelineState;

pub const PARSER: &str = "parser";
pub const CROPPER: &str = "cropper";
pub const CLOUDS: &str = "clouds";

/// A named endpoint. `infer` returns the success outputs; the front turns errors
/// into error envelopes.
pub trait Endpoint: Send + Sync {
    fn name(&self) -> &'static str;

    fn state(&self) -> PipelineState;

    fn infer(&self, request: &InferRequest) -> Result<Vec<OutputTensor>>;
}

fn path_string(p: &Path) -> String {
    p.to_string_lossy().into_owned()
}

// ─── parser ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ParserPayload {
    kml: PathBuf,
    out_dir: Option<PathBuf>,
    date: Option<String>,
    start: Option<String>,
    end: Option<String>,
    scale: Option<u32>,
}

pub struct ParserEndpoint {
    export: Option<Arc<dyn ExportService>>,
    default_dir: PathBuf,
    default_scale: u32,
}

impl ParserEndpoint {
    pub fn new(export: Option<Arc<dyn ExportService>>, default_dir: PathBuf, default_scale: u32) -> Self {
        Self {
            export,
            default_dir,
            default_scale,
        }
    }
}

impl Endpoint for ParserEndpoint {
    fn name(&self) -> &'static str {
        PARSER
    }

    fn state(&self) -> PipelineState {
        PipelineState::Ready
    }

    fn infer(&self, request: &InferRequest) -> Result<Vec<OutputTensor>> {
        let payload: ParserPayload = request.payload()?;
        let dates = DateSelection::from_parts(
            payload.date.as_deref(),
            payload.start.as_deref(),
            payload.end.as_deref(),
        )?;
        let export = self
            .export
            .as_ref()
            .ok_or_else(|| Error::ExportFailure("export service not configured".to_string()))?;
        let export_request = ExportRequest {
            roi: payload.kml,
            dates,
            out_dir: payload.out_dir.unwrap_or_else(|| self.default_dir.clone()),
            scale: payload.scale.unwrap_or(self.default_scale),
        };
        let files = export.export(&export_request)?;
        info!(count = files.len(), out_dir = %export_request.out_dir.display(), "Export finished");
        Ok(vec![OutputTensor::strings(
            "downloaded_files",
            files.iter().map(|p| path_string(p)).collect(),
        )])
    }
}

// ─── cropper ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CropperPayload {
    raster: PathBuf,
    kml: PathBuf,
    out_dir: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct CropperEndpoint;

/// `<stem>_crop.tif` in `out_dir`, or next to the raster.
pub fn crop_path(raster: &Path, out_dir: Option<&Path>) -> PathBuf {
    let stem = raster
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "raster".to_string());
    let dir = match out_dir {
        Some(d) => d.to_path_buf(),
        None => raster.parent().map(Path::to_path_buf).unwrap_or_default(),
    };
    dir.join(format!("{}_crop.tif", stem))
}

impl Endpoint for CropperEndpoint {
    fn name(&self) -> &'static str {
        CROPPER
    }

    fn state(&self) -> PipelineState {
        PipelineState::Ready
    }

    fn infer(&self, request: &InferRequest) -> Result<Vec<OutputTensor>> {
        let payload: CropperPayload = request.payload()?;
        let output = crop_path(&payload.raster, payload.out_dir.as_deref());
        api::clip_raster_file(&payload.raster, &payload.kml, &output)?;
        Ok(vec![OutputTensor::strings(
            "cropped_tif",
            vec![path_string(&output)],
        )])
    }
}

// ─── clouds ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct PairPayload {
    optical: PathBuf,
    sar: PathBuf,
}

#[derive(Debug, Deserialize)]
struct CloudsPayload {
    #[serde(default)]
    pairs: Vec<PairPayload>,
    save_dir: Option<PathBuf>,
}

pub struct CloudsEndpoint {
    lifecycle: Arc<ModelLifecycle>,
}

impl CloudsEndpoint {
    pub fn new(lifecycle: Arc<ModelLifecycle>) -> Self {
        Self { lifecycle }
    }

    pub fn lifecycle(&self) -> &Arc<ModelLifecycle> {
        &self.lifecycle
    }
}

/// Per-pair prefix of failed entries in `prediction_paths`.
pub fn pair_error_entry(err: &Error) -> String {
    format!("ERROR[{}]: {}", err.kind(), err)
}

impl Endpoint for CloudsEndpoint {
    fn name(&self) -> &'static str {
        CLOUDS
    }

    fn state(&self) -> PipelineState {
        self.lifecycle.state()
    }

    /// Pairs run one after another on the shared model. A failing pair is reported
    /// in place and does not stop the others.
    fn infer(&self, request: &InferRequest) -> Result<Vec<OutputTensor>> {
        let pipeline = self.lifecycle.pipeline()?;
        let payload: CloudsPayload = request.payload()?;
        let save_dir = payload.save_dir.as_deref().filter(|d| !d.as_os_str().is_empty());
        if let Some(dir) = save_dir {
            std::fs::create_dir_all(dir)?;
        }

        let mut paths = Vec::with_capacity(payload.pairs.len());
        let mut failures = Vec::new();
        for (index, pair) in payload.pairs.iter().enumerate() {
            let output = prediction_path(&pair.optical, save_dir);
            match pipeline.reconstruct_files(&pair.optical, &pair.sar, &output) {
                Ok(path) => paths.push(path_string(&path)),
                Err(e) => {
                    warn!(pair = index, optical = %pair.optical.display(), error = %e, "Pair failed");
                    paths.push(pair_error_entry(&e));
                    failures.push(json!({
                        "index": index,
                        "kind": e.kind(),
                        "message": e.to_string(),
                    }));
                }
            }
        }

        let mut outputs = vec![OutputTensor::strings("prediction_paths", paths)];
        if !failures.is_empty() {
            outputs.push(OutputTensor::json("pair_errors", failures));
        }
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn crop_path_naming() {
        assert_eq!(
            crop_path(Path::new("/scenes/T35.tif"), None),
            Path::new("/scenes/T35_crop.tif")
        );
        assert_eq!(
            crop_path(Path::new("/scenes/T35.tif"), Some(Path::new("/out"))),
            Path::new("/out/T35_crop.tif")
        );
    }

    #[test]
    fn pair_error_entry_carries_kind() {
        let e = Error::PairedInputShapeMismatch {
            optical: (4, 4),
            radar: (4, 5),
        };
        assert!(pair_error_entry(&e).starts_with("ERROR[PairedInputShapeMismatch]: "));
    }

    #[test]
    fn parser_without_service_is_export_failure() {
        let ep = ParserEndpoint::new(None, PathBuf::from("./downloads"), 10);
        let req = InferRequest::with_payload(json!({"kml": "/roi.kml", "date": "2024-05-01"}));
        assert_eq!(ep.infer(&req).unwrap_err().kind(), ErrorKind::ExportFailure);
    }

    #[test]
    fn parser_validates_dates_before_exporting() {
        let ep = ParserEndpoint::new(None, PathBuf::from("./downloads"), 10);
        let req = InferRequest::with_payload(json!({"kml": "/roi.kml"}));
        assert_eq!(ep.infer(&req).unwrap_err().kind(), ErrorKind::MalformedRequest);
    }

    #[test]
    fn clouds_rejects_when_not_loaded() {
        let ep = CloudsEndpoint::new(Arc::new(ModelLifecycle::new()));
        let req = InferRequest::with_payload(json!({"pairs": []}));
        assert_eq!(ep.infer(&req).unwrap_err().kind(), ErrorKind::ModelNotReady);
        assert_eq!(ep.state(), PipelineState::NotLoaded);
    }
}
