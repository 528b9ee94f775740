//! Crate-level error type and `Result` alias for stable, structured error handling.
//! Every failure a request can hit has its own variant; `Error::kind` folds them into the
//! serializable `ErrorKind` taxonomy reported in response envelopes and per-pair results.
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{PipelineState, SensorProfile};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GDAL error: {0}")]
    Gdal(#[from] crate::io::GdalError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Cannot reproject geometry from {geometry_crs} to {raster_crs}: {reason}")]
    GeometryCrsMismatch {
        geometry_crs: String,
        raster_crs: String,
        reason: String,
    },

    #[error("Geometry does not overlap the raster extent")]
    EmptyClipResult,

    #[error("Band index {index} out of range: {name} needs {required} bands, raster has {available}")]
    BandIndexOutOfRange {
        name: String,
        index: usize,
        required: usize,
        available: usize,
    },

    #[error("Sensor profile {profile} expects {expected} bands, raster has {found}")]
    SensorProfileMismatch {
        profile: SensorProfile,
        expected: usize,
        found: usize,
    },

    #[error("Optical grid {optical:?} and radar grid {radar:?} differ")]
    PairedInputShapeMismatch {
        optical: (usize, usize),
        radar: (usize, usize),
    },

    #[error("Model not ready (state: {state})")]
    ModelNotReady { state: PipelineState },

    #[error("Checkpoint not found: {}", checkpoint_label(.0))]
    CheckpointMissing(PathBuf),

    #[error("Inference failed: {0}")]
    InferenceFailure(String),

    #[error("Raster write failed for {path}: {reason}")]
    RasterWriteFailure { path: PathBuf, reason: String },

    #[error("Export failed: {0}")]
    ExportFailure(String),

    #[error("Invalid argument: {arg}={value}")]
    InvalidArgument { arg: &'static str, value: String },

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("External error: {0}")]
    External(String),
}

fn checkpoint_label(path: &std::path::Path) -> String {
    if path.as_os_str().is_empty() {
        "no checkpoint configured".to_string()
    } else {
        path.display().to_string()
    }
}

impl Error {
    pub fn external<E: std::fmt::Display>(e: E) -> Self {
        Error::External(e.to_string())
    }

    pub fn malformed<E: std::fmt::Display>(e: E) -> Self {
        Error::MalformedRequest(e.to_string())
    }

    pub fn write_failure<E: std::fmt::Display>(path: impl Into<PathBuf>, e: E) -> Self {
        Error::RasterWriteFailure {
            path: path.into(),
            reason: e.to_string(),
        }
    }

    /// Taxonomy kind reported to callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MalformedRequest(_) | Error::InvalidArgument { .. } => ErrorKind::MalformedRequest,
            Error::GeometryCrsMismatch { .. } => ErrorKind::GeometryCrsMismatch,
            Error::EmptyClipResult => ErrorKind::EmptyClipResult,
            Error::BandIndexOutOfRange { .. } => ErrorKind::BandIndexOutOfRange,
            Error::SensorProfileMismatch { .. } => ErrorKind::SensorProfileMismatch,
            Error::PairedInputShapeMismatch { .. } => ErrorKind::PairedInputShapeMismatch,
            Error::ModelNotReady { .. } => ErrorKind::ModelNotReady,
            Error::CheckpointMissing(_) => ErrorKind::CheckpointMissing,
            Error::InferenceFailure(_) => ErrorKind::InferenceFailure,
            Error::RasterWriteFailure { .. } => ErrorKind::RasterWriteFailure,
            Error::ExportFailure(_) => ErrorKind::ExportFailure,
            // Payload decoding goes through `Error::malformed`; bare JSON errors come
            // from local files such as checkpoints and configs.
            Error::Io(_)
            | Error::Gdal(_)
            | Error::Json(_)
            | Error::Processing(_)
            | Error::External(_) => ErrorKind::Internal,
        }
    }
}

/// Serializable error category, stable across releases.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum ErrorKind {
    MalformedRequest,
    #[serde(rename = "GeometryCRSMismatch")]
    GeometryCrsMismatch,
    EmptyClipResult,
    BandIndexOutOfRange,
    SensorProfileMismatch,
    PairedInputShapeMismatch,
    ModelNotReady,
    CheckpointMissing,
    InferenceFailure,
    RasterWriteFailure,
    ExportFailure,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::MalformedRequest => "MalformedRequest",
            ErrorKind::GeometryCrsMismatch => "GeometryCRSMismatch",
            ErrorKind::EmptyClipResult => "EmptyClipResult",
            ErrorKind::BandIndexOutOfRange => "BandIndexOutOfRange",
            ErrorKind::SensorProfileMismatch => "SensorProfileMismatch",
            ErrorKind::PairedInputShapeMismatch => "PairedInputShapeMismatch",
            ErrorKind::ModelNotReady => "ModelNotReady",
            ErrorKind::CheckpointMissing => "CheckpointMissing",
            ErrorKind::InferenceFailure => "InferenceFailure",
            ErrorKind::RasterWriteFailure => "RasterWriteFailure",
            ErrorKind::ExportFailure => "ExportFailure",
            ErrorKind::Internal => "Internal",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_json_errors_are_internal() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(Error::malformed("bad payload").kind(), ErrorKind::MalformedRequest);
    }

    #[test]
    fn unset_checkpoint_has_readable_message() {
        assert_eq!(
            Error::CheckpointMissing(PathBuf::new()).to_string(),
            "Checkpoint not found: no checkpoint configured"
        );
        assert_eq!(
            Error::CheckpointMissing(PathBuf::from("/models/fusion.json")).to_string(),
            "Checkpoint not found: /models/fusion.json"
        );
    }
}
