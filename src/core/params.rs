use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::IndexName;

/// Serving parameters suitable for config files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    /// Socket address the HTTP server binds to
    pub listen: String,
    /// Model weights for the `clouds` endpoint; required by `ServingFront::from_config`
    pub checkpoint: Option<PathBuf>,
    /// `out_dir` used by `parser` requests that do not name one
    pub default_download_dir: PathBuf,
    /// `scale` (metres) used by `parser` requests that do not name one
    pub default_scale: u32,
    /// Program and leading arguments of the export service
    pub export_command: Option<Vec<String>>,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8100".to_string(),
            checkpoint: None,
            default_download_dir: PathBuf::from("./downloads"),
            default_scale: 10,
            export_command: None,
        }
    }
}

impl ServeConfig {
    /// Load from a JSON file; missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Outputs of an index report run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexReportOptions {
    pub output_dir: PathBuf,
    /// Write `<NAME>_heatmap.jpg` (+ world file and .prj) next to each index GeoTIFF
    pub heatmaps: bool,
    /// Subset of the catalog; empty means all
    pub indices: Vec<IndexName>,
}

impl IndexReportOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            heatmaps: true,
            indices: Vec::new(),
        }
    }

    pub fn selected(&self) -> Vec<IndexName> {
        if self.indices.is_empty() {
            IndexName::ALL.to_vec()
        } else {
            self.indices.clone()
        }
    }
}
