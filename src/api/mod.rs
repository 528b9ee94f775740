//! High-level, file-to-file library API: crop a raster to a region of interest,
//! run an index report, reconstruct a cloudy scene, preprocess a product and
//! trigger an export. Prefer these entrypoints over the low-level processing
//! modules when integrating skyfuse.
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::core::model::ModelLoader;
use crate::core::params::IndexReportOptions;
use crate::core::processing::clip::clip;
use crate::core::processing::colormap::render_rgb;
use crate::core::processing::indices::{IndexResult, compute};
use crate::core::processing::pipeline::{CloudRemovalPipeline, prediction_path};
use crate::core::raster::Raster;
use crate::error::{Error, ErrorKind, Result};
use crate::io::export::{ExportRequest, ExportService};
use crate::io::gdal::read_raster;
use crate::io::preprocess::SensorPreprocessor;
use crate::io::vector::read_geometry;
use crate::io::writers::jpeg::write_rgb_jpeg;
use crate::io::writers::worldfile::{write_prj_file, write_world_file};
use crate::io::writers::{write_raster, write_raster_atomic};
use crate::types::{IndexName, SensorProfile, Verdict};

/// Clip `raster` to the polygons of `geometry` (any OGR vector file) and write a GeoTIFF.
pub fn clip_raster_file(raster: &Path, geometry: &Path, output: &Path) -> Result<PathBuf> {
    let source = read_raster(raster)?;
    let footprint = read_geometry(geometry)?;
    let clipped = clip(&source, &footprint)?;
    write_raster_atomic(output, &clipped)?;
    let (rows, cols) = clipped.shape();
    info!(
        input = %raster.display(),
        output = %output.display(),
        rows,
        cols,
        "Clipped raster"
    );
    Ok(output.to_path_buf())
}

/// One line of an index report.
#[derive(Debug, Clone, Serialize)]
pub struct IndexReportEntry {
    pub name: IndexName,
    pub verdict: Option<Verdict>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub range: Option<(f64, f64)>,
    pub raster: Option<PathBuf>,
    pub heatmap: Option<PathBuf>,
    /// Set when the heat map could not be rendered; the index itself still succeeded.
    pub heatmap_error: Option<String>,
    /// Set when the index could not be computed or written.
    pub error: Option<(ErrorKind, String)>,
}

impl IndexReportEntry {
    fn failed(name: IndexName, e: &Error) -> Self {
        Self {
            name,
            verdict: None,
            min: None,
            max: None,
            range: None,
            raster: None,
            heatmap: None,
            heatmap_error: None,
            error: Some((e.kind(), e.to_string())),
        }
    }
}

impl std::fmt::Display for IndexReportEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some((_, msg)) = &self.error {
            return write!(f, "{}: failed ({})", self.name, msg);
        }
        let (lo, hi) = self.range.unwrap_or((f64::NAN, f64::NAN));
        let verdict = self.verdict.unwrap_or(Verdict::OutOfRange);
        let symbol = if verdict == Verdict::InRange { "∈" } else { "∉" };
        match (self.min, self.max) {
            (Some(min), Some(max)) => write!(
                f,
                "{}: {} ({:.3}…{:.3} {} [{},{}])",
                self.name, verdict, min, max, symbol, lo, hi
            ),
            _ => write!(f, "{}: {} (no valid pixels)", self.name, verdict),
        }?;
        if self.heatmap_error.is_some() {
            write!(f, " [no heat map]")?;
        }
        Ok(())
    }
}

fn write_heatmap(result: &IndexResult, source: &Raster, options: &IndexReportOptions) -> Result<PathBuf> {
    let jpg = options.output_dir.join(format!("{}_heatmap.jpg", result.name));
    let (rows, cols) = source.shape();
    write_rgb_jpeg(&jpg, cols, rows, &render_rgb(&result.values))?;
    write_world_file(&jpg, source.transform())?;
    if !source.crs().is_empty() {
        write_prj_file(&jpg, source.crs())?;
    }
    Ok(jpg)
}

fn report_index(
    name: IndexName,
    source: &Raster,
    options: &IndexReportOptions,
) -> Result<IndexReportEntry> {
    let result = compute(source, name)?;
    let tif = options.output_dir.join(format!("{}.tif", result.name));
    write_raster(&tif, &result.to_raster(*source.transform(), source.crs())?)?;

    let mut entry = IndexReportEntry {
        name,
        verdict: Some(result.verdict),
        min: result.min,
        max: result.max,
        range: Some(result.range),
        raster: Some(tif),
        heatmap: None,
        heatmap_error: None,
        error: None,
    };
    if options.heatmaps {
        // Heat-map errors never fail the entry.
        match write_heatmap(&result, source, options) {
            Ok(jpg) => entry.heatmap = Some(jpg),
            Err(e) => {
                warn!(index = %name, error = %e, "Heat map not written");
                entry.heatmap_error = Some(e.to_string());
            }
        }
    }
    Ok(entry)
}

/// Evaluate the selected catalog indices over `input`.
///
/// A failure on one index is recorded in its entry and the report moves on.
pub fn compute_index_report(input: &Path, options: &IndexReportOptions) -> Result<Vec<IndexReportEntry>> {
    let source = read_raster(input)?;
    std::fs::create_dir_all(&options.output_dir)?;

    let mut entries = Vec::new();
    for name in options.selected() {
        let entry = match report_index(name, &source, options) {
            Ok(entry) => {
                info!("{}", entry);
                entry
            }
            Err(e) => {
                let entry = IndexReportEntry::failed(name, &e);
                warn!("{}", entry);
                entry
            }
        };
        entries.push(entry);
    }
    Ok(entries)
}

/// Load `checkpoint`, reconstruct one optical/radar pair and write
/// `<optical stem>_pred.tiff` into `output_dir` (or next to the optical input).
pub fn reconstruct_pair(
    loader: &dyn ModelLoader,
    checkpoint: &Path,
    optical: &Path,
    sar: &Path,
    output_dir: Option<&Path>,
) -> Result<PathBuf> {
    if !checkpoint.exists() {
        return Err(Error::CheckpointMissing(checkpoint.to_path_buf()));
    }
    let pipeline = CloudRemovalPipeline::new(loader.load(checkpoint)?);
    if let Some(dir) = output_dir {
        std::fs::create_dir_all(dir)?;
    }
    let output = prediction_path(optical, output_dir);
    pipeline.reconstruct_files(optical, sar, &output)
}

/// Bring a raw product onto the grid and band layout of `profile`.
pub fn preprocess_product(
    preprocessor: &dyn SensorPreprocessor,
    profile: SensorProfile,
    input: &Path,
    output: &Path,
) -> Result<PathBuf> {
    if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    preprocessor.preprocess(profile, input, output)?;
    Ok(output.to_path_buf())
}

/// Run the export service and return the rasters it produced.
pub fn export_scenes(service: &dyn ExportService, request: &ExportRequest) -> Result<Vec<PathBuf>> {
    let files = service.export(request)?;
    info!(count = files.len(), out_dir = %request.out_dir.display(), "Exported scenes");
    Ok(files)
}
