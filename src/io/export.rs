//! Export Service adapter: hands a region of interest and a date selection to an
//! external archive exporter and collects the GeoTIFFs it leaves in the destination.
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A single acquisition date or an inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateSelection {
    Single(NaiveDate),
    Range { start: NaiveDate, end: NaiveDate },
}

fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| Error::InvalidArgument {
        arg: field,
        value: value.to_string(),
    })
}

impl DateSelection {
    /// Either `date`, or both `start` and `end` with `start <= end`.
    pub fn from_parts(date: Option<&str>, start: Option<&str>, end: Option<&str>) -> Result<Self> {
        match (date, start, end) {
            (Some(d), None, None) => Ok(DateSelection::Single(parse_date("date", d)?)),
            (None, Some(s), Some(e)) => {
                let start = parse_date("start", s)?;
                let end = parse_date("end", e)?;
                if start > end {
                    return Err(Error::MalformedRequest(format!(
                        "start {} is after end {}",
                        start, end
                    )));
                }
                Ok(DateSelection::Range { start, end })
            }
            _ => Err(Error::MalformedRequest(
                "give either `date` or both `start` and `end`".to_string(),
            )),
        }
    }

    fn push_args(&self, cmd: &mut Command) {
        match self {
            DateSelection::Single(d) => {
                cmd.arg("--date").arg(d.format(DATE_FORMAT).to_string());
            }
            DateSelection::Range { start, end } => {
                cmd.arg("--start")
                    .arg(start.format(DATE_FORMAT).to_string())
                    .arg("--end")
                    .arg(end.format(DATE_FORMAT).to_string());
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportRequest {
    /// Vector file describing the region of interest.
    pub roi: PathBuf,
    pub dates: DateSelection,
    pub out_dir: PathBuf,
    /// Ground sampling distance in metres.
    pub scale: u32,
}

/// External imagery exporter.
pub trait ExportService: Send + Sync {
    fn export(&self, request: &ExportRequest) -> Result<Vec<PathBuf>>;
}

/// Runs a configured program as the exporter.
///
/// The program receives `--kml <roi> (--date D | --start S --end E) --out-dir <dir> --scale <m>`
/// after its configured leading arguments, and must exit with status 0.
#[derive(Debug, Clone)]
pub struct CommandExportService {
    program: String,
    args: Vec<String>,
}

impl CommandExportService {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from a command line such as `["python", "parser_hub.py"]`.
    pub fn from_command(command: &[String]) -> Result<Self> {
        let (program, args) = command.split_first().ok_or(Error::InvalidArgument {
            arg: "export_command",
            value: String::new(),
        })?;
        Ok(Self::new(program.clone(), args.to_vec()))
    }
}

impl ExportService for CommandExportService {
    fn export(&self, request: &ExportRequest) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(&request.out_dir)?;
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).arg("--kml").arg(&request.roi);
        request.dates.push_args(&mut cmd);
        cmd.arg("--out-dir")
            .arg(&request.out_dir)
            .arg("--scale")
            .arg(request.scale.to_string());

        info!(program = %self.program, roi = %request.roi.display(), out_dir = %request.out_dir.display(), "Running export");
        let output = cmd
            .output()
            .map_err(|e| Error::ExportFailure(format!("cannot run {}: {}", self.program, e)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(status = %output.status, "Export command failed");
            return Err(Error::ExportFailure(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        list_tifs(&request.out_dir)
    }
}

/// `*.tif` files directly inside `dir`, sorted by path.
pub fn list_tifs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "tif"))
        .collect();
    files.sort();
    Ok(files)
}
