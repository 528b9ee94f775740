use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use skyfuse::{IndexName, SensorProfile};

#[derive(Parser)]
#[command(name = "skyfuse", version, about = "skyfuse CLI")]
pub struct CliArgs {
    /// Enable logging
    #[arg(long, global = true, default_value_t = false)]
    pub log: bool,

    /// Log filter (trace, debug, info, warn, error or an EnvFilter directive)
    #[arg(long, global = true, env = "SKYFUSE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true, default_value_t = false)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Clip a raster to the polygons of a vector footprint
    Clip {
        /// Input GeoTIFF
        #[arg(short, long)]
        input: PathBuf,
        /// Vector footprint (KML, GeoJSON, Shapefile, ...)
        #[arg(short, long)]
        geometry: PathBuf,
        /// Output GeoTIFF
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Evaluate the spectral index catalog over a 13-band optical raster
    Indices {
        /// Input GeoTIFF (13 bands, Sentinel-2 order)
        #[arg(short, long)]
        input: PathBuf,
        /// Directory receiving `<NAME>.tif` and `<NAME>_heatmap.jpg`
        #[arg(long)]
        output_dir: PathBuf,
        /// Skip heat map rendering
        #[arg(long, default_value_t = false)]
        no_heatmaps: bool,
        /// Restrict the run to these indices (repeatable); all by default
        #[arg(long, value_enum)]
        index: Vec<IndexName>,
    },

    /// Remove clouds from one optical scene using its radar companion
    Reconstruct {
        /// Fusion model checkpoint (JSON weights)
        #[arg(long)]
        checkpoint: PathBuf,
        /// Cloudy optical GeoTIFF (13 bands)
        #[arg(long)]
        optical: PathBuf,
        /// Radar GeoTIFF (VV, VH in dB)
        #[arg(long)]
        sar: PathBuf,
        /// Where `<stem>_pred.tiff` goes; defaults to the optical input's directory
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Resample a raw product onto the 10 m grid of its sensor profile
    Preprocess {
        #[arg(long, value_enum)]
        sensor: SensorProfile,
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Export scenes for a region of interest through the external exporter
    Export(ExportArgs),

    /// Run the HTTP inference server
    Serve(ServeArgs),
}

#[derive(Args)]
pub struct ExportArgs {
    /// Region of interest
    #[arg(long)]
    pub geometry: PathBuf,
    /// Single acquisition date (YYYY-MM-DD)
    #[arg(long, conflicts_with_all = ["start", "end"])]
    pub date: Option<String>,
    /// Range start (YYYY-MM-DD)
    #[arg(long, requires = "end")]
    pub start: Option<String>,
    /// Range end (YYYY-MM-DD)
    #[arg(long, requires = "start")]
    pub end: Option<String>,
    #[arg(long)]
    pub output_dir: PathBuf,
    /// Ground sampling distance in metres
    #[arg(long, default_value_t = 10)]
    pub scale: u32,
    /// Exporter program and its leading arguments
    #[arg(long, num_args = 1.., required = true, env = "SKYFUSE_EXPORT_COMMAND", value_delimiter = ' ')]
    pub export_command: Vec<String>,
}

#[derive(Args)]
pub struct ServeArgs {
    /// JSON config file; flags below override its values
    #[arg(long, env = "SKYFUSE_CONFIG")]
    pub config: Option<PathBuf>,
    /// Listen address, e.g. 0.0.0.0:8100
    #[arg(long, env = "SKYFUSE_LISTEN")]
    pub listen: Option<String>,
    /// Fusion model checkpoint for the `clouds` endpoint
    #[arg(long, env = "SKYFUSE_CHECKPOINT")]
    pub checkpoint: Option<PathBuf>,
    /// Exporter program and its leading arguments for the `parser` endpoint
    #[arg(long, num_args = 1.., env = "SKYFUSE_EXPORT_COMMAND", value_delimiter = ' ')]
    pub export_command: Option<Vec<String>>,
    /// Default `out_dir` for `parser` requests
    #[arg(long)]
    pub download_dir: Option<PathBuf>,
    /// Default `scale` for `parser` requests
    #[arg(long)]
    pub scale: Option<u32>,
}
